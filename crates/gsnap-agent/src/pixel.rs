//! Raw framebuffer pixel layouts and their conversion to 8-bit RGB.

/// Bit offsets of each colour channel inside a packed pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOffsets {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

/// Pixel layouts a framebuffer can expose, selected once from bytes-per-pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 16-bit 5-6-5.
    Packed16,
    /// 24-bit, channel bytes located by offset.
    Packed24,
    /// 32-bit, channel bytes located by offset; the fourth byte is ignored.
    Packed32,
    /// Any other depth. Every pixel reads as black.
    Unsupported,
}

impl PixelFormat {
    pub fn from_bytes_per_pixel(bytes_per_pixel: usize) -> Self {
        match bytes_per_pixel {
            2 => Self::Packed16,
            3 => Self::Packed24,
            4 => Self::Packed32,
            _ => Self::Unsupported,
        }
    }

    /// Convert one raw pixel to `(r, g, b)`. Never fails: short input or
    /// out-of-range offsets read as zero.
    pub fn unpack(self, pixel: &[u8], offsets: ChannelOffsets) -> (u8, u8, u8) {
        match self {
            Self::Packed16 => {
                let color = match pixel {
                    [lo, hi, ..] => u32::from(u16::from_ne_bytes([*lo, *hi])),
                    _ => 0,
                };
                // Coarse left-shift expansion, not bit replication.
                (
                    (((color >> 11) & 0xff) << 3) as u8,
                    (((color >> 5) & 0xff) << 2) as u8,
                    ((color & 0xff) << 3) as u8,
                )
            }
            Self::Packed24 | Self::Packed32 => {
                let byte_at = |offset: u32| {
                    pixel
                        .get((offset >> 3) as usize)
                        .copied()
                        .unwrap_or(0)
                };
                (
                    byte_at(offsets.red),
                    byte_at(offsets.green),
                    byte_at(offsets.blue),
                )
            }
            Self::Unsupported => (0, 0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BGRX: ChannelOffsets = ChannelOffsets {
        red: 16,
        green: 8,
        blue: 0,
    };

    #[test]
    fn test_format_selection() {
        assert_eq!(PixelFormat::from_bytes_per_pixel(2), PixelFormat::Packed16);
        assert_eq!(PixelFormat::from_bytes_per_pixel(3), PixelFormat::Packed24);
        assert_eq!(PixelFormat::from_bytes_per_pixel(4), PixelFormat::Packed32);
        assert_eq!(PixelFormat::from_bytes_per_pixel(1), PixelFormat::Unsupported);
        assert_eq!(PixelFormat::from_bytes_per_pixel(0), PixelFormat::Unsupported);
    }

    #[test]
    fn test_unpack_rgb565_shift_formula() {
        // r=0b10101, g=0b110011, b=0b01110
        let color: u16 = (0b10101 << 11) | (0b110011 << 5) | 0b01110;
        let (r, g, b) = PixelFormat::Packed16.unpack(&color.to_ne_bytes(), BGRX);
        assert_eq!(r, 0b10101 << 3);
        assert_eq!(g, 0b110011 << 2);
        assert_eq!(b, 0b01110 << 3);

        // White tops out at 248/252/248, not 255.
        let (r, g, b) = PixelFormat::Packed16.unpack(&0xFFFFu16.to_ne_bytes(), BGRX);
        assert_eq!((r, g, b), (248, 252, 248));
    }

    #[test]
    fn test_unpack_rgb24_by_offset() {
        let pixel = [0x11, 0x22, 0x33];
        assert_eq!(
            PixelFormat::Packed24.unpack(&pixel, BGRX),
            (0x33, 0x22, 0x11)
        );

        let rgb = ChannelOffsets {
            red: 0,
            green: 8,
            blue: 16,
        };
        assert_eq!(
            PixelFormat::Packed24.unpack(&pixel, rgb),
            (0x11, 0x22, 0x33)
        );
    }

    #[test]
    fn test_unpack_argb32_ignores_alpha() {
        let pixel = [0x0A, 0x0B, 0x0C, 0xFF];
        assert_eq!(
            PixelFormat::Packed32.unpack(&pixel, BGRX),
            (0x0C, 0x0B, 0x0A)
        );
    }

    #[test]
    fn test_unpack_out_of_range_offset_reads_zero() {
        let bad = ChannelOffsets {
            red: 40,
            green: 8,
            blue: 0,
        };
        assert_eq!(
            PixelFormat::Packed32.unpack(&[1, 2, 3, 4], bad),
            (0, 2, 1)
        );
    }

    #[test]
    fn test_unsupported_is_black() {
        assert_eq!(PixelFormat::Unsupported.unpack(&[0xFF], BGRX), (0, 0, 0));
        assert_eq!(
            PixelFormat::Unsupported.unpack(&[0xFF; 8], BGRX),
            (0, 0, 0)
        );
    }
}
