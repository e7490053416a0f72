//! Linux framebuffer access.
//!
//! The device is opened, queried and mapped per request and released as soon
//! as the [`FramebufferSource`] is dropped, so every capture sees the current
//! display mode and contents.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::ptr::{self, NonNull};

use gsnap_common::{SnapError, SnapResult};

use crate::pixel::{ChannelOffsets, PixelFormat};

// <linux/fb.h> ioctl requests
const FBIOGET_VSCREENINFO: u32 = 0x4600;
const FBIOGET_FSCREENINFO: u32 = 0x4602;

/// Resolved display geometry for one open of the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayGeometry {
    /// Effective width: the configured override, or the device width.
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: usize,
    pub offsets: ChannelOffsets,
    /// Bound once from `bytes_per_pixel`.
    pub format: PixelFormat,
}

impl DisplayGeometry {
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize, offsets: ChannelOffsets) -> Self {
        Self {
            width,
            height,
            bytes_per_pixel,
            offsets,
            format: PixelFormat::from_bytes_per_pixel(bytes_per_pixel),
        }
    }

    /// Bytes in one framebuffer row at the effective width.
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    /// Size of the mapping: `width × height × bytes_per_pixel`.
    pub fn frame_len(&self) -> usize {
        self.row_stride() * self.height as usize
    }

    /// The `info` reply: `width,height,red,green,blue`.
    pub fn info_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.width, self.height, self.offsets.red, self.offsets.green, self.offsets.blue
        )
    }
}

/// Anything that exposes display geometry plus the raw pixel memory behind it.
pub trait FrameSource {
    fn geometry(&self) -> &DisplayGeometry;

    fn geometry_mut(&mut self) -> &mut DisplayGeometry;

    /// Raw pixel bytes, `geometry().frame_len()` long.
    fn pixels(&self) -> &[u8];

    /// Force the channel bit offsets used for unpacking, for devices that
    /// report them wrongly.
    fn apply_channel_offsets(&mut self, offsets: ChannelOffsets) {
        self.geometry_mut().offsets = offsets;
    }
}

/// Opens a fresh [`FrameSource`] for each capture.
pub trait DeviceOpener {
    type Source: FrameSource;

    fn open(&self, width_override: Option<u32>) -> SnapResult<Self::Source>;
}

/// The framebuffer character device at a fixed path.
#[derive(Debug, Clone)]
pub struct FbDevice {
    path: String,
}

impl FbDevice {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl DeviceOpener for FbDevice {
    type Source = FramebufferSource;

    fn open(&self, width_override: Option<u32>) -> SnapResult<FramebufferSource> {
        FramebufferSource::open(&self.path, width_override)
    }
}

/// An open, memory-mapped framebuffer. Unmapped and closed on drop.
pub struct FramebufferSource {
    map: NonNull<u8>,
    map_len: usize,
    geometry: DisplayGeometry,
    // Closed after the mapping is released in `drop`.
    _file: File,
}

impl FramebufferSource {
    /// Open `path`, query its screen info and map `width × height × bpp`
    /// bytes shared read/write. A non-zero `width_override` replaces the
    /// device-reported width.
    pub fn open(path: &str, width_override: Option<u32>) -> SnapResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| SnapError::DeviceOpen {
                path: path.to_string(),
                source,
            })?;
        let fd = file.as_raw_fd();

        let not_a_framebuffer = |source| SnapError::ScreenInfo {
            path: path.to_string(),
            source,
        };

        let mut fix = FbFixScreenInfo::default();
        // SAFETY: `fix` mirrors `struct fb_fix_screeninfo` and outlives the call.
        if unsafe { libc::ioctl(fd, FBIOGET_FSCREENINFO as _, &mut fix as *mut FbFixScreenInfo) } < 0 {
            return Err(not_a_framebuffer(io::Error::last_os_error()));
        }

        let mut var = FbVarScreenInfo::default();
        // SAFETY: `var` mirrors `struct fb_var_screeninfo` and outlives the call.
        if unsafe { libc::ioctl(fd, FBIOGET_VSCREENINFO as _, &mut var as *mut FbVarScreenInfo) } < 0 {
            return Err(not_a_framebuffer(io::Error::last_os_error()));
        }

        let width = width_override
            .filter(|&w| w != 0)
            .unwrap_or(var.xres);
        let geometry = DisplayGeometry::new(
            width,
            var.yres,
            (var.bits_per_pixel >> 3) as usize,
            ChannelOffsets {
                red: var.red.offset,
                green: var.green.offset,
                blue: var.blue.offset,
            },
        );

        let map_len = geometry.frame_len();
        if map_len == 0 {
            return Err(SnapError::Map {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidData, "zero-sized framebuffer"),
            });
        }

        // SAFETY: fresh shared mapping of an fd we own; checked against MAP_FAILED.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(SnapError::Map {
                path: path.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        let map = NonNull::new(addr.cast::<u8>()).ok_or_else(|| SnapError::Map {
            path: path.to_string(),
            source: io::Error::other("mmap returned null"),
        })?;

        tracing::debug!(
            device = path,
            id = %fix.id_str(),
            line_length = fix.line_length,
            width = geometry.width,
            height = geometry.height,
            bpp = var.bits_per_pixel,
            red = geometry.offsets.red,
            green = geometry.offsets.green,
            blue = geometry.offsets.blue,
            format = ?geometry.format,
            "Framebuffer mapped"
        );
        if geometry.format == PixelFormat::Unsupported {
            tracing::warn!(
                bpp = var.bits_per_pixel,
                "Unsupported framebuffer depth, capturing black"
            );
        }

        Ok(Self {
            map,
            map_len,
            geometry,
            _file: file,
        })
    }
}

impl FrameSource for FramebufferSource {
    fn geometry(&self) -> &DisplayGeometry {
        &self.geometry
    }

    fn geometry_mut(&mut self) -> &mut DisplayGeometry {
        &mut self.geometry
    }

    fn pixels(&self) -> &[u8] {
        // SAFETY: the mapping is `map_len` bytes and lives until `drop`.
        unsafe { std::slice::from_raw_parts(self.map.as_ptr(), self.map_len) }
    }
}

impl Drop for FramebufferSource {
    fn drop(&mut self) {
        // SAFETY: `map`/`map_len` come from the successful mmap in `open`.
        if unsafe { libc::munmap(self.map.as_ptr().cast(), self.map_len) } != 0 {
            tracing::warn!("munmap failed: {}", io::Error::last_os_error());
        }
    }
}

// ─── Kernel structs ─────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

#[repr(C)]
#[derive(Debug, Default)]
struct FbFixScreenInfo {
    id: [u8; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    type_: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: libc::c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

impl FbFixScreenInfo {
    fn id_str(&self) -> String {
        let end = self.id.iter().position(|&b| b == 0).unwrap_or(self.id.len());
        String::from_utf8_lossy(&self.id[..end]).into_owned()
    }
}

#[repr(C)]
#[derive(Debug, Default)]
struct FbVarScreenInfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: FbBitfield,
    green: FbBitfield,
    blue: FbBitfield,
    transp: FbBitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

/// In-memory frame for exercising the encoder and session without a device.
#[cfg(test)]
pub struct MemoryFrame {
    pub geometry: DisplayGeometry,
    pub pixels: Vec<u8>,
}

#[cfg(test)]
impl MemoryFrame {
    /// A frame whose pixels are all `fill`.
    pub fn filled(geometry: DisplayGeometry, fill: &[u8]) -> Self {
        let count = geometry.width as usize * geometry.height as usize;
        let pixels = fill.repeat(count);
        Self { geometry, pixels }
    }
}

#[cfg(test)]
impl FrameSource for MemoryFrame {
    fn geometry(&self) -> &DisplayGeometry {
        &self.geometry
    }

    fn geometry_mut(&mut self) -> &mut DisplayGeometry {
        &mut self.geometry
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
