//! Per-connection command loop.
//!
//! Reads one command line at a time and either mutates the shared
//! [`CaptureConfig`] or runs a capture and writes a framed reply:
//!
//! | Command   | Reply                                           |
//! |-----------|-------------------------------------------------|
//! | `snap`    | JPEG frame (zero-length if the device fails)    |
//! | `r<N>`    | none                                            |
//! | `q<N>`    | none                                            |
//! | `kill`    | none; session ends with [`SessionEnd::Killed`]  |
//! | `info`    | `width,height,red,green,blue` (none on failure) |
//! | other     | `finish`                                        |

use std::io::{self, BufRead, Write};
use std::time::Instant;

use gsnap_common::CaptureDefaults;
use gsnap_protocol::{read_line, write_frame, Command, FINISH_REPLY, MAX_COMMAND_LEN};

use crate::encoder;
use crate::framebuffer::{DeviceOpener, FrameSource};
use crate::pixel::ChannelOffsets;

/// Capture parameters shared by every command for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// JPEG quality, stored unchecked.
    pub quality: i32,
    /// Downsample factor, always ≥ 1.
    pub downsample: u32,
    /// Fixed capture width overriding the device width.
    pub width: Option<u32>,
    /// Channel bit offsets overriding the device-reported ones.
    pub channel_offsets: Option<ChannelOffsets>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            downsample: 1,
            width: None,
            channel_offsets: None,
        }
    }
}

impl CaptureConfig {
    pub fn from_defaults(defaults: &CaptureDefaults) -> Self {
        let mut config = Self {
            quality: defaults.quality,
            width: defaults.width.filter(|&w| w != 0),
            channel_offsets: defaults
                .channel_offsets()
                .map(|(red, green, blue)| ChannelOffsets { red, green, blue }),
            ..Self::default()
        };
        config.set_downsample(defaults.resize);
        config
    }

    /// Set the downsample factor. Values below 1 are ignored.
    pub fn set_downsample(&mut self, factor: i32) -> bool {
        match u32::try_from(factor) {
            Ok(factor) if factor >= 1 => {
                self.downsample = factor;
                true
            }
            _ => {
                tracing::warn!(factor, "Ignoring downsample factor below 1");
                false
            }
        }
    }
}

/// Why a session returned control to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the connection.
    PeerClosed,
    /// The peer sent `kill`; the agent should exit.
    Killed,
}

/// Command loop for one connected client.
pub struct CommandSession<'a, O: DeviceOpener> {
    opener: &'a O,
    config: &'a mut CaptureConfig,
}

impl<'a, O: DeviceOpener> CommandSession<'a, O> {
    pub fn new(opener: &'a O, config: &'a mut CaptureConfig) -> Self {
        Self { opener, config }
    }

    /// Serve commands until the peer closes, sends `kill`, or an I/O error
    /// occurs. I/O errors end the session and are returned to the caller.
    pub fn run<R, W>(&mut self, reader: &mut R, writer: &mut W) -> io::Result<SessionEnd>
    where
        R: BufRead + ?Sized,
        W: Write + ?Sized,
    {
        let mut line = Vec::with_capacity(MAX_COMMAND_LEN);

        loop {
            let received = read_line(reader, &mut line, MAX_COMMAND_LEN)?;
            if received == 0 {
                tracing::info!("Client closed the connection");
                return Ok(SessionEnd::PeerClosed);
            }

            let command = Command::parse(&line);
            tracing::info!(?command, bytes = received, "Received command");

            match command {
                Command::Snap => {
                    let payload = self.snap();
                    write_frame(writer, &payload)?;
                }
                Command::Resize(factor) => {
                    if self.config.set_downsample(factor) {
                        tracing::info!(factor, "Downsample factor changed");
                    }
                }
                Command::Quality(quality) => {
                    self.config.quality = quality;
                    tracing::info!(quality, "Image quality changed");
                }
                Command::Kill => {
                    tracing::info!("Close capture agent by command");
                    return Ok(SessionEnd::Killed);
                }
                Command::Info => {
                    if let Some(info) = self.info() {
                        write_frame(writer, info.as_bytes())?;
                    }
                }
                Command::Unknown(text) => {
                    tracing::warn!(command = %text, bytes = received, "Invalid command");
                    write_frame(writer, FINISH_REPLY)?;
                }
            }
        }
    }

    /// Capture and encode one frame. Any failure yields an empty payload.
    fn snap(&self) -> Vec<u8> {
        let started = Instant::now();

        let mut source = match self.opener.open(self.config.width) {
            Ok(source) => source,
            Err(e) if e.is_device_open() => {
                tracing::warn!("Snapshot skipped, device unavailable: {}", e);
                return Vec::new();
            }
            Err(e) => {
                tracing::error!("Snapshot skipped: {}", e);
                return Vec::new();
            }
        };
        if let Some(offsets) = self.config.channel_offsets {
            source.apply_channel_offsets(offsets);
        }

        match encoder::encode_jpeg(&source, self.config.quality, self.config.downsample) {
            Ok(image) => {
                tracing::debug!(
                    width = image.width,
                    height = image.height,
                    jpeg_bytes = image.data.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Snapshot encoded"
                );
                image.data
            }
            Err(e) => {
                tracing::warn!("Snapshot encode failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Format the current geometry, or `None` if the device cannot be opened.
    fn info(&self) -> Option<String> {
        match self.opener.open(self.config.width) {
            Ok(source) => Some(source.geometry().info_line()),
            Err(e) if e.is_device_open() => {
                tracing::warn!("Info unavailable, device unavailable: {}", e);
                None
            }
            Err(e) => {
                tracing::error!("Info unavailable: {}", e);
                None
            }
        }
    }
}
