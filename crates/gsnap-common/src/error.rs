use std::io;

/// Convenient Result alias.
pub type SnapResult<T> = Result<T, SnapError>;

/// Capture pipeline error type.
#[derive(Debug, thiserror::Error)]
pub enum SnapError {
    #[error("Cannot open {path}: {source}")]
    DeviceOpen { path: String, source: io::Error },

    #[error("{path} is not a framebuffer: {source}")]
    ScreenInfo { path: String, source: io::Error },

    #[error("Cannot map {path}: {source}")]
    Map { path: String, source: io::Error },

    #[error("Encode error: {0}")]
    Encode(String),
}

impl SnapError {
    /// Whether the failure happened while acquiring the display device.
    /// These are recovered locally by skipping the capture.
    pub fn is_device_open(&self) -> bool {
        matches!(
            self,
            Self::DeviceOpen { .. } | Self::ScreenInfo { .. } | Self::Map { .. }
        )
    }
}
