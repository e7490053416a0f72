use serde::Deserialize;

/// Top-level agent configuration.
/// Loaded from `GSNAP__*` environment variables; every field has a default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Initial capture parameters
    #[serde(default)]
    pub capture: CaptureDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,
    /// Command port (default: 5678)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureDefaults {
    /// Framebuffer device node
    #[serde(default = "default_device")]
    pub device: String,
    /// Initial JPEG quality (default: 80, unchecked)
    #[serde(default = "default_quality")]
    pub quality: i32,
    /// Initial downsample factor (default: 1)
    #[serde(default = "default_resize")]
    pub resize: i32,
    #[serde(default)]
    pub red_offset: Option<u32>,
    #[serde(default)]
    pub green_offset: Option<u32>,
    #[serde(default)]
    pub blue_offset: Option<u32>,
    /// Fixed capture width; 0 or unset uses the device width
    #[serde(default)]
    pub width: Option<u32>,
}

impl AgentConfig {
    /// Load config from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("GSNAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }
}

impl CaptureDefaults {
    /// The channel-offset override, present only when all three offsets are set.
    pub fn channel_offsets(&self) -> Option<(u32, u32, u32)> {
        match (self.red_offset, self.green_offset, self.blue_offset) {
            (Some(r), Some(g), Some(b)) => Some((r, g, b)),
            _ => None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            device: default_device(),
            quality: default_quality(),
            resize: default_resize(),
            red_offset: None,
            green_offset: None,
            blue_offset: None,
            width: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5678
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_device() -> String {
    "/dev/graphics/fb0".to_string()
}
fn default_quality() -> i32 {
    80
}
fn default_resize() -> i32 {
    1
}
