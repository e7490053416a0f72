//! # gsnap Agent
//!
//! Network screen-capture agent for Linux framebuffer devices. Listens on a
//! TCP port and serves one client at a time with a line-based command
//! protocol: `snap` returns a JPEG of the current display, `info` returns the
//! display geometry, `q<N>`/`r<N>` tune quality and downsampling, and `kill`
//! stops the agent.
//!
//! ## Usage
//!
//! ```sh
//! gsnap-agent                              # quality 80, no downsampling
//! gsnap-agent 60 2                         # quality 60, half size
//! gsnap-agent 80 1 16 8 0                  # force red/green/blue bit offsets
//! gsnap-agent 80 1 16 8 0 480              # ...and a fixed 480px capture width
//! gsnap-agent --device /dev/fb0 --port 5678
//! ```
//!
//! Every setting can also come from `GSNAP__SERVER__*` / `GSNAP__CAPTURE__*`
//! environment variables (or a `.env` file); command-line values win.

mod encoder;
mod framebuffer;
mod pixel;
mod server;
mod session;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gsnap_common::{AgentConfig, CaptureDefaults};
use gsnap_protocol::parse_leading_int;

use crate::framebuffer::FbDevice;
use crate::server::Server;
use crate::session::CaptureConfig;

/// Exit status after a client sends `kill`.
const KILL_EXIT_CODE: i32 = 5;
/// Exit status when the listener stops accepting connections.
const ACCEPT_FAILED_EXIT_CODE: i32 = 4;

#[derive(Debug, Parser)]
#[command(name = "gsnap-agent", version, about = "Framebuffer screen-capture agent")]
struct Cli {
    /// Initial JPEG quality
    quality: Option<String>,
    /// Initial downsample factor
    resize: Option<String>,
    /// Red channel bit offset override
    red: Option<String>,
    /// Green channel bit offset override
    green: Option<String>,
    /// Blue channel bit offset override
    blue: Option<String>,
    /// Fixed capture width (0 = device width)
    width: Option<String>,

    /// Framebuffer device node
    #[arg(long)]
    device: Option<String>,
    /// Address to bind
    #[arg(long)]
    host: Option<String>,
    /// TCP port to listen on
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    /// Overlay command-line values onto the loaded configuration.
    /// Integers are parsed best-effort; negative offsets and widths are dropped.
    fn apply(&self, config: &mut AgentConfig) {
        let capture: &mut CaptureDefaults = &mut config.capture;
        let int = |arg: &Option<String>| arg.as_deref().map(|s| parse_leading_int(s.as_bytes()));
        let unsigned = |arg: &Option<String>| int(arg).and_then(|v| u32::try_from(v).ok());

        if let Some(quality) = int(&self.quality) {
            capture.quality = quality;
        }
        if let Some(resize) = int(&self.resize) {
            capture.resize = resize;
        }
        if self.red.is_some() || self.green.is_some() || self.blue.is_some() {
            capture.red_offset = unsigned(&self.red);
            capture.green_offset = unsigned(&self.green);
            capture.blue_offset = unsigned(&self.blue);
        }
        if self.width.is_some() {
            capture.width = unsigned(&self.width);
        }
        if let Some(device) = &self.device {
            capture.device = device.clone();
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AgentConfig::load().context("invalid GSNAP__* configuration")?;
    cli.apply(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    tracing::info!("gsnap agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let capture = CaptureConfig::from_defaults(&config.capture);
    tracing::info!(
        device = %config.capture.device,
        quality = capture.quality,
        downsample = capture.downsample,
        width = ?capture.width,
        channel_offsets = ?capture.channel_offsets,
        "Capture defaults"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let mut server = Server::bind(&addr, FbDevice::new(&config.capture.device), capture)
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on {}", server.local_addr()?);

    let code = match server.serve() {
        Ok(()) => KILL_EXIT_CODE,
        Err(e) => {
            tracing::error!("Accept connection failed: {}", e);
            ACCEPT_FAILED_EXIT_CODE
        }
    };

    tracing::info!(code, "gsnap agent exiting");
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AgentConfig {
        let cli = Cli::try_parse_from(std::iter::once("gsnap-agent").chain(args.iter().copied()))
            .unwrap();
        let mut config = AgentConfig::default();
        cli.apply(&mut config);
        config
    }

    #[test]
    fn test_no_args_keeps_defaults() {
        let config = parse(&[]);
        assert_eq!(config.capture.quality, 80);
        assert_eq!(config.capture.resize, 1);
        assert_eq!(config.capture.channel_offsets(), None);
        assert_eq!(config.server.port, gsnap_protocol::DEFAULT_PORT);
    }

    #[test]
    fn test_positional_args() {
        let config = parse(&["60", "2", "0", "8", "16", "480"]);
        assert_eq!(config.capture.quality, 60);
        assert_eq!(config.capture.resize, 2);
        assert_eq!(config.capture.channel_offsets(), Some((0, 8, 16)));
        assert_eq!(config.capture.width, Some(480));
    }

    #[test]
    fn test_best_effort_integers() {
        let config = parse(&["abc", "3x"]);
        assert_eq!(config.capture.quality, 0);
        assert_eq!(config.capture.resize, 3);
    }

    #[test]
    fn test_partial_offsets_disable_override() {
        let config = parse(&["80", "1", "16", "8"]);
        assert_eq!(config.capture.channel_offsets(), None);
    }

    #[test]
    fn test_flags() {
        let config = parse(&["--device", "/dev/fb1", "--port", "6000", "--host", "127.0.0.1"]);
        assert_eq!(config.capture.device, "/dev/fb1");
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
