//! # gsnap-common
//!
//! Shared configuration and error types for the gsnap capture agent.

pub mod config;
pub mod error;

pub use config::{AgentConfig, CaptureDefaults, ServerConfig};
pub use error::{SnapError, SnapResult};
