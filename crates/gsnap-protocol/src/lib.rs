//! # gsnap-protocol
//!
//! Wire protocol for the gsnap capture agent.
//!
//! The client sends newline-terminated ASCII command lines; the agent replies
//! with length-framed binary blobs (4-byte big-endian length, then payload).

pub mod command;
pub mod frame;

pub use command::{parse_leading_int, Command};
pub use frame::{encode_frame, read_frame, read_line, write_frame, FRAME_HEADER_LEN};

/// Default TCP port the agent listens on.
pub const DEFAULT_PORT: u16 = 5678;

/// Maximum number of data bytes in one command line.
pub const MAX_COMMAND_LEN: usize = 49;

/// Reply payload for unrecognised commands.
pub const FINISH_REPLY: &[u8] = b"finish";

/// Largest frame a client will accept from the agent (10 MB).
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;
