//! Command-line dispatch table.
//!
//! | Line       | Command            |
//! |------------|--------------------|
//! | `snap...`  | [`Command::Snap`]  |
//! | `r<int>`   | [`Command::Resize`]|
//! | `q<int>`   | [`Command::Quality`]|
//! | `kill...`  | [`Command::Kill`]  |
//! | `info...`  | [`Command::Info`]  |
//! | otherwise  | [`Command::Unknown`]|
//!
//! Matching is case-sensitive and by prefix, checked in the order above.

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Capture one JPEG frame.
    Snap,
    /// Set the downsample factor.
    Resize(i32),
    /// Set the JPEG quality.
    Quality(i32),
    /// Close the connection and terminate the agent.
    Kill,
    /// Report `width,height,red,green,blue`.
    Info,
    /// Anything else; carries the line for logging.
    Unknown(String),
}

impl Command {
    /// Parse a command line (without its trailing newline).
    pub fn parse(line: &[u8]) -> Self {
        if line.starts_with(b"snap") {
            Self::Snap
        } else if let Some(rest) = line.strip_prefix(b"r") {
            Self::Resize(parse_leading_int(rest))
        } else if let Some(rest) = line.strip_prefix(b"q") {
            Self::Quality(parse_leading_int(rest))
        } else if line.starts_with(b"kill") {
            Self::Kill
        } else if line.starts_with(b"info") {
            Self::Info
        } else {
            Self::Unknown(String::from_utf8_lossy(line).into_owned())
        }
    }
}

/// Best-effort integer parse with C `atoi` semantics.
///
/// Skips leading whitespace, accepts one optional sign, then consumes decimal
/// digits until the first non-digit. No digits yields 0; overflow saturates.
pub fn parse_leading_int(input: &[u8]) -> i32 {
    let mut bytes = input
        .iter()
        .copied()
        .skip_while(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C))
        .peekable();

    let negative = match bytes.peek().copied() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    for b in bytes.take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if negative {
        value = -value;
    }

    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dispatch_table() {
        assert_eq!(Command::parse(b"snap"), Command::Snap);
        assert_eq!(Command::parse(b"snapshot please"), Command::Snap);
        assert_eq!(Command::parse(b"r3"), Command::Resize(3));
        assert_eq!(Command::parse(b"q55"), Command::Quality(55));
        assert_eq!(Command::parse(b"kill"), Command::Kill);
        assert_eq!(Command::parse(b"killall"), Command::Kill);
        assert_eq!(Command::parse(b"info"), Command::Info);
        assert_eq!(Command::parse(b"xyz"), Command::Unknown("xyz".to_string()));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(Command::parse(b"SNAP"), Command::Unknown("SNAP".to_string()));
        assert_eq!(Command::parse(b"Info"), Command::Unknown("Info".to_string()));
    }

    #[test]
    fn test_single_letter_prefixes_win() {
        // Anything starting with 'r' or 'q' is a parameter change.
        assert_eq!(Command::parse(b"resize"), Command::Resize(0));
        assert_eq!(Command::parse(b"quit"), Command::Quality(0));
        assert_eq!(Command::parse(b""), Command::Unknown(String::new()));
    }

    #[test]
    fn test_parse_leading_int_like_atoi() {
        assert_eq!(parse_leading_int(b"80"), 80);
        assert_eq!(parse_leading_int(b"  42abc"), 42);
        assert_eq!(parse_leading_int(b"-7"), -7);
        assert_eq!(parse_leading_int(b"+12"), 12);
        assert_eq!(parse_leading_int(b"abc"), 0);
        assert_eq!(parse_leading_int(b"- 5"), 0);
        assert_eq!(parse_leading_int(b""), 0);
        assert_eq!(parse_leading_int(b"99999999999"), i32::MAX);
        assert_eq!(parse_leading_int(b"-99999999999"), i32::MIN);
    }
}
