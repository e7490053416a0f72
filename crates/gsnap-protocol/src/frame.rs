//! Length-prefixed reply frames and bounded command-line reads.
//!
//! Both directions treat `ErrorKind::Interrupted` as "retry the same call".

use std::io::{self, BufRead, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::MAX_FRAME_SIZE;

/// Size of the big-endian length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Build a complete frame: 4-byte big-endian length followed by `payload`.
pub fn encode_frame(payload: &[u8]) -> io::Result<Bytes> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload of {} bytes does not fit a frame", payload.len()),
        )
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Write one frame. Either the whole frame reaches the writer or an error is
/// returned; `write_all` already loops over short and interrupted writes.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let frame = encode_frame(payload)?;
    writer.write_all(&frame)?;
    writer.flush()
}

/// Read one frame written by [`write_frame`] and return its payload.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header)?;

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds {MAX_FRAME_SIZE}"),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Read one command line of at most `max_len` bytes.
///
/// Accumulates into `line` until a `\n` is consumed or `max_len` bytes have
/// been read. Returns the number of bytes consumed, newline included:
/// `Ok(0)` means the peer closed before sending anything. The newline itself
/// is stripped from `line`. Bytes past `max_len` stay in the reader and form
/// the start of the next line.
pub fn read_line<R: BufRead + ?Sized>(
    reader: &mut R,
    line: &mut Vec<u8>,
    max_len: usize,
) -> io::Result<usize> {
    line.clear();
    let mut count = 0;

    while count < max_len {
        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                tracing::trace!("read interrupted, retrying");
                continue;
            }
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            break;
        }

        let window = &available[..available.len().min(max_len - count)];
        let (taken, complete) = match window.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (window.len(), false),
        };
        line.extend_from_slice(&window[..taken]);
        reader.consume(taken);
        count += taken;

        if complete {
            line.pop();
            break;
        }
    }

    Ok(count)
}
