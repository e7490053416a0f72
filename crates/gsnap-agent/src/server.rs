//! Single-client TCP accept loop.
//!
//! One connection is served start-to-finish before the next is accepted.

use std::io::{self, BufReader};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use uuid::Uuid;

use crate::framebuffer::DeviceOpener;
use crate::session::{CaptureConfig, CommandSession, SessionEnd};

pub struct Server<O: DeviceOpener> {
    listener: TcpListener,
    opener: O,
    config: CaptureConfig,
}

impl<O: DeviceOpener> Server<O> {
    pub fn bind(addr: &str, opener: O, config: CaptureConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            opener,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until a client sends `kill`.
    ///
    /// Returns an error only if `accept` fails for a reason other than an
    /// interrupted call.
    pub fn serve(&mut self) -> io::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if self.handle_connection(stream, peer) == SessionEnd::Killed {
                return Ok(());
            }
        }
    }

    fn handle_connection(&mut self, stream: TcpStream, peer: SocketAddr) -> SessionEnd {
        let span = tracing::info_span!("connection", id = %Uuid::new_v4(), %peer);
        let _enter = span.enter();
        tracing::info!("Successfully connected to client");

        let end = match stream.try_clone() {
            Ok(read_half) => {
                let mut reader = BufReader::new(read_half);
                let mut writer = &stream;
                CommandSession::new(&self.opener, &mut self.config).run(&mut reader, &mut writer)
            }
            Err(e) => Err(e),
        };

        let end = end.unwrap_or_else(|e| {
            tracing::warn!("Session ended on I/O error: {}", e);
            SessionEnd::PeerClosed
        });

        if let Err(e) = stream.shutdown(Shutdown::Both) {
            tracing::debug!("Shutdown after session: {}", e);
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::thread;

    use gsnap_protocol::read_frame;

    use crate::framebuffer::FbDevice;

    #[test]
    fn test_serves_clients_sequentially_until_kill() {
        let mut server = Server::bind(
            "127.0.0.1:0",
            FbDevice::new("/nonexistent/fb0"),
            CaptureConfig::default(),
        )
        .unwrap();
        let addr = server.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let result = server.serve();
            (result, server.config)
        });

        // First client: unknown command, quality change, missing device snap.
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"hello\nq42\nsnap\n").unwrap();
        assert_eq!(read_frame(&mut client).unwrap(), b"finish");
        assert_eq!(read_frame(&mut client).unwrap(), b"");
        drop(client);

        // Second client: kill closes the connection without a reply.
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"kill\n").unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());

        let (result, config) = handle.join().unwrap();
        result.unwrap();
        assert_eq!(config.quality, 42);
    }
}
