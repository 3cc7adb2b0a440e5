//! The transport contract and its TCP implementation.
//!
//! The core never touches sockets directly: it speaks to a [`Transport`]
//! through the framing layer, and to a [`Listener`] from the accept loop.
//! Would-block is a value, not a failure; the framing layer recovers it by
//! invoking the yield hook and retrying. One plain TCP implementation is
//! all a host needs; tests use the in-memory pair in [`mem`].

use crate::error::TransportError;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use tracing::info;

/// A connected, non-blocking byte stream.
pub trait Transport {
    /// Read into `buf`. `Ok(0)` never occurs; closed connections surface
    /// as [`TransportError::Closed`].
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write from `buf`, returning how many bytes were accepted.
    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Half-close the write side, best effort.
    fn shutdown(&mut self);
}

/// A non-blocking accept source.
pub trait Listener {
    type Conn: Transport;

    /// Accept one pending connection, `Ok(None)` when none is waiting.
    fn accept(&mut self) -> Result<Option<(Self::Conn, SocketAddr)>, TransportError>;
}

/// "Let the host do other work" hint, invoked whenever the framing layer
/// suspends on would-block. A plain OS thread can simply yield.
pub type YieldFn = fn();

/// Default yield: hand the core back to the scheduler.
pub fn yield_to_host() {
    std::thread::yield_now();
}

fn map_io(err: std::io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::Interrupted => TransportError::WouldBlock,
        ErrorKind::ConnectionReset | ErrorKind::BrokenPipe | ErrorKind::ConnectionAborted => {
            TransportError::Reset
        }
        _ => TransportError::Io(err),
    }
}

/// TCP stream in non-blocking mode.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(err) => Err(map_io(err)),
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        match self.stream.write(buf) {
            Ok(0) => Err(TransportError::Reset),
            Ok(n) => Ok(n),
            Err(err) => Err(map_io(err)),
        }
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Write);
    }
}

/// Non-blocking TCP accept source bound to a port.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!("listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}

impl Listener for TcpAcceptor {
    type Conn = TcpTransport;

    fn accept(&mut self) -> Result<Option<(TcpTransport, SocketAddr)>, TransportError> {
        match self.listener.accept() {
            Ok((stream, peer)) => Ok(Some((TcpTransport::new(stream)?, peer))),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(map_io(err)),
        }
    }
}

/// In-memory transports for driving sessions in tests.
pub mod mem {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted byte stream: the test pushes inbound bytes, the code under
    /// test reads them; outbound bytes accumulate for inspection. Sends
    /// can be made to block a set number of times to exercise the
    /// stale-drain path.
    #[derive(Debug, Default)]
    pub struct MemTransport {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
        closed: bool,
        /// While positive, each `send` decrements this and would-blocks.
        pub blocked_sends: u32,
        /// Cap on bytes accepted per `send` call, to exercise partial
        /// writes. Zero means unlimited.
        pub send_chunk: usize,
    }

    impl MemTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue bytes for the code under test to read.
        pub fn push_inbound(&mut self, bytes: &[u8]) {
            self.inbound.extend(bytes);
        }

        /// Simulate an orderly close after the queued bytes drain.
        pub fn close(&mut self) {
            self.closed = true;
        }

        /// Bytes the code under test has written so far.
        pub fn outbound(&self) -> &[u8] {
            &self.outbound
        }

        pub fn take_outbound(&mut self) -> Vec<u8> {
            std::mem::take(&mut self.outbound)
        }

        pub fn inbound_len(&self) -> usize {
            self.inbound.len()
        }
    }

    /// Accept source over scripted [`MemTransport`] connections.
    #[derive(Debug, Default)]
    pub struct MemListener {
        pending: VecDeque<MemTransport>,
    }

    impl MemListener {
        pub fn new() -> Self {
            Self::default()
        }

        /// Stage a connection for the next accept poll.
        pub fn push_connection(&mut self, conn: MemTransport) {
            self.pending.push_back(conn);
        }
    }

    impl Listener for MemListener {
        type Conn = MemTransport;

        fn accept(&mut self) -> Result<Option<(MemTransport, SocketAddr)>, TransportError> {
            Ok(self
                .pending
                .pop_front()
                .map(|conn| (conn, SocketAddr::from(([127, 0, 0, 1], 0)))))
        }
    }

    impl Transport for MemTransport {
        fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            if self.inbound.is_empty() {
                if self.closed {
                    return Err(TransportError::Closed);
                }
                return Err(TransportError::WouldBlock);
            }
            let n = buf.len().min(self.inbound.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.inbound.pop_front().unwrap();
            }
            Ok(n)
        }

        fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
            if self.blocked_sends > 0 {
                self.blocked_sends -= 1;
                return Err(TransportError::WouldBlock);
            }
            let n = if self.send_chunk == 0 {
                buf.len()
            } else {
                buf.len().min(self.send_chunk)
            };
            self.outbound.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn shutdown(&mut self) {
            self.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mem::MemTransport;
    use super::*;

    #[test]
    fn mem_transport_round_trips_bytes() {
        let mut t = MemTransport::new();
        t.push_inbound(b"abc");
        let mut buf = [0u8; 8];
        assert_eq!(t.recv(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert!(matches!(t.recv(&mut buf), Err(TransportError::WouldBlock)));
        t.send(b"xyz").unwrap();
        assert_eq!(t.outbound(), b"xyz");
    }

    #[test]
    fn mem_transport_reports_close_after_drain() {
        let mut t = MemTransport::new();
        t.push_inbound(b"a");
        t.close();
        let mut buf = [0u8; 4];
        assert_eq!(t.recv(&mut buf).unwrap(), 1);
        assert!(matches!(t.recv(&mut buf), Err(TransportError::Closed)));
    }

    #[test]
    fn mem_transport_blocks_sends_on_request() {
        let mut t = MemTransport::new();
        t.blocked_sends = 2;
        assert!(matches!(t.send(b"x"), Err(TransportError::WouldBlock)));
        assert!(matches!(t.send(b"x"), Err(TransportError::WouldBlock)));
        assert_eq!(t.send(b"x").unwrap(), 1);
    }

    #[test]
    fn tcp_acceptor_polls_without_blocking() {
        let mut acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        assert!(acceptor.accept().unwrap().is_none());

        let addr = acceptor.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        // Give the kernel a moment to queue the connection.
        let mut accepted = None;
        for _ in 0..100 {
            if let Some(pair) = acceptor.accept().unwrap() {
                accepted = Some(pair);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let (_conn, peer) = accepted.expect("connection should be accepted");
        assert_eq!(peer.ip(), client.local_addr().unwrap().ip());
    }
}
