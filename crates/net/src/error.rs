//! Error types for transport, codec and protocol failures.
//!
//! Would-block is an ordinary value here, not a failure: the framing
//! layer recovers it locally by yielding. Everything else terminates the
//! session it happened on, never the server.

use std::time::Duration;

/// Errors surfaced by a transport backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No progress possible right now; retry after yielding.
    #[error("operation would block")]
    WouldBlock,
    /// Orderly close by the peer.
    #[error("connection closed by peer")]
    Closed,
    /// Hard connection loss.
    #[error("connection reset")]
    Reset,
    #[error("transport i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-level decoding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Continuation bit set past the maximum varint width.
    #[error("malformed varint")]
    MalformedVarint,
    /// Input ended before the value did.
    #[error("short read")]
    ShortRead,
    /// A length prefix exceeded the caller's bound.
    #[error("length {len} exceeds limit {limit}")]
    OversizedLength { len: usize, limit: usize },
    #[error("invalid utf-8 in string")]
    InvalidUtf8,
}

/// Session-level failures: transport, codec, or protocol state.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// No forward progress for the configured window.
    #[error("network timeout after {0:?}")]
    Timeout(Duration),
    #[error("packet id {id:#04x} is not valid in the {state} state")]
    UnexpectedPacket { id: i32, state: &'static str },
    #[error("unsupported protocol version {0}")]
    VersionMismatch(i32),
    #[error("keepalive timeout")]
    KeepaliveTimeout,
    /// The block-change index filled up; the offending session is told
    /// the world is full.
    #[error("world is full")]
    WorldFull,
    #[error("server is full")]
    ServerFull,
}
