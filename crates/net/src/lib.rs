//! Wire protocol support: codec, framing, packets, transport.

mod codec;
mod error;
mod framing;
mod packets;
mod transport;

pub use codec::{
    pack_position, peek_varint, unpack_position, varint_len, zigzag_decode, zigzag_encode, Reader,
    Writer, MAX_VARINT_BYTES, MAX_VARLONG_BYTES,
};
pub use error::{CodecError, NetError, TransportError};
pub use framing::{FramedConn, FramingConfig, MOVEMENT_ID_MAX, MOVEMENT_ID_MIN};
pub use packets::*;
pub use transport::{
    mem, yield_to_host, Listener, TcpAcceptor, TcpTransport, Transport, YieldFn,
};
