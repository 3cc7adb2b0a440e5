//! Per-session framing: buffered reads, batched writes, stale-drain.
//!
//! Inbound bytes pass through a bounded read buffer that supports
//! peek-then-consume, so callers can poll for a packet without committing
//! to a read even when the backend has no native peek. Outbound packets
//! accumulate in a small batch buffer so a burst of little writes turns
//! into one send. While a send is blocked on the peer, the read side is
//! scanned for stale movement packets which are silently discarded, all
//! but the most recent one.

use crate::codec::{peek_varint, Writer};
use crate::error::{CodecError, NetError, TransportError};
use crate::transport::{yield_to_host, Transport, YieldFn};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Serverbound movement packet ids (position / position+rotation /
/// rotation / flags). These are the only packets stale-drain may touch.
pub const MOVEMENT_ID_MIN: i32 = 0x1D;
pub const MOVEMENT_ID_MAX: i32 = 0x20;

/// Tuning for a framed connection.
#[derive(Debug, Clone, Copy)]
pub struct FramingConfig {
    /// Read-buffer capacity; also the largest accepted packet length.
    pub max_recv_len: usize,
    /// Write batch buffer capacity.
    pub packet_buf_len: usize,
    /// Longest tolerated progress-free stretch in recv_all/send_all.
    pub timeout: Duration,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_recv_len: 4096,
            packet_buf_len: 2048,
            timeout: Duration::from_secs(15),
        }
    }
}

/// A transport wrapped with buffering, batching and drain logic.
pub struct FramedConn<T: Transport> {
    transport: T,
    config: FramingConfig,
    /// Buffered-but-unconsumed inbound bytes.
    rx: Vec<u8>,
    /// Outbound batch; flushed explicitly or when full.
    tx: Vec<u8>,
    yield_hook: YieldFn,
    /// Total payload bytes delivered to the parser; helps notice misreads.
    pub bytes_received: u64,
}

impl<T: Transport> FramedConn<T> {
    pub fn new(transport: T, config: FramingConfig) -> Self {
        Self {
            transport,
            rx: Vec::with_capacity(config.max_recv_len),
            tx: Vec::with_capacity(config.packet_buf_len),
            config,
            yield_hook: yield_to_host,
            bytes_received: 0,
        }
    }

    /// Replace the suspension hook (cooperative hosts pump their event
    /// queue here).
    pub fn set_yield_hook(&mut self, hook: YieldFn) {
        self.yield_hook = hook;
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    /// One non-blocking pull from the transport into the read buffer.
    /// Returns the number of new bytes (0 on would-block).
    fn fill(&mut self) -> Result<usize, TransportError> {
        let room = self.config.max_recv_len.saturating_sub(self.rx.len());
        if room == 0 {
            return Ok(0);
        }
        let mut chunk = [0u8; 512];
        let want = room.min(chunk.len());
        match self.transport.recv(&mut chunk[..want]) {
            Ok(n) => {
                self.rx.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(TransportError::WouldBlock) => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Peek up to `want` buffered bytes without consuming, pulling from
    /// the wire opportunistically. Never blocks.
    pub fn peek(&mut self, want: usize) -> Result<&[u8], TransportError> {
        while self.rx.len() < want {
            match self.fill() {
                Ok(0) => break,
                Ok(_) => {}
                // Closed with buffered bytes still readable: serve those.
                Err(TransportError::Closed) if !self.rx.is_empty() => break,
                Err(err) => return Err(err),
            }
        }
        Ok(&self.rx[..self.rx.len().min(want)])
    }

    /// Read exactly `buf.len()` bytes, suspending on would-block until the
    /// timeout trips.
    ///
    /// With `require_first`, returns `Ok(0)` immediately when not even one
    /// byte is available; callers use this to poll without committing.
    pub fn recv_all(&mut self, buf: &mut [u8], require_first: bool) -> Result<usize, NetError> {
        if require_first && self.rx.is_empty() {
            match self.fill() {
                Ok(_) => {}
                Err(TransportError::WouldBlock) => return Ok(0),
                Err(err) => return Err(err.into()),
            }
            if self.rx.is_empty() {
                return Ok(0);
            }
        }

        let mut got = 0;
        let mut last_progress = Instant::now();
        while got < buf.len() {
            if !self.rx.is_empty() {
                let n = (buf.len() - got).min(self.rx.len());
                buf[got..got + n].copy_from_slice(&self.rx[..n]);
                self.rx.drain(..n);
                got += n;
                last_progress = Instant::now();
                continue;
            }
            match self.fill() {
                Ok(0) => {
                    if last_progress.elapsed() > self.config.timeout {
                        return Err(NetError::Timeout(self.config.timeout));
                    }
                    (self.yield_hook)();
                }
                Ok(_) => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.bytes_received += got as u64;
        Ok(got)
    }

    /// Read and discard `n` bytes (skipping unknown packet payloads).
    pub fn discard(&mut self, mut n: usize) -> Result<(), NetError> {
        let mut scratch = [0u8; 256];
        while n > 0 {
            let take = n.min(scratch.len());
            self.recv_all(&mut scratch[..take], false)?;
            n -= take;
        }
        Ok(())
    }

    /// Send all of `data`, suspending on would-block. While blocked, stale
    /// movement packets are drained from the read side so a slow send
    /// cannot let the receive queue grow without bound.
    pub fn send_all(&mut self, data: &[u8]) -> Result<(), NetError> {
        let mut sent = 0;
        let mut last_progress = Instant::now();
        while sent < data.len() {
            match self.transport.send(&data[sent..]) {
                Ok(n) => {
                    sent += n;
                    last_progress = Instant::now();
                }
                Err(TransportError::WouldBlock) => {
                    if last_progress.elapsed() > self.config.timeout {
                        return Err(NetError::Timeout(self.config.timeout));
                    }
                    self.drain_stale_movement();
                    (self.yield_hook)();
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Begin batching writes for one or more packets.
    pub fn packet_start(&mut self) {
        self.tx.clear();
    }

    /// Append bytes to the current batch, flushing early when full.
    pub fn packet_write(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        if self.tx.len() + bytes.len() > self.config.packet_buf_len {
            self.packet_flush_continue()?;
        }
        if bytes.len() >= self.config.packet_buf_len {
            // Oversized payloads skip the batch entirely.
            return self.send_all(bytes);
        }
        self.tx.extend_from_slice(bytes);
        Ok(())
    }

    /// Send the batch but keep batching.
    pub fn packet_flush_continue(&mut self) -> Result<(), NetError> {
        if self.tx.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut self.tx);
        let result = self.send_all(&data);
        self.tx = data;
        self.tx.clear();
        result
    }

    /// Send the batch and end batching.
    pub fn packet_flush(&mut self) -> Result<(), NetError> {
        self.packet_flush_continue()
    }

    /// Frame and enqueue one packet payload (id + fields).
    pub fn write_packet(&mut self, payload: &[u8]) -> Result<(), NetError> {
        let mut header = Writer::new();
        header.varint(payload.len() as i32);
        self.packet_write(header.as_slice())?;
        self.packet_write(payload)
    }

    /// Read one length-prefixed packet payload.
    ///
    /// With `require_first`, `Ok(None)` means nothing was waiting. The
    /// length prefix is bounded by the read-buffer capacity.
    pub fn read_packet(&mut self, require_first: bool) -> Result<Option<Vec<u8>>, NetError> {
        let mut length = 0u32;
        let mut byte = [0u8; 1];
        for i in 0..5 {
            let first = require_first && i == 0;
            if self.recv_all(&mut byte, first)? == 0 {
                return Ok(None);
            }
            length |= ((byte[0] & 0x7F) as u32) << (7 * i);
            if byte[0] & 0x80 == 0 {
                break;
            }
            if i == 4 {
                return Err(CodecError::MalformedVarint.into());
            }
        }

        let length = length as usize;
        if length == 0 {
            return Err(CodecError::ShortRead.into());
        }
        if length > self.config.max_recv_len {
            return Err(CodecError::OversizedLength {
                len: length,
                limit: self.config.max_recv_len,
            }
            .into());
        }

        let mut payload = vec![0u8; length];
        self.recv_all(&mut payload, false)?;
        trace!(len = length, "packet received");
        Ok(Some(payload))
    }

    /// Discard buffered movement packets that have a newer movement packet
    /// behind them.
    ///
    /// Invariants: the most recent movement packet always survives,
    /// non-movement packets are never touched, and nothing is consumed
    /// past a packet boundary.
    fn drain_stale_movement(&mut self) {
        // Opportunistically buffer whatever the wire has.
        loop {
            match self.fill() {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }

        loop {
            // Header of the front packet.
            let Some((first_len, first_header)) = Self::packet_header(&self.rx) else {
                return;
            };
            let Some(first_id) = Self::packet_id(&self.rx[first_header..]) else {
                return;
            };
            if !(MOVEMENT_ID_MIN..=MOVEMENT_ID_MAX).contains(&first_id) {
                return;
            }
            let total = first_header + first_len;
            if self.rx.len() < total {
                // Front packet not fully buffered; it may be the newest.
                return;
            }

            // Only drop when the next packet is also a movement packet.
            let rest = &self.rx[total..];
            let Some((_, next_header)) = Self::packet_header(rest) else {
                return;
            };
            let Some(next_id) = Self::packet_id(&rest[next_header..]) else {
                return;
            };
            if !(MOVEMENT_ID_MIN..=MOVEMENT_ID_MAX).contains(&next_id) {
                return;
            }

            debug!(id = format_args!("{first_id:#04x}"), "dropping stale movement packet");
            self.rx.drain(..total);
        }
    }

    /// Parse a packet length prefix: `(payload_len, header_width)`.
    fn packet_header(buf: &[u8]) -> Option<(usize, usize)> {
        match peek_varint(buf) {
            Ok(Some((len, width))) if len > 0 => Some((len as usize, width)),
            _ => None,
        }
    }

    /// Parse the packet id varint at the start of a payload.
    fn packet_id(buf: &[u8]) -> Option<i32> {
        match peek_varint(buf) {
            Ok(Some((id, _))) => Some(id),
            _ => None,
        }
    }

    /// Best-effort write used on the disconnect path; errors are ignored.
    pub fn send_best_effort(&mut self, payload: &[u8]) {
        let mut framed = Writer::new();
        framed.varint(payload.len() as i32);
        framed.raw(payload);
        let _ = self.transport.send(framed.as_slice());
    }

    pub fn shutdown(&mut self) {
        self.transport.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mem::MemTransport;

    fn conn() -> FramedConn<MemTransport> {
        FramedConn::new(
            MemTransport::new(),
            FramingConfig {
                timeout: Duration::from_millis(50),
                ..FramingConfig::default()
            },
        )
    }

    /// Frame a payload the way a client would.
    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut w = Writer::new();
        w.varint(payload.len() as i32);
        w.raw(payload);
        w.into_inner()
    }

    /// A movement packet with the given id and filler body.
    fn movement_packet(id: i32, filler: u8) -> Vec<u8> {
        let mut w = Writer::new();
        w.varint(id);
        w.raw(&[filler; 25]);
        frame(w.as_slice())
    }

    #[test]
    fn read_packet_returns_payloads_in_order() {
        let mut conn = conn();
        conn.transport_mut().push_inbound(&frame(&[0x10, 1, 2]));
        conn.transport_mut().push_inbound(&frame(&[0x11, 3]));
        assert_eq!(conn.read_packet(true).unwrap().unwrap(), vec![0x10, 1, 2]);
        assert_eq!(conn.read_packet(true).unwrap().unwrap(), vec![0x11, 3]);
        assert!(conn.read_packet(true).unwrap().is_none());
    }

    #[test]
    fn require_first_polls_without_blocking() {
        let mut conn = conn();
        assert!(conn.read_packet(true).unwrap().is_none());
        // Without require_first an empty wire times out instead.
        let mut byte = [0u8; 1];
        assert!(matches!(
            conn.recv_all(&mut byte, false),
            Err(NetError::Timeout(_))
        ));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut conn = conn();
        let mut w = Writer::new();
        w.varint(100_000);
        conn.transport_mut().push_inbound(w.as_slice());
        assert!(matches!(
            conn.read_packet(true),
            Err(NetError::Codec(CodecError::OversizedLength { .. }))
        ));
    }

    #[test]
    fn batched_writes_equal_direct_bytes() {
        // The same packets through the batch buffer and raw concatenation
        // must be byte-identical.
        let payloads: &[&[u8]] = &[&[0x01, 0xAA], &[0x02], &[0x03, 1, 2, 3, 4]];

        let mut conn = conn();
        conn.packet_start();
        for p in payloads {
            conn.write_packet(p).unwrap();
        }
        conn.packet_flush().unwrap();

        let mut direct = Vec::new();
        for p in payloads {
            direct.extend_from_slice(&frame(p));
        }
        assert_eq!(conn.transport_mut().outbound(), &direct[..]);
    }

    #[test]
    fn batch_flushes_when_full_and_loses_nothing() {
        let mut conn = FramedConn::new(
            MemTransport::new(),
            FramingConfig {
                packet_buf_len: 32,
                timeout: Duration::from_millis(50),
                ..FramingConfig::default()
            },
        );
        conn.packet_start();
        let mut direct = Vec::new();
        for i in 0..10u8 {
            let payload = [0x30, i, i, i, i, i, i, i];
            conn.write_packet(&payload).unwrap();
            direct.extend_from_slice(&frame(&payload));
        }
        conn.packet_flush().unwrap();
        assert_eq!(conn.transport_mut().outbound(), &direct[..]);
    }

    #[test]
    fn send_all_times_out_without_progress() {
        let mut conn = conn();
        conn.transport_mut().blocked_sends = u32::MAX;
        let err = conn.send_all(b"data").unwrap_err();
        assert!(matches!(err, NetError::Timeout(_)));
    }

    #[test]
    fn stale_drain_keeps_newest_movement_and_the_dig() {
        let mut conn = conn();
        // Three movement packets then a dig, queued behind a blocked send.
        conn.transport_mut().push_inbound(&movement_packet(0x1D, 1));
        conn.transport_mut().push_inbound(&movement_packet(0x1D, 2));
        conn.transport_mut().push_inbound(&movement_packet(0x1D, 3));
        let mut dig = Writer::new();
        dig.varint(0x28);
        dig.raw(&[9, 9, 9]);
        let dig_frame = frame(dig.as_slice());
        conn.transport_mut().push_inbound(&dig_frame);

        conn.transport_mut().blocked_sends = 3;
        conn.send_all(b"slow outbound data").unwrap();

        // The parser now sees exactly one movement packet (the third) and
        // then the dig packet.
        let first = conn.read_packet(true).unwrap().unwrap();
        assert_eq!(first[0], 0x1D);
        assert_eq!(first[1], 3, "only the newest movement packet survives");
        let second = conn.read_packet(true).unwrap().unwrap();
        assert_eq!(second[0], 0x28);
        assert!(conn.read_packet(true).unwrap().is_none());
    }

    #[test]
    fn stale_drain_never_touches_non_movement_packets() {
        let mut conn = conn();
        let mut chat = Writer::new();
        chat.varint(0x08);
        chat.raw(b"hello");
        conn.transport_mut().push_inbound(&frame(chat.as_slice()));
        conn.transport_mut().push_inbound(&movement_packet(0x1E, 7));

        conn.transport_mut().blocked_sends = 2;
        conn.send_all(b"out").unwrap();

        let first = conn.read_packet(true).unwrap().unwrap();
        assert_eq!(first[0], 0x08);
        let second = conn.read_packet(true).unwrap().unwrap();
        assert_eq!(second[0], 0x1E);
    }

    #[test]
    fn stale_drain_keeps_a_lone_movement_packet() {
        let mut conn = conn();
        conn.transport_mut().push_inbound(&movement_packet(0x1F, 5));
        conn.transport_mut().blocked_sends = 2;
        conn.send_all(b"out").unwrap();
        let only = conn.read_packet(true).unwrap().unwrap();
        assert_eq!(only[0], 0x1F);
    }

    #[test]
    fn stale_drain_stops_at_incomplete_boundaries() {
        let mut conn = conn();
        conn.transport_mut().push_inbound(&movement_packet(0x1D, 1));
        // A second movement packet, cut off mid-body.
        let partial = movement_packet(0x1D, 2);
        conn.transport_mut().push_inbound(&partial[..8]);

        conn.transport_mut().blocked_sends = 1;
        conn.send_all(b"out").unwrap();

        // The first packet was droppable (a newer movement header is
        // visible); the partial one must remain untouched.
        let remaining = conn.peek(4096).unwrap().to_vec();
        assert_eq!(&remaining[..], &partial[..8]);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut conn = conn();
        conn.transport_mut().push_inbound(&frame(&[0x42, 1]));
        let peeked = conn.peek(3).unwrap().to_vec();
        assert_eq!(peeked, vec![2, 0x42, 1]);
        let packet = conn.read_packet(true).unwrap().unwrap();
        assert_eq!(packet, vec![0x42, 1]);
    }

    #[test]
    fn discard_skips_exactly_n_bytes() {
        let mut conn = conn();
        conn.transport_mut().push_inbound(&[1, 2, 3, 4, 5]);
        conn.discard(3).unwrap();
        let mut rest = [0u8; 2];
        conn.recv_all(&mut rest, false).unwrap();
        assert_eq!(rest, [4, 5]);
    }

    #[test]
    fn recv_all_reports_close() {
        let mut conn = conn();
        conn.transport_mut().push_inbound(&[1]);
        conn.transport_mut().close();
        let mut buf = [0u8; 4];
        assert!(matches!(
            conn.recv_all(&mut buf, false),
            Err(NetError::Transport(TransportError::Closed))
        ));
    }
}
