// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::buffer::SendBuffer;
use crate::transport::{SocketStats, Transport};
use crate::types::{ErrorKind, MetricError, MetricResult};
use std::fmt;

/// Observable state of a `FlushEngine`.
///
/// Flushing is transient: it only exists while the engine is borrowed
/// mutably for a write and is never observed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushState {
    Idle,
    Accumulating,
    Closed,
}

/// Owns one send buffer and one transport and decides when buffered stats
/// are written.
///
/// Every write resets the buffer whether it succeeded or not. Packets are
/// never retried.
pub(crate) struct FlushEngine {
    buffer: SendBuffer,
    transport: Option<Box<dyn Transport>>,
    max_stats: Option<usize>,
    stats: SocketStats,
}

impl FlushEngine {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        max_packet_size: usize,
        max_stats: Option<usize>,
        stats: SocketStats,
    ) -> Self {
        FlushEngine {
            buffer: SendBuffer::new(max_packet_size),
            transport: Some(transport),
            max_stats,
            stats,
        }
    }

    pub(crate) fn state(&self) -> FlushState {
        if self.transport.is_none() {
            FlushState::Closed
        } else if self.buffer.is_empty() {
            FlushState::Idle
        } else {
            FlushState::Accumulating
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// Number of stats waiting in the buffer.
    pub(crate) fn pending(&self) -> usize {
        self.buffer.stat_count()
    }

    /// Accept one formatted stat.
    ///
    /// Content already buffered is flushed first if the stat doesn't fit.
    /// A stat larger than the whole buffer is written alone as its own
    /// packet. The buffer is flushed once it holds `max_stats` stats.
    ///
    /// Any write failure is returned after the stat has been handled, so a
    /// failed flush of earlier content never loses the new stat.
    pub(crate) fn submit(&mut self, stat: &[u8]) -> MetricResult<()> {
        if self.is_closed() {
            return Err(MetricError::closed());
        }

        if stat.len() > self.buffer.capacity() {
            let flushed = self.flush();
            let written = self.write_oversized(stat);
            return flushed.and(written);
        }

        let flushed = if self.buffer.would_overflow(stat.len()) {
            self.flush()
        } else {
            Ok(())
        };

        self.buffer.append(stat);

        let limited = match self.max_stats {
            Some(max) if self.buffer.stat_count() >= max => self.flush(),
            _ => Ok(()),
        };

        flushed.and(limited)
    }

    /// Write buffered content, if any, as a single packet.
    pub(crate) fn flush(&mut self) -> MetricResult<()> {
        let transport = match self.transport.as_mut() {
            Some(t) => t,
            None => return Err(MetricError::closed()),
        };

        if self.buffer.is_empty() {
            return Ok(());
        }

        let len = self.buffer.len();
        let count = self.buffer.stat_count();
        let res = self.stats.update(transport.write(self.buffer.as_bytes()), len);
        self.buffer.reset();

        tracing::trace!(bytes = len, stats = count, ok = res.is_ok(), "flushed packet");
        res.map(|_| ())
            .map_err(|e| MetricError::io(ErrorKind::Transmission, "failed to write packet", e))
    }

    /// Drain the buffer and release the transport. Closing twice is a no-op.
    pub(crate) fn close(&mut self) -> MetricResult<()> {
        if self.is_closed() {
            return Ok(());
        }

        let res = self.flush();
        self.transport = None;
        res
    }

    fn write_oversized(&mut self, stat: &[u8]) -> MetricResult<()> {
        let transport = match self.transport.as_mut() {
            Some(t) => t,
            None => return Err(MetricError::closed()),
        };

        tracing::trace!(bytes = stat.len(), "writing oversized stat alone");
        self.stats
            .update(transport.write(stat), stat.len())
            .map(|_| ())
            .map_err(|e| MetricError::io(ErrorKind::Transmission, "failed to write packet", e))
    }
}

impl fmt::Debug for FlushEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushEngine")
            .field("buffer", &self.buffer)
            .field("pending", &self.pending())
            .field("max_stats", &self.max_stats)
            .field("state", &self.state())
            .finish()
    }
}
