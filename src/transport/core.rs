// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::types::MetricResult;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of I/O telemetry for a single connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
    /// Stats discarded because a bounded queue was full.
    pub stats_dropped: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SocketStats {
    bytes_sent: Arc<AtomicU64>,
    packets_sent: Arc<AtomicU64>,
    bytes_dropped: Arc<AtomicU64>,
    packets_dropped: Arc<AtomicU64>,
    stats_dropped: Arc<AtomicU64>,
}

impl SocketStats {
    pub(crate) fn incr_bytes_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr_packets_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_bytes_dropped(&self, n: u64) {
        self.bytes_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr_packets_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_stats_dropped(&self) {
        self.stats_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn update(&self, res: io::Result<usize>, len: usize) -> io::Result<usize> {
        match res {
            Ok(written) => {
                self.incr_bytes_sent(written as u64);
                self.incr_packets_sent();
                Ok(written)
            }
            Err(e) => {
                self.incr_bytes_dropped(len as u64);
                self.incr_packets_dropped();
                Err(e)
            }
        }
    }
}

impl From<&SocketStats> for TransportStats {
    fn from(stats: &SocketStats) -> Self {
        TransportStats {
            bytes_sent: stats.bytes_sent.load(Ordering::Relaxed),
            packets_sent: stats.packets_sent.load(Ordering::Relaxed),
            bytes_dropped: stats.bytes_dropped.load(Ordering::Relaxed),
            packets_dropped: stats.packets_dropped.load(Ordering::Relaxed),
            stats_dropped: stats.stats_dropped.load(Ordering::Relaxed),
        }
    }
}

/// A single owned socket handle that packets are written to.
///
/// Each call to `write` must send the given bytes as one datagram, in the
/// thread of the caller, without retrying. Implementations are expected to
/// be non-blocking so that a slow or missing server never stalls callers.
///
/// A packet is one or more stats in the canonical Statsd format, joined by
/// newlines, for example:
///
/// ``` text
/// some.counter:123|c
/// some.timer:456|ms
/// some.gauge:5|g|#host:web01
/// ```
pub trait Transport: Send {
    /// Send the packet and return the number of bytes written or an I/O
    /// error.
    fn write(&mut self, packet: &[u8]) -> io::Result<usize>;
}

/// Factory for transports that all send to the same destination.
///
/// A dialer is shared (via `Arc`) between a connection and every clone of
/// it. Each call to `dial` must return a brand new transport with its own
/// socket: clones never share socket state. Destinations given by hostname
/// should be resolved again on each call.
pub trait Dialer: Send + Sync {
    /// Open a new transport to the destination.
    ///
    /// # Failures
    ///
    /// Returns an `ErrorKind::Configuration` error when the destination
    /// can't be resolved or a socket can't be opened.
    fn dial(&self) -> MetricResult<Box<dyn Transport>>;
}

/// Implementation of a `Dialer` for transports that discard all packets.
///
/// Useful for disabling metric collection or unit tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopDialer;

#[derive(Debug)]
struct NopTransport;

impl Transport for NopTransport {
    fn write(&mut self, packet: &[u8]) -> io::Result<usize> {
        Ok(packet.len())
    }
}

impl Dialer for NopDialer {
    fn dial(&self) -> MetricResult<Box<dyn Transport>> {
        Ok(Box::new(NopTransport))
    }
}
