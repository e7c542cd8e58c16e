// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2020-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::transport::core::{Dialer, Transport};
use crate::types::MetricResult;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::io;

/// `Dialer` implementation whose transports write every packet to the
/// `Sender` half of a channel while callers are given ownership of the
/// `Receiver` half.
///
/// This is not a general purpose dialer, rather it's meant for verifying
/// packets written during the course of integration tests. Every transport
/// dialed (including those for cloned clients) writes to the same channel,
/// so a single receiver observes the packets of all clones. By default the
/// channel is unbounded. The channel size can be limited using the
/// `with_capacity` method.
#[derive(Debug, Clone)]
pub struct SpyDialer {
    sender: Sender<Vec<u8>>,
}

impl SpyDialer {
    pub fn new() -> (Receiver<Vec<u8>>, Self) {
        Self::with_queue_capacity(None)
    }

    pub fn with_capacity(queue: usize) -> (Receiver<Vec<u8>>, Self) {
        Self::with_queue_capacity(Some(queue))
    }

    fn with_queue_capacity(queue: Option<usize>) -> (Receiver<Vec<u8>>, Self) {
        let (tx, rx) = match queue {
            Some(sz) => bounded(sz),
            None => unbounded(),
        };
        (rx, SpyDialer { sender: tx })
    }
}

impl Dialer for SpyDialer {
    fn dial(&self) -> MetricResult<Box<dyn Transport>> {
        Ok(Box::new(SpyTransport {
            sender: self.sender.clone(),
        }))
    }
}

#[derive(Debug)]
struct SpyTransport {
    sender: Sender<Vec<u8>>,
}

impl Transport for SpyTransport {
    fn write(&mut self, packet: &[u8]) -> io::Result<usize> {
        match self.sender.try_send(packet.to_vec()) {
            Err(TrySendError::Disconnected(_)) => Err(io::Error::new(io::ErrorKind::Other, "channel disconnected")),
            Err(TrySendError::Full(_)) => Err(io::Error::new(io::ErrorKind::Other, "channel full")),
            Ok(_) => Ok(packet.len()),
        }
    }
}
