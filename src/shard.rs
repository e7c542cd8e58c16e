// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::client::StatsdClient;
use crate::types::{ErrorKind, MetricError, MetricResult};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::slice;

/// Fixed set of independent clients, one per shard.
///
/// Each shard is a clone of the client given to `Shards::new` with its own
/// socket and buffer, so threads that stick to different shards never
/// contend on a lock. Pick a shard by numeric id (for example a worker
/// thread index) or by hashing a key.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use volley::prelude::*;
/// use volley::{Shards, SpyDialer, StatsdClient};
///
/// let (rx, dialer) = SpyDialer::new();
/// let client = StatsdClient::builder_with_dialer(dialer).build().unwrap();
/// let shards = Arc::new(Shards::new(client, 4).unwrap());
///
/// let threads: Vec<_> = (0..4)
///     .map(|id| {
///         let shards = Arc::clone(&shards);
///         thread::spawn(move || {
///             for _ in 0..10 {
///                 shards.shard(id).incr("requests").unwrap();
///             }
///         })
///     })
///     .collect();
///
/// for t in threads {
///     t.join().unwrap();
/// }
///
/// shards.close_all().unwrap();
/// let stats: usize = rx.try_iter().map(|p| p.split(|b| *b == b'\n').count()).sum();
/// assert_eq!(40, stats);
/// ```
#[derive(Debug)]
pub struct Shards {
    clients: Vec<StatsdClient>,
}

impl Shards {
    /// Build `count` shards: the given client followed by `count - 1` clones.
    ///
    /// # Failures
    ///
    /// * `ErrorKind::Configuration` if `count` is zero or a clone can't be
    ///   dialed.
    /// * `ErrorKind::Closed` if the client has been closed.
    pub fn new(client: StatsdClient, count: usize) -> MetricResult<Shards> {
        if count == 0 {
            return Err(MetricError::from((ErrorKind::Configuration, "shard count must be at least 1")));
        }

        let mut clients = Vec::with_capacity(count);
        for _ in 1..count {
            clients.push(client.try_clone()?);
        }
        clients.insert(0, client);

        tracing::debug!(shards = count, "created sharded clients");
        Ok(Shards { clients })
    }

    /// Client for the given shard id, wrapping around the number of shards.
    pub fn shard(&self, id: usize) -> &StatsdClient {
        &self.clients[id % self.clients.len()]
    }

    /// Client for the shard a key hashes to. The same key always maps to
    /// the same shard within a process.
    pub fn shard_for<K>(&self, key: &K) -> &StatsdClient
    where
        K: Hash + ?Sized,
    {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.shard((hasher.finish() % self.clients.len() as u64) as usize)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, StatsdClient> {
        self.clients.iter()
    }

    /// Flush every shard, returning the first error after trying them all.
    pub fn flush_all(&self) -> MetricResult<()> {
        self.each(StatsdClient::flush)
    }

    /// Close every shard, returning the first error after trying them all.
    pub fn close_all(&self) -> MetricResult<()> {
        self.each(StatsdClient::close)
    }

    fn each<F>(&self, op: F) -> MetricResult<()>
    where
        F: Fn(&StatsdClient) -> MetricResult<()>,
    {
        self.clients.iter().map(op).fold(Ok(()), |acc, res| acc.and(res))
    }
}

impl<'a> IntoIterator for &'a Shards {
    type Item = &'a StatsdClient;
    type IntoIter = slice::Iter<'a, StatsdClient>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
