// Volley - A buffered, shardable Statsd client for Rust!
//
// To the extent possible under law, the author(s) have dedicated all copyright and
// related and neighboring rights to this file to the public domain worldwide.
// This software is distributed without any warranty.
//
// You should have received a copy of the CC0 Public Domain Dedication along with this
// software. If not, see <http://creativecommons.org/publicdomain/zero/1.0/>.

// This example shows how you might configure the Volley client for maximum
// isolation. Stats are handed to a background thread through a bounded queue
// so sending never waits on the network. When the queue is full new stats are
// dropped and counted instead of blocking the caller.

use std::time::Duration;
use volley::prelude::*;
use volley::{MetricError, StatsdClient};

fn main() {
    let metrics = StatsdClient::builder("udp://localhost:8125")
        .with_namespace("example.queued.")
        .with_queue(Some(4096))
        .with_flush_interval(Duration::from_millis(250))
        .with_error_handler(|err: MetricError| eprintln!("metric error: {}", err))
        .build()
        .unwrap();

    for i in 0..10_000u64 {
        metrics.incr("loop.iteration").unwrap();
        metrics.gauge("loop.position", i).unwrap();
    }

    metrics.flush().unwrap();
    metrics.close().unwrap();

    let stats = metrics.stats();
    println!(
        "packets sent: {}, stats dropped: {}",
        stats.packets_sent, stats.stats_dropped
    );
}
