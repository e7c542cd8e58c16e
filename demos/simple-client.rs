// Volley - A buffered, shardable Statsd client for Rust!
//
// To the extent possible under law, the author(s) have dedicated all copyright and
// related and neighboring rights to this file to the public domain worldwide.
// This software is distributed without any warranty.
//
// You should have received a copy of the CC0 Public Domain Dedication along with this
// software. If not, see <http://creativecommons.org/publicdomain/zero/1.0/>.

// This example shows the simplest way to use the Volley client: connect to
// a local Statsd server, send a few metrics, and close the client so that
// anything still buffered is written out.

use std::time::Duration;
use volley::prelude::*;
use volley::StatsdClient;

fn main() {
    let metrics = StatsdClient::builder("localhost:8125")
        .with_namespace("example.prefix.")
        .with_tag("env", "dev")
        .build()
        .unwrap();

    metrics.count("example.counter", 1).unwrap();
    metrics.gauge("example.gauge", 5u64).unwrap();
    metrics.time("example.timer", Duration::from_millis(32)).unwrap();
    metrics.histogram("example.histogram", 22).unwrap();
    metrics.distribution("example.distribution", 33).unwrap();
    metrics.set("example.set", 8i64).unwrap();

    metrics
        .count_with_tags("example.tagged", 1)
        .with_tag("region", "us-east-1")
        .with_sample_rate(0.5)
        .send();

    metrics.close().unwrap();
    println!("sent: {:?}", metrics.stats());
}
