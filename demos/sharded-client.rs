// Volley - A buffered, shardable Statsd client for Rust!
//
// To the extent possible under law, the author(s) have dedicated all copyright and
// related and neighboring rights to this file to the public domain worldwide.
// This software is distributed without any warranty.
//
// You should have received a copy of the CC0 Public Domain Dedication along with this
// software. If not, see <http://creativecommons.org/publicdomain/zero/1.0/>.

// This example shows how to spread metrics from many threads over several
// clients, each with its own socket and buffer, so that threads don't all
// contend on a single lock.

use std::sync::Arc;
use std::thread;
use volley::prelude::*;
use volley::{Shards, StatsdClient};

const WORKERS: usize = 8;

fn main() {
    let client = StatsdClient::builder("localhost:8125")
        .with_namespace("example.sharded.")
        .with_buffered_stats(20)
        .build()
        .unwrap();

    let shards = Arc::new(Shards::new(client, WORKERS).unwrap());

    let threads: Vec<_> = (0..WORKERS)
        .map(|id| {
            let shards = Arc::clone(&shards);
            thread::spawn(move || {
                let metrics = shards.shard(id);
                for i in 0..1000u64 {
                    let _ = metrics.count("requests.handled", 1);
                    let _ = metrics.time("requests.latency", i % 50);
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }

    // Stats for the same user always go through the same client
    shards.shard_for("user-1234").incr("logins").unwrap();

    shards.close_all().unwrap();
    for (id, client) in shards.iter().enumerate() {
        println!("shard {}: {:?}", id, client.stats());
    }
}
