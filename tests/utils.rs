use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use volley::prelude::*;
use volley::StatsdClient;

#[allow(dead_code)]
pub const NUM_THREADS: u64 = 10;

#[allow(dead_code)]
pub const NUM_ITERATIONS: u64 = 1000;

/// Each iteration of `run_arc_threaded_test` sends this many stats.
#[allow(dead_code)]
pub const STATS_PER_ITERATION: u64 = 7;

#[allow(dead_code)]
pub fn run_arc_threaded_test(client: StatsdClient, num_threads: u64, iterations: u64) -> StatsdClient {
    let shared_client = Arc::new(client);

    let threads: Vec<_> = (0..num_threads)
        .map(|_| {
            let local_client = Arc::clone(&shared_client);

            thread::spawn(move || {
                for i in 0..iterations {
                    local_client.count("some.counter", i as i64).unwrap();
                    local_client.time("some.timer", i).unwrap();
                    local_client.gauge("some.gauge", i).unwrap();
                    local_client.gauge("some.gauge", i as f64).unwrap();
                    local_client.histogram("some.histogram", i).unwrap();
                    local_client.distribution("some.distribution", i).unwrap();
                    local_client.set("some.set", i as i64).unwrap();
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }

    match Arc::try_unwrap(shared_client) {
        Ok(client) => client,
        Err(_) => panic!("client still shared after joining all threads"),
    }
}

/// A single stat parsed back out of its wire form.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStat {
    pub name: String,
    pub value: String,
    pub suffix: String,
    pub rate: Option<f64>,
    pub tags: Vec<String>,
}

/// Parse `name:value|suffix[|@rate][|#tag,...]`.
///
/// Assumes the name has no `:` and that no part contains `|`.
#[allow(dead_code)]
pub fn parse_stat(stat: &str) -> Option<ParsedStat> {
    let (name, rest) = stat.split_once(':')?;
    let mut parts = rest.split('|');
    let value = parts.next()?;
    let suffix = parts.next()?;

    let mut rate = None;
    let mut tags = Vec::new();
    for part in parts {
        if let Some(r) = part.strip_prefix('@') {
            rate = Some(r.parse().ok()?);
        } else if let Some(t) = part.strip_prefix('#') {
            tags = t.split(',').map(str::to_owned).collect();
        } else {
            return None;
        }
    }

    Some(ParsedStat {
        name: name.to_owned(),
        value: value.to_owned(),
        suffix: suffix.to_owned(),
        rate,
        tags,
    })
}

/// Split a packet into its newline separated stats.
#[allow(dead_code)]
pub fn split_packet(packet: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(packet).split('\n').map(str::to_owned).collect()
}

/// Total number of stats in every packet received so far.
#[allow(dead_code)]
pub fn count_stats(rx: &Receiver<Vec<u8>>) -> usize {
    rx.try_iter().map(|p| split_packet(&p).len()).sum()
}

/// Receive packets until `expected` stats have arrived or the timeout
/// passes, for transports where packets arrive asynchronously.
#[allow(dead_code)]
pub fn recv_stats(rx: &Receiver<Vec<u8>>, expected: usize, timeout: Duration) -> Vec<String> {
    let mut stats = Vec::new();
    while stats.len() < expected {
        match rx.recv_timeout(timeout) {
            Ok(packet) => stats.extend(split_packet(&packet)),
            Err(_) => break,
        }
    }
    stats
}
