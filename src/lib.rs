// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A buffered, shardable Statsd client for Rust!
//!
//! Volley turns counters, timers, gauges, histograms, distributions and sets
//! into the Statsd text format, collects them into packets of many stats each
//! and sends them over UDP or Unix datagram sockets.
//!
//! ## Features
//!
//! * Batching of stats into packets up to a configurable size, flushed when
//!   full, after a number of stats, on a timer, or on demand.
//! * [Datadog](https://docs.datadoghq.com/developers/dogstatsd/) style tags,
//!   global and per metric, and a global namespace.
//! * Client side sampling with a pluggable `Sampler`.
//! * Cheap independent clones and `Shards` so that busy threads never
//!   contend on a single buffer.
//! * An optional queue and worker thread so that senders only ever copy a
//!   stat into a channel.
//!
//! ## Usage
//!
//! ### Simple Use
//!
//! Create a client for a server, send some metrics and close the client to
//! flush anything still buffered.
//!
//! ```rust,no_run
//! use volley::prelude::*;
//! use volley::{StatsdClient, DEFAULT_PORT};
//!
//! // Note that you'll probably want to actually handle any errors creating
//! // the client when you use it for real in your application. We're just
//! // using .unwrap() here since this is an example!
//! let client = StatsdClient::builder(&format!("metrics.example.com:{}", DEFAULT_PORT))
//!     .with_namespace("my.metrics.")
//!     .build()
//!     .unwrap();
//!
//! // Emit metrics!
//! client.incr("some.counter").unwrap();
//! client.time("some.methodCall", 42).unwrap();
//! client.gauge("some.thing", 7u64).unwrap();
//! client.histogram("some.value", 5).unwrap();
//!
//! client.close().unwrap();
//! ```
//!
//! ### Tags
//!
//! ```rust,no_run
//! use volley::prelude::*;
//! use volley::StatsdClient;
//!
//! let client = StatsdClient::builder("localhost:8125")
//!     .with_tag("env", "prod")
//!     .build()
//!     .unwrap();
//!
//! client.count_with_tags("requests", 1)
//!     .with_tag("path", "/login")
//!     .with_tag_value("beta")
//!     .send();
//! ```
//!
//! Tags are written as given. They are not escaped, so a tag containing a
//! `,`, `|`, `#` or newline will corrupt the stat it belongs to.
//!
//! ### Sharding
//!
//! A single client can be shared between threads, but every thread then
//! contends on one buffer. `StatsdClient::try_clone` creates an independent
//! client with its own socket and buffer, and `Shards` holds a fixed set of
//! them.
//!
//! ```rust,no_run
//! use volley::prelude::*;
//! use volley::{Shards, StatsdClient};
//!
//! let client = StatsdClient::connect("localhost:8125").unwrap();
//! let shards = Shards::new(client, 8).unwrap();
//!
//! shards.shard_for("user-1234").incr("logins").unwrap();
//! shards.close_all().unwrap();
//! ```
//!
//! ### Unix Sockets
//!
//! Destinations starting with `unix://`, `unixgram://` or `/` are sent to a
//! Unix datagram socket. Sending on a socket that doesn't exist or is not
//! being listened to results in an error for each packet, which is logged
//! and counted in `TransportStats`.
//!
//! NOTE: Unix sockets are only available on Unix platforms (Linux, BSD, MacOS).
//!
//! ## Logging
//!
//! Volley emits [`tracing`](https://docs.rs/tracing) events for connection
//! lifecycle (debug), each written packet (trace) and failures that can't be
//! returned to a caller (warn). It never installs a subscriber.

#![forbid(unsafe_code)]

pub const DEFAULT_PORT: u16 = 8125;

pub use self::builder::MetricBuilder;

pub use self::client::{
    Counted, CountedExt, Distributed, Gauged, Histogrammed, MetricClient, Setted, StatsdClient, StatsdClientBuilder,
    Timed,
};

pub use self::format::{format_stat, MetricType};

pub use self::sampler::{Sampler, SeededSampler, ThreadRngSampler};

pub use self::shard::Shards;

pub use self::transport::{Destination, Dialer, NopDialer, SpyDialer, Transport, TransportStats, UdpDialer};

pub use self::types::{ErrorKind, MetricError, MetricResult};

pub use self::value::MetricValue;

mod buffer;
mod builder;
mod client;
mod compose;
mod connection;
pub mod ext;
mod flush;
mod format;
pub mod prelude;
mod sampler;
mod shard;
mod transport;
mod types;
mod value;


// Dialer for sending metrics over Unix datagram sockets
#[cfg(unix)]
pub use crate::transport::UnixDialer;
