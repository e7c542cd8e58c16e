// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::builder::MetricBuilder;
use crate::compose::{global_tag, Composer};
use crate::connection::{BufferSettings, Connection, Delivery};
use crate::format::{MetricType, StatFormatter};
use crate::sampler::{Sampler, ThreadRngSampler};
use crate::transport::{Destination, Dialer, TransportStats};
use crate::types::{ErrorKind, MetricError, MetricResult};
use crate::value::{
    MetricValue, ToCounterValue, ToDistributionValue, ToGaugeValue, ToHistogramValue, ToSetValue, ToTimerValue,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Trait for incrementing and decrementing counters.
///
/// Counters are simple values incremented or decremented by a client. The
/// rates at which these events occur or average values will be determined
/// by the server receiving them. Examples of counter uses include number
/// of logins to a system or requests received.
///
/// The following types are valid for counters:
/// * `i64`
pub trait Counted<T>
where
    T: ToCounterValue,
{
    /// Increment or decrement the counter by the given amount
    fn count(&self, key: &str, count: T) -> MetricResult<()> {
        self.count_with_tags(key, count).try_send()
    }

    /// Increment or decrement the counter by the given amount and return
    /// a `MetricBuilder` that can be used to add tags to the metric.
    fn count_with_tags<'a>(&'a self, key: &'a str, count: T) -> MetricBuilder<'a, 'a>;
}

/// Trait for convenience methods for counters
///
/// This trait specifically implements increment and decrement convenience
/// methods for counters with `i64` types.
pub trait CountedExt: Counted<i64> {
    /// Increment the counter by 1
    fn incr(&self, key: &str) -> MetricResult<()> {
        self.incr_with_tags(key).try_send()
    }

    /// Increment the counter by 1 and return a `MetricBuilder` that can
    /// be used to add tags to the metric.
    fn incr_with_tags<'a>(&'a self, key: &'a str) -> MetricBuilder<'a, 'a> {
        self.count_with_tags(key, 1)
    }

    /// Decrement the counter by 1
    fn decr(&self, key: &str) -> MetricResult<()> {
        self.decr_with_tags(key).try_send()
    }

    /// Decrement the counter by 1 and return a `MetricBuilder` that can
    /// be used to add tags to the metric.
    fn decr_with_tags<'a>(&'a self, key: &'a str) -> MetricBuilder<'a, 'a> {
        self.count_with_tags(key, -1)
    }
}

/// Trait for recording timings in milliseconds.
///
/// Timings are a positive number of milliseconds between a start and end
/// time. `Duration` values are converted to milliseconds before being
/// recorded.
///
/// The following types are valid for timers:
/// * `u64`
/// * `f64`
/// * `Duration`
pub trait Timed<T>
where
    T: ToTimerValue,
{
    /// Record a timing in milliseconds with the given key
    fn time(&self, key: &str, time: T) -> MetricResult<()> {
        self.time_with_tags(key, time).try_send()
    }

    /// Record a timing in milliseconds with the given key and return a
    /// `MetricBuilder` that can be used to add tags to the metric.
    fn time_with_tags<'a>(&'a self, key: &'a str, time: T) -> MetricBuilder<'a, 'a>;
}

/// Trait for recording gauge values.
///
/// Gauge values are an instantaneous measurement of a value determined
/// by the client. They do not change unless changed by the client. Examples
/// include things like load average or how many connections are active.
///
/// The following types are valid for gauges:
/// * `u64`
/// * `i64`
/// * `f64`
pub trait Gauged<T>
where
    T: ToGaugeValue,
{
    /// Record a gauge value with the given key
    fn gauge(&self, key: &str, value: T) -> MetricResult<()> {
        self.gauge_with_tags(key, value).try_send()
    }

    /// Record a gauge value with the given key and return a `MetricBuilder`
    /// that can be used to add tags to the metric.
    fn gauge_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a>;
}

/// Trait for recording histogram values.
///
/// Histogram values are positive values that can represent anything, whose
/// statistical distribution is calculated by the server. `Duration` values
/// are converted to nanoseconds before being recorded.
///
/// The following types are valid for histograms:
/// * `u64`
/// * `f64`
/// * `Duration`
pub trait Histogrammed<T>
where
    T: ToHistogramValue,
{
    /// Record a single histogram value with the given key
    fn histogram(&self, key: &str, value: T) -> MetricResult<()> {
        self.histogram_with_tags(key, value).try_send()
    }

    /// Record a single histogram value with the given key and return a
    /// `MetricBuilder` that can be used to add tags to the metric.
    fn histogram_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a>;
}

/// Trait for recording distribution values.
///
/// Similar to histograms, but aggregated globally by the server rather
/// than per host.
///
/// The following types are valid for distributions:
/// * `u64`
/// * `f64`
pub trait Distributed<T>
where
    T: ToDistributionValue,
{
    /// Record a single distribution value with the given key
    fn distribution(&self, key: &str, value: T) -> MetricResult<()> {
        self.distribution_with_tags(key, value).try_send()
    }

    /// Record a single distribution value with the given key and return a
    /// `MetricBuilder` that can be used to add tags to the metric.
    fn distribution_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a>;
}

/// Trait for recording set values.
///
/// Sets count the number of unique elements in a group. String members
/// can be recorded with `StatsdClient::set_member`.
///
/// The following types are valid for sets:
/// * `i64`
/// * `u64`
pub trait Setted<T>
where
    T: ToSetValue,
{
    /// Record a single set value with the given key
    fn set(&self, key: &str, value: T) -> MetricResult<()> {
        self.set_with_tags(key, value).try_send()
    }

    /// Record a single set value with the given key and return a
    /// `MetricBuilder` that can be used to add tags to the metric.
    fn set_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a>;
}

/// Trait that encompasses all other traits for sending metrics.
///
/// If you wish to use `StatsdClient` with a generic type or place a
/// `StatsdClient` instance behind a pointer (such as a `Box`) this will allow
/// you to reference all the implemented methods for recording metrics, while
/// using a single trait.
///
/// ```
/// use std::time::Duration;
/// use volley::{MetricClient, StatsdClient, NopDialer};
///
/// let client: Box<dyn MetricClient> = Box::new(
///     StatsdClient::builder_with_dialer(NopDialer).build().unwrap());
///
/// client.count("some.counter", 1).unwrap();
/// client.time("some.timer", 42).unwrap();
/// client.time("some.timer", Duration::from_millis(42)).unwrap();
/// client.gauge("some.gauge", 8u64).unwrap();
/// client.gauge("some.gauge", 0.5).unwrap();
/// client.histogram("some.histogram", 4).unwrap();
/// client.histogram("some.histogram", Duration::from_nanos(4)).unwrap();
/// client.distribution("some.distribution", 4).unwrap();
/// client.set("some.set", 5i64).unwrap();
/// ```
pub trait MetricClient:
    Counted<i64>
    + CountedExt
    + Timed<u64>
    + Timed<f64>
    + Timed<Duration>
    + Gauged<u64>
    + Gauged<i64>
    + Gauged<f64>
    + Histogrammed<u64>
    + Histogrammed<f64>
    + Histogrammed<Duration>
    + Distributed<u64>
    + Distributed<f64>
    + Setted<i64>
    + Setted<u64>
{
}

type ErrorHandler = dyn Fn(MetricError) + Sync + Send;

fn nop_error_handler(_err: MetricError) {
    // nothing
}

enum Target {
    Address(String),
    Dialer(Arc<dyn Dialer>),
}

/// Builder for creating and customizing `StatsdClient` instances.
///
/// Instances of the builder should be created by calling the `::builder()`
/// or `::builder_with_dialer()` methods on the `StatsdClient` struct.
/// Settings are only validated when `.build()` is called.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use volley::prelude::*;
/// use volley::{StatsdClient, MetricError, DEFAULT_PORT};
///
/// fn my_error_handler(err: MetricError) {
///     eprintln!("Error sending metrics: {}", err);
/// }
///
/// let client = StatsdClient::builder(&format!("127.0.0.1:{}", DEFAULT_PORT))
///     .with_namespace("my.app.")
///     .with_tag("environment", "production")
///     .with_tag_value("rust")
///     .with_max_packet_size(512)
///     .with_flush_interval(Duration::from_millis(250))
///     .with_error_handler(my_error_handler)
///     .build()
///     .unwrap();
///
/// client.count("something", 123).unwrap();
/// client.count_with_tags("some.counter", 42)
///     .with_tag("region", "us-east-2")
///     .send();
/// ```
pub struct StatsdClientBuilder {
    target: Target,
    namespace: String,
    tags: Vec<String>,
    sample_rate: f64,
    settings: BufferSettings,
    sampler: Arc<dyn Sampler>,
    errors: Arc<ErrorHandler>,
}

impl StatsdClientBuilder {
    // Set the required fields and defaults for optional fields
    fn new(target: Target) -> Self {
        StatsdClientBuilder {
            // required
            target,

            // optional with defaults
            namespace: String::new(),
            tags: Vec::new(),
            sample_rate: 1.0,
            settings: BufferSettings::default(),
            sampler: Arc::new(ThreadRngSampler),
            errors: Arc::new(nop_error_handler),
        }
    }

    /// Prefix prepended to every metric name.
    ///
    /// The namespace is used verbatim: include a trailing `.` if you want
    /// one between the namespace and the metric name.
    pub fn with_namespace<S>(mut self, namespace: S) -> Self
    where
        S: Into<String>,
    {
        self.namespace = namespace.into();
        self
    }

    /// Add a default tag with key and value to every metric published by the
    /// built [StatsdClient]. Global tags are written before per-call tags.
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.tags.push(global_tag(key.as_ref(), value.as_ref()));
        self
    }

    /// Add a default tag with only a value to every metric published by the built
    /// [StatsdClient].
    pub fn with_tag_value<K>(mut self, value: K) -> Self
    where
        K: Into<String>,
    {
        self.tags.push(value.into());
        self
    }

    /// Default sample rate applied to every metric without its own rate.
    ///
    /// Must be between `0.0` and `1.0` inclusive. Defaults to `1.0`.
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Maximum number of bytes in a single packet. Defaults to 1432 bytes,
    /// a size that fits in a single Ethernet frame, and must be at least 5.
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.settings.max_packet_size = size;
        self
    }

    /// Interval at which a background timer flushes buffered stats.
    ///
    /// Defaults to one second. An interval of zero disables the timer, in
    /// which case stats are only written when the buffer fills up, on
    /// `flush()` or on `close()`.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.settings.flush_interval = interval;
        self
    }

    /// Flush as soon as this many stats are buffered.
    ///
    /// Must be at least 1. A value of 1 disables buffering entirely: every
    /// stat is sent as its own packet. By default only the packet size
    /// limits how many stats are buffered.
    pub fn with_buffered_stats(mut self, count: usize) -> Self {
        self.settings.max_stats = Some(count);
        self
    }

    /// Hand stats to a dedicated worker thread through a queue instead of
    /// writing them into the buffer from the calling thread.
    ///
    /// With a capacity, stats sent while the queue is full are dropped and
    /// counted in `TransportStats::stats_dropped`. Without one, the queue is
    /// unbounded.
    pub fn with_queue(mut self, capacity: Option<usize>) -> Self {
        self.settings.delivery = Delivery::Queued { capacity };
        self
    }

    /// Sampler deciding which metrics with a rate below `1.0` are kept.
    ///
    /// Defaults to `ThreadRngSampler`.
    pub fn with_sampler<S>(mut self, sampler: S) -> Self
    where
        S: Sampler + 'static,
    {
        self.sampler = Arc::new(sampler);
        self
    }

    /// Set an error handler to use for metrics sent via `MetricBuilder::send()`
    ///
    /// The error handler is only invoked when metrics are not able to be sent
    /// correctly. Either due to invalid input, a closed client, or some other
    /// reason. Socket failures while sending are logged and counted rather
    /// than reported here; they surface from `flush()` and `close()`.
    ///
    /// The error handler should consume the error without panicking. The error
    /// may be logged, printed to stderr, discarded, etc. - this is up to the
    /// implementation.
    pub fn with_error_handler<F>(mut self, errors: F) -> Self
    where
        F: Fn(MetricError) + Sync + Send + 'static,
    {
        self.errors = Arc::new(errors);
        self
    }

    /// Validate settings, open the connection and construct a new
    /// `StatsdClient`.
    ///
    /// # Failures
    ///
    /// Returns an `ErrorKind::Configuration` error when the destination
    /// can't be parsed or resolved, a socket can't be opened, or any of the
    /// buffer settings or the sample rate are out of range.
    pub fn build(self) -> MetricResult<StatsdClient> {
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(MetricError::from((
                ErrorKind::Configuration,
                "default sample rate must be between 0.0 and 1.0",
            )));
        }

        self.settings.validate()?;

        let dialer = match self.target {
            Target::Address(addr) => Destination::parse(&addr)?.dialer()?,
            Target::Dialer(dialer) => dialer,
        };

        let conn = Connection::open(dialer, self.settings)?;
        let config = ClientConfig {
            composer: Composer::new(self.namespace, self.tags),
            sample_rate: self.sample_rate,
            sampler: self.sampler,
            errors: self.errors,
        };

        Ok(StatsdClient {
            config: Arc::new(config),
            conn,
        })
    }
}

/// Settings shared, unchanged, by a client and all of its clones.
struct ClientConfig {
    composer: Composer,
    sample_rate: f64,
    sampler: Arc<dyn Sampler>,
    errors: Arc<ErrorHandler>,
}

/// Client for Statsd that buffers metrics and writes them in batches.
///
/// # Traits
///
/// The client supports several traits for recording metrics of different
/// types.
///
/// * `Counted` for emitting counters.
/// * `Timed` for emitting timings.
/// * `Gauged` for emitting gauge values.
/// * `Histogrammed` for emitting histogram values.
/// * `Distributed` for emitting distribution values.
/// * `Setted` for emitting set values.
/// * `MetricClient` for a combination of all of the above.
///
/// # Buffering
///
/// Formatted stats are collected into a single buffer per client and
/// written as one newline separated packet when the next stat wouldn't fit,
/// when the configured number of stats is reached, every flush interval,
/// and on `flush()` or `close()`.
///
/// # Threading
///
/// The client is `Send` and `Sync` and can be shared between threads behind
/// an `Arc`. All threads then contend on a single buffer. For heavy
/// concurrent use, give each thread or shard its own clone from
/// `try_clone()` (see `Shards`): clones share configuration but each has
/// its own socket and buffer.
///
/// # Example
///
/// ```no_run
/// use volley::prelude::*;
/// use volley::{StatsdClient, DEFAULT_PORT};
///
/// let client = StatsdClient::connect(&format!("localhost:{}", DEFAULT_PORT)).unwrap();
/// client.incr("requests").unwrap();
/// client.close().unwrap();
/// ```
pub struct StatsdClient {
    config: Arc<ClientConfig>,
    conn: Connection,
}

impl StatsdClient {
    /// Create a client for the given destination using default settings.
    ///
    /// The destination is `host:port` for UDP, or `unix://path`,
    /// `unixgram://path` or an absolute path for a Unix datagram socket.
    pub fn connect(dest: &str) -> MetricResult<Self> {
        Self::builder(dest).build()
    }

    /// Create a new builder sending to the given destination.
    ///
    /// General defaults:
    ///
    /// * No namespace and no global tags.
    /// * A maximum packet size of 1432 bytes.
    /// * A flush interval of one second.
    /// * A sample rate of `1.0`.
    /// * A no-op error handler. Note that this only affects errors
    ///   encountered when using the `MetricBuilder::send()` method.
    pub fn builder(dest: &str) -> StatsdClientBuilder {
        StatsdClientBuilder::new(Target::Address(dest.to_owned()))
    }

    /// Create a new builder that opens transports from the given dialer.
    ///
    /// # Example
    ///
    /// ```
    /// use volley::prelude::*;
    /// use volley::{StatsdClient, SpyDialer};
    ///
    /// let (rx, dialer) = SpyDialer::new();
    /// let client = StatsdClient::builder_with_dialer(dialer)
    ///     .with_namespace("my.app.")
    ///     .build()
    ///     .unwrap();
    ///
    /// client.incr("some.counter").unwrap();
    /// client.flush().unwrap();
    ///
    /// assert_eq!(b"my.app.some.counter:1|c".to_vec(), rx.recv().unwrap());
    /// ```
    pub fn builder_with_dialer<D>(dialer: D) -> StatsdClientBuilder
    where
        D: Dialer + 'static,
    {
        StatsdClientBuilder::new(Target::Dialer(Arc::new(dialer)))
    }

    /// Format and send a single stat.
    ///
    /// Value-only tags are written after the global tags. The default
    /// sample rate of the client applies.
    ///
    /// # Failures
    ///
    /// * `ErrorKind::InvalidInput` for an empty name or a non-finite value.
    /// * `ErrorKind::Closed` once the client has been closed.
    pub fn send(&self, name: &str, value: MetricValue<'_>, type_: MetricType, tags: &[&str]) -> MetricResult<()> {
        let mut formatter = StatFormatter::new(&self.config.composer, name, value, type_);
        for tag in tags {
            formatter.with_tag_value(tag);
        }
        self.dispatch(formatter)
    }

    /// Record a string member of a set.
    pub fn set_member(&self, key: &str, member: &str) -> MetricResult<()> {
        self.set_member_with_tags(key, member).try_send()
    }

    /// Record a string member of a set and return a `MetricBuilder` that
    /// can be used to add tags to the metric.
    pub fn set_member_with_tags<'a>(&'a self, key: &'a str, member: &'a str) -> MetricBuilder<'a, 'a> {
        MetricBuilder::from_fmt(
            StatFormatter::new(&self.config.composer, key, MetricValue::Str(member), MetricType::Set),
            self,
        )
    }

    /// Create an independent client with the same configuration.
    ///
    /// The clone re-resolves the destination, opens its own socket and uses
    /// its own buffer, so it never contends with this client.
    ///
    /// # Failures
    ///
    /// * `ErrorKind::Configuration` if the destination can't be resolved or
    ///   a socket can't be opened.
    /// * `ErrorKind::Closed` if this client has been closed.
    pub fn try_clone(&self) -> MetricResult<StatsdClient> {
        Ok(StatsdClient {
            config: Arc::clone(&self.config),
            conn: self.conn.try_clone()?,
        })
    }

    /// Write any buffered stats now.
    ///
    /// This is helpful for when you'd like to buffer metrics but still want
    /// strong control over when to emit them. A failed write is returned as
    /// an `ErrorKind::Transmission` error and is not retried.
    pub fn flush(&self) -> MetricResult<()> {
        self.conn.flush()
    }

    /// Flush remaining stats and release the socket.
    ///
    /// Calling `close` more than once is fine: later calls do nothing.
    /// Every other operation fails with `ErrorKind::Closed` afterwards.
    pub fn close(&self) -> MetricResult<()> {
        self.conn.close()
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    /// I/O telemetry for the connection of this client (not its clones).
    pub fn stats(&self) -> TransportStats {
        self.conn.stats()
    }

    pub(crate) fn dispatch(&self, mut formatter: StatFormatter<'_>) -> MetricResult<()> {
        if self.conn.is_closed() {
            return Err(MetricError::closed());
        }

        let rate = formatter.sample_rate().unwrap_or(self.config.sample_rate);
        if !(0.0..=1.0).contains(&rate) {
            return Err(MetricError::from((
                ErrorKind::InvalidInput,
                "sample rate must be between 0.0 and 1.0",
            )));
        }

        if rate == 0.0 {
            return Ok(());
        }

        formatter.with_sample_rate(rate);
        formatter.validate()?;

        if rate < 1.0 && !self.config.sampler.sample(rate) {
            return Ok(());
        }

        self.conn.send_stat(formatter.format()?)
    }

    pub(crate) fn consume_error(&self, err: MetricError) {
        (self.config.errors)(err);
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatsdClient {{ namespace: {:?}, tags: {:?}, sample_rate: {}, conn: {:?}, sampler: ..., errors: ... }}",
            self.config.composer.namespace(),
            self.config.composer.tags(),
            self.config.sample_rate,
            self.conn,
        )
    }
}

impl<T> Counted<T> for StatsdClient
where
    T: ToCounterValue,
{
    fn count_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a> {
        self.metric_builder(key, value.try_to_value(), MetricType::Counter)
    }
}

impl CountedExt for StatsdClient {}

impl<T> Timed<T> for StatsdClient
where
    T: ToTimerValue,
{
    fn time_with_tags<'a>(&'a self, key: &'a str, time: T) -> MetricBuilder<'a, 'a> {
        self.metric_builder(key, time.try_to_value(), MetricType::Timer)
    }
}

impl<T> Gauged<T> for StatsdClient
where
    T: ToGaugeValue,
{
    fn gauge_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a> {
        self.metric_builder(key, value.try_to_value(), MetricType::Gauge)
    }
}

impl<T> Histogrammed<T> for StatsdClient
where
    T: ToHistogramValue,
{
    fn histogram_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a> {
        self.metric_builder(key, value.try_to_value(), MetricType::Histogram)
    }
}

impl<T> Distributed<T> for StatsdClient
where
    T: ToDistributionValue,
{
    fn distribution_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a> {
        self.metric_builder(key, value.try_to_value(), MetricType::Distribution)
    }
}

impl<T> Setted<T> for StatsdClient
where
    T: ToSetValue,
{
    fn set_with_tags<'a>(&'a self, key: &'a str, value: T) -> MetricBuilder<'a, 'a> {
        self.metric_builder(key, value.try_to_value(), MetricType::Set)
    }
}

impl MetricClient for StatsdClient {}

impl StatsdClient {
    fn metric_builder<'a>(
        &'a self,
        key: &'a str,
        value: MetricResult<MetricValue<'static>>,
        type_: MetricType,
    ) -> MetricBuilder<'a, 'a> {
        match value {
            Ok(v) => MetricBuilder::from_fmt(StatFormatter::new(&self.config.composer, key, v, type_), self),
            Err(e) => MetricBuilder::from_error(e, self),
        }
    }
}
