// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::client::StatsdClient;
use crate::format::StatFormatter;
use crate::types::{MetricError, MetricResult};

/// Internal state of a `MetricBuilder`
///
/// The builder can either be in the process of formatting a stat to send
/// via a client or it can be holding on to an error that it will return
/// to the caller when they try to send the stat.
enum BuilderRepr<'m, 'c> {
    Success(StatFormatter<'m>, &'c StatsdClient),
    Error(MetricError, &'c StatsdClient),
}

/// Builder for adding tags and a sample rate to in-progress metrics.
///
/// This builder adds tags, key-value pairs or just values, to a metric that
/// was previously constructed by a call to a method such as
/// `Counted::count_with_tags`. The tags are added to metrics and sent via
/// the client when `MetricBuilder::send()` or `MetricBuilder::try_send()`
/// is invoked. Any errors encountered constructing, validating, or sending
/// the metrics will be propagated and returned when those methods are
/// finally invoked.
///
/// Per-call tags are written after the global tags of the client, in the
/// order they were added. Tags are not escaped: a tag containing `,`, `|`,
/// `#` or a newline is written as is.
///
/// Currently, only Datadog style tags are supported. For more information on
/// the exact format used, see the
/// [Datadog docs](https://docs.datadoghq.com/developers/dogstatsd/#datagram-format).
///
/// # Example
///
/// ```
/// use volley::prelude::*;
/// use volley::{StatsdClient, NopDialer};
///
/// let client = StatsdClient::builder_with_dialer(NopDialer)
///     .with_namespace("some.prefix.")
///     .build()
///     .unwrap();
///
/// let res = client.count_with_tags("some.counter", 1)
///     .with_tag("host", "app11.example.com")
///     .with_tag("segment", "23")
///     .with_tag_value("beta")
///     .try_send();
///
/// assert!(res.is_ok());
/// ```
///
/// In this example, the stat written would be
/// `some.prefix.some.counter:1|c|#host:app11.example.com,segment:23,beta`.
#[must_use = "Did you forget to call .send() after adding tags?"]
pub struct MetricBuilder<'m, 'c> {
    repr: BuilderRepr<'m, 'c>,
}

impl<'m, 'c> MetricBuilder<'m, 'c> {
    pub(crate) fn from_fmt(formatter: StatFormatter<'m>, client: &'c StatsdClient) -> Self {
        MetricBuilder {
            repr: BuilderRepr::Success(formatter, client),
        }
    }

    pub(crate) fn from_error(err: MetricError, client: &'c StatsdClient) -> Self {
        MetricBuilder {
            repr: BuilderRepr::Error(err, client),
        }
    }

    /// Add a key-value tag to this metric.
    pub fn with_tag(mut self, key: &'m str, value: &'m str) -> Self {
        if let BuilderRepr::Success(ref mut formatter, _) = self.repr {
            formatter.with_tag(key, value);
        }
        self
    }

    /// Add a value tag to this metric.
    pub fn with_tag_value(mut self, value: &'m str) -> Self {
        if let BuilderRepr::Success(ref mut formatter, _) = self.repr {
            formatter.with_tag_value(value);
        }
        self
    }

    /// Override the default sample rate of the client for this metric.
    ///
    /// A rate of `0.0` drops the metric, a rate of `1.0` always sends it.
    /// Anything in between is decided by the sampler of the client and,
    /// when the metric is kept, written as `|@rate` so the server can scale
    /// the value back up. Rates outside `[0.0, 1.0]` are an error.
    ///
    /// # Example
    ///
    /// ```
    /// use volley::prelude::*;
    /// use volley::{StatsdClient, NopDialer};
    ///
    /// let client = StatsdClient::builder_with_dialer(NopDialer).build().unwrap();
    /// let res = client.histogram_with_tags("some.histogram", 42u64)
    ///     .with_sample_rate(0.25)
    ///     .try_send();
    ///
    /// assert!(res.is_ok());
    /// ```
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        if let BuilderRepr::Success(ref mut formatter, _) = self.repr {
            formatter.with_sample_rate(rate);
        }
        self
    }

    /// Send a metric using the client that created this builder.
    ///
    /// Note that the builder is consumed by this method and thus `.try_send()`
    /// can only be called a single time per builder. A metric dropped by
    /// sampling is not an error.
    pub fn try_send(self) -> MetricResult<()> {
        match self.repr {
            BuilderRepr::Error(_, client) if client.is_closed() => Err(MetricError::closed()),
            BuilderRepr::Error(err, _) => Err(err),
            BuilderRepr::Success(formatter, client) => client.dispatch(formatter),
        }
    }

    /// Send a metric using the client that created this builder, discarding
    /// successful results and invoking a custom handler for error results.
    ///
    /// By default, if no handler is given, a "no-op" handler is used that
    /// simply discards all errors. If this isn't desired, a custom handler
    /// should be supplied when creating a new `StatsdClient` instance.
    ///
    /// # Example
    ///
    /// ```
    /// use volley::prelude::*;
    /// use volley::{StatsdClient, MetricError, NopDialer};
    ///
    /// fn my_handler(err: MetricError) {
    ///     println!("Metric error: {}", err);
    /// }
    ///
    /// let client = StatsdClient::builder_with_dialer(NopDialer)
    ///     .with_error_handler(my_handler)
    ///     .build()
    ///     .unwrap();
    ///
    /// client.gauge_with_tags("some.key", 7u64)
    ///    .with_tag("region", "us-west-1")
    ///    .send();
    /// ```
    pub fn send(self) {
        match self.repr {
            BuilderRepr::Error(err, client) => client.consume_error(err),
            BuilderRepr::Success(formatter, client) => {
                if let Err(e) = client.dispatch(formatter) {
                    client.consume_error(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{Counted, Gauged, StatsdClient};
    use crate::test::ErrorDialer;
    use crate::transport::SpyDialer;
    use crate::types::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn unbuffered(dialer: SpyDialer) -> StatsdClient {
        StatsdClient::builder_with_dialer(dialer)
            .with_buffered_stats(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_metric_builder_tags_after_global() {
        let (rx, dialer) = SpyDialer::new();
        let client = StatsdClient::builder_with_dialer(dialer)
            .with_namespace("prefix.")
            .with_tag("env", "prod")
            .with_buffered_stats(1)
            .build()
            .unwrap();

        client
            .count_with_tags("some.counter", 3)
            .with_tag("host", "web01")
            .with_tag_value("beta")
            .try_send()
            .unwrap();

        assert_eq!(
            b"prefix.some.counter:3|c|#env:prod,host:web01,beta".to_vec(),
            rx.try_recv().unwrap()
        );
    }

    #[test]
    fn test_metric_builder_sample_rate_written() {
        let (rx, dialer) = SpyDialer::new();
        let client = StatsdClient::builder_with_dialer(dialer)
            .with_buffered_stats(1)
            .with_sampler(crate::sampler::SeededSampler::seed_from_u64(3))
            .build()
            .unwrap();

        // Keep sending until the sampler keeps one
        for _ in 0..100 {
            client.count_with_tags("some.counter", 1).with_sample_rate(0.5).send();
        }

        let packet = rx.try_recv().unwrap();
        assert_eq!(b"some.counter:1|c|@0.5".to_vec(), packet);
    }

    #[test]
    fn test_metric_builder_bad_rate() {
        let (_rx, dialer) = SpyDialer::new();
        let client = unbuffered(dialer);

        let res = client.gauge_with_tags("some.gauge", 1u64).with_sample_rate(1.5).try_send();
        assert_eq!(ErrorKind::InvalidInput, res.unwrap_err().kind());
    }

    #[test]
    fn test_metric_builder_send_invokes_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler_count = Arc::clone(&count);

        let client = StatsdClient::builder_with_dialer(ErrorDialer)
            .with_buffered_stats(1)
            .with_error_handler(move |_e| {
                handler_count.fetch_add(1, Ordering::Release);
            })
            .build()
            .unwrap();

        // Transmission errors from a send are swallowed, invalid input isn't
        client.count_with_tags("some.counter", 1).send();
        client.count_with_tags("", 1).send();

        assert_eq!(1, count.load(Ordering::Acquire));
    }

    #[test]
    fn test_metric_builder_error_repr_try_send() {
        let (rx, dialer) = SpyDialer::new();
        let client = unbuffered(dialer);

        let res = client.gauge_with_tags("some.gauge", f64::NAN).with_tag("a", "b").try_send();
        assert_eq!(ErrorKind::InvalidInput, res.unwrap_err().kind());
        assert!(rx.try_recv().is_err());
    }
}
