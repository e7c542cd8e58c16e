// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2018 Philip Jenvey <pjenvey@mozilla.com>
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::compose::{tags_size_hint, write_tags, Composer, Tag};
use crate::types::{ErrorKind, MetricError, MetricResult};
use crate::value::MetricValue;
use std::fmt;
use std::io::Write;

/// Type of metric that knows how to display itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Counter,
    Timer,
    Gauge,
    Histogram,
    Distribution,
    Set,
}

impl MetricType {
    /// Wire suffix for this type, without the leading `|`.
    pub fn suffix(self) -> &'static str {
        match self {
            MetricType::Counter => "c",
            MetricType::Timer => "ms",
            MetricType::Gauge => "g",
            MetricType::Histogram => "h",
            MetricType::Distribution => "d",
            MetricType::Set => "s",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.suffix().fmt(f)
    }
}

/// Append `v` with no exponent and no trailing `.0`.
///
/// `ryu` is used for the common case. It switches to scientific notation
/// for very large and very small magnitudes, which Statsd servers don't
/// accept, so those values fall back to `Display` which never does.
fn write_float(out: &mut Vec<u8>, v: f64) {
    let mut buf = ryu::Buffer::new();
    let repr = buf.format(v);

    if repr.contains('e') {
        let _ = write!(out, "{}", v);
    } else {
        let repr = repr.strip_suffix(".0").unwrap_or(repr);
        out.extend_from_slice(repr.as_bytes());
    }
}

fn write_value(out: &mut Vec<u8>, value: &MetricValue<'_>) {
    match *value {
        MetricValue::Signed(v) => out.extend_from_slice(itoa::Buffer::new().format(v).as_bytes()),
        MetricValue::Unsigned(v) => out.extend_from_slice(itoa::Buffer::new().format(v).as_bytes()),
        MetricValue::Float(v) => write_float(out, v),
        MetricValue::Str(v) => out.extend_from_slice(v.as_bytes()),
    }
}

fn value_size_hint(value: &MetricValue<'_>) -> usize {
    match *value {
        MetricValue::Str(v) => v.len(),
        MetricValue::Float(v) => float_size_hint(v),
        // i64::MIN and u64::MAX both fit in 20 bytes
        _ => 20,
    }
}

/// Upper bound on the bytes `write_float` produces for `v`.
///
/// `ryu` output without an exponent fits in 24 bytes. Magnitudes where it
/// would switch to an exponent are written in full by `Display`: one byte
/// per integer digit for large values, leading zeros plus at most 17
/// significant digits for small ones.
fn float_size_hint(v: f64) -> usize {
    let abs = v.abs();
    if !abs.is_finite() {
        24
    } else if abs >= 1e15 {
        // sign, digits
        2 + abs.log10() as usize
    } else if abs != 0.0 && abs < 1e-4 {
        // sign, "0.", leading zeros, significant digits
        3 + (-abs.log10()) as usize + 17
    } else {
        24
    }
}

/// Check that a sample rate is in (0, 1].
pub(crate) fn validate_rate(rate: f64) -> MetricResult<()> {
    if rate > 0.0 && rate <= 1.0 {
        Ok(())
    } else {
        Err(MetricError::from((
            ErrorKind::InvalidInput,
            "sample rate must be between 0.0 (exclusive) and 1.0",
        )))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StatFormatter<'a> {
    composer: &'a Composer,
    key: &'a str,
    value: MetricValue<'a>,
    type_: MetricType,
    rate: Option<f64>,
    tags: Vec<Tag<'a>>,
}

impl<'a> StatFormatter<'a> {
    const RATE_PREFIX: &'static [u8] = b"|@";

    pub(crate) fn new(composer: &'a Composer, key: &'a str, value: MetricValue<'a>, type_: MetricType) -> Self {
        StatFormatter {
            composer,
            key,
            value,
            type_,
            rate: None,
            tags: Vec::new(),
        }
    }

    pub(crate) fn with_tag(&mut self, key: &'a str, value: &'a str) {
        self.tags.push(Tag::KeyValue(key, value));
    }

    pub(crate) fn with_tag_value(&mut self, value: &'a str) {
        self.tags.push(Tag::Value(value));
    }

    pub(crate) fn with_sample_rate(&mut self, rate: f64) {
        self.rate = Some(rate);
    }

    pub(crate) fn sample_rate(&self) -> Option<f64> {
        self.rate
    }

    pub(crate) fn validate(&self) -> MetricResult<()> {
        if self.key.is_empty() {
            return Err(MetricError::from((ErrorKind::InvalidInput, "metric name must not be empty")));
        }

        if let MetricValue::Float(v) = self.value {
            if !v.is_finite() {
                return Err(MetricError::from((ErrorKind::InvalidInput, "metric value must be finite")));
            }
        }

        match self.rate {
            Some(rate) => validate_rate(rate),
            None => Ok(()),
        }
    }

    #[rustfmt::skip]
    fn size_hint(&self) -> usize {
        self.composer.namespace().len() + self.key.len()
            + 1 /* : */ + value_size_hint(&self.value)
            + 1 /* | */ + 2 /* type */
            + self.rate.map_or(0, |r| Self::RATE_PREFIX.len() + float_size_hint(r))
            + tags_size_hint(self.composer, &self.tags)
    }

    /// Validate and write the complete stat into a single allocation.
    pub(crate) fn format(&self) -> MetricResult<Vec<u8>> {
        self.validate()?;

        let mut out = Vec::with_capacity(self.size_hint());
        out.extend_from_slice(self.composer.namespace().as_bytes());
        out.extend_from_slice(self.key.as_bytes());
        out.push(b':');
        write_value(&mut out, &self.value);
        out.push(b'|');
        out.extend_from_slice(self.type_.suffix().as_bytes());

        if let Some(rate) = self.rate {
            if rate < 1.0 {
                out.extend_from_slice(Self::RATE_PREFIX);
                write_float(&mut out, rate);
            }
        }

        write_tags(&mut out, self.composer, &self.tags);
        Ok(out)
    }
}

/// Format a single stat in the canonical wire format.
///
/// Produces `name:value|suffix`, followed by `|@rate` when the rate is
/// below `1.0` and by `|#tag1,tag2` when any tags are given. No namespace
/// or global tags are applied; use a `StatsdClient` for that.
///
/// Tags are written verbatim and are not escaped.
///
/// # Example
///
/// ```
/// use volley::{format_stat, MetricType, MetricValue};
///
/// let stat = format_stat("test.gauge", MetricValue::Float(1.0), MetricType::Gauge, 1.0, &["tagA"]).unwrap();
/// assert_eq!(b"test.gauge:1|g|#tagA".as_slice(), stat.as_slice());
/// ```
///
/// # Failures
///
/// This method will fail if:
///
/// * The metric name is empty.
/// * The value is a non-finite float.
/// * The sample rate is not in the range (0, 1].
pub fn format_stat(
    name: &str,
    value: MetricValue<'_>,
    type_: MetricType,
    rate: f64,
    tags: &[&str],
) -> MetricResult<Vec<u8>> {
    let composer = Composer::default();
    let mut formatter = StatFormatter::new(&composer, name, value, type_);
    formatter.with_sample_rate(rate);
    for tag in tags {
        formatter.with_tag_value(tag);
    }
    formatter.format()
}

#[cfg(test)]
mod tests {
    use super::{format_stat, write_float, MetricType, StatFormatter};
    use crate::compose::Composer;
    use crate::types::ErrorKind;
    use crate::value::MetricValue;

    fn float_str(v: f64) -> String {
        let mut out = Vec::new();
        write_float(&mut out, v);
        String::from_utf8(out).unwrap()
    }

    fn stat_str(stat: Vec<u8>) -> String {
        String::from_utf8(stat).unwrap()
    }

    #[test]
    fn test_write_float_integral_has_no_fraction() {
        assert_eq!("1", float_str(1.0));
        assert_eq!("-42", float_str(-42.0));
        assert_eq!("0", float_str(0.0));
    }

    #[test]
    fn test_write_float_fraction() {
        assert_eq!("3.14159", float_str(3.14159));
        assert_eq!("2.3", float_str(2.3));
        assert_eq!("0.5", float_str(0.5));
    }

    #[test]
    fn test_write_float_never_scientific() {
        assert_eq!("0.0000001", float_str(1e-7));
        assert_eq!("10000000000000000000000", float_str(1e22));
        assert!(!float_str(f64::MAX).contains('e'));
        assert!(!float_str(f64::MIN_POSITIVE).contains('e'));
    }

    #[test]
    fn test_format_stat_gauge_with_tag() {
        let stat = format_stat("test.gauge", MetricValue::Float(1.0), MetricType::Gauge, 1.0, &["tagA"]).unwrap();
        assert_eq!("test.gauge:1|g|#tagA", stat_str(stat));
    }

    #[test]
    fn test_format_stat_gauge_two_tags() {
        let stat = format_stat(
            "test.gauge",
            MetricValue::Float(1.0),
            MetricType::Gauge,
            1.0,
            &["tagA", "tagB"],
        )
        .unwrap();
        assert_eq!("test.gauge:1|g|#tagA,tagB", stat_str(stat));
    }

    #[test]
    fn test_format_stat_no_tags_no_trailing_separator() {
        let stat = format_stat("test.count", MetricValue::Signed(1), MetricType::Counter, 1.0, &[]).unwrap();
        assert_eq!("test.count:1|c", stat_str(stat));
    }

    #[test]
    fn test_format_stat_each_suffix() {
        let cases = [
            (MetricType::Counter, MetricValue::Signed(-3), "k:-3|c"),
            (MetricType::Timer, MetricValue::Unsigned(21), "k:21|ms"),
            (MetricType::Gauge, MetricValue::Unsigned(7), "k:7|g"),
            (MetricType::Histogram, MetricValue::Float(2.3), "k:2.3|h"),
            (MetricType::Distribution, MetricValue::Float(2.3), "k:2.3|d"),
            (MetricType::Set, MetricValue::Str("uuid"), "k:uuid|s"),
        ];

        for (type_, value, expected) in cases {
            let stat = format_stat("k", value, type_, 1.0, &[]).unwrap();
            assert_eq!(expected, stat_str(stat), "type {:?}", type_);
        }
    }

    #[test]
    fn test_format_stat_with_sample_rate() {
        let stat = format_stat("some.key", MetricValue::Signed(4), MetricType::Counter, 0.5, &[]).unwrap();
        assert_eq!("some.key:4|c|@0.5", stat_str(stat));
    }

    #[test]
    fn test_format_stat_rate_before_tags() {
        let stat = format_stat("some.key", MetricValue::Signed(4), MetricType::Counter, 0.25, &["a", "b"]).unwrap();
        assert_eq!("some.key:4|c|@0.25|#a,b", stat_str(stat));
    }

    #[test]
    fn test_format_stat_tag_newline_passed_through() {
        let stat = format_stat(
            "test.count",
            MetricValue::Signed(1),
            MetricType::Counter,
            1.0,
            &["hello\nworld"],
        )
        .unwrap();
        assert_eq!(b"test.count:1|c|#hello\nworld".as_slice(), stat.as_slice());
    }

    #[test]
    fn test_format_stat_empty_name() {
        let err = format_stat("", MetricValue::Signed(1), MetricType::Counter, 1.0, &[]).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn test_format_stat_non_finite() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = format_stat("g", MetricValue::Float(v), MetricType::Gauge, 1.0, &[]).unwrap_err();
            assert_eq!(ErrorKind::InvalidInput, err.kind());
        }
    }

    #[test]
    fn test_format_stat_bad_rates() {
        for rate in [0.0, -0.1, 1.5, f64::NAN] {
            let err = format_stat("c", MetricValue::Signed(1), MetricType::Counter, rate, &[]).unwrap_err();
            assert_eq!(ErrorKind::InvalidInput, err.kind(), "rate {}", rate);
        }
    }

    #[test]
    fn test_formatter_namespace_and_global_tags() {
        let composer = Composer::new("flubber.".to_string(), vec!["tagC".to_string()]);
        let mut fmt = StatFormatter::new(&composer, "test.set", MetricValue::Str("uuid"), MetricType::Set);
        fmt.with_tag_value("tagA");
        fmt.with_tag("host", "web01");

        assert_eq!("flubber.test.set:uuid|s|#tagC,tagA,host:web01", stat_str(fmt.format().unwrap()));
    }

    #[test]
    fn test_formatter_size_hint_covers_output() {
        let composer = Composer::new("ns.".to_string(), vec!["env:prod".to_string()]);
        let mut fmt = StatFormatter::new(&composer, "some.key", MetricValue::Signed(i64::MIN), MetricType::Counter);
        fmt.with_sample_rate(1.0 / 3.0);
        fmt.with_tag("region", "us-west-1");

        let out = fmt.format().unwrap();
        assert!(out.len() <= fmt.size_hint(), "{} > {}", out.len(), fmt.size_hint());
    }

    #[test]
    fn test_formatter_size_hint_covers_long_floats() {
        let composer = Composer::default();
        let values = [
            -0.000012345678901234567,
            -1.2345678901234567e-300,
            f64::MIN_POSITIVE,
            5e-324,
            -123456789012345.67,
            1e15,
            -9.999999999999999e15,
            f64::MAX,
            f64::MIN,
        ];

        for v in values {
            let mut fmt = StatFormatter::new(&composer, "g", MetricValue::Float(v), MetricType::Gauge);
            fmt.with_sample_rate(0.000012345678901234567);

            let out = fmt.format().unwrap();
            assert!(out.len() <= fmt.size_hint(), "{}: {} > {}", v, out.len(), fmt.size_hint());
        }
    }
}
