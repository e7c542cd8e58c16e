// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::types::{ErrorKind, MetricError, MetricResult};
use std::time::Duration;

/// Holder for metric values that knows how to write itself to a stat.
///
/// Each kind of metric accepts a different set of Rust types (see the
/// various `To*Value` traits), all of which end up as one of these
/// variants before being formatted.
///
/// Typical use of the client shouldn't require interacting with this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue<'a> {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Str(&'a str),
}

impl From<i64> for MetricValue<'_> {
    fn from(v: i64) -> Self {
        MetricValue::Signed(v)
    }
}

impl From<u64> for MetricValue<'_> {
    fn from(v: u64) -> Self {
        MetricValue::Unsigned(v)
    }
}

impl From<f64> for MetricValue<'_> {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl<'a> From<&'a str> for MetricValue<'a> {
    fn from(v: &'a str) -> Self {
        MetricValue::Str(v)
    }
}

fn duration_overflow() -> MetricError {
    MetricError::from((ErrorKind::InvalidInput, "u64 overflow"))
}

/// Conversion trait for valid values for counters
///
/// Typical use of the client shouldn't require interacting with this trait.
pub trait ToCounterValue {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>>;
}

impl ToCounterValue for i64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Signed(self))
    }
}

/// Conversion trait for valid values for timers
///
/// `Duration` values are converted to milliseconds.
pub trait ToTimerValue {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>>;
}

impl ToTimerValue for u64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Unsigned(self))
    }
}

impl ToTimerValue for f64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Float(self))
    }
}

impl ToTimerValue for Duration {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        u64::try_from(self.as_millis())
            .map(MetricValue::Unsigned)
            .map_err(|_| duration_overflow())
    }
}

/// Conversion trait for valid values for gauges
pub trait ToGaugeValue {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>>;
}

impl ToGaugeValue for u64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Unsigned(self))
    }
}

impl ToGaugeValue for i64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Signed(self))
    }
}

impl ToGaugeValue for f64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Float(self))
    }
}

/// Conversion trait for valid values for histograms
///
/// `Duration` values are converted to nanoseconds.
pub trait ToHistogramValue {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>>;
}

impl ToHistogramValue for u64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Unsigned(self))
    }
}

impl ToHistogramValue for f64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Float(self))
    }
}

impl ToHistogramValue for Duration {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        u64::try_from(self.as_nanos())
            .map(MetricValue::Unsigned)
            .map_err(|_| duration_overflow())
    }
}

/// Conversion trait for valid values for distributions
pub trait ToDistributionValue {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>>;
}

impl ToDistributionValue for u64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Unsigned(self))
    }
}

impl ToDistributionValue for f64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Float(self))
    }
}

/// Conversion trait for valid values for sets
///
/// String members are sent through `StatsdClient::set_member` since they
/// borrow from the caller.
pub trait ToSetValue {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>>;
}

impl ToSetValue for i64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Signed(self))
    }
}

impl ToSetValue for u64 {
    fn try_to_value(self) -> MetricResult<MetricValue<'static>> {
        Ok(MetricValue::Unsigned(self))
    }
}
