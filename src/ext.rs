// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Advanced extension points for the Volley library
//!
//! Most users of Volley shouldn't need to make use of this module or
//! the included traits and types. However, users that need to extend the
//! library in unforeseen ways may find them useful.
//!
//! The various `To*Value` traits are used as markers for types that are
//! valid for each type of metric. They also contain conversion logic for
//! the types in some cases (such as in the case of `Duration` objects).
//! These can be used to allow your own custom types to be converted to
//! metric values that Volley understands.
//!
//! The `Transport` and `Dialer` traits allow packets to be sent somewhere
//! other than a UDP or Unix socket. A dialer is asked for a new transport
//! each time a client is cloned.

pub use crate::transport::{Dialer, Transport};
pub use crate::value::{
    MetricValue, ToCounterValue, ToDistributionValue, ToGaugeValue, ToHistogramValue, ToSetValue, ToTimerValue,
};
