// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use thiserror::Error;

/// Potential categories an error from this library falls into.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ErrorKind {
    /// The metric itself could not be formatted: an empty name, a
    /// non-finite float, a sample rate out of range, and so on.
    InvalidInput,
    /// The client or connection could not be built: the destination
    /// could not be resolved or opened, or buffer settings are invalid.
    Configuration,
    /// Writing a packet to the underlying socket failed. Never retried.
    Transmission,
    /// The connection was closed and can no longer be used.
    Closed,
}

/// Error generated by this library, potentially wrapping an I/O error.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct MetricError {
    repr: ErrorRepr,
}

#[derive(Debug, Error)]
enum ErrorRepr {
    #[error("{1}")]
    WithDescription(ErrorKind, &'static str),
    #[error("{1}: {2}")]
    WithSource(ErrorKind, &'static str, #[source] io::Error),
}

impl MetricError {
    /// Return the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _) => kind,
            ErrorRepr::WithSource(kind, _, _) => kind,
        }
    }

    pub(crate) fn closed() -> Self {
        MetricError::from((ErrorKind::Closed, "connection closed"))
    }

    pub(crate) fn io(kind: ErrorKind, desc: &'static str, err: io::Error) -> Self {
        MetricError {
            repr: ErrorRepr::WithSource(kind, desc, err),
        }
    }
}

impl From<io::Error> for MetricError {
    fn from(err: io::Error) -> MetricError {
        MetricError::io(ErrorKind::Transmission, "I/O error", err)
    }
}

impl From<(ErrorKind, &'static str)> for MetricError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> MetricError {
        MetricError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

pub type MetricResult<T> = Result<T, MetricError>;
