// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod core;
mod spy;
mod udp;
#[cfg(unix)]
mod unix;

pub use crate::transport::core::{Dialer, NopDialer, Transport, TransportStats};
pub(crate) use crate::transport::core::SocketStats;
pub use crate::transport::spy::SpyDialer;
pub use crate::transport::udp::UdpDialer;
#[cfg(unix)]
pub use crate::transport::unix::UnixDialer;

use crate::types::{ErrorKind, MetricError, MetricResult};
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::Arc;

/// Where a client sends its packets.
///
/// Parsed from a string: `host:port` for UDP, or `unix://path`,
/// `unixgram://path` or an absolute path for Unix datagram sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Udp(String),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Destination {
    /// Parse a destination string without resolving it.
    ///
    /// # Failures
    ///
    /// Returns an `ErrorKind::Configuration` error when the string is empty,
    /// uses an unknown scheme, or names a Unix socket on a platform without
    /// them.
    pub fn parse(addr: &str) -> MetricResult<Destination> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(MetricError::from((ErrorKind::Configuration, "destination must not be empty")));
        }

        if let Some((scheme, path)) = addr.split_once("://") {
            return match scheme {
                "unix" | "unixgram" => Self::unix(path),
                "udp" => Ok(Destination::Udp(path.to_owned())),
                _ => Err(MetricError::from((
                    ErrorKind::Configuration,
                    "invalid scheme (expected 'udp', 'unix' or 'unixgram')",
                ))),
            };
        }

        if addr.starts_with('/') {
            return Self::unix(addr);
        }

        Ok(Destination::Udp(addr.to_owned()))
    }

    #[cfg(unix)]
    fn unix(path: &str) -> MetricResult<Destination> {
        if path.is_empty() {
            return Err(MetricError::from((ErrorKind::Configuration, "socket path must not be empty")));
        }
        Ok(Destination::Unix(PathBuf::from(path)))
    }

    #[cfg(not(unix))]
    fn unix(_path: &str) -> MetricResult<Destination> {
        Err(MetricError::from((
            ErrorKind::Configuration,
            "unix sockets are not supported on this platform",
        )))
    }

    /// Short name of the transport used for this destination.
    pub const fn transport_id(&self) -> &'static str {
        match self {
            Destination::Udp(_) => "udp",
            #[cfg(unix)]
            Destination::Unix(_) => "uds",
        }
    }

    /// Build the dialer for this destination, resolving UDP hosts once to
    /// validate them.
    pub fn dialer(&self) -> MetricResult<Arc<dyn Dialer>> {
        match self {
            Destination::Udp(host) => Ok(Arc::new(UdpDialer::new(host.as_str())?)),
            #[cfg(unix)]
            Destination::Unix(path) => Ok(Arc::new(UnixDialer::new(path))),
        }
    }
}
