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
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::transport::core::{Dialer, Transport};
use crate::types::{ErrorKind, MetricError, MetricResult};

/// Attempt to convert anything implementing the `ToSocketAddrs` trait
/// into a concrete `SocketAddr` instance, returning a `Configuration`
/// error if the address could not be parsed or resolved.
fn get_addr<A: ToSocketAddrs>(addr: A) -> MetricResult<SocketAddr> {
    let mut addrs = addr
        .to_socket_addrs()
        .map_err(|e| MetricError::io(ErrorKind::Configuration, "unable to resolve destination", e))?;

    match addrs.next() {
        Some(addr) => Ok(addr),
        None => Err(MetricError::from((
            ErrorKind::Configuration,
            "No socket addresses yielded",
        ))),
    }
}

fn bind_for(addr: &SocketAddr) -> io::Result<UdpSocket> {
    let socket = match addr {
        SocketAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?,
        SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0))?,
    };
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Implementation of a `Dialer` that opens non-blocking UDP sockets.
///
/// The host is kept as given and resolved again each time a transport is
/// dialed, so clones created after a DNS change send to the new address.
///
/// # Example
///
/// ```no_run
/// use volley::{Dialer, UdpDialer, DEFAULT_PORT};
///
/// let dialer = UdpDialer::new(format!("metrics.example.com:{}", DEFAULT_PORT)).unwrap();
/// let transport = dialer.dial().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct UdpDialer {
    host: String,
}

impl UdpDialer {
    /// Construct a new `UdpDialer` for a `host:port` destination.
    ///
    /// # Failures
    ///
    /// This method may fail if:
    ///
    /// * It is unable to resolve the hostname of the metric server.
    /// * The host address is otherwise unable to be parsed
    pub fn new<S>(host: S) -> MetricResult<UdpDialer>
    where
        S: Into<String>,
    {
        let host = host.into();
        get_addr(host.as_str())?;
        Ok(UdpDialer { host })
    }

    /// Construct a new `UdpDialer` for an already resolved address.
    pub fn from_addr(addr: SocketAddr) -> UdpDialer {
        UdpDialer { host: addr.to_string() }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Dialer for UdpDialer {
    fn dial(&self) -> MetricResult<Box<dyn Transport>> {
        let addr = get_addr(self.host.as_str())?;
        let socket =
            bind_for(&addr).map_err(|e| MetricError::io(ErrorKind::Configuration, "unable to open UDP socket", e))?;
        Ok(Box::new(UdpTransport { addr, socket }))
    }
}

/// Transport writing each packet as a single UDP datagram.
#[derive(Debug)]
pub(crate) struct UdpTransport {
    addr: SocketAddr,
    socket: UdpSocket,
}

impl Transport for UdpTransport {
    fn write(&mut self, packet: &[u8]) -> io::Result<usize> {
        self.socket.send_to(packet, self.addr)
    }
}
