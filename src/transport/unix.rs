// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2019-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use crate::transport::core::{Dialer, Transport};
use crate::types::{ErrorKind, MetricError, MetricResult};

/// Implementation of a `Dialer` that opens unbound, non-blocking Unix
/// datagram sockets.
///
/// Unlike UDP, sending to a socket path that doesn't exist or that no
/// server is listening on results in an error for each write. Those
/// errors are reported as transmission errors, never at dial time.
///
/// NOTE: This is only available on Unix platforms (Linux, BSD, MacOS).
///
/// # Example
///
/// ```no_run
/// use volley::{Dialer, UnixDialer};
///
/// let dialer = UnixDialer::new("/run/statsd.sock");
/// let transport = dialer.dial().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct UnixDialer {
    path: PathBuf,
}

impl UnixDialer {
    pub fn new<P>(path: P) -> UnixDialer
    where
        P: AsRef<Path>,
    {
        UnixDialer {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Dialer for UnixDialer {
    fn dial(&self) -> MetricResult<Box<dyn Transport>> {
        let socket = UnixDatagram::unbound()
            .and_then(|socket| {
                socket.set_nonblocking(true)?;
                Ok(socket)
            })
            .map_err(|e| MetricError::io(ErrorKind::Configuration, "unable to open Unix socket", e))?;

        Ok(Box::new(UnixTransport {
            path: self.path.clone(),
            socket,
        }))
    }
}

#[derive(Debug)]
struct UnixTransport {
    path: PathBuf,
    socket: UnixDatagram,
}

impl Transport for UnixTransport {
    fn write(&mut self, packet: &[u8]) -> io::Result<usize> {
        self.socket.send_to(packet, &self.path)
    }
}
