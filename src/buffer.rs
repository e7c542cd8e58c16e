// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Separator written between consecutive stats in a single packet.
pub(crate) const STAT_SEPARATOR: u8 = b'\n';

/// Bounded, append-only buffer holding the contents of one outgoing packet.
///
/// Stats are joined with a newline. There is no trailing newline after the
/// last stat since the separators only exist to put multiple stats into a
/// single datagram.
///
/// The buffer never grows past its capacity: callers must check with
/// `would_overflow` before calling `append`.
#[derive(Debug)]
pub(crate) struct SendBuffer {
    buf: Vec<u8>,
    capacity: usize,
    stats: usize,
}

impl SendBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        SendBuffer {
            buf: Vec::with_capacity(capacity),
            capacity,
            stats: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of stats currently held.
    pub(crate) fn stat_count(&self) -> usize {
        self.stats
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Would appending a stat of `n` bytes take the buffer past capacity?
    pub(crate) fn would_overflow(&self, n: usize) -> bool {
        self.buf.len() + self.separator_len() + n > self.capacity
    }

    pub(crate) fn append(&mut self, stat: &[u8]) {
        debug_assert!(!self.would_overflow(stat.len()), "append without capacity check");

        if !self.buf.is_empty() {
            self.buf.push(STAT_SEPARATOR);
        }
        self.buf.extend_from_slice(stat);
        self.stats += 1;
    }

    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.stats = 0;
    }

    fn separator_len(&self) -> usize {
        if self.buf.is_empty() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SendBuffer;

    #[test]
    fn test_empty_buffer() {
        let buf = SendBuffer::new(16);
        assert!(buf.is_empty());
        assert_eq!(0, buf.len());
        assert_eq!(0, buf.stat_count());
        assert_eq!(16, buf.capacity());
    }

    #[test]
    fn test_append_joins_with_newline() {
        let mut buf = SendBuffer::new(32);
        buf.append(b"abc:3|g");
        buf.append(b"def:4|g");

        assert_eq!(b"abc:3|g\ndef:4|g".as_slice(), buf.as_bytes());
        assert_eq!(2, buf.stat_count());
    }

    #[test]
    fn test_would_overflow_counts_separator_only_when_non_empty() {
        let mut buf = SendBuffer::new(16);

        // An empty buffer can take exactly its capacity
        assert!(!buf.would_overflow(16));
        assert!(buf.would_overflow(17));

        buf.append(b"foo:1234|c");
        // 10 bytes used, 1 for the separator, 5 left
        assert!(!buf.would_overflow(5));
        assert!(buf.would_overflow(6));
    }

    #[test]
    fn test_buffer_write_equal_capacity() {
        let mut buf = SendBuffer::new(8);
        assert!(!buf.would_overflow(8));
        buf.append(b"foo:42|c");

        assert_eq!(8, buf.len());
        assert!(buf.would_overflow(1));
    }

    #[test]
    fn test_reset() {
        let mut buf = SendBuffer::new(32);
        buf.append(b"xyz");
        buf.append(b"abc");
        buf.reset();

        assert!(buf.is_empty());
        assert_eq!(0, buf.stat_count());
        assert!(!buf.would_overflow(32));
    }
}
