// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Namespace and tag composition shared by a client and its clones.
//!
//! Tags are not escaped. A tag containing a newline, comma, `#` or `|`
//! is written verbatim and will corrupt the stat (or the packet) it is
//! part of. Callers that accept tags from untrusted sources must sanitize
//! them before handing them to the client.

const TAG_PREFIX: &[u8] = b"|#";

/// A single tag attached to one metric, either `key:value` or `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tag<'a> {
    KeyValue(&'a str, &'a str),
    Value(&'a str),
}

impl<'a> Tag<'a> {
    fn len(&self) -> usize {
        match *self {
            Tag::KeyValue(key, value) => key.len() + 1 + value.len(),
            Tag::Value(value) => value.len(),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match *self {
            Tag::KeyValue(key, value) => {
                out.extend_from_slice(key.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            Tag::Value(value) => out.extend_from_slice(value.as_bytes()),
        }
    }
}

/// Global namespace and tags applied to every metric emitted by a client.
#[derive(Debug, Clone, Default)]
pub(crate) struct Composer {
    namespace: String,
    tags: Vec<String>,
    tags_len: usize,
}

impl Composer {
    pub(crate) fn new(namespace: String, tags: Vec<String>) -> Self {
        let tags_len = tags.iter().map(String::len).sum();
        Composer {
            namespace,
            tags,
            tags_len,
        }
    }

    /// Prefix prepended verbatim to every metric name.
    pub(crate) fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Render a global tag given as a key and value into its wire form.
pub(crate) fn global_tag(key: &str, value: &str) -> String {
    format!("{}:{}", key, value)
}

/// Number of bytes `write_tags` will append for these tags.
pub(crate) fn tags_size_hint(global: &Composer, tags: &[Tag<'_>]) -> usize {
    let count = global.tags.len() + tags.len();
    if count == 0 {
        return 0;
    }

    let per_call: usize = tags.iter().map(Tag::len).sum();
    // prefix, global tags, per-call tags, commas
    TAG_PREFIX.len() + global.tags_len + per_call + count - 1
}

/// Append the `|#tag1,tag2` section: global tags first, then per-call
/// tags, both in insertion order and without deduplication. Nothing is
/// written when there are no tags at all.
pub(crate) fn write_tags(out: &mut Vec<u8>, global: &Composer, tags: &[Tag<'_>]) {
    let mut wrote_tag = false;

    for tag in global.tags.iter() {
        write_separator(out, &mut wrote_tag);
        out.extend_from_slice(tag.as_bytes());
    }

    for tag in tags {
        write_separator(out, &mut wrote_tag);
        tag.write(out);
    }
}

fn write_separator(out: &mut Vec<u8>, wrote_tag: &mut bool) {
    if *wrote_tag {
        out.push(b',');
    } else {
        out.extend_from_slice(TAG_PREFIX);
        *wrote_tag = true;
    }
}
