//! Pending items
//!
//! A pending item is one forwarding unit: the allow-listed headers and the
//! trimmed body of a single inbound request. Items are immutable and shared
//! as `Arc<PendingItem>` between the submission path and the retry loop.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Header identifying the relay as the sender
pub const PROXY_MARKER_HEADER: &str = "X-Proxy";

/// Inbound headers copied onto the forwarded request
pub const FORWARDED_HEADERS: [&str; 3] = ["Content-Type", "Authorization", "User-Agent"];

/// A buffered, not-yet-confirmed forwarding unit
#[derive(Debug, Clone)]
pub struct PendingItem {
    id: u64,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
    created_at: DateTime<Utc>,
}

impl PendingItem {
    /// Build an item from raw inbound headers and body.
    ///
    /// Header names are matched case-insensitively and forwarded with their
    /// canonical spelling; the first occurrence wins. Anything outside
    /// [`FORWARDED_HEADERS`] is dropped.
    pub fn new<'a, I>(id: u64, raw_headers: I, raw_body: &[u8], proxy_marker: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut projected: [Option<String>; 3] = Default::default();

        for (name, value) in raw_headers {
            if let Some(idx) = FORWARDED_HEADERS
                .iter()
                .position(|allowed| allowed.eq_ignore_ascii_case(name))
            {
                projected[idx].get_or_insert_with(|| value.to_string());
            }
        }

        let mut headers = vec![(PROXY_MARKER_HEADER, proxy_marker.to_string())];
        headers.extend(
            FORWARDED_HEADERS
                .iter()
                .zip(projected)
                .filter_map(|(name, value)| value.map(|v| (*name, v))),
        );

        Self {
            id,
            headers,
            body: Bytes::copy_from_slice(trim_whitespace(raw_body)),
            created_at: Utc::now(),
        }
    }

    /// Arrival sequence number assigned by the engine
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Headers to send, marker first
    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    /// Look up a forwarded header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Body size in bytes
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

fn is_strip_byte(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Strip leading and trailing ASCII whitespace, vertical tab included
fn trim_whitespace(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|&b| !is_strip_byte(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|&b| !is_strip_byte(b)).map_or(start, |i| i + 1);
    &data[start..end]
}
