//! Domain types -- data exchanged between pipeline stages
//!
//! [`RawLine`] flows from the line source to the parser workers,
//! [`ParsedEvent`] flows from the parser workers to the sink workers.

use std::fmt;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One log record read from the tail of the source file.
///
/// The trailing line terminator is already stripped.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// Record bytes without the terminator
    pub data: Bytes,
    /// Wall-clock time the line was read
    pub received_at: SystemTime,
}

impl RawLine {
    /// Creates a raw line stamped with the current time.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            received_at: SystemTime::now(),
        }
    }

    /// Builds a raw line from a string, mostly useful in tests.
    pub fn from_text(text: &str) -> Self {
        Self::new(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Time since the line was read; zero if the clock went backwards.
    pub fn queued_for(&self) -> Duration {
        self.received_at.elapsed().unwrap_or_default()
    }

    /// Lossy UTF-8 view of the record, for logging.
    pub fn lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Record length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the record is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Structured request metric extracted from one access-log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEvent {
    /// Request time as logged by the web server
    pub timestamp: DateTime<Utc>,
    /// Response body size
    pub bytes_sent: u64,
    /// Decoded URL path, query and fragment removed
    pub path: String,
    /// HTTP method
    pub method: String,
    /// Request scheme (http, https)
    pub scheme: String,
    /// Three-digit status code, kept as text
    pub status: String,
    /// Upstream response time in seconds; `None` when logged as `-`
    pub upstream_time: Option<f64>,
    /// Total request time in seconds
    pub request_time: f64,
}

impl fmt::Display for ParsedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}B rt={}",
            self.timestamp.to_rfc3339(),
            self.method,
            self.path,
            self.status,
            self.bytes_sent,
            self.request_time,
        )
    }
}
