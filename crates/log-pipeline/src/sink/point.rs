//! Measurement points and InfluxDB line protocol
//!
//! ```text
//! nginx_logs,Path=/a/b,Methods=GET,Scheme=https,Status=200 UpstreamTime=0.001,RequestTime=0.002,BytesSent=512i 1704067200000000000
//! ```

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use logship_core::types::ParsedEvent;

/// Field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Float field, written bare
    Float(f64),
    /// Signed integer field, written with an `i` suffix
    Integer(i64),
    /// String field, written quoted
    Text(String),
    /// Boolean field
    Boolean(bool),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// One measurement point
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp: Option<DateTime<Utc>>,
}

impl Point {
    /// Starts a point for `measurement`.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    /// Adds a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Adds a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Sets the point time.
    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Builds the request point for a parsed event.
    ///
    /// Tags: `Path`, `Methods`, `Scheme`, `Status`.
    /// Fields: `UpstreamTime` (omitted when absent), `RequestTime`, `BytesSent`.
    pub fn from_event(measurement: &str, event: &ParsedEvent) -> Self {
        let mut point = Self::new(measurement)
            .tag("Path", event.path.as_str())
            .tag("Methods", event.method.as_str())
            .tag("Scheme", event.scheme.as_str())
            .tag("Status", event.status.as_str());
        if let Some(upstream) = event.upstream_time {
            point = point.field("UpstreamTime", upstream);
        }
        point
            .field("RequestTime", event.request_time)
            .field("BytesSent", event.bytes_sent)
            .timestamp(event.timestamp)
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Encodes the point as one line of line protocol, without a newline.
    ///
    /// Tags with empty values and non-finite floats are skipped; the store
    /// rejects both.
    pub fn to_line_protocol(&self) -> String {
        let mut line = String::with_capacity(128);
        escape_into(&mut line, &self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }

        let mut first = true;
        for (key, value) in &self.fields {
            if matches!(value, FieldValue::Float(v) if !v.is_finite()) {
                continue;
            }
            line.push(if first { ' ' } else { ',' });
            first = false;
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            match value {
                FieldValue::Float(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{v}i");
                }
                FieldValue::Text(v) => {
                    line.push('"');
                    escape_into(&mut line, v, &['"', '\\']);
                    line.push('"');
                }
                FieldValue::Boolean(v) => {
                    line.push_str(if *v { "true" } else { "false" });
                }
            }
        }

        if let Some(ns) = self.timestamp.and_then(|ts| ts.timestamp_nanos_opt()) {
            let _ = write!(line, " {ns}");
        }
        line
    }
}

/// Appends `value`, backslash-escaping `special` characters.
///
/// Newlines cannot be escaped in line protocol and are replaced by spaces
/// before escaping.
fn escape_into(out: &mut String, value: &str, special: &[char]) {
    for c in value.chars() {
        let c = if c == '\n' || c == '\r' { ' ' } else { c };
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
