//! Access log record parser
//!
//! Matches one line of the combined-with-timings access log format and
//! derives a [`ParsedEvent`]. Every derivation step can fail independently;
//! the failing step is reported as a [`ParseFailure`] variant.
//!
//! # Record layout
//! ```text
//! 10.0.0.1 - - [14/Apr/2020:11:10:52 +0800] https "GET /a/b?x=1 HTTP/1.1" 200 512 "-" "curl/8.0" "-" 0.001 0.002
//! client   ident user  time                 scheme request              status bytes referrer ua gzip upstream request
//! ```

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

use logship_core::types::{ParsedEvent, RawLine};

use crate::error::LogPipelineError;

/// Record grammar; 13 positional captures.
pub const ACCESS_LOG_PATTERN: &str = r#"([\d\.]+)\s+([^ \[]+)\s+([^ \[]+)\s+\[([^\]]+)\]\s+([a-z]+)\s+"([^"]+)"\s+(\d{3})\s+(\d+)\s+"([^"]+)"\s+"(.*?)"\s+"([\d\.-]+)"\s+([\d\.-]+)\s+([\d\.-]+)"#;

/// Layout of the bracketed time field.
pub const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Base used to validate origin-form request targets (`/path?query`).
const ORIGIN_BASE: &str = "http://localhost";

// capture indices
const CAP_TIME: usize = 4;
const CAP_SCHEME: usize = 5;
const CAP_REQUEST: usize = 6;
const CAP_STATUS: usize = 7;
const CAP_BYTES: usize = 8;
const CAP_UPSTREAM: usize = 12;
const CAP_REQUEST_TIME: usize = 13;

/// Why a record was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    /// The line does not match the record grammar
    #[error("line does not match the access log grammar")]
    Grammar,

    /// The time field does not follow `TIMESTAMP_FORMAT`
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    /// The byte count does not fit a u64
    #[error("invalid bytes sent '{0}'")]
    BytesSent(String),

    /// The request line is not `METHOD TARGET PROTOCOL`
    #[error("request line must have 3 parts: '{0}'")]
    RequestLine(String),

    /// The request target is not a valid URL
    #[error("invalid request target '{0}'")]
    Target(String),

    /// The upstream time is neither a number nor `-`
    #[error("invalid upstream time '{0}'")]
    UpstreamTime(String),

    /// The request time is not a number
    #[error("invalid request time '{0}'")]
    RequestTime(String),
}

impl ParseFailure {
    /// Metric label for the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Timestamp(_) => "timestamp",
            Self::BytesSent(_) => "bytes_sent",
            Self::RequestLine(_) => "request_line",
            Self::Target(_) => "target",
            Self::UpstreamTime(_) => "upstream_time",
            Self::RequestTime(_) => "request_time",
        }
    }
}

/// Access log parser
///
/// Holds only the compiled grammar; cloning shares it, so every parser
/// worker can own a copy.
#[derive(Debug, Clone)]
pub struct AccessLogParser {
    pattern: Regex,
}

impl AccessLogParser {
    /// Compiles the record grammar.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            pattern: Regex::new(ACCESS_LOG_PATTERN)?,
        })
    }

    /// Parses a raw line read from the source.
    pub fn parse(&self, line: &RawLine) -> Result<ParsedEvent, ParseFailure> {
        self.parse_bytes(&line.data)
    }

    /// Parses raw bytes; invalid UTF-8 is replaced before matching.
    pub fn parse_bytes(&self, raw: &[u8]) -> Result<ParsedEvent, ParseFailure> {
        let text = String::from_utf8_lossy(raw);
        self.parse_str(&text)
    }

    /// Parses one record.
    pub fn parse_str(&self, line: &str) -> Result<ParsedEvent, ParseFailure> {
        let caps = self.pattern.captures(line).ok_or(ParseFailure::Grammar)?;
        let field = |idx: usize| caps.get(idx).map_or("", |m| m.as_str());

        let timestamp = parse_timestamp(field(CAP_TIME))?;

        let bytes_raw = field(CAP_BYTES);
        let bytes_sent = bytes_raw
            .parse::<u64>()
            .map_err(|_| ParseFailure::BytesSent(bytes_raw.to_owned()))?;

        let request = field(CAP_REQUEST);
        let parts: Vec<&str> = request.split_whitespace().collect();
        let [method, target, _protocol] = parts.as_slice() else {
            return Err(ParseFailure::RequestLine(request.to_owned()));
        };
        let path = request_path(target)?;

        let upstream_raw = field(CAP_UPSTREAM);
        let upstream_time = if upstream_raw == "-" {
            None
        } else {
            Some(
                upstream_raw
                    .parse::<f64>()
                    .map_err(|_| ParseFailure::UpstreamTime(upstream_raw.to_owned()))?,
            )
        };

        let request_time_raw = field(CAP_REQUEST_TIME);
        let request_time = request_time_raw
            .parse::<f64>()
            .map_err(|_| ParseFailure::RequestTime(request_time_raw.to_owned()))?;

        Ok(ParsedEvent {
            timestamp,
            bytes_sent,
            path,
            method: (*method).to_owned(),
            scheme: field(CAP_SCHEME).to_owned(),
            status: field(CAP_STATUS).to_owned(),
            upstream_time,
            request_time,
        })
    }
}

/// Parses the bracketed time field, honoring its UTC offset.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseFailure> {
    DateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ParseFailure::Timestamp(raw.to_owned()))
}

/// Extracts the percent-decoded path from a request target.
///
/// Accepts origin-form (`/a/b?x=1`) and absolute-form
/// (`http://host/a/b`). Query and fragment are dropped. The path is taken
/// verbatim: dot segments and backslashes are kept as logged.
fn request_path(target: &str) -> Result<String, ParseFailure> {
    let invalid = || ParseFailure::Target(target.to_owned());

    if has_malformed_escape(target) {
        return Err(invalid());
    }

    let raw_path = match Url::parse(target) {
        Ok(_) => absolute_form_path(target),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let sep = if target.starts_with('/') { "" } else { "/" };
            Url::parse(&format!("{ORIGIN_BASE}{sep}{target}")).map_err(|_| invalid())?;
            strip_query(target)
        }
        Err(_) => return Err(invalid()),
    };

    percent_decode_str(raw_path)
        .decode_utf8()
        .map(|path| path.into_owned())
        .map_err(|_| invalid())
}

/// Path of an absolute-form target. Opaque targets (`mailto:x`) have no path.
fn absolute_form_path(target: &str) -> &str {
    let rest = strip_query(target.split_once(':').map_or("", |(_, rest)| rest));
    match rest.strip_prefix("//") {
        Some(authority_and_path) => authority_and_path
            .find('/')
            .map_or("", |idx| &authority_and_path[idx..]),
        None if rest.starts_with('/') => rest,
        None => "",
    }
}

/// Target up to the first `?` or `#`.
fn strip_query(target: &str) -> &str {
    target
        .find(['?', '#'])
        .map_or(target, |idx| &target[..idx])
}

/// `%` not followed by two hex digits.
fn has_malformed_escape(target: &str) -> bool {
    let bytes = target.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"127.0.0.1 - - [01/Jan/2024:00:00:00 +0000] https "GET /a/b?x=1 HTTP/1.1" 200 512 "-" "curl/8.0" "-" 0.001 0.002"#;

    fn parser() -> AccessLogParser {
        AccessLogParser::new().unwrap()
    }

    fn line_with(request: &str, time: &str, upstream: &str, request_time: &str) -> String {
        format!(
            r#"10.1.2.3 - alice [{time}] http "{request}" 404 17 "https://ref.example/" "Mozilla/5.0 (X11)" "1.52" {upstream} {request_time}"#
        )
    }

    #[test]
    fn parses_sample_record() {
        let event = parser().parse_str(SAMPLE).unwrap();
        assert_eq!(event.path, "/a/b");
        assert_eq!(event.method, "GET");
        assert_eq!(event.scheme, "https");
        assert_eq!(event.status, "200");
        assert_eq!(event.bytes_sent, 512);
        assert_eq!(event.upstream_time, Some(0.001));
        assert_eq!(event.request_time, 0.002);
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn parses_raw_line() {
        let line = RawLine::from_text(SAMPLE);
        let event = parser().parse(&line).unwrap();
        assert_eq!(event.path, "/a/b");
    }

    #[test]
    fn timestamp_offset_is_applied() {
        let line = line_with(
            "GET / HTTP/2.0",
            "14/Apr/2020:11:10:52 +0800",
            "0.010",
            "0.011",
        );
        let event = parser().parse_str(&line).unwrap();
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2020, 4, 14, 3, 10, 52).unwrap()
        );
    }

    #[test]
    fn path_is_percent_decoded() {
        let line = line_with(
            "GET /docs/hello%20world/%E4%B8%AD?lang=en#top HTTP/1.1",
            "01/Jan/2024:00:00:00 +0000",
            "0.1",
            "0.2",
        );
        let event = parser().parse_str(&line).unwrap();
        assert_eq!(event.path, "/docs/hello world/中");
    }

    #[test]
    fn absolute_form_target_keeps_only_path() {
        let line = line_with(
            "GET http://upstream.local:8080/api/v1?id=3 HTTP/1.1",
            "01/Jan/2024:00:00:00 +0000",
            "0.1",
            "0.2",
        );
        let event = parser().parse_str(&line).unwrap();
        assert_eq!(event.path, "/api/v1");
    }

    #[test]
    fn dot_segments_are_kept() {
        for (target, expected) in [
            ("/static/../etc/passwd", "/static/../etc/passwd"),
            ("/a/%2e%2e/b", "/a/../b"),
            ("/a/./b?x=1", "/a/./b"),
            ("/a\\b", "/a\\b"),
            ("*", "*"),
            ("http://upstream.local/x/../y#f", "/x/../y"),
            ("http://upstream.local", ""),
        ] {
            let request = format!("GET {target} HTTP/1.1");
            let line = line_with(&request, "01/Jan/2024:00:00:00 +0000", "0.1", "0.2");
            let event = parser().parse_str(&line).unwrap();
            assert_eq!(event.path, expected, "target {target}");
        }
    }

    #[test]
    fn upstream_placeholder_maps_to_none() {
        let line = line_with("GET / HTTP/1.1", "01/Jan/2024:00:00:00 +0000", "-", "0.2");
        let event = parser().parse_str(&line).unwrap();
        assert_eq!(event.upstream_time, None);
        assert_eq!(event.request_time, 0.2);
    }

    #[test]
    fn unterminated_quote_is_grammar_failure() {
        let line = r#"127.0.0.1 - - [01/Jan/2024:00:00:00 +0000] https "GET /a/b HTTP/1.1 200 512 "-" "curl" "-" 0.001 0.002"#;
        assert_eq!(parser().parse_str(line), Err(ParseFailure::Grammar));
    }

    #[test]
    fn empty_line_is_grammar_failure() {
        assert_eq!(parser().parse_str(""), Err(ParseFailure::Grammar));
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let line = line_with("GET / HTTP/1.1", "99/Foo/2024:00:00:00 +0000", "0.1", "0.2");
        assert!(matches!(
            parser().parse_str(&line),
            Err(ParseFailure::Timestamp(_))
        ));
    }

    #[test]
    fn overflowing_byte_count_is_rejected() {
        let line = SAMPLE.replace(" 512 ", " 99999999999999999999999 ");
        assert!(matches!(
            parser().parse_str(&line),
            Err(ParseFailure::BytesSent(_))
        ));
    }

    #[test]
    fn two_part_request_line_is_rejected() {
        let line = line_with("GET /a/b", "01/Jan/2024:00:00:00 +0000", "0.1", "0.2");
        assert!(matches!(
            parser().parse_str(&line),
            Err(ParseFailure::RequestLine(_))
        ));
    }

    #[test]
    fn malformed_escape_is_rejected() {
        let line = line_with(
            "GET /a%zzb HTTP/1.1",
            "01/Jan/2024:00:00:00 +0000",
            "0.1",
            "0.2",
        );
        assert!(matches!(
            parser().parse_str(&line),
            Err(ParseFailure::Target(_))
        ));
    }

    #[test]
    fn malformed_upstream_time_is_rejected() {
        let line = line_with("GET / HTTP/1.1", "01/Jan/2024:00:00:00 +0000", "1.2.3", "0.2");
        assert!(matches!(
            parser().parse_str(&line),
            Err(ParseFailure::UpstreamTime(_))
        ));
    }

    #[test]
    fn dash_request_time_is_rejected() {
        let line = line_with("GET / HTTP/1.1", "01/Jan/2024:00:00:00 +0000", "0.1", "-");
        assert!(matches!(
            parser().parse_str(&line),
            Err(ParseFailure::RequestTime(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_replaced_before_matching() {
        let mut raw = SAMPLE.as_bytes().to_vec();
        // inside the user agent
        let pos = SAMPLE.find("curl").unwrap();
        raw[pos] = 0xff;
        let event = parser().parse_bytes(&raw).unwrap();
        assert_eq!(event.path, "/a/b");
    }

    #[test]
    fn failure_kinds_are_distinct() {
        let kinds = [
            ParseFailure::Grammar.kind(),
            ParseFailure::Timestamp(String::new()).kind(),
            ParseFailure::BytesSent(String::new()).kind(),
            ParseFailure::RequestLine(String::new()).kind(),
            ParseFailure::Target(String::new()).kind(),
            ParseFailure::UpstreamTime(String::new()).kind(),
            ParseFailure::RequestTime(String::new()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_input_never_panics(input in ".{0,512}") {
                let _ = parser().parse_str(&input);
            }

            #[test]
            fn arbitrary_bytes_never_panic(
                input in proptest::collection::vec(any::<u8>(), 0..512),
            ) {
                let _ = parser().parse_bytes(&input);
            }

            #[test]
            fn path_drops_query_and_fragment(
                segments in proptest::collection::vec("[a-z0-9_]{1,8}", 1..5),
                query in "[a-z]{1,5}=[a-z0-9]{0,5}",
            ) {
                let path = format!("/{}", segments.join("/"));
                let request = format!("GET {path}?{query}#frag HTTP/1.1");
                let line = line_with(&request, "01/Jan/2024:00:00:00 +0000", "0.1", "0.2");
                let event = parser().parse_str(&line).unwrap();
                prop_assert_eq!(event.path, path);
            }
        }
    }
}
