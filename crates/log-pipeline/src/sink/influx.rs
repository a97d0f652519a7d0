//! InfluxDB v2 sink
//!
//! Writes one point per event through the HTTP write API:
//! `POST {endpoint}/api/v2/write?org=..&bucket=..&precision=ns` with
//! `Authorization: Token ..` and a line-protocol body.
//!
//! One `reqwest::Client` is shared by every sink worker; it pools
//! connections and is safe for concurrent use.

use std::str::FromStr;
use std::time::{Duration, Instant};

use tracing::debug;
use url::Url;

use logship_core::error::SinkError;
use logship_core::metrics as m;
use logship_core::pipeline::EventSink;
use logship_core::types::ParsedEvent;

use super::point::Point;

/// Longest response body kept in a rejection error
const MAX_ERROR_BODY: usize = 512;

/// Parsed InfluxDB DSN: `endpoint@token@organization@bucket`
#[derive(Clone, PartialEq, Eq)]
pub struct InfluxDsn {
    /// Server base URL
    pub endpoint: Url,
    /// API token
    pub token: String,
    /// Organization
    pub org: String,
    /// Bucket
    pub bucket: String,
}

impl std::fmt::Debug for InfluxDsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxDsn")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl FromStr for InfluxDsn {
    type Err = SinkError;

    fn from_str(dsn: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = dsn.split('@').collect();
        let [endpoint, token, org, bucket] = parts.as_slice() else {
            return Err(SinkError::InvalidDsn(format!(
                "expected endpoint@token@organization@bucket, got {} part(s)",
                parts.len()
            )));
        };
        if [endpoint, token, org, bucket].iter().any(|p| p.is_empty()) {
            return Err(SinkError::InvalidDsn(
                "dsn components must not be empty".to_owned(),
            ));
        }

        let endpoint = Url::parse(endpoint)
            .map_err(|e| SinkError::InvalidDsn(format!("invalid endpoint: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(SinkError::InvalidDsn(format!(
                "endpoint must be an http(s) URL: {endpoint}"
            )));
        }

        Ok(Self {
            endpoint,
            token: (*token).to_owned(),
            org: (*org).to_owned(),
            bucket: (*bucket).to_owned(),
        })
    }
}

impl InfluxDsn {
    /// Full write URL with org, bucket and nanosecond precision.
    pub fn write_url(&self) -> Result<Url, SinkError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| SinkError::InvalidDsn("endpoint cannot be a base URL".to_owned()))?
            .pop_if_empty()
            .extend(["api", "v2", "write"]);
        url.query_pairs_mut()
            .clear()
            .append_pair("org", &self.org)
            .append_pair("bucket", &self.bucket)
            .append_pair("precision", "ns");
        Ok(url)
    }
}

/// InfluxDB v2 HTTP sink
pub struct InfluxSink {
    client: reqwest::Client,
    write_url: Url,
    authorization: String,
    measurement: String,
}

impl InfluxSink {
    /// Creates the sink and its HTTP client.
    pub fn new(
        dsn: &InfluxDsn,
        measurement: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Connection(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            write_url: dsn.write_url()?,
            authorization: format!("Token {}", dsn.token),
            measurement: measurement.into(),
        })
    }

    /// Write URL, for diagnostics.
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    /// Writes one point.
    pub async fn write_point(&self, point: &Point) -> Result<(), SinkError> {
        let body = point.to_line_protocol();
        let started = Instant::now();

        let resp = self
            .client
            .post(self.write_url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        metrics::histogram!(m::SINK_WRITE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let status = resp.status();
        if status.is_success() {
            debug!(status = %status, "point written");
            return Ok(());
        }

        let mut body = resp.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl EventSink for InfluxSink {
    fn name(&self) -> &str {
        "influxdb"
    }

    async fn deliver(&self, event: &ParsedEvent) -> Result<(), SinkError> {
        let point = Point::from_event(&self.measurement, event);
        self.write_point(&point).await
    }
}
