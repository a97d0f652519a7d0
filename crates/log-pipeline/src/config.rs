//! Pipeline settings
//!
//! [`PipelineConfig`] is the typed, flattened view of the `[source]`,
//! `[pipeline]`, `[sink]` and `[monitor]` sections of
//! [`LogshipConfig`](logship_core::config::LogshipConfig).
//!
//! # Example
//! ```ignore
//! use logship_core::config::LogshipConfig;
//! use logship_pipeline::config::PipelineConfig;
//!
//! let core_config = LogshipConfig::default();
//! let config = PipelineConfig::from_core(&core_config)?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logship_core::config::LogshipConfig;

use crate::error::LogPipelineError;
use crate::sink::RetryPolicy;

/// Where the tailer starts reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartPosition {
    /// Current end of file; existing content is skipped
    #[default]
    End,
    /// Start of file
    Beginning,
    /// Explicit byte offset, e.g. one recorded by a previous run
    Offset(u64),
}

impl StartPosition {
    /// Resolves the `[source]` settings; an explicit offset wins.
    pub fn from_settings(position: &str, offset: Option<u64>) -> Result<Self, LogPipelineError> {
        if let Some(offset) = offset {
            return Ok(Self::Offset(offset));
        }
        match position {
            "end" => Ok(Self::End),
            "beginning" => Ok(Self::Beginning),
            other => Err(LogPipelineError::Config {
                field: "start_position".to_owned(),
                reason: format!("unknown start position '{other}'"),
            }),
        }
    }
}

/// Sink implementation selected at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkKind {
    /// InfluxDB v2 HTTP write API
    #[default]
    InfluxDb,
    /// Log every point through `tracing` (dry run)
    Log,
}

impl SinkKind {
    /// Parses the `[sink] kind` value.
    pub fn parse(kind: &str) -> Result<Self, LogPipelineError> {
        match kind {
            "influxdb" => Ok(Self::InfluxDb),
            "log" => Ok(Self::Log),
            other => Err(LogPipelineError::Config {
                field: "sink_kind".to_owned(),
                reason: format!("unknown sink kind '{other}'"),
            }),
        }
    }

    /// Config-file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InfluxDb => "influxdb",
            Self::Log => "log",
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Access log to tail
    pub source_path: PathBuf,
    /// Sleep between reads at end of file (milliseconds)
    pub poll_interval_ms: u64,
    /// Initial read position
    pub start_position: StartPosition,
    /// Longest accepted line in bytes
    pub max_line_length: usize,

    /// Raw-line queue capacity
    pub read_queue_capacity: usize,
    /// Parsed-event queue capacity
    pub write_queue_capacity: usize,
    /// Parser worker count
    pub parser_workers: usize,
    /// Sink worker count
    pub sink_workers: usize,
    /// Drain queued items on stop instead of aborting
    pub drain_on_shutdown: bool,
    /// Drain deadline (seconds)
    pub drain_timeout_secs: u64,

    /// Sink implementation
    pub sink_kind: SinkKind,
    /// InfluxDB DSN
    pub sink_dsn: String,
    /// Measurement name
    pub measurement: String,
    /// Per-request timeout (seconds)
    pub sink_timeout_secs: u64,
    /// Attempts per point
    pub max_attempts: u32,
    /// First retry delay (milliseconds)
    pub initial_backoff_ms: u64,
    /// Retry delay cap (milliseconds)
    pub max_backoff_ms: u64,

    /// Throughput sampling period (seconds)
    pub sample_period_secs: u64,
    /// Monitor signal channel capacity
    pub signal_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("./access.log"),
            poll_interval_ms: 500,
            start_position: StartPosition::End,
            max_line_length: 64 * 1024,
            read_queue_capacity: 200,
            write_queue_capacity: 200,
            parser_workers: 2,
            sink_workers: 4,
            drain_on_shutdown: false,
            drain_timeout_secs: 10,
            sink_kind: SinkKind::InfluxDb,
            sink_dsn: logship_core::config::DEFAULT_INFLUX_DSN.to_owned(),
            measurement: "nginx_logs".to_owned(),
            sink_timeout_secs: 10,
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            sample_period_secs: 5,
            signal_capacity: 200,
        }
    }
}

impl PipelineConfig {
    /// Builds pipeline settings from the loaded `logship.toml`.
    pub fn from_core(core: &LogshipConfig) -> Result<Self, LogPipelineError> {
        Ok(Self {
            source_path: PathBuf::from(&core.source.path),
            poll_interval_ms: core.source.poll_interval_ms,
            start_position: StartPosition::from_settings(
                &core.source.start_position,
                core.source.start_offset,
            )?,
            max_line_length: core.source.max_line_length,
            read_queue_capacity: core.pipeline.read_queue_capacity,
            write_queue_capacity: core.pipeline.write_queue_capacity,
            parser_workers: core.pipeline.parser_workers,
            sink_workers: core.pipeline.sink_workers,
            drain_on_shutdown: core.pipeline.drain_on_shutdown,
            drain_timeout_secs: core.pipeline.drain_timeout_secs,
            sink_kind: SinkKind::parse(&core.sink.kind)?,
            sink_dsn: core.sink.dsn.clone(),
            measurement: core.sink.measurement.clone(),
            sink_timeout_secs: core.sink.timeout_secs,
            max_attempts: core.sink.max_attempts,
            initial_backoff_ms: core.sink.initial_backoff_ms,
            max_backoff_ms: core.sink.max_backoff_ms,
            sample_period_secs: core.monitor.sample_period_secs,
            signal_capacity: core.monitor.signal_capacity,
        })
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Sample period as a `Duration`.
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs(self.sample_period_secs)
    }

    /// Drain deadline as a `Duration`.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// Sink request timeout as a `Duration`.
    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink_timeout_secs)
    }

    /// Retry policy for the sink workers.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_QUEUE_CAPACITY: usize = 1_000_000;
        const MAX_WORKERS: usize = 1024;

        if self.source_path.as_os_str().is_empty() {
            return Err(config_error("source_path", "must not be empty".to_owned()));
        }
        if self.poll_interval_ms == 0 {
            return Err(config_error(
                "poll_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(config_error(
                "max_line_length",
                "must be greater than 0".to_owned(),
            ));
        }

        for (field, value) in [
            ("read_queue_capacity", self.read_queue_capacity),
            ("write_queue_capacity", self.write_queue_capacity),
            ("signal_capacity", self.signal_capacity),
        ] {
            if value == 0 || value > MAX_QUEUE_CAPACITY {
                return Err(config_error(field, format!("must be 1-{MAX_QUEUE_CAPACITY}")));
            }
        }

        for (field, value) in [
            ("parser_workers", self.parser_workers),
            ("sink_workers", self.sink_workers),
        ] {
            if value == 0 || value > MAX_WORKERS {
                return Err(config_error(field, format!("must be 1-{MAX_WORKERS}")));
            }
        }

        if self.measurement.is_empty() {
            return Err(config_error("measurement", "must not be empty".to_owned()));
        }
        if self.sink_timeout_secs == 0 {
            return Err(config_error(
                "sink_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(config_error(
                "max_attempts",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(config_error(
                "initial_backoff_ms",
                "must not exceed max_backoff_ms".to_owned(),
            ));
        }
        if self.sample_period_secs == 0 {
            return Err(config_error(
                "sample_period_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: String) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason,
    }
}

/// Pipeline settings builder
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the file to tail.
    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source_path = path.into();
        self
    }

    /// Sets the end-of-file poll interval (milliseconds).
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Sets the initial read position.
    pub fn start_position(mut self, position: StartPosition) -> Self {
        self.config.start_position = position;
        self
    }

    /// Sets the line length limit.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// Sets both queue capacities.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.read_queue_capacity = capacity;
        self.config.write_queue_capacity = capacity;
        self
    }

    /// Sets the parser worker count.
    pub fn parser_workers(mut self, workers: usize) -> Self {
        self.config.parser_workers = workers;
        self
    }

    /// Sets the sink worker count.
    pub fn sink_workers(mut self, workers: usize) -> Self {
        self.config.sink_workers = workers;
        self
    }

    /// Enables draining on stop.
    pub fn drain_on_shutdown(mut self, drain: bool, timeout_secs: u64) -> Self {
        self.config.drain_on_shutdown = drain;
        self.config.drain_timeout_secs = timeout_secs;
        self
    }

    /// Sets the sink kind.
    pub fn sink_kind(mut self, kind: SinkKind) -> Self {
        self.config.sink_kind = kind;
        self
    }

    /// Sets the InfluxDB DSN.
    pub fn sink_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.config.sink_dsn = dsn.into();
        self
    }

    /// Sets the retry attempts and backoff bounds.
    pub fn retry(
        mut self,
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
    ) -> Self {
        self.config.max_attempts = max_attempts;
        self.config.initial_backoff_ms = initial_backoff_ms;
        self.config.max_backoff_ms = max_backoff_ms;
        self
    }

    /// Sets the throughput sample period (seconds).
    pub fn sample_period_secs(mut self, secs: u64) -> Self {
        self.config.sample_period_secs = secs;
        self
    }

    /// Validates and returns the settings.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = LogshipConfig::default();
        core.source.path = "/var/log/nginx/access.log".to_owned();
        core.pipeline.parser_workers = 3;
        core.sink.kind = "log".to_owned();
        core.monitor.sample_period_secs = 10;

        let config = PipelineConfig::from_core(&core).unwrap();
        assert_eq!(config.source_path, PathBuf::from("/var/log/nginx/access.log"));
        assert_eq!(config.parser_workers, 3);
        assert_eq!(config.sink_kind, SinkKind::Log);
        assert_eq!(config.sample_period(), Duration::from_secs(10));
        assert_eq!(config.start_position, StartPosition::End);
    }

    #[test]
    fn from_core_offset_wins_over_position() {
        let mut core = LogshipConfig::default();
        core.source.start_position = "beginning".to_owned();
        core.source.start_offset = Some(128);
        let config = PipelineConfig::from_core(&core).unwrap();
        assert_eq!(config.start_position, StartPosition::Offset(128));
    }

    #[test]
    fn from_core_rejects_unknown_sink_kind() {
        let mut core = LogshipConfig::default();
        core.sink.kind = "kafka".to_owned();
        assert!(PipelineConfig::from_core(&core).is_err());
    }

    #[test]
    fn validate_rejects_zero_parser_workers() {
        let config = PipelineConfig {
            parser_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_queue_capacity() {
        let config = PipelineConfig {
            write_queue_capacity: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("write_queue_capacity"));
    }

    #[test]
    fn validate_rejects_zero_sink_timeout() {
        let config = PipelineConfig {
            sink_timeout_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sink_timeout_secs"));
    }

    #[test]
    fn retry_policy_uses_millis() {
        let policy = PipelineConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(200));
        assert_eq!(policy.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = PipelineConfigBuilder::new()
            .source_path("/tmp/access.log")
            .queue_capacity(1)
            .parser_workers(1)
            .sink_workers(1)
            .sink_kind(SinkKind::Log)
            .build()
            .unwrap();
        assert_eq!(config.read_queue_capacity, 1);
        assert_eq!(config.write_queue_capacity, 1);
        assert_eq!(config.sink_kind, SinkKind::Log);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = PipelineConfigBuilder::new().sink_workers(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn sink_kind_roundtrips_config_spelling() {
        for kind in [SinkKind::InfluxDb, SinkKind::Log] {
            assert_eq!(SinkKind::parse(kind.as_str()).unwrap(), kind);
        }
    }
}
