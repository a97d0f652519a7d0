//! logship pipeline -- tails an nginx access log and ships each request to
//! InfluxDB as a measurement point.
//!
//! # Modules
//!
//! - [`collector`]: polling file tailer (`tail -f` style)
//! - [`parser`]: access log record grammar and field derivation
//! - [`sink`]: line protocol points, InfluxDB v2 writer, retry decorator
//! - [`monitor`]: live counters, throughput sampling, status snapshots
//! - [`pipeline`]: orchestration (implements the core `Pipeline` trait)
//! - [`config`]: pipeline settings (extends the core config)
//! - [`error`]: domain error type
//!
//! # Architecture
//!
//! ```text
//! FileTailer -> raw queue -> AccessLogParser x N -> event queue -> EventSink x M
//!      |                          |                                   |
//!  line_observed            malformed_line                    InfluxDB / log
//!      \__________________________/
//!                  Monitor
//! ```

pub mod config;
pub mod error;
pub mod monitor;
pub mod pipeline;

pub mod collector;
pub mod parser;
pub mod sink;

// --- re-exports ---

// pipeline
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// config
pub use config::{PipelineConfig, PipelineConfigBuilder, SinkKind, StartPosition};

// errors
pub use error::LogPipelineError;

// parser
pub use parser::{AccessLogParser, ParseFailure};

// collector
pub use collector::{FileTailer, TailOffset, TailerConfig};

// sinks
pub use sink::{InfluxDsn, InfluxSink, LogSink, Point, RetryPolicy, RetryingSink, build_sink};

// monitor
pub use monitor::{MonitorHandle, MonitorSnapshot, QueueProbe};
