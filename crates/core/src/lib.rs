//! logship-core -- shared building blocks for the logship workspace
//!
//! Domain types, the error taxonomy, `logship.toml` configuration,
//! metric names and the capability traits the pipeline stages implement.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- re-exports ---

// errors
pub use error::{ConfigError, LogshipError, PipelineError, SinkError};

// config
pub use config::LogshipConfig;

// stage traits
pub use pipeline::{
    BoxFuture, DynEventSink, EventSink, HealthStatus, LineSource, Pipeline, SignalSink,
};

// domain types
pub use types::{ParsedEvent, RawLine};
