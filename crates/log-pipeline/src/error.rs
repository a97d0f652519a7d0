//! Pipeline error types
//!
//! [`LogPipelineError`] covers everything that can go wrong inside the
//! pipeline. `From<LogPipelineError> for LogshipError` lets callers
//! propagate with `?`.

use logship_core::error::{ConfigError, LogshipError, PipelineError, SinkError};

/// Pipeline domain error
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// Line source failure (open, seek, read)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// Source kind (file)
        source_type: String,
        /// Failure reason
        reason: String,
    },

    /// Sink failure that survived the retry policy
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Invalid configuration
    #[error("config error: {field}: {reason}")]
    Config {
        /// Offending field
        field: String,
        /// Failure reason
        reason: String,
    },

    /// Channel communication failure
    #[error("channel error: {0}")]
    Channel(String),

    /// A stage task panicked or was cancelled unexpectedly
    #[error("stage '{stage}' terminated: {reason}")]
    Stage {
        /// Stage name (source, parser, sink, monitor)
        stage: String,
        /// Termination reason
        reason: String,
    },

    /// Lifecycle misuse (double start, stop before start)
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Regex compilation error
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for LogshipError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Sink(e) => LogshipError::Sink(e),
            LogPipelineError::Io(e) => LogshipError::Io(e),
            LogPipelineError::Config { field, reason } => {
                LogshipError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Collector {
                source_type,
                reason,
            } => LogshipError::Pipeline(PipelineError::StageFailed {
                stage: source_type,
                reason,
            }),
            LogPipelineError::Stage { stage, reason } => {
                LogshipError::Pipeline(PipelineError::StageFailed { stage, reason })
            }
            LogPipelineError::Channel(reason) => {
                LogshipError::Pipeline(PipelineError::ChannelSend(reason))
            }
            other => LogshipError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
