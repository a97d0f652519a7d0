//! Error types -- per-domain error definitions

/// Top-level logship error
#[derive(Debug, thiserror::Error)]
pub enum LogshipError {
    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline lifecycle and wiring errors
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Time-series sink errors
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A field holds an invalid value
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Pipeline lifecycle and wiring errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Channel send failed (receiver dropped)
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// Pipeline could not be initialized
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// Pipeline is already running
    #[error("pipeline already running")]
    AlreadyRunning,

    /// Pipeline is not running
    #[error("pipeline not running")]
    NotRunning,

    /// A stage hit an unrecoverable fault
    #[error("stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },
}

/// Time-series sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The DSN is malformed
    #[error("invalid dsn: {0}")]
    InvalidDsn(String),

    /// The store could not be reached
    #[error("connection failed: {0}")]
    Connection(String),

    /// The store rejected the write
    #[error("write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Retries exhausted
    #[error("write failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}
