//! Metrics sink
//!
//! Every parsed event becomes one measurement point.
//!
//! - [`Point`]: line-protocol encoding
//! - [`InfluxSink`]: InfluxDB v2 HTTP writer
//! - [`LogSink`]: dry run, logs points instead of writing them
//! - [`RetryingSink`]: bounded exponential backoff around either

pub mod influx;
pub mod log;
pub mod point;
pub mod retry;

pub use influx::{InfluxDsn, InfluxSink};
pub use log::LogSink;
pub use point::{FieldValue, Point};
pub use retry::{RetryPolicy, RetryingSink};

use std::sync::Arc;

use tracing::info;

use logship_core::pipeline::DynEventSink;

use crate::config::{PipelineConfig, SinkKind};
use crate::error::LogPipelineError;

/// Builds the configured sink, wrapped in the retry policy.
pub fn build_sink(config: &PipelineConfig) -> Result<Arc<dyn DynEventSink>, LogPipelineError> {
    let inner: Arc<dyn DynEventSink> = match config.sink_kind {
        SinkKind::InfluxDb => {
            let dsn: InfluxDsn = config.sink_dsn.parse()?;
            let sink = InfluxSink::new(&dsn, config.measurement.as_str(), config.sink_timeout())?;
            info!(
                url = %sink.write_url(),
                measurement = %config.measurement,
                "influxdb sink ready"
            );
            Arc::new(sink)
        }
        SinkKind::Log => {
            info!(measurement = %config.measurement, "log sink ready (dry run)");
            Arc::new(LogSink::new(config.measurement.as_str()))
        }
    };

    Ok(Arc::new(RetryingSink::new(inner, config.retry_policy())))
}
