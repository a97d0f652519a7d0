//! Dry-run sink
//!
//! Logs each point's line protocol at `info` instead of writing it.

use tracing::info;

use logship_core::error::SinkError;
use logship_core::pipeline::EventSink;
use logship_core::types::ParsedEvent;

use super::point::Point;

/// Sink that logs points through `tracing`
pub struct LogSink {
    measurement: String,
}

impl LogSink {
    /// Creates a log sink for `measurement`.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
        }
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, event: &ParsedEvent) -> Result<(), SinkError> {
        let point = Point::from_event(&self.measurement, event);
        info!(
            measurement = %self.measurement,
            line = %point.to_line_protocol(),
            "point"
        );
        Ok(())
    }
}
