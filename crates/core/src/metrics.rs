//! Metric names and descriptions
//!
//! Every Prometheus metric name is defined here. Components call
//! `metrics::counter!()`, `metrics::gauge!()` and `metrics::histogram!()`
//! with these constants.
//!
//! # Naming
//!
//! - prefix: `logship_`
//! - suffix: `_total` (counter), `_seconds` (histogram/latency), none (gauge)
//!
//! # Example
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logship_core::metrics::LINES_HANDLED_TOTAL).increment(1);
//! ```

// ─── Label keys ─────────────────────────────────────────────────────

/// Parse failure kind label (grammar, timestamp, bytes_sent, ...)
pub const LABEL_REASON: &str = "reason";

/// Sink label (influxdb, log)
pub const LABEL_SINK: &str = "sink";

// ─── Source ─────────────────────────────────────────────────────────

/// Lines read from the tailed file (counter)
pub const LINES_HANDLED_TOTAL: &str = "logship_lines_handled_total";

/// Lines dropped for exceeding the length limit (counter)
pub const LINES_OVERSIZED_TOTAL: &str = "logship_lines_oversized_total";

// ─── Parser ─────────────────────────────────────────────────────────

/// Lines rejected by the parser or the source (counter, label: reason)
pub const PARSE_ERRORS_TOTAL: &str = "logship_parse_errors_total";

/// Records turned into events (counter)
pub const EVENTS_PARSED_TOTAL: &str = "logship_events_parsed_total";

/// Time a raw line waited between the read and a parser (histogram, seconds)
pub const LINE_QUEUE_WAIT_SECONDS: &str = "logship_line_queue_wait_seconds";

// ─── Sink ───────────────────────────────────────────────────────────

/// Points accepted by the store (counter, label: sink)
pub const POINTS_WRITTEN_TOTAL: &str = "logship_points_written_total";

/// Write attempts retried after a failure (counter, label: sink)
pub const SINK_RETRIES_TOTAL: &str = "logship_sink_retries_total";

/// Single point write latency (histogram, seconds)
pub const SINK_WRITE_DURATION_SECONDS: &str = "logship_sink_write_duration_seconds";

// ─── Monitor ────────────────────────────────────────────────────────

/// Lines per second over the last sample period (gauge)
pub const THROUGHPUT_PER_SECOND: &str = "logship_throughput_per_second";

/// Raw-line queue depth (gauge)
pub const READ_QUEUE_DEPTH: &str = "logship_read_queue_depth";

/// Parsed-event queue depth (gauge)
pub const WRITE_QUEUE_DEPTH: &str = "logship_write_queue_depth";

/// Process uptime (gauge, seconds)
pub const UPTIME_SECONDS: &str = "logship_uptime_seconds";

/// Build information (gauge, always 1, label: version)
pub const BUILD_INFO: &str = "logship_build_info";

// ─── Histogram buckets ──────────────────────────────────────────────

/// Sink write latency buckets (seconds)
///
/// 1ms to 10s; a write is one HTTP round trip.
pub const SINK_WRITE_DURATION_BUCKETS: [f64; 10] =
    [0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0, 10.0];

// ─── Descriptions ───────────────────────────────────────────────────

/// Registers HELP text for every metric.
///
/// Call once after installing the global recorder.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Source
    describe_counter!(
        LINES_HANDLED_TOTAL,
        "Total number of lines read from the tailed access log"
    );
    describe_counter!(
        LINES_OVERSIZED_TOTAL,
        "Total number of lines dropped for exceeding the length limit"
    );

    // Parser
    describe_counter!(
        PARSE_ERRORS_TOTAL,
        "Total number of lines rejected as malformed"
    );
    describe_counter!(
        EVENTS_PARSED_TOTAL,
        "Total number of records parsed into events"
    );
    describe_histogram!(
        LINE_QUEUE_WAIT_SECONDS,
        "Time a raw line waited for a parser in seconds"
    );

    // Sink
    describe_counter!(
        POINTS_WRITTEN_TOTAL,
        "Total number of measurement points accepted by the store"
    );
    describe_counter!(
        SINK_RETRIES_TOTAL,
        "Total number of retried point writes"
    );
    describe_histogram!(
        SINK_WRITE_DURATION_SECONDS,
        "Time to write a single measurement point in seconds"
    );

    // Monitor
    describe_gauge!(
        THROUGHPUT_PER_SECOND,
        "Lines handled per second over the last sample period"
    );
    describe_gauge!(READ_QUEUE_DEPTH, "Raw lines waiting for a parser");
    describe_gauge!(WRITE_QUEUE_DEPTH, "Parsed events waiting for a sink");
    describe_gauge!(UPTIME_SECONDS, "logship daemon uptime in seconds");
    describe_gauge!(BUILD_INFO, "Build information (always 1, with version label)");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        LINES_HANDLED_TOTAL,
        LINES_OVERSIZED_TOTAL,
        PARSE_ERRORS_TOTAL,
        EVENTS_PARSED_TOTAL,
        LINE_QUEUE_WAIT_SECONDS,
        POINTS_WRITTEN_TOTAL,
        SINK_RETRIES_TOTAL,
        SINK_WRITE_DURATION_SECONDS,
        THROUGHPUT_PER_SECOND,
        READ_QUEUE_DEPTH,
        WRITE_QUEUE_DEPTH,
        UPTIME_SECONDS,
        BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_logship_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("logship_"),
                "Metric '{}' does not start with 'logship_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            LINES_HANDLED_TOTAL,
            LINES_OVERSIZED_TOTAL,
            PARSE_ERRORS_TOTAL,
            EVENTS_PARSED_TOTAL,
            POINTS_WRITTEN_TOTAL,
            SINK_RETRIES_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // no recorder installed
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_REASON, LABEL_SINK] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn sink_write_buckets_are_sorted() {
        let buckets = SINK_WRITE_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(
                buckets[i] > buckets[i - 1],
                "Bucket values must be in ascending order"
            );
        }
    }
}
