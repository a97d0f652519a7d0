//! logship.toml integration tests
//!
//! - logship.toml.example parses and matches code defaults
//! - partial files merge with defaults
//! - environment overrides win over the file

use logship_core::config::LogshipConfig;
use logship_core::error::{ConfigError, LogshipError};

const EXAMPLE: &str = include_str!("../../../logship.toml.example");

// =============================================================================
// logship.toml.example
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = LogshipConfig::parse(EXAMPLE).expect("example config should parse");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.source.path, "./access.log");
}

#[test]
fn example_config_passes_validation() {
    let config = LogshipConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let from_file = LogshipConfig::parse(EXAMPLE).expect("should parse");
    let from_code = LogshipConfig::default();

    assert_eq!(from_file.source.path, from_code.source.path);
    assert_eq!(
        from_file.source.poll_interval_ms,
        from_code.source.poll_interval_ms
    );
    assert_eq!(
        from_file.source.start_position,
        from_code.source.start_position
    );
    assert_eq!(from_file.source.start_offset, from_code.source.start_offset);
    assert_eq!(
        from_file.source.max_line_length,
        from_code.source.max_line_length
    );

    assert_eq!(
        from_file.pipeline.read_queue_capacity,
        from_code.pipeline.read_queue_capacity
    );
    assert_eq!(
        from_file.pipeline.write_queue_capacity,
        from_code.pipeline.write_queue_capacity
    );
    assert_eq!(
        from_file.pipeline.parser_workers,
        from_code.pipeline.parser_workers
    );
    assert_eq!(
        from_file.pipeline.sink_workers,
        from_code.pipeline.sink_workers
    );
    assert_eq!(
        from_file.pipeline.drain_on_shutdown,
        from_code.pipeline.drain_on_shutdown
    );

    assert_eq!(from_file.sink.kind, from_code.sink.kind);
    assert_eq!(from_file.sink.dsn, from_code.sink.dsn);
    assert_eq!(from_file.sink.measurement, from_code.sink.measurement);
    assert_eq!(from_file.sink.max_attempts, from_code.sink.max_attempts);

    assert_eq!(from_file.monitor.port, from_code.monitor.port);
    assert_eq!(from_file.monitor.path, from_code.monitor.path);
    assert_eq!(
        from_file.monitor.sample_period_secs,
        from_code.monitor.sample_period_secs
    );

    assert_eq!(from_file.metrics.enabled, from_code.metrics.enabled);
    assert_eq!(from_file.metrics.port, from_code.metrics.port);
}

// =============================================================================
// partial files
// =============================================================================

#[test]
fn partial_config_sink_only() {
    let toml = r#"
[sink]
kind = "log"
"#;
    let config = LogshipConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.sink.kind, "log");
    assert_eq!(config.sink.measurement, "nginx_logs");
    assert_eq!(config.pipeline.sink_workers, 4);
}

#[test]
fn partial_config_with_start_offset() {
    let toml = r#"
[source]
path = "/var/log/nginx/access.log"
start_offset = 4096
"#;
    let config = LogshipConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.source.start_offset, Some(4096));
    assert_eq!(config.source.start_position, "end");
}

#[test]
fn wrong_type_is_parse_error() {
    let toml = r#"
[pipeline]
parser_workers = "two"
"#;
    let err = LogshipConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        LogshipError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// environment precedence
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[monitor]
port = 9300
"#;

    let original = std::env::var("LOGSHIP_MONITOR_PORT").ok();
    // SAFETY: serialized by serial_test; no concurrent env access.
    unsafe {
        std::env::set_var("LOGSHIP_MONITOR_PORT", "9400");
    }

    let mut config = LogshipConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.monitor.port;

    // SAFETY: test cleanup
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSHIP_MONITOR_PORT", val),
            None => std::env::remove_var("LOGSHIP_MONITOR_PORT"),
        }
    }

    assert_eq!(result, 9400);
}

#[test]
#[serial_test::serial]
fn env_override_sink_dsn() {
    let original = std::env::var("LOGSHIP_SINK_DSN").ok();
    // SAFETY: serialized by serial_test; no concurrent env access.
    unsafe {
        std::env::set_var("LOGSHIP_SINK_DSN", "http://influx:8086@t@o@b");
    }

    let mut config = LogshipConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.sink.dsn.clone();

    // SAFETY: test cleanup
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSHIP_SINK_DSN", val),
            None => std::env::remove_var("LOGSHIP_SINK_DSN"),
        }
    }

    assert_eq!(result, "http://influx:8086@t@o@b");
}

#[tokio::test]
#[serial_test::serial]
async fn load_applies_env_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logship.toml");
    std::fs::write(&path, "[pipeline]\nparser_workers = 3\n").expect("write");

    let original = std::env::var("LOGSHIP_PIPELINE_SINK_WORKERS").ok();
    // SAFETY: serialized by serial_test; no concurrent env access.
    unsafe {
        std::env::set_var("LOGSHIP_PIPELINE_SINK_WORKERS", "0");
    }

    let result = LogshipConfig::load(&path).await;

    // SAFETY: test cleanup
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSHIP_PIPELINE_SINK_WORKERS", val),
            None => std::env::remove_var("LOGSHIP_PIPELINE_SINK_WORKERS"),
        }
    }

    let err = result.expect_err("zero sink workers must fail validation");
    assert!(err.to_string().contains("sink_workers"));
}
