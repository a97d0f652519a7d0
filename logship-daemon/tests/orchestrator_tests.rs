//! Orchestrator integration tests.
//!
//! Tests the flow: config -> build -> run -> fatal error / startup failure.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use logship_core::config::LogshipConfig;
use logship_daemon::orchestrator::Orchestrator;

const GOOD_LINE: &str = r#"127.0.0.1 - - [01/Jan/2024:00:00:00 +0000] https "GET /a/b?x=1 HTTP/1.1" 200 512 "-" "curl/8.0" "-" 0.001 0.002"#;

/// Config tailing `path`, status endpoint on an ephemeral local port.
fn test_config(path: &Path) -> LogshipConfig {
    let mut config = LogshipConfig::default();
    config.source.path = path.display().to_string();
    config.source.poll_interval_ms = 10;
    config.sink.kind = "log".to_owned();
    config.monitor.listen_addr = "127.0.0.1".to_owned();
    config.monitor.port = 0;
    config
}

#[test]
fn test_build_rejects_invalid_config() {
    // Given: Zero parser workers
    let mut config = LogshipConfig::default();
    config.pipeline.parser_workers = 0;

    // When / Then
    let err = Orchestrator::build_from_config(config)
        .err()
        .expect("invalid config must fail");
    assert!(err.to_string().contains("parser_workers"), "{err}");
}

#[test]
fn test_build_leaves_pipeline_initialized() {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let orchestrator = Orchestrator::build_from_config(test_config(file.path()))
        .expect("orchestrator should build");

    assert_eq!(orchestrator.pipeline_state(), "initialized");
    assert_eq!(orchestrator.config().sink.kind, "log");
}

#[tokio::test]
async fn test_run_fails_when_source_is_missing() {
    // Given: A source path that does not exist
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(&dir.path().join("gone.log"));
    let mut orchestrator =
        Orchestrator::build_from_config(config).expect("orchestrator should build");

    // When: Running
    let err = orchestrator.run().await.expect_err("run must fail");

    // Then: Startup error, pipeline never ran
    assert!(err.to_string().contains("failed to start log pipeline"), "{err}");
    assert_eq!(orchestrator.pipeline_state(), "initialized");
}

#[tokio::test]
async fn test_run_fails_when_status_port_is_taken() {
    // Given: The status port already bound
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("should bind");
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let mut config = test_config(file.path());
    config.monitor.port = taken.local_addr().expect("local addr").port();

    let mut orchestrator = Orchestrator::build_from_config(config).expect("should build");

    // When / Then: Bind failure is fatal and the pipeline is stopped
    let err = orchestrator.run().await.expect_err("run must fail");
    assert!(err.to_string().contains("failed to bind status endpoint"), "{err}");
    assert_eq!(orchestrator.pipeline_state(), "stopped");
}

#[tokio::test]
async fn test_sink_failure_ends_run() {
    // Given: An InfluxDB endpoint nobody listens on, no retries
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let mut config = test_config(file.path());
    config.sink.kind = "influxdb".to_owned();
    config.sink.dsn = "http://127.0.0.1:1@token@org@bucket".to_owned();
    config.sink.max_attempts = 1;
    config.sink.timeout_secs = 2;

    let mut orchestrator = Orchestrator::build_from_config(config).expect("should build");
    let run = tokio::spawn(async move {
        let result = orchestrator.run().await;
        (result, orchestrator.pipeline_state())
    });

    // When: A line is appended
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut f = std::fs::OpenOptions::new()
        .append(true)
        .open(file.path())
        .expect("open for append");
    writeln!(f, "{GOOD_LINE}").expect("append line");

    // Then: The run ends with the sink error and the pipeline is stopped
    let (result, state) = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run should end")
        .expect("task should not panic");
    let err = result.expect_err("sink failure must be fatal");
    assert!(err.to_string().contains("pipeline failed"), "{err}");
    assert_eq!(state, "stopped");
}

#[tokio::test]
async fn test_status_can_be_logged_before_start() {
    // Given: A built but not started orchestrator
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let orchestrator = Orchestrator::build_from_config(test_config(file.path()))
        .expect("should build");

    // When / Then: log_status returns without waiting on the monitor
    tokio::time::timeout(Duration::from_secs(1), orchestrator.log_status())
        .await
        .expect("log_status should not block");
}
