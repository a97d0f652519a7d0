//! Daemon orchestration -- assembly, lifecycle and the signal loop.
//!
//! The [`Orchestrator`] builds the log pipeline from the loaded
//! configuration, starts it, serves the status endpoint and waits for one
//! of:
//!
//! - a fatal pipeline error (source read failure, sink failure after retries),
//! - the status server stopping,
//! - SIGHUP, SIGINT, SIGTERM or SIGQUIT.
//!
//! SIGUSR1 logs the pipeline state and monitor snapshot and keeps running.
//! Every exit path stops the pipeline; with `drain_on_shutdown` queued lines
//! are delivered first.

use std::time::Instant;

use anyhow::Result;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logship_core::config::LogshipConfig;
use logship_core::pipeline::Pipeline;
use logship_pipeline::{LogPipeline, LogPipelineBuilder, LogPipelineError, PipelineConfig};

use crate::{metrics_server, status_server};

/// Exit status after a shutdown signal.
pub const SIGNAL_EXIT_CODE: u8 = 1;

/// The daemon orchestrator.
pub struct Orchestrator {
    /// Validated configuration
    config: LogshipConfig,
    /// The access log pipeline
    pipeline: LogPipeline,
    /// First fatal pipeline error
    fatal_rx: mpsc::Receiver<LogPipelineError>,
    /// Stops the status server
    shutdown: CancellationToken,
    /// Daemon start time
    start_time: Instant,
}

impl Orchestrator {
    /// Build from an already-loaded configuration.
    ///
    /// Validates the configuration, installs the metrics recorder when
    /// enabled, and builds (but does not start) the pipeline.
    pub fn build_from_config(config: LogshipConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let pipeline_config = PipelineConfig::from_core(&config)
            .map_err(|e| anyhow::anyhow!("invalid pipeline config: {}", e))?;
        let (pipeline, fatal_rx) = LogPipelineBuilder::new()
            .config(pipeline_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        tracing::info!(
            source = %config.source.path,
            sink = pipeline.sink_name(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            fatal_rx,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and status endpoint, then wait for shutdown.
    ///
    /// Returns the name of the signal that ended the run. A fatal pipeline
    /// error, a status server failure or a startup failure is returned as
    /// `Err`, after the pipeline has been stopped.
    pub async fn run(&mut self) -> Result<&'static str> {
        let mut signals = ShutdownSignals::install()?;
        let mut usr1 = install(SignalKind::user_defined1(), "SIGUSR1")?;

        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;

        let mut status_task = if self.config.monitor.enabled {
            match status_server::bind(&self.config.monitor).await {
                Ok(listener) => {
                    let router =
                        status_server::router(&self.config.monitor.path, self.pipeline.monitor());
                    Some(status_server::spawn(listener, router, self.shutdown.clone()))
                }
                Err(e) => {
                    self.stop_pipeline().await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        tracing::info!("entering main event loop");
        let outcome = loop {
            tokio::select! {
                fatal = self.pipeline.run(&mut self.fatal_rx) => {
                    break Err(anyhow::anyhow!("pipeline failed: {}", fatal));
                }
                result = join_status(&mut status_task) => {
                    break Err(match result {
                        Ok(()) => anyhow::anyhow!("status server stopped unexpectedly"),
                        Err(e) => e,
                    });
                }
                name = signals.recv() => {
                    tracing::info!(signal = name, "shutdown signal received");
                    break Ok(name);
                }
                _ = usr1.recv() => self.log_status().await,
            }
        };

        self.shutdown.cancel();
        if let Some(task) = status_task.take() {
            let _ = task.await;
        }
        self.stop_pipeline().await;

        outcome
    }

    /// Logs state, health and the monitor snapshot.
    pub async fn log_status(&self) {
        let health = self.pipeline.health_check().await;
        if !self.pipeline.is_running() {
            tracing::info!(state = self.pipeline.state_name(), health = ?health, "status");
            return;
        }
        match self.pipeline.snapshot().await {
            Ok(snapshot) => tracing::info!(
                state = self.pipeline.state_name(),
                health = ?health,
                offset = ?self.pipeline.offset(),
                uptime_secs = self.start_time.elapsed().as_secs(),
                snapshot = %serde_json::to_string(&snapshot).unwrap_or_default(),
                "status"
            ),
            Err(e) => tracing::warn!(
                state = self.pipeline.state_name(),
                health = ?health,
                error = %e,
                "status requested but monitor is unavailable"
            ),
        }
    }

    /// Current pipeline state name.
    pub fn pipeline_state(&self) -> &'static str {
        self.pipeline.state_name()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogshipConfig {
        &self.config
    }

    async fn stop_pipeline(&mut self) {
        if !self.pipeline.is_running() {
            return;
        }
        if let Err(e) = self.pipeline.stop().await {
            tracing::error!(error = %e, "failed to stop log pipeline");
        }
    }
}

/// Waits on the status server task; never resolves when there is none.
async fn join_status(task: &mut Option<JoinHandle<Result<()>>>) -> Result<()> {
    let Some(handle) = task.as_mut() else {
        return std::future::pending().await;
    };
    let result = handle.await;
    *task = None;
    match result {
        Ok(inner) => inner,
        Err(e) => Err(anyhow::anyhow!("status server task failed: {}", e)),
    }
}

fn install(kind: SignalKind, name: &str) -> Result<Signal> {
    signal(kind).map_err(|e| anyhow::anyhow!("failed to install {} handler: {}", name, e))
}

/// Signals that end the process
struct ShutdownSignals {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            hangup: install(SignalKind::hangup(), "SIGHUP")?,
            interrupt: install(SignalKind::interrupt(), "SIGINT")?,
            terminate: install(SignalKind::terminate(), "SIGTERM")?,
            quit: install(SignalKind::quit(), "SIGQUIT")?,
        })
    }

    /// Waits for the next shutdown signal and returns its name.
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}
