//! CLI argument definitions for logship-daemon.
//!
//! Uses `clap` v4 derive macros. Flags override the config file and the
//! `LOGSHIP_*` environment variables.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use logship_core::config::LogshipConfig;
use logship_core::error::{ConfigError, LogshipError};

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "logship.toml";

/// Tails an nginx access log and ships request metrics to InfluxDB.
#[derive(Parser, Debug, Default)]
#[command(name = "logship-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logship.toml.
    ///
    /// Without this flag `./logship.toml` is read if it exists,
    /// otherwise built-in defaults are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Access log file to tail.
    #[arg(short, long)]
    pub source: Option<String>,

    /// Where to start reading (end, beginning).
    #[arg(long)]
    pub start_position: Option<String>,

    /// InfluxDB DSN: endpoint@token@organization@bucket.
    #[arg(long)]
    pub dsn: Option<String>,

    /// Sink kind (influxdb, log).
    #[arg(long)]
    pub sink: Option<String>,

    /// Status endpoint port.
    #[arg(long)]
    pub monitor_port: Option<u16>,

    /// Drain queued lines on shutdown instead of exiting at once.
    #[arg(long)]
    pub drain: bool,

    /// Validate the configuration and exit without starting.
    #[arg(long)]
    pub validate: bool,
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read from this file
    File(PathBuf),
    /// Default path missing; built-in defaults
    Defaults,
}

impl std::fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults => f.write_str("built-in defaults"),
        }
    }
}

impl DaemonCli {
    /// Applies flag overrides on top of file and environment settings.
    pub fn apply_overrides(&self, config: &mut LogshipConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(source) = &self.source {
            config.source.path.clone_from(source);
        }
        if let Some(position) = &self.start_position {
            config.source.start_position.clone_from(position);
        }
        if let Some(dsn) = &self.dsn {
            config.sink.dsn.clone_from(dsn);
        }
        if let Some(sink) = &self.sink {
            config.sink.kind.clone_from(sink);
        }
        if let Some(port) = self.monitor_port {
            config.monitor.port = port;
        }
        if self.drain {
            config.pipeline.drain_on_shutdown = true;
        }
    }

    /// Loads the effective configuration.
    ///
    /// Precedence: flags > environment > file > defaults. A missing file is
    /// an error only when `--config` named it.
    pub async fn load_config(&self) -> Result<(LogshipConfig, ConfigOrigin)> {
        let (path, explicit) = match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let (mut config, origin) = match LogshipConfig::from_file(&path).await {
            Ok(config) => (config, ConfigOrigin::File(path)),
            Err(LogshipError::Config(ConfigError::FileNotFound { .. })) if !explicit => {
                (LogshipConfig::default(), ConfigOrigin::Defaults)
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to load config {}: {}",
                    path.display(),
                    e
                ));
            }
        };

        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        Ok((config, origin))
    }
}
