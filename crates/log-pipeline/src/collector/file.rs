//! File tailer
//!
//! Follows a growing file the way `tail -f` does, by polling: read until
//! end of file, sleep for the poll interval, read again.
//!
//! - Opening starts at the end of the file by default; history is skipped.
//! - A partial line at end of file stays buffered until its newline arrives.
//! - Lines over `max_line_length` are dropped and reported as malformed.
//! - Any read error other than end of file is fatal.
//!
//! Rotation and truncation are not followed.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logship_core::error::LogshipError;
use logship_core::metrics as m;
use logship_core::pipeline::{LineSource, SignalSink};
use logship_core::types::RawLine;

use crate::config::{PipelineConfig, StartPosition};
use crate::error::LogPipelineError;

/// Read buffer size
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Tailer settings
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// File to follow
    pub path: PathBuf,
    /// Sleep at end of file
    pub poll_interval: Duration,
    /// Initial read position
    pub start_position: StartPosition,
    /// Longest accepted line in bytes, terminator excluded
    pub max_line_length: usize,
}

impl TailerConfig {
    /// Extracts tailer settings from the pipeline settings.
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            path: config.source_path.clone(),
            poll_interval: config.poll_interval(),
            start_position: config.start_position,
            max_line_length: config.max_line_length,
        }
    }
}

/// Byte offset just past the last line the queue accepted (or skipped as oversized).
///
/// Shared with the pipeline so a restart can resume with
/// `StartPosition::Offset` without re-reading lines.
#[derive(Debug, Clone, Default)]
pub struct TailOffset(Arc<AtomicU64>);

impl TailOffset {
    /// Current committed offset.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, offset: u64) {
        self.0.store(offset, Ordering::Release);
    }
}

/// Result of one read attempt
#[derive(Debug, PartialEq)]
enum ReadOutcome {
    /// A complete line, terminator stripped, and the offset just past it
    Line { data: Bytes, end: u64 },
    /// A line over the length limit was skipped
    Oversized { len: usize, end: u64 },
    /// End of file reached without a complete line
    Pending,
}

/// Polling file tailer
///
/// Created with [`FileTailer::open`], driven by [`LineSource::run`].
pub struct FileTailer {
    config: TailerConfig,
    reader: BufReader<File>,
    /// Bytes of the line currently being assembled
    pending: BytesMut,
    /// Set while skipping the rest of an oversized line
    discarding: bool,
    /// Length of the oversized line being skipped
    discarded: usize,
    /// Offset of the next byte to read
    read_offset: u64,
    committed: TailOffset,
}

impl FileTailer {
    /// Opens the file and seeks to the configured start position.
    ///
    /// Fails if the file cannot be opened or the seek fails.
    pub async fn open(config: TailerConfig) -> Result<Self, LogPipelineError> {
        let collector_error = |action: &str, e: std::io::Error| LogPipelineError::Collector {
            source_type: "file".to_owned(),
            reason: format!("failed to {action} {}: {e}", config.path.display()),
        };

        let mut file = File::open(&config.path)
            .await
            .map_err(|e| collector_error("open", e))?;

        let seek = match config.start_position {
            StartPosition::End => SeekFrom::End(0),
            StartPosition::Beginning => SeekFrom::Start(0),
            StartPosition::Offset(offset) => {
                let len = file
                    .metadata()
                    .await
                    .map_err(|e| collector_error("stat", e))?
                    .len();
                if offset > len {
                    warn!(
                        path = %config.path.display(),
                        offset,
                        len,
                        "start offset is past end of file, waiting for the file to grow"
                    );
                }
                SeekFrom::Start(offset)
            }
        };
        let position = file
            .seek(seek)
            .await
            .map_err(|e| collector_error("seek", e))?;

        info!(
            path = %config.path.display(),
            offset = position,
            "tailing file"
        );

        let committed = TailOffset::default();
        committed.set(position);

        Ok(Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            pending: BytesMut::new(),
            discarding: false,
            discarded: 0,
            read_offset: position,
            committed,
            config,
        })
    }

    /// Handle to the committed offset; stays valid after `run` consumes the tailer.
    pub fn offset(&self) -> TailOffset {
        self.committed.clone()
    }

    /// Reads buffered bytes until a line completes or end of file.
    ///
    /// Partial lines survive across calls in `pending`. Does not commit the
    /// offset; the caller does once the line is accepted.
    async fn next_line(&mut self) -> std::io::Result<ReadOutcome> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(ReadOutcome::Pending);
            }

            match available.iter().position(|&b| b == b'\n') {
                Some(idx) => {
                    let fits = !self.discarding
                        && self.pending.len() + idx <= self.config.max_line_length;
                    if fits {
                        self.pending.extend_from_slice(&available[..idx]);
                    }
                    let oversized_len = self.discarded + self.pending.len() + idx;
                    self.reader.consume(idx + 1);
                    self.read_offset += (idx + 1) as u64;
                    let end = self.read_offset;

                    if fits {
                        let mut data = self.pending.split().freeze();
                        if data.last() == Some(&b'\r') {
                            data.truncate(data.len() - 1);
                        }
                        return Ok(ReadOutcome::Line { data, end });
                    }

                    self.pending.clear();
                    self.discarding = false;
                    self.discarded = 0;
                    return Ok(ReadOutcome::Oversized {
                        len: oversized_len,
                        end,
                    });
                }
                None => {
                    let n = available.len();
                    if self.discarding {
                        self.discarded += n;
                    } else if self.pending.len() + n > self.config.max_line_length {
                        self.discarding = true;
                        self.discarded = self.pending.len() + n;
                        self.pending.clear();
                    } else {
                        self.pending.extend_from_slice(available);
                    }
                    self.reader.consume(n);
                    self.read_offset += n as u64;
                }
            }
        }
    }

    async fn tail_loop<S: SignalSink>(
        mut self,
        out: mpsc::Sender<RawLine>,
        signals: S,
        cancel: CancellationToken,
    ) -> Result<(), LogPipelineError> {
        let path = self.config.path.display().to_string();

        loop {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.next_line() => result.map_err(|e| LogPipelineError::Collector {
                    source_type: "file".to_owned(),
                    reason: format!("read failed on {path}: {e}"),
                })?,
            };

            match outcome {
                ReadOutcome::Line { data, end } => {
                    signals.line_observed().await;
                    let line = RawLine::new(data);
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        sent = out.send(line) => {
                            if sent.is_err() {
                                return Err(LogPipelineError::Channel(
                                    "raw-line queue closed".to_owned(),
                                ));
                            }
                            self.committed.set(end);
                        }
                    }
                }
                ReadOutcome::Oversized { len, end } => {
                    self.committed.set(end);
                    warn!(
                        path = %path,
                        len,
                        max = self.config.max_line_length,
                        "dropping line over the length limit"
                    );
                    metrics::counter!(m::LINES_OVERSIZED_TOTAL).increment(1);
                    signals.line_observed().await;
                    signals.malformed_line().await;
                }
                ReadOutcome::Pending => {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        debug!(
            path = %path,
            offset = self.committed.get(),
            "tailer stopped"
        );
        Ok(())
    }
}

impl LineSource for FileTailer {
    fn describe(&self) -> String {
        format!("file:{}", self.config.path.display())
    }

    async fn run<S>(
        self,
        out: mpsc::Sender<RawLine>,
        signals: S,
        cancel: CancellationToken,
    ) -> Result<(), LogshipError>
    where
        S: SignalSink + 'static,
    {
        self.tail_loop(out, signals, cancel)
            .await
            .map_err(LogshipError::from)
    }
}
