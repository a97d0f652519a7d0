//! Monitor -- live pipeline statistics
//!
//! A single task owns every counter. Stages talk to it through a
//! [`MonitorHandle`]:
//!
//! ```text
//! tailer  --line_observed-->  +---------+  <--snapshot(oneshot)-- status endpoint
//! parsers --malformed_line--> | Monitor |
//!                             +---------+  --every period--> ThroughputWindow
//! ```
//!
//! Pending signals are drained before every sample and every snapshot,
//! so a snapshot accounts for everything sent before it was requested.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use logship_core::metrics as m;
use logship_core::pipeline::SignalSink;

use crate::error::LogPipelineError;

/// Capacity of the snapshot request channel
const QUERY_CAPACITY: usize = 16;

/// Events reported by the stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorSignal {
    /// The source read a line
    LineObserved,
    /// A line was rejected
    MalformedLine,
}

/// Point-in-time statistics
///
/// Serialized with the status endpoint's field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    /// Lines read from the source
    #[serde(rename = "handleLine")]
    pub lines_handled: u64,
    /// Lines per second over the last sample period
    #[serde(rename = "tps")]
    pub throughput_per_second: f64,
    /// Raw lines waiting for a parser
    #[serde(rename = "readChanLen")]
    pub read_queue_depth: usize,
    /// Parsed events waiting for a sink
    #[serde(rename = "writeChanLen")]
    pub write_queue_depth: usize,
    /// Time since the monitor started
    #[serde(rename = "runTime", serialize_with = "serialize_run_time")]
    pub run_duration: Duration,
    /// Malformed lines
    #[serde(rename = "errNumber")]
    pub error_count: u64,
}

impl MonitorSnapshot {
    /// Tab-indented JSON, as served by the status endpoint.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::with_capacity(256);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn serialize_run_time<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_run_duration(*d))
}

/// Formats a duration as `1h2m3.5s`, `1m30s`, `1.5ms` or `0s`.
pub fn format_run_duration(d: Duration) -> String {
    const NANOS_PER_SEC: u128 = 1_000_000_000;

    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_owned();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", fixed_point(nanos, 1_000));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", fixed_point(nanos, 1_000_000));
    }

    let total_secs = nanos / NANOS_PER_SEC;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = fixed_point(nanos % (60 * NANOS_PER_SEC), NANOS_PER_SEC);

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// `value / unit` with the remainder as trailing-zero-free decimals.
fn fixed_point(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Two-sample rolling window of the lines-handled counter
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    samples: VecDeque<u64>,
    period_secs: u64,
}

impl ThroughputWindow {
    /// Window for samples taken every `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(2),
            period_secs: period.as_secs().max(1),
        }
    }

    /// Records the counter value at a tick; keeps the last two.
    pub fn push(&mut self, lines_handled: u64) {
        if self.samples.len() == 2 {
            self.samples.pop_front();
        }
        self.samples.push_back(lines_handled);
    }

    /// `(latest - previous) / period` in whole lines per second.
    ///
    /// Zero until two samples exist.
    pub fn per_second(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(prev), Some(latest)) if self.samples.len() == 2 => {
                (latest.saturating_sub(*prev) / self.period_secs) as f64
            }
            _ => 0.0,
        }
    }
}

/// Reads a queue's depth without keeping the queue open
///
/// The depth is read through a weak sender. Once the producers have gone
/// (the source stopped during a drain, or the parsers finished) the probe
/// reports 0 even if items are still waiting for a consumer.
#[derive(Clone)]
pub struct QueueProbe {
    depth: Arc<dyn Fn() -> usize + Send + Sync>,
}

impl QueueProbe {
    /// Probe over a bounded sender; holds only a weak reference.
    ///
    /// Reports 0 once every strong sender is gone, queued items or not.
    pub fn from_sender<T: Send + 'static>(tx: &mpsc::Sender<T>) -> Self {
        let weak = tx.downgrade();
        Self {
            depth: Arc::new(move || {
                weak.upgrade()
                    .map_or(0, |tx| tx.max_capacity() - tx.capacity())
            }),
        }
    }

    /// Probe that always reports 0.
    pub fn detached() -> Self {
        Self {
            depth: Arc::new(|| 0),
        }
    }

    /// Items currently queued.
    pub fn depth(&self) -> usize {
        (self.depth)()
    }
}

impl std::fmt::Debug for QueueProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProbe")
            .field("depth", &self.depth())
            .finish()
    }
}

/// Cloneable handle to the monitor task
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    signals: mpsc::Sender<MonitorSignal>,
    queries: mpsc::Sender<oneshot::Sender<MonitorSnapshot>>,
}

impl MonitorHandle {
    /// Sends a signal; waits while the signal channel is full.
    pub async fn signal(&self, signal: MonitorSignal) {
        if self.signals.send(signal).await.is_err() {
            debug!(?signal, "monitor stopped, signal dropped");
        }
    }

    /// Requests a snapshot from the monitor task.
    pub async fn snapshot(&self) -> Result<MonitorSnapshot, LogPipelineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queries
            .send(reply_tx)
            .await
            .map_err(|_| LogPipelineError::Channel("monitor stopped".to_owned()))?;
        reply_rx
            .await
            .map_err(|_| LogPipelineError::Channel("monitor dropped snapshot request".to_owned()))
    }
}

impl SignalSink for MonitorHandle {
    async fn line_observed(&self) {
        self.signal(MonitorSignal::LineObserved).await;
    }

    async fn malformed_line(&self) {
        self.signal(MonitorSignal::MalformedLine).await;
    }
}

/// Monitor task state
pub struct Monitor {
    signals_rx: mpsc::Receiver<MonitorSignal>,
    queries_rx: mpsc::Receiver<oneshot::Sender<MonitorSnapshot>>,
    signal_capacity: usize,
    read_probe: QueueProbe,
    write_probe: QueueProbe,
    sample_period: Duration,
    window: ThroughputWindow,
    started_at: Instant,
    lines_handled: u64,
    error_count: u64,
    throughput: f64,
}

impl Monitor {
    /// Creates the monitor and its handle.
    pub fn new(
        sample_period: Duration,
        signal_capacity: usize,
        read_probe: QueueProbe,
        write_probe: QueueProbe,
    ) -> (Self, MonitorHandle) {
        let signal_capacity = signal_capacity.max(1);
        let (signals_tx, signals_rx) = mpsc::channel(signal_capacity);
        let (queries_tx, queries_rx) = mpsc::channel(QUERY_CAPACITY);

        let monitor = Self {
            signals_rx,
            queries_rx,
            signal_capacity,
            read_probe,
            write_probe,
            sample_period,
            window: ThroughputWindow::new(sample_period),
            started_at: Instant::now(),
            lines_handled: 0,
            error_count: 0,
            throughput: 0.0,
        };
        let handle = MonitorHandle {
            signals: signals_tx,
            queries: queries_tx,
        };
        (monitor, handle)
    }

    /// Runs until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.started_at = Instant::now();
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.sample_period, self.sample_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => self.sample(),
                Some(reply) = self.queries_rx.recv() => {
                    self.drain_signals();
                    let _ = reply.send(self.snapshot());
                }
                Some(signal) = self.signals_rx.recv() => self.apply(signal),
            }
        }

        debug!(
            lines_handled = self.lines_handled,
            errors = self.error_count,
            "monitor stopped"
        );
    }

    fn apply(&mut self, signal: MonitorSignal) {
        match signal {
            MonitorSignal::LineObserved => {
                self.lines_handled += 1;
                metrics::counter!(m::LINES_HANDLED_TOTAL).increment(1);
            }
            MonitorSignal::MalformedLine => self.error_count += 1,
        }
    }

    /// Applies signals already queued, at most one channel's worth.
    fn drain_signals(&mut self) {
        for _ in 0..self.signal_capacity {
            match self.signals_rx.try_recv() {
                Ok(signal) => self.apply(signal),
                Err(_) => break,
            }
        }
    }

    fn sample(&mut self) {
        self.drain_signals();
        self.window.push(self.lines_handled);
        self.throughput = self.window.per_second();

        metrics::gauge!(m::THROUGHPUT_PER_SECOND).set(self.throughput);
        metrics::gauge!(m::READ_QUEUE_DEPTH).set(self.read_probe.depth() as f64);
        metrics::gauge!(m::WRITE_QUEUE_DEPTH).set(self.write_probe.depth() as f64);
        metrics::gauge!(m::UPTIME_SECONDS).set(self.started_at.elapsed().as_secs_f64());
    }

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            lines_handled: self.lines_handled,
            throughput_per_second: self.throughput,
            read_queue_depth: self.read_probe.depth(),
            write_queue_depth: self.write_probe.depth(),
            run_duration: self.started_at.elapsed(),
            error_count: self.error_count,
        }
    }
}
