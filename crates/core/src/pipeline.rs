//! Pipeline traits -- stage capability seams
//!
//! [`LineSource`] produces raw lines, [`EventSink`] delivers parsed events.
//! Both use RPITIT; [`DynEventSink`] is the dyn-compatible form so the
//! coordinator can hold `Arc<dyn DynEventSink>` chosen at runtime.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{LogshipError, SinkError};
use crate::types::{ParsedEvent, RawLine};

/// Boxed future used by the dyn-compatible traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pipeline health, reported by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// Running normally
    Healthy,
    /// Running, but under pressure
    Degraded(String),
    /// Not running
    Unhealthy(String),
}

impl HealthStatus {
    /// Whether the status is `Healthy`.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Whether the status is `Unhealthy`.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// Lifecycle shared by long-running components.
///
/// `Initialized -> Running -> Stopped`; starting twice or stopping a
/// component that never started is an error.
pub trait Pipeline: Send {
    /// Spawns the component's tasks.
    fn start(&mut self) -> impl Future<Output = Result<(), LogshipError>> + Send;

    /// Stops the component's tasks.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogshipError>> + Send;

    /// Reports current health.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// Receives monitor signals from the stages.
///
/// Implemented by the monitor handle; tests may plug in a counter.
pub trait SignalSink: Send + Sync {
    /// A raw line was read from the source.
    fn line_observed(&self) -> impl Future<Output = ()> + Send;

    /// A raw line was rejected by the parser.
    fn malformed_line(&self) -> impl Future<Output = ()> + Send;
}

/// Produces raw lines until cancelled or a fatal error occurs.
///
/// Implementations push into the bounded raw-line queue and emit a
/// `line_observed` signal per line before pushing.
pub trait LineSource: Send {
    /// Human-readable identifier (e.g. `file:/var/log/nginx/access.log`)
    fn describe(&self) -> String;

    /// Runs the read loop. Returns only on cancellation (`Ok`) or a fatal error.
    fn run<S>(
        self,
        out: mpsc::Sender<RawLine>,
        signals: S,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<(), LogshipError>> + Send
    where
        S: SignalSink + 'static;
}

/// Delivers parsed events to a time-series store.
///
/// Must be safe to call from several sink workers at once.
pub trait EventSink: Send + Sync {
    /// Sink name for logging (e.g. `influxdb`, `log`)
    fn name(&self) -> &str;

    /// Writes one measurement point for the event.
    fn deliver(&self, event: &ParsedEvent) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// dyn-compatible form of [`EventSink`].
pub trait DynEventSink: Send + Sync {
    /// Sink name
    fn name(&self) -> &str;

    /// Writes one measurement point for the event.
    fn deliver<'a>(&'a self, event: &'a ParsedEvent) -> BoxFuture<'a, Result<(), SinkError>>;
}

/// Every `EventSink` is a `DynEventSink`.
impl<T: EventSink> DynEventSink for T {
    fn name(&self) -> &str {
        EventSink::name(self)
    }

    fn deliver<'a>(&'a self, event: &'a ParsedEvent) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(EventSink::deliver(self, event))
    }
}
