//! Progress reporting for slow fetches
//!
//! A [`ProgressSink`] receives `(current, total, message)` triples. Sinks are
//! purely observational: a failed delivery is logged and dropped, it never
//! fails the fetch that produced it.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Total reported with every progress event
pub const PROGRESS_TOTAL: u32 = 100;

/// Errors a sink may return when delivering an event
#[derive(Debug, Error)]
pub enum ProgressError {
    /// The consumer went away
    #[error("progress consumer closed")]
    Closed,

    /// Delivery failed for another reason
    #[error("progress delivery failed: {0}")]
    Delivery(String),
}

/// Destination for progress events
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Deliver one event
    async fn report(&self, current: u32, total: u32, message: &str) -> Result<(), ProgressError>;
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _current: u32, _total: u32, _message: &str) -> Result<(), ProgressError> {
        Ok(())
    }
}

/// Sink that writes events to the `tracing` log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

#[async_trait]
impl ProgressSink for TracingProgress {
    async fn report(&self, current: u32, total: u32, message: &str) -> Result<(), ProgressError> {
        info!("[{}/{}] {}", current, total, message);
        Ok(())
    }
}

/// One delivered progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Position reached
    pub current: u32,
    /// Position that means done
    pub total: u32,
    /// What is happening
    pub message: String,
}

/// Sink that forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    /// Create a sink and the receiver its events arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelProgress {
    async fn report(&self, current: u32, total: u32, message: &str) -> Result<(), ProgressError> {
        self.tx
            .send(ProgressEvent {
                current,
                total,
                message: message.to_string(),
            })
            .map_err(|_| ProgressError::Closed)
    }
}

/// A slice `[lo, hi)` of the overall `[0, 100]` progress scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressRange {
    /// Start of the slice
    pub lo: f64,
    /// End of the slice
    pub hi: f64,
}

impl ProgressRange {
    /// The whole scale
    pub fn full() -> Self {
        Self {
            lo: 0.0,
            hi: f64::from(PROGRESS_TOTAL),
        }
    }

    /// Create a slice
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Width of the slice
    pub fn span(&self) -> f64 {
        self.hi - self.lo
    }

    /// Point at fraction `frac` of the slice
    pub fn at(&self, frac: f64) -> f64 {
        self.lo + frac.clamp(0.0, 1.0) * self.span()
    }

    /// The part of the slice from fraction `frac` to the end
    pub fn tail(&self, frac: f64) -> Self {
        Self::new(self.at(frac), self.hi)
    }

    /// The `i`-th of `n` equal sub-slices
    pub fn split(&self, i: usize, n: usize) -> Self {
        if n == 0 {
            return *self;
        }
        let step = self.span() / n as f64;
        Self::new(self.lo + i as f64 * step, self.lo + (i + 1) as f64 * step)
    }
}

/// Sink that squeezes a nested operation's `[0, total]` into a slice of
/// another sink's scale
///
/// Lets a search hand its sink to the hierarchy fetch it runs first, so the
/// fetch's milestones show up inside the search's own range.
pub struct ScaledProgress<'a> {
    sink: &'a dyn ProgressSink,
    range: ProgressRange,
}

impl<'a> ScaledProgress<'a> {
    /// Forward to `sink`, mapped into `range`
    pub fn new(sink: &'a dyn ProgressSink, range: ProgressRange) -> Self {
        Self { sink, range }
    }
}

#[async_trait]
impl<'a> ProgressSink for ScaledProgress<'a> {
    async fn report(&self, current: u32, total: u32, message: &str) -> Result<(), ProgressError> {
        let frac = if total == 0 {
            1.0
        } else {
            f64::from(current) / f64::from(total)
        };
        let position = self.range.at(frac).floor() as u32;
        self.sink.report(position, PROGRESS_TOTAL, message).await
    }
}

/// Monotonic, fire-and-forget front end to a [`ProgressSink`]
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    last: AtomicU32,
}

impl<'a> ProgressReporter<'a> {
    /// Wrap a sink
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last: AtomicU32::new(0),
        }
    }

    /// Report a position on the `[0, 100]` scale
    ///
    /// Positions are floored and never move backwards.
    pub async fn emit(&self, position: f64, message: &str) {
        let position = position.clamp(0.0, f64::from(PROGRESS_TOTAL)).floor() as u32;
        let current = self.last.fetch_max(position, Ordering::Relaxed).max(position);
        if let Err(e) = self.sink.report(current, PROGRESS_TOTAL, message).await {
            warn!("Dropped progress event at {}: {}", current, e);
        }
    }

    /// Report completion
    pub async fn finish(&self, message: &str) {
        self.emit(f64::from(PROGRESS_TOTAL), message).await;
    }

    /// Last position reported
    pub fn last(&self) -> u32 {
        self.last.load(Ordering::Relaxed)
    }
}
