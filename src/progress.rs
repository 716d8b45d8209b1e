//! Progress reporting for uploads and conversions.
//!
//! DESIGN
//! ======
//! The pipeline never owns a progress display. Callers pass an
//! `Arc<dyn ProgressSink>` into each ingestion call and decide what to do
//! with the events: forward them over a channel, drive a progress bar, or
//! log them. Each event is independent; fractions from concurrent upload
//! tasks are not aggregated.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

// =============================================================================
// TYPES
// =============================================================================

/// Which half of an ingestion a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Uploading,
    Converting,
}

impl ProgressPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Converting => "converting",
        }
    }
}

/// One progress update. `fraction` is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub fraction: f64,
}

impl ProgressEvent {
    /// Build an event, clamping `fraction` into `[0, 1]`.
    #[must_use]
    pub fn new(phase: ProgressPhase, fraction: f64) -> Self {
        Self { phase, fraction: clamp_fraction(fraction) }
    }
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) }
}

/// Receiver for progress events. Implementations must be cheap and
/// non-blocking; they are called from inside upload and conversion tasks.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

// =============================================================================
// SINKS
// =============================================================================

/// Discards every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Forwards events over an unbounded channel. A closed receiver is ignored.
impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn on_progress(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

/// Logs a line each time a phase's whole-number percentage changes.
///
/// Keeps one percentage per phase, mirroring a pair of loading bars.
pub struct ProgressLog {
    percents: Mutex<[Option<u8>; 2]>,
}

impl ProgressLog {
    #[must_use]
    pub fn new() -> Self {
        Self { percents: Mutex::new([None, None]) }
    }

    /// Last recorded whole percentage for `phase`, if any event arrived.
    #[must_use]
    pub fn percent(&self, phase: ProgressPhase) -> Option<u8> {
        self.percents.lock().ok().and_then(|p| p[slot(phase)])
    }
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressLog {
    fn on_progress(&self, event: ProgressEvent) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (event.fraction * 100.0).round() as u8;
        let Ok(mut percents) = self.percents.lock() else {
            return;
        };
        let entry = &mut percents[slot(event.phase)];
        if *entry != Some(percent) {
            *entry = Some(percent);
            info!(phase = event.phase.as_str(), percent, "progress");
        }
    }
}

fn slot(phase: ProgressPhase) -> usize {
    match phase {
        ProgressPhase::Uploading => 0,
        ProgressPhase::Converting => 1,
    }
}

// =============================================================================
// MONOTONIC FILTER
// =============================================================================

/// High-water mark over a stream of fractions.
///
/// `advance` returns the value to report: the input clamped to `[0, 1]` and
/// never below anything previously reported. Used by the upload adapter so
/// store callbacks that go backwards (part retries) never reach the sink.
pub struct Monotonic {
    high: Mutex<f64>,
}

impl Monotonic {
    #[must_use]
    pub fn new() -> Self {
        Self { high: Mutex::new(0.0) }
    }

    pub fn advance(&self, fraction: f64) -> f64 {
        let fraction = clamp_fraction(fraction);
        let Ok(mut high) = self.high.lock() else {
            return fraction;
        };
        if fraction > *high {
            *high = fraction;
        }
        *high
    }
}

impl Default for Monotonic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
