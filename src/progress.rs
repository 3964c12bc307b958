//! Progress reporting for one stats computation.

use recap_stats::Period;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Minimum advance, in percentage points, between two in-phase updates.
const MIN_STEP: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Reconciling,
    OwnEvents,
    IncomingEvents,
    SentZaps,
    Aggregating,
    Ranking,
    Done,
}

impl Phase {
    /// Portion of the overall 0-100 scale owned by this phase.
    pub fn span(self) -> (u8, u8) {
        match self {
            Phase::Reconciling => (0, 5),
            Phase::OwnEvents => (5, 45),
            Phase::IncomingEvents => (45, 80),
            Phase::SentZaps => (80, 90),
            Phase::Aggregating => (90, 95),
            Phase::Ranking => (95, 99),
            Phase::Done => (100, 100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub message: String,
    pub percent: u8,
}

/// Receives progress updates.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

impl ProgressSink for UnboundedSender<ProgressUpdate> {
    fn report(&self, update: ProgressUpdate) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.send(update);
    }
}

/// Discards every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Turns phase transitions and event timestamps into a monotonic,
/// throttled update stream.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    period: Period,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink, period: Period) -> Self {
        Self {
            sink,
            period,
            last: None,
        }
    }

    /// Last emitted percentage.
    pub fn percent(&self) -> u8 {
        self.last.unwrap_or(0)
    }

    /// Announce a phase at its starting percentage.
    pub fn enter(&mut self, phase: Phase, message: impl Into<String>) {
        let (start, _) = phase.span();
        let percent = start.max(self.percent());
        self.emit(phase, message.into(), percent);
    }

    /// Record an event seen during a retrieval phase. Delivery is newest
    /// first, so the distance of `created_at` from the window end
    /// estimates how much of the window has been covered.
    pub fn observe(&mut self, phase: Phase, created_at: u64) {
        let (start, end) = phase.span();
        let span = self.period.span();
        let covered = if span == 0 {
            1.0
        } else {
            self.period.until.saturating_sub(created_at).min(span) as f64 / span as f64
        };
        let estimate = start + (covered * f64::from(end - start)).floor() as u8;

        let last = self.percent();
        if self.last.is_none() || estimate >= last.saturating_add(MIN_STEP) {
            self.emit(phase, format!("{phase:?}: {estimate}%"), estimate);
        }
    }

    pub fn finish(&mut self, message: impl Into<String>) {
        self.emit(Phase::Done, message.into(), 100);
    }

    fn emit(&mut self, phase: Phase, message: String, percent: u8) {
        let percent = percent.max(self.percent()).min(100);
        self.last = Some(percent);
        self.sink.report(ProgressUpdate {
            phase,
            message,
            percent,
        });
    }
}
