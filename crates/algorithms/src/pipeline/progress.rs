//! Progress reporting and cancellation
//!
//! Both are touched only between stages.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    MetricsComputed,
    Classified,
    Buffered,
    Filled,
    Smoothed,
    Interpolated,
    Complete,
    Cancelled,
    Failed,
}

impl PipelineState {
    /// Progress fraction (0 to 100) reported on entering the state
    pub fn fraction(self) -> f64 {
        match self {
            PipelineState::Idle => 0.0,
            PipelineState::MetricsComputed => 30.0,
            PipelineState::Classified => 45.0,
            PipelineState::Buffered => 55.0,
            PipelineState::Filled => 75.0,
            PipelineState::Smoothed => 85.0,
            PipelineState::Interpolated => 95.0,
            PipelineState::Complete => 100.0,
            // Terminal states keep the fraction already reached
            PipelineState::Cancelled | PipelineState::Failed => 0.0,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Complete | PipelineState::Cancelled | PipelineState::Failed
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::MetricsComputed => "metrics computed",
            PipelineState::Classified => "classified",
            PipelineState::Buffered => "buffered",
            PipelineState::Filled => "filled",
            PipelineState::Smoothed => "smoothed",
            PipelineState::Interpolated => "interpolated",
            PipelineState::Complete => "complete",
            PipelineState::Cancelled => "cancelled",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One progress update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Stage that just finished, or is about to start
    pub stage: &'static str,
    pub state: PipelineState,
    /// 0 to 100, never decreasing within a run
    pub fraction: f64,
    pub message: String,
}

/// Receiver of progress events
pub trait ProgressSink: Sync {
    fn report(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
