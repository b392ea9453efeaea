//! Progress reporting and cooperative cancellation.
//!
//! Long stack operations report discrete `step / total` counts to a
//! [`ProgressIndicator`] and poll it for cancellation between chunks (layer
//! pairs or blocks of rows). An operation that observes cancellation returns
//! `StackError::Cancelled` before committing anything.

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stack operation being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Align,
    Crop,
    Calibrate,
    Compose,
    Save,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::Load => "Loading",
            Stage::Align => "Aligning",
            Stage::Crop => "Cropping",
            Stage::Calibrate => "Calibrating exposures",
            Stage::Compose => "Composing",
            Stage::Save => "Saving",
        };
        f.write_str(name)
    }
}

/// Receiver of progress updates
pub trait ProgressIndicator {
    /// `step` of `total` units of `stage` are complete
    fn advance(&mut self, step: usize, total: usize, stage: Stage);

    /// Polled between chunks; returning true aborts the operation
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Discards all updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressIndicator for NoProgress {
    fn advance(&mut self, _step: usize, _total: usize, _stage: Stage) {}
}

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a UI thread can keep one clone and pass
/// another into a stack operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl ProgressIndicator for CancelToken {
    fn advance(&mut self, _step: usize, _total: usize, _stage: Stage) {}

    fn is_cancelled(&self) -> bool {
        CancelToken::is_cancelled(self)
    }
}

/// Terminal progress bar
pub struct BarProgress {
    bar: ProgressBar,
    stage: Option<Stage>,
    cancel: Option<CancelToken>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::from_bar(ProgressBar::new(0))
    }

    /// Bar that draws nothing, useful for batch runs
    pub fn hidden() -> Self {
        Self::from_bar(ProgressBar::hidden())
    }

    fn from_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::with_template("{msg:>22} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self {
            bar,
            stage: None,
            cancel: None,
        }
    }

    /// Abort operations when the token is cancelled
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressIndicator for BarProgress {
    fn advance(&mut self, step: usize, total: usize, stage: Stage) {
        if self.stage != Some(stage) {
            self.stage = Some(stage);
            self.bar.reset();
            self.bar.set_message(stage.to_string());
        }
        self.bar.set_length(total as u64);
        self.bar.set_position(step as u64);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }
}

/// Records every update, for inspecting what an operation reported
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    pub updates: Vec<(usize, usize, Stage)>,
    /// Report cancellation once this many updates have been received
    pub cancel_after: Option<usize>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(updates: usize) -> Self {
        Self {
            updates: Vec::new(),
            cancel_after: Some(updates),
        }
    }
}

impl ProgressIndicator for RecordingProgress {
    fn advance(&mut self, step: usize, total: usize, stage: Stage) {
        self.updates.push((step, total, stage));
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_after
            .is_some_and(|limit| self.updates.len() >= limit)
    }
}
