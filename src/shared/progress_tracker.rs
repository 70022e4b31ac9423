use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, info, trace};

/// Trait for progress tracking that any UI/interface can implement.
/// Keeps the segment fetcher independent of how progress is displayed.
pub trait ProgressTracker: Send {
    /// Record `bytes_written` more bytes for this segment.
    fn update(&mut self, bytes_written: usize);

    /// Finalize rendering for this segment.
    fn finish(&mut self);
}

/// Tracker used when progress display is turned off.
pub struct NoOpProgressTracker;

impl ProgressTracker for NoOpProgressTracker {
    fn update(&mut self, _bytes_written: usize) {}

    fn finish(&mut self) {}
}

/// Displayed percentage, `min(100, floor(transferred * 100 / total))`.
///
/// Returns `None` when the expected total is unknown or zero.
pub fn percentage(transferred: u64, total: Option<u64>) -> Option<u64> {
    match total {
        Some(total) if total > 0 => {
            let pct = u128::from(transferred) * 100 / u128::from(total);
            Some(pct.min(100) as u64)
        }
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Rows {
    /// Next row handed out to a reporter.
    next: usize,
    /// Row the cursor was last moved to.
    current: Option<usize>,
}

/// One terminal display shared by every reporter of a download.
///
/// Each reporter claims a fixed row when it is created. Redraws go through a
/// single lock so cursor movement from concurrent segments never interleaves.
#[derive(Clone)]
pub struct TerminalSession {
    multi: MultiProgress,
    rows: Arc<Mutex<Rows>>,
    style: ProgressStyle,
}

impl TerminalSession {
    /// Session drawing to stderr.
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Session that keeps state but draws nothing.
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(
            "{prefix:>12} [{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        Self {
            multi: MultiProgress::with_draw_target(target),
            rows: Arc::new(Mutex::new(Rows::default())),
            style,
        }
    }

    /// Creates a reporter on the next free row.
    pub fn reporter(&self, label: impl Into<String>, total: Option<u64>) -> CliProgressTracker {
        let label = label.into();
        let bar = match total {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::no_length(),
        };
        bar.set_style(self.style.clone());
        bar.set_prefix(label.clone());
        let (row, bar) = {
            let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            let row = rows.next;
            rows.next += 1;
            (row, self.multi.insert(row, bar))
        };
        debug!(row, label = %label, "Claimed progress row.");
        CliProgressTracker {
            session: self.clone(),
            bar,
            label,
            state: ProgressState { row, transferred: 0, total },
        }
    }

    /// Number of rows handed out so far.
    pub fn rows_claimed(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).next
    }

    fn redraw(&self, row: usize, draw: impl FnOnce()) {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        if rows.current != Some(row) {
            trace!(from = ?rows.current, to = row, "Moving to progress row.");
            rows.current = Some(row);
        }
        draw();
    }
}

impl Default for TerminalSession {
    fn default() -> Self {
        Self::new()
    }
}

/// What a reporter knows about its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub row: usize,
    pub transferred: u64,
    pub total: Option<u64>,
}

impl ProgressState {
    pub fn percentage(&self) -> Option<u64> {
        percentage(self.transferred, self.total)
    }
}

/// Progress line for a single segment.
pub struct CliProgressTracker {
    session: TerminalSession,
    bar: ProgressBar,
    label: String,
    state: ProgressState,
}

impl CliProgressTracker {
    pub fn state(&self) -> ProgressState {
        self.state
    }
}

impl ProgressTracker for CliProgressTracker {
    fn update(&mut self, bytes_written: usize) {
        self.state.transferred += bytes_written as u64;
        let state = self.state;
        let bar = &self.bar;
        self.session.redraw(state.row, || {
            bar.set_position(state.transferred);
            if let Some(pct) = state.percentage() {
                bar.set_message(format!("{pct:>3}%"));
            }
        });
    }

    fn finish(&mut self) {
        let state = self.state;
        let bar = &self.bar;
        let message = format!("{} done", self.label).purple().to_string();
        self.session.redraw(state.row, || bar.finish_with_message(message));
        info!(
            row = state.row,
            transferred = state.transferred,
            total = state.total,
            segment = %self.label,
            "Transfer finished"
        );
    }
}
