//! Progress reporting and cancellation for long running imports and scans.
//!
//! Work is only ever abandoned between discrete units (one parsed game, one
//! scanned game), so a `true` from [`Progress::report`] never leaves a
//! partially written game behind.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::info;

pub trait Progress {
    /// Called once when a phase starts. `total` is the amount of work in the
    /// same unit later passed to [`Progress::report`] (bytes for a file,
    /// games for a scan), when known.
    fn begin(&mut self, _title: &str, _description: &str, _total: Option<u64>) {}

    /// Reports work done so far. Returns `true` if the operation should stop.
    fn report(&mut self, done: u64) -> bool;
}

/// Never reports, never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _done: u64) -> bool {
        false
    }
}

/// Cancellation driven by a flag another thread can raise.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Progress for CancelFlag {
    fn report(&mut self, _done: u64) -> bool {
        self.is_cancelled()
    }
}

/// Logs whole-percent progress changes through the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress {
    title: String,
    total: Option<u64>,
    last_percent: Option<u32>,
    cancel: Option<CancelFlag>,
}

impl LogProgress {
    pub fn with_cancel(cancel: CancelFlag) -> Self {
        Self {
            cancel: Some(cancel),
            ..Self::default()
        }
    }
}

/// Calculate progress as a whole percentage, clamped to 100
#[inline(always)]
pub fn calculate_percent(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64 * 100.0).min(100.0)) as u32
}

impl Progress for LogProgress {
    fn begin(&mut self, title: &str, description: &str, total: Option<u64>) {
        info!("{}: {}", title, description);
        self.title = title.to_string();
        self.total = total;
        self.last_percent = None;
    }

    fn report(&mut self, done: u64) -> bool {
        if let Some(total) = self.total {
            let percent = calculate_percent(done, total);
            if self.last_percent != Some(percent) {
                self.last_percent = Some(percent);
                info!("{}: {}% complete", self.title, percent);
            }
        }
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(calculate_percent(0, 200), 0);
        assert_eq!(calculate_percent(100, 200), 50);
        assert_eq!(calculate_percent(300, 200), 100);
        assert_eq!(calculate_percent(5, 0), 100);
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let mut observer = flag.clone();
        assert!(!observer.report(1));
        flag.cancel();
        assert!(observer.report(2));
    }

    #[test]
    fn log_progress_forwards_cancellation() {
        let flag = CancelFlag::new();
        let mut progress = LogProgress::with_cancel(flag.clone());
        progress.begin("Scan", "testing", Some(10));
        assert!(!progress.report(5));
        flag.cancel();
        assert!(progress.report(6));
    }
}
