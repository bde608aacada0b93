//! Progress reporting.
//!
//! [`ProgressCallback`] observes an extraction as frames are persisted.
//! Callbacks cannot stop the loop: extraction has no cancellation, callers
//! that need a deadline wrap the whole call.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framepeek::{ExtractOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}/{} -> {}", info.current, info.total, info.output_path.display());
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A snapshot taken right after a frame was handed to the sink.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames persisted so far, including this one.
    pub current: u64,
    /// Frames requested.
    pub total: u64,
    /// Completion percentage (0.0 – 100.0) relative to the request.
    pub percentage: f32,
    /// Wall-clock time since the session was opened.
    pub elapsed: Duration,
    /// Sequence index of the frame just persisted.
    pub frame_index: u64,
    /// Path the frame was written to.
    pub output_path: PathBuf,
}

/// Receives progress updates during extraction.
///
/// Implementations must be [`Send`] and [`Sync`] so one callback can be
/// shared by batch extractions running on several threads.
pub trait ProgressCallback: Send + Sync {
    /// Called once per persisted frame.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all notifications. The default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: u64,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: u64) -> Self {
        Self {
            callback,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one persisted frame and fire the callback.
    pub(crate) fn advance(&mut self, frame_index: u64, output_path: &Path) {
        self.current += 1;

        let percentage = if self.total > 0 {
            (self.current as f32 / self.total as f32) * 100.0
        } else {
            100.0
        };

        let info = ProgressInfo {
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
            frame_index,
            output_path: output_path.to_path_buf(),
        };

        self.callback.on_progress(&info);
    }
}
