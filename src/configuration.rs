//! Extraction configuration.
//!
//! [`ExtractOptions`] is a builder that carries the probing budget, the
//! decoder policy, and the progress callback into
//! [`FrameExtractor`](crate::FrameExtractor) without widening every
//! signature.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use framepeek::{ExtractOptions, ProbeBudget};
//!
//! let options = ExtractOptions::new().with_probe_budget(
//!     ProbeBudget::default()
//!         .with_probe_bytes(64 * 1024)
//!         .with_analyze_duration(Duration::from_millis(500)),
//! );
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_next::format::Pixel;

use crate::progress::{NoOpProgress, ProgressCallback};

/// Default number of bytes the engine may read while guessing the container.
pub const DEFAULT_PROBE_BYTES: u64 = 256 * 1024;

/// Default amount of stream time the engine may analyze for stream info.
pub const DEFAULT_ANALYZE_DURATION: Duration = Duration::from_secs(1);

/// Hard limits on how much input the engine may examine while probing.
///
/// Both limits are applied before the first byte is read and stay in force
/// for stream-info probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeBudget {
    /// Maximum number of bytes examined.
    pub probe_bytes: u64,
    /// Maximum stream duration analyzed.
    pub analyze_duration: Duration,
}

impl Default for ProbeBudget {
    fn default() -> Self {
        Self {
            probe_bytes: DEFAULT_PROBE_BYTES,
            analyze_duration: DEFAULT_ANALYZE_DURATION,
        }
    }
}

impl ProbeBudget {
    /// Set the probe byte limit. Clamped to at least 32 bytes, the smallest
    /// amount FFmpeg accepts.
    #[must_use]
    pub fn with_probe_bytes(mut self, bytes: u64) -> Self {
        self.probe_bytes = bytes.max(32);
        self
    }

    /// Set the analyze duration limit.
    #[must_use]
    pub fn with_analyze_duration(mut self, duration: Duration) -> Self {
        self.analyze_duration = duration;
        self
    }

    /// The analyze duration in microseconds, saturating at `i64::MAX`.
    pub fn analyze_duration_micros(&self) -> i64 {
        i64::try_from(self.analyze_duration.as_micros()).unwrap_or(i64::MAX)
    }

    /// The probe byte limit as the engine's signed size type.
    pub fn probe_bytes_i64(&self) -> i64 {
        i64::try_from(self.probe_bytes).unwrap_or(i64::MAX)
    }

    /// The probe byte limit as a C `int`, saturating at `i32::MAX`. Used for
    /// the container-format detection limit.
    pub fn probe_bytes_i32(&self) -> i32 {
        i32::try_from(self.probe_bytes).unwrap_or(i32::MAX)
    }
}

/// Latency policy applied to the decoder before it is initialized.
///
/// Both flags trade strict conformance for less internal buffering. Frames
/// may come out in a slightly different order than a conformant decoder
/// would produce; extraction only cares about decode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderPolicy {
    /// Ask the decoder to emit frames as early as possible.
    pub low_delay: bool,
    /// Allow non-conformant speedups.
    pub fast_decode: bool,
}

impl Default for DecoderPolicy {
    fn default() -> Self {
        Self {
            low_delay: true,
            fast_decode: true,
        }
    }
}

impl DecoderPolicy {
    /// A policy with both flags cleared.
    pub fn conformant() -> Self {
        Self {
            low_delay: false,
            fast_decode: false,
        }
    }
}

/// Pixel layout used by [`ImageSink`](crate::ImageSink) when encoding frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bpp). This is the default.
    #[default]
    Rgb8,
    /// 8-bit RGBA with alpha pre-set to 255 (32 bpp).
    Rgba8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl PixelFormat {
    /// Map to the corresponding FFmpeg pixel format constant.
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    /// Bytes per pixel in the packed output buffer.
    pub(crate) fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Settings for a [`FrameExtractor`](crate::FrameExtractor).
///
/// A default-constructed value uses the default probing budget, the
/// low-latency decoder policy, low-buffering transport, and no progress
/// reporting.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) probe_budget: ProbeBudget,
    pub(crate) decoder_policy: DecoderPolicy,
    pub(crate) low_buffering: bool,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) has_progress: bool,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("probe_budget", &self.probe_budget)
            .field("decoder_policy", &self.decoder_policy)
            .field("low_buffering", &self.low_buffering)
            .field("has_progress", &self.has_progress)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            probe_budget: ProbeBudget::default(),
            decoder_policy: DecoderPolicy::default(),
            low_buffering: true,
            progress: Arc::new(NoOpProgress),
            has_progress: false,
        }
    }

    /// Replace the probing budget.
    #[must_use]
    pub fn with_probe_budget(mut self, budget: ProbeBudget) -> Self {
        self.probe_budget = budget;
        self
    }

    /// Replace the decoder policy.
    #[must_use]
    pub fn with_decoder_policy(mut self, policy: DecoderPolicy) -> Self {
        self.decoder_policy = policy;
        self
    }

    /// Toggle the engine's low-buffering transport mode. On by default.
    #[must_use]
    pub fn with_low_buffering(mut self, enabled: bool) -> Self {
        self.low_buffering = enabled;
        self
    }

    /// Attach a progress callback, invoked after every persisted frame.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self.has_progress = true;
        self
    }

    /// The configured probing budget.
    pub fn probe_budget(&self) -> &ProbeBudget {
        &self.probe_budget
    }

    /// The configured decoder policy.
    pub fn decoder_policy(&self) -> &DecoderPolicy {
        &self.decoder_policy
    }

    /// `true` once a progress callback has been attached.
    pub fn has_progress(&self) -> bool {
        self.has_progress
    }
}
