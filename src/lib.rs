//! # framepeek
//!
//! Pull the first few decoded frames out of a video file or network stream,
//! as fast and as cheaply as possible.
//!
//! `framepeek` is built for thumbnailing and previews: it probes only a
//! bounded prefix of the input, picks the first video stream, runs the
//! decoder in low-delay mode, and stops reading the moment it has the frames
//! it was asked for. Every engine resource is released on every path out,
//! including when opening fails halfway.
//!
//! ## Quick Start
//!
//! ```no_run
//! use framepeek::{ExtractionRequest, FfmpegEngine, FrameExtractor, ImageSink, OutputPattern};
//!
//! let extractor = FrameExtractor::new(FfmpegEngine::new()?);
//! let request = ExtractionRequest::new(
//!     "https://example.com/live.m3u8",
//!     OutputPattern::parse("frame_%03d.jpg")?,
//!     3,
//! );
//! let result = extractor.extract(&request, &mut ImageSink::new());
//! println!("extracted {} frames", result.frames_extracted());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Pieces
//!
//! - [`MediaSession`] owns one open input and its decoder; frames are pulled
//!   one at a time with [`MediaSession::next_frame`].
//! - [`FrameExtractor`] drives a session for an [`ExtractionRequest`] and
//!   reports an [`ExtractionResult`].
//! - [`FrameSink`] is the persistence step. [`ImageSink`] encodes frames with
//!   the `image` crate; [`LogSink`] only logs the paths.
//! - The [`engine`] traits are the seam to the codec library.
//!   [`FfmpegEngine`] is the FFmpeg implementation.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | `FrameExtractor::extract_batch` runs many requests in parallel |
//! | `full`  | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on the system.

pub mod configuration;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod frame;
pub mod output;
#[cfg(feature = "rayon")]
mod parallel;
pub mod progress;
pub mod session;
pub mod sink;

pub use configuration::{
    DEFAULT_ANALYZE_DURATION, DEFAULT_PROBE_BYTES, DecoderPolicy, ExtractOptions, PixelFormat,
    ProbeBudget,
};
pub use engine::{
    DemuxInput, FrameDecoder, MediaEngine, MediaPacket, MediaType, Receive, StreamDescriptor,
    Submit,
};
pub use error::{EngineError, ExtractError, GENERIC_FAILURE_CODE, SinkError};
pub use extract::{DriverState, ExtractionRequest, ExtractionResult, FrameExtractor};
pub use ffmpeg::{FfmpegDecoder, FfmpegEngine, FfmpegInput, FfmpegLogLevel, FfmpegPacket, ProbeLimits};
pub use frame::{DecodedFrame, OwnedFrame};
pub use output::{MAX_PLACEHOLDER_WIDTH, OutputPattern, PatternError};
pub use progress::{ProgressCallback, ProgressInfo};
pub use session::MediaSession;
pub use sink::{FrameSink, ImageSink, LogSink};
