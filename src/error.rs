//! Error types for the `framepeek` crate.
//!
//! [`ExtractError`] is the single error type surfaced by the media session
//! and the extraction driver. Open-stage variants name the stage that failed
//! and carry the engine's own diagnostic, so a caller can print one line and
//! still know where things went wrong.

use std::{fmt, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// Generic process status used when no engine code is available.
pub const GENERIC_FAILURE_CODE: i32 = 1;

/// A failure reported by the media engine.
///
/// `code` is the engine's numeric diagnostic (for FFmpeg, the negative
/// `AVERROR` value) and `message` its human-readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// Engine-specific error code. Zero when the engine has none to offer.
    pub code: i32,
    /// Human-readable diagnostic text.
    pub message: String,
}

impl EngineError {
    /// Create an engine error from a code and a message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (code {})", self.message, self.code)
        }
    }
}

impl std::error::Error for EngineError {}

impl From<FfmpegError> for EngineError {
    fn from(error: FfmpegError) -> Self {
        let message = error.to_string();
        EngineError::new(i32::from(error), message)
    }
}

/// The error type for every fallible extraction operation.
///
/// The first five variants can only come out of
/// [`MediaSession::open`](crate::MediaSession::open). None of them is retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The locator could not be resolved, or its container could not be
    /// identified within the probing budget.
    #[error("Failed to open input {locator}: {source}")]
    InputOpen {
        /// Locator passed to the session.
        locator: String,
        /// Engine diagnostic.
        source: EngineError,
    },

    /// Stream metadata could not be extracted.
    #[error("Failed to probe stream info for {locator}: {source}")]
    StreamProbe {
        /// Locator passed to the session.
        locator: String,
        /// Engine diagnostic.
        source: EngineError,
    },

    /// None of the input's streams is a video stream.
    #[error("No video stream found in {locator}")]
    NoVideoStream {
        /// Locator passed to the session.
        locator: String,
    },

    /// The engine has no decoder registered for the video stream's codec.
    #[error("No decoder available for codec {codec} (stream {stream_index})")]
    DecoderUnavailable {
        /// Codec name reported by the engine.
        codec: String,
        /// Index of the selected video stream.
        stream_index: usize,
    },

    /// The decoder could not be constructed or initialized.
    #[error("Failed to open decoder for stream {stream_index}: {source}")]
    DecoderInit {
        /// Index of the selected video stream.
        stream_index: usize,
        /// Engine diagnostic.
        source: EngineError,
    },

    /// Reading or decoding failed after the session was open.
    ///
    /// The normal end of the stream is never reported this way.
    #[error("Failed to read or decode video frame {frame_index}: {source}")]
    DecodeRead {
        /// Sequence index of the frame that was being produced.
        frame_index: u64,
        /// Engine diagnostic.
        source: EngineError,
    },

    /// The extraction loop ended without a single frame and without any
    /// lower-level error.
    #[error("No frames could be decoded from {locator}")]
    NoFramesProduced {
        /// Locator passed to the session.
        locator: String,
    },

    /// The persistence step rejected a frame.
    #[error("Failed to persist frame {frame_index} to {path}: {reason}")]
    Persist {
        /// Sequence index of the frame being written.
        frame_index: u64,
        /// Output path computed for the frame.
        path: PathBuf,
        /// Reason reported by the sink.
        reason: String,
    },
}

impl ExtractError {
    /// The engine's numeric diagnostic, when the error came from the engine.
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            ExtractError::InputOpen { source, .. }
            | ExtractError::StreamProbe { source, .. }
            | ExtractError::DecoderInit { source, .. }
            | ExtractError::DecodeRead { source, .. } => Some(source.code),
            _ => None,
        }
    }

    /// Name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            ExtractError::InputOpen { .. } => "open",
            ExtractError::StreamProbe { .. } => "probe",
            ExtractError::NoVideoStream { .. } => "stream selection",
            ExtractError::DecoderUnavailable { .. } => "decoder lookup",
            ExtractError::DecoderInit { .. } => "decoder init",
            ExtractError::DecodeRead { .. } => "decode",
            ExtractError::NoFramesProduced { .. } => "extract",
            ExtractError::Persist { .. } => "persist",
        }
    }

    /// Process exit status for this error.
    ///
    /// Engine codes are folded into `1..=255` so they survive the trip
    /// through a Unix exit status. Everything else maps to
    /// [`GENERIC_FAILURE_CODE`].
    pub fn exit_code(&self) -> i32 {
        match self.engine_code() {
            Some(code) if code != 0 => {
                let folded = code.unsigned_abs() & 0xff;
                if folded == 0 {
                    GENERIC_FAILURE_CODE
                } else {
                    folded as i32
                }
            }
            _ => GENERIC_FAILURE_CODE,
        }
    }
}

/// Error returned by a [`FrameSink`](crate::FrameSink).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    /// An I/O error while writing the output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image encoder failed.
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Pixel conversion of the decoded frame failed.
    #[error("Frame conversion error: {0}")]
    Conversion(String),

    /// The output path already exists and overwriting is disabled.
    #[error("Output already exists: {0}")]
    AlreadyExists(PathBuf),
}

impl From<FfmpegError> for SinkError {
    fn from(error: FfmpegError) -> Self {
        SinkError::Conversion(error.to_string())
    }
}
