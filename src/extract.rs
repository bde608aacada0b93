//! The frame extraction driver.
//!
//! [`FrameExtractor`] runs one [`ExtractionRequest`] from start to finish:
//! open a [`MediaSession`], pull up to the requested number of frames, hand
//! each one to a [`FrameSink`] under a path rendered from the request's
//! [`OutputPattern`], and close the session on every path out.
//!
//! The driver never retries. Frames persisted before a failure are kept and
//! reported alongside the error.
//!
//! # Example
//!
//! ```no_run
//! use framepeek::{ExtractionRequest, FfmpegEngine, FrameExtractor, ImageSink, OutputPattern};
//!
//! let extractor = FrameExtractor::new(FfmpegEngine::new()?);
//! let request = ExtractionRequest::new("input.mp4", OutputPattern::parse("thumb_%03d.png")?, 3);
//! let result = extractor.extract(&request, &mut ImageSink::new());
//!
//! for path in result.output_paths() {
//!     println!("wrote {}", path.display());
//! }
//! if let Some(error) = result.error() {
//!     eprintln!("stopped early: {error}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::PathBuf;

use crate::configuration::ExtractOptions;
use crate::engine::MediaEngine;
use crate::error::{ExtractError, GENERIC_FAILURE_CODE};
use crate::output::OutputPattern;
use crate::progress::ProgressTracker;
use crate::session::MediaSession;
use crate::sink::FrameSink;

/// What the caller wants extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    locator: String,
    pattern: OutputPattern,
    frame_count: u64,
}

impl ExtractionRequest {
    /// Ask for the first `frame_count` frames of `locator`, written to
    /// paths rendered from `pattern`.
    pub fn new(locator: impl Into<String>, pattern: OutputPattern, frame_count: u64) -> Self {
        Self {
            locator: locator.into(),
            pattern,
            frame_count,
        }
    }

    /// Input path or URL.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Output path template.
    pub fn pattern(&self) -> &OutputPattern {
        &self.pattern
    }

    /// Number of frames requested.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Driver lifecycle. Every run that leaves `Idle` passes through `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing has happened yet.
    Idle,
    /// The session is being opened.
    Opening,
    /// Frames are being pulled and persisted.
    Extracting,
    /// The session is being torn down.
    Closing,
    /// The result is final.
    Done,
}

/// Outcome of one extraction.
#[derive(Debug)]
pub struct ExtractionResult {
    requested: u64,
    frames_extracted: u64,
    output_paths: Vec<PathBuf>,
    error: Option<ExtractError>,
}

impl ExtractionResult {
    fn new(requested: u64) -> Self {
        Self {
            requested,
            frames_extracted: 0,
            output_paths: Vec::new(),
            error: None,
        }
    }

    /// Number of frames requested.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Number of frames handed to the sink successfully.
    pub fn frames_extracted(&self) -> u64 {
        self.frames_extracted
    }

    /// Output paths, in extraction order.
    pub fn output_paths(&self) -> &[PathBuf] {
        &self.output_paths
    }

    /// The first error encountered, if any.
    ///
    /// A successful result can still carry an error: the frames extracted
    /// before it are kept.
    pub fn error(&self) -> Option<&ExtractError> {
        self.error.as_ref()
    }

    /// `true` if at least one frame was extracted, or none was asked for.
    pub fn is_success(&self) -> bool {
        self.requested == 0 || self.frames_extracted > 0
    }

    /// `true` if the run succeeded but stopped on an error before reaching
    /// the requested count.
    pub fn is_partial(&self) -> bool {
        self.frames_extracted > 0 && self.error.is_some()
    }

    /// Collapse into the number of frames extracted, or the error that
    /// explains why there are none.
    ///
    /// # Errors
    ///
    /// The recorded error when [`is_success`](ExtractionResult::is_success)
    /// is `false`.
    pub fn into_result(self) -> Result<u64, ExtractError> {
        if self.is_success() {
            return Ok(self.frames_extracted);
        }
        match self.error {
            Some(error) => Err(error),
            None => Err(ExtractError::NoFramesProduced {
                locator: String::new(),
            }),
        }
    }

    /// Process exit status: 0 on success, otherwise derived from the error.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            return 0;
        }
        self.error
            .as_ref()
            .map_or(GENERIC_FAILURE_CODE, ExtractError::exit_code)
    }
}

/// Runs extraction requests against one engine.
pub struct FrameExtractor<E: MediaEngine> {
    engine: E,
    options: ExtractOptions,
}

impl<E: MediaEngine> FrameExtractor<E> {
    /// Create an extractor with default options.
    pub fn new(engine: E) -> Self {
        Self::with_options(engine, ExtractOptions::new())
    }

    /// Create an extractor with explicit options.
    pub fn with_options(engine: E, options: ExtractOptions) -> Self {
        Self { engine, options }
    }

    /// The engine handle.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The options every request runs with.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract the first frames of `request` into `sink`.
    ///
    /// A request for zero frames returns immediately without touching the
    /// input. Otherwise the session is opened, frames are pulled until the
    /// count is reached, the stream ends, or an error occurs, and the
    /// session is closed before this returns.
    pub fn extract<S>(&self, request: &ExtractionRequest, sink: &mut S) -> ExtractionResult
    where
        S: FrameSink<E::Frame> + ?Sized,
    {
        let requested = request.frame_count();
        let locator = request.locator();
        let mut result = ExtractionResult::new(requested);
        let mut state = DriverState::Idle;

        if requested == 0 {
            log::debug!("{locator}: zero frames requested, nothing to do");
            return result;
        }

        advance(&mut state, DriverState::Opening, locator);
        let mut session = match MediaSession::open_with_options(&self.engine, locator, &self.options)
        {
            Ok(session) => session,
            Err(error) => {
                log::error!("{locator}: {} failed: {error}", error.stage());
                // The failed open has already released what it allocated.
                advance(&mut state, DriverState::Closing, locator);
                advance(&mut state, DriverState::Done, locator);
                result.error = Some(error);
                return result;
            }
        };

        advance(&mut state, DriverState::Extracting, locator);
        let mut progress = self
            .options
            .has_progress
            .then(|| ProgressTracker::new(self.options.progress.clone(), requested));

        while result.frames_extracted < requested {
            let frame = match session.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::debug!(
                        "{locator}: end of stream after {} of {requested} frames",
                        result.frames_extracted
                    );
                    break;
                }
                Err(error) => {
                    log::error!("{locator}: {error}");
                    result.error = Some(error);
                    break;
                }
            };

            let frame_index = frame.sequence_index();
            let path = request.pattern().format(frame_index);

            if let Err(error) = sink.persist(&frame, &path) {
                log::error!("{locator}: could not persist frame {frame_index}: {error}");
                result.error = Some(ExtractError::Persist {
                    frame_index,
                    path,
                    reason: error.to_string(),
                });
                break;
            }

            result.frames_extracted += 1;
            if let Some(progress) = progress.as_mut() {
                progress.advance(frame_index, &path);
            }
            result.output_paths.push(path);
        }

        advance(&mut state, DriverState::Closing, locator);
        session.close();
        advance(&mut state, DriverState::Done, locator);

        if result.frames_extracted == 0 && result.error.is_none() {
            result.error = Some(ExtractError::NoFramesProduced {
                locator: locator.to_string(),
            });
        }

        log::debug!(
            "{locator}: extracted {} of {requested} frames",
            result.frames_extracted
        );
        result
    }
}

fn advance(state: &mut DriverState, next: DriverState, locator: &str) {
    log::debug!("{locator}: {state:?} -> {next:?}");
    *state = next;
}
