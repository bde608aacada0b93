//! FFmpeg-backed media engine.
//!
//! [`FfmpegEngine`] implements the [`engine`](crate::engine) traits on top of
//! `ffmpeg-next`. Where the safe wrapper has no equivalent (bounded probing
//! limits on a freshly allocated format context, the no-buffer flag, separate
//! open and stream-info steps, decoder flags, packet unref) it drops down to
//! `ffmpeg-sys-next`.
//!
//! FFmpeg also has its own console logging, separate from the Rust
//! [`log`](https://crates.io/crates/log) facade. [`FfmpegLogLevel`] tunes it.
//!
//! # Example
//!
//! ```no_run
//! use framepeek::{FfmpegEngine, FfmpegLogLevel, MediaSession, ProbeBudget};
//!
//! let engine = FfmpegEngine::new()?.with_log_level(FfmpegLogLevel::Error);
//! let mut session = MediaSession::open(&engine, "input.mp4", ProbeBudget::default())?;
//! while let Some(frame) = session.next_frame()? {
//!     println!("frame {} is {}x{}", frame.sequence_index(), frame.pixels().width(), frame.pixels().height());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::ffi::CString;
use std::ptr;

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::{context::Context as CodecContext, decoder::Video as VideoDecoder},
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
    util::{error::EAGAIN, log::Level},
};

use crate::configuration::{DecoderPolicy, ProbeBudget};
use crate::engine::{
    DemuxInput, FrameDecoder, MediaEngine, MediaPacket, MediaType, Receive, StreamDescriptor,
    Submit,
};
use crate::error::EngineError;

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants. Setting a level makes
/// FFmpeg drop every message below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only conditions after which the process aborts.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }

    /// Parse a level name as accepted on the command line.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Some(FfmpegLogLevel::Quiet),
            "panic" => Some(FfmpegLogLevel::Panic),
            "fatal" => Some(FfmpegLogLevel::Fatal),
            "error" => Some(FfmpegLogLevel::Error),
            "warning" | "warn" => Some(FfmpegLogLevel::Warning),
            "info" => Some(FfmpegLogLevel::Info),
            "verbose" => Some(FfmpegLogLevel::Verbose),
            "debug" => Some(FfmpegLogLevel::Debug),
            "trace" => Some(FfmpegLogLevel::Trace),
            _ => None,
        }
    }
}

/// Handle to the FFmpeg libraries.
///
/// Creating one initializes FFmpeg (idempotent). The handle carries no
/// per-session state, so one engine can serve any number of sessions, on
/// any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct FfmpegEngine {
    _private: (),
}

impl FfmpegEngine {
    /// Initialize FFmpeg and return an engine handle.
    ///
    /// # Errors
    ///
    /// Returns the FFmpeg diagnostic if library initialization fails.
    pub fn new() -> Result<Self, EngineError> {
        ffmpeg_next::init()?;
        Ok(Self { _private: () })
    }

    /// Set FFmpeg's own console verbosity.
    ///
    /// FFmpeg keeps this setting process-wide; it does not affect the Rust
    /// `log` output of this crate.
    #[must_use]
    pub fn with_log_level(self, level: FfmpegLogLevel) -> Self {
        ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
        self
    }
}

/// An FFmpeg demux context.
pub struct FfmpegInput {
    context: Input,
}

/// Probing limits in force on an open format context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeLimits {
    /// Bytes allowed for container detection (`format_probesize`).
    pub format_probe_bytes: i32,
    /// Bytes allowed for stream-info probing (`probesize`).
    pub probe_bytes: i64,
    /// Stream time allowed for analysis, in microseconds (`max_analyze_duration`).
    pub analyze_duration_micros: i64,
}

impl FfmpegInput {
    /// Read back the probing limits of the underlying format context.
    #[doc(hidden)]
    pub fn probe_limits(&self) -> ProbeLimits {
        unsafe {
            let raw = self.context.as_ptr();
            ProbeLimits {
                format_probe_bytes: (*raw).format_probesize,
                probe_bytes: (*raw).probesize,
                analyze_duration_micros: (*raw).max_analyze_duration,
            }
        }
    }
}

/// A reusable FFmpeg packet buffer.
pub struct FfmpegPacket(Packet);

/// An initialized FFmpeg video decoder.
pub struct FfmpegDecoder {
    decoder: VideoDecoder,
}

fn media_type(medium: Type) -> MediaType {
    match medium {
        Type::Video => MediaType::Video,
        Type::Audio => MediaType::Audio,
        Type::Subtitle => MediaType::Subtitle,
        Type::Data => MediaType::Data,
        Type::Attachment => MediaType::Attachment,
        Type::Unknown => MediaType::Unknown,
    }
}

impl MediaPacket for FfmpegPacket {
    fn stream_index(&self) -> usize {
        self.0.stream()
    }

    fn release(&mut self) {
        unsafe {
            ffmpeg_sys_next::av_packet_unref(self.0.as_mut_ptr());
        }
    }
}

impl DemuxInput for FfmpegInput {
    type Packet = FfmpegPacket;

    fn enable_low_buffering(&mut self) {
        unsafe {
            (*self.context.as_mut_ptr()).flags |= ffmpeg_sys_next::AVFMT_FLAG_NOBUFFER as i32;
        }
    }

    fn probe_streams(&mut self) -> Result<(), EngineError> {
        let result = unsafe {
            ffmpeg_sys_next::avformat_find_stream_info(self.context.as_mut_ptr(), ptr::null_mut())
        };
        if result < 0 {
            return Err(FfmpegError::from(result).into());
        }
        Ok(())
    }

    fn streams(&self) -> Vec<StreamDescriptor> {
        self.context
            .streams()
            .map(|stream| {
                let parameters = stream.parameters();
                StreamDescriptor {
                    index: stream.index(),
                    media_type: media_type(parameters.medium()),
                    codec_name: parameters.id().name().to_string(),
                }
            })
            .collect()
    }

    fn read_packet(&mut self, packet: &mut FfmpegPacket) -> Result<bool, EngineError> {
        match packet.0.read(&mut self.context) {
            Ok(()) => Ok(true),
            Err(FfmpegError::Eof) => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}

impl FrameDecoder for FfmpegDecoder {
    type Packet = FfmpegPacket;
    type Frame = VideoFrame;

    fn send_packet(&mut self, packet: &FfmpegPacket) -> Result<Submit, EngineError> {
        match self.decoder.send_packet(&packet.0) {
            Ok(()) => Ok(Submit::Accepted),
            Err(FfmpegError::Other { errno }) if errno == EAGAIN => Ok(Submit::Again),
            Err(FfmpegError::InvalidData) => Ok(Submit::Rejected),
            Err(error) => Err(error.into()),
        }
    }

    fn send_eof(&mut self) -> Result<(), EngineError> {
        match self.decoder.send_eof() {
            Ok(()) | Err(FfmpegError::Eof) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    fn receive_frame(&mut self, frame: &mut VideoFrame) -> Result<Receive, EngineError> {
        match self.decoder.receive_frame(frame) {
            Ok(()) => Ok(Receive::Frame),
            Err(FfmpegError::Other { errno }) if errno == EAGAIN => Ok(Receive::NeedsInput),
            Err(FfmpegError::Eof) => Ok(Receive::Drained),
            Err(error) => Err(error.into()),
        }
    }
}

impl MediaEngine for FfmpegEngine {
    type Packet = FfmpegPacket;
    type Frame = VideoFrame;
    type Input = FfmpegInput;
    type Codec = ffmpeg_next::Codec;
    type Decoder = FfmpegDecoder;

    fn open_input(&self, locator: &str, budget: &ProbeBudget) -> Result<FfmpegInput, EngineError> {
        let url = CString::new(locator)
            .map_err(|_| EngineError::new(0, "locator contains an interior NUL byte"))?;

        unsafe {
            let mut context = ffmpeg_sys_next::avformat_alloc_context();
            if context.is_null() {
                return Err(EngineError::new(0, "failed to allocate format context"));
            }

            // Limits must be set before avformat_open_input reads anything.
            // format_probesize bounds container detection, probesize bounds
            // stream-info probing.
            (*context).format_probesize = budget.probe_bytes_i32();
            (*context).probesize = budget.probe_bytes_i64();
            (*context).max_analyze_duration = budget.analyze_duration_micros();

            // On failure FFmpeg frees the context and nulls the pointer.
            let result = ffmpeg_sys_next::avformat_open_input(
                &mut context,
                url.as_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
            );
            if result < 0 {
                return Err(FfmpegError::from(result).into());
            }

            Ok(FfmpegInput {
                context: Input::wrap(context),
            })
        }
    }

    fn find_decoder(&self, input: &FfmpegInput, stream_index: usize) -> Option<ffmpeg_next::Codec> {
        let stream = input.context.stream(stream_index)?;
        ffmpeg_next::decoder::find(stream.parameters().id())
    }

    fn open_decoder(
        &self,
        input: &FfmpegInput,
        stream_index: usize,
        codec: ffmpeg_next::Codec,
        policy: &DecoderPolicy,
    ) -> Result<FfmpegDecoder, EngineError> {
        let stream = input
            .context
            .stream(stream_index)
            .ok_or_else(|| EngineError::new(0, format!("stream {stream_index} disappeared")))?;

        let mut context = CodecContext::from_parameters(stream.parameters())?;

        unsafe {
            let raw = context.as_mut_ptr();
            if policy.low_delay {
                (*raw).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_LOW_DELAY as i32;
            }
            if policy.fast_decode {
                (*raw).flags2 |= ffmpeg_sys_next::AV_CODEC_FLAG2_FAST as i32;
            }
        }

        let decoder = context.decoder().open_as(codec)?.video()?;
        Ok(FfmpegDecoder { decoder })
    }

    fn alloc_packet(&self) -> FfmpegPacket {
        FfmpegPacket(Packet::empty())
    }

    fn alloc_frame(&self) -> VideoFrame {
        VideoFrame::empty()
    }
}
