//! The media session: one opened input and its video decoder.
//!
//! [`MediaSession`] owns every engine resource needed to pull frames from
//! the first video stream of an input: the demux context, the decoder, one
//! packet buffer and one frame buffer. Each resource sits in its own slot
//! and is released independently, so a session that failed halfway through
//! [`open`](MediaSession::open) tears down exactly what it had allocated.
//! Dropping a session closes it.
//!
//! # Example
//!
//! ```no_run
//! use framepeek::{FfmpegEngine, MediaSession, ProbeBudget};
//!
//! let engine = FfmpegEngine::new()?;
//! let mut session = MediaSession::open(&engine, "rtsp://camera.local/stream", ProbeBudget::default())?;
//! if let Some(frame) = session.next_frame()? {
//!     println!("first frame: {}", frame.sequence_index());
//! }
//! session.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::configuration::{DecoderPolicy, ExtractOptions, ProbeBudget};
use crate::engine::{
    DemuxInput, FrameDecoder, MediaEngine, MediaPacket, MediaType, Receive, StreamDescriptor,
    Submit,
};
use crate::error::{EngineError, ExtractError};
use crate::frame::DecodedFrame;

/// One open input, bound to a decoder for its first video stream.
///
/// A session handed out by [`open`](MediaSession::open) is always fully
/// initialized. Frames are pulled with [`next_frame`](MediaSession::next_frame)
/// until it returns `None`.
pub struct MediaSession<E: MediaEngine> {
    locator: String,
    budget: ProbeBudget,
    policy: DecoderPolicy,
    video_stream: Option<StreamDescriptor>,
    frame: Option<E::Frame>,
    packet: Option<E::Packet>,
    decoder: Option<E::Decoder>,
    input: Option<E::Input>,
    frames_emitted: u64,
    flushing: bool,
    exhausted: bool,
    closed: bool,
}

impl<E: MediaEngine> Debug for MediaSession<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaSession")
            .field("locator", &self.locator)
            .field("budget", &self.budget)
            .field("policy", &self.policy)
            .field("video_stream", &self.video_stream)
            .field("frames_emitted", &self.frames_emitted)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl<E: MediaEngine> MediaSession<E> {
    /// Open `locator` with `budget`, the low-latency decoder policy and
    /// low-buffering transport.
    ///
    /// # Errors
    ///
    /// One of [`ExtractError::InputOpen`], [`ExtractError::StreamProbe`],
    /// [`ExtractError::NoVideoStream`], [`ExtractError::DecoderUnavailable`]
    /// or [`ExtractError::DecoderInit`], depending on the stage that failed.
    /// Whatever was allocated before the failure has been released by the
    /// time this returns.
    pub fn open(engine: &E, locator: &str, budget: ProbeBudget) -> Result<Self, ExtractError> {
        let options = ExtractOptions::new().with_probe_budget(budget);
        Self::open_with_options(engine, locator, &options)
    }

    /// Open `locator` using the budget, decoder policy and buffering mode
    /// from `options`.
    ///
    /// # Errors
    ///
    /// Same as [`open`](MediaSession::open).
    pub fn open_with_options(
        engine: &E,
        locator: &str,
        options: &ExtractOptions,
    ) -> Result<Self, ExtractError> {
        let mut session = Self {
            locator: locator.to_string(),
            budget: options.probe_budget,
            policy: options.decoder_policy,
            video_stream: None,
            frame: None,
            packet: None,
            decoder: None,
            input: None,
            frames_emitted: 0,
            flushing: false,
            exhausted: false,
            closed: false,
        };

        match session.initialize(engine, options.low_buffering) {
            Ok(()) => Ok(session),
            Err(error) => {
                log::debug!("Open of {} failed at {} stage: {error}", locator, error.stage());
                session.close();
                Err(error)
            }
        }
    }

    fn initialize(&mut self, engine: &E, low_buffering: bool) -> Result<(), ExtractError> {
        if self.locator.is_empty() {
            return Err(ExtractError::InputOpen {
                locator: String::new(),
                source: EngineError::new(0, "input locator is empty"),
            });
        }

        log::debug!(
            "Opening {} (probe={} bytes, analyze={:?})",
            self.locator,
            self.budget.probe_bytes,
            self.budget.analyze_duration,
        );

        let opened = engine
            .open_input(&self.locator, &self.budget)
            .map_err(|source| ExtractError::InputOpen {
                locator: self.locator.clone(),
                source,
            })?;
        let input = self.input.insert(opened);

        if low_buffering {
            input.enable_low_buffering();
        }

        input
            .probe_streams()
            .map_err(|source| ExtractError::StreamProbe {
                locator: self.locator.clone(),
                source,
            })?;

        let video = input
            .streams()
            .into_iter()
            .filter(|stream| stream.media_type == MediaType::Video)
            .min_by_key(|stream| stream.index)
            .ok_or_else(|| ExtractError::NoVideoStream {
                locator: self.locator.clone(),
            })?;

        let codec = engine.find_decoder(input, video.index).ok_or_else(|| {
            ExtractError::DecoderUnavailable {
                codec: video.codec_name.clone(),
                stream_index: video.index,
            }
        })?;

        let decoder = engine
            .open_decoder(input, video.index, codec, &self.policy)
            .map_err(|source| ExtractError::DecoderInit {
                stream_index: video.index,
                source,
            })?;

        self.decoder = Some(decoder);
        self.packet = Some(engine.alloc_packet());
        self.frame = Some(engine.alloc_frame());

        log::info!(
            "Opened {} (video stream {}, codec={}, low_delay={}, fast={})",
            self.locator,
            video.index,
            video.codec_name,
            self.policy.low_delay,
            self.policy.fast_decode,
        );

        self.video_stream = Some(video);
        Ok(())
    }

    /// Pull the next decoded frame.
    ///
    /// Reads only as many packets as it takes to produce one more frame.
    /// Packets from other streams are discarded. At end of stream the
    /// decoder is flushed once; after that, and after [`close`](MediaSession::close),
    /// this returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::DecodeRead`] if the engine fails to read or
    /// decode. The end of the stream is not an error.
    pub fn next_frame(&mut self) -> Result<Option<DecodedFrame<'_, E::Frame>>, ExtractError> {
        let Some(index) = self.pull()? else {
            return Ok(None);
        };
        Ok(self.frame.as_ref().map(|frame| DecodedFrame::new(index, frame)))
    }

    /// Drive demux and decode until the frame buffer holds a new frame.
    /// Returns its sequence index.
    fn pull(&mut self) -> Result<Option<u64>, ExtractError> {
        if self.exhausted {
            return Ok(None);
        }

        let (Some(input), Some(decoder), Some(packet), Some(frame), Some(video)) = (
            self.input.as_mut(),
            self.decoder.as_mut(),
            self.packet.as_mut(),
            self.frame.as_mut(),
            self.video_stream.as_ref(),
        ) else {
            return Ok(None);
        };

        let video_index = video.index;
        let frame_index = self.frames_emitted;
        let decode_error = move |source| ExtractError::DecodeRead {
            frame_index,
            source,
        };

        loop {
            match decoder.receive_frame(frame).map_err(decode_error)? {
                Receive::Frame => {
                    self.frames_emitted += 1;
                    return Ok(Some(frame_index));
                }
                Receive::Drained => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Receive::NeedsInput if self.flushing => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Receive::NeedsInput => {}
            }

            let has_packet = match input.read_packet(packet) {
                Ok(has_packet) => has_packet,
                Err(source) => {
                    packet.release();
                    return Err(decode_error(source));
                }
            };

            if !has_packet {
                log::debug!(
                    "End of stream in {} after {} frames, flushing decoder",
                    self.locator,
                    frame_index,
                );
                packet.release();
                self.flushing = true;
                decoder.send_eof().map_err(decode_error)?;
                continue;
            }

            if packet.stream_index() != video_index {
                packet.release();
                continue;
            }

            let submitted = decoder.send_packet(packet);
            packet.release();

            match submitted.map_err(decode_error)? {
                Submit::Accepted => {}
                Submit::Again => {
                    log::warn!("Decoder had pending output, dropped a packet of stream {video_index}");
                }
                Submit::Rejected => {
                    log::warn!("Skipped an invalid packet on stream {video_index}");
                }
            }
        }
    }

    /// Release every resource the session holds.
    ///
    /// Order: frame buffer, packet buffer, decoder, demux context. Slots
    /// that were never filled are skipped. Calling this more than once is a
    /// no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        log::debug!(
            "Closing session for {} after {} frames",
            self.locator,
            self.frames_emitted,
        );

        drop(self.frame.take());
        if let Some(mut packet) = self.packet.take() {
            packet.release();
        }
        drop(self.decoder.take());
        drop(self.input.take());
    }

    /// `true` while the demux context and decoder are both alive.
    pub fn is_open(&self) -> bool {
        !self.closed && self.input.is_some() && self.decoder.is_some()
    }

    /// The selected video stream.
    pub fn video_stream(&self) -> Option<&StreamDescriptor> {
        self.video_stream.as_ref()
    }

    /// The locator this session was opened with.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The probing budget this session was opened with.
    pub fn budget(&self) -> &ProbeBudget {
        &self.budget
    }

    /// Number of frames returned by [`next_frame`](MediaSession::next_frame) so far.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }
}

impl<E: MediaEngine> Drop for MediaSession<E> {
    fn drop(&mut self) {
        self.close();
    }
}
