//! The media engine contract.
//!
//! A [`MediaSession`](crate::MediaSession) never talks to a codec library
//! directly. It drives an engine through the traits below, which expose the
//! handful of demux and decode primitives the pipeline needs. The engine
//! handle is passed in explicitly, so any number of independent sessions can
//! live in one process without ambient global state.
//!
//! [`FfmpegEngine`](crate::FfmpegEngine) is the production implementation.
//!
//! Every resource an engine hands out (input, decoder, packet, frame) must
//! release whatever it owns when dropped. The session relies on that to tear
//! down exactly what was allocated.

use crate::configuration::{DecoderPolicy, ProbeBudget};
use crate::error::EngineError;

/// Coarse media type of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// A video elementary stream.
    Video,
    /// An audio elementary stream.
    Audio,
    /// A subtitle stream.
    Subtitle,
    /// A data stream (timed metadata and similar).
    Data,
    /// An attachment (fonts, cover art in some containers).
    Attachment,
    /// Anything the engine cannot classify.
    Unknown,
}

/// What the session needs to know about one stream of an opened input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Stream index within the container.
    pub index: usize,
    /// Media type of the stream.
    pub media_type: MediaType,
    /// Codec name as reported by the engine.
    pub codec_name: String,
}

/// Outcome of submitting a packet to a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// The decoder took the packet.
    Accepted,
    /// The decoder has output pending and did not take the packet.
    Again,
    /// The decoder rejected the packet as invalid data.
    Rejected,
}

/// Outcome of asking a decoder for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receive {
    /// A frame was written into the caller's frame buffer.
    Frame,
    /// The decoder needs more input before it can emit a frame.
    NeedsInput,
    /// The decoder was flushed and has nothing left.
    Drained,
}

/// A demultiplexed packet buffer, reused across reads.
pub trait MediaPacket {
    /// Index of the stream the current payload belongs to.
    fn stream_index(&self) -> usize;

    /// Drop the current payload, keeping the buffer itself for reuse.
    fn release(&mut self);
}

/// An opened demux context.
pub trait DemuxInput {
    /// Packet buffer type filled by [`read_packet`](DemuxInput::read_packet).
    type Packet: MediaPacket;

    /// Stop the engine from accumulating read-ahead beyond what demuxing
    /// needs. Engines without such a mode do nothing.
    fn enable_low_buffering(&mut self);

    /// Extract stream metadata within the budget the input was opened with.
    fn probe_streams(&mut self) -> Result<(), EngineError>;

    /// All streams, in ascending index order.
    fn streams(&self) -> Vec<StreamDescriptor>;

    /// Read the next packet into `packet`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn read_packet(&mut self, packet: &mut Self::Packet) -> Result<bool, EngineError>;
}

/// An initialized decoder bound to one stream.
pub trait FrameDecoder {
    /// Packet type accepted by [`send_packet`](FrameDecoder::send_packet).
    type Packet;
    /// Frame buffer filled by [`receive_frame`](FrameDecoder::receive_frame).
    type Frame;

    /// Submit one packet.
    fn send_packet(&mut self, packet: &Self::Packet) -> Result<Submit, EngineError>;

    /// Signal end of input so buffered frames can be flushed.
    fn send_eof(&mut self) -> Result<(), EngineError>;

    /// Try to take one decoded frame, overwriting `frame`.
    fn receive_frame(&mut self, frame: &mut Self::Frame) -> Result<Receive, EngineError>;
}

/// An engine handle: the factory for every resource a session owns.
pub trait MediaEngine {
    /// Packet buffer type.
    type Packet: MediaPacket;
    /// Decoded frame buffer type.
    type Frame;
    /// Opened demux context.
    type Input: DemuxInput<Packet = Self::Packet>;
    /// Resolved decoder implementation, before a context exists.
    type Codec;
    /// Initialized decoder.
    type Decoder: FrameDecoder<Packet = Self::Packet, Frame = Self::Frame>;

    /// Allocate a demux context, apply `budget` as hard probing limits, then
    /// open `locator`.
    ///
    /// The limits must be in place before the engine reads anything.
    fn open_input(&self, locator: &str, budget: &ProbeBudget) -> Result<Self::Input, EngineError>;

    /// Look up a decoder for the codec of stream `stream_index`.
    fn find_decoder(&self, input: &Self::Input, stream_index: usize) -> Option<Self::Codec>;

    /// Build a decoder context from the stream's codec parameters, apply
    /// `policy`, and initialize it.
    fn open_decoder(
        &self,
        input: &Self::Input,
        stream_index: usize,
        codec: Self::Codec,
        policy: &DecoderPolicy,
    ) -> Result<Self::Decoder, EngineError>;

    /// Allocate an empty packet buffer.
    fn alloc_packet(&self) -> Self::Packet;

    /// Allocate an empty frame buffer.
    fn alloc_frame(&self) -> Self::Frame;
}
