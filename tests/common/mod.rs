//! A scripted in-memory media engine with allocation accounting.
//!
//! Every resource the engine hands out records its allocation and its
//! release in a shared [`Ledger`], so tests can check that a session tears
//! down exactly what it built.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use framepeek::{
    DecoderPolicy, DemuxInput, EngineError, FrameDecoder, MediaEngine, MediaPacket, MediaType,
    ProbeBudget, Receive, StreamDescriptor, Submit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Input,
    Decoder,
    Packet,
    Frame,
}

/// Open stage at which the engine should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Open,
    Probe,
    DecoderLookup,
    DecoderInit,
}

#[derive(Debug, Default)]
pub struct Ledger {
    pub allocated: Vec<Resource>,
    pub released: Vec<Resource>,
    pub budgets: Vec<ProbeBudget>,
    pub policies: Vec<DecoderPolicy>,
    pub low_buffering_before_probe: Option<bool>,
    pub bytes_probed: u64,
    pub packet_reads: usize,
    pub packets_submitted: usize,
    pub packet_unrefs: usize,
    pub eof_sent: usize,
}

impl Ledger {
    pub fn outstanding(&self) -> Vec<Resource> {
        let mut outstanding = self.allocated.clone();
        for released in &self.released {
            if let Some(position) = outstanding.iter().position(|r| r == released) {
                outstanding.remove(position);
            }
        }
        outstanding
    }
}

/// One packet in the scripted container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedPacket {
    pub stream: usize,
    /// Whether decoding this packet yields a frame.
    pub yields_frame: bool,
    /// Whether the decoder rejects this packet as invalid data.
    pub corrupt: bool,
}

impl ScriptedPacket {
    pub fn video(stream: usize) -> Self {
        Self {
            stream,
            yields_frame: true,
            corrupt: false,
        }
    }

    pub fn header(stream: usize) -> Self {
        Self {
            stream,
            yields_frame: false,
            corrupt: false,
        }
    }

    pub fn corrupt(stream: usize) -> Self {
        Self {
            stream,
            yields_frame: false,
            corrupt: true,
        }
    }

    pub fn other(stream: usize) -> Self {
        Self::header(stream)
    }
}

#[derive(Debug, Clone)]
pub struct Script {
    pub streams: Vec<MediaType>,
    pub packets: Vec<ScriptedPacket>,
    pub fail_at: Option<FailAt>,
    /// Zero-based packet read that fails with a hard error.
    pub read_error_at: Option<usize>,
    /// Frames the decoder holds back until more input or a flush arrives.
    pub decoder_delay: usize,
    /// Size of the scripted input in bytes.
    pub input_bytes: u64,
}

impl Script {
    /// Audio on stream 0, video on stream 1, `frames` video packets
    /// interleaved with audio packets.
    pub fn interleaved(frames: usize) -> Self {
        let mut packets = Vec::new();
        for _ in 0..frames {
            packets.push(ScriptedPacket::other(0));
            packets.push(ScriptedPacket::video(1));
        }
        Self {
            streams: vec![MediaType::Audio, MediaType::Video],
            packets,
            ..Self::default()
        }
    }

    pub fn video_only(frames: usize) -> Self {
        Self {
            streams: vec![MediaType::Video],
            packets: (0..frames).map(|_| ScriptedPacket::video(0)).collect(),
            ..Self::default()
        }
    }

    pub fn audio_only(packets: usize) -> Self {
        Self {
            streams: vec![MediaType::Audio],
            packets: (0..packets).map(|_| ScriptedPacket::other(0)).collect(),
            ..Self::default()
        }
    }
}

impl Default for Script {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            packets: Vec::new(),
            fail_at: None,
            read_error_at: None,
            decoder_delay: 0,
            input_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    script: Script,
    ledger: Arc<Mutex<Ledger>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    pub fn ledger(&self) -> MutexGuard<'_, Ledger> {
        lock(&self.ledger)
    }
}

fn lock(ledger: &Arc<Mutex<Ledger>>) -> MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn allocate(ledger: &Arc<Mutex<Ledger>>, resource: Resource) {
    lock(ledger).allocated.push(resource);
}

fn release(ledger: &Arc<Mutex<Ledger>>, resource: Resource) {
    lock(ledger).released.push(resource);
}

pub struct ScriptedInput {
    script: Script,
    budget: ProbeBudget,
    low_buffering: bool,
    cursor: usize,
    ledger: Arc<Mutex<Ledger>>,
}

impl Drop for ScriptedInput {
    fn drop(&mut self) {
        release(&self.ledger, Resource::Input);
    }
}

pub struct ScriptedPacketBuffer {
    payload: Option<ScriptedPacket>,
    ordinal: u64,
    ledger: Arc<Mutex<Ledger>>,
}

impl Drop for ScriptedPacketBuffer {
    fn drop(&mut self) {
        release(&self.ledger, Resource::Packet);
    }
}

impl MediaPacket for ScriptedPacketBuffer {
    fn stream_index(&self) -> usize {
        self.payload.map_or(usize::MAX, |packet| packet.stream)
    }

    fn release(&mut self) {
        if self.payload.take().is_some() {
            lock(&self.ledger).packet_unrefs += 1;
        }
    }
}

/// Frame buffer: holds the ordinal of the packet the frame was decoded from.
pub struct ScriptedFrame {
    pub source_packet: Option<u64>,
    ledger: Arc<Mutex<Ledger>>,
}

impl Drop for ScriptedFrame {
    fn drop(&mut self) {
        release(&self.ledger, Resource::Frame);
    }
}

impl Clone for ScriptedFrame {
    fn clone(&self) -> Self {
        allocate(&self.ledger, Resource::Frame);
        Self {
            source_packet: self.source_packet,
            ledger: self.ledger.clone(),
        }
    }
}

pub struct ScriptedDecoder {
    pending: VecDeque<u64>,
    delay: usize,
    eof: bool,
    ledger: Arc<Mutex<Ledger>>,
}

impl Drop for ScriptedDecoder {
    fn drop(&mut self) {
        release(&self.ledger, Resource::Decoder);
    }
}

impl DemuxInput for ScriptedInput {
    type Packet = ScriptedPacketBuffer;

    fn enable_low_buffering(&mut self) {
        self.low_buffering = true;
    }

    fn probe_streams(&mut self) -> Result<(), EngineError> {
        let mut ledger = lock(&self.ledger);
        ledger.low_buffering_before_probe = Some(self.low_buffering);
        ledger.bytes_probed = self.script.input_bytes.min(self.budget.probe_bytes);
        if self.script.fail_at == Some(FailAt::Probe) {
            return Err(EngineError::new(-1094995529, "Invalid data found when processing input"));
        }
        Ok(())
    }

    fn streams(&self) -> Vec<StreamDescriptor> {
        self.script
            .streams
            .iter()
            .enumerate()
            .map(|(index, media_type)| StreamDescriptor {
                index,
                media_type: *media_type,
                codec_name: match media_type {
                    MediaType::Video => "scripted-video".to_string(),
                    _ => "scripted-other".to_string(),
                },
            })
            .collect()
    }

    fn read_packet(&mut self, packet: &mut ScriptedPacketBuffer) -> Result<bool, EngineError> {
        let read_index = {
            let mut ledger = lock(&self.ledger);
            ledger.packet_reads += 1;
            ledger.packet_reads - 1
        };

        if self.script.read_error_at == Some(read_index) {
            return Err(EngineError::new(-5, "Input/output error"));
        }

        match self.script.packets.get(self.cursor) {
            Some(next) => {
                packet.payload = Some(*next);
                packet.ordinal = self.cursor as u64;
                self.cursor += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl FrameDecoder for ScriptedDecoder {
    type Packet = ScriptedPacketBuffer;
    type Frame = ScriptedFrame;

    fn send_packet(&mut self, packet: &ScriptedPacketBuffer) -> Result<Submit, EngineError> {
        lock(&self.ledger).packets_submitted += 1;
        let Some(payload) = packet.payload else {
            return Err(EngineError::new(-22, "Invalid argument"));
        };
        if payload.corrupt {
            return Ok(Submit::Rejected);
        }
        if payload.yields_frame {
            self.pending.push_back(packet.ordinal);
        }
        Ok(Submit::Accepted)
    }

    fn send_eof(&mut self) -> Result<(), EngineError> {
        lock(&self.ledger).eof_sent += 1;
        self.eof = true;
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut ScriptedFrame) -> Result<Receive, EngineError> {
        if self.pending.len() > self.delay || (self.eof && !self.pending.is_empty()) {
            frame.source_packet = self.pending.pop_front();
            return Ok(Receive::Frame);
        }
        if self.eof {
            Ok(Receive::Drained)
        } else {
            Ok(Receive::NeedsInput)
        }
    }
}

pub struct ScriptedCodec;

impl MediaEngine for ScriptedEngine {
    type Packet = ScriptedPacketBuffer;
    type Frame = ScriptedFrame;
    type Input = ScriptedInput;
    type Codec = ScriptedCodec;
    type Decoder = ScriptedDecoder;

    fn open_input(&self, locator: &str, budget: &ProbeBudget) -> Result<ScriptedInput, EngineError> {
        lock(&self.ledger).budgets.push(*budget);
        if self.script.fail_at == Some(FailAt::Open) {
            return Err(EngineError::new(-2, format!("{locator}: No such file or directory")));
        }
        allocate(&self.ledger, Resource::Input);
        Ok(ScriptedInput {
            script: self.script.clone(),
            budget: *budget,
            low_buffering: false,
            cursor: 0,
            ledger: self.ledger.clone(),
        })
    }

    fn find_decoder(&self, _input: &ScriptedInput, _stream_index: usize) -> Option<ScriptedCodec> {
        if self.script.fail_at == Some(FailAt::DecoderLookup) {
            None
        } else {
            Some(ScriptedCodec)
        }
    }

    fn open_decoder(
        &self,
        _input: &ScriptedInput,
        _stream_index: usize,
        _codec: ScriptedCodec,
        policy: &DecoderPolicy,
    ) -> Result<ScriptedDecoder, EngineError> {
        lock(&self.ledger).policies.push(*policy);
        if self.script.fail_at == Some(FailAt::DecoderInit) {
            return Err(EngineError::new(-1, "Operation not permitted"));
        }
        allocate(&self.ledger, Resource::Decoder);
        Ok(ScriptedDecoder {
            pending: VecDeque::new(),
            delay: self.script.decoder_delay,
            eof: false,
            ledger: self.ledger.clone(),
        })
    }

    fn alloc_packet(&self) -> ScriptedPacketBuffer {
        allocate(&self.ledger, Resource::Packet);
        ScriptedPacketBuffer {
            payload: None,
            ordinal: 0,
            ledger: self.ledger.clone(),
        }
    }

    fn alloc_frame(&self) -> ScriptedFrame {
        allocate(&self.ledger, Resource::Frame);
        ScriptedFrame {
            source_packet: None,
            ledger: self.ledger.clone(),
        }
    }
}
