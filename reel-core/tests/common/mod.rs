// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A scripted engine that replays a fixed packet sequence through simple codec, filter, scaler and
//! resampler models.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use reel_core::engine::{
    status, BitstreamFilter, Decoder, Demuxer, Engine, EngineError, EngineFrame, EnginePacket,
    EngineResult, FormatInfo, Resampler, ResamplerConfig, Scaler, ScalerConfig, StreamDescriptor,
};
use reel_core::io::RegisteredSource;
use reel_core::packet::PacketFlags;
use reel_core::stream::{AudioParameters, CodecParameters, VideoParameters};
use reel_core::units::Rational;

pub const MAGIC: &[u8] = b"MOCK";
pub const FILTER_NAME: &str = "mock_annexb";
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];
pub const INVALID_DATA: i32 = -1_094_995_529;

pub const PIXEL_FORMAT_YUV420P: i32 = 0;
pub const SAMPLE_FORMAT_FLTP: i32 = 8;

#[derive(Clone, Debug, Default)]
pub struct MockPacket {
    stream: usize,
    pts: Option<i64>,
    duration: i64,
    flags: PacketFlags,
    data: Option<Arc<Vec<u8>>>,
}

impl MockPacket {
    pub fn new(stream: usize, pts: i64, duration: i64, fill: u8) -> Self {
        MockPacket {
            stream,
            pts: Some(pts),
            duration,
            flags: PacketFlags::KEY,
            data: Some(Arc::new(vec![fill; 8])),
        }
    }
}

impl EnginePacket for MockPacket {
    fn stream_index(&self) -> usize {
        self.stream
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn dts(&self) -> Option<i64> {
        self.pts
    }

    fn pos(&self) -> Option<i64> {
        None
    }

    fn duration(&self) -> i64 {
        self.duration
    }

    fn flags(&self) -> PacketFlags {
        self.flags
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref().map(|data| data.as_slice()).unwrap_or(&[])
    }

    fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    fn unref(&mut self) {
        *self = MockPacket::default();
    }

    fn reference(&mut self, src: &Self) -> EngineResult<()> {
        if src.is_empty() {
            return Err(EngineError::Status(status::INVALID));
        }
        *self = src.clone();
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockFrame {
    pts: Option<i64>,
    width: u32,
    height: u32,
    samples: usize,
    sample_rate: u32,
    channels: u16,
    fill: u8,
}

impl EngineFrame for MockFrame {
    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn coded_index(&self) -> Option<i64> {
        None
    }

    fn display_index(&self) -> Option<i64> {
        None
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> i32 {
        PIXEL_FORMAT_YUV420P
    }

    fn sample_count(&self) -> usize {
        self.samples
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_format(&self) -> i32 {
        SAMPLE_FORMAT_FLTP
    }
}

#[derive(Clone, Debug)]
pub enum Step {
    Packet(MockPacket),
    Again,
    Fail(i32),
}

#[derive(Clone, Debug)]
pub struct MockParams {
    index: usize,
    params: CodecParameters,
}

#[derive(Default)]
pub struct Counters {
    pub decoders_opened: AtomicUsize,
    pub decoders_closed: AtomicUsize,
    pub scalers_opened: AtomicUsize,
    pub resamplers_opened: AtomicUsize,
    pub scaler_configs: Mutex<Vec<ScalerConfig>>,
    pub resampler_configs: Mutex<Vec<ResamplerConfig>>,
    pub seeks: Mutex<Vec<(usize, i64)>>,
}

/// How a stream's decoder behaves.
#[derive(Clone, Debug)]
pub struct DecoderBehavior {
    /// Frames withheld until end of input, like a reordering codec.
    pub delay: usize,
    /// Frames produced per accepted packet.
    pub frames_per_packet: usize,
    /// Maximum frames buffered before packets are refused with "try again".
    pub capacity: Option<usize>,
    /// Packets with this pts are rejected as invalid data.
    pub reject_pts: Option<i64>,
    pub open_status: Option<i32>,
    pub close_status: Option<i32>,
    /// Video frames decoded from packets at or after this pts take on a new size.
    pub resize_at: Option<(i64, u32, u32)>,
    /// Audio frames report this channel count instead of the declared one.
    pub channels: Option<u16>,
}

impl Default for DecoderBehavior {
    fn default() -> Self {
        DecoderBehavior {
            delay: 0,
            frames_per_packet: 1,
            capacity: None,
            reject_pts: None,
            open_status: None,
            close_status: None,
            resize_at: None,
            channels: None,
        }
    }
}

pub struct MockEngine {
    pub streams: Vec<StreamDescriptor<MockParams>>,
    pub steps: Vec<Step>,
    pub decoders: Vec<DecoderBehavior>,
    pub resample_status: Option<i32>,
    pub filter: FilterBehavior,
    pub counters: Arc<Counters>,
}

/// How the mock bitstream filter behaves.
#[derive(Clone, Debug, Default)]
pub struct FilterBehavior {
    /// Packets withheld until more input arrives or input ends.
    pub delay: usize,
    /// Output packets per input packet. Zero is treated as one.
    pub split: usize,
    /// Number of sends refused while output is buffered.
    pub refusals: usize,
    /// Packets with this pts are rejected as invalid data.
    pub reject_pts: Option<i64>,
}

pub const VIDEO_TIME_BASE: Rational = Rational::new(1, 30_000);
pub const VIDEO_TICKS_PER_FRAME: i64 = 1000;
pub const AUDIO_RATE: u32 = 44_100;
pub const AUDIO_FRAME_SIZE: u32 = 1024;

fn descriptor(
    index: usize,
    params: CodecParameters,
    time_base: Rational,
) -> StreamDescriptor<MockParams> {
    let (codec_name, frame_rate) = match params {
        CodecParameters::Video(_) => ("h264", Rational::new(30, 1)),
        CodecParameters::Audio(_) => ("aac", Rational::new(0, 0)),
        CodecParameters::Unknown => ("bin_data", Rational::new(0, 0)),
    };

    StreamDescriptor {
        index,
        codec_name: codec_name.to_string(),
        codec_long_name: codec_name.to_uppercase(),
        bit_rate: 128_000,
        time_base,
        frame_rate,
        frame_count: 0,
        duration: -1,
        params: params.clone(),
        native: MockParams { index, params },
    }
}

impl MockEngine {
    pub fn empty() -> Self {
        MockEngine {
            streams: Vec::new(),
            steps: Vec::new(),
            decoders: Vec::new(),
            resample_status: None,
            filter: FilterBehavior::default(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn add_video(&mut self, width: u32, height: u32) -> usize {
        let mut params = VideoParameters::default();
        params.with_size(width, height).with_pixel_format(PIXEL_FORMAT_YUV420P);

        let index = self.streams.len();
        self.streams.push(descriptor(index, CodecParameters::Video(params), VIDEO_TIME_BASE));
        self.decoders.push(DecoderBehavior::default());
        index
    }

    pub fn add_audio(&mut self) -> usize {
        let mut params = AudioParameters::default();
        params
            .with_channels(2, 0b11)
            .with_sample_rate(AUDIO_RATE)
            .with_sample_format(SAMPLE_FORMAT_FLTP)
            .with_frame_size(AUDIO_FRAME_SIZE);

        let index = self.streams.len();
        let time_base = Rational::new(1, AUDIO_RATE as i32);
        self.streams.push(descriptor(index, CodecParameters::Audio(params), time_base));
        self.decoders.push(DecoderBehavior::default());
        index
    }

    pub fn add_unknown(&mut self) -> usize {
        let index = self.streams.len();
        self.streams.push(descriptor(index, CodecParameters::Unknown, Rational::new(1, 1000)));
        self.decoders.push(DecoderBehavior::default());
        index
    }

    /// A video stream of `frames` frames at 30 fps, each packet filled with its ordinal plus one.
    pub fn video_clip(frames: i64, width: u32, height: u32) -> Self {
        let mut engine = MockEngine::empty();
        let video = engine.add_video(width, height);

        for k in 0..frames {
            let fill = (k % 250 + 1) as u8;
            engine.steps.push(Step::Packet(MockPacket::new(
                video,
                k * VIDEO_TICKS_PER_FRAME,
                VIDEO_TICKS_PER_FRAME,
                fill,
            )));
        }
        engine
    }

    /// One second of 30 fps video interleaved with one second of 44.1 kHz stereo audio.
    pub fn av_clip() -> Self {
        let mut engine = MockEngine::empty();
        let video = engine.add_video(64, 36);
        let audio = engine.add_audio();

        let mut events = Vec::new();

        for k in 0..30i64 {
            // Presentation time in units of 1 / (30 * 44100) seconds.
            let at = k * i64::from(AUDIO_RATE);
            let pts = k * VIDEO_TICKS_PER_FRAME;
            let packet = MockPacket::new(video, pts, VIDEO_TICKS_PER_FRAME, 1);
            events.push((at, packet));
        }

        let total = i64::from(AUDIO_RATE);
        let mut start = 0i64;
        while start < total {
            let samples = (total - start).min(i64::from(AUDIO_FRAME_SIZE));
            let at = start * 30;
            events.push((at, MockPacket::new(audio, start, samples, 2)));
            start += samples;
        }

        events.sort_by_key(|(at, packet)| (*at, packet.stream));
        engine.steps = events.into_iter().map(|(_, packet)| Step::Packet(packet)).collect();
        engine
    }

    /// Serialize the script as a byte source body.
    pub fn source_bytes() -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 60]);
        bytes
    }

    fn demuxer(&self) -> MockDemuxer {
        MockDemuxer {
            streams: self.streams.clone(),
            all: self.steps.clone(),
            steps: self.steps.iter().cloned().collect(),
            counters: Arc::clone(&self.counters),
        }
    }
}

pub struct MockDemuxer {
    streams: Vec<StreamDescriptor<MockParams>>,
    all: Vec<Step>,
    steps: VecDeque<Step>,
    counters: Arc<Counters>,
}

impl Demuxer for MockDemuxer {
    type Packet = MockPacket;
    type Params = MockParams;

    fn format(&self) -> FormatInfo {
        FormatInfo {
            name: "mock".to_string(),
            long_name: "Scripted Mock Container".to_string(),
            mime_type: "video/x-mock".to_string(),
        }
    }

    fn duration(&self) -> i64 {
        1_000_000
    }

    fn streams(&self) -> EngineResult<Vec<StreamDescriptor<MockParams>>> {
        Ok(self.streams.clone())
    }

    fn read_packet(&mut self, packet: &mut MockPacket) -> EngineResult<()> {
        match self.steps.pop_front() {
            Some(Step::Packet(next)) => {
                *packet = next;
                Ok(())
            }
            Some(Step::Again) => Err(EngineError::Again),
            Some(Step::Fail(code)) => Err(EngineError::from_status(code)),
            None => Err(EngineError::EndOfFile),
        }
    }

    fn seek(&mut self, stream: usize, timestamp: i64) -> EngineResult<()> {
        self.counters.seeks.lock().unwrap().push((stream, timestamp));

        let start = self
            .all
            .iter()
            .position(|step| match step {
                Step::Packet(p) => p.stream == stream && p.pts.unwrap_or(0) >= timestamp,
                _ => false,
            })
            .unwrap_or(self.all.len());

        self.steps = self.all[start..].iter().cloned().collect();
        Ok(())
    }
}

pub struct MockDecoder {
    params: MockParams,
    behavior: DecoderBehavior,
    queue: VecDeque<MockFrame>,
    eof: bool,
    counters: Arc<Counters>,
}

impl MockDecoder {
    fn frame_for(&self, packet: &MockPacket) -> MockFrame {
        let fill = packet.data().first().copied().unwrap_or(0);

        match &self.params.params {
            CodecParameters::Video(params) => {
                let (width, height) = match self.behavior.resize_at {
                    Some((pts, width, height)) if packet.pts.unwrap_or(0) >= pts => {
                        (width, height)
                    }
                    _ => (params.width, params.height),
                };

                MockFrame { pts: packet.pts, width, height, fill, ..Default::default() }
            }
            CodecParameters::Audio(params) => MockFrame {
                pts: packet.pts,
                samples: packet.duration as usize,
                sample_rate: params.sample_rate,
                channels: self.behavior.channels.unwrap_or(params.channels),
                fill,
                ..Default::default()
            },
            CodecParameters::Unknown => MockFrame::default(),
        }
    }
}

impl Decoder for MockDecoder {
    type Packet = MockPacket;
    type Frame = MockFrame;

    fn send_packet(&mut self, packet: &MockPacket) -> EngineResult<()> {
        if self.eof {
            return Err(EngineError::EndOfFile);
        }

        if let Some(capacity) = self.behavior.capacity {
            if self.queue.len() + self.behavior.frames_per_packet > capacity {
                return Err(EngineError::Again);
            }
        }

        if self.behavior.reject_pts.is_some() && self.behavior.reject_pts == packet.pts {
            return Err(EngineError::Status(INVALID_DATA));
        }

        for _ in 0..self.behavior.frames_per_packet {
            let frame = self.frame_for(packet);
            self.queue.push_back(frame);
        }
        Ok(())
    }

    fn send_eof(&mut self) -> EngineResult<()> {
        if self.eof {
            return Err(EngineError::EndOfFile);
        }
        self.eof = true;
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut MockFrame) -> EngineResult<()> {
        if self.queue.len() > self.behavior.delay || (self.eof && !self.queue.is_empty()) {
            if let Some(next) = self.queue.pop_front() {
                *frame = next;
                return Ok(());
            }
        }

        if self.eof {
            Err(EngineError::EndOfFile)
        }
        else {
            Err(EngineError::Again)
        }
    }

    fn flush(&mut self) {
        self.queue.clear();
        self.eof = false;
    }

    fn close(self) -> EngineResult<()> {
        self.counters.decoders_closed.fetch_add(1, Ordering::SeqCst);

        match self.behavior.close_status {
            Some(code) => Err(EngineError::Status(code)),
            None => Ok(()),
        }
    }
}

pub struct MockFilter {
    buffered: VecDeque<MockPacket>,
    behavior: FilterBehavior,
    refusals: usize,
    stalled: bool,
    eof: bool,
}

impl BitstreamFilter for MockFilter {
    type Packet = MockPacket;

    fn send(&mut self, packet: &mut MockPacket) -> EngineResult<()> {
        if self.eof {
            return Err(EngineError::EndOfFile);
        }

        // Input is refused while output is waiting, as a splitting filter does.
        let refuse = self.behavior.split > 1 && self.buffered.len() > self.behavior.delay;

        if refuse || (self.refusals > 0 && !self.buffered.is_empty()) {
            if !refuse {
                self.refusals -= 1;
                self.stalled = true;
            }
            return Err(EngineError::Again);
        }

        if self.behavior.reject_pts.is_some() && self.behavior.reject_pts == packet.pts {
            return Err(EngineError::Status(INVALID_DATA));
        }

        let input = std::mem::take(packet);

        for part in 0..self.behavior.split.max(1) {
            let mut data = START_CODE.to_vec();
            data.extend_from_slice(input.data());
            if self.behavior.split > 1 {
                data.push(part as u8);
            }

            let mut filtered = input.clone();
            filtered.data = Some(Arc::new(data));
            self.buffered.push_back(filtered);
        }
        Ok(())
    }

    fn send_eof(&mut self) -> EngineResult<()> {
        self.eof = true;
        Ok(())
    }

    fn receive(&mut self, packet: &mut MockPacket) -> EngineResult<()> {
        let withheld = self.buffered.len() <= self.behavior.delay && !self.stalled;

        if withheld && !self.eof {
            return Err(EngineError::Again);
        }

        match self.buffered.pop_front() {
            Some(next) => {
                *packet = next;
                self.stalled = false;
                Ok(())
            }
            None if self.eof => Err(EngineError::EndOfFile),
            None => Err(EngineError::Again),
        }
    }

    fn flush(&mut self) {
        self.buffered.clear();
        self.stalled = false;
        self.eof = false;
    }
}

pub struct MockScaler {
    config: ScalerConfig,
}

impl Scaler for MockScaler {
    type Frame = MockFrame;

    fn scale(&mut self, frame: &MockFrame, dst: &mut [u8], stride: usize) -> EngineResult<()> {
        let rows = self.config.dst_height as usize;

        if stride != 4 * self.config.dst_width as usize || dst.len() != stride * rows {
            return Err(EngineError::Status(status::INVALID));
        }
        if frame.width != self.config.src_width || frame.height != self.config.src_height {
            return Err(EngineError::Status(status::INVALID));
        }

        dst.fill(frame.fill);
        Ok(())
    }
}

pub struct MockResampler {
    status: Option<i32>,
}

impl Resampler for MockResampler {
    type Frame = MockFrame;

    fn max_output_samples(&self, in_samples: usize) -> EngineResult<usize> {
        Ok(in_samples + 32)
    }

    fn convert(&mut self, frame: &MockFrame, dst: &mut [u8]) -> EngineResult<usize> {
        if let Some(code) = self.status {
            return Err(EngineError::Status(code));
        }

        let value = f64::from(frame.fill) / 256.0;
        let bytes = frame.samples * 16;
        if bytes > dst.len() {
            return Err(EngineError::Status(status::INVALID));
        }

        for chunk in dst[..bytes].chunks_exact_mut(8) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        Ok(frame.samples)
    }
}

impl Engine for MockEngine {
    type Params = MockParams;
    type Packet = MockPacket;
    type Frame = MockFrame;
    type Demuxer = MockDemuxer;
    type Decoder = MockDecoder;
    type Filter = MockFilter;
    type Scaler = MockScaler;
    type Resampler = MockResampler;

    fn open_file(&self, path: &Path) -> EngineResult<MockDemuxer> {
        if path.extension().map_or(true, |ext| ext != "mock") {
            return Err(EngineError::Status(INVALID_DATA));
        }
        Ok(self.demuxer())
    }

    fn probe(&self, prefix: &[u8], name: &str) -> Option<String> {
        if prefix.starts_with(MAGIC) || name.ends_with(".mock") {
            Some("mock".to_string())
        }
        else {
            None
        }
    }

    fn open_source(&self, mut source: RegisteredSource, format: &str) -> EngineResult<MockDemuxer> {
        if format != "mock" {
            return Err(EngineError::Status(status::INVALID));
        }

        let mut magic = [0u8; 4];
        source.read_exact(&mut magic).map_err(|_| EngineError::Status(INVALID_DATA))?;
        if magic != MAGIC {
            return Err(EngineError::Status(INVALID_DATA));
        }

        Ok(self.demuxer())
    }

    fn alloc_packet(&self) -> EngineResult<MockPacket> {
        Ok(MockPacket::default())
    }

    fn alloc_frame(&self) -> EngineResult<MockFrame> {
        Ok(MockFrame::default())
    }

    fn open_decoder(&self, params: &MockParams) -> EngineResult<MockDecoder> {
        let behavior = self.decoders.get(params.index).cloned().unwrap_or_default();

        if let Some(code) = behavior.open_status {
            return Err(EngineError::Status(code));
        }

        self.counters.decoders_opened.fetch_add(1, Ordering::SeqCst);

        Ok(MockDecoder {
            params: params.clone(),
            behavior,
            queue: VecDeque::new(),
            eof: false,
            counters: Arc::clone(&self.counters),
        })
    }

    fn open_filter(&self, name: &str, _: &MockParams, _: Rational) -> EngineResult<MockFilter> {
        if name != FILTER_NAME {
            return Err(EngineError::Status(status::INVALID));
        }
        Ok(MockFilter {
            buffered: VecDeque::new(),
            behavior: self.filter.clone(),
            refusals: self.filter.refusals,
            stalled: false,
            eof: false,
        })
    }

    fn open_scaler(&self, config: &ScalerConfig) -> EngineResult<MockScaler> {
        if config.dst_width == 0 || config.dst_height == 0 {
            return Err(EngineError::Status(status::INVALID));
        }
        self.counters.scalers_opened.fetch_add(1, Ordering::SeqCst);
        self.counters.scaler_configs.lock().unwrap().push(*config);
        Ok(MockScaler { config: *config })
    }

    fn open_resampler(&self, config: &ResamplerConfig) -> EngineResult<MockResampler> {
        self.counters.resamplers_opened.fetch_add(1, Ordering::SeqCst);
        self.counters.resampler_configs.lock().unwrap().push(*config);
        Ok(MockResampler { status: self.resample_status })
    }
}
