// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `stream` module provides the per-stream decode pipeline.
//!
//! A stream is created for every elementary stream of a container when the container is opened.
//! It holds codec metadata but no decode resources until it is opened. Opening a stream acquires a
//! decoder, a decoded-frame slot, and a kind-specific conversion stage. Closing it releases them.
//!
//! ```text
//!     Closed --open()--> Open --close()--> Closed
//! ```
//!
//! While open, each read yields exactly one of a converted frame, a "try again" signal, or the end
//! of the stream.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};

use crate::engine::{Decoder, Engine, EngineError, EngineFrame, EnginePacket, StreamDescriptor};
use crate::errors::{misuse_error, unsupported_error, Error, MisuseKind, Result};
use crate::frame::FrameHeader;
use crate::outcome::ReadOutcome;
use crate::units::{Rational, TimeBase};

mod audio;
mod filter;
mod video;

pub use audio::AudioStream;
pub(crate) use filter::FilterStage;
pub use video::{VideoOptions, VideoStream};

/// The kind of data carried by a stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
    Unknown,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Codec parameters for a video stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoParameters {
    pub width: u32,
    pub height: u32,
    /// Native pixel format identifier.
    pub pixel_format: i32,
    /// Sample aspect ratio. `0/0` if unknown.
    pub aspect_ratio: Rational,
}

impl VideoParameters {
    pub fn with_size(&mut self, width: u32, height: u32) -> &mut Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_pixel_format(&mut self, pixel_format: i32) -> &mut Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn with_aspect_ratio(&mut self, aspect_ratio: Rational) -> &mut Self {
        self.aspect_ratio = aspect_ratio;
        self
    }
}

/// Codec parameters for an audio stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioParameters {
    pub channels: u16,
    /// Native channel layout mask. `0` if unspecified.
    pub channel_layout: u64,
    pub sample_rate: u32,
    /// Native sample format identifier.
    pub sample_format: i32,
    /// Samples per channel in a frame. `0` if variable.
    pub frame_size: u32,
}

impl AudioParameters {
    pub fn with_channels(&mut self, channels: u16, layout: u64) -> &mut Self {
        self.channels = channels;
        self.channel_layout = layout;
        self
    }

    pub fn with_sample_rate(&mut self, sample_rate: u32) -> &mut Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_sample_format(&mut self, sample_format: i32) -> &mut Self {
        self.sample_format = sample_format;
        self
    }

    pub fn with_frame_size(&mut self, frame_size: u32) -> &mut Self {
        self.frame_size = frame_size;
        self
    }
}

/// Engine-independent codec parameters of a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecParameters {
    Video(VideoParameters),
    Audio(AudioParameters),
    Unknown,
}

impl CodecParameters {
    pub fn kind(&self) -> StreamKind {
        match self {
            CodecParameters::Video(_) => StreamKind::Video,
            CodecParameters::Audio(_) => StreamKind::Audio,
            CodecParameters::Unknown => StreamKind::Unknown,
        }
    }
}

/// Immutable metadata of a stream, shared with the frames decoded from it.
#[derive(Clone, Debug)]
pub struct StreamInfo {
    index: usize,
    kind: StreamKind,
    codec_name: String,
    codec_long_name: String,
    bit_rate: i64,
    time_base: Rational,
    frame_rate: Rational,
    frame_count: i64,
    duration: i64,
}

impl StreamInfo {
    fn from_descriptor<P>(desc: &StreamDescriptor<P>) -> Self {
        StreamInfo {
            index: desc.index,
            kind: desc.params.kind(),
            codec_name: desc.codec_name.clone(),
            codec_long_name: desc.codec_long_name.clone(),
            bit_rate: desc.bit_rate,
            time_base: desc.time_base,
            frame_rate: desc.frame_rate,
            frame_count: desc.frame_count,
            duration: desc.duration,
        }
    }

    /// The stable index of the stream within its container.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    pub fn codec_long_name(&self) -> &str {
        &self.codec_long_name
    }

    pub fn bit_rate(&self) -> i64 {
        self.bit_rate
    }

    /// The time-base of timestamps in the stream, or `None` if the container did not declare one.
    pub fn time_base(&self) -> Option<TimeBase> {
        TimeBase::from_rational(self.time_base)
    }

    /// The nominal frame rate.
    pub fn frame_rate(&self) -> Rational {
        self.frame_rate
    }

    /// The total number of frames, or `0` if unknown.
    pub fn frame_count(&self) -> i64 {
        self.frame_count
    }

    /// The duration of the stream. Zero if unknown.
    pub fn duration(&self) -> Duration {
        match (self.time_base(), u64::try_from(self.duration)) {
            (Some(tb), Ok(ts)) => tb.calc_duration(ts),
            _ => Duration::ZERO,
        }
    }
}

struct DecodeSession<E: Engine> {
    decoder: E::Decoder,
    frame: E::Frame,
    /// End of input was signalled to the decoder.
    draining: bool,
    /// The decoder has no more frames to give.
    exhausted: bool,
    frames_received: i64,
}

/// The result of offering the in-flight packet to a stream's decoder.
pub(crate) struct Decoded {
    pub(crate) outcome: ReadOutcome<()>,
    /// The decoder could not yet accept the packet, so it must be offered again.
    pub(crate) deferred: bool,
}

/// The state shared by every stream kind: metadata, the decode session, and the optional filter.
pub(crate) struct StreamCore<E: Engine> {
    info: Arc<StreamInfo>,
    params: CodecParameters,
    native: E::Params,
    engine: Arc<E>,
    session: Option<DecodeSession<E>>,
    filter: Option<FilterStage<E>>,
    skip: bool,
}

impl<E: Engine> StreamCore<E> {
    fn new(engine: Arc<E>, desc: StreamDescriptor<E::Params>) -> Self {
        let info = Arc::new(StreamInfo::from_descriptor(&desc));
        StreamCore {
            info,
            params: desc.params,
            native: desc.native,
            engine,
            session: None,
            filter: None,
            skip: false,
        }
    }

    fn index(&self) -> usize {
        self.info.index
    }

    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn is_opened(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return misuse_error(MisuseKind::StreamAlreadyOpen);
        }

        let stream = self.index();

        let decoder = self
            .engine
            .open_decoder(&self.native)
            .map_err(|status| Error::CodecOpenError { stream, status })?;

        let frame =
            self.engine.alloc_frame().map_err(|status| Error::CodecOpenError { stream, status })?;

        self.session = Some(DecodeSession {
            decoder,
            frame,
            draining: false,
            exhausted: false,
            frames_received: 0,
        });
        self.skip = false;

        debug!("opened {} stream {} ({})", self.info.kind, stream, self.info.codec_name);
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        let session = match self.session.take() {
            Some(session) => session,
            None => return misuse_error(MisuseKind::StreamNotOpen),
        };

        self.skip = false;

        if let Some(filter) = self.filter.as_mut() {
            filter.reset();
        }

        let DecodeSession { decoder, frame, .. } = session;
        drop(frame);

        let stream = self.index();
        debug!("closing {} stream {}", self.info.kind, stream);

        decoder.close().map_err(|status| Error::CodecCloseError { stream, status })
    }

    /// Discard decoder state after the container was repositioned.
    pub(crate) fn flush(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.decoder.flush();
            session.draining = false;
            session.exhausted = false;
            session.frames_received = 0;
        }
        if let Some(filter) = self.filter.as_mut() {
            filter.reset();
        }
        self.skip = false;
    }

    /// Advance the decoder by at most one frame.
    ///
    /// If `pending` holds a packet it must belong to this stream, and it is sent to the decoder
    /// first. The packet is released once the decoder accepts it. If the decoder is full the packet
    /// is kept and reported as deferred. With no packet pending, the decoder is drained if the
    /// container has reached the end of its input, or polled for buffered frames otherwise.
    ///
    /// On `Ready`, the decoded frame is available from [`StreamCore::frame`].
    pub(crate) fn decode(&mut self, pending: &mut E::Packet, input_ended: bool) -> Result<Decoded> {
        let stream = self.info.index;

        // Packets still buffered by the filter keep the decoder from draining.
        let input_ended =
            input_ended && self.filter.as_ref().map_or(true, |filter| !filter.has_backlog());

        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return misuse_error(MisuseKind::StreamNotOpen),
        };

        let mut deferred = false;

        if !pending.is_empty() {
            if pending.stream_index() != stream {
                return misuse_error(MisuseKind::ForeignPacket);
            }

            match session.decoder.send_packet(pending) {
                Ok(()) => {
                    pending.unref();
                    session.exhausted = false;
                }
                Err(EngineError::Again) => deferred = true,
                Err(status) => {
                    pending.unref();
                    self.skip = false;
                    return Err(Error::DecodeError { stream, status });
                }
            }
        }
        else if input_ended && !session.draining {
            match session.decoder.send_eof() {
                Ok(()) | Err(EngineError::EndOfFile) => session.draining = true,
                Err(status) => {
                    self.skip = false;
                    return Err(Error::DecodeError { stream, status });
                }
            }
        }

        if session.exhausted {
            return Ok(Decoded { outcome: ReadOutcome::End, deferred });
        }

        let outcome = match session.decoder.receive_frame(&mut session.frame) {
            Ok(()) => {
                session.frames_received += 1;
                self.skip = false;
                ReadOutcome::Ready(())
            }
            Err(EngineError::Again) if session.draining => {
                // A draining decoder that still wants input has nothing left.
                session.exhausted = true;
                ReadOutcome::End
            }
            Err(EngineError::Again) => {
                trace!("stream {} needs more input", stream);
                self.skip = true;
                ReadOutcome::Again
            }
            Err(EngineError::EndOfFile) => {
                session.exhausted = true;
                ReadOutcome::End
            }
            Err(status) => {
                self.skip = false;
                return Err(Error::DecodeError { stream, status });
            }
        };

        Ok(Decoded { outcome, deferred })
    }

    /// The most recently decoded frame.
    pub(crate) fn frame(&self) -> Option<&E::Frame> {
        self.session.as_ref().map(|session| &session.frame)
    }

    /// Build the header for the most recently decoded frame.
    pub(crate) fn frame_header(&self) -> Option<FrameHeader> {
        let session = self.session.as_ref()?;
        let frame = &session.frame;

        // Engines that do not number frames get the output ordinal since the last open or seek.
        let ordinal = session.frames_received - 1;
        let coded = frame.coded_index().unwrap_or(ordinal);
        let display = frame.display_index().unwrap_or(ordinal);

        Some(FrameHeader::new(Arc::clone(&self.info), frame.pts(), coded, display))
    }

    pub(crate) fn filter_mut(&mut self) -> Option<&mut FilterStage<E>> {
        self.filter.as_mut()
    }
}

/// A stream whose data cannot be decoded into frames.
///
/// Opening and closing only track the stream's state.
pub struct UnknownStream<E: Engine> {
    core: StreamCore<E>,
    opened: bool,
}

impl<E: Engine> UnknownStream<E> {
    pub fn info(&self) -> &StreamInfo {
        &self.core.info
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn open(&mut self) -> Result<()> {
        if self.opened {
            return misuse_error(MisuseKind::StreamAlreadyOpen);
        }
        self.opened = true;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if !self.opened {
            return misuse_error(MisuseKind::StreamNotOpen);
        }
        self.opened = false;
        Ok(())
    }

    pub(crate) fn read_frame<T>(&self) -> Result<T> {
        if !self.opened {
            return misuse_error(MisuseKind::StreamNotOpen);
        }
        unsupported_error("reading frames from a stream of unknown kind")
    }
}

/// A stream of any kind.
pub enum Stream<E: Engine> {
    Video(VideoStream<E>),
    Audio(AudioStream<E>),
    Unknown(UnknownStream<E>),
}

impl<E: Engine> Stream<E> {
    pub(crate) fn new(engine: Arc<E>, desc: StreamDescriptor<E::Params>) -> Self {
        let video = match &desc.params {
            CodecParameters::Video(params) => Some(params.clone()),
            _ => None,
        };
        let audio = match &desc.params {
            CodecParameters::Audio(params) => Some(params.clone()),
            _ => None,
        };

        let core = StreamCore::new(engine, desc);

        if let Some(params) = video {
            Stream::Video(VideoStream::new(core, params))
        }
        else if let Some(params) = audio {
            Stream::Audio(AudioStream::new(core, params))
        }
        else {
            Stream::Unknown(UnknownStream { core, opened: false })
        }
    }

    pub(crate) fn core(&self) -> &StreamCore<E> {
        match self {
            Stream::Video(stream) => &stream.core,
            Stream::Audio(stream) => &stream.core,
            Stream::Unknown(stream) => &stream.core,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut StreamCore<E> {
        match self {
            Stream::Video(stream) => &mut stream.core,
            Stream::Audio(stream) => &mut stream.core,
            Stream::Unknown(stream) => &mut stream.core,
        }
    }

    pub fn info(&self) -> &StreamInfo {
        &self.core().info
    }

    pub fn index(&self) -> usize {
        self.info().index()
    }

    pub fn kind(&self) -> StreamKind {
        self.info().kind()
    }

    /// The engine-independent codec parameters.
    pub fn params(&self) -> &CodecParameters {
        &self.core().params
    }

    pub fn is_opened(&self) -> bool {
        match self {
            Stream::Unknown(stream) => stream.is_opened(),
            _ => self.core().is_opened(),
        }
    }

    /// Returns `true` if a "need more input" outcome was the last result of a decode.
    pub fn skipped(&self) -> bool {
        self.core().skip
    }

    /// The name of the bitstream filter applied to the stream, if any.
    pub fn filter_name(&self) -> Option<&str> {
        self.core().filter.as_ref().map(|filter| filter.name())
    }

    /// Open the stream with default options.
    pub fn open(&mut self) -> Result<()> {
        match self {
            Stream::Video(stream) => stream.open(),
            Stream::Audio(stream) => stream.open(),
            Stream::Unknown(stream) => stream.open(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            Stream::Video(stream) => stream.close(),
            Stream::Audio(stream) => stream.close(),
            Stream::Unknown(stream) => stream.close(),
        }
    }

    /// Bind a named bitstream filter, replacing any filter already applied.
    pub(crate) fn apply_filter(&mut self, name: &str) -> Result<()> {
        let core = self.core_mut();
        let stream = core.index();

        let filter = FilterStage::new(&*core.engine, name, &core.native, core.info.time_base)
            .map_err(|status| Error::FilterError { stream, status })?;

        core.filter = Some(filter);
        Ok(())
    }

    /// Remove the bitstream filter, returning `true` if one was applied.
    pub(crate) fn remove_filter(&mut self) -> bool {
        self.core_mut().filter.take().is_some()
    }

    pub fn as_video(&self) -> Option<&VideoStream<E>> {
        match self {
            Stream::Video(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_video_mut(&mut self) -> Option<&mut VideoStream<E>> {
        match self {
            Stream::Video(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioStream<E>> {
        match self {
            Stream::Audio(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_audio_mut(&mut self) -> Option<&mut AudioStream<E>> {
        match self {
            Stream::Audio(stream) => Some(stream),
            _ => None,
        }
    }
}

impl<E: Engine> fmt::Debug for Stream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("info", self.info())
            .field("params", self.params())
            .field("opened", &self.is_opened())
            .finish()
    }
}
