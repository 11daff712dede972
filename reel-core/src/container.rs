// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `container` module provides the demultiplexer that owns a media container's streams.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::engine::{status, Demuxer, Engine, EngineError, EnginePacket, FormatInfo};
use crate::errors::{misuse_error, Error, MisuseKind, Result};
use crate::frame::{AudioFrame, Frame, VideoFrame};
use crate::io::{self, SourceHandlers, SourceRegistration};
use crate::outcome::ReadOutcome;
use crate::packet::Packet;
use crate::stream::{AudioStream, Stream, StreamKind, VideoStream};
use crate::units::MICROS_TIME_BASE;

/// `ContainerOptions` is a common set of options that all containers use.
#[derive(Copy, Clone, Debug)]
pub struct ContainerOptions {
    /// The number of leading bytes of a byte source read to identify its container format.
    ///
    /// Default: 4 MiB.
    pub probe_size: usize,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        ContainerOptions { probe_size: 4 * 1024 * 1024 }
    }
}

/// A `MediaContainer` demultiplexes a container into packets and routes them to its streams.
///
/// # Reading
///
/// [`read_packet`](MediaContainer::read_packet) advances the container and leaves the packet in
/// flight. A subsequent [`read_frame`](MediaContainer::read_frame) on the packet's stream decodes
/// it. Alternatively, [`next_frame`](MediaContainer::next_frame) performs both steps, retrying
/// until a frame from any opened stream is produced.
///
/// The container holds one in-flight packet shared by all of its streams, so reads on different
/// streams of the same container must not be interleaved across threads without external
/// synchronization.
///
/// # Closing
///
/// Streams that are still open when the container is closed or dropped are closed first.
pub struct MediaContainer<E: Engine> {
    engine: Arc<E>,
    name: String,
    format: FormatInfo,
    duration: i64,
    streams: Vec<Stream<E>>,
    packet: E::Packet,
    /// The in-flight packet was not accepted by its decoder and is handed out again.
    held: bool,
    input_ended: bool,
    demuxer: E::Demuxer,
    registration: Option<SourceRegistration>,
}

impl<E: Engine> MediaContainer<E> {
    /// Open a container from a file.
    pub fn open<P: AsRef<Path>>(engine: Arc<E>, path: P) -> Result<Self> {
        let path = path.as_ref();
        let demuxer = engine.open_file(path).map_err(Error::ContainerOpenError)?;
        Self::from_demuxer(engine, path.display().to_string(), demuxer, None)
    }

    /// Open a container from a custom byte source.
    ///
    /// `name` is used as a hint when the format cannot be identified from the source's content.
    pub fn from_source(
        engine: Arc<E>,
        name: &str,
        handlers: SourceHandlers,
        options: &ContainerOptions,
    ) -> Result<Self> {
        let seekable = handlers.is_seekable();
        let registration = io::register(handlers)?;
        let mut source = registration.source();

        // The prefix can only be returned to the engine if the source can be rewound.
        let prefix = if seekable {
            io::probe_prefix(&mut source, options.probe_size)?
        }
        else {
            Vec::new()
        };

        let format = engine
            .probe(&prefix, name)
            .ok_or(Error::ContainerOpenError(EngineError::Status(status::INVALID)))?;

        debug!("byte source {} probed as {}", registration.token(), format);

        let demuxer = engine.open_source(source, &format).map_err(Error::ContainerOpenError)?;
        Self::from_demuxer(engine, name.to_string(), demuxer, Some(registration))
    }

    fn from_demuxer(
        engine: Arc<E>,
        name: String,
        demuxer: E::Demuxer,
        registration: Option<SourceRegistration>,
    ) -> Result<Self> {
        let descriptors = demuxer.streams().map_err(Error::ContainerOpenError)?;
        let packet = engine.alloc_packet().map_err(Error::ContainerOpenError)?;

        let streams = descriptors
            .into_iter()
            .map(|desc| Stream::new(Arc::clone(&engine), desc))
            .collect::<Vec<_>>();

        let format = demuxer.format();

        info!("opened {} as {} with {} streams", name, format.name, streams.len());

        Ok(MediaContainer {
            engine,
            name,
            format,
            duration: demuxer.duration(),
            streams,
            packet,
            held: false,
            input_ended: false,
            demuxer,
            registration,
        })
    }

    /// The engine the container was opened with.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The file path or source name the container was opened from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format_name(&self) -> &str {
        &self.format.name
    }

    pub fn format_long_name(&self) -> &str {
        &self.format.long_name
    }

    pub fn format_mime_type(&self) -> &str {
        &self.format.mime_type
    }

    /// The duration of the container. Zero if unknown.
    pub fn duration(&self) -> Duration {
        u64::try_from(self.duration)
            .map(|us| MICROS_TIME_BASE.calc_duration(us))
            .unwrap_or(Duration::ZERO)
    }

    /// Returns `true` if the container is backed by a custom byte source.
    pub fn is_custom_source(&self) -> bool {
        self.registration.is_some()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// All streams, ordered by index.
    pub fn streams(&self) -> &[Stream<E>] {
        &self.streams
    }

    pub fn stream(&self, index: usize) -> Option<&Stream<E>> {
        self.streams.get(index)
    }

    pub fn stream_mut(&mut self, index: usize) -> Option<&mut Stream<E>> {
        self.streams.get_mut(index)
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &VideoStream<E>> + '_ {
        self.streams.iter().filter_map(Stream::as_video)
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &AudioStream<E>> + '_ {
        self.streams.iter().filter_map(Stream::as_audio)
    }

    fn stream_at(&mut self, index: usize) -> Result<&mut Stream<E>> {
        match self.streams.get_mut(index) {
            Some(stream) => Ok(stream),
            None => misuse_error(MisuseKind::InvalidStream),
        }
    }

    /// Open the stream at `index` with default options.
    pub fn open_stream(&mut self, index: usize) -> Result<()> {
        self.stream_at(index)?.open()
    }

    /// Close the stream at `index`.
    pub fn close_stream(&mut self, index: usize) -> Result<()> {
        let stream = self.stream_at(index)?;
        let result = stream.close();

        // A packet the closed stream left in flight can no longer be decoded.
        if self.held && self.packet.stream_index() == index {
            self.packet.unref();
            self.held = false;
        }
        result
    }

    /// Run every packet of the stream at `index` through the named bitstream filter before it is
    /// returned or decoded, e.g. `"h264_mp4toannexb"`.
    pub fn apply_filter(&mut self, index: usize, name: &str) -> Result<()> {
        self.stream_at(index)?.apply_filter(name)?;
        info!("stream {}: applied bitstream filter {}", index, name);
        Ok(())
    }

    /// Remove the bitstream filter from the stream at `index`.
    pub fn remove_filter(&mut self, index: usize) -> Result<()> {
        if self.stream_at(index)?.remove_filter() {
            debug!("stream {}: removed bitstream filter", index);
        }
        Ok(())
    }

    fn snapshot(&self) -> Packet {
        let kind =
            self.streams.get(self.packet.stream_index()).map_or(StreamKind::Unknown, Stream::kind);
        Packet::from_engine(&self.packet, kind)
    }

    /// Read the next packet.
    ///
    /// Returns [`ReadOutcome::Again`] if the demuxer or the stream's bitstream filter needs to be
    /// called again before a packet is available, and [`ReadOutcome::End`] at the end of the
    /// container. If the previous packet could not yet be accepted by its decoder it is returned
    /// again instead of advancing.
    ///
    /// Packets still buffered by bitstream filters are returned before the demuxer is read again.
    /// Once the demuxer reaches the end of its input, every filter is drained before `End`.
    pub fn read_packet(&mut self) -> Result<ReadOutcome<Packet>> {
        if self.held {
            self.held = false;

            if !self.packet.is_empty() {
                return Ok(ReadOutcome::Ready(self.snapshot()));
            }
        }

        self.packet.unref();

        loop {
            if self.pull_filtered()? {
                return Ok(ReadOutcome::Ready(self.snapshot()));
            }

            if self.input_ended {
                return Ok(ReadOutcome::End);
            }

            match self.demuxer.read_packet(&mut self.packet) {
                Ok(()) => break,
                Err(EngineError::Again) => return Ok(ReadOutcome::Again),
                Err(EngineError::EndOfFile) => {
                    debug!("{}: end of input", self.name);
                    self.input_ended = true;

                    for stream in self.streams.iter_mut() {
                        if let Some(filter) = stream.core_mut().filter_mut() {
                            filter.finish();
                        }
                    }
                }
                Err(status) => return Err(Error::DemuxError(status)),
            }
        }

        let index = self.packet.stream_index();

        if let Some(filter) = self.streams.get_mut(index).and_then(|s| s.core_mut().filter_mut()) {
            match filter.push(&mut self.packet) {
                Ok(true) => (),
                Ok(false) => return Ok(ReadOutcome::Again),
                Err(status) => {
                    self.packet.unref();
                    return Err(Error::FilterError { stream: index, status });
                }
            }
        }

        Ok(ReadOutcome::Ready(self.snapshot()))
    }

    /// Move the next packet buffered by any bitstream filter into the in-flight slot.
    fn pull_filtered(&mut self) -> Result<bool> {
        for stream in self.streams.iter_mut() {
            let index = stream.index();

            let filter = match stream.core_mut().filter_mut() {
                Some(filter) if filter.has_backlog() => filter,
                _ => continue,
            };

            match filter.pull(&mut self.packet) {
                Ok(true) => return Ok(true),
                Ok(false) => (),
                Err(status) => {
                    self.packet.unref();
                    return Err(Error::FilterError { stream: index, status });
                }
            }
        }
        Ok(false)
    }

    /// Decode the in-flight packet of the video stream at `index`.
    pub fn read_video_frame(&mut self, index: usize) -> Result<ReadOutcome<VideoFrame>> {
        let input_ended = self.input_ended;

        let stream = match self.streams.get_mut(index) {
            Some(Stream::Video(stream)) => stream,
            Some(_) => return misuse_error(MisuseKind::KindMismatch),
            None => return misuse_error(MisuseKind::InvalidStream),
        };

        let (outcome, deferred) = stream.read_frame(&mut self.packet, input_ended)?;
        self.held = deferred;
        Ok(outcome)
    }

    /// Decode the in-flight packet of the audio stream at `index`.
    pub fn read_audio_frame(&mut self, index: usize) -> Result<ReadOutcome<AudioFrame>> {
        let input_ended = self.input_ended;

        let stream = match self.streams.get_mut(index) {
            Some(Stream::Audio(stream)) => stream,
            Some(_) => return misuse_error(MisuseKind::KindMismatch),
            None => return misuse_error(MisuseKind::InvalidStream),
        };

        let (outcome, deferred) = stream.read_frame(&mut self.packet, input_ended)?;
        self.held = deferred;
        Ok(outcome)
    }

    /// Decode the in-flight packet of the stream at `index`.
    ///
    /// Once the container has reached the end of its input, each call drains one frame buffered by
    /// the stream's decoder until [`ReadOutcome::End`] is returned.
    pub fn read_frame(&mut self, index: usize) -> Result<ReadOutcome<Frame>> {
        let kind = match self.streams.get(index) {
            Some(stream) => stream.kind(),
            None => return misuse_error(MisuseKind::InvalidStream),
        };

        match kind {
            StreamKind::Video => Ok(self.read_video_frame(index)?.map(Frame::Video)),
            StreamKind::Audio => Ok(self.read_audio_frame(index)?.map(Frame::Audio)),
            StreamKind::Unknown => match self.streams.get(index) {
                Some(Stream::Unknown(stream)) => stream.read_frame(),
                _ => misuse_error(MisuseKind::KindMismatch),
            },
        }
    }

    fn is_decodable(&self, index: usize) -> bool {
        self.streams
            .get(index)
            .map_or(false, |stream| stream.is_opened() && stream.kind() != StreamKind::Unknown)
    }

    /// Read packets and decode them until any opened stream produces a frame.
    ///
    /// Packets of streams that are not open are skipped. "Try again" outcomes are retried.
    pub fn next_frame(&mut self) -> Result<ReadOutcome<Frame>> {
        loop {
            let index = match self.read_packet()? {
                ReadOutcome::Ready(packet) => packet.stream_index(),
                ReadOutcome::Again => continue,
                ReadOutcome::End => break,
            };

            if !self.is_decodable(index) {
                continue;
            }

            if let ReadOutcome::Ready(frame) = self.read_frame(index)? {
                return Ok(ReadOutcome::Ready(frame));
            }
        }

        // Drain frames still buffered by the decoders.
        for index in 0..self.streams.len() {
            if !self.is_decodable(index) {
                continue;
            }

            if let ReadOutcome::Ready(frame) = self.read_frame(index)? {
                return Ok(ReadOutcome::Ready(frame));
            }
        }

        Ok(ReadOutcome::End)
    }

    /// Seek backward to the nearest key frame of the stream at `index` at or before `time`.
    ///
    /// The in-flight packet is released and every opened decoder is flushed.
    pub fn rewind(&mut self, index: usize, time: Duration) -> Result<()> {
        let time_base = match self.streams.get(index) {
            Some(stream) => stream.info().time_base().ok_or(Error::InvalidTimestamp)?,
            None => return misuse_error(MisuseKind::InvalidStream),
        };

        let ts = i64::try_from(time_base.calc_timestamp(time)).unwrap_or(i64::MAX);

        debug!("stream {}: seeking to {:?} (ts {} @ {})", index, time, ts, time_base);

        self.demuxer.seek(index, ts).map_err(|status| Error::SeekError { stream: index, status })?;

        self.packet.unref();
        self.held = false;
        self.input_ended = false;

        for stream in self.streams.iter_mut() {
            stream.core_mut().flush();
        }

        Ok(())
    }

    fn close_streams(&mut self) -> Result<()> {
        let mut result = Ok(());

        for stream in self.streams.iter_mut().filter(|stream| stream.is_opened()) {
            warn!("{}: closing stream {} left open", self.name, stream.index());

            if let Err(err) = stream.close() {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        self.packet.unref();
        self.held = false;
        result
    }

    /// Close the container, closing any streams still open. Reports the first stream failure.
    pub fn close(mut self) -> Result<()> {
        self.close_streams()
    }
}

impl<E: Engine> Drop for MediaContainer<E> {
    fn drop(&mut self) {
        if let Err(err) = self.close_streams() {
            warn!("{}: {}", self.name, err);
        }
    }
}
