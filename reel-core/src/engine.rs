// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `engine` module defines the boundary between the decode pipeline and a native decoding
//! engine.
//!
//! An engine supplies five families of stateful native resources: a demuxer, per-stream decoders,
//! optional bitstream filters, pixel scalers, and sample resamplers. The pipeline owns the
//! lifecycle of every resource it obtains through these traits. Resources are released when their
//! Rust values are dropped, so implementations must free native memory in `Drop`.

use std::error;
use std::fmt;
use std::path::Path;

use crate::conv::Interpolation;
use crate::io::RegisteredSource;
use crate::packet::PacketFlags;
use crate::stream::CodecParameters;
use crate::units::Rational;

/// Native status codes with a defined meaning to the pipeline.
///
/// These follow the FFmpeg convention of negated POSIX error numbers and four-character error
/// tags. The value of [`AGAIN`] depends on the target's errno numbering.
pub mod status {
    /// The operation cannot complete until more input is supplied or output is drained.
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    pub const AGAIN: i32 = -35;

    /// The operation cannot complete until more input is supplied or output is drained.
    #[cfg(not(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )))]
    pub const AGAIN: i32 = -11;

    /// End of input. Tag `'E' 'O' 'F' ' '` negated.
    pub const EOF: i32 = -541_478_725;

    /// An argument or value was invalid.
    pub const INVALID: i32 = -22;
}

/// A classified native engine status.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// Transient. Retry after supplying more input or draining output.
    Again,
    /// The engine reached the end of its input.
    EndOfFile,
    /// Any other negative status.
    Status(i32),
}

impl EngineError {
    /// Classify a negative native status code.
    pub fn from_status(code: i32) -> Self {
        match code {
            status::AGAIN => EngineError::Again,
            status::EOF => EngineError::EndOfFile,
            _ => EngineError::Status(code),
        }
    }

    /// Get the native status code.
    pub fn status(&self) -> i32 {
        match *self {
            EngineError::Again => status::AGAIN,
            EngineError::EndOfFile => status::EOF,
            EngineError::Status(code) => code,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EngineError::Again => write!(f, "resource temporarily unavailable"),
            EngineError::EndOfFile => write!(f, "end of file"),
            EngineError::Status(code) => write!(f, "engine status {}", code),
        }
    }
}

impl error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

/// Check a native return code, passing non-negative values through.
pub fn check(code: i32) -> EngineResult<i32> {
    if code < 0 {
        Err(EngineError::from_status(code))
    }
    else {
        Ok(code)
    }
}

/// Describes the container format detected by a demuxer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatInfo {
    /// Short name, e.g. `"matroska,webm"`.
    pub name: String,
    /// Descriptive name.
    pub long_name: String,
    /// Comma-separated MIME types, if the format declares any.
    pub mime_type: String,
}

/// An elementary stream as reported by a demuxer when the container is opened.
#[derive(Clone, Debug)]
pub struct StreamDescriptor<P> {
    pub index: usize,
    pub codec_name: String,
    pub codec_long_name: String,
    pub bit_rate: i64,
    /// Stream time-base. `0/0` if unknown.
    pub time_base: Rational,
    /// Nominal frame rate. `0/0` if unknown.
    pub frame_rate: Rational,
    /// Total number of frames. `0` if unknown.
    pub frame_count: i64,
    /// Duration in time-base units. Negative if unknown.
    pub duration: i64,
    /// Engine-independent codec parameters.
    pub params: CodecParameters,
    /// The engine's own parameter handle, passed back when opening decoders and filters.
    pub native: P,
}

/// An engine-owned, reusable compressed packet.
pub trait EnginePacket {
    /// Index of the stream the packet belongs to.
    fn stream_index(&self) -> usize;

    fn pts(&self) -> Option<i64>;

    fn dts(&self) -> Option<i64>;

    /// Byte offset in the container.
    fn pos(&self) -> Option<i64>;

    fn duration(&self) -> i64;

    fn flags(&self) -> PacketFlags;

    fn data(&self) -> &[u8];

    /// Returns `true` if the packet currently holds no payload reference.
    fn is_empty(&self) -> bool;

    /// Release the payload reference, leaving an empty packet that may be reused.
    fn unref(&mut self);

    /// Make this packet a new reference to the payload of `src`.
    fn reference(&mut self, src: &Self) -> EngineResult<()>;
}

/// An engine-owned, reusable decoded frame.
pub trait EngineFrame {
    fn pts(&self) -> Option<i64>;

    /// Position of the frame in decode order, if the engine tracks it.
    fn coded_index(&self) -> Option<i64>;

    /// Position of the frame in display order, if the engine tracks it.
    fn display_index(&self) -> Option<i64>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Native pixel format identifier.
    fn pixel_format(&self) -> i32;

    /// Number of audio samples per channel.
    fn sample_count(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Native sample format identifier.
    fn sample_format(&self) -> i32;
}

/// A demultiplexer over a single opened container.
pub trait Demuxer {
    type Packet: EnginePacket;
    type Params;

    fn format(&self) -> FormatInfo;

    /// Container duration in microseconds. Negative if unknown.
    fn duration(&self) -> i64;

    /// Enumerate the container's elementary streams.
    fn streams(&self) -> EngineResult<Vec<StreamDescriptor<Self::Params>>>;

    /// Read the next packet into `packet`, replacing any payload it held.
    fn read_packet(&mut self, packet: &mut Self::Packet) -> EngineResult<()>;

    /// Seek `stream` backward to the nearest key frame at or before `timestamp`.
    fn seek(&mut self, stream: usize, timestamp: i64) -> EngineResult<()>;
}

/// An opened codec context.
pub trait Decoder {
    type Packet: EnginePacket;
    type Frame: EngineFrame;

    fn send_packet(&mut self, packet: &Self::Packet) -> EngineResult<()>;

    /// Signal end of input so buffered frames can be drained.
    fn send_eof(&mut self) -> EngineResult<()>;

    fn receive_frame(&mut self, frame: &mut Self::Frame) -> EngineResult<()>;

    /// Discard buffered state after a seek.
    fn flush(&mut self);

    /// Close the codec context and report its final status.
    fn close(self) -> EngineResult<()>;
}

/// A named bitstream filter bound to one stream.
///
/// A filter may emit any number of packets per input. `send` returns [`EngineError::Again`] while
/// output is waiting to be received, in which case the packet is left untouched.
pub trait BitstreamFilter {
    type Packet: EnginePacket;

    /// Submit a packet. On success the filter takes the packet's payload, leaving it empty.
    fn send(&mut self, packet: &mut Self::Packet) -> EngineResult<()>;

    /// Signal end of input so buffered packets can be drained.
    fn send_eof(&mut self) -> EngineResult<()>;

    /// Receive the next output packet. Returns [`EngineError::EndOfFile`] once drained after
    /// end of input.
    fn receive(&mut self, packet: &mut Self::Packet) -> EngineResult<()>;

    /// Discard buffered packets and end-of-input state after a seek.
    fn flush(&mut self);
}

/// Configuration for binding a pixel scaler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScalerConfig {
    pub src_width: u32,
    pub src_height: u32,
    pub src_format: i32,
    pub dst_width: u32,
    pub dst_height: u32,
    pub interpolation: Interpolation,
}

/// A pixel scaler producing packed RGBA output.
pub trait Scaler {
    type Frame: EngineFrame;

    /// Convert `frame` into `dst`, which holds `dst_height` rows of `stride` bytes.
    fn scale(&mut self, frame: &Self::Frame, dst: &mut [u8], stride: usize) -> EngineResult<()>;
}

/// Configuration for binding a sample resampler. The output is always interleaved stereo `f64`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResamplerConfig {
    pub src_channels: u16,
    /// Native channel layout mask. `0` selects the default layout for `src_channels`.
    pub src_layout: u64,
    pub src_format: i32,
    pub src_rate: u32,
    pub dst_rate: u32,
}

/// A sample resampler producing interleaved stereo `f64` output.
pub trait Resampler {
    type Frame: EngineFrame;

    /// Upper bound of samples per channel produced for `in_samples` input samples.
    fn max_output_samples(&self, in_samples: usize) -> EngineResult<usize>;

    /// Convert `frame` into `dst`, returning the number of samples per channel written. `dst` holds
    /// room for at most `dst.len() / 16` samples per channel.
    fn convert(&mut self, frame: &Self::Frame, dst: &mut [u8]) -> EngineResult<usize>;
}

/// A native decoding engine.
pub trait Engine {
    type Params;
    type Packet: EnginePacket;
    type Frame: EngineFrame;
    type Demuxer: Demuxer<Packet = Self::Packet, Params = Self::Params>;
    type Decoder: Decoder<Packet = Self::Packet, Frame = Self::Frame>;
    type Filter: BitstreamFilter<Packet = Self::Packet>;
    type Scaler: Scaler<Frame = Self::Frame>;
    type Resampler: Resampler<Frame = Self::Frame>;

    fn open_file(&self, path: &Path) -> EngineResult<Self::Demuxer>;

    /// Identify the container format from the leading bytes of a source.
    fn probe(&self, prefix: &[u8], name: &str) -> Option<String>;

    /// Open a demuxer over a registered byte source of the given format.
    fn open_source(&self, source: RegisteredSource, format: &str) -> EngineResult<Self::Demuxer>;

    fn alloc_packet(&self) -> EngineResult<Self::Packet>;

    fn alloc_frame(&self) -> EngineResult<Self::Frame>;

    fn open_decoder(&self, params: &Self::Params) -> EngineResult<Self::Decoder>;

    fn open_filter(&self, name: &str, params: &Self::Params, time_base: Rational)
        -> EngineResult<Self::Filter>;

    fn open_scaler(&self, config: &ScalerConfig) -> EngineResult<Self::Scaler>;

    fn open_resampler(&self, config: &ResamplerConfig) -> EngineResult<Self::Resampler>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_status_classification() {
        assert_eq!(EngineError::from_status(status::AGAIN), EngineError::Again);
        assert_eq!(EngineError::from_status(status::EOF), EngineError::EndOfFile);
        assert_eq!(EngineError::from_status(-1), EngineError::Status(-1));
        assert_eq!(EngineError::Again.status(), status::AGAIN);
    }

    #[test]
    fn verify_check() {
        assert_eq!(check(0), Ok(0));
        assert_eq!(check(42), Ok(42));
        assert_eq!(check(status::INVALID), Err(EngineError::Status(status::INVALID)));
    }
}
