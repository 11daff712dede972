// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

use crate::engine::EngineError;

/// `MisuseKind` is a list of reasons why an operation was rejected before reaching the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MisuseKind {
    /// The stream must be opened before this operation.
    StreamNotOpen,
    /// The stream is already open.
    StreamAlreadyOpen,
    /// The pending packet belongs to a different stream.
    ForeignPacket,
    /// The stream index does not exist in the container.
    InvalidStream,
    /// The stream is not of the kind the operation requires.
    KindMismatch,
}

impl MisuseKind {
    fn as_str(&self) -> &'static str {
        match *self {
            MisuseKind::StreamNotOpen => "stream is not open",
            MisuseKind::StreamAlreadyOpen => "stream is already open",
            MisuseKind::ForeignPacket => "pending packet belongs to another stream",
            MisuseKind::InvalidStream => "invalid stream index",
            MisuseKind::KindMismatch => "stream is not of the requested kind",
        }
    }
}

/// `Error` provides an enumeration of all possible errors reported by Reel.
///
/// Engine flow-control conditions ("try again" and end of input) are never reported through this
/// type by the read operations. They surface as [`ReadOutcome::Again`](crate::outcome::ReadOutcome)
/// and [`ReadOutcome::End`](crate::outcome::ReadOutcome) instead.
#[derive(Debug)]
pub enum Error {
    /// An IO error occured while reading, writing, or seeking a byte source.
    IoError(io::Error),
    /// The container could not be identified or its headers could not be parsed.
    ContainerOpenError(EngineError),
    /// The demuxer failed to read the next packet.
    DemuxError(EngineError),
    /// The codec for a stream could not be found, allocated, or bound to its parameters.
    CodecOpenError { stream: usize, status: EngineError },
    /// The codec for a stream reported a failure while closing.
    CodecCloseError { stream: usize, status: EngineError },
    /// The codec rejected a packet or failed to produce a frame.
    DecodeError { stream: usize, status: EngineError },
    /// The bitstream filter for a stream could not be created or failed to process a packet.
    FilterError { stream: usize, status: EngineError },
    /// The pixel scaler could not be bound or failed to convert a frame.
    ScaleError { stream: usize, status: EngineError },
    /// The sample resampler could not be bound or reported a negative sample count.
    ResampleError { stream: usize, status: EngineError },
    /// The container could not be seeked.
    SeekError { stream: usize, status: EngineError },
    /// An operation was attempted in a state that does not permit it.
    PreconditionError(MisuseKind),
    /// An unsupported stream or engine feature was encountered.
    Unsupported(&'static str),
    /// A timestamp or time-base was missing or negative.
    InvalidTimestamp,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::ContainerOpenError(status) => {
                write!(f, "failed to open container: {}", status)
            }
            Error::DemuxError(status) => {
                write!(f, "failed to read packet: {}", status)
            }
            Error::CodecOpenError { stream, status } => {
                write!(f, "failed to open codec for stream {}: {}", stream, status)
            }
            Error::CodecCloseError { stream, status } => {
                write!(f, "failed to close codec for stream {}: {}", stream, status)
            }
            Error::DecodeError { stream, status } => {
                write!(f, "decode failed on stream {}: {}", stream, status)
            }
            Error::FilterError { stream, status } => {
                write!(f, "bitstream filter failed on stream {}: {}", stream, status)
            }
            Error::ScaleError { stream, status } => {
                write!(f, "scaler failed on stream {}: {}", stream, status)
            }
            Error::ResampleError { stream, status } => {
                write!(f, "resampler failed on stream {}: {}", stream, status)
            }
            Error::SeekError { stream, status } => {
                write!(f, "seek failed on stream {}: {}", stream, status)
            }
            Error::PreconditionError(kind) => {
                write!(f, "precondition violated: {}", kind.as_str())
            }
            Error::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
            Error::InvalidTimestamp => {
                write!(f, "timestamp or time-base is missing or negative")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            Error::ContainerOpenError(ref status) => Some(status),
            Error::DemuxError(ref status) => Some(status),
            Error::CodecOpenError { ref status, .. } => Some(status),
            Error::CodecCloseError { ref status, .. } => Some(status),
            Error::DecodeError { ref status, .. } => Some(status),
            Error::FilterError { ref status, .. } => Some(status),
            Error::ScaleError { ref status, .. } => Some(status),
            Error::ResampleError { ref status, .. } => Some(status),
            Error::SeekError { ref status, .. } => Some(status),
            Error::PreconditionError(_) => None,
            Error::Unsupported(_) => None,
            Error::InvalidTimestamp => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a precondition error.
pub fn misuse_error<T>(kind: MisuseKind) -> Result<T> {
    Err(Error::PreconditionError(kind))
}

/// Convenience function to create an unsupport feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}
