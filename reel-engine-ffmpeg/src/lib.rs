// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An [`Engine`] backed by the FFmpeg libraries.
//!
//! Packets, frames, decoders and demuxers use the safe `ffmpeg_next` wrappers. Bitstream filters,
//! scalers, resamplers, custom io and format detection have no wrapper that fits the pipeline and
//! call the raw `ffmpeg_next::ffi` bindings. Every native resource is owned by exactly one Rust
//! value and released in that value's `Drop` implementation, so an opened container may be moved
//! to another thread.

use std::ffi::CString;
use std::path::Path;

use ffmpeg_next::ffi;
use log::debug;

use reel_core::engine::{
    check, status, Engine, EngineError, EngineResult, ResamplerConfig, ScalerConfig,
};
use reel_core::io::RegisteredSource;
use reel_core::units::Rational;

mod codec;
mod demuxer;
mod filter;
mod io;
mod resample;
mod scale;

pub use codec::{FfmpegDecoder, FfmpegFrame, FfmpegPacket, FfmpegParams};
pub use demuxer::FfmpegDemuxer;
pub use filter::FfmpegFilter;
pub use resample::FfmpegResampler;
pub use scale::FfmpegScaler;

/// `AVERROR(ENOMEM)`. `ENOMEM` is 12 on every supported target.
pub(crate) const NO_MEMORY: i32 = -12;

/// `AVERROR(EIO)`.
pub(crate) const IO_FAILURE: i32 = -5;

/// Classify an error reported by a safe wrapper.
pub(crate) fn engine_error(err: ffmpeg_next::Error) -> EngineError {
    EngineError::from_status(err.into())
}

/// Convert a Rust string into a C string, rejecting interior NUL bytes.
pub(crate) fn c_string(value: &str) -> EngineResult<CString> {
    CString::new(value).map_err(|_| EngineError::Status(status::INVALID))
}

/// The FFmpeg decoding engine.
#[derive(Debug)]
pub struct FfmpegEngine {
    _private: (),
}

impl FfmpegEngine {
    /// Initialize the FFmpeg libraries and create the engine. Initialization is idempotent.
    pub fn new() -> EngineResult<Self> {
        ffmpeg_next::init().map_err(engine_error)?;

        debug!("ffmpeg engine initialized (libavformat {})", ffmpeg_next::format::version());

        Ok(FfmpegEngine { _private: () })
    }

    /// Initialize the network protocols so network URLs can be opened.
    ///
    /// Calls must be balanced by [`network_deinit`](FfmpegEngine::network_deinit).
    pub fn network_init(&self) -> EngineResult<()> {
        check(unsafe { ffi::avformat_network_init() })?;
        debug!("network protocols initialized");
        Ok(())
    }

    /// Release the network protocol state acquired by [`network_init`](FfmpegEngine::network_init).
    pub fn network_deinit(&self) -> EngineResult<()> {
        check(unsafe { ffi::avformat_network_deinit() })?;
        debug!("network protocols released");
        Ok(())
    }
}

impl Engine for FfmpegEngine {
    type Params = FfmpegParams;
    type Packet = FfmpegPacket;
    type Frame = FfmpegFrame;
    type Demuxer = FfmpegDemuxer;
    type Decoder = FfmpegDecoder;
    type Filter = FfmpegFilter;
    type Scaler = FfmpegScaler;
    type Resampler = FfmpegResampler;

    fn open_file(&self, path: &Path) -> EngineResult<FfmpegDemuxer> {
        let path = path.to_str().ok_or(EngineError::Status(status::INVALID))?;
        FfmpegDemuxer::open_file(path)
    }

    fn probe(&self, prefix: &[u8], name: &str) -> Option<String> {
        let name = c_string(name).ok()?;

        // The probe buffer must be followed by zeroed padding.
        let mut buf = Vec::with_capacity(prefix.len() + ffi::AVPROBE_PADDING_SIZE as usize);
        buf.extend_from_slice(prefix);
        buf.resize(prefix.len() + ffi::AVPROBE_PADDING_SIZE as usize, 0);

        let size = i32::try_from(prefix.len()).ok()?;

        let data = ffi::AVProbeData {
            filename: name.as_ptr(),
            buf: buf.as_mut_ptr(),
            buf_size: size,
            mime_type: std::ptr::null(),
        };

        let format = unsafe { ffi::av_probe_input_format(&data, 1) };

        if format.is_null() {
            return None;
        }

        unsafe { codec::string_at((*format).name) }
    }

    fn open_source(&self, source: RegisteredSource, format: &str) -> EngineResult<FfmpegDemuxer> {
        FfmpegDemuxer::open_source(source, format)
    }

    fn alloc_packet(&self) -> EngineResult<FfmpegPacket> {
        Ok(FfmpegPacket::new())
    }

    fn alloc_frame(&self) -> EngineResult<FfmpegFrame> {
        Ok(FfmpegFrame::new())
    }

    fn open_decoder(&self, params: &FfmpegParams) -> EngineResult<FfmpegDecoder> {
        FfmpegDecoder::open(params)
    }

    fn open_filter(
        &self,
        name: &str,
        params: &FfmpegParams,
        time_base: Rational,
    ) -> EngineResult<FfmpegFilter> {
        FfmpegFilter::open(name, params, time_base)
    }

    fn open_scaler(&self, config: &ScalerConfig) -> EngineResult<FfmpegScaler> {
        FfmpegScaler::open(config)
    }

    fn open_resampler(&self, config: &ResamplerConfig) -> EngineResult<FfmpegResampler> {
        FfmpegResampler::open(config)
    }
}

#[cfg(test)]
mod tests {
    use reel_core::engine::EnginePacket;

    use super::*;

    #[test]
    fn verify_probe_by_content() {
        let engine = FfmpegEngine::new().unwrap();

        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&36u32.to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&[1, 0, 2, 0]);
        wav.extend_from_slice(&44_100u32.to_le_bytes());
        wav.extend_from_slice(&176_400u32.to_le_bytes());
        wav.extend_from_slice(&[4, 0, 16, 0]);
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&0u32.to_le_bytes());

        assert_eq!(engine.probe(&wav, "").as_deref(), Some("wav"));
    }

    #[test]
    fn verify_probe_rejects_nul_in_name() {
        let engine = FfmpegEngine::new().unwrap();
        assert_eq!(engine.probe(&[], "bad\0name"), None);
    }

    #[test]
    fn verify_network_init_is_balanced() {
        let engine = FfmpegEngine::new().unwrap();
        engine.network_init().unwrap();
        engine.network_init().unwrap();
        engine.network_deinit().unwrap();
        engine.network_deinit().unwrap();
    }

    #[test]
    fn verify_containers_are_send() {
        fn assert_send<T: Send>() {}

        assert_send::<FfmpegEngine>();
        assert_send::<FfmpegDemuxer>();
        assert_send::<FfmpegDecoder>();
        assert_send::<FfmpegFilter>();
        assert_send::<FfmpegScaler>();
        assert_send::<FfmpegResampler>();
        assert_send::<reel_core::container::MediaContainer<FfmpegEngine>>();
    }

    #[test]
    fn verify_scratch_packet_is_empty() {
        let engine = FfmpegEngine::new().unwrap();
        let packet = engine.alloc_packet().unwrap();

        assert!(packet.is_empty());
        assert!(packet.data().is_empty());
        assert_eq!(packet.pts(), None);
    }
}
