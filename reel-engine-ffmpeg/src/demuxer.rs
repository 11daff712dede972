// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::c_int;
use std::ptr;

use ffmpeg_next::ffi;
use ffmpeg_next::format::{self, context::Input};
use log::{debug, info};

use reel_core::engine::{
    check, status, Demuxer, EngineError, EnginePacket, EngineResult, FormatInfo, StreamDescriptor,
};
use reel_core::io::RegisteredSource;

use crate::codec::{rational, FfmpegPacket, FfmpegParams};
use crate::io::CustomIo;
use crate::{c_string, engine_error, NO_MEMORY};

/// An opened container.
pub struct FfmpegDemuxer {
    input: Input,
    /// Kept alive until `input`, which reads from it, is closed.
    _io: Option<CustomIo>,
}

impl FfmpegDemuxer {
    pub(crate) fn open_file(path: &str) -> EngineResult<Self> {
        let input = format::input(&path).map_err(engine_error)?;

        let demuxer = FfmpegDemuxer { input, _io: None };

        info!("opened {} as {}", path, demuxer.input.format().name());
        Ok(demuxer)
    }

    pub(crate) fn open_source(source: RegisteredSource, format: &str) -> EngineResult<Self> {
        // Format detection reports every alias of a format. Any one of them finds the demuxer.
        let alias = format.split(',').next().unwrap_or(format);
        let name = c_string(alias)?;

        let input_format = unsafe { ffi::av_find_input_format(name.as_ptr()) };

        if input_format.is_null() {
            return Err(EngineError::Status(ffi::AVERROR_DEMUXER_NOT_FOUND));
        }

        let token = source.token();
        let mut io = CustomIo::new(source)?;

        let mut ctx = unsafe { ffi::avformat_alloc_context() };

        if ctx.is_null() {
            return Err(EngineError::Status(NO_MEMORY));
        }

        unsafe {
            (*ctx).pb = io.as_mut_ptr();
            (*ctx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as c_int;
        }

        // The context is freed by libavformat if opening fails.
        check(unsafe {
            ffi::avformat_open_input(&mut ctx, ptr::null(), input_format, ptr::null_mut())
        })?;

        // SAFETY: `ctx` is an opened input context owned by nothing else. With custom io set,
        // closing it leaves the io context to `CustomIo`.
        let input = unsafe { Input::wrap(ctx) };

        let demuxer = FfmpegDemuxer { input, _io: Some(io) };

        // `format::input` reads stream info itself. Custom sources must do so explicitly.
        check(unsafe { ffi::avformat_find_stream_info(ctx, ptr::null_mut()) })?;

        info!("opened byte source {} as {}", token, demuxer.input.format().name());
        Ok(demuxer)
    }
}

impl Demuxer for FfmpegDemuxer {
    type Packet = FfmpegPacket;
    type Params = FfmpegParams;

    fn format(&self) -> FormatInfo {
        let format = self.input.format();

        FormatInfo {
            name: format.name().to_string(),
            long_name: format.description().to_string(),
            mime_type: format.mime_types().join(","),
        }
    }

    fn duration(&self) -> i64 {
        self.input.duration()
    }

    fn streams(&self) -> EngineResult<Vec<StreamDescriptor<FfmpegParams>>> {
        let mut streams = Vec::with_capacity(self.input.nb_streams() as usize);

        for stream in self.input.streams() {
            let index = stream.index();

            let params = unsafe { FfmpegParams::copy_from(stream.parameters().as_ptr()) }?;
            let (codec_name, codec_long_name) = params.codec_names();

            let time_base = rational(stream.time_base());

            debug!("stream {}: {}, time base {}", index, codec_long_name, time_base);

            streams.push(StreamDescriptor {
                index,
                codec_name,
                codec_long_name,
                bit_rate: params.bit_rate(),
                time_base,
                frame_rate: rational(stream.avg_frame_rate()),
                frame_count: stream.frames(),
                duration: stream.duration(),
                params: params.to_codec_params(),
                native: params,
            });
        }

        Ok(streams)
    }

    fn read_packet(&mut self, packet: &mut FfmpegPacket) -> EngineResult<()> {
        packet.unref();
        packet.inner_mut().read(&mut self.input).map_err(engine_error)
    }

    fn seek(&mut self, stream: usize, timestamp: i64) -> EngineResult<()> {
        let stream = c_int::try_from(stream).map_err(|_| EngineError::Status(status::INVALID))?;
        let flags = ffi::AVSEEK_FLAG_BACKWARD as c_int;

        // `Input::seek` only seeks by the default stream's timestamps.
        check(unsafe { ffi::av_seek_frame(self.input.as_mut_ptr(), stream, timestamp, flags) })?;
        Ok(())
    }
}
