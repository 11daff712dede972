// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::c_int;
use std::mem;
use std::ptr;

use ffmpeg_next::ffi;
use log::debug;

use reel_core::conv::{OUTPUT_BYTES_PER_FRAME, OUTPUT_CHANNELS};
use reel_core::engine::{
    check, status, EngineError, EngineFrame, EngineResult, Resampler, ResamplerConfig,
};

use crate::codec::FfmpegFrame;

fn sample_format(format: i32) -> EngineResult<ffi::AVSampleFormat> {
    if format < 0 || format >= ffi::AVSampleFormat::AV_SAMPLE_FMT_NB as i32 {
        return Err(EngineError::Status(status::INVALID));
    }
    Ok(unsafe { mem::transmute::<i32, ffi::AVSampleFormat>(format) })
}

fn positive(value: u32) -> EngineResult<c_int> {
    match c_int::try_from(value) {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(EngineError::Status(status::INVALID)),
    }
}

/// An owned `AVChannelLayout`.
struct ChannelLayout(ffi::AVChannelLayout);

impl ChannelLayout {
    fn empty() -> Self {
        // An all-zero layout is the valid "unspecified" layout.
        ChannelLayout(unsafe { mem::zeroed() })
    }

    fn with_default(channels: c_int) -> Self {
        let mut layout = ChannelLayout::empty();
        unsafe { ffi::av_channel_layout_default(&mut layout.0, channels) };
        layout
    }

    fn from_mask(mask: u64) -> EngineResult<Self> {
        let mut layout = ChannelLayout::empty();
        check(unsafe { ffi::av_channel_layout_from_mask(&mut layout.0, mask) })?;
        Ok(layout)
    }
}

impl Drop for ChannelLayout {
    fn drop(&mut self) {
        unsafe { ffi::av_channel_layout_uninit(&mut self.0) }
    }
}

/// A `SwrContext` converting to interleaved stereo `f64`.
pub struct FfmpegResampler {
    ctx: *mut ffi::SwrContext,
}

// SAFETY: the context is exclusively owned and only used through `&mut self`.
unsafe impl Send for FfmpegResampler {}

impl FfmpegResampler {
    pub(crate) fn open(config: &ResamplerConfig) -> EngineResult<Self> {
        let src_format = sample_format(config.src_format)?;
        let src_rate = positive(config.src_rate)?;
        let dst_rate = positive(config.dst_rate)?;

        let src_layout = if config.src_layout != 0 {
            ChannelLayout::from_mask(config.src_layout)?
        }
        else {
            ChannelLayout::with_default(positive(u32::from(config.src_channels))?)
        };

        let dst_layout = ChannelLayout::with_default(OUTPUT_CHANNELS as c_int);

        let mut resampler = FfmpegResampler { ctx: ptr::null_mut() };

        check(unsafe {
            ffi::swr_alloc_set_opts2(
                &mut resampler.ctx,
                &dst_layout.0,
                ffi::AVSampleFormat::AV_SAMPLE_FMT_DBL,
                dst_rate,
                &src_layout.0,
                src_format,
                src_rate,
                0,
                ptr::null_mut(),
            )
        })?;

        check(unsafe { ffi::swr_init(resampler.ctx) })?;

        debug!(
            "resampler {} ch ({:?}) @ {} Hz -> stereo f64 @ {} Hz",
            config.src_channels, src_format, config.src_rate, config.dst_rate
        );

        Ok(resampler)
    }
}

impl Resampler for FfmpegResampler {
    type Frame = FfmpegFrame;

    fn max_output_samples(&self, in_samples: usize) -> EngineResult<usize> {
        let in_samples =
            c_int::try_from(in_samples).map_err(|_| EngineError::Status(status::INVALID))?;

        let max = check(unsafe { ffi::swr_get_out_samples(self.ctx, in_samples) })?;
        Ok(max as usize)
    }

    fn convert(&mut self, frame: &FfmpegFrame, dst: &mut [u8]) -> EngineResult<usize> {
        let capacity = c_int::try_from(dst.len() / OUTPUT_BYTES_PER_FRAME).unwrap_or(c_int::MAX);
        let in_samples = c_int::try_from(frame.sample_count())
            .map_err(|_| EngineError::Status(status::INVALID))?;

        let out: [*mut u8; 1] = [dst.as_mut_ptr()];

        let written = unsafe {
            ffi::swr_convert(
                self.ctx,
                out.as_ptr(),
                capacity,
                (*frame.as_ptr()).extended_data as *const *const u8,
                in_samples,
            )
        };

        Ok(check(written)? as usize)
    }
}

impl Drop for FfmpegResampler {
    fn drop(&mut self) {
        unsafe { ffi::swr_free(&mut self.ctx) }
    }
}
