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

use reel_core::conv::Interpolation;
use reel_core::engine::{
    check, status, EngineError, EngineFrame, EngineResult, Scaler, ScalerConfig,
};

use crate::codec::FfmpegFrame;

// libswscale flag values.
const SWS_FAST_BILINEAR: c_int = 0x1;
const SWS_BILINEAR: c_int = 0x2;
const SWS_BICUBIC: c_int = 0x4;
const SWS_X: c_int = 0x8;
const SWS_POINT: c_int = 0x10;
const SWS_AREA: c_int = 0x20;
const SWS_BICUBLIN: c_int = 0x40;
const SWS_GAUSS: c_int = 0x80;
const SWS_SINC: c_int = 0x100;
const SWS_LANCZOS: c_int = 0x200;
const SWS_SPLINE: c_int = 0x400;

fn sws_flags(interpolation: Interpolation) -> c_int {
    match interpolation {
        Interpolation::FastBilinear => SWS_FAST_BILINEAR,
        Interpolation::Bilinear => SWS_BILINEAR,
        Interpolation::Bicubic => SWS_BICUBIC,
        Interpolation::X => SWS_X,
        Interpolation::Point => SWS_POINT,
        Interpolation::Area => SWS_AREA,
        Interpolation::BicubicBilinear => SWS_BICUBLIN,
        Interpolation::Gauss => SWS_GAUSS,
        Interpolation::Sinc => SWS_SINC,
        Interpolation::Lanczos => SWS_LANCZOS,
        Interpolation::Spline => SWS_SPLINE,
    }
}

fn pixel_format(format: i32) -> EngineResult<ffi::AVPixelFormat> {
    if format < 0 || format >= ffi::AVPixelFormat::AV_PIX_FMT_NB as i32 {
        return Err(EngineError::Status(status::INVALID));
    }
    // In range of the C enumeration, which has no gaps.
    Ok(unsafe { mem::transmute::<i32, ffi::AVPixelFormat>(format) })
}

fn dimension(value: u32) -> EngineResult<c_int> {
    match c_int::try_from(value) {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(EngineError::Status(status::INVALID)),
    }
}

/// A `SwsContext` converting to packed RGBA.
pub struct FfmpegScaler {
    ctx: *mut ffi::SwsContext,
    config: ScalerConfig,
}

// SAFETY: the context is exclusively owned and only used through `&mut self`.
unsafe impl Send for FfmpegScaler {}

impl FfmpegScaler {
    pub(crate) fn open(config: &ScalerConfig) -> EngineResult<Self> {
        let src_format = pixel_format(config.src_format)?;

        let ctx = unsafe {
            ffi::sws_getContext(
                dimension(config.src_width)?,
                dimension(config.src_height)?,
                src_format,
                dimension(config.dst_width)?,
                dimension(config.dst_height)?,
                ffi::AVPixelFormat::AV_PIX_FMT_RGBA,
                sws_flags(config.interpolation),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null(),
            )
        };

        if ctx.is_null() {
            return Err(EngineError::Status(status::INVALID));
        }

        debug!(
            "scaler {}x{} ({:?}) -> {}x{} rgba, {:?}",
            config.src_width,
            config.src_height,
            src_format,
            config.dst_width,
            config.dst_height,
            config.interpolation
        );

        Ok(FfmpegScaler { ctx, config: *config })
    }
}

impl Scaler for FfmpegScaler {
    type Frame = FfmpegFrame;

    fn scale(&mut self, frame: &FfmpegFrame, dst: &mut [u8], stride: usize) -> EngineResult<()> {
        if frame.width() != self.config.src_width || frame.height() != self.config.src_height {
            return Err(EngineError::Status(status::INVALID));
        }

        let rows = self.config.dst_height as usize;

        if stride.checked_mul(rows).map_or(true, |size| size > dst.len()) {
            return Err(EngineError::Status(status::INVALID));
        }

        let stride = c_int::try_from(stride).map_err(|_| EngineError::Status(status::INVALID))?;

        let dst_planes: [*mut u8; 4] =
            [dst.as_mut_ptr(), ptr::null_mut(), ptr::null_mut(), ptr::null_mut()];
        let dst_strides: [c_int; 4] = [stride, 0, 0, 0];

        let rows = unsafe {
            let src = frame.as_ptr();

            ffi::sws_scale(
                self.ctx,
                (*src).data.as_ptr() as *const *const u8,
                (*src).linesize.as_ptr(),
                0,
                (*src).height,
                dst_planes.as_ptr(),
                dst_strides.as_ptr(),
            )
        };

        check(rows)?;
        Ok(())
    }
}

impl Drop for FfmpegScaler {
    fn drop(&mut self) {
        unsafe { ffi::sws_freeContext(self.ctx) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_interpolation_flags() {
        assert_eq!(sws_flags(Interpolation::default()), SWS_BICUBIC);
        assert_eq!(sws_flags(Interpolation::Point), SWS_POINT);
        assert_eq!(sws_flags(Interpolation::Spline), SWS_SPLINE);
    }

    #[test]
    fn verify_pixel_format_range() {
        assert_eq!(pixel_format(0).unwrap(), ffi::AVPixelFormat::AV_PIX_FMT_YUV420P);
        assert!(pixel_format(-1).is_err());
        assert!(pixel_format(i32::MAX).is_err());
    }

    #[test]
    fn verify_zero_dimensions_rejected() {
        let config = ScalerConfig {
            src_width: 0,
            src_height: 16,
            src_format: 0,
            dst_width: 16,
            dst_height: 16,
            interpolation: Interpolation::Bicubic,
        };
        assert!(FfmpegScaler::open(&config).is_err());
    }
}
