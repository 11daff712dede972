// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ptr;

use ffmpeg_next::ffi;
use log::debug;

use reel_core::engine::{check, BitstreamFilter, EngineError, EngineResult};
use reel_core::units::Rational;

use crate::c_string;
use crate::codec::{FfmpegPacket, FfmpegParams};

/// An initialized `AVBSFContext`.
pub struct FfmpegFilter {
    ctx: *mut ffi::AVBSFContext,
}

// SAFETY: the context is exclusively owned and only used through `&mut self`.
unsafe impl Send for FfmpegFilter {}

impl FfmpegFilter {
    pub(crate) fn open(
        name: &str,
        params: &FfmpegParams,
        time_base: Rational,
    ) -> EngineResult<Self> {
        let c_name = c_string(name)?;
        let filter = unsafe { ffi::av_bsf_get_by_name(c_name.as_ptr()) };

        if filter.is_null() {
            return Err(EngineError::Status(ffi::AVERROR_BSF_NOT_FOUND));
        }

        let mut ctx = ptr::null_mut();
        check(unsafe { ffi::av_bsf_alloc(filter, &mut ctx) })?;

        let bsf = FfmpegFilter { ctx };

        unsafe {
            check(ffi::avcodec_parameters_copy((*bsf.ctx).par_in, params.as_ptr()))?;
            (*bsf.ctx).time_base_in = ffi::AVRational { num: time_base.num, den: time_base.den };
            check(ffi::av_bsf_init(bsf.ctx))?;
        }

        debug!("initialized bitstream filter {} (time base {})", name, time_base);
        Ok(bsf)
    }
}

impl BitstreamFilter for FfmpegFilter {
    type Packet = FfmpegPacket;

    fn send(&mut self, packet: &mut FfmpegPacket) -> EngineResult<()> {
        // Takes ownership of the packet's reference, leaving it empty.
        check(unsafe { ffi::av_bsf_send_packet(self.ctx, packet.as_mut_ptr()) })?;
        Ok(())
    }

    fn send_eof(&mut self) -> EngineResult<()> {
        check(unsafe { ffi::av_bsf_send_packet(self.ctx, ptr::null_mut()) })?;
        Ok(())
    }

    fn receive(&mut self, packet: &mut FfmpegPacket) -> EngineResult<()> {
        check(unsafe { ffi::av_bsf_receive_packet(self.ctx, packet.as_mut_ptr()) })?;
        Ok(())
    }

    fn flush(&mut self) {
        unsafe { ffi::av_bsf_flush(self.ctx) }
    }
}

impl Drop for FfmpegFilter {
    fn drop(&mut self) {
        unsafe { ffi::av_bsf_free(&mut self.ctx) }
    }
}
