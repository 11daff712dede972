// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::{c_char, CStr};
use std::fmt;
use std::sync::Arc;

use ffmpeg_next::codec::{self, decoder};
use ffmpeg_next::util::frame;
use ffmpeg_next::{ffi, Packet};
use log::trace;

use reel_core::engine::{check, Decoder, EngineError, EngineFrame, EnginePacket, EngineResult};
use reel_core::packet::PacketFlags;
use reel_core::stream::{AudioParameters, CodecParameters, VideoParameters};
use reel_core::units::Rational;

use crate::{engine_error, NO_MEMORY};

/// Copy a NUL-terminated native string. Returns `None` for a null pointer.
///
/// # Safety
///
/// `ptr` must be null or point to a valid NUL-terminated string.
pub(crate) unsafe fn string_at(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

pub(crate) fn rational<R: Into<ffi::AVRational>>(value: R) -> Rational {
    let value = value.into();
    Rational::new(value.num, value.den)
}

fn unsigned(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// A reference-counted packet.
pub struct FfmpegPacket {
    inner: Packet,
}

impl FfmpegPacket {
    pub(crate) fn new() -> Self {
        FfmpegPacket { inner: Packet::empty() }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::AVPacket {
        unsafe { self.inner.as_mut_ptr() }
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Packet {
        &mut self.inner
    }
}

impl EnginePacket for FfmpegPacket {
    fn stream_index(&self) -> usize {
        self.inner.stream()
    }

    fn pts(&self) -> Option<i64> {
        self.inner.pts()
    }

    fn dts(&self) -> Option<i64> {
        self.inner.dts()
    }

    fn pos(&self) -> Option<i64> {
        match self.inner.position() {
            pos if pos < 0 => None,
            pos => Some(pos as i64),
        }
    }

    fn duration(&self) -> i64 {
        self.inner.duration()
    }

    fn flags(&self) -> PacketFlags {
        PacketFlags::from_bits_truncate(self.inner.flags().bits() as u32)
    }

    fn data(&self) -> &[u8] {
        self.inner.data().unwrap_or(&[])
    }

    fn is_empty(&self) -> bool {
        unsafe {
            let ptr = self.inner.as_ptr();
            (*ptr).buf.is_null() && (*ptr).data.is_null()
        }
    }

    fn unref(&mut self) {
        unsafe { ffi::av_packet_unref(self.inner.as_mut_ptr()) }
    }

    fn reference(&mut self, src: &Self) -> EngineResult<()> {
        self.unref();
        check(unsafe { ffi::av_packet_ref(self.inner.as_mut_ptr(), src.inner.as_ptr()) })?;
        Ok(())
    }
}

impl fmt::Debug for FfmpegPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfmpegPacket")
            .field("stream_index", &self.stream_index())
            .field("pts", &self.pts())
            .field("size", &self.data().len())
            .finish()
    }
}

/// A reusable decoded frame of either media type.
pub struct FfmpegFrame {
    inner: frame::Frame,
}

impl FfmpegFrame {
    pub(crate) fn new() -> Self {
        // SAFETY: the frame is only filled by a decoder, which sets its media type.
        FfmpegFrame { inner: unsafe { frame::Frame::empty() } }
    }

    pub(crate) fn as_ptr(&self) -> *const ffi::AVFrame {
        unsafe { self.inner.as_ptr() }
    }

    fn raw(&self) -> &ffi::AVFrame {
        unsafe { &*self.inner.as_ptr() }
    }
}

impl EngineFrame for FfmpegFrame {
    fn pts(&self) -> Option<i64> {
        self.inner.pts().or_else(|| self.inner.timestamp())
    }

    // libavcodec no longer numbers pictures. The pipeline counts frames itself.
    fn coded_index(&self) -> Option<i64> {
        None
    }

    fn display_index(&self) -> Option<i64> {
        None
    }

    fn width(&self) -> u32 {
        unsigned(self.raw().width)
    }

    fn height(&self) -> u32 {
        unsigned(self.raw().height)
    }

    fn pixel_format(&self) -> i32 {
        self.raw().format
    }

    fn sample_count(&self) -> usize {
        usize::try_from(self.raw().nb_samples).unwrap_or(0)
    }

    fn sample_rate(&self) -> u32 {
        unsigned(self.raw().sample_rate)
    }

    fn channels(&self) -> u16 {
        u16::try_from(self.raw().ch_layout.nb_channels).unwrap_or(0)
    }

    fn sample_format(&self) -> i32 {
        self.raw().format
    }
}

struct OwnedParameters(*mut ffi::AVCodecParameters);

// SAFETY: the parameters are exclusively owned and never written after they are copied, so they
// may be read from and freed on any thread.
unsafe impl Send for OwnedParameters {}
unsafe impl Sync for OwnedParameters {}

impl Drop for OwnedParameters {
    fn drop(&mut self) {
        unsafe { ffi::avcodec_parameters_free(&mut self.0) }
    }
}

/// A shared copy of a stream's `AVCodecParameters`.
#[derive(Clone)]
pub struct FfmpegParams {
    inner: Arc<OwnedParameters>,
}

impl FfmpegParams {
    /// Copy the parameters at `src`.
    ///
    /// # Safety
    ///
    /// `src` must point to valid codec parameters.
    pub(crate) unsafe fn copy_from(src: *const ffi::AVCodecParameters) -> EngineResult<Self> {
        let owned = OwnedParameters(unsafe { ffi::avcodec_parameters_alloc() });

        if owned.0.is_null() {
            return Err(EngineError::Status(NO_MEMORY));
        }

        check(unsafe { ffi::avcodec_parameters_copy(owned.0, src) })?;

        Ok(FfmpegParams { inner: Arc::new(owned) })
    }

    pub(crate) fn as_ptr(&self) -> *const ffi::AVCodecParameters {
        self.inner.0
    }

    /// The codec's short and descriptive names.
    pub(crate) fn codec_names(&self) -> (String, String) {
        let id = unsafe { (*self.as_ptr()).codec_id };

        let name = unsafe { string_at(ffi::avcodec_get_name(id)) }.unwrap_or_default();

        let descriptor = unsafe { ffi::avcodec_descriptor_get(id) };
        let long_name = if descriptor.is_null() {
            None
        }
        else {
            unsafe { string_at((*descriptor).long_name) }
        };

        let long_name = long_name.unwrap_or_else(|| name.clone());
        (name, long_name)
    }

    pub(crate) fn bit_rate(&self) -> i64 {
        unsafe { (*self.as_ptr()).bit_rate }
    }

    /// Translate into engine-independent parameters.
    pub(crate) fn to_codec_params(&self) -> CodecParameters {
        let par = unsafe { &*self.as_ptr() };

        match par.codec_type {
            ffi::AVMediaType::AVMEDIA_TYPE_VIDEO => {
                let mut params = VideoParameters::default();
                params
                    .with_size(unsigned(par.width), unsigned(par.height))
                    .with_pixel_format(par.format)
                    .with_aspect_ratio(rational(par.sample_aspect_ratio));

                CodecParameters::Video(params)
            }
            ffi::AVMediaType::AVMEDIA_TYPE_AUDIO => {
                let layout = &par.ch_layout;

                let mask = if layout.order == ffi::AVChannelOrder::AV_CHANNEL_ORDER_NATIVE {
                    unsafe { layout.u.mask }
                }
                else {
                    0
                };

                let mut params = AudioParameters::default();
                params
                    .with_channels(u16::try_from(layout.nb_channels).unwrap_or(0), mask)
                    .with_sample_rate(unsigned(par.sample_rate))
                    .with_sample_format(par.format)
                    .with_frame_size(unsigned(par.frame_size));

                CodecParameters::Audio(params)
            }
            _ => CodecParameters::Unknown,
        }
    }
}

impl fmt::Debug for FfmpegParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FfmpegParams").field(&self.codec_names().0).finish()
    }
}

/// An opened decoder.
pub struct FfmpegDecoder {
    inner: decoder::Opened,
}

impl FfmpegDecoder {
    pub(crate) fn open(params: &FfmpegParams) -> EngineResult<Self> {
        let id = codec::Id::from(unsafe { (*params.as_ptr()).codec_id });

        let codec = decoder::find(id).ok_or(EngineError::Status(ffi::AVERROR_DECODER_NOT_FOUND))?;

        let mut context = codec::Context::new_with_codec(codec);
        check(unsafe { ffi::avcodec_parameters_to_context(context.as_mut_ptr(), params.as_ptr()) })?;

        let inner = context.decoder().open_as(codec).map_err(engine_error)?;

        Ok(FfmpegDecoder { inner })
    }
}

impl Decoder for FfmpegDecoder {
    type Packet = FfmpegPacket;
    type Frame = FfmpegFrame;

    fn send_packet(&mut self, packet: &FfmpegPacket) -> EngineResult<()> {
        self.inner.send_packet(&packet.inner).map_err(engine_error)
    }

    fn send_eof(&mut self) -> EngineResult<()> {
        self.inner.send_eof().map_err(engine_error)
    }

    fn receive_frame(&mut self, frame: &mut FfmpegFrame) -> EngineResult<()> {
        self.inner.receive_frame(&mut frame.inner).map_err(engine_error)
    }

    fn flush(&mut self) {
        self.inner.flush()
    }

    fn close(self) -> EngineResult<()> {
        // Freeing the context cannot fail.
        trace!("closing codec context");
        drop(self);
        Ok(())
    }
}
