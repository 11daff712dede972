// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `frame` module defines decoded, presentation-ready frames.

use std::sync::Arc;
use std::time::Duration;

use crate::conv::OUTPUT_BYTES_PER_FRAME;
use crate::errors::Result;
use crate::stream::StreamInfo;
use crate::units::presentation_offset;

/// Attributes common to all frames.
#[derive(Clone, Debug)]
pub struct FrameHeader {
    stream: Arc<StreamInfo>,
    pts: Option<i64>,
    coded_index: i64,
    display_index: i64,
}

impl FrameHeader {
    pub(crate) fn new(
        stream: Arc<StreamInfo>,
        pts: Option<i64>,
        coded_index: i64,
        display_index: i64,
    ) -> Self {
        FrameHeader { stream, pts, coded_index, display_index }
    }

    /// The stream the frame was decoded from.
    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    /// The presentation timestamp in the stream's time-base.
    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    /// Position of the frame in decode order.
    pub fn index_coded(&self) -> i64 {
        self.coded_index
    }

    /// Position of the frame in display order.
    pub fn index_display(&self) -> i64 {
        self.display_index
    }

    /// The offset from the start of the media at which the frame should be presented.
    ///
    /// The time-base is read from the owning stream when this is called.
    pub fn presentation_offset(&self) -> Result<Duration> {
        presentation_offset(self.stream.time_base(), self.pts)
    }
}

/// A decoded video frame converted to packed RGBA.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    header: FrameHeader,
    width: u32,
    height: u32,
    data: Box<[u8]>,
}

impl VideoFrame {
    pub(crate) fn new(header: FrameHeader, width: u32, height: u32, data: Box<[u8]>) -> Self {
        VideoFrame { header, width, height, data }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA pixels, `4 * width` bytes per row with no padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy the pixels into an [`image::RgbaImage`].
    #[cfg(feature = "image")]
    pub fn to_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data.to_vec())
    }
}

/// A decoded audio frame converted to interleaved stereo `f64` samples.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    header: FrameHeader,
    data: Box<[u8]>,
}

impl AudioFrame {
    pub(crate) fn new(header: FrameHeader, data: Box<[u8]>) -> Self {
        AudioFrame { header, data }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Raw interleaved samples in native byte order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of stereo samples in the frame.
    pub fn sample_count(&self) -> usize {
        self.data.len() / OUTPUT_BYTES_PER_FRAME
    }

    /// Iterate over the `[left, right]` sample pairs.
    pub fn samples(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.data.chunks_exact(OUTPUT_BYTES_PER_FRAME).map(bytemuck::pod_read_unaligned::<[f64; 2]>)
    }
}

/// A decoded frame of any kind.
#[derive(Clone, Debug)]
pub enum Frame {
    Video(VideoFrame),
    Audio(AudioFrame),
}

impl Frame {
    pub fn header(&self) -> &FrameHeader {
        match self {
            Frame::Video(frame) => &frame.header,
            Frame::Audio(frame) => &frame.header,
        }
    }

    /// The index of the stream the frame was decoded from.
    pub fn stream_index(&self) -> usize {
        self.header().stream().index()
    }

    pub fn pts(&self) -> Option<i64> {
        self.header().pts()
    }

    pub fn presentation_offset(&self) -> Result<Duration> {
        self.header().presentation_offset()
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Frame::Video(frame) => frame.data(),
            Frame::Audio(frame) => frame.data(),
        }
    }
}
