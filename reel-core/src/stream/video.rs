// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::debug;

use crate::conv::{rgba_buffer_size, ConversionBuffer, Interpolation, RGBA_BYTES_PER_PIXEL};
use crate::engine::{Engine, EngineFrame, Scaler, ScalerConfig};
use crate::errors::{misuse_error, Error, MisuseKind, Result};
use crate::frame::VideoFrame;
use crate::outcome::ReadOutcome;
use crate::units::Rational;

use super::{Decoded, StreamCore, StreamInfo, VideoParameters};

/// `VideoOptions` controls the RGBA output of a video stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoOptions {
    /// Output width. The width of each decoded frame if `None`.
    pub width: Option<u32>,
    /// Output height. The height of each decoded frame if `None`.
    pub height: Option<u32>,
    /// The scaling algorithm.
    pub interpolation: Interpolation,
}

struct ScaleStage<E: Engine> {
    scaler: E::Scaler,
    config: ScalerConfig,
}

/// A video stream decoding into packed RGBA frames.
pub struct VideoStream<E: Engine> {
    pub(super) core: StreamCore<E>,
    params: VideoParameters,
    options: VideoOptions,
    stage: Option<ScaleStage<E>>,
    buffer: ConversionBuffer,
}

impl<E: Engine> VideoStream<E> {
    pub(super) fn new(core: StreamCore<E>, params: VideoParameters) -> Self {
        VideoStream {
            core,
            params,
            options: Default::default(),
            stage: None,
            buffer: ConversionBuffer::new(),
        }
    }

    pub fn info(&self) -> &StreamInfo {
        &self.core.info
    }

    pub fn width(&self) -> u32 {
        self.params.width
    }

    pub fn height(&self) -> u32 {
        self.params.height
    }

    /// The sample aspect ratio.
    pub fn aspect_ratio(&self) -> Rational {
        self.params.aspect_ratio
    }

    pub fn is_opened(&self) -> bool {
        self.core.is_opened()
    }

    /// The options the stream was last opened with.
    pub fn options(&self) -> &VideoOptions {
        &self.options
    }

    /// The size of the RGBA conversion buffer's allocation.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Open the stream, producing frames at the native resolution.
    pub fn open(&mut self) -> Result<()> {
        self.open_with(VideoOptions::default())
    }

    /// Open the stream with explicit output options.
    pub fn open_with(&mut self, options: VideoOptions) -> Result<()> {
        if self.core.is_opened() {
            return misuse_error(MisuseKind::StreamAlreadyOpen);
        }

        let stream = self.core.index();

        // Bind the scaler up front when the container declared the geometry. Otherwise it is bound
        // from the first decoded frame.
        let stage = if self.params.width > 0 && self.params.height > 0 {
            let config = ScalerConfig {
                src_width: self.params.width,
                src_height: self.params.height,
                src_format: self.params.pixel_format,
                dst_width: options.width.unwrap_or(self.params.width),
                dst_height: options.height.unwrap_or(self.params.height),
                interpolation: options.interpolation,
            };

            let scaler = self
                .core
                .engine()
                .open_scaler(&config)
                .map_err(|status| Error::ScaleError { stream, status })?;

            Some(ScaleStage { scaler, config })
        }
        else {
            None
        };

        self.core.open()?;

        if let Some(stage) = &stage {
            let size = rgba_buffer_size(stage.config.dst_width, stage.config.dst_height);
            if self.buffer.grow(size) {
                debug!("stream {}: allocated {} byte rgba buffer", stream, size);
            }
        }

        self.stage = stage;
        self.options = options;
        Ok(())
    }

    /// Close the stream. The conversion state is released even if the codec reports an error.
    pub fn close(&mut self) -> Result<()> {
        let result = self.core.close();
        self.stage = None;
        self.buffer.clear();
        result
    }

    pub(crate) fn read_frame(
        &mut self,
        pending: &mut E::Packet,
        input_ended: bool,
    ) -> Result<(ReadOutcome<VideoFrame>, bool)> {
        let Decoded { outcome, deferred } = self.core.decode(pending, input_ended)?;

        let outcome = match outcome {
            ReadOutcome::Ready(()) => ReadOutcome::Ready(self.convert()?),
            ReadOutcome::Again => ReadOutcome::Again,
            ReadOutcome::End => ReadOutcome::End,
        };

        Ok((outcome, deferred))
    }

    fn convert(&mut self) -> Result<VideoFrame> {
        let stream = self.core.index();

        let frame = match self.core.frame() {
            Some(frame) => frame,
            None => return misuse_error(MisuseKind::StreamNotOpen),
        };

        let config = ScalerConfig {
            src_width: frame.width(),
            src_height: frame.height(),
            src_format: frame.pixel_format(),
            dst_width: self.options.width.unwrap_or(frame.width()),
            dst_height: self.options.height.unwrap_or(frame.height()),
            interpolation: self.options.interpolation,
        };

        // Rebind when the decoded geometry or format differs from what the scaler was bound to.
        if self.stage.as_ref().map_or(true, |stage| stage.config != config) {
            debug!(
                "stream {}: binding scaler {}x{} fmt {} -> {}x{} rgba",
                stream,
                config.src_width,
                config.src_height,
                config.src_format,
                config.dst_width,
                config.dst_height
            );

            let scaler = self
                .core
                .engine()
                .open_scaler(&config)
                .map_err(|status| Error::ScaleError { stream, status })?;

            self.stage = Some(ScaleStage { scaler, config });
        }

        let size = rgba_buffer_size(config.dst_width, config.dst_height);
        if self.buffer.grow(size) {
            debug!("stream {}: allocated {} byte rgba buffer", stream, size);
        }

        let stride = RGBA_BYTES_PER_PIXEL * config.dst_width as usize;

        if let Some(stage) = self.stage.as_mut() {
            stage
                .scaler
                .scale(frame, &mut self.buffer.as_mut_slice()[..size], stride)
                .map_err(|status| Error::ScaleError { stream, status })?;
        }
        self.buffer.set_len(size);

        let header = match self.core.frame_header() {
            Some(header) => header,
            None => return misuse_error(MisuseKind::StreamNotOpen),
        };

        let data = self.buffer.as_slice().into();
        Ok(VideoFrame::new(header, config.dst_width, config.dst_height, data))
    }
}
