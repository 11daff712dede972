// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::debug;

use crate::conv::{audio_buffer_size, ConversionBuffer};
use crate::engine::{Engine, EngineFrame, Resampler, ResamplerConfig};
use crate::errors::{misuse_error, Error, MisuseKind, Result};
use crate::frame::AudioFrame;
use crate::outcome::ReadOutcome;

use super::{AudioParameters, Decoded, StreamCore, StreamInfo};

struct ResampleStage<E: Engine> {
    resampler: E::Resampler,
    config: ResamplerConfig,
}

/// An audio stream decoding into interleaved stereo `f64` frames.
///
/// Every source channel layout is mixed to two channels and the sample rate is preserved.
pub struct AudioStream<E: Engine> {
    pub(super) core: StreamCore<E>,
    params: AudioParameters,
    stage: Option<ResampleStage<E>>,
    buffer: ConversionBuffer,
}

impl<E: Engine> AudioStream<E> {
    pub(super) fn new(core: StreamCore<E>, params: AudioParameters) -> Self {
        AudioStream { core, params, stage: None, buffer: ConversionBuffer::new() }
    }

    pub fn info(&self) -> &StreamInfo {
        &self.core.info
    }

    pub fn channel_count(&self) -> u16 {
        self.params.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.params.sample_rate
    }

    /// Samples per channel in a frame, or `0` if variable.
    pub fn frame_size(&self) -> u32 {
        self.params.frame_size
    }

    pub fn is_opened(&self) -> bool {
        self.core.is_opened()
    }

    /// The size of the sample conversion buffer's allocation.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn open(&mut self) -> Result<()> {
        if self.core.is_opened() {
            return misuse_error(MisuseKind::StreamAlreadyOpen);
        }

        let stream = self.core.index();

        let stage = if self.params.channels > 0 && self.params.sample_rate > 0 {
            let config = ResamplerConfig {
                src_channels: self.params.channels,
                src_layout: self.params.channel_layout,
                src_format: self.params.sample_format,
                src_rate: self.params.sample_rate,
                dst_rate: self.params.sample_rate,
            };

            let resampler = self
                .core
                .engine()
                .open_resampler(&config)
                .map_err(|status| Error::ResampleError { stream, status })?;

            Some(ResampleStage { resampler, config })
        }
        else {
            None
        };

        self.core.open()?;
        self.stage = stage;
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
    ) -> Result<(ReadOutcome<AudioFrame>, bool)> {
        let Decoded { outcome, deferred } = self.core.decode(pending, input_ended)?;

        let outcome = match outcome {
            ReadOutcome::Ready(()) => ReadOutcome::Ready(self.convert()?),
            ReadOutcome::Again => ReadOutcome::Again,
            ReadOutcome::End => ReadOutcome::End,
        };

        Ok((outcome, deferred))
    }

    fn convert(&mut self) -> Result<AudioFrame> {
        let stream = self.core.index();

        let frame = match self.core.frame() {
            Some(frame) => frame,
            None => return misuse_error(MisuseKind::StreamNotOpen),
        };

        // The declared layout only applies while the decoded channel count agrees with it.
        let src_layout = if frame.channels() == self.params.channels {
            self.params.channel_layout
        }
        else {
            0
        };

        let config = ResamplerConfig {
            src_channels: frame.channels(),
            src_layout,
            src_format: frame.sample_format(),
            src_rate: frame.sample_rate(),
            dst_rate: frame.sample_rate(),
        };

        if self.stage.as_ref().map_or(true, |stage| stage.config != config) {
            debug!(
                "stream {}: binding resampler {}ch fmt {} @ {}Hz -> 2ch f64",
                stream, config.src_channels, config.src_format, config.src_rate
            );

            let resampler = self
                .core
                .engine()
                .open_resampler(&config)
                .map_err(|status| Error::ResampleError { stream, status })?;

            self.stage = Some(ResampleStage { resampler, config });
        }

        let stage = match self.stage.as_mut() {
            Some(stage) => stage,
            None => return misuse_error(MisuseKind::StreamNotOpen),
        };

        let max_samples = stage
            .resampler
            .max_output_samples(frame.sample_count())
            .map_err(|status| Error::ResampleError { stream, status })?;

        let size = audio_buffer_size(max_samples);
        if self.buffer.grow(size) {
            debug!("stream {}: allocated {} byte sample buffer", stream, size);
        }

        let samples = stage
            .resampler
            .convert(frame, &mut self.buffer.as_mut_slice()[..size])
            .map_err(|status| Error::ResampleError { stream, status })?;

        self.buffer.set_len(audio_buffer_size(samples.min(max_samples)));

        let header = match self.core.frame_header() {
            Some(header) => header,
            None => return misuse_error(MisuseKind::StreamNotOpen),
        };

        Ok(AudioFrame::new(header, self.buffer.as_slice().into()))
    }
}
