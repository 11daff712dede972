// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::trace;

use crate::engine::{BitstreamFilter, Engine, EngineError, EnginePacket, EngineResult};
use crate::units::Rational;

/// A bitstream filter bound to a stream, with its own scratch packets.
///
/// The stage owns a packet the filter has not yet accepted, so no input is lost while the filter
/// still has output to give. Output is always collected before further input is submitted.
pub(crate) struct FilterStage<E: Engine> {
    name: String,
    filter: E::Filter,
    input: E::Packet,
    output: E::Packet,
    /// `input` holds a packet the filter refused.
    input_pending: bool,
    /// The last receive produced a packet, so more may follow.
    primed: bool,
    /// The container reached the end of its input.
    ending: bool,
    eof_sent: bool,
    exhausted: bool,
}

impl<E: Engine> FilterStage<E> {
    pub(crate) fn new(
        engine: &E,
        name: &str,
        params: &E::Params,
        time_base: Rational,
    ) -> EngineResult<Self> {
        let filter = engine.open_filter(name, params, time_base)?;
        let input = engine.alloc_packet()?;
        let output = engine.alloc_packet()?;

        Ok(FilterStage {
            name: name.to_string(),
            filter,
            input,
            output,
            input_pending: false,
            primed: false,
            ending: false,
            eof_sent: false,
            exhausted: false,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the stage may produce output without a new input packet.
    pub(crate) fn has_backlog(&self) -> bool {
        self.input_pending || self.primed || (self.ending && !self.exhausted)
    }

    /// Submit a freshly demuxed packet and try to replace it with the next filtered packet.
    ///
    /// Must only be called when [`has_backlog`](FilterStage::has_backlog) is `false`. Returns
    /// `false`, leaving `packet` empty, if the filter needs more input.
    pub(crate) fn push(&mut self, packet: &mut E::Packet) -> EngineResult<bool> {
        self.input.reference(packet)?;
        packet.unref();
        self.input_pending = true;
        self.pull(packet)
    }

    /// Try to produce the next filtered packet into `packet` from input already submitted.
    pub(crate) fn pull(&mut self, packet: &mut E::Packet) -> EngineResult<bool> {
        if self.input_pending {
            match self.filter.send(&mut self.input) {
                Ok(()) => self.release_input(),
                Err(EngineError::Again) => trace!("{}: filter output pending", self.name),
                Err(err) => {
                    self.release_input();
                    return Err(err);
                }
            }
        }

        if self.ending && !self.input_pending && !self.eof_sent {
            match self.filter.send_eof() {
                Ok(()) | Err(EngineError::EndOfFile) => self.eof_sent = true,
                Err(err) => return Err(err),
            }
        }

        match self.filter.receive(&mut self.output) {
            Ok(()) => {
                std::mem::swap(packet, &mut self.output);
                self.output.unref();
                self.primed = true;
                Ok(true)
            }
            Err(EngineError::Again) if self.input_pending => {
                // Refusing input without offering output would stall the stream.
                self.primed = false;
                self.release_input();
                Err(EngineError::Again)
            }
            Err(EngineError::Again) => {
                self.primed = false;
                Ok(false)
            }
            Err(EngineError::EndOfFile) => {
                self.primed = false;
                self.exhausted = true;
                Ok(false)
            }
            Err(err) => {
                self.primed = false;
                Err(err)
            }
        }
    }

    /// Mark the end of input. Buffered packets are drained by subsequent pulls.
    pub(crate) fn finish(&mut self) {
        self.ending = true;
    }

    fn release_input(&mut self) {
        self.input.unref();
        self.input_pending = false;
    }

    /// Discard buffered packets and end-of-input state.
    pub(crate) fn reset(&mut self) {
        self.filter.flush();
        self.release_input();
        self.output.unref();
        self.primed = false;
        self.ending = false;
        self.eof_sent = false;
        self.exhausted = false;
    }
}
