// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `packet` module defines the packet structure.

use bitflags::bitflags;

use crate::engine::EnginePacket;
use crate::stream::StreamKind;

bitflags! {
    /// Flags describing attributes of a packet.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct PacketFlags: u32 {
        /// The packet contains a key frame.
        const KEY        = 1 << 0;
        /// The packet content is corrupted.
        const CORRUPT    = 1 << 1;
        /// The packet is needed to maintain decoder state but its frame should be discarded.
        const DISCARD    = 1 << 2;
        /// The packet comes from a trusted source.
        const TRUSTED    = 1 << 3;
        /// The packet contains frames that no other frame depends on.
        const DISPOSABLE = 1 << 4;
    }
}

/// A `Packet` is an immutable snapshot of one unit of compressed data read from a container.
///
/// The payload is copied out of the engine's reusable packet buffer when the snapshot is taken, so
/// a `Packet` remains valid after the container reads further packets.
///
/// Timestamps are expressed in the owning stream's time-base. A timestamp is `None` if the
/// container did not signal one.
#[derive(Clone, Debug)]
pub struct Packet {
    stream_index: usize,
    kind: StreamKind,
    pts: Option<i64>,
    dts: Option<i64>,
    pos: Option<i64>,
    duration: i64,
    flags: PacketFlags,
    data: Box<[u8]>,
}

impl Packet {
    /// Take a snapshot of an engine packet belonging to a stream of the given kind.
    pub fn from_engine<P: EnginePacket>(packet: &P, kind: StreamKind) -> Self {
        Packet {
            stream_index: packet.stream_index(),
            kind,
            pts: packet.pts(),
            dts: packet.dts(),
            pos: packet.pos(),
            duration: packet.duration(),
            flags: packet.flags(),
            data: packet.data().into(),
        }
    }

    /// The index of the stream this packet belongs to.
    #[inline]
    pub const fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// The kind of the stream this packet belongs to.
    #[inline]
    pub const fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Get the presentation timestamp (PTS) of the packet.
    #[inline]
    pub const fn pts(&self) -> Option<i64> {
        self.pts
    }

    /// Get the decode timestamp (DTS) of the packet.
    #[inline]
    pub const fn dts(&self) -> Option<i64> {
        self.dts
    }

    /// Get the byte offset of the packet in the container, if known.
    #[inline]
    pub const fn pos(&self) -> Option<i64> {
        self.pos
    }

    #[inline]
    pub const fn duration(&self) -> i64 {
        self.duration
    }

    /// Get the size of the payload in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub const fn flags(&self) -> PacketFlags {
        self.flags
    }

    #[inline]
    pub fn is_key(&self) -> bool {
        self.flags.contains(PacketFlags::KEY)
    }

    /// Get an immutable slice to the packet payload.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
