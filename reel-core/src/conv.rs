// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `conv` module provides the output buffers and layout definitions shared by the video and
//! audio conversion stages.

/// Bytes per pixel of packed RGBA output.
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Channels of converted audio output.
pub const OUTPUT_CHANNELS: usize = 2;

/// Bytes per sample of converted audio output (`f64`).
pub const OUTPUT_BYTES_PER_SAMPLE: usize = std::mem::size_of::<f64>();

/// Bytes per interleaved stereo `f64` sample frame.
pub const OUTPUT_BYTES_PER_FRAME: usize = OUTPUT_CHANNELS * OUTPUT_BYTES_PER_SAMPLE;

/// Size in bytes of a packed RGBA image with 1-byte row alignment.
pub fn rgba_buffer_size(width: u32, height: u32) -> usize {
    RGBA_BYTES_PER_PIXEL * width as usize * height as usize
}

/// Size in bytes of `samples` interleaved stereo `f64` samples.
pub fn audio_buffer_size(samples: usize) -> usize {
    samples * OUTPUT_BYTES_PER_FRAME
}

/// The interpolation algorithm used when scaling video.
///
/// All algorithms produce the same output geometry. They differ only in visual quality and cost.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpolation {
    FastBilinear,
    Bilinear,
    #[default]
    Bicubic,
    /// Experimental.
    X,
    /// Nearest neighbour.
    Point,
    /// Averaging area.
    Area,
    /// Bicubic for luma, bilinear for chroma.
    BicubicBilinear,
    Gauss,
    Sinc,
    Lanczos,
    /// Natural bicubic spline.
    Spline,
}

/// A grow-only output buffer owned by a conversion stage.
///
/// The buffer is replaced with a fresh, zeroed allocation only when a request exceeds its capacity.
/// Smaller requests reuse the existing allocation. Bytes from a previous allocation are never
/// carried into a new one.
#[derive(Default)]
pub struct ConversionBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl ConversionBuffer {
    /// Create an unallocated buffer.
    pub fn new() -> Self {
        Default::default()
    }

    /// Create a buffer with an initial allocation of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        ConversionBuffer { buf: vec![0; capacity].into_boxed_slice(), len: 0 }
    }

    /// The size of the current allocation.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Ensure the buffer can hold at least `size` bytes, returning `true` if it was reallocated.
    pub fn grow(&mut self, size: usize) -> bool {
        if size <= self.buf.len() {
            return false;
        }

        // Release the old allocation before acquiring the new one.
        self.buf = Box::default();
        self.buf = vec![0; size].into_boxed_slice();
        self.len = 0;
        true
    }

    /// Get the whole allocation for the converter to write into.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Mark the first `len` bytes as the converter's output.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.buf.len());
    }

    /// Get the converter's most recent output.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Release the allocation.
    pub fn clear(&mut self) {
        self.buf = Box::default();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_grow_only() {
        let mut buf = ConversionBuffer::new();
        assert_eq!(buf.capacity(), 0);

        assert!(buf.grow(64));
        assert_eq!(buf.capacity(), 64);

        // Shrinking or equal requests reuse the allocation.
        assert!(!buf.grow(16));
        assert!(!buf.grow(64));
        assert_eq!(buf.capacity(), 64);

        assert!(buf.grow(65));
        assert_eq!(buf.capacity(), 65);
    }

    #[test]
    fn verify_growth_discards_stale_bytes() {
        let mut buf = ConversionBuffer::with_capacity(4);
        buf.as_mut_slice().copy_from_slice(&[0xff; 4]);
        buf.set_len(4);
        assert_eq!(buf.as_slice(), &[0xff; 4]);

        assert!(buf.grow(8));
        assert!(buf.as_slice().is_empty());
        assert!(buf.as_mut_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn verify_set_len_is_clamped() {
        let mut buf = ConversionBuffer::with_capacity(8);
        buf.set_len(100);
        assert_eq!(buf.as_slice().len(), 8);

        buf.clear();
        assert_eq!(buf.capacity(), 0);
        assert!(buf.as_slice().is_empty());
    }

    #[test]
    fn verify_output_sizes() {
        assert_eq!(rgba_buffer_size(1920, 1080), 8_294_400);
        assert_eq!(rgba_buffer_size(0, 1080), 0);
        assert_eq!(audio_buffer_size(1024), 16_384);
        assert_eq!(OUTPUT_BYTES_PER_FRAME, 16);
    }
}
