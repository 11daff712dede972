// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Project Reel
//!
//! Reel is a pull-based decoding pipeline over a native media engine. It opens a container,
//! enumerates its elementary streams, and decodes them into packed RGBA video frames and
//! interleaved stereo `f64` audio frames.
//!
//! # Engines
//!
//! The pipeline itself is engine-independent. Engines are enabled via. a feature flag.
//!
//! | Engine   | Feature Flag | Default |
//! |----------|--------------|---------|
//! | FFmpeg   | `ffmpeg`     | No      |
//!
//! The `image` feature adds conversion of video frames into `image::RgbaImage`.
//!
//! # Usage
//!
//! 1.  Open a [`MediaContainer`][core::container::MediaContainer] from a path using
//!     [`default::open`], or from any byte source using [`default::open_source`].
//! 2.  Interrogate the container's [`streams`][core::container::MediaContainer::streams] and open
//!     the ones of interest with [`open_stream`][core::container::MediaContainer::open_stream].
//! 3.  Call [`read_packet`][core::container::MediaContainer::read_packet] and route each packet to
//!     its stream with [`read_frame`][core::container::MediaContainer::read_frame]. Alternatively,
//!     let [`next_frame`][core::container::MediaContainer::next_frame] do the routing.
//! 4.  Every read returns a [`ReadOutcome`][core::outcome::ReadOutcome]. `Again` means nothing was
//!     produced yet and the caller should keep reading. Only `End` means the stream is exhausted.
//! 5.  Close the streams, then the container. Streams still open are closed when the container is.
//!
//! # Adding support for new engines
//!
//! Implement the [`Engine`][core::engine::Engine] trait and its resource traits, then pass the
//! engine to [`MediaContainer::open`][core::container::MediaContainer::open].

#[cfg(feature = "ffmpeg")]
pub mod default {
    //! The `default` module opens containers with the FFmpeg engine. Using the `default` module is
    //! completely optional.

    use std::path::Path;
    use std::sync::Arc;

    use log::debug;

    use reel_core::container::{ContainerOptions, MediaContainer};
    use reel_core::errors::{Error, Result};
    use reel_core::io::SourceHandlers;

    pub use reel_engine_ffmpeg::FfmpegEngine;

    /// A container opened with the FFmpeg engine.
    pub type Container = MediaContainer<FfmpegEngine>;

    /// Initialize the FFmpeg engine.
    pub fn get_engine() -> Result<Arc<FfmpegEngine>> {
        let engine = FfmpegEngine::new().map_err(Error::ContainerOpenError)?;
        Ok(Arc::new(engine))
    }

    /// Open the container at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Container> {
        debug!("opening {}", path.as_ref().display());
        MediaContainer::open(get_engine()?, path)
    }

    /// Open a container over a byte source with default options. `name` is used to identify the
    /// source and as a format hint.
    pub fn open_source(name: &str, handlers: SourceHandlers) -> Result<Container> {
        open_source_with(name, handlers, &Default::default())
    }

    /// Open a container over a byte source.
    pub fn open_source_with(
        name: &str,
        handlers: SourceHandlers,
        options: &ContainerOptions,
    ) -> Result<Container> {
        debug!("opening byte source {} (probe size {})", name, options.probe_size);
        MediaContainer::from_source(get_engine()?, name, handlers, options)
    }
}

pub use reel_core as core;

#[cfg(all(test, feature = "ffmpeg"))]
mod tests {
    use reel_core::errors::Error;
    use reel_core::io::SourceHandlers;

    use super::default;

    #[test]
    fn verify_missing_file_fails_to_open() {
        let result = default::open("/nonexistent/reel/clip.mkv");
        assert!(matches!(result, Err(Error::ContainerOpenError(_))));
    }

    #[test]
    fn verify_empty_source_fails_to_open() {
        let handlers = SourceHandlers::new(|_| Ok(0));
        let result = default::open_source("empty", handlers);
        assert!(matches!(result, Err(Error::ContainerOpenError(_))));
    }
}
