// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Custom `AVIOContext` callbacks that route native reads, writes, and seeks to a registered byte
//! source.

use std::ffi::{c_int, c_void};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::slice;

use ffmpeg_next::ffi;
use log::{trace, warn};

use reel_core::engine::{EngineError, EngineResult};
use reel_core::io::RegisteredSource;

use crate::{IO_FAILURE, NO_MEMORY};

const BUFFER_SIZE: usize = 64 * 1024;

const SEEK_SET: c_int = 0;
const SEEK_CUR: c_int = 1;
const SEEK_END: c_int = 2;

/// An `AVIOContext` bound to a registered byte source.
pub(crate) struct CustomIo {
    ctx: *mut ffi::AVIOContext,
    source: *mut RegisteredSource,
}

// SAFETY: both pointers are exclusively owned, and the byte source's handlers are `Send`.
unsafe impl Send for CustomIo {}

impl CustomIo {
    pub(crate) fn new(source: RegisteredSource) -> EngineResult<Self> {
        let write_flag = c_int::from(source.is_writable());

        let seek: Option<unsafe extern "C" fn(*mut c_void, i64, c_int) -> i64> =
            if source.is_seekable() { Some(seek_source) } else { None };

        let write: Option<unsafe extern "C" fn(*mut c_void, *const u8, c_int) -> c_int> =
            if source.is_writable() { Some(write_source) } else { None };

        let buffer = unsafe { ffi::av_malloc(BUFFER_SIZE) } as *mut u8;

        if buffer.is_null() {
            return Err(EngineError::Status(NO_MEMORY));
        }

        let token = source.token();
        let source = Box::into_raw(Box::new(source));

        let ctx = unsafe {
            ffi::avio_alloc_context(
                buffer,
                BUFFER_SIZE as c_int,
                write_flag,
                source as *mut c_void,
                Some(read_source),
                write,
                seek,
            )
        };

        if ctx.is_null() {
            unsafe {
                ffi::av_free(buffer as *mut c_void);
                drop(Box::from_raw(source));
            }
            return Err(EngineError::Status(NO_MEMORY));
        }

        trace!("bound io context to byte source {}", token);

        Ok(CustomIo { ctx, source })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::AVIOContext {
        self.ctx
    }
}

impl Drop for CustomIo {
    fn drop(&mut self) {
        unsafe {
            // The context may have replaced the buffer it was given.
            ffi::av_freep(&mut (*self.ctx).buffer as *mut *mut u8 as *mut c_void);
            ffi::avio_context_free(&mut self.ctx);
            drop(Box::from_raw(self.source));
        }
    }
}

/// Recover the byte source bound to an io context.
///
/// # Safety
///
/// `opaque` must be the pointer passed to `avio_alloc_context` by [`CustomIo::new`].
unsafe fn source_at<'a>(opaque: *mut c_void) -> &'a mut RegisteredSource {
    unsafe { &mut *(opaque as *mut RegisteredSource) }
}

unsafe extern "C" fn read_source(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    let source = unsafe { source_at(opaque) };
    let len = usize::try_from(buf_size).unwrap_or(0);
    let buf = unsafe { slice::from_raw_parts_mut(buf, len) };

    match source.read(buf) {
        Ok(0) => ffi::AVERROR_EOF,
        Ok(read) => read as c_int,
        Err(err) => {
            warn!("byte source {}: read failed: {}", source.token(), err);
            IO_FAILURE
        }
    }
}

unsafe extern "C" fn write_source(opaque: *mut c_void, buf: *const u8, buf_size: c_int) -> c_int {
    let source = unsafe { source_at(opaque) };
    let len = usize::try_from(buf_size).unwrap_or(0);
    let buf = unsafe { slice::from_raw_parts(buf, len) };

    match source.write(buf) {
        Ok(written) => written as c_int,
        Err(err) => {
            warn!("byte source {}: write failed: {}", source.token(), err);
            IO_FAILURE
        }
    }
}

unsafe extern "C" fn seek_source(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    let source = unsafe { source_at(opaque) };
    let whence = whence & !(ffi::AVSEEK_FORCE as c_int);

    let result = if whence & ffi::AVSEEK_SIZE as c_int != 0 {
        stream_len(source)
    }
    else {
        match whence {
            SEEK_SET => match u64::try_from(offset) {
                Ok(offset) => source.seek(SeekFrom::Start(offset)),
                Err(_) => Err(io::Error::from(io::ErrorKind::InvalidInput)),
            },
            SEEK_CUR => source.seek(SeekFrom::Current(offset)),
            SEEK_END => source.seek(SeekFrom::End(offset)),
            _ => Err(io::Error::from(io::ErrorKind::InvalidInput)),
        }
    };

    match result {
        Ok(pos) => i64::try_from(pos).unwrap_or(i64::MAX),
        Err(err) => {
            warn!("byte source {}: seek failed: {}", source.token(), err);
            i64::from(IO_FAILURE)
        }
    }
}

fn stream_len(source: &mut RegisteredSource) -> io::Result<u64> {
    let pos = source.stream_position()?;
    let len = source.seek(SeekFrom::End(0))?;

    if pos != len {
        source.seek(SeekFrom::Start(pos))?;
    }
    Ok(len)
}
