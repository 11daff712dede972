// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module bridges arbitrary byte sources to a decoding engine.
//!
//! Native engines call back into the program with nothing more than an opaque integer. Each
//! [`SourceHandlers`] bundle is therefore stored in a process-wide registry under a
//! [`SourceToken`] issued from a monotonic counter, and the engine is only given the token. Tokens
//! are never reused, so a stale token can never reach another container's handlers.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use log::debug;
use once_cell::sync::Lazy;

type ReadFn = Box<dyn FnMut(&mut [u8]) -> io::Result<usize> + Send>;
type SeekFn = Box<dyn FnMut(SeekFrom) -> io::Result<u64> + Send>;
type WriteFn = Box<dyn FnMut(&[u8]) -> io::Result<usize> + Send>;

/// The callbacks backing a byte source.
///
/// Callbacks must perform synchronous, blocking I/O. A read returning `0` signals end of input.
pub struct SourceHandlers {
    read: ReadFn,
    seek: Option<SeekFn>,
    write: Option<WriteFn>,
}

impl SourceHandlers {
    /// Create a read-only, unseekable source.
    pub fn new<F>(read: F) -> Self
    where
        F: FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static,
    {
        SourceHandlers { read: Box::new(read), seek: None, write: None }
    }

    pub fn with_seek<F>(mut self, seek: F) -> Self
    where
        F: FnMut(SeekFrom) -> io::Result<u64> + Send + 'static,
    {
        self.seek = Some(Box::new(seek));
        self
    }

    pub fn with_write<F>(mut self, write: F) -> Self
    where
        F: FnMut(&[u8]) -> io::Result<usize> + Send + 'static,
    {
        self.write = Some(Box::new(write));
        self
    }

    /// Create a seekable source over any reader.
    pub fn from_reader<R: Read + Seek + Send + 'static>(reader: R) -> Self {
        let reader = Arc::new(Mutex::new(reader));
        let seeker = Arc::clone(&reader);

        SourceHandlers::new(move |buf| lock(&*reader)?.read(buf))
            .with_seek(move |pos| lock(&*seeker)?.seek(pos))
    }

    pub fn is_seekable(&self) -> bool {
        self.seek.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.write.is_some()
    }
}

impl fmt::Debug for SourceHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandlers")
            .field("seekable", &self.is_seekable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> io::Result<std::sync::MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| io::Error::new(io::ErrorKind::Other, "byte source lock poisoned"))
}

/// An identity for a registered byte source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceToken(u64);

impl SourceToken {
    /// Recreate a token from the raw value handed to the engine.
    pub const fn from_raw(raw: u64) -> Self {
        SourceToken(raw)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type SharedHandlers = Arc<Mutex<SourceHandlers>>;

// Token 0 is never issued so engines may treat a null opaque value as invalid.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

static REGISTRY: Lazy<Mutex<HashMap<SourceToken, SharedHandlers>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Register a byte source, returning a guard that unregisters it when dropped.
pub fn register(handlers: SourceHandlers) -> io::Result<SourceRegistration> {
    let token = SourceToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));

    lock(&*REGISTRY)?.insert(token, Arc::new(Mutex::new(handlers)));

    debug!("registered byte source {}", token);
    Ok(SourceRegistration { token })
}

/// Returns `true` if `token` currently identifies a registered source.
pub fn is_registered(token: SourceToken) -> bool {
    lock(&*REGISTRY).map(|registry| registry.contains_key(&token)).unwrap_or(false)
}

fn dispatch<T, F>(token: SourceToken, f: F) -> io::Result<T>
where
    F: FnOnce(&mut SourceHandlers) -> io::Result<T>,
{
    // Release the registry before invoking the handler so sources do not serialize one another.
    let handlers = lock(&*REGISTRY)?.get(&token).cloned().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("byte source {} is not registered", token))
    })?;

    let mut handlers = lock(&*handlers)?;
    f(&mut handlers)
}

/// Owns a registry entry. Dropping the registration removes the entry.
#[derive(Debug)]
pub struct SourceRegistration {
    token: SourceToken,
}

impl SourceRegistration {
    pub fn token(&self) -> SourceToken {
        self.token
    }

    /// Get a handle that dispatches I/O to the registered handlers.
    pub fn source(&self) -> RegisteredSource {
        RegisteredSource { token: self.token }
    }
}

impl Drop for SourceRegistration {
    fn drop(&mut self) {
        if let Ok(mut registry) = REGISTRY.lock() {
            registry.remove(&self.token);
            debug!("unregistered byte source {}", self.token);
        }
    }
}

/// A token-only handle to a registered byte source.
///
/// All I/O is dispatched through the registry. Once the source is unregistered every operation
/// fails with [`io::ErrorKind::NotFound`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisteredSource {
    token: SourceToken,
}

impl RegisteredSource {
    pub fn from_token(token: SourceToken) -> Self {
        RegisteredSource { token }
    }

    pub fn token(&self) -> SourceToken {
        self.token
    }

    pub fn is_seekable(&self) -> bool {
        dispatch(self.token, |h| Ok(h.is_seekable())).unwrap_or(false)
    }

    pub fn is_writable(&self) -> bool {
        dispatch(self.token, |h| Ok(h.is_writable())).unwrap_or(false)
    }
}

impl Read for RegisteredSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        dispatch(self.token, |h| (h.read)(buf))
    }
}

impl Seek for RegisteredSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        dispatch(self.token, |h| match h.seek.as_mut() {
            Some(seek) => seek(pos),
            None => Err(io::Error::new(io::ErrorKind::Unsupported, "byte source is not seekable")),
        })
    }
}

impl Write for RegisteredSource {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        dispatch(self.token, |h| match h.write.as_mut() {
            Some(write) => write(buf),
            None => Err(io::Error::new(io::ErrorKind::Unsupported, "byte source is not writable")),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read up to `limit` leading bytes of a seekable source for format probing, then rewind it.
pub fn probe_prefix<S: Read + Seek>(source: &mut S, limit: usize) -> io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(limit.min(64 * 1024));
    source.by_ref().take(limit as u64).read_to_end(&mut prefix)?;
    source.seek(SeekFrom::Start(0))?;
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn verify_tokens_are_unique_and_unregistered_on_drop() {
        let a = register(SourceHandlers::from_reader(Cursor::new(vec![1u8]))).unwrap();
        let b = register(SourceHandlers::from_reader(Cursor::new(vec![2u8]))).unwrap();

        assert_ne!(a.token(), b.token());
        assert!(b.token() > a.token());

        let token = a.token();
        assert!(is_registered(token));
        drop(a);
        assert!(!is_registered(token));

        let err = RegisteredSource::from_token(token).read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn verify_dispatch_reaches_handlers() {
        let reg = register(SourceHandlers::from_reader(Cursor::new(b"reel".to_vec()))).unwrap();
        let mut source = reg.source();

        assert!(source.is_seekable());
        assert!(!source.is_writable());

        let mut buf = [0u8; 2];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"re");
        assert_eq!(source.seek(SeekFrom::End(-1)).unwrap(), 3);

        let err = source.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn verify_unseekable_source() {
        let mut data = Cursor::new(vec![0u8; 8]);
        let reg = register(SourceHandlers::new(move |buf| data.read(buf))).unwrap();
        let mut source = reg.source();

        assert!(!source.is_seekable());
        assert_eq!(source.seek(SeekFrom::Start(0)).unwrap_err().kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn verify_write_handler() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);

        let reg = register(SourceHandlers::new(|_| Ok(0)).with_write(move |buf| {
            sink.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }))
        .unwrap();

        assert_eq!(reg.source().write(b"abc").unwrap(), 3);
        assert_eq!(&*written.lock().unwrap(), b"abc");
    }

    #[test]
    fn verify_probe_prefix_rewinds() {
        let mut source = Cursor::new((0u8..=255).collect::<Vec<u8>>());

        let prefix = probe_prefix(&mut source, 16).unwrap();
        assert_eq!(prefix, (0u8..16).collect::<Vec<u8>>());
        assert_eq!(source.position(), 0);

        let prefix = probe_prefix(&mut source, 1024).unwrap();
        assert_eq!(prefix.len(), 256);
    }
}
