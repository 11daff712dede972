// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `outcome` module defines the non-fatal results of pipeline reads.

/// The non-fatal result of reading a packet or frame.
///
/// Fatal failures are reported through [`Error`](crate::errors::Error). Exactly one of the three
/// variants is produced per read.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum ReadOutcome<T> {
    /// A value was produced.
    Ready(T),
    /// Nothing was produced, but more is available. The caller should read again.
    Again,
    /// The stream or container is exhausted.
    End,
}

impl<T> ReadOutcome<T> {
    /// Returns `true` unless the outcome is [`ReadOutcome::End`].
    pub fn has_more(&self) -> bool {
        !matches!(self, ReadOutcome::End)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ReadOutcome::Ready(_))
    }

    pub fn is_again(&self) -> bool {
        matches!(self, ReadOutcome::Again)
    }

    /// Convert into the produced value, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            ReadOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ReadOutcome<U> {
        match self {
            ReadOutcome::Ready(value) => ReadOutcome::Ready(f(value)),
            ReadOutcome::Again => ReadOutcome::Again,
            ReadOutcome::End => ReadOutcome::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReadOutcome;

    #[test]
    fn verify_has_more() {
        assert!(ReadOutcome::Ready(1).has_more());
        assert!(ReadOutcome::<u8>::Again.has_more());
        assert!(!ReadOutcome::<u8>::End.has_more());
    }

    #[test]
    fn verify_map_preserves_signal() {
        assert_eq!(ReadOutcome::Ready(2).map(|v| v * 2), ReadOutcome::Ready(4));
        assert_eq!(ReadOutcome::<u8>::Again.map(|v| v * 2), ReadOutcome::Again);
        assert_eq!(ReadOutcome::<u8>::End.ready(), None);
    }
}
