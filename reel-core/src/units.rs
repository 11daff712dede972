// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `units` module provides definitions for common units.

use std::fmt;
use std::time::Duration;

use crate::errors::{Error, Result};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A signed rational number as reported by an engine, e.g. a frame rate or aspect ratio. A zero
/// denominator means the value is unknown.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Rational { num, den }
    }

    /// Returns `true` if the value is known.
    pub fn is_known(&self) -> bool {
        self.den != 0
    }

    /// The value as a float, or `None` if unknown.
    pub fn as_f64(&self) -> Option<f64> {
        if self.den == 0 {
            None
        }
        else {
            Some(f64::from(self.num) / f64::from(self.den))
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// A `TimeBase` is the conversion factor between time, expressed in seconds, and a timestamp.
///
/// In other words, a `TimeBase` is the length in seconds of one tick of a timestamp.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeBase {
    /// The numerator.
    pub numer: u32,
    /// The denominator.
    pub denom: u32,
}

/// The time-base of container-level durations, one microsecond.
pub const MICROS_TIME_BASE: TimeBase = TimeBase { numer: 1, denom: 1_000_000 };

impl TimeBase {
    /// Creates a new `TimeBase`. Panics if either the numerator or denominator is 0.
    pub fn new(numer: u32, denom: u32) -> Self {
        if numer == 0 || denom == 0 {
            panic!("TimeBase cannot have 0 numerator or denominator");
        }

        TimeBase { numer, denom }
    }

    /// Creates a new `TimeBase` from an engine-reported rational, or `None` if either part is not
    /// positive.
    pub fn from_rational(rational: Rational) -> Option<Self> {
        if rational.num <= 0 || rational.den <= 0 {
            return None;
        }

        Some(TimeBase { numer: rational.num as u32, denom: rational.den as u32 })
    }

    /// Calculates the span of `ts` ticks.
    ///
    /// The product of the timestamp and numerator is computed in 128-bit integer arithmetic so the
    /// result is exact to the nanosecond and never loses precision on large timestamps. Seconds
    /// saturate at `u64::MAX`.
    pub fn calc_duration(&self, ts: u64) -> Duration {
        let dividend = u128::from(ts) * u128::from(self.numer);
        let denom = u128::from(self.denom);

        let secs = dividend / denom;
        // The remainder is less than the denominator, so nanos is less than one second.
        let nanos = ((dividend % denom) * NANOS_PER_SEC) / denom;

        match u64::try_from(secs) {
            Ok(secs) => Duration::new(secs, nanos as u32),
            Err(_) => Duration::MAX,
        }
    }

    /// Calculates the timestamp of the tick at or before `time`. Saturates at `u64::MAX`.
    pub fn calc_timestamp(&self, time: Duration) -> u64 {
        let nanos = time.as_nanos();

        // nanos * denom fits within 128 bits for any representable `Duration`.
        let ts = (nanos * u128::from(self.denom)) / (NANOS_PER_SEC * u128::from(self.numer));

        u64::try_from(ts).unwrap_or(u64::MAX)
    }
}

impl From<TimeBase> for f64 {
    fn from(timebase: TimeBase) -> Self {
        f64::from(timebase.numer) / f64::from(timebase.denom)
    }
}

impl From<TimeBase> for Rational {
    fn from(timebase: TimeBase) -> Self {
        Rational {
            num: i32::try_from(timebase.numer).unwrap_or(i32::MAX),
            den: i32::try_from(timebase.denom).unwrap_or(i32::MAX),
        }
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

/// Calculates the wall-clock offset of a presentation timestamp.
///
/// Fails with [`Error::InvalidTimestamp`] if the time-base is unknown, or the timestamp is missing
/// or negative.
pub fn presentation_offset(time_base: Option<TimeBase>, pts: Option<i64>) -> Result<Duration> {
    let time_base = time_base.ok_or(Error::InvalidTimestamp)?;
    let pts = pts.ok_or(Error::InvalidTimestamp)?;
    let pts = u64::try_from(pts).map_err(|_| Error::InvalidTimestamp)?;

    Ok(time_base.calc_duration(pts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_calc_duration() {
        let tb = TimeBase::new(1, 320);

        assert_eq!(tb.calc_duration(0), Duration::ZERO);
        assert_eq!(tb.calc_duration(12_345), Duration::new(38, 578_125_000));
        assert_eq!(tb.calc_duration(u64::MAX), Duration::new(57_646_075_230_342_348, 796_875_000));

        // NTSC video. Frame 1 lands at 33.366666...ms and truncates to the nanosecond.
        let ntsc = TimeBase::new(1001, 30_000);
        assert_eq!(ntsc.calc_duration(1), Duration::new(0, 33_366_666));
        assert_eq!(ntsc.calc_duration(30_000), Duration::new(1001, 0));
    }

    #[test]
    fn verify_calc_duration_saturates() {
        let tb = TimeBase::new(u32::MAX, 1);
        assert_eq!(tb.calc_duration(u64::MAX), Duration::MAX);
    }

    #[test]
    fn verify_calc_timestamp() {
        let tb = TimeBase::new(1, 30_000);

        assert_eq!(tb.calc_timestamp(Duration::ZERO), 0);
        assert_eq!(tb.calc_timestamp(Duration::from_secs(2)), 60_000);
        assert_eq!(tb.calc_timestamp(Duration::from_millis(1500)), 45_000);

        // Inverse of calc_duration when the duration is exact.
        let tb = TimeBase::new(1001, 30_000);
        assert_eq!(tb.calc_timestamp(tb.calc_duration(12_345)), 12_345);
        assert_eq!(tb.calc_timestamp(Duration::new(1001, 0)), 30_000);
    }

    #[test]
    fn verify_presentation_offset_monotonic() {
        let tb = Some(TimeBase::new(1, 30_000));

        let mut last = Duration::ZERO;
        for pts in (0..90_000).step_by(997) {
            let offset = presentation_offset(tb, Some(pts)).unwrap();
            assert!(offset >= last);
            last = offset;
        }
    }

    #[test]
    fn verify_presentation_offset_rejects_invalid() {
        let tb = Some(TimeBase::new(1, 1000));

        assert!(matches!(presentation_offset(tb, None), Err(Error::InvalidTimestamp)));
        assert!(matches!(presentation_offset(tb, Some(-1)), Err(Error::InvalidTimestamp)));
        assert!(matches!(presentation_offset(None, Some(0)), Err(Error::InvalidTimestamp)));
    }

    #[test]
    fn verify_time_base_from_rational() {
        let tb = TimeBase::from_rational(Rational::new(1, 90_000));
        assert_eq!(tb, Some(TimeBase::new(1, 90_000)));
        assert_eq!(TimeBase::from_rational(Rational::new(0, 0)), None);
        assert_eq!(TimeBase::from_rational(Rational::new(-1, 25)), None);
        let rate = Rational::new(30_000, 1001).as_f64().map(|r| (r * 1000.0).round());
        assert_eq!(rate, Some(29_970.0));
    }
}
