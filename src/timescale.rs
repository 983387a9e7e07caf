//! Timescales and periods.
//!
//! A [`Timescale`] is the time unit of one tick in a VCD trace (`1 ns`, `100 ps`, ...).
//! A [`Period`] is an exact duration in femtoseconds, used for the reference
//! period of machine units when flushing a trace.
//!
//! # Rescaling
//!
//! When the reference period differs from the trace timescale, timestamps are
//! converted with exact integer arithmetic:
//!
//! | Input | Formula |
//! |-------|---------|
//! | timestamp `t` in machine units | `⌊t × ref_fs / timescale_fs⌋` |
//!
//! ```
//! use sigtrace::timescale::{Period, Timescale};
//!
//! let ts: Timescale = "1 ns".parse().unwrap();
//! let rescale = ts.rescaler(Period::from_nanos(2));
//! assert_eq!(rescale.apply(30), 60);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::SimTime;

/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;

/// An exact duration in femtoseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    fs: u64,
}

impl Period {
    /// Creates a period from femtoseconds.
    pub const fn from_femtos(fs: u64) -> Self {
        Self { fs }
    }

    /// Creates a period from picoseconds.
    pub const fn from_picos(ps: u64) -> Self {
        Self { fs: ps * FS_PER_PS }
    }

    /// Creates a period from nanoseconds.
    pub const fn from_nanos(ns: u64) -> Self {
        Self { fs: ns * FS_PER_NS }
    }

    /// Creates a period from seconds, rounded to the nearest femtosecond.
    ///
    /// Negative and non-finite inputs saturate to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        let fs = (secs * FS_PER_S as f64).round();
        if fs.is_finite() && fs > 0.0 {
            Self { fs: fs as u64 }
        } else {
            Self { fs: 0 }
        }
    }

    /// Returns the period in femtoseconds.
    pub const fn as_femtos(&self) -> u64 {
        self.fs
    }

    /// Returns the period in seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.fs as f64 / FS_PER_S as f64
    }
}

/// Unit of a VCD timescale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    S,
    Ms,
    Us,
    Ns,
    Ps,
    Fs,
}

impl TimeUnit {
    fn femtos(self) -> u64 {
        match self {
            TimeUnit::S => FS_PER_S,
            TimeUnit::Ms => FS_PER_MS,
            TimeUnit::Us => FS_PER_US,
            TimeUnit::Ns => FS_PER_NS,
            TimeUnit::Ps => FS_PER_PS,
            TimeUnit::Fs => 1,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
            TimeUnit::Ps => "ps",
            TimeUnit::Fs => "fs",
        }
    }
}

/// A VCD timescale: magnitude 1, 10 or 100 of a [`TimeUnit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timescale {
    magnitude: u16,
    unit: TimeUnit,
}

impl Timescale {
    /// One nanosecond, the default timescale.
    pub const NS: Timescale = Timescale {
        magnitude: 1,
        unit: TimeUnit::Ns,
    };

    /// Creates a timescale. The magnitude must be 1, 10 or 100.
    pub fn new(magnitude: u16, unit: TimeUnit) -> Option<Self> {
        matches!(magnitude, 1 | 10 | 100).then_some(Self { magnitude, unit })
    }

    /// Returns the magnitude (1, 10 or 100).
    pub fn magnitude(&self) -> u16 {
        self.magnitude
    }

    /// Returns the unit.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Returns the duration of one tick of this timescale.
    pub fn period(&self) -> Period {
        Period::from_femtos(u64::from(self.magnitude) * self.unit.femtos())
    }

    /// Builds the converter from machine units with period `ref_period` to ticks of this timescale.
    pub fn rescaler(&self, ref_period: Period) -> Rescaler {
        Rescaler {
            numerator: ref_period.as_femtos(),
            denominator: self.period().as_femtos(),
        }
    }
}

impl Default for Timescale {
    fn default() -> Self {
        Timescale::NS
    }
}

impl fmt::Display for Timescale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit.suffix())
    }
}

/// Error returned when a timescale string cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Invalid timescale \"{0}\" (expected 1, 10 or 100 followed by s, ms, us, ns, ps or fs)")]
pub struct ParseTimescaleError(String);

impl FromStr for Timescale {
    type Err = ParseTimescaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimescaleError(s.to_string());
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(err)?;
        let (digits, unit) = trimmed.split_at(split);
        let magnitude: u16 = digits.parse().map_err(|_| err())?;
        let unit = match unit.trim() {
            "s" => TimeUnit::S,
            "ms" => TimeUnit::Ms,
            "us" => TimeUnit::Us,
            "ns" => TimeUnit::Ns,
            "ps" => TimeUnit::Ps,
            "fs" => TimeUnit::Fs,
            _ => return Err(err()),
        };
        Timescale::new(magnitude, unit).ok_or_else(err)
    }
}

impl Serialize for Timescale {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timescale {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Converts machine-unit timestamps into timescale ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rescaler {
    numerator: u64,
    denominator: u64,
}

impl Rescaler {
    /// Returns true if the conversion is the identity.
    pub fn is_identity(&self) -> bool {
        self.numerator == self.denominator
    }

    /// Rescales a timestamp, flooring toward negative infinity.
    ///
    /// Results outside the `SimTime` range saturate.
    pub fn apply(&self, time: SimTime) -> SimTime {
        if self.is_identity() {
            return time;
        }
        let scaled = (i128::from(time) * i128::from(self.numerator))
            .div_euclid(i128::from(self.denominator.max(1)));
        scaled.clamp(i128::from(SimTime::MIN), i128::from(SimTime::MAX)) as SimTime
    }
}
