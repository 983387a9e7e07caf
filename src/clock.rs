//! Ambient clock and timestamp resolution.
//!
//! The signal store never owns time. The calling environment (a simulated
//! hardware timeline) supplies the current time through the [`Clock`] trait and
//! every `push`/`pull` resolves its timestamp against it at call time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::{SignalError, SignalResult};
use crate::types::{Offset, SimTime};

/// Source of the current virtual time in machine units.
pub trait Clock: Send + Sync {
    /// Returns the current time of the simulated timeline.
    fn now_mu(&self) -> SimTime;
}

impl<F> Clock for F
where
    F: Fn() -> SimTime + Send + Sync,
{
    fn now_mu(&self) -> SimTime {
        self()
    }
}

/// A clock that is moved by hand.
///
/// Clones share the same cursor, so a test can keep one handle while a backend
/// holds another.
///
/// ```
/// use sigtrace::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// clock.advance(100);
/// clock.advance(-1);
/// assert_eq!(clock.now_mu(), 99);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock at the given time.
    pub fn starting_at(time: SimTime) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(time)),
        }
    }

    /// Moves the cursor to an absolute time.
    pub fn set(&self, time: SimTime) {
        self.now.store(time, Ordering::SeqCst);
    }

    /// Moves the cursor by `delta` machine units. Negative deltas move it back.
    pub fn advance(&self, delta: Offset) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_mu(&self) -> SimTime {
        self.now.load(Ordering::SeqCst)
    }
}

/// Resolves an optional explicit time plus offset into an absolute timestamp.
///
/// Without an explicit time the clock's current time is used. Overflow of
/// `time + offset` is reported as `TimestampOverflow`.
pub fn resolve_timestamp(
    clock: &dyn Clock,
    time: Option<SimTime>,
    offset: Offset,
) -> SignalResult<SimTime> {
    let time = time.unwrap_or_else(|| clock.now_mu());
    if offset == 0 {
        return Ok(time);
    }
    time.checked_add(offset)
        .ok_or(SignalError::TimestampOverflow { time, offset })
}
