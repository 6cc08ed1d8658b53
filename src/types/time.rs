//! Simulated-time instants.
//!
//! Simulated time is a millisecond counter owned by a clock. It starts at the
//! clock's epoch, never runs backwards, and only moves when a driver advances
//! it. Millisecond resolution matches the coarsest unit the scheduling
//! surfaces accept; sub-millisecond durations round up so that a non-zero
//! delay always lands strictly after "now".

use std::fmt;
use std::ops::Add;
use std::time::Duration;

/// Converts a real [`Duration`] to whole simulated milliseconds, rounding up.
///
/// Rounding up keeps the invariant that any non-zero duration maps to at
/// least one millisecond of simulated time.
#[inline]
#[must_use]
pub(crate) fn duration_to_millis_ceil(duration: Duration) -> u64 {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    millis.min(u128::from(u64::MAX)) as u64
}

/// An instant on a virtual clock's timeline.
///
/// In production code this would correspond to a monotonic reading; under a
/// [`VirtualClock`](crate::clock::VirtualClock) it is simply the number of
/// simulated milliseconds since the clock's epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    /// The zero instant (epoch).
    pub const ZERO: Self = Self(0);

    /// The maximum representable instant.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a new instant from milliseconds since epoch.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Creates a new instant from seconds since epoch.
    #[inline]
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000))
    }

    /// Returns the instant as milliseconds since epoch.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns the instant as seconds since epoch (truncated).
    #[inline]
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0 / 1_000
    }

    /// Adds a number of milliseconds, saturating on overflow.
    #[inline]
    #[must_use]
    pub const fn saturating_add_millis(self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Subtracts a number of milliseconds, saturating at zero.
    #[inline]
    #[must_use]
    pub const fn saturating_sub_millis(self, millis: u64) -> Self {
        Self(self.0.saturating_sub(millis))
    }

    /// Returns the elapsed milliseconds between two instants.
    ///
    /// Returns 0 if `self` is before `earlier`.
    #[inline]
    #[must_use]
    pub const fn duration_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns the later of two instants.
    #[inline]
    #[must_use]
    pub const fn max(self, other: Self) -> Self {
        if self.0 >= other.0 { self } else { other }
    }
}

impl Add<Duration> for SimTime {
    type Output = Self;

    /// Adds a real duration, rounding sub-millisecond components up and
    /// saturating on overflow.
    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add_millis(duration_to_millis_ceil(rhs))
    }
}

impl fmt::Debug for SimTime {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimTime({}ms)", self.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000 {
            write!(f, "{}.{:03}s", self.0 / 1_000, self.0 % 1_000)
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(SimTime::from_secs(1).as_millis(), 1_000);
        assert_eq!(SimTime::from_millis(1).as_millis(), 1);
        assert_eq!(SimTime::from_millis(1_500).as_secs(), 1);
        assert_eq!(SimTime::ZERO.as_millis(), 0);
    }

    #[test]
    fn arithmetic_saturates() {
        let t1 = SimTime::from_secs(1);
        let t2 = t1.saturating_add_millis(500);
        assert_eq!(t2.as_millis(), 1_500);

        let t3 = t2.saturating_sub_millis(2_000);
        assert_eq!(t3, SimTime::ZERO);

        assert_eq!(SimTime::MAX.saturating_add_millis(1), SimTime::MAX);
        assert_eq!(SimTime::from_secs(u64::MAX), SimTime::MAX);
    }

    #[test]
    fn ordering() {
        assert!(SimTime::from_secs(1) < SimTime::from_secs(2));
        assert!(SimTime::from_millis(1_000) == SimTime::from_secs(1));
        assert_eq!(
            SimTime::from_millis(5).max(SimTime::from_millis(3)),
            SimTime::from_millis(5)
        );
        assert_eq!(
            SimTime::from_millis(3).max(SimTime::from_millis(5)),
            SimTime::from_millis(5)
        );
    }

    #[test]
    fn duration_since_floors_at_zero() {
        let early = SimTime::from_millis(100);
        let late = SimTime::from_millis(350);
        assert_eq!(late.duration_since(early), 250);
        assert_eq!(early.duration_since(late), 0);
    }

    #[test]
    fn add_duration_rounds_up() {
        let t = SimTime::from_millis(10);
        assert_eq!((t + Duration::from_millis(5)).as_millis(), 15);
        assert_eq!((t + Duration::from_micros(1)).as_millis(), 11);
        assert_eq!((t + Duration::from_nanos(999_999)).as_millis(), 11);
        assert_eq!((t + Duration::ZERO).as_millis(), 10);
    }

    #[test]
    fn millis_ceil_helper() {
        assert_eq!(duration_to_millis_ceil(Duration::ZERO), 0);
        assert_eq!(duration_to_millis_ceil(Duration::from_nanos(1)), 1);
        assert_eq!(duration_to_millis_ceil(Duration::from_micros(999)), 1);
        assert_eq!(duration_to_millis_ceil(Duration::from_millis(1)), 1);
        assert_eq!(duration_to_millis_ceil(Duration::from_micros(1_001)), 2);
        assert_eq!(duration_to_millis_ceil(Duration::from_secs(2)), 2_000);
        assert_eq!(duration_to_millis_ceil(Duration::MAX), u64::MAX);
    }

    #[test]
    fn display_tiers() {
        assert_eq!(format!("{}", SimTime::from_millis(0)), "0ms");
        assert_eq!(format!("{}", SimTime::from_millis(999)), "999ms");
        assert_eq!(format!("{}", SimTime::from_millis(1_000)), "1.000s");
        assert_eq!(format!("{}", SimTime::from_millis(2_500)), "2.500s");
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", SimTime::from_millis(100)), "SimTime(100ms)");
    }
}
