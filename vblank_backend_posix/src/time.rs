// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host clock reads.

use rustix::time::{ClockId, Timespec, clock_gettime};
use vblank_core::source::Clock;
use vblank_core::time::{HostTime, NANOS_PER_SECOND};

/// A [`Clock`] reading a POSIX clock through `clock_gettime`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PosixClock {
    id: ClockId,
}

impl Default for PosixClock {
    fn default() -> Self {
        Self::monotonic()
    }
}

impl PosixClock {
    /// `CLOCK_MONOTONIC`, the clock Android's `System.nanoTime` and most
    /// compositors report vsync on.
    #[must_use]
    pub const fn monotonic() -> Self {
        Self {
            id: ClockId::Monotonic,
        }
    }

    /// A specific clock, e.g. one a compositor advertises for presentation
    /// timestamps.
    #[must_use]
    pub const fn with_id(id: ClockId) -> Self {
        Self { id }
    }

    /// Returns the underlying clock id.
    #[must_use]
    pub const fn id(self) -> ClockId {
        self.id
    }
}

impl Clock for PosixClock {
    fn now(&self) -> HostTime {
        timespec_to_host_time(clock_gettime(self.id))
    }
}

/// Returns the current monotonic host time in nanoseconds.
#[must_use]
pub fn now() -> HostTime {
    PosixClock::monotonic().now()
}

fn timespec_to_host_time(timespec: Timespec) -> HostTime {
    let seconds = u64::try_from(timespec.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(timespec.tv_nsec)
        .unwrap_or(0)
        .min(NANOS_PER_SECOND - 1);

    let ticks = u128::from(seconds)
        .saturating_mul(u128::from(NANOS_PER_SECOND))
        .saturating_add(u128::from(nanos));
    HostTime(u64::try_from(ticks).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::{PosixClock, now, timespec_to_host_time};
    use rustix::time::{ClockId, Timespec};
    use vblank_core::source::Clock;
    use vblank_core::time::HostTime;

    #[test]
    fn now_is_monotonic_non_decreasing() {
        let first = now();
        let second = now();
        assert!(second >= first, "monotonic clock should not go backwards");
    }

    #[test]
    fn explicit_clock_id_is_usable() {
        let clock = PosixClock::with_id(ClockId::Monotonic);
        assert_eq!(clock, PosixClock::default());
        assert!(clock.now().nanos() > 0, "monotonic clock should be positive");
    }

    #[test]
    fn timespec_conversion_builds_nanoseconds() {
        let input = Timespec {
            tv_sec: 12,
            tv_nsec: 345_678_901,
        };
        assert_eq!(
            timespec_to_host_time(input),
            HostTime(12 * 1_000_000_000 + 345_678_901)
        );
    }

    #[test]
    fn timespec_conversion_saturates_on_large_values() {
        let input = Timespec {
            tv_sec: i64::MAX,
            tv_nsec: 999_999_999,
        };
        assert_eq!(timespec_to_host_time(input), HostTime(u64::MAX));
    }

    #[test]
    fn negative_timespec_clamps_to_zero() {
        let input = Timespec {
            tv_sec: -3,
            tv_nsec: -5,
        };
        assert_eq!(timespec_to_host_time(input), HostTime(0));
    }
}
