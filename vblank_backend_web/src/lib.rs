// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web backend for vblank.
//!
//! This crate provides the collaborators a
//! [`VSyncMonitor`](vblank_core::monitor::VSyncMonitor) needs in a browser:
//!
//! - [`PerformanceClock`]: `performance.now()` in nanoseconds
//! - [`RafSignal`]: `requestAnimationFrame` as the precise vsync source
//! - [`TimeoutTasks`]: `setTimeout` as the delayed-task source

#![no_std]

extern crate alloc;

mod raf;
mod timer;

pub use raf::RafSignal;
pub use timer::TimeoutTasks;

use vblank_core::source::Clock;
use vblank_core::time::{HostTime, NANOS_PER_MILLI};

/// A [`Clock`] reading `performance.now()`.
///
/// `requestAnimationFrame` timestamps are on the same timeline, so
/// [`RafSignal`] pulses and this clock can be compared directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerformanceClock;

impl Clock for PerformanceClock {
    fn now(&self) -> HostTime {
        now()
    }
}

/// Returns the current host time from `performance.now()`, in nanoseconds.
#[must_use]
pub fn now() -> HostTime {
    ms_to_host_time(raf::performance_now())
}

/// Converts a `DOMHighResTimeStamp` (fractional milliseconds) to
/// [`HostTime`]. Negative and NaN inputs map to zero.
#[must_use]
pub fn ms_to_host_time(ms: f64) -> HostTime {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "float-to-int `as` saturates; ns since page load fits in u64"
    )]
    let ns = (ms * NANOS_PER_MILLI as f64) as u64;
    HostTime(ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_fractional_millis() {
        assert_eq!(ms_to_host_time(16.5), HostTime(16_500_000));
        assert_eq!(ms_to_host_time(0.25), HostTime(250_000));
    }

    #[test]
    fn invalid_timestamps_clamp_to_zero() {
        assert_eq!(ms_to_host_time(-4.0), HostTime(0));
        assert_eq!(ms_to_host_time(f64::NAN), HostTime(0));
    }
}
