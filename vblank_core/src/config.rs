// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monitor configuration.

use crate::time::{Duration, NANOS_PER_SECOND};

/// Refresh rate assumed when the display reports a non-positive rate.
pub const DEFAULT_REFRESH_RATE_HZ: f32 = 60.0;

/// Longest period a configuration can produce. Rates below 1 Hz are clamped
/// to it.
pub const MAX_REFRESH_PERIOD: Duration = Duration(NANOS_PER_SECOND);

/// Configuration for a [`VSyncMonitor`](crate::monitor::VSyncMonitor).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonitorConfig {
    /// Display refresh rate as reported by the platform, in frames per
    /// second. Non-positive or non-finite values select
    /// [`DEFAULT_REFRESH_RATE_HZ`].
    pub refresh_rate_hz: f32,
    /// Whether a precise signal source may be used at all. Some call sites
    /// disable it deliberately and rely on timer estimates.
    pub allow_precise_signal: bool,
}

impl MonitorConfig {
    /// Configuration for the given refresh rate with precise signals allowed.
    #[must_use]
    pub const fn new(refresh_rate_hz: f32) -> Self {
        Self {
            refresh_rate_hz,
            allow_precise_signal: true,
        }
    }

    /// Configuration that never uses a precise signal source.
    #[must_use]
    pub const fn timer_only(refresh_rate_hz: f32) -> Self {
        Self {
            refresh_rate_hz,
            allow_precise_signal: false,
        }
    }

    /// Returns a copy with precise signals allowed or disallowed.
    #[must_use]
    pub const fn with_precise_signal(mut self, allow: bool) -> Self {
        self.allow_precise_signal = allow;
        self
    }

    /// Returns the refresh period for this configuration.
    #[must_use]
    pub fn period(&self) -> Duration {
        refresh_period(self.refresh_rate_hz)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_RATE_HZ)
    }
}

/// Converts a refresh rate to a period, rounded to the nearest nanosecond.
///
/// Rates that are not strictly positive and finite, or so large that the
/// period rounds to zero, use [`DEFAULT_REFRESH_RATE_HZ`]. Periods longer
/// than [`MAX_REFRESH_PERIOD`] are clamped to it.
#[must_use]
pub fn refresh_period(refresh_rate_hz: f32) -> Duration {
    let rate = if refresh_rate_hz.is_finite() && refresh_rate_hz > 0.0 {
        f64::from(refresh_rate_hz)
    } else {
        f64::from(DEFAULT_REFRESH_RATE_HZ)
    };
    #[expect(
        clippy::cast_possible_truncation,
        reason = "rate is positive and finite; oversized periods saturate before the clamp"
    )]
    let nanos = (NANOS_PER_SECOND as f64 / rate + 0.5) as u64;
    if nanos == 0 {
        return refresh_period(DEFAULT_REFRESH_RATE_HZ);
    }
    Duration(nanos.min(MAX_REFRESH_PERIOD.nanos()))
}
