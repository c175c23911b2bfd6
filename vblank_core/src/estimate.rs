// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pure vsync estimation.
//!
//! Everything here is a total function of its arguments: the monitor passes
//! its current reference point, period and bookkeeping by value and acts on
//! the result. This keeps the timing rules testable without a clock.
//!
//! The vsync grid is `reference + k * period` for every integer `k`.
//! [`estimate_last_vsync`] picks the latest grid point at or before `now`.

use crate::time::{Duration, HostTime};

/// Returns the most recent vsync on the grid anchored at `reference` that is
/// not after `now`.
///
/// The result `t` satisfies `t <= now`, `now - t < period` and
/// `(t - reference) % period == 0`. Elapsed periods are floored toward
/// negative infinity, so a `reference` in the future of `now` yields a grid
/// point one or more whole periods *before* `reference`, never `reference`
/// itself. Results before the clock epoch saturate to `HostTime(0)`.
///
/// # Panics
///
/// Panics if `period` is zero.
#[must_use]
pub fn estimate_last_vsync(now: HostTime, reference: HostTime, period: Duration) -> HostTime {
    assert!(!period.is_zero(), "vsync period must be non-zero");
    let period = i128::from(period.nanos());
    let reference = i128::from(reference.nanos());
    let elapsed = i128::from(now.nanos()) - reference;
    let last = reference + elapsed.div_euclid(period) * period;
    HostTime(u64::try_from(last).unwrap_or(0))
}

/// Returns the first vsync strictly after `now`.
#[must_use]
pub fn estimate_next_vsync(now: HostTime, reference: HostTime, period: Duration) -> HostTime {
    estimate_last_vsync(now, reference, period) + period
}

/// Decides whether a request arriving at `now` may be answered with a
/// synthetic vsync.
///
/// Two conditions must both hold: the monitor has been idle for at least two
/// periods since `last_fired_at`, and the estimated last pulse is no more
/// than half a period old (the next real pulse is still more than half a
/// period away).
#[must_use]
pub fn synthetic_eligible(
    now: HostTime,
    last_fired_at: HostTime,
    reference: HostTime,
    period: Duration,
) -> bool {
    if now.saturating_duration_since(last_fired_at) < period.saturating_add(period) {
        return false;
    }
    let since_pulse = now - estimate_last_vsync(now, reference, period);
    since_pulse <= period / 2
}

/// Where and when the timer fallback should fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FallbackPlan {
    /// Delay from the request time to the fire time.
    pub delay: Duration,
    /// Absolute fire time (`now + delay`); becomes the new last-posted time.
    pub fire_at: HostTime,
    /// Whether a full period was added to keep clear of the previous post.
    pub debounced: bool,
}

impl FallbackPlan {
    /// Returns the delay in whole milliseconds, truncating. Zero means the
    /// task should be posted for immediate execution.
    #[inline]
    #[must_use]
    pub const fn delay_millis(&self) -> u64 {
        self.delay.as_millis()
    }
}

/// Computes the timer-fallback delay for a request at `now`.
///
/// The target is the next estimated vsync. If that lands within half a
/// period of `last_posted_at` (the previous fallback fire time), one extra
/// period is added so two fallback callbacks never fire in quick succession.
///
/// # Panics
///
/// Panics if the undebounced delay falls outside `(0, period]`. The
/// estimator guarantees this range, so a violation means the period or the
/// clock reading is corrupt.
#[must_use]
pub fn fallback_plan(
    now: HostTime,
    reference: HostTime,
    period: Duration,
    last_posted_at: HostTime,
) -> FallbackPlan {
    let target = estimate_next_vsync(now, reference, period);
    let mut delay = target - now;
    assert!(
        !delay.is_zero() && delay <= period,
        "fallback delay {delay:?} outside (0, {period:?}]"
    );

    let debounced = now + delay <= last_posted_at.saturating_add(period / 2);
    if debounced {
        delay = delay + period;
    }

    FallbackPlan {
        delay,
        fire_at: now + delay,
        debounced,
    }
}
