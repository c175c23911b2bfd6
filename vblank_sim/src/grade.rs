// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Phase metrics and grading against a known vsync grid.

use alloc::string::String;

use vblank_core::time::{Duration, HostTime, NANOS_PER_MICRO, NANOS_PER_MILLI};
use vblank_core::trace::CallbackPath;

use crate::display::VsyncGrid;

/// One delivered notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Clock reading when the listener ran.
    pub fired_at: HostTime,
    /// Timestamp the listener received, in microseconds.
    pub vsync_time_us: u64,
}

/// Per-delivery metrics returned by [`PhaseTracker::observe`].
#[derive(Clone, Copy, Debug)]
pub struct PhaseSample {
    /// Signed distance from the reported timestamp to the nearest true
    /// pulse, in ms. Negative means the report precedes the pulse.
    pub phase_error_ms: f64,
    /// Time from the true pulse nearest the report to the listener running,
    /// in ms. Zero if the listener ran before that pulse.
    pub latency_ms: f64,
    /// Time since the previous delivery, in ms.
    pub frame_delta_ms: f64,
    /// The listener ran more than half a period after that pulse.
    pub late: bool,
}

/// Letter grade for vsync alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncGrade {
    /// Tight alignment and few late deliveries.
    A,
    /// Good alignment.
    B,
    /// Degraded but usable.
    C,
    /// Poor alignment.
    D,
}

impl SyncGrade {
    /// Returns a short label for printing.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`PhaseTracker::observe`].
#[derive(Clone, Copy, Debug)]
pub struct PhaseReport {
    /// Current grade.
    pub grade: SyncGrade,
    /// Metrics for this delivery.
    pub sample: PhaseSample,
    /// Late deliveries per 1000 observed.
    pub late_rate_per_1000: f64,
    /// Largest absolute phase error seen so far, in ms.
    pub worst_phase_error_ms: f64,
    /// Total deliveries observed.
    pub total: u64,
    /// Total late deliveries.
    pub late: u64,
}

/// Rolling alignment tracker with a fixed-size frame-delta history.
#[derive(Debug)]
pub struct PhaseTracker<const N: usize> {
    grid: VsyncGrid,
    deltas_ms: [f64; N],
    cursor: usize,
    previous: Option<HostTime>,
    worst_phase_error_ms: f64,
    total: u64,
    late: u64,
}

impl<const N: usize> PhaseTracker<N> {
    /// Creates a tracker measuring against `grid`, with the frame-delta
    /// history prefilled with one period.
    #[must_use]
    pub fn new(grid: VsyncGrid) -> Self {
        Self {
            grid,
            deltas_ms: [nanos_to_ms(grid.period.nanos()); N],
            cursor: 0,
            previous: None,
            worst_phase_error_ms: 0.0,
            total: 0,
            late: 0,
        }
    }

    /// Observes one delivery made on `path` and returns an updated report.
    #[must_use]
    pub fn observe(&mut self, path: CallbackPath, delivery: Delivery) -> PhaseReport {
        let reported = HostTime(delivery.vsync_time_us * NANOS_PER_MICRO);
        let nearest = self.grid.nearest_pulse(reported);
        let phase_error_ms = signed_ms(reported, nearest);

        let latency = delivery.fired_at.saturating_duration_since(nearest);
        let late = latency > self.grid.period / 2;

        let frame_delta = match self.previous {
            Some(previous) => delivery.fired_at.saturating_duration_since(previous),
            None => self.grid.period,
        };
        let frame_delta_ms = nanos_to_ms(frame_delta.nanos());
        self.previous = Some(delivery.fired_at);
        self.deltas_ms[self.cursor % N] = frame_delta_ms;
        self.cursor = (self.cursor + 1) % N;

        self.total = self.total.saturating_add(1);
        if late {
            self.late = self.late.saturating_add(1);
        }
        self.worst_phase_error_ms = self.worst_phase_error_ms.max(phase_error_ms.abs());

        let late_rate = self.late as f64 * 1000.0 / self.total as f64;
        let sample = PhaseSample {
            phase_error_ms,
            latency_ms: nanos_to_ms(latency.nanos()),
            frame_delta_ms,
            late,
        };

        PhaseReport {
            grade: grade_for(path, phase_error_ms.abs(), late_rate),
            sample,
            late_rate_per_1000: late_rate,
            worst_phase_error_ms: self.worst_phase_error_ms,
            total: self.total,
            late: self.late,
        }
    }

    /// Returns ring-buffer frame deltas oldest→newest.
    #[must_use]
    pub fn frame_deltas(&self) -> [f64; N] {
        let mut out = [0.0; N];
        let mut i = 0;
        while i < N {
            out[i] = self.deltas_ms[(self.cursor + i) % N];
            i += 1;
        }
        out
    }

    /// Returns an ASCII sparkline over `frame_deltas()`.
    #[must_use]
    pub fn sparkline_ascii(&self, min_ms: f64, max_ms: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let mut out = String::with_capacity(N);
        for v in self.frame_deltas() {
            let t = (v.clamp(min_ms, max_ms) - min_ms) / (max_ms - min_ms);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "index is clamped to ASCII level count"
            )]
            let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
            out.push(LEVELS[level] as char);
        }
        out
    }
}

fn grade_for(path: CallbackPath, phase_error_abs_ms: f64, late_per_1000: f64) -> SyncGrade {
    let (a_phase, b_phase, c_phase, a_late, b_late, c_late) = match path {
        CallbackPath::Precise => (0.5, 1.0, 2.0, 1.0, 5.0, 15.0),
        CallbackPath::Timer | CallbackPath::Synthetic => (1.5, 3.0, 6.0, 10.0, 30.0, 80.0),
    };

    if phase_error_abs_ms < a_phase && late_per_1000 < a_late {
        SyncGrade::A
    } else if phase_error_abs_ms < b_phase && late_per_1000 < b_late {
        SyncGrade::B
    } else if phase_error_abs_ms < c_phase && late_per_1000 < c_late {
        SyncGrade::C
    } else {
        SyncGrade::D
    }
}

fn nanos_to_ms(nanos: u64) -> f64 {
    nanos as f64 / NANOS_PER_MILLI as f64
}

fn signed_ms(t: HostTime, pulse: HostTime) -> f64 {
    if t >= pulse {
        nanos_to_ms((t - pulse).nanos())
    } else {
        -nanos_to_ms((pulse - t).nanos())
    }
}

/// Converts a duration to milliseconds for display.
#[must_use]
pub fn duration_ms(d: Duration) -> f64 {
    nanos_to_ms(d.nanos())
}
