// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated display with a true vsync grid.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use vblank_core::estimate::{estimate_last_vsync, estimate_next_vsync};
use vblank_core::source::{Clock, FrameCallback, PreciseSignalSource};
use vblank_core::time::{Duration, HostTime};

use crate::clock::SimClock;

/// The display's real pulse train: `phase + k * period`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VsyncGrid {
    /// Any instant at which a pulse occurred.
    pub phase: HostTime,
    /// Interval between pulses.
    pub period: Duration,
}

impl VsyncGrid {
    /// Returns the latest pulse at or before `t`.
    #[must_use]
    pub fn pulse_at_or_before(&self, t: HostTime) -> HostTime {
        estimate_last_vsync(t, self.phase, self.period)
    }

    /// Returns the first pulse strictly after `t`.
    #[must_use]
    pub fn pulse_after(&self, t: HostTime) -> HostTime {
        estimate_next_vsync(t, self.phase, self.period)
    }

    /// Returns the pulse closest to `t`.
    #[must_use]
    pub fn nearest_pulse(&self, t: HostTime) -> HostTime {
        let before = self.pulse_at_or_before(t);
        let after = before + self.period;
        if t - before <= after - t {
            before
        } else {
            after
        }
    }
}

struct Registered {
    pulse: HostTime,
    callback: FrameCallback,
}

/// A [`PreciseSignalSource`] backed by a [`VsyncGrid`].
///
/// A callback registered at time `t` is delivered `latency` after the first
/// grid pulse strictly after `t`, with that pulse's timestamp. Clones share
/// the same registrations.
#[derive(Clone)]
pub struct SimDisplay {
    clock: SimClock,
    grid: VsyncGrid,
    latency: Duration,
    registered: Rc<RefCell<Vec<Registered>>>,
}

impl fmt::Debug for SimDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimDisplay")
            .field("grid", &self.grid)
            .field("latency", &self.latency)
            .field("registered", &self.registered.borrow().len())
            .finish_non_exhaustive()
    }
}

impl SimDisplay {
    /// Creates a display pulsing on `grid`.
    #[must_use]
    pub fn new(clock: SimClock, grid: VsyncGrid) -> Self {
        Self {
            clock,
            grid,
            latency: Duration::ZERO,
            registered: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Sets the delay between a pulse and its callback delivery.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns the true pulse grid.
    #[must_use]
    pub fn grid(&self) -> VsyncGrid {
        self.grid
    }

    /// Returns the number of callbacks waiting for a pulse.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.registered.borrow().len()
    }

    /// Returns when the earliest registered callback will be delivered.
    #[must_use]
    pub fn next_delivery(&self) -> Option<HostTime> {
        self.registered
            .borrow()
            .iter()
            .map(|r| r.pulse + self.latency)
            .min()
    }

    /// Delivers every callback whose delivery time has been reached.
    ///
    /// Returns the number delivered. Callbacks registered while delivering
    /// wait for a later pulse.
    pub fn deliver_due(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<Registered> = {
            let mut registered = self.registered.borrow_mut();
            let (due, waiting) = registered
                .drain(..)
                .partition(|r| r.pulse + self.latency <= now);
            *registered = waiting;
            due
        };
        let count = due.len();
        for r in due {
            (r.callback)(r.pulse);
        }
        count
    }
}

impl PreciseSignalSource for SimDisplay {
    fn post_frame_callback(&self, callback: FrameCallback) {
        let pulse = self.grid.pulse_after(self.clock.now());
        self.registered
            .borrow_mut()
            .push(Registered { pulse, callback });
    }
}
