// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Virtual clock.

use alloc::rc::Rc;
use core::cell::Cell;

use vblank_core::source::Clock;
use vblank_core::time::{Duration, HostTime};

/// A manually advanced clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    /// Creates a clock reading `start`.
    #[must_use]
    pub fn new(start: HostTime) -> Self {
        Self {
            now: Rc::new(Cell::new(start.nanos())),
        }
    }

    /// Moves the clock to `t`.
    ///
    /// # Panics
    ///
    /// Panics if `t` is before the current time.
    pub fn set(&self, t: HostTime) {
        assert!(
            t.nanos() >= self.now.get(),
            "simulated clock cannot go backwards ({t:?} < {:?})",
            HostTime(self.now.get())
        );
        self.now.set(t.nanos());
    }

    /// Moves the clock forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get() + d.nanos());
    }
}

impl Clock for SimClock {
    fn now(&self) -> HostTime {
        HostTime(self.now.get())
    }
}
