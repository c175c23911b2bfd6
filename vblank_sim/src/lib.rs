// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic virtual-time collaborators for `vblank_core`.
//!
//! [`Simulation`] owns a [`SimClock`], a [`SimTasks`] delayed-task queue and
//! a [`SimDisplay`] whose pulses follow a known [`VsyncGrid`]. Monitors built
//! from it run entirely in virtual time, so scheduling behaviour such as
//! debouncing or reference correction can be checked exactly.
//!
//! [`PhaseTracker`] grades recorded [`Delivery`]s against the true grid.

#![no_std]

extern crate alloc;

mod clock;
mod display;
mod grade;
mod simulation;
mod tasks;

pub use clock::SimClock;
pub use display::{SimDisplay, VsyncGrid};
pub use grade::{Delivery, PhaseReport, PhaseSample, PhaseTracker, SyncGrade, duration_ms};
pub use simulation::{DeliveryLog, Simulation};
pub use tasks::{PostRecord, SimTasks};
