// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator contracts for platform integrations.
//!
//! The monitor never talks to the platform directly. Backend crates provide
//! the following pieces:
//!
//! - **Clock**: [`Clock::now`] reads the monotonic clock in nanoseconds.
//!   Every timestamp handed to the monitor, including precise pulse times,
//!   must come from this clock's domain.
//!
//! - **Delayed tasks**: [`DelayedTaskSource`] runs a closure "now" (after
//!   the current call stack unwinds) or after a whole number of
//!   milliseconds. Every platform has one, so it is required.
//!
//! - **Precise signal**: [`PreciseSignalSource`] runs a one-shot closure
//!   near the true vsync with the pulse timestamp (e.g. Android
//!   `Choreographer`, browser `requestAnimationFrame`). It is optional; the
//!   monitor falls back to timer estimates without it.
//!
//! # Threading
//!
//! All three are driven from the single thread that owns the monitor. Tasks
//! are plain `FnOnce()` closures with no `Send` bound; a source must run
//! them on the thread that posted them and never re-entrantly from inside
//! the `post_*` call.
//!
//! # Crate boundaries
//!
//! `vblank_core` owns estimation, request coordination and these traits.
//! Backend crates depend on `vblank_core` and provide platform glue.
//! `vblank_sim` provides virtual-time implementations for tests.

use alloc::boxed::Box;
use alloc::rc::Rc;

use crate::time::HostTime;

/// A unit of deferred work posted to a [`DelayedTaskSource`].
pub type Task = Box<dyn FnOnce()>;

/// A one-shot callback registered with a [`PreciseSignalSource`]. Receives
/// the pulse timestamp.
pub type FrameCallback = Box<dyn FnOnce(HostTime)>;

/// Monotonic nanosecond time source.
pub trait Clock {
    /// Returns the current monotonic time.
    fn now(&self) -> HostTime;
}

/// Generic one-shot task posting with millisecond granularity.
pub trait DelayedTaskSource {
    /// Runs `task` as soon as possible, after the caller returns.
    fn post_now(&self, task: Task);

    /// Runs `task` no earlier than `delay_ms` milliseconds from now.
    ///
    /// The monitor only calls this with `delay_ms > 0`.
    fn post_after(&self, task: Task, delay_ms: u64);
}

/// Platform facility delivering one-shot callbacks tied to actual vsync.
pub trait PreciseSignalSource {
    /// Registers `callback` to run once, near the next vsync, with that
    /// pulse's timestamp.
    fn post_frame_callback(&self, callback: FrameCallback);
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> HostTime {
        (**self).now()
    }
}

impl<T: DelayedTaskSource + ?Sized> DelayedTaskSource for Rc<T> {
    fn post_now(&self, task: Task) {
        (**self).post_now(task);
    }

    fn post_after(&self, task: Task, delay_ms: u64) {
        (**self).post_after(task, delay_ms);
    }
}

impl<P: PreciseSignalSource + ?Sized> PreciseSignalSource for Rc<P> {
    fn post_frame_callback(&self, callback: FrameCallback) {
        (**self).post_frame_callback(callback);
    }
}
