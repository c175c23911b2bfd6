// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! POSIX backend for vblank.
//!
//! This crate provides the collaborators a timer-only
//! [`VSyncMonitor`](vblank_core::monitor::VSyncMonitor) needs on a desktop
//! host:
//!
//! - [`PosixClock`]: `clock_gettime` on a selectable clock, monotonic by
//!   default
//! - [`TaskLoop`]: a single-thread delayed-task loop; its [`TaskLoopHandle`]
//!   is the [`DelayedTaskSource`](vblank_core::source::DelayedTaskSource)
//!
//! There is no portable precise vsync signal here, so monitors built on this
//! backend always use the timer fallback.

mod event_loop;
mod time;

pub use event_loop::{TaskLoop, TaskLoopHandle};
pub use time::{PosixClock, now};
