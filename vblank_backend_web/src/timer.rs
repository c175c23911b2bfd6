// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `setTimeout` delayed-task source.

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use vblank_core::source::{DelayedTaskSource, Task};

/// A [`DelayedTaskSource`] backed by `window.setTimeout`.
///
/// Each task becomes a one-shot JS closure that is freed after it runs.
/// Browsers clamp nested timeouts to a few milliseconds, so delays here are
/// lower bounds.
#[derive(Clone, Debug)]
pub struct TimeoutTasks {
    window: web_sys::Window,
}

impl TimeoutTasks {
    /// Creates a task source on the global `window`.
    ///
    /// Returns `None` outside a window context (e.g. in a worker).
    #[must_use]
    pub fn new() -> Option<Self> {
        web_sys::window().map(|window| Self { window })
    }

    fn set_timeout(&self, task: Task, delay_ms: i32) {
        let handler = Closure::once_into_js(task);
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                handler.unchecked_ref(),
                delay_ms,
            )
        {
            log::warn!("setTimeout({delay_ms}) failed, task dropped: {err:?}");
        }
    }
}

impl DelayedTaskSource for TimeoutTasks {
    fn post_now(&self, task: Task) {
        self.set_timeout(task, 0);
    }

    fn post_after(&self, task: Task, delay_ms: u64) {
        self.set_timeout(task, clamp_delay(delay_ms));
    }
}

/// `setTimeout` takes a signed 32-bit delay.
fn clamp_delay(delay_ms: u64) -> i32 {
    i32::try_from(delay_ms).unwrap_or(i32::MAX)
}
