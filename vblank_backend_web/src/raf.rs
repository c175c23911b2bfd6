// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `requestAnimationFrame` vsync source.
//!
//! [`RafSignal`] answers each
//! [`post_frame_callback`](PreciseSignalSource::post_frame_callback) on the
//! next animation frame. The browser's [`DOMHighResTimeStamp`][mdn] is the
//! frame's vsync time on the `performance.now()` timeline; it is converted to
//! nanosecond [`HostTime`].
//!
//! All callbacks registered before a frame share one
//! `requestAnimationFrame` registration.
//!
//! [mdn]: https://developer.mozilla.org/en-US/docs/Web/API/DOMHighResTimeStamp

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use vblank_core::source::{FrameCallback, PreciseSignalSource};
use vblank_core::time::HostTime;

use crate::ms_to_host_time;

// Direct global bindings instead of `web_sys::Window` methods: no Window
// lookup (and unwrap) on every frame.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    pub(crate) fn performance_now() -> f64;

    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);
}

type RafClosure = Closure<dyn FnMut(f64)>;

/// Callbacks waiting for the next frame. Once queued, a callback always runs
/// on the next frame; a monitor with a request in flight depends on it.
#[derive(Default)]
struct FrameQueue {
    waiting: RefCell<Vec<FrameCallback>>,
}

impl FrameQueue {
    fn push(&self, callback: FrameCallback) {
        self.waiting.borrow_mut().push(callback);
    }

    fn len(&self) -> usize {
        self.waiting.borrow().len()
    }

    /// Runs every queued callback with `vsync`. Callbacks queued while this
    /// runs wait for the following frame.
    fn run(&self, vsync: HostTime) -> usize {
        let due = core::mem::take(&mut *self.waiting.borrow_mut());
        let ran = due.len();
        for callback in due {
            callback(vsync);
        }
        ran
    }
}

struct RafInner {
    /// The JS closure registered with `requestAnimationFrame`, created once.
    closure: RefCell<Option<RafClosure>>,

    waiting: FrameQueue,

    /// The ID of the outstanding `requestAnimationFrame`, if any.
    raf_id: Cell<Option<i32>>,

    /// Frames delivered so far.
    frames: Cell<u64>,
}

impl RafInner {
    fn on_frame(&self, timestamp_ms: f64) {
        self.raf_id.set(None);
        self.frames.set(self.frames.get() + 1);
        // Callbacks usually register for the next frame from inside `run`;
        // `raf_id` is already clear, so they reschedule.
        self.waiting.run(ms_to_host_time(timestamp_ms));
    }

    fn schedule(&self) {
        if self.raf_id.get().is_some() {
            return;
        }
        if let Some(ref closure) = *self.closure.borrow() {
            let id = request_animation_frame(closure.as_ref().unchecked_ref());
            self.raf_id.set(Some(id));
        }
    }
}

/// A [`PreciseSignalSource`] driven by `requestAnimationFrame`.
///
/// Clones share the same registration, so one `RafSignal` can be handed to
/// a monitor while the app keeps another for inspection.
#[derive(Clone)]
pub struct RafSignal {
    inner: Rc<RafInner>,
}

impl RafSignal {
    /// Creates a signal source. Nothing is registered until the first
    /// callback is posted.
    #[must_use]
    pub fn new() -> Self {
        let inner = Rc::new(RafInner {
            closure: RefCell::new(None),
            waiting: FrameQueue::default(),
            raf_id: Cell::new(None),
            frames: Cell::new(0),
        });

        let weak = Rc::downgrade(&inner);
        let closure = Closure::wrap(Box::new(move |timestamp_ms: f64| {
            if let Some(inner) = weak.upgrade() {
                inner.on_frame(timestamp_ms);
            }
        }) as Box<dyn FnMut(f64)>);
        *inner.closure.borrow_mut() = Some(closure);

        Self { inner }
    }

    /// Returns the number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.waiting.len()
    }

    /// Returns the number of animation frames delivered so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.inner.frames.get()
    }
}

impl Default for RafSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl PreciseSignalSource for RafSignal {
    fn post_frame_callback(&self, callback: FrameCallback) {
        self.inner.waiting.push(callback);
        self.inner.schedule();
    }
}

impl Drop for RafInner {
    fn drop(&mut self) {
        if let Some(id) = self.raf_id.take() {
            cancel_animation_frame(id);
        }
        let dropped = self.waiting.len();
        if dropped > 0 {
            log::debug!("dropping {dropped} animation-frame callbacks with their source");
        }
    }
}

impl core::fmt::Debug for RafSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RafSignal")
            .field("pending", &self.pending())
            .field("frames", &self.frames())
            .field("registered", &self.inner.raf_id.get().is_some())
            .finish_non_exhaustive()
    }
}
