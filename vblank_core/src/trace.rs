// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the vsync monitor.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! monitor calls at each stage. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! Each callback execution is bracketed by a [`CallbackBeginEvent`] /
//! [`CallbackEndEvent`] pair whose span name is
//! [`CallbackPath::span_name`].
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use alloc::rc::Rc;
use core::cell::RefCell;

use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which signal path produced a callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackPath {
    /// Precise platform vsync signal; carries a true pulse timestamp.
    Precise,
    /// Timer fallback; the fire time stands in for the pulse time.
    Timer,
    /// Immediate synthetic vsync after an idle period.
    Synthetic,
}

impl CallbackPath {
    /// Name of the scoped trace span around callbacks on this path.
    #[must_use]
    pub const fn span_name(self) -> &'static str {
        match self {
            Self::Precise => "VSync",
            Self::Timer => "VSyncTimer",
            Self::Synthetic => "VSyncSynthetic",
        }
    }
}

/// What the monitor did with a `request_update()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    /// A request was already in flight; nothing was scheduled.
    Ignored,
    /// An immediate synthetic vsync was posted.
    Synthetic,
    /// A one-shot callback was registered with the precise signal source.
    Precise,
    /// A timer fallback task was posted.
    Timer {
        /// Delay until the task should fire.
        delay: Duration,
        /// Whether the delay was extended by a period to keep clear of the
        /// previously posted fire time.
        debounced: bool,
    },
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted for every `request_update()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestEvent {
    /// Clock reading when the request arrived.
    pub now: HostTime,
    /// What the monitor scheduled.
    pub outcome: RequestOutcome,
}

/// Marks the beginning of a callback span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackBeginEvent {
    /// Which path fired.
    pub path: CallbackPath,
    /// Clock reading at the start of the callback.
    pub timestamp: HostTime,
}

/// Marks the end of a callback span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackEndEvent {
    /// Which path fired.
    pub path: CallbackPath,
    /// Clock reading at the end of the callback.
    pub timestamp: HostTime,
}

/// Emitted when a callback completes its bookkeeping, just before the
/// listener runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VSyncEvent {
    /// Which path fired.
    pub path: CallbackPath,
    /// Pulse time reported to the listener.
    pub pulse_time: HostTime,
    /// Clock reading when the callback ran.
    pub fired_at: HostTime,
    /// Whether a listener was registered to receive it.
    pub delivered: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the monitor.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called for every `request_update()`.
    fn on_request(&mut self, e: &RequestEvent) {
        _ = e;
    }

    /// Called when a callback starts running.
    fn on_callback_begin(&mut self, e: &CallbackBeginEvent) {
        _ = e;
    }

    /// Called when a callback has finished, after the listener returned.
    fn on_callback_end(&mut self, e: &CallbackEndEvent) {
        _ = e;
    }

    /// Called with the vsync about to be delivered.
    fn on_vsync(&mut self, e: &VSyncEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

/// Lets the caller keep a handle to a sink installed on a monitor and read
/// it back afterwards.
impl<T: TraceSink + ?Sized> TraceSink for Rc<RefCell<T>> {
    fn on_request(&mut self, e: &RequestEvent) {
        self.borrow_mut().on_request(e);
    }

    fn on_callback_begin(&mut self, e: &CallbackBeginEvent) {
        self.borrow_mut().on_callback_begin(e);
    }

    fn on_callback_end(&mut self, e: &CallbackEndEvent) {
        self.borrow_mut().on_callback_end(e);
    }

    fn on_vsync(&mut self, e: &VSyncEvent) {
        self.borrow_mut().on_vsync(e);
    }
}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`RequestEvent`].
    #[inline]
    pub fn request(&mut self, e: &RequestEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_request(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CallbackBeginEvent`].
    #[inline]
    pub fn callback_begin(&mut self, e: &CallbackBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_callback_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CallbackEndEvent`].
    #[inline]
    pub fn callback_end(&mut self, e: &CallbackEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_callback_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`VSyncEvent`].
    #[inline]
    pub fn vsync(&mut self, e: &VSyncEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_vsync(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
