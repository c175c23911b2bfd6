// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in microseconds.

use std::io::Write;

use vblank_core::time::{Duration, HostTime, NANOS_PER_MICRO};
use vblank_core::trace::{
    CallbackBeginEvent, CallbackEndEvent, RequestEvent, RequestOutcome, TraceSink, VSyncEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    /// Subtracted from every timestamp, so output starts near zero.
    origin: HostTime,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            origin: HostTime(0),
        }
    }

    /// Prints timestamps relative to `origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: HostTime) -> Self {
        self.origin = origin;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn us(&self, t: HostTime) -> f64 {
        nanos_to_us(t.saturating_duration_since(self.origin))
    }
}

fn nanos_to_us(d: Duration) -> f64 {
    d.nanos() as f64 / NANOS_PER_MICRO as f64
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_request(&mut self, e: &RequestEvent) {
        let at = self.us(e.now);
        let _ = match e.outcome {
            RequestOutcome::Ignored => {
                writeln!(self.writer, "[request] at {at:.1}µs ignored (in flight)")
            }
            RequestOutcome::Synthetic => {
                writeln!(self.writer, "[request] at {at:.1}µs synthetic")
            }
            RequestOutcome::Precise => writeln!(self.writer, "[request] at {at:.1}µs precise"),
            RequestOutcome::Timer { delay, debounced } => writeln!(
                self.writer,
                "[request] at {at:.1}µs timer delay={:.1}µs{}",
                nanos_to_us(delay),
                if debounced { " debounced" } else { "" },
            ),
        };
    }

    fn on_callback_begin(&mut self, e: &CallbackBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[begin] {} at {:.1}µs",
            e.path.span_name(),
            self.us(e.timestamp),
        );
    }

    fn on_callback_end(&mut self, e: &CallbackEndEvent) {
        let _ = writeln!(
            self.writer,
            "[end] {} at {:.1}µs",
            e.path.span_name(),
            self.us(e.timestamp),
        );
    }

    fn on_vsync(&mut self, e: &VSyncEvent) {
        let lag = e.fired_at.saturating_duration_since(e.pulse_time);
        let _ = writeln!(
            self.writer,
            "[vsync] {} pulse={:.1}µs lag={:.1}µs{}",
            e.path.span_name(),
            self.us(e.pulse_time),
            nanos_to_us(lag),
            if e.delivered { "" } else { " (no listener)" },
        );
    }
}
