// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Callback spans become `B`/`E` pairs named `VSync`, `VSyncTimer` or
//! `VSyncSynthetic`; requests and delivered pulses are instant events.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use vblank_core::time::{HostTime, NANOS_PER_MICRO};
use vblank_core::trace::RequestOutcome;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Timestamps are microseconds on the monitor's clock.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::Request(e) => {
                let (outcome, delay_us, debounced) = match e.outcome {
                    RequestOutcome::Ignored => ("ignored", None, false),
                    RequestOutcome::Synthetic => ("synthetic", None, false),
                    RequestOutcome::Precise => ("precise", None, false),
                    RequestOutcome::Timer { delay, debounced } => {
                        ("timer", Some(nanos_to_us(delay.nanos())), debounced)
                    }
                };
                events.push(json!({
                    "ph": "i",
                    "name": "RequestUpdate",
                    "cat": "Monitor",
                    "ts": host_us(e.now),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "outcome": outcome,
                        "delay_us": delay_us,
                        "debounced": debounced,
                    }
                }));
            }
            RecordedEvent::CallbackBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": e.path.span_name(),
                    "cat": "VSync",
                    "ts": host_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                }));
            }
            RecordedEvent::CallbackEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": e.path.span_name(),
                    "cat": "VSync",
                    "ts": host_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                }));
            }
            RecordedEvent::VSync(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Pulse",
                    "cat": "VSync",
                    "ts": host_us(e.pulse_time),
                    "pid": 0,
                    "tid": 1,
                    "s": "g",
                    "args": {
                        "path": format!("{:?}", e.path),
                        "fired_at_us": host_us(e.fired_at),
                        "delivered": e.delivered,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn host_us(t: HostTime) -> f64 {
    nanos_to_us(t.nanos())
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / NANOS_PER_MICRO as f64
}
