// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use vblank_core::time::{Duration, HostTime};
use vblank_core::trace::{
    CallbackBeginEvent, CallbackEndEvent, CallbackPath, RequestEvent, RequestOutcome, TraceSink,
    VSyncEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_REQUEST: u8 = 1;
const TAG_CALLBACK_BEGIN: u8 = 2;
const TAG_CALLBACK_END: u8 = 3;
const TAG_VSYNC: u8 = 4;

const OUTCOME_IGNORED: u8 = 0;
const OUTCOME_SYNTHETIC: u8 = 1;
const OUTCOME_PRECISE: u8 = 2;
const OUTCOME_TIMER: u8 = 3;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_path(&mut self, p: CallbackPath) {
        self.write_u8(match p {
            CallbackPath::Precise => 0,
            CallbackPath::Timer => 1,
            CallbackPath::Synthetic => 2,
        });
    }

    /// Outcome kind, delay and debounce flag; the last two are zero unless
    /// the outcome is a timer post.
    fn write_outcome(&mut self, o: RequestOutcome) {
        let (kind, delay, debounced) = match o {
            RequestOutcome::Ignored => (OUTCOME_IGNORED, 0, false),
            RequestOutcome::Synthetic => (OUTCOME_SYNTHETIC, 0, false),
            RequestOutcome::Precise => (OUTCOME_PRECISE, 0, false),
            RequestOutcome::Timer { delay, debounced } => {
                (OUTCOME_TIMER, delay.nanos(), debounced)
            }
        };
        self.write_u8(kind);
        self.write_u64(delay);
        self.write_bool(debounced);
    }
}

impl TraceSink for RecorderSink {
    fn on_request(&mut self, e: &RequestEvent) {
        self.write_u8(TAG_REQUEST);
        self.write_u64(e.now.nanos());
        self.write_outcome(e.outcome);
    }

    fn on_callback_begin(&mut self, e: &CallbackBeginEvent) {
        self.write_u8(TAG_CALLBACK_BEGIN);
        self.write_path(e.path);
        self.write_u64(e.timestamp.nanos());
    }

    fn on_callback_end(&mut self, e: &CallbackEndEvent) {
        self.write_u8(TAG_CALLBACK_END);
        self.write_path(e.path);
        self.write_u64(e.timestamp.nanos());
    }

    fn on_vsync(&mut self, e: &VSyncEvent) {
        self.write_u8(TAG_VSYNC);
        self.write_path(e.path);
        self.write_u64(e.pulse_time.nanos());
        self.write_u64(e.fired_at.nanos());
        self.write_bool(e.delivered);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`RequestEvent`].
    Request(RequestEvent),
    /// A [`CallbackBeginEvent`].
    CallbackBegin(CallbackBeginEvent),
    /// A [`CallbackEndEvent`].
    CallbackEnd(CallbackEndEvent),
    /// A [`VSyncEvent`].
    VSync(VSyncEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|v| v != 0)
    }

    fn read_path(&mut self) -> Option<CallbackPath> {
        Some(match self.read_u8()? {
            0 => CallbackPath::Precise,
            1 => CallbackPath::Timer,
            _ => CallbackPath::Synthetic,
        })
    }

    fn read_outcome(&mut self) -> Option<RequestOutcome> {
        let kind = self.read_u8()?;
        let delay = Duration(self.read_u64()?);
        let debounced = self.read_bool()?;
        Some(match kind {
            OUTCOME_IGNORED => RequestOutcome::Ignored,
            OUTCOME_SYNTHETIC => RequestOutcome::Synthetic,
            OUTCOME_PRECISE => RequestOutcome::Precise,
            _ => RequestOutcome::Timer { delay, debounced },
        })
    }

    fn decode_request(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Request(RequestEvent {
            now: self.read_time()?,
            outcome: self.read_outcome()?,
        }))
    }

    fn decode_callback_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::CallbackBegin(CallbackBeginEvent {
            path: self.read_path()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_callback_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::CallbackEnd(CallbackEndEvent {
            path: self.read_path()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_vsync(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::VSync(VSyncEvent {
            path: self.read_path()?,
            pulse_time: self.read_time()?,
            fired_at: self.read_time()?,
            delivered: self.read_bool()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_REQUEST => self.decode_request(),
            TAG_CALLBACK_BEGIN => self.decode_callback_begin(),
            TAG_CALLBACK_END => self.decode_callback_end(),
            TAG_VSYNC => self.decode_vsync(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
