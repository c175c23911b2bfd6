// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vsync estimation and one-shot notification scheduling.
//!
//! `vblank_core` tells a single client when a display's vertical-sync pulse
//! has just occurred, so rendering can start right after a pulse. It is
//! `no_std` compatible (with `alloc`) and reaches the platform only through
//! the traits in [`source`].
//!
//! # Architecture
//!
//! ```text
//!   request_update()
//!        │
//!        ▼
//!   idle ≥ 2 periods and last pulse recent? ──yes──► post_now(synthetic)
//!        │ no                                              │
//!        ▼                                                 │
//!   precise source selected? ──yes──► post_frame_callback  │
//!        │ no                              │               │
//!        ▼                                 │               │
//!   post_after(delay to next pulse)        │               │
//!        │                                 │               │
//!        └──────────────► on_callback ◄────┴───────────────┘
//!                              │
//!                              ▼
//!               VSyncListener::on_vsync(monitor, µs)
//! ```
//!
//! **[`monitor`]**: [`VSyncMonitor`](monitor::VSyncMonitor): at most one
//! request in flight, signal-path selection, reference-point correction.
//!
//! **[`estimate`]**: Pure functions: last/next pulse on the vsync grid,
//! synthetic eligibility, timer-fallback delay with debounce.
//!
//! **[`source`]**: [`Clock`](source::Clock),
//! [`DelayedTaskSource`](source::DelayedTaskSource) and
//! [`PreciseSignalSource`](source::PreciseSignalSource) contracts that
//! backends implement.
//!
//! **[`config`]**: [`MonitorConfig`](config::MonitorConfig) and refresh
//! rate to period conversion.
//!
//! **[`time`]**: Nanosecond [`HostTime`](time::HostTime) and
//! [`Duration`](time::Duration).
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types,
//! with zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Logging
//!
//! The crate logs through the [`log`] facade: construction and synthetic or
//! debounced posts at `debug`, every request and delivery at `trace`.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod config;
pub mod estimate;
pub mod monitor;
pub mod source;
pub mod time;
pub mod trace;
