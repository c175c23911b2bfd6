// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot vsync notifications.
//!
//! [`VSyncMonitor`] tells a single [`VSyncListener`] when the display's
//! vsync pulse has (approximately) just occurred. Each
//! [`request_update`](VSyncMonitor::request_update) produces at most one
//! `on_vsync` call; the listener typically requests again from inside it.
//!
//! # Signal paths
//!
//! A request is answered by exactly one of:
//!
//! - **Synthetic**: After two or more idle periods, if the estimated last
//!   pulse is at most half a period old, an immediate task reports that
//!   estimated pulse. This removes up to a frame of latency when rendering
//!   resumes.
//! - **Precise**: The platform's [`PreciseSignalSource`] reports the true
//!   pulse time. Every precise pulse becomes the new reference point, which
//!   keeps timer estimates from drifting.
//! - **Timer**: Without a precise source, a delayed task is posted for the
//!   next estimated pulse on the grid `reference + k * period`, pushed back
//!   one period if it would land within half a period of the previously
//!   posted fire time.
//!
//! The precise-or-timer choice is made once, at construction.
//!
//! # Threading
//!
//! The monitor is `!Send` and `!Sync`. It, its listener and all three
//! collaborators live on one thread. Posted closures hold a weak handle, so
//! a callback arriving after the monitor is dropped is discarded.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::config::MonitorConfig;
use crate::estimate::{estimate_last_vsync, fallback_plan, synthetic_eligible};
use crate::source::{Clock, DelayedTaskSource, PreciseSignalSource, Task};
use crate::time::{Duration, HostTime};
use crate::trace::{
    CallbackBeginEvent, CallbackEndEvent, CallbackPath, RequestEvent, RequestOutcome, TraceSink,
    Tracer, VSyncEvent,
};

/// Receives vsync notifications.
///
/// Closures `FnMut(&VSyncMonitor, u64)` implement this trait.
pub trait VSyncListener {
    /// Called very soon after the start of the display's vertical sync
    /// period.
    ///
    /// `vsync_time_us` is the pulse time in microseconds on the monitor's
    /// clock. Calling [`VSyncMonitor::request_update`] from here schedules
    /// the next notification.
    fn on_vsync(&mut self, monitor: &VSyncMonitor, vsync_time_us: u64);
}

impl<F: FnMut(&VSyncMonitor, u64)> VSyncListener for F {
    fn on_vsync(&mut self, monitor: &VSyncMonitor, vsync_time_us: u64) {
        self(monitor, vsync_time_us);
    }
}

/// How real (non-synthetic) pulses are obtained.
enum PulsePath {
    Precise(Box<dyn PreciseSignalSource>),
    Timer,
}

struct Inner {
    period: Duration,
    clock: Box<dyn Clock>,
    tasks: Box<dyn DelayedTaskSource>,
    path: PulsePath,

    in_flight: Cell<bool>,
    /// A time assumed to coincide with a real vsync.
    reference: Cell<HostTime>,
    last_fired_at: Cell<HostTime>,
    last_posted_at: Cell<HostTime>,

    listener: RefCell<Option<Box<dyn VSyncListener>>>,
    /// Bumped by every `set_listener` / `clear_listener`, so a listener
    /// replaced from inside its own callback is not restored afterwards.
    listener_epoch: Cell<u64>,
    trace_sink: RefCell<Option<Box<dyn TraceSink>>>,
}

impl Inner {
    fn trace(&self, emit: impl FnOnce(&mut Tracer<'_>)) {
        let mut sink = self.trace_sink.borrow_mut();
        let mut tracer = match sink.as_mut() {
            Some(sink) => Tracer::new(&mut **sink),
            None => Tracer::none(),
        };
        emit(&mut tracer);
    }
}

/// Notifies a single listener of approximate vsync pulses.
///
/// See the [module docs](self) for the scheduling rules.
///
/// # Usage
///
/// ```rust,ignore
/// let monitor = VSyncMonitor::with_precise_signal(
///     MonitorConfig::new(display.refresh_rate()),
///     clock,
///     tasks,
///     frame_callbacks,
/// );
/// monitor.set_listener(|monitor: &VSyncMonitor, vsync_us: u64| {
///     render_frame(vsync_us);
///     monitor.request_update();
/// });
/// monitor.request_update();
/// ```
pub struct VSyncMonitor {
    inner: Rc<Inner>,
}

impl VSyncMonitor {
    /// Creates a monitor that estimates pulses with timers only.
    pub fn new(
        config: MonitorConfig,
        clock: impl Clock + 'static,
        tasks: impl DelayedTaskSource + 'static,
    ) -> Self {
        Self::build(config, Box::new(clock), Box::new(tasks), None)
    }

    /// Creates a monitor that uses `precise` for real pulses, unless
    /// `config.allow_precise_signal` is `false`, in which case `precise` is
    /// dropped and timers are used.
    pub fn with_precise_signal(
        config: MonitorConfig,
        clock: impl Clock + 'static,
        tasks: impl DelayedTaskSource + 'static,
        precise: impl PreciseSignalSource + 'static,
    ) -> Self {
        Self::build(
            config,
            Box::new(clock),
            Box::new(tasks),
            Some(Box::new(precise)),
        )
    }

    /// Creates a monitor from already-boxed collaborators.
    ///
    /// This is the general form of [`new`](Self::new) and
    /// [`with_precise_signal`](Self::with_precise_signal) for callers that
    /// only know at runtime whether a precise source exists.
    #[must_use]
    pub fn from_parts(
        config: MonitorConfig,
        clock: Box<dyn Clock>,
        tasks: Box<dyn DelayedTaskSource>,
        precise: Option<Box<dyn PreciseSignalSource>>,
    ) -> Self {
        Self::build(config, clock, tasks, precise)
    }

    fn build(
        config: MonitorConfig,
        clock: Box<dyn Clock>,
        tasks: Box<dyn DelayedTaskSource>,
        precise: Option<Box<dyn PreciseSignalSource>>,
    ) -> Self {
        let period = config.period();
        let path = match precise {
            Some(source) if config.allow_precise_signal => PulsePath::Precise(source),
            _ => PulsePath::Timer,
        };
        let reference = clock.now();
        log::debug!(
            "vsync monitor: period {}ns ({} Hz requested), {} signal",
            period.nanos(),
            config.refresh_rate_hz,
            match path {
                PulsePath::Precise(_) => "precise",
                PulsePath::Timer => "timer",
            }
        );

        Self {
            inner: Rc::new(Inner {
                period,
                clock,
                tasks,
                path,
                in_flight: Cell::new(false),
                reference: Cell::new(reference),
                last_fired_at: Cell::new(HostTime(0)),
                last_posted_at: Cell::new(HostTime(0)),
                listener: RefCell::new(None),
                listener_epoch: Cell::new(0),
                trace_sink: RefCell::new(None),
            }),
        }
    }

    /// Requests a notification for the closest upcoming vsync.
    ///
    /// While a request is in flight further calls are ignored; exactly one
    /// notification results.
    pub fn request_update(&self) {
        let inner = &*self.inner;
        let now = inner.clock.now();

        if inner.in_flight.get() {
            log::trace!("vsync request at {now:?} ignored: already in flight");
            inner.trace(|t| {
                t.request(&RequestEvent {
                    now,
                    outcome: RequestOutcome::Ignored,
                });
            });
            return;
        }
        inner.in_flight.set(true);

        let outcome = if self.post_synthetic(now) {
            RequestOutcome::Synthetic
        } else {
            match &inner.path {
                PulsePath::Precise(source) => {
                    source.post_frame_callback(Box::new(self.precise_callback()));
                    RequestOutcome::Precise
                }
                PulsePath::Timer => self.post_timer(now),
            }
        };

        log::trace!("vsync request at {now:?}: {outcome:?}");
        inner.trace(|t| t.request(&RequestEvent { now, outcome }));
    }

    /// Sets the best guess of a past instant at which a vsync occurred.
    ///
    /// Intended for platforms without a precise signal. The value is stored
    /// verbatim; a value in the future of the clock is allowed and handled
    /// by the estimator's floor division.
    pub fn set_reference_point(&self, reference: HostTime) {
        self.inner.reference.set(reference);
    }

    /// Returns the current reference point.
    #[must_use]
    pub fn reference_point(&self) -> HostTime {
        self.inner.reference.get()
    }

    /// Returns the refresh period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// Returns the interval between two consecutive vsync pulses in whole
    /// microseconds.
    #[must_use]
    pub fn period_micros(&self) -> u64 {
        self.inner.period.as_micros()
    }

    /// Returns `true` between an accepted request and its notification.
    #[must_use]
    pub fn is_request_in_flight(&self) -> bool {
        self.inner.in_flight.get()
    }

    /// Returns `true` if real pulses come from a precise signal source.
    #[must_use]
    pub fn has_precise_signal(&self) -> bool {
        matches!(self.inner.path, PulsePath::Precise(_))
    }

    /// Registers the listener, replacing any previous one.
    pub fn set_listener(&self, listener: impl VSyncListener + 'static) {
        *self.inner.listener.borrow_mut() = Some(Box::new(listener));
        self.bump_listener_epoch();
    }

    /// Removes the listener. Later notifications are dropped.
    pub fn clear_listener(&self) {
        *self.inner.listener.borrow_mut() = None;
        self.bump_listener_epoch();
    }

    /// Installs a trace sink, replacing any previous one.
    ///
    /// Events only reach the sink when the `trace` feature is enabled.
    pub fn set_trace_sink(&self, sink: impl TraceSink + 'static) {
        *self.inner.trace_sink.borrow_mut() = Some(Box::new(sink));
    }

    /// Removes and returns the trace sink.
    pub fn take_trace_sink(&self) -> Option<Box<dyn TraceSink>> {
        self.inner.trace_sink.borrow_mut().take()
    }

    fn bump_listener_epoch(&self) {
        let epoch = &self.inner.listener_epoch;
        epoch.set(epoch.get().wrapping_add(1));
    }

    fn post_synthetic(&self, now: HostTime) -> bool {
        let inner = &*self.inner;
        if !synthetic_eligible(
            now,
            inner.last_fired_at.get(),
            inner.reference.get(),
            inner.period,
        ) {
            return false;
        }
        log::debug!("posting synthetic vsync at {now:?}");

        let weak = Rc::downgrade(&self.inner);
        inner.tasks.post_now(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let now = inner.clock.now();
            let pulse = estimate_last_vsync(now, inner.reference.get(), inner.period);
            Self { inner }.on_callback(CallbackPath::Synthetic, pulse, now);
        }));
        true
    }

    fn precise_callback(&self) -> impl FnOnce(HostTime) + 'static {
        let weak = Rc::downgrade(&self.inner);
        move |pulse| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let now = inner.clock.now();
            Self { inner }.on_callback(CallbackPath::Precise, pulse, now);
        }
    }

    fn post_timer(&self, now: HostTime) -> RequestOutcome {
        let inner = &*self.inner;
        let plan = fallback_plan(
            now,
            inner.reference.get(),
            inner.period,
            inner.last_posted_at.get(),
        );
        if plan.debounced {
            log::debug!(
                "fallback vsync pushed back a period to {:?}: too close to previous post",
                plan.fire_at
            );
        }
        inner.last_posted_at.set(plan.fire_at);

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let task: Task = Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let now = inner.clock.now();
            Self { inner }.on_callback(CallbackPath::Timer, now, now);
        });
        match plan.delay_millis() {
            0 => inner.tasks.post_now(task),
            delay_ms => inner.tasks.post_after(task, delay_ms),
        }

        RequestOutcome::Timer {
            delay: plan.delay,
            debounced: plan.debounced,
        }
    }

    fn on_callback(&self, path: CallbackPath, pulse: HostTime, now: HostTime) {
        let inner = &*self.inner;
        inner.trace(|t| {
            t.callback_begin(&CallbackBeginEvent {
                path,
                timestamp: now,
            });
        });

        assert!(
            inner.in_flight.get(),
            "{} callback fired with no request in flight",
            path.span_name()
        );
        inner.in_flight.set(false);
        inner.last_fired_at.set(now);
        if path == CallbackPath::Precise {
            inner.reference.set(pulse);
        }

        let listener = inner.listener.borrow_mut().take();
        let delivered = listener.is_some();
        log::trace!("{} at {pulse:?} (fired {now:?})", path.span_name());
        inner.trace(|t| {
            t.vsync(&VSyncEvent {
                path,
                pulse_time: pulse,
                fired_at: now,
                delivered,
            });
        });

        if let Some(mut listener) = listener {
            let epoch = inner.listener_epoch.get();
            listener.on_vsync(self, pulse.as_micros());
            if inner.listener_epoch.get() == epoch {
                *inner.listener.borrow_mut() = Some(listener);
            }
        }

        let end = inner.clock.now();
        inner.trace(|t| {
            t.callback_end(&CallbackEndEvent {
                path,
                timestamp: end,
            });
        });
    }
}

impl fmt::Debug for VSyncMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &*self.inner;
        f.debug_struct("VSyncMonitor")
            .field("period", &inner.period)
            .field("precise", &self.has_precise_signal())
            .field("in_flight", &inner.in_flight.get())
            .field("reference", &inner.reference.get())
            .field("last_fired_at", &inner.last_fired_at.get())
            .field("last_posted_at", &inner.last_posted_at.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    use super::*;
    use crate::source::FrameCallback;

    const PERIOD: Duration = Duration(16_666_667);
    const START: HostTime = HostTime(10_000_000_000);

    #[derive(Clone)]
    struct TestClock(Rc<Cell<u64>>);

    impl TestClock {
        fn at(t: HostTime) -> Self {
            Self(Rc::new(Cell::new(t.nanos())))
        }

        fn set(&self, t: HostTime) {
            self.0.set(t.nanos());
        }

        fn advance(&self, d: Duration) {
            self.0.set(self.0.get() + d.nanos());
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> HostTime {
            HostTime(self.0.get())
        }
    }

    /// Posted tasks with their requested delay (`None` = post now).
    #[derive(Clone, Default)]
    struct TestTasks(Rc<RefCell<Vec<(Option<u64>, Task)>>>);

    impl TestTasks {
        fn delays(&self) -> Vec<Option<u64>> {
            self.0.borrow().iter().map(|(d, _)| *d).collect()
        }

        fn len(&self) -> usize {
            self.0.borrow().len()
        }

        /// Runs the oldest task outside of the queue borrow.
        fn run_next(&self) -> Option<u64> {
            let (delay, task) = self.0.borrow_mut().remove(0);
            task();
            delay
        }
    }

    impl DelayedTaskSource for TestTasks {
        fn post_now(&self, task: Task) {
            self.0.borrow_mut().push((None, task));
        }

        fn post_after(&self, task: Task, delay_ms: u64) {
            self.0.borrow_mut().push((Some(delay_ms), task));
        }
    }

    #[derive(Clone, Default)]
    struct TestSignal(Rc<RefCell<Vec<FrameCallback>>>);

    impl TestSignal {
        fn fire(&self, pulse: HostTime) {
            let callback = self.0.borrow_mut().remove(0);
            callback(pulse);
        }

        fn pending(&self) -> usize {
            self.0.borrow().len()
        }
    }

    impl PreciseSignalSource for TestSignal {
        fn post_frame_callback(&self, callback: FrameCallback) {
            self.0.borrow_mut().push(callback);
        }
    }

    fn recording_listener(monitor: &VSyncMonitor) -> Rc<RefCell<Vec<u64>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        monitor.set_listener(move |_: &VSyncMonitor, us: u64| sink.borrow_mut().push(us));
        seen
    }

    fn timer_monitor() -> (VSyncMonitor, TestClock, TestTasks) {
        let clock = TestClock::at(START);
        let tasks = TestTasks::default();
        let monitor = VSyncMonitor::new(MonitorConfig::new(60.0), clock.clone(), tasks.clone());
        (monitor, clock, tasks)
    }

    /// Consumes the start-up synthetic vsync so later requests take the
    /// real path.
    fn drain_first_synthetic(monitor: &VSyncMonitor, tasks: &TestTasks) {
        monitor.request_update();
        assert_eq!(tasks.delays(), [None], "first request is synthetic");
        tasks.run_next();
    }

    #[test]
    fn period_in_micros() {
        let (monitor, _, _) = timer_monitor();
        assert_eq!(monitor.period_micros(), 16_666);
        assert_eq!(monitor.period(), PERIOD);
    }

    #[test]
    fn zero_rate_matches_sixty_hz() {
        let clock = TestClock::at(START);
        let monitor = VSyncMonitor::new(MonitorConfig::new(0.0), clock, TestTasks::default());
        assert_eq!(monitor.period(), MonitorConfig::new(60.0).period());
    }

    #[test]
    fn reference_starts_at_construction_time() {
        let (monitor, _, _) = timer_monitor();
        assert_eq!(monitor.reference_point(), START);
        monitor.set_reference_point(HostTime(42));
        assert_eq!(monitor.reference_point(), HostTime(42));
    }

    #[test]
    fn first_request_after_construction_is_synthetic() {
        let (monitor, clock, tasks) = timer_monitor();
        let seen = recording_listener(&monitor);

        clock.advance(Duration(2_000_000));
        monitor.request_update();
        assert_eq!(tasks.delays(), [None], "synthetic vsync posts immediately");

        clock.advance(Duration(100_000));
        tasks.run_next();
        assert_eq!(*seen.borrow(), [START.as_micros()], "reports estimated pulse");
        assert!(!monitor.is_request_in_flight());
    }

    #[test]
    fn duplicate_request_is_ignored() {
        let (monitor, clock, tasks) = timer_monitor();
        let seen = recording_listener(&monitor);
        drain_first_synthetic(&monitor, &tasks);

        clock.advance(Duration(3_000_000));
        monitor.request_update();
        monitor.request_update();
        assert!(monitor.is_request_in_flight());
        assert_eq!(tasks.len(), 1, "second request must not post");

        clock.advance(Duration(14_000_000));
        tasks.run_next();
        assert_eq!(seen.borrow().len(), 2, "one notification per accepted request");
        assert_eq!(tasks.len(), 0);
    }

    #[test]
    fn timer_path_posts_delay_to_next_pulse() {
        let (monitor, clock, tasks) = timer_monitor();
        let seen = recording_listener(&monitor);
        drain_first_synthetic(&monitor, &tasks);

        // 4ms into the period: 12.67ms to go, truncated to 12ms.
        clock.set(START + Duration(4_000_000));
        monitor.request_update();
        assert_eq!(tasks.delays(), [Some(12)]);

        let fire = START + PERIOD - Duration(500_000);
        clock.set(fire);
        tasks.run_next();
        assert_eq!(seen.borrow()[1], fire.as_micros(), "timer reports fire time");
        assert_eq!(monitor.reference_point(), START, "timer never moves reference");
    }

    #[test]
    fn timer_path_posts_now_when_under_a_millisecond() {
        let (monitor, clock, tasks) = timer_monitor();
        drain_first_synthetic(&monitor, &tasks);

        clock.set(START + PERIOD - Duration(400_000));
        monitor.request_update();
        assert_eq!(tasks.delays(), [None], "sub-millisecond delay runs immediately");
    }

    #[test]
    fn precise_path_moves_reference() {
        let clock = TestClock::at(START);
        let tasks = TestTasks::default();
        let signal = TestSignal::default();
        let monitor = VSyncMonitor::with_precise_signal(
            MonitorConfig::new(60.0),
            clock.clone(),
            tasks.clone(),
            signal.clone(),
        );
        assert!(monitor.has_precise_signal());
        let seen = recording_listener(&monitor);
        drain_first_synthetic(&monitor, &tasks);

        clock.advance(Duration(9_000_000));
        monitor.request_update();
        assert_eq!(signal.pending(), 1);
        assert_eq!(tasks.len(), 0, "precise path posts no timer");

        let pulse = START + PERIOD + Duration(250_000);
        clock.set(pulse + Duration(80_000));
        signal.fire(pulse);
        assert_eq!(seen.borrow()[1], pulse.as_micros());
        assert_eq!(monitor.reference_point(), pulse);
    }

    #[test]
    fn synthetic_after_precise_pulse_lands_on_its_grid() {
        let clock = TestClock::at(START);
        let tasks = TestTasks::default();
        let signal = TestSignal::default();
        let monitor = VSyncMonitor::with_precise_signal(
            MonitorConfig::new(60.0),
            clock.clone(),
            tasks.clone(),
            signal.clone(),
        );
        let seen = recording_listener(&monitor);
        drain_first_synthetic(&monitor, &tasks);

        clock.advance(Duration(9_000_000));
        monitor.request_update();
        // The display runs 250us off the construction-time grid.
        let pulse = START + PERIOD + Duration(250_000);
        clock.set(pulse + Duration(80_000));
        signal.fire(pulse);

        // Idle for three periods, then resume 2ms after a pulse.
        clock.set(pulse + PERIOD * 3 + Duration(2_000_000));
        monitor.request_update();
        assert_eq!(tasks.delays(), [None], "resuming after idle is synthetic");
        assert_eq!(signal.pending(), 0, "synthetic path skips the precise source");
        clock.advance(Duration(100_000));
        tasks.run_next();

        let expected = pulse + PERIOD * 3;
        assert_eq!(seen.borrow()[2], expected.as_micros());
        let stale = estimate_last_vsync(clock.now(), START, PERIOD);
        assert_ne!(
            stale.as_micros(),
            expected.as_micros(),
            "estimate follows the precise pulse, not the start-up reference"
        );
    }

    #[test]
    fn disallowed_precise_signal_uses_timer() {
        let clock = TestClock::at(START);
        let tasks = TestTasks::default();
        let signal = TestSignal::default();
        let monitor = VSyncMonitor::with_precise_signal(
            MonitorConfig::timer_only(60.0),
            clock.clone(),
            tasks.clone(),
            signal.clone(),
        );
        assert!(!monitor.has_precise_signal());
        drain_first_synthetic(&monitor, &tasks);

        clock.advance(Duration(5_000_000));
        monitor.request_update();
        assert_eq!(signal.pending(), 0);
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn missing_listener_still_clears_flag() {
        let (monitor, clock, tasks) = timer_monitor();
        monitor.request_update();
        tasks.run_next();
        assert!(!monitor.is_request_in_flight());

        clock.advance(Duration(5_000_000));
        monitor.request_update();
        assert!(monitor.is_request_in_flight());
        tasks.run_next();
        assert!(!monitor.is_request_in_flight());
    }

    #[test]
    fn listener_can_request_again() {
        let (monitor, clock, tasks) = timer_monitor();
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        monitor.set_listener(move |monitor: &VSyncMonitor, _: u64| {
            counter.set(counter.get() + 1);
            if counter.get() < 3 {
                monitor.request_update();
            }
        });

        monitor.request_update();
        for _ in 0..3 {
            clock.advance(PERIOD);
            tasks.run_next();
        }
        assert_eq!(count.get(), 3);
        assert_eq!(tasks.len(), 0);
        assert!(!monitor.is_request_in_flight());
    }

    #[test]
    fn listener_replaced_during_callback_is_not_restored() {
        let (monitor, _, tasks) = timer_monitor();
        let second = Rc::new(Cell::new(0_u32));
        let second_hits = Rc::clone(&second);
        monitor.set_listener(move |monitor: &VSyncMonitor, _: u64| {
            let hits = Rc::clone(&second_hits);
            monitor.set_listener(move |_: &VSyncMonitor, _: u64| hits.set(hits.get() + 1));
        });

        monitor.request_update();
        tasks.run_next();
        assert_eq!(second.get(), 0);

        monitor.request_update();
        tasks.run_next();
        assert_eq!(second.get(), 1, "replacement listener receives the next vsync");
    }

    #[test]
    fn callback_after_drop_is_discarded() {
        let (monitor, _, tasks) = timer_monitor();
        monitor.request_update();
        drop(monitor);
        tasks.run_next();
    }

    #[test]
    fn future_reference_still_schedules_within_a_period() {
        let (monitor, clock, tasks) = timer_monitor();
        drain_first_synthetic(&monitor, &tasks);

        clock.set(START + Duration(1_000_000));
        monitor.set_reference_point(START + PERIOD * 3 + Duration(5_000_000));
        monitor.request_update();
        let delays = tasks.delays();
        let Some(Some(ms)) = delays.first().copied() else {
            panic!("expected a delayed timer post, got {delays:?}");
        };
        assert!(ms <= PERIOD.as_millis(), "delay {ms}ms exceeds a period");
    }
}
