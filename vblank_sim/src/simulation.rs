// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event-driven simulation tying the virtual collaborators together.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use vblank_core::config::MonitorConfig;
use vblank_core::monitor::VSyncMonitor;
use vblank_core::source::Clock;
use vblank_core::time::{Duration, HostTime};

use crate::clock::SimClock;
use crate::display::{SimDisplay, VsyncGrid};
use crate::grade::Delivery;
use crate::tasks::SimTasks;

/// A virtual clock, task queue and display that advance together.
///
/// Nothing runs until [`advance_to`](Self::advance_to) or
/// [`run_for`](Self::run_for) is called; each then executes due tasks and
/// display callbacks in time order, moving the clock to each event.
#[derive(Clone, Debug)]
pub struct Simulation {
    clock: SimClock,
    tasks: SimTasks,
    display: SimDisplay,
}

impl Simulation {
    /// Creates a simulation at `start` whose display pulses on `grid`.
    #[must_use]
    pub fn new(grid: VsyncGrid, start: HostTime) -> Self {
        let clock = SimClock::new(start);
        Self {
            tasks: SimTasks::new(clock.clone()),
            display: SimDisplay::new(clock.clone(), grid),
            clock,
        }
    }

    /// Makes delayed tasks run `lateness` past their deadline.
    #[must_use]
    pub fn with_timer_lateness(mut self, lateness: Duration) -> Self {
        self.tasks = SimTasks::new(self.clock.clone()).with_lateness(lateness);
        self
    }

    /// Delays display callbacks by `latency` after each pulse.
    #[must_use]
    pub fn with_display_latency(mut self, latency: Duration) -> Self {
        self.display =
            SimDisplay::new(self.clock.clone(), self.display.grid()).with_latency(latency);
        self
    }

    /// Returns the shared clock.
    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Returns the shared task queue.
    #[must_use]
    pub fn tasks(&self) -> &SimTasks {
        &self.tasks
    }

    /// Returns the shared display.
    #[must_use]
    pub fn display(&self) -> &SimDisplay {
        &self.display
    }

    /// Returns the display's true pulse grid.
    #[must_use]
    pub fn grid(&self) -> VsyncGrid {
        self.display.grid()
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.clock.now()
    }

    /// Builds a monitor that only uses timers.
    #[must_use]
    pub fn timer_monitor(&self, config: MonitorConfig) -> VSyncMonitor {
        VSyncMonitor::new(config, self.clock.clone(), self.tasks.clone())
    }

    /// Builds a monitor that takes real pulses from the display, subject to
    /// `config.allow_precise_signal`.
    #[must_use]
    pub fn precise_monitor(&self, config: MonitorConfig) -> VSyncMonitor {
        VSyncMonitor::with_precise_signal(
            config,
            self.clock.clone(),
            self.tasks.clone(),
            self.display.clone(),
        )
    }

    /// Runs every event due at or before `t`, then leaves the clock at `t`.
    ///
    /// Tasks run before display callbacks due at the same instant. Returns
    /// the number of events run.
    pub fn advance_to(&self, t: HostTime) -> usize {
        let mut events = 0;
        loop {
            let next = match (self.tasks.next_due(), self.display.next_delivery()) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            let Some(at) = next.filter(|&at| at <= t) else {
                break;
            };
            if at > self.clock.now() {
                self.clock.set(at);
            }
            if self.tasks.run_next_due() {
                events += 1;
                continue;
            }
            match self.display.deliver_due() {
                0 => break,
                n => events += n,
            }
        }
        if t > self.clock.now() {
            self.clock.set(t);
        }
        log::trace!("simulation at {t:?} after {events} events");
        events
    }

    /// Advances virtual time by `d`. See [`advance_to`](Self::advance_to).
    pub fn run_for(&self, d: Duration) -> usize {
        self.advance_to(self.clock.now() + d)
    }
}

/// Records every notification a monitor delivers.
///
/// In continuous mode the listener requests the next update from inside each
/// notification, like a render loop.
#[derive(Clone, Debug, Default)]
pub struct DeliveryLog {
    deliveries: Rc<RefCell<Vec<Delivery>>>,
    continuous: Rc<Cell<bool>>,
}

impl DeliveryLog {
    /// Installs a recording listener on `monitor`.
    pub fn attach(monitor: &VSyncMonitor, clock: &SimClock, continuous: bool) -> Self {
        let log = Self::default();
        log.continuous.set(continuous);

        let deliveries = Rc::clone(&log.deliveries);
        let keep_going = Rc::clone(&log.continuous);
        let clock = clock.clone();
        monitor.set_listener(move |monitor: &VSyncMonitor, vsync_time_us: u64| {
            deliveries.borrow_mut().push(Delivery {
                fired_at: clock.now(),
                vsync_time_us,
            });
            if keep_going.get() {
                monitor.request_update();
            }
        });
        log
    }

    /// Turns re-requesting from the listener on or off.
    pub fn set_continuous(&self, continuous: bool) {
        self.continuous.set(continuous);
    }

    /// Returns a copy of every delivery so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.borrow().clone()
    }

    /// Returns the number of deliveries so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deliveries.borrow().len()
    }

    /// Returns `true` if nothing has been delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deliveries.borrow().is_empty()
    }

    /// Returns the most recent delivery.
    #[must_use]
    pub fn last(&self) -> Option<Delivery> {
        self.deliveries.borrow().last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::{PhaseTracker, SyncGrade};
    use vblank_core::estimate::fallback_plan;
    use vblank_core::trace::CallbackPath;

    const PERIOD: Duration = Duration(16_666_667);
    const START: HostTime = HostTime(10_000_000_000);
    const MS: Duration = Duration(1_000_000);

    fn sim_on_grid(phase: HostTime) -> Simulation {
        Simulation::new(
            VsyncGrid {
                phase,
                period: PERIOD,
            },
            START,
        )
    }

    fn config() -> MonitorConfig {
        MonitorConfig::new(60.0)
    }

    /// Asserts no two consecutive deliveries fired within half a period.
    fn assert_spaced(deliveries: &[Delivery]) {
        for pair in deliveries.windows(2) {
            let gap = pair[1].fired_at - pair[0].fired_at;
            assert!(
                gap >= PERIOD / 2,
                "deliveries at {:?} and {:?} only {gap:?} apart",
                pair[0].fired_at,
                pair[1].fired_at
            );
        }
    }

    /// Answers the first request, which is always synthetic after
    /// construction.
    fn drain_startup(sim: &Simulation, monitor: &VSyncMonitor) {
        monitor.request_update();
        sim.run_for(Duration::ZERO);
        assert!(!monitor.is_request_in_flight());
    }

    #[test]
    fn request_is_idempotent_while_in_flight() {
        let sim = sim_on_grid(START);
        let monitor = sim.timer_monitor(config());
        let log = DeliveryLog::attach(&monitor, sim.clock(), false);
        drain_startup(&sim, &monitor);

        sim.run_for(MS * 3);
        monitor.request_update();
        monitor.request_update();
        sim.run_for(MS);
        monitor.request_update();
        sim.run_for(PERIOD * 4);
        assert_eq!(log.len(), 2, "one notification for the burst of requests");
        assert_eq!(sim.tasks().pending(), 0);
    }

    #[test]
    fn two_requests_a_millisecond_apart_stay_half_a_period_apart() {
        // Sweep the first request across the last few ms before a pulse so
        // the first fallback often fires just before the second request.
        for offset_us in (100..3_000).step_by(100) {
            let sim = sim_on_grid(START);
            let monitor = sim.timer_monitor(config());
            let log = DeliveryLog::attach(&monitor, sim.clock(), false);
            drain_startup(&sim, &monitor);

            let pulse = START + PERIOD * 4;
            sim.advance_to(pulse - Duration::from_micros(offset_us));
            monitor.request_update();
            sim.run_for(MS);
            monitor.request_update();
            sim.run_for(PERIOD * 3);

            let deliveries = log.deliveries();
            assert!(deliveries.len() >= 2, "offset {offset_us}us");
            assert_spaced(&deliveries[1..]);
        }
    }

    #[test]
    fn continuous_fallback_is_debounced() {
        let sim = sim_on_grid(START);
        let monitor = sim.timer_monitor(config());
        let log = DeliveryLog::attach(&monitor, sim.clock(), true);
        monitor.request_update();

        // Stray requests every millisecond on top of the render loop.
        for _ in 0..500 {
            sim.run_for(MS);
            monitor.request_update();
        }
        let deliveries = log.deliveries();
        assert!(deliveries.len() > 25, "got {}", deliveries.len());
        assert_spaced(&deliveries);

        let debounced = sim
            .tasks()
            .posts()
            .iter()
            .filter(|p| p.delay_ms.is_some_and(|ms| ms > PERIOD.as_millis()))
            .count();
        assert!(debounced > 0, "early fires must trigger the debounce");
    }

    #[test]
    fn busy_message_loop_keeps_spacing() {
        let sim = sim_on_grid(START).with_timer_lateness(MS * 3);
        let monitor = sim.timer_monitor(config());
        let log = DeliveryLog::attach(&monitor, sim.clock(), true);
        monitor.request_update();
        sim.run_for(PERIOD * 60);

        let deliveries = log.deliveries();
        assert!(deliveries.len() >= 55, "got {}", deliveries.len());
        assert_spaced(&deliveries);
    }

    #[test]
    fn synthetic_vsync_after_idle_is_immediate() {
        let sim = sim_on_grid(START);
        let monitor = sim.timer_monitor(config());
        let log = DeliveryLog::attach(&monitor, sim.clock(), false);
        drain_startup(&sim, &monitor);

        let request_at = START + PERIOD * 3 + MS * 2;
        sim.advance_to(request_at);
        monitor.request_update();
        let Some(post) = sim.tasks().posts().last().copied() else {
            panic!("request posted nothing");
        };
        assert_eq!(post.delay_ms, None);
        assert_eq!(post.due, request_at);

        sim.run_for(Duration::ZERO);
        assert_eq!(
            log.last(),
            Some(Delivery {
                fired_at: request_at,
                vsync_time_us: (START + PERIOD * 3).as_micros(),
            })
        );
    }

    #[test]
    fn no_synthetic_late_in_the_period() {
        let sim = sim_on_grid(START);
        let monitor = sim.timer_monitor(config());
        drain_startup(&sim, &monitor);

        sim.advance_to(START + PERIOD * 3 + MS * 10);
        monitor.request_update();
        let Some(post) = sim.tasks().posts().last().copied() else {
            panic!("request posted nothing");
        };
        assert_eq!(post.delay_ms, Some(6), "waits for the next pulse instead");
    }

    #[test]
    fn no_synthetic_without_idle() {
        let sim = sim_on_grid(START);
        let monitor = sim.timer_monitor(config());
        drain_startup(&sim, &monitor);

        // One period idle, just after a pulse.
        sim.advance_to(START + PERIOD + MS);
        monitor.request_update();
        let Some(post) = sim.tasks().posts().last().copied() else {
            panic!("request posted nothing");
        };
        assert!(post.delay_ms.is_some());
    }

    #[test]
    fn precise_pulses_become_the_reference() {
        let true_phase = START + MS * 5;
        let sim = sim_on_grid(true_phase).with_display_latency(Duration::from_micros(300));
        let monitor = sim.precise_monitor(config());
        let log = DeliveryLog::attach(&monitor, sim.clock(), true);
        monitor.request_update();
        sim.run_for(PERIOD * 120);

        let deliveries = log.deliveries();
        assert!(deliveries.len() >= 119, "got {}", deliveries.len());

        let mut tracker = PhaseTracker::<16>::new(sim.grid());
        let mut grade = None;
        // The start-up synthetic vsync reports the stale reference.
        for d in &deliveries[1..] {
            grade = Some(tracker.observe(CallbackPath::Precise, *d).grade);
        }
        assert_eq!(grade, Some(SyncGrade::A));

        let reference = monitor.reference_point();
        assert_eq!(sim.grid().pulse_at_or_before(reference), reference);
        assert_eq!(sim.tasks().pending(), 0, "precise path posts no timers");
    }

    #[test]
    fn reference_correction_realigns_fallback() {
        let sim = sim_on_grid(START);
        let monitor = sim.timer_monitor(config());
        monitor.set_reference_point(START + MS * 5);
        let log = DeliveryLog::attach(&monitor, sim.clock(), true);
        monitor.request_update();
        sim.run_for(PERIOD * 30);

        let mut stale = PhaseTracker::<8>::new(sim.grid());
        let mut worst = 0.0;
        for d in &log.deliveries()[1..] {
            worst = stale.observe(CallbackPath::Timer, *d).worst_phase_error_ms;
        }
        assert!(worst > 3.0, "stale reference should be visible: {worst}");

        let seen = log.len();
        let true_pulse = sim.grid().pulse_at_or_before(sim.now());
        monitor.set_reference_point(true_pulse);
        sim.run_for(PERIOD * 5);

        let mut fixed = PhaseTracker::<8>::new(sim.grid());
        let mut report = None;
        // The notification already in flight was planned on the stale grid.
        for d in &log.deliveries()[seen + 1..] {
            report = Some(fixed.observe(CallbackPath::Timer, *d));
        }
        let Some(report) = report else {
            panic!("no deliveries after correction");
        };
        // Whole-ms timer delays fire up to 1ms early.
        assert!(
            report.worst_phase_error_ms < 1.01,
            "corrected reference: {}",
            report.worst_phase_error_ms
        );
    }

    #[test]
    fn timer_posts_land_on_the_estimated_grid() {
        let sim = sim_on_grid(START);
        let monitor = sim.timer_monitor(config());
        drain_startup(&sim, &monitor);

        sim.advance_to(START + PERIOD + MS * 4);
        let expected = fallback_plan(sim.now(), monitor.reference_point(), PERIOD, HostTime(0));
        monitor.request_update();
        let Some(post) = sim.tasks().posts().last().copied() else {
            panic!("request posted nothing");
        };
        assert_eq!(post.delay_ms, Some(expected.delay_millis()));
        assert_eq!(expected.fire_at, START + PERIOD * 2);
    }

    #[test]
    fn dropped_monitor_leaves_no_work_behind() {
        let sim = sim_on_grid(START);
        let monitor = sim.precise_monitor(config());
        drain_startup(&sim, &monitor);
        sim.run_for(MS);
        monitor.request_update();
        assert_eq!(sim.display().pending(), 1);

        drop(monitor);
        sim.run_for(PERIOD * 2);
        assert_eq!(sim.display().pending(), 0);
        assert_eq!(sim.tasks().pending(), 0);
    }
}
