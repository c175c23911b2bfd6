// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated render loop that exercises the tracing and diagnostics pipeline.
//!
//! Drives a timer-only monitor and a precise-signal monitor against a virtual
//! 60 Hz display, recording events to both a
//! [`PrettyPrintSink`](vblank_debug::pretty::PrettyPrintSink) and a
//! [`RecorderSink`](vblank_debug::recorder::RecorderSink), then exports a
//! Chrome trace JSON file. Pass `--live` to also run a short timer loop on the
//! real monotonic clock.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter};
use std::rc::Rc;

use env_logger::{Builder, Env};

use vblank_backend_posix::TaskLoop;
use vblank_core::config::MonitorConfig;
use vblank_core::monitor::VSyncMonitor;
use vblank_core::source::Clock;
use vblank_core::time::{Duration, HostTime};
use vblank_core::trace::{
    CallbackBeginEvent, CallbackEndEvent, CallbackPath, RequestEvent, TraceSink, VSyncEvent,
};
use vblank_debug::pretty::PrettyPrintSink;
use vblank_debug::recorder::RecorderSink;
use vblank_sim::{DeliveryLog, PhaseTracker, Simulation, VsyncGrid, duration_ms};

const FRAME_COUNT: usize = 60;
const REFRESH_RATE_HZ: f32 = 60.0;
const START: HostTime = HostTime(1_000_000_000);
/// The display's real pulses sit this far past the monitor's start-up
/// reference.
const DISPLAY_PHASE_OFFSET: Duration = Duration(3_000_000);
const TRACE_PATH: &str = "vblank_trace.json";

/// Forwards every event to a pretty printer and a shared recorder.
struct Tee {
    pretty: PrettyPrintSink,
    recorder: Rc<RefCell<RecorderSink>>,
}

impl TraceSink for Tee {
    fn on_request(&mut self, e: &RequestEvent) {
        self.pretty.on_request(e);
        self.recorder.on_request(e);
    }

    fn on_callback_begin(&mut self, e: &CallbackBeginEvent) {
        self.pretty.on_callback_begin(e);
        self.recorder.on_callback_begin(e);
    }

    fn on_callback_end(&mut self, e: &CallbackEndEvent) {
        self.pretty.on_callback_end(e);
        self.recorder.on_callback_end(e);
    }

    fn on_vsync(&mut self, e: &VSyncEvent) {
        self.pretty.on_vsync(e);
        self.recorder.on_vsync(e);
    }
}

fn main() -> io::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let recorder = Rc::new(RefCell::new(RecorderSink::new()));
    let config = MonitorConfig::new(REFRESH_RATE_HZ);
    let grid = VsyncGrid {
        phase: START + DISPLAY_PHASE_OFFSET,
        period: config.period(),
    };

    // -- timer fallback ----------------------------------------------------
    let sim = Simulation::new(grid, START).with_timer_lateness(Duration::from_micros(400));
    let monitor = sim.timer_monitor(config.with_precise_signal(false));
    install_sinks(&monitor, &recorder);
    run_phase("timer", &sim, &monitor, CallbackPath::Timer, grid);

    // The platform reports a real pulse; later estimates snap to the display.
    monitor.set_reference_point(grid.pulse_at_or_before(sim.now()));
    let log = DeliveryLog::attach(&monitor, sim.clock(), false);
    monitor.request_update();
    sim.run_for(config.period() * 2);
    if let Some(last) = log.last() {
        log::info!(
            "after reference correction: fired {:.3} ms past the pulse",
            duration_ms(last.fired_at.saturating_duration_since(grid.nearest_pulse(last.fired_at)))
        );
    }

    // -- idle, then a synthetic start-up vsync ------------------------------
    sim.run_for(config.period() * 4);
    let before = log.len();
    monitor.request_update();
    log::info!(
        "request after idle delivered {} vsync(s) without waiting",
        log.len() - before
    );
    drop(monitor.take_trace_sink());

    // -- precise signal ----------------------------------------------------
    let sim = Simulation::new(grid, START).with_display_latency(Duration::from_micros(250));
    let monitor = sim.precise_monitor(config);
    install_sinks(&monitor, &recorder);
    run_phase("precise", &sim, &monitor, CallbackPath::Precise, grid);
    drop(monitor.take_trace_sink());

    if std::env::args().any(|arg| arg == "--live") {
        run_live(config, 10);
    }

    // -- chrome trace export -----------------------------------------------
    let file = File::create(TRACE_PATH)?;
    let mut writer = BufWriter::new(file);
    vblank_debug::chrome::export(recorder.borrow().as_bytes(), &mut writer)?;
    log::info!("wrote {TRACE_PATH}");
    Ok(())
}

fn install_sinks(monitor: &VSyncMonitor, recorder: &Rc<RefCell<RecorderSink>>) {
    let pretty = PrettyPrintSink::new(Box::new(io::stdout())).with_origin(START);
    monitor.set_trace_sink(Tee {
        pretty,
        recorder: Rc::clone(recorder),
    });
}

/// Runs a render loop for [`FRAME_COUNT`] vsyncs and prints its grade.
fn run_phase(
    name: &str,
    sim: &Simulation,
    monitor: &VSyncMonitor,
    path: CallbackPath,
    grid: VsyncGrid,
) {
    let log = DeliveryLog::attach(monitor, sim.clock(), true);
    monitor.request_update();
    while log.len() < FRAME_COUNT {
        if sim.run_for(grid.period) == 0 && !monitor.is_request_in_flight() {
            break;
        }
    }
    log.set_continuous(false);

    let mut tracker = PhaseTracker::<FRAME_COUNT>::new(grid);
    let mut report = None;
    for delivery in log.deliveries() {
        report = Some(tracker.observe(path, delivery));
    }
    let Some(report) = report else {
        log::warn!("{name}: no vsyncs delivered");
        return;
    };

    let period_ms = duration_ms(grid.period);
    println!(
        "{name}: grade {} over {} vsyncs, worst phase error {:.3} ms, {} late",
        report.grade.as_str(),
        report.total,
        report.worst_phase_error_ms,
        report.late,
    );
    println!(
        "{name}: frame deltas {}",
        tracker.sparkline_ascii(period_ms * 0.5, period_ms * 1.5)
    );
}

/// Runs a timer-only monitor on the monotonic clock for `frames` vsyncs.
fn run_live(config: MonitorConfig, frames: usize) {
    let mut tasks = TaskLoop::new();
    let clock = tasks.clock();
    let monitor = VSyncMonitor::new(config.with_precise_signal(false), clock, tasks.handle());
    let fired = Rc::new(RefCell::new(Vec::with_capacity(frames)));
    let sink = Rc::clone(&fired);
    monitor.set_listener(move |monitor: &VSyncMonitor, vsync_time_us: u64| {
        let count = {
            let mut fired = sink.borrow_mut();
            fired.push((clock.now(), vsync_time_us));
            fired.len()
        };
        if count < frames {
            monitor.request_update();
        }
    });

    monitor.request_update();
    tasks.run_until_idle();

    for pair in fired.borrow().windows(2) {
        let ((prev, _), (next, vsync_time_us)) = (pair[0], pair[1]);
        log::info!(
            "live vsync {vsync_time_us} µs, {:.3} ms since previous",
            duration_ms(next - prev)
        );
    }
}
