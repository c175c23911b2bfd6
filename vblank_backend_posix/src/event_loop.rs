// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-thread delayed-task loop.
//!
//! [`TaskLoop`] owns a deadline-ordered queue of [`Task`]s. Code on the same
//! thread posts into it through a cloned [`TaskLoopHandle`], and the owner
//! pumps it with [`TaskLoop::dispatch_pending`] (non-blocking) or
//! [`TaskLoop::blocking_dispatch`] (sleeps until the next deadline).
//!
//! ```text
//! VSyncMonitor ──post_after──► TaskLoopHandle ──► queue ◄── TaskLoop::dispatch_pending()
//! ```
//!
//! A task posted while the loop is dispatching runs on a later dispatch,
//! never in the same one, so a task that reposts itself cannot starve the
//! caller.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::Rc;

use vblank_core::source::{Clock, DelayedTaskSource, Task};
use vblank_core::time::{Duration, HostTime};

use crate::time::PosixClock;

struct Entry {
    due: HostTime,
    seq: u64,
    task: Task,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

#[derive(Default)]
struct Queue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl Queue {
    fn push(&mut self, due: HostTime, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { due, seq, task });
    }

    /// Pops the earliest entry if it is due by `now` and was posted before
    /// sequence number `cutoff`.
    fn pop_due(&mut self, now: HostTime, cutoff: u64) -> Option<Task> {
        match self.heap.peek() {
            Some(e) if e.due <= now && e.seq < cutoff => self.heap.pop().map(|e| e.task),
            _ => None,
        }
    }
}

/// A single-thread delayed-task loop.
pub struct TaskLoop {
    clock: PosixClock,
    queue: Rc<RefCell<Queue>>,
}

impl fmt::Debug for TaskLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskLoop")
            .field("clock", &self.clock)
            .field("pending", &self.pending())
            .field("next_deadline", &self.next_deadline())
            .finish_non_exhaustive()
    }
}

impl Default for TaskLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskLoop {
    /// Creates an empty loop on the monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(PosixClock::monotonic())
    }

    /// Creates an empty loop measuring deadlines on `clock`.
    #[must_use]
    pub fn with_clock(clock: PosixClock) -> Self {
        Self {
            clock,
            queue: Rc::new(RefCell::new(Queue::default())),
        }
    }

    /// Returns a handle for posting tasks.
    #[must_use]
    pub fn handle(&self) -> TaskLoopHandle {
        TaskLoopHandle {
            clock: self.clock,
            queue: Rc::clone(&self.queue),
        }
    }

    /// Returns the clock deadlines are measured on.
    #[must_use]
    pub fn clock(&self) -> PosixClock {
        self.clock
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().heap.len()
    }

    /// Returns the earliest queued deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<HostTime> {
        self.queue.borrow().heap.peek().map(|e| e.due)
    }

    /// Runs every task that is due now, without blocking.
    ///
    /// Returns the number of tasks run.
    pub fn dispatch_pending(&mut self) -> usize {
        let now = self.clock.now();
        let cutoff = self.queue.borrow().next_seq;
        let mut ran = 0;
        loop {
            // The borrow ends before the task runs so it can post again.
            let task = self.queue.borrow_mut().pop_due(now, cutoff);
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }
        if ran > 0 {
            log::trace!("task loop ran {ran} tasks at {now:?}");
        }
        ran
    }

    /// Sleeps until the earliest deadline, then dispatches.
    ///
    /// Returns `0` immediately if the queue is empty.
    pub fn blocking_dispatch(&mut self) -> usize {
        let Some(deadline) = self.next_deadline() else {
            return 0;
        };
        let wait = deadline.saturating_duration_since(self.clock.now());
        if !wait.is_zero() {
            std::thread::sleep(std::time::Duration::from_nanos(wait.nanos()));
        }
        self.dispatch_pending()
    }

    /// Dispatches until the queue is empty.
    ///
    /// Returns the total number of tasks run. Does not return while tasks
    /// keep reposting themselves.
    pub fn run_until_idle(&mut self) -> usize {
        let mut total = 0;
        while self.pending() > 0 {
            total += self.blocking_dispatch();
        }
        total
    }

    /// Dispatches until `budget` has elapsed or the queue is empty.
    ///
    /// Returns the total number of tasks run.
    pub fn run_for(&mut self, budget: Duration) -> usize {
        let end = self.clock.now() + budget;
        let mut total = 0;
        while let Some(deadline) = self.next_deadline() {
            if deadline > end {
                break;
            }
            total += self.blocking_dispatch();
        }
        total
    }
}

/// Posts tasks into a [`TaskLoop`]. Cheap to clone.
#[derive(Clone)]
pub struct TaskLoopHandle {
    clock: PosixClock,
    queue: Rc<RefCell<Queue>>,
}

impl fmt::Debug for TaskLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskLoopHandle")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl DelayedTaskSource for TaskLoopHandle {
    fn post_now(&self, task: Task) {
        let now = self.clock.now();
        self.queue.borrow_mut().push(now, task);
    }

    fn post_after(&self, task: Task, delay_ms: u64) {
        let due = self.clock.now().saturating_add(Duration::from_millis(delay_ms));
        self.queue.borrow_mut().push(due, task);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn post_now_runs_on_next_dispatch() {
        let mut tasks = TaskLoop::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        tasks
            .handle()
            .post_now(Box::new(move || counter.set(counter.get() + 1)));
        assert_eq!(tasks.pending(), 1);
        assert_eq!(tasks.dispatch_pending(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(tasks.pending(), 0);
    }

    #[test]
    fn delayed_task_waits_for_deadline() {
        let mut tasks = TaskLoop::new();
        let handle = tasks.handle();
        handle.post_after(Box::new(|| {}), 50);
        assert_eq!(tasks.dispatch_pending(), 0, "not due yet");

        let start = tasks.clock().now();
        assert_eq!(tasks.blocking_dispatch(), 1);
        let waited = tasks.clock().now() - start;
        assert!(waited >= Duration::from_millis(45), "slept {waited:?}");
    }

    #[test]
    fn repost_during_dispatch_waits_for_next_round() {
        let mut tasks = TaskLoop::new();
        let handle = tasks.handle();
        let inner = handle.clone();
        handle.post_now(Box::new(move || inner.post_now(Box::new(|| {}))));

        assert_eq!(tasks.dispatch_pending(), 1);
        assert_eq!(tasks.pending(), 1);
        assert_eq!(tasks.dispatch_pending(), 1);
    }

    #[test]
    fn runs_in_deadline_order() {
        let mut tasks = TaskLoop::new();
        let handle = tasks.handle();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (label, delay) in [("late", 4), ("early", 1), ("now", 0)] {
            let order = Rc::clone(&order);
            let task: Task = Box::new(move || order.borrow_mut().push(label));
            if delay == 0 {
                handle.post_now(task);
            } else {
                handle.post_after(task, delay);
            }
        }
        assert_eq!(tasks.run_until_idle(), 3);
        assert_eq!(*order.borrow(), ["now", "early", "late"]);
    }

    #[test]
    fn blocking_dispatch_on_empty_loop_returns() {
        let mut tasks = TaskLoop::default();
        assert_eq!(tasks.blocking_dispatch(), 0);
        assert_eq!(tasks.next_deadline(), None);
    }

    #[test]
    fn drives_a_timer_monitor() {
        use vblank_core::config::MonitorConfig;
        use vblank_core::monitor::VSyncMonitor;

        let mut tasks = TaskLoop::new();
        let monitor = VSyncMonitor::new(MonitorConfig::new(60.0), tasks.clock(), tasks.handle());
        let fired = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&fired);
        let clock = tasks.clock();
        monitor.set_listener(move |monitor: &VSyncMonitor, _: u64| {
            log.borrow_mut().push(clock.now());
            if log.borrow().len() < 5 {
                monitor.request_update();
            }
        });

        monitor.request_update();
        tasks.run_until_idle();

        let fired = fired.borrow();
        assert_eq!(fired.len(), 5);
        // One immediate start-up vsync, then one grid pulse per request.
        let span = fired[4] - fired[0];
        assert!(span >= monitor.period() * 3, "five vsyncs in {span:?}");
        assert!(!monitor.is_request_in_flight());
    }

    #[test]
    fn run_for_stops_at_budget() {
        let mut tasks = TaskLoop::new();
        let handle = tasks.handle();
        handle.post_after(Box::new(|| {}), 1);
        handle.post_after(Box::new(|| {}), 10_000);
        assert_eq!(tasks.run_for(Duration::from_millis(20)), 1);
        assert_eq!(tasks.pending(), 1);
    }
}
