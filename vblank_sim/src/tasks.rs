// Copyright 2026 the Vblank Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Virtual-time delayed task queue.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use vblank_core::source::{Clock, DelayedTaskSource, Task};
use vblank_core::time::{Duration, HostTime};

use crate::clock::SimClock;

/// One call to [`DelayedTaskSource`], as observed by [`SimTasks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostRecord {
    /// Clock reading at the time of the post.
    pub posted_at: HostTime,
    /// Requested delay; `None` for `post_now`.
    pub delay_ms: Option<u64>,
    /// When the task becomes runnable.
    pub due: HostTime,
}

/// Pending tasks keyed by deadline, then by their index in `posts`, so equal
/// deadlines run in post order.
#[derive(Default)]
struct Queue {
    pending: BTreeMap<(HostTime, usize), Task>,
    posts: Vec<PostRecord>,
}

/// A [`DelayedTaskSource`] that runs tasks against a [`SimClock`].
///
/// Tasks only run when the owner calls [`run_next_due`](Self::run_next_due)
/// (usually through [`Simulation`](crate::Simulation)). Clones share the
/// same queue.
#[derive(Clone)]
pub struct SimTasks {
    clock: SimClock,
    lateness: Duration,
    queue: Rc<RefCell<Queue>>,
}

impl fmt::Debug for SimTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("SimTasks")
            .field("pending", &queue.pending.len())
            .field("posted", &queue.posts.len())
            .field("lateness", &self.lateness)
            .finish_non_exhaustive()
    }
}

impl SimTasks {
    /// Creates an empty queue reading time from `clock`.
    #[must_use]
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            lateness: Duration::ZERO,
            queue: Rc::new(RefCell::new(Queue::default())),
        }
    }

    /// Makes every delayed task run `lateness` after its nominal deadline,
    /// modelling a busy message loop.
    #[must_use]
    pub fn with_lateness(mut self, lateness: Duration) -> Self {
        self.lateness = lateness;
        self
    }

    /// Returns every post recorded so far, oldest first.
    #[must_use]
    pub fn posts(&self) -> Vec<PostRecord> {
        self.queue.borrow().posts.clone()
    }

    /// Returns the number of tasks not yet run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    /// Returns the earliest deadline among pending tasks.
    #[must_use]
    pub fn next_due(&self) -> Option<HostTime> {
        self.queue
            .borrow()
            .pending
            .first_key_value()
            .map(|(&(due, _), _)| due)
    }

    /// Runs the earliest task if it is due at the current clock time.
    ///
    /// Returns `true` if a task ran. The queue is not borrowed while the
    /// task runs, so the task may post more work.
    pub fn run_next_due(&self) -> bool {
        let now = self.clock.now();
        let task = {
            let mut queue = self.queue.borrow_mut();
            match queue.pending.first_key_value() {
                Some((&(due, _), _)) if due <= now => queue.pending.pop_first().map(|(_, t)| t),
                _ => None,
            }
        };
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    fn push(&self, due: HostTime, delay_ms: Option<u64>, task: Task) {
        let posted_at = self.clock.now();
        let mut queue = self.queue.borrow_mut();
        let index = queue.posts.len();
        queue.pending.insert((due, index), task);
        queue.posts.push(PostRecord {
            posted_at,
            delay_ms,
            due,
        });
    }
}

impl DelayedTaskSource for SimTasks {
    fn post_now(&self, task: Task) {
        self.push(self.clock.now(), None, task);
    }

    fn post_after(&self, task: Task, delay_ms: u64) {
        let due = self.clock.now() + Duration::from_millis(delay_ms) + self.lateness;
        self.push(due, Some(delay_ms), task);
    }
}
