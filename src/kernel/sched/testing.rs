// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Test fixtures: a booted scheduler on the hosted back-end
//!
//! Every test boots its own leaked scheduler, so tests may run on
//! parallel harness threads. The harness thread becomes the initial
//! thread. A panic on any other thread aborts the test binary, so checks
//! that are expected to fail must run on the initial thread.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use super::Scheduler;
use crate::kernel::arch::Hosted;
use crate::kernel::cmdline::SchedConfig;
use crate::kernel::pmm::HeapPages;

pub(crate) type TestScheduler = Scheduler<Hosted>;

/// Boot a scheduler with its own unlimited page pool
pub(crate) fn boot(config: SchedConfig) -> &'static TestScheduler {
    boot_with(config, Box::leak(Box::new(HeapPages::new())))
}

/// Boot a scheduler on the given page pool
pub(crate) fn boot_with(config: SchedConfig, pages: &'static HeapPages) -> &'static TestScheduler {
    let sched: &'static TestScheduler = Box::leak(Box::new(Scheduler::new(Hosted::new())));
    sched.init(config, pages);
    sched.start();
    sched
}

/// Shared, ordered record of events
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<u64>>>);

impl Journal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, event: u64) {
        self.0.lock().push(event);
    }

    pub(crate) fn take(&self) -> Vec<u64> {
        core::mem::take(&mut *self.0.lock())
    }
}
