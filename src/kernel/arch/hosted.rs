// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! User-mode back-end
//!
//! Runs the scheduler inside an ordinary process. Threads switch on real
//! stacks with the shared x86-64 routines; only the interrupt flag is
//! simulated. Timer interrupts are delivered by calling
//! [`Scheduler::timer_interrupt`], which the idle thread does each time
//! it "halts".

use core::sync::atomic::{AtomicBool, Ordering};

use super::Arch;
use crate::kernel::sched::Scheduler;

/// Simulated interrupt controller
pub struct Hosted {
    enabled: AtomicBool,
}

impl Hosted {
    /// Interrupts start disabled, as on a CPU coming out of the loader
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }
}

impl Default for Hosted {
    fn default() -> Self {
        Self::new()
    }
}

impl Arch for Hosted {
    fn interrupts_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn enable_interrupts(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    fn disable_interrupts(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    fn wait_for_interrupt(sched: &'static Scheduler<Self>) {
        sched.arch().enable_interrupts();
        sched.timer_interrupt();
    }
}
