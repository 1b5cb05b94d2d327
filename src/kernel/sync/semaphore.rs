// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Counting Semaphore
//!
//! A non-negative counter with two atomic operations: `down` waits for
//! the value to become positive and decrements it, `up` increments it
//! and wakes one waiter.
//!
//! # Design
//!
//! - **Blocking**: waiters block through the scheduler; the internal
//!   spin lock is never held while blocked
//! - **Wake order**: under strict priority the waiter with the highest
//!   effective priority is woken, the earliest one on a tie; otherwise
//!   waiters are woken in arrival order
//! - **No handoff**: a woken waiter re-checks the value when it runs
//!
//! # Usage
//!
//! ```ignore
//! static READY: Semaphore = Semaphore::new(0);
//!
//! // Producer
//! READY.up(&SCHED);
//!
//! // Consumer
//! READY.down(&SCHED);
//! ```

use alloc::collections::VecDeque;

use spin::Mutex;

use crate::kernel::arch::{Arch, IrqSave};
use crate::kernel::sched::{take_highest_priority, SchedPolicy, Scheduler};
use crate::kernel::thread::ThreadId;

struct SemaphoreInner {
    value: u32,
    waiters: VecDeque<ThreadId>,
}

/// Counting semaphore
pub struct Semaphore {
    inner: Mutex<SemaphoreInner>,
}

impl Semaphore {
    pub const fn new(value: u32) -> Self {
        Self {
            inner: Mutex::new(SemaphoreInner {
                value,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Current value
    pub fn value<A: Arch>(&self, sched: &Scheduler<A>) -> u32 {
        let _irq = IrqSave::new(sched.arch());
        self.inner.lock().value
    }

    /// Number of blocked waiters
    pub fn waiters<A: Arch>(&self, sched: &Scheduler<A>) -> usize {
        let _irq = IrqSave::new(sched.arch());
        self.inner.lock().waiters.len()
    }

    /// Wait for a positive value, then decrement it
    ///
    /// May block; must not be called from an interrupt handler.
    pub fn down<A: Arch>(&self, sched: &'static Scheduler<A>) {
        let _irq = IrqSave::new(sched.arch());
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.value > 0 {
                    inner.value -= 1;
                    return;
                }
                inner.waiters.push_back(sched.current_thread_id());
            }
            sched.block();
        }
    }

    /// Decrement the value if it is positive, without blocking
    pub fn try_down<A: Arch>(&self, sched: &Scheduler<A>) -> bool {
        let _irq = IrqSave::new(sched.arch());
        let mut inner = self.inner.lock();
        if inner.value == 0 {
            return false;
        }
        inner.value -= 1;
        true
    }

    /// Increment the value and wake one waiter
    ///
    /// Never switches, so it is safe from interrupt handlers.
    pub fn up<A: Arch>(&self, sched: &Scheduler<A>) {
        let _irq = IrqSave::new(sched.arch());
        let woken = {
            let mut inner = self.inner.lock();
            inner.value += 1;
            if inner.waiters.is_empty() {
                None
            } else if sched.policy() == SchedPolicy::Priority {
                Some(take_highest_priority(&mut inner.waiters, |&tid| {
                    sched.effective_priority(tid)
                }))
            } else {
                inner.waiters.pop_front()
            }
        };

        if let Some(tid) = woken {
            sched.unblock(tid);
        }
    }
}
