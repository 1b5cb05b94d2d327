// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Sleeping Lock
//!
//! A binary semaphore with an owner. Only the holder may release it and
//! it may not be acquired recursively.
//!
//! Each thread records the locks it holds and the lock it is waiting
//! for. Priority donation is not implemented, but a donating scheduler
//! would walk exactly these records.

use spin::Mutex;

use super::Semaphore;
use crate::fatal;
use crate::kernel::arch::Arch;
use crate::kernel::sched::Scheduler;
use crate::kernel::thread::{LockId, ThreadId};

/// Sleeping mutual-exclusion lock
pub struct Lock {
    holder: Mutex<Option<ThreadId>>,
    sema: Semaphore,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            holder: Mutex::new(None),
            sema: Semaphore::new(1),
        }
    }

    /// Identity recorded in thread bookkeeping
    ///
    /// The lock must not move while it is held or waited on.
    pub fn id(&self) -> LockId {
        self as *const Self as LockId
    }

    /// Thread currently holding the lock
    pub fn holder(&self) -> Option<ThreadId> {
        *self.holder.lock()
    }

    pub fn held_by_current<A: Arch>(&self, sched: &Scheduler<A>) -> bool {
        self.holder() == Some(sched.current_thread_id())
    }

    /// Acquire the lock, sleeping until it is available
    pub fn acquire<A: Arch>(&self, sched: &'static Scheduler<A>) {
        if self.held_by_current(sched) {
            fatal!("lock {:#x} acquired recursively", self.id());
        }

        let id = self.id();
        sched.with_current(|thread| thread.waiting_on_lock = Some(id));
        self.sema.down(sched);
        self.taken(sched);
    }

    /// Acquire the lock if it is free
    pub fn try_acquire<A: Arch>(&self, sched: &Scheduler<A>) -> bool {
        if self.held_by_current(sched) {
            fatal!("lock {:#x} acquired recursively", self.id());
        }
        if !self.sema.try_down(sched) {
            return false;
        }
        self.taken(sched);
        true
    }

    fn taken<A: Arch>(&self, sched: &Scheduler<A>) {
        let id = self.id();
        let tid = sched.with_current(|thread| {
            thread.waiting_on_lock = None;
            thread.held_locks.push(id);
            thread.tid()
        });
        *self.holder.lock() = Some(tid);
    }

    /// Release the lock held by the running thread
    pub fn release<A: Arch>(&self, sched: &Scheduler<A>) {
        if !self.held_by_current(sched) {
            fatal!("lock {:#x} released by a thread that does not hold it", self.id());
        }

        let id = self.id();
        sched.with_current(|thread| thread.held_locks.retain(|&held| held != id));
        *self.holder.lock() = None;
        self.sema.up(sched);
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}
