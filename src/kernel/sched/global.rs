// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Global Scheduler
//!
//! The bare-metal kernel has exactly one CPU and one scheduler. These
//! free functions forward to it so callers need not carry a reference.
//!
//! Thread blocks come from the kernel heap through [`HeapPages`]; the
//! embedding kernel provides the global allocator.

use super::{ProcessHooks, SchedPolicy, Scheduler, SchedulerStats};
use crate::errors::Result;
use crate::kernel::arch::Amd64;
use crate::kernel::cmdline::SchedConfig;
use crate::kernel::pmm::HeapPages;
use crate::kernel::thread::{ProcessId, ThreadFn, ThreadId, ThreadInfo, ThreadPriority};

/// ============================================================================
/// Global Scheduler
/// ============================================================================

static SCHEDULER: Scheduler<Amd64> = Scheduler::new(Amd64::new());

static THREAD_PAGES_POOL: HeapPages = HeapPages::new();

/// The kernel's scheduler
pub fn scheduler() -> &'static Scheduler<Amd64> {
    &SCHEDULER
}

/// Initialise threading from the boot command line
///
/// Call once, early, with interrupts disabled.
pub fn thread_init(cmdline: &str) {
    SCHEDULER.init(SchedConfig::from_cmdline(cmdline), &THREAD_PAGES_POOL);
}

/// Create the idle thread and enable interrupts
pub fn thread_start() {
    SCHEDULER.start();
}

/// Timer interrupt handler
///
/// The embedding interrupt handler must acknowledge the interrupt (send
/// EOI) before calling this: the tick may switch to another thread, and
/// the handler resumes only when the interrupted thread runs again.
pub fn thread_tick() {
    SCHEDULER.timer_interrupt();
}

pub fn thread_create(
    name: &str,
    priority: ThreadPriority,
    entry: ThreadFn,
    arg: usize,
) -> Result<ThreadId> {
    SCHEDULER.create(name, priority, entry, arg)
}

pub fn thread_block() {
    SCHEDULER.block();
}

pub fn thread_unblock(tid: ThreadId) {
    SCHEDULER.unblock(tid);
}

pub fn thread_yield() {
    SCHEDULER.yield_now();
}

pub fn thread_sleep(ticks: i64) {
    SCHEDULER.sleep(ticks);
}

pub fn thread_exit() -> ! {
    SCHEDULER.exit()
}

pub fn thread_set_priority(priority: ThreadPriority) -> Result {
    SCHEDULER.set_priority(priority)
}

pub fn thread_get_priority() -> ThreadPriority {
    SCHEDULER.get_priority()
}

/// Always fails: MLFQS is not implemented
pub fn thread_set_nice(nice: i32) -> Result {
    SCHEDULER.set_nice(nice)
}

pub fn thread_get_nice() -> i32 {
    SCHEDULER.nice()
}

pub fn thread_get_load_avg() -> i32 {
    SCHEDULER.load_avg()
}

pub fn thread_get_recent_cpu() -> i32 {
    SCHEDULER.recent_cpu()
}

pub fn thread_current() -> ThreadId {
    SCHEDULER.current_thread_id()
}

/// Visit every live thread; interrupts must be disabled
pub fn thread_foreach<F>(visit: F)
where
    F: FnMut(&ThreadInfo),
{
    SCHEDULER.for_each_thread(visit);
}

pub fn thread_attach_process(tid: ThreadId, process: ProcessId) -> Result {
    SCHEDULER.attach_process(tid, process)
}

pub fn set_process_hooks(hooks: &'static dyn ProcessHooks) {
    SCHEDULER.set_process_hooks(hooks);
}

pub fn sched_policy() -> SchedPolicy {
    SCHEDULER.policy()
}

pub fn get_stats() -> SchedulerStats {
    SCHEDULER.stats()
}

/// Print tick statistics at shutdown
pub fn thread_print_stats() {
    SCHEDULER.print_stats();
}
