// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Scheduler
//!
//! Lifecycle manager for kernel threads on a single CPU: creation,
//! blocking, sleeping, yielding, exit, and the timer tick that drives
//! preemption and wake-ups.
//!
//! # Design
//!
//! - **Uniprocessor**: exactly one thread is RUNNING at a time
//! - **Interrupt exclusion**: the ready queue, the all-threads registry
//!   and every thread's status are only touched with interrupts off
//! - **Pluggable order**: the ready queue follows the [`SchedPolicy`]
//!   fixed at [`Scheduler::init`]
//! - **Preemptive**: a thread that uses up its time slice is yielded on
//!   the way out of the timer interrupt
//! - **Deferred reclaim**: an exiting thread's block is freed by the
//!   next thread to run, after the switch away from it completed
//!
//! The scheduler state sits behind a spin lock that is never held across
//! a context switch.
//!
//! # Usage
//!
//! ```ignore
//! static SCHED: Scheduler<Amd64> = Scheduler::new(Amd64::new());
//! static PAGES: HeapPages = HeapPages::new();
//!
//! SCHED.init(SchedConfig::from_cmdline(cmdline), &PAGES);
//! SCHED.start();
//!
//! let tid = SCHED.create("worker", PRIORITY_DEFAULT, worker_main, 0)?;
//! SCHED.sleep(100);
//! ```

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::errors::{Error, Result};
use crate::kernel::arch::{Arch, IrqSave};
use crate::kernel::cmdline::SchedConfig;
use crate::kernel::pmm::{PageAllocator, PallocFlags};
use crate::kernel::sync::Semaphore;
use crate::kernel::thread::{
    is_valid_priority, Bootstrap, Continuation, SavedContext, Thread, ThreadBlock, ThreadFn,
    ThreadId, ThreadInfo, ThreadName, ThreadPriority, ThreadState, TidAllocator, ProcessId,
    PRIORITY_DEFAULT, PRIORITY_MIN, THREAD_PAGES, TID_INVALID,
};
use crate::kernel::timer::TickCounter;
use crate::{fatal, log_debug, log_info, log_trace, log_warn};

pub mod policy;
mod switch;

#[cfg(target_os = "none")]
pub mod global;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;

pub use policy::{take_highest_priority, ReadyQueue, SchedPolicy};

/// ============================================================================
/// Process Layer Boundary
/// ============================================================================

/// Hooks into the process layer
///
/// The scheduler only knows which process, if any, a thread belongs to.
pub trait ProcessHooks: Sync {
    /// Called after every switch, once the new thread is running
    ///
    /// Typically activates the thread's address space. Runs with
    /// interrupts disabled and must not block.
    fn activate(&self, tid: ThreadId, process: Option<ProcessId>);

    /// Called by an exiting thread before it is unregistered
    ///
    /// Runs with the caller's interrupt level and may block.
    fn release(&self, tid: ThreadId, process: Option<ProcessId>);
}

/// ============================================================================
/// Scheduler Statistics
/// ============================================================================

/// Scheduler statistics
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Timer ticks spent in the idle thread
    pub idle_ticks: u64,

    /// Timer ticks spent in kernel threads
    pub kernel_ticks: u64,

    /// Timer ticks spent in threads that belong to a process
    pub user_ticks: u64,

    /// Number of times the scheduler picked a thread
    pub schedules: u64,

    /// Number of voluntary yields
    pub yields: u64,

    /// Number of expired time slices
    pub preemptions: u64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            idle_ticks: 0,
            kernel_ticks: 0,
            user_ticks: 0,
            schedules: 0,
            yields: 0,
            preemptions: 0,
        }
    }
}

/// ============================================================================
/// Scheduler State
/// ============================================================================

/// Everything guarded by the scheduler lock
struct SchedState {
    config: SchedConfig,

    pages: Option<&'static dyn PageAllocator>,

    hooks: Option<&'static dyn ProcessHooks>,

    /// Every block not yet reclaimed, dying ones included
    threads: BTreeMap<ThreadId, ThreadBlock>,

    /// All-threads registry: live threads only
    all: BTreeSet<ThreadId>,

    ready: ReadyQueue,

    current: ThreadId,

    /// Thread switched away from, until the switch completes
    prev: ThreadId,

    /// Thread created from the boot context
    initial: ThreadId,

    idle: Option<ThreadId>,

    /// Ticks since the current thread was switched in
    slice_ticks: u32,

    /// Yield once the current interrupt handler returns
    yield_on_return: bool,

    stats: SchedulerStats,
}

impl SchedState {
    const fn new() -> Self {
        let config = SchedConfig::new();
        Self {
            config,
            pages: None,
            hooks: None,
            threads: BTreeMap::new(),
            all: BTreeSet::new(),
            ready: ReadyQueue::new(config.policy),
            current: TID_INVALID,
            prev: TID_INVALID,
            initial: TID_INVALID,
            idle: None,
            slice_ticks: 0,
            yield_on_return: false,
            stats: SchedulerStats::new(),
        }
    }

    fn current(&self) -> ThreadId {
        if self.current == TID_INVALID {
            fatal!("scheduler used before init");
        }
        self.current
    }

    fn block(&self, tid: ThreadId) -> &ThreadBlock {
        match self.threads.get(&tid) {
            Some(block) => block,
            None => fatal!("no such thread: {}", tid),
        }
    }

    fn thread(&self, tid: ThreadId) -> &Thread {
        self.block(tid).thread()
    }

    fn thread_mut(&mut self, tid: ThreadId) -> &mut Thread {
        match self.threads.get_mut(&tid) {
            Some(block) => block.thread_mut(),
            None => fatal!("no such thread: {}", tid),
        }
    }

    /// The running thread, checked
    fn running_mut(&mut self) -> &mut Thread {
        let tid = self.current();
        let thread = self.thread_mut(tid);
        if thread.status != ThreadState::Running {
            fatal!("current thread {} is {}, not running", tid, thread.status);
        }
        thread
    }

    fn is_idle(&self, tid: ThreadId) -> bool {
        self.idle == Some(tid)
    }

    /// Put `tid` on the ready queue
    ///
    /// The caller sets the status.
    fn enqueue(&mut self, tid: ThreadId) {
        let threads = &self.threads;
        self.ready.push(tid, |t| effective_priority(threads, t));
    }

    /// BLOCKED -> READY
    fn make_ready(&mut self, tid: ThreadId) {
        let status = self.thread(tid).status;
        if status != ThreadState::Blocked {
            fatal!("cannot unblock thread {}: it is {}, not blocked", tid, status);
        }
        self.enqueue(tid);
        self.thread_mut(tid).status = ThreadState::Ready;
    }

    /// Head of the ready queue, or the idle thread if it is empty
    fn next_thread_to_run(&mut self) -> ThreadId {
        match self.ready.select_next() {
            Some(tid) => {
                let status = self.thread(tid).status;
                if !status.is_schedulable() {
                    fatal!("thread {} was queued while {}", tid, status);
                }
                tid
            }
            None => match self.idle {
                Some(idle) => idle,
                None => fatal!("no thread to run and no idle thread"),
            },
        }
    }

    /// Move every sleeper whose deadline has passed to the ready queue
    fn wake_sleepers(&mut self, now: u64) -> usize {
        let mut woken = 0;
        for &tid in self.all.iter() {
            let due = match self.threads.get_mut(&tid) {
                Some(block) => {
                    let thread = block.thread_mut();
                    let due = thread.status == ThreadState::Sleeping && thread.wake_time <= now;
                    if due {
                        thread.status = ThreadState::Ready;
                    }
                    due
                }
                None => fatal!("registered thread {} has no block", tid),
            };

            if due {
                let threads = &self.threads;
                self.ready.push(tid, |t| effective_priority(threads, t));
                woken += 1;
            }
        }
        woken
    }

    /// Charge one tick to the running thread
    fn account_tick(&mut self) {
        let current = self.current();
        if self.is_idle(current) {
            self.stats.idle_ticks += 1;
        } else if self.thread(current).process.is_some() {
            self.stats.user_ticks += 1;
        } else {
            self.stats.kernel_ticks += 1;
        }
    }
}

fn effective_priority(threads: &BTreeMap<ThreadId, ThreadBlock>, tid: ThreadId) -> ThreadPriority {
    match threads.get(&tid) {
        Some(block) => block.thread().priority,
        None => fatal!("no such thread: {}", tid),
    }
}

/// ============================================================================
/// Scheduler
/// ============================================================================

/// Scheduler for one CPU
pub struct Scheduler<A: Arch> {
    arch: A,

    state: Mutex<SchedState>,

    timer: TickCounter,

    tids: TidAllocator,

    in_interrupt: AtomicBool,
}

impl<A: Arch> Scheduler<A> {
    /// Create an uninitialised scheduler
    pub const fn new(arch: A) -> Self {
        Self {
            arch,
            state: Mutex::new(SchedState::new()),
            timer: TickCounter::new(),
            tids: TidAllocator::new(),
            in_interrupt: AtomicBool::new(false),
        }
    }

    pub fn arch(&self) -> &A {
        &self.arch
    }

    pub fn timer(&self) -> &TickCounter {
        &self.timer
    }

    /// Timer ticks since boot
    pub fn ticks(&self) -> u64 {
        self.timer.ticks()
    }

    /// Turn the running boot code into the initial thread
    ///
    /// Must be called once, with interrupts disabled, before any other
    /// operation. Unimplemented policies are fatal here.
    pub fn init(&self, config: SchedConfig, pages: &'static dyn PageAllocator) {
        if self.arch.interrupts_enabled() {
            fatal!("scheduler init with interrupts enabled");
        }
        config.policy.ensure_implemented();

        let mut st = self.state.lock();
        if st.current != TID_INVALID {
            fatal!("scheduler initialised twice");
        }

        let base = match pages.alloc_pages(THREAD_PAGES, PallocFlags::ZERO | PallocFlags::ASSERT) {
            Some(base) => base,
            None => fatal!("no memory for the initial thread"),
        };
        let tid = self.tids.allocate();
        let boot = Continuation::Started(SavedContext::default());
        let mut thread = Thread::new(tid, "main", PRIORITY_DEFAULT, boot);
        thread.status = ThreadState::Running;

        // SAFETY: fresh allocation of THREAD_PAGES pages.
        let block = unsafe { ThreadBlock::init(base, thread) };
        st.threads.insert(tid, block);
        st.all.insert(tid);
        st.current = tid;
        st.initial = tid;
        st.config = config;
        st.ready = ReadyQueue::new(config.policy);
        st.pages = Some(pages);
        drop(st);

        log_info!(
            "scheduler initialised: policy {}, time slice {} ticks",
            config.policy,
            config.time_slice
        );
    }

    /// Create the idle thread and enable interrupts
    ///
    /// Returns once the idle thread has started.
    pub fn start(&'static self) {
        let started = Arc::new(Semaphore::new(0));
        let signal = started.clone();
        let sched = self;

        if let Err(err) = self.spawn("idle", PRIORITY_MIN, move || {
            sched.idle_loop(&signal);
        }) {
            fatal!("cannot create the idle thread: {}", err);
        }

        self.arch.enable_interrupts();
        started.down(self);
        log_info!("scheduler started");
    }

    fn idle_loop(&'static self, started: &Semaphore) -> ! {
        {
            let _irq = IrqSave::new(&self.arch);
            let mut st = self.state.lock();
            st.idle = Some(st.current);
        }
        started.up(self);

        loop {
            // Only runs again when the ready queue is empty.
            self.arch.disable_interrupts();
            self.block();

            A::wait_for_interrupt(self);
        }
    }

    /// Install the process layer hooks
    pub fn set_process_hooks(&self, hooks: &'static dyn ProcessHooks) {
        let _irq = IrqSave::new(&self.arch);
        self.state.lock().hooks = Some(hooks);
    }

    /// Mark `tid` as belonging to a user process
    ///
    /// A thread belongs to at most one process: attaching it to a second
    /// one fails with `BadState`.
    pub fn attach_process(&self, tid: ThreadId, process: ProcessId) -> Result {
        let _irq = IrqSave::new(&self.arch);
        let mut st = self.state.lock();
        if !st.all.contains(&tid) {
            return Err(Error::NotFound);
        }
        let thread = st.thread_mut(tid);
        match thread.process {
            Some(owner) if owner != process => Err(Error::BadState),
            _ => {
                thread.process = Some(process);
                Ok(())
            }
        }
    }

    /// ========================================================================
    /// Lifecycle
    /// ========================================================================

    /// Create a thread that runs `entry(arg)` and exits when it returns
    ///
    /// The new thread is READY on return. Under strict priority the caller
    /// yields first if the new thread outranks it.
    ///
    /// # Errors
    ///
    /// - `InvalidArgs` if `priority` is out of range
    /// - `NoMemory` if no block could be allocated; nothing is registered
    pub fn create(
        &'static self,
        name: &str,
        priority: ThreadPriority,
        entry: ThreadFn,
        arg: usize,
    ) -> Result<ThreadId> {
        if !is_valid_priority(priority) {
            return Err(Error::InvalidArgs);
        }

        let pages = {
            let _irq = IrqSave::new(&self.arch);
            self.state.lock().pages
        };
        let pages = match pages {
            Some(pages) => pages,
            None => fatal!("thread created before scheduler init"),
        };
        let base = match pages.alloc_pages(THREAD_PAGES, PallocFlags::ZERO) {
            Some(base) => base,
            None => {
                log_warn!("out of memory creating thread '{}'", name);
                return Err(Error::NoMemory);
            }
        };

        let tid = self.tids.allocate();
        let mut thread = Thread::new(
            tid,
            name,
            priority,
            Continuation::NotStarted(Bootstrap { entry, arg }),
        );
        thread.fpu.init_fresh();
        // SAFETY: fresh allocation of THREAD_PAGES pages.
        let block = unsafe { ThreadBlock::init(base, thread) };

        let preempt = {
            let _irq = IrqSave::new(&self.arch);
            let mut st = self.state.lock();
            st.threads.insert(tid, block);
            st.all.insert(tid);
            st.make_ready(tid);

            let current = st.current();
            st.ready.policy() == SchedPolicy::Priority && priority > st.thread(current).priority
        };

        log_debug!("created thread {} '{}' at priority {}", tid, name, priority);

        if preempt {
            self.yield_now();
        }
        Ok(tid)
    }

    /// Create a thread that runs a closure
    ///
    /// The closure is dropped if the thread cannot be created.
    pub fn spawn<F>(&'static self, name: &str, priority: ThreadPriority, body: F) -> Result<ThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        let boxed: Box<Box<dyn FnOnce() + Send>> = Box::new(Box::new(body));
        let arg = Box::into_raw(boxed) as usize;

        self.create(name, priority, run_boxed, arg).map_err(|err| {
            // SAFETY: no thread took ownership of the closure.
            drop(unsafe { Box::from_raw(arg as *mut Box<dyn FnOnce() + Send>) });
            err
        })
    }

    /// RUNNING -> BLOCKED, then switch
    ///
    /// The caller must disable interrupts and record elsewhere why the
    /// thread is blocked; only [`Scheduler::unblock`] wakes it.
    pub fn block(&'static self) {
        if self.in_interrupt() {
            fatal!("block called from interrupt context");
        }
        if self.arch.interrupts_enabled() {
            fatal!("block called with interrupts enabled");
        }

        self.state.lock().running_mut().status = ThreadState::Blocked;
        self.schedule();
    }

    /// BLOCKED -> READY
    ///
    /// Safe from interrupt handlers. Never switches.
    pub fn unblock(&self, tid: ThreadId) {
        let _irq = IrqSave::new(&self.arch);
        self.state.lock().make_ready(tid);
    }

    /// Give up the CPU; the caller stays READY
    pub fn yield_now(&'static self) {
        if self.in_interrupt() {
            fatal!("yield called from interrupt context");
        }

        let _irq = IrqSave::new(&self.arch);
        {
            let mut st = self.state.lock();
            let current = st.current();
            st.running_mut().status = ThreadState::Ready;
            if !st.is_idle(current) {
                st.enqueue(current);
            }
            st.stats.yields += 1;
        }
        self.schedule();
    }

    /// Sleep for `ticks` timer ticks
    ///
    /// Does nothing for `ticks <= 0`. The idle thread never sleeps.
    pub fn sleep(&'static self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        if self.in_interrupt() {
            fatal!("sleep called from interrupt context");
        }

        let _irq = IrqSave::new(&self.arch);
        let slept = {
            let mut st = self.state.lock();
            let current = st.current();
            if st.is_idle(current) {
                false
            } else {
                let wake_time = self.timer.deadline(ticks as u64);
                let thread = st.running_mut();
                thread.wake_time = wake_time;
                thread.status = ThreadState::Sleeping;
                true
            }
        };

        if slept {
            self.schedule();
        }
    }

    /// Change the running thread's own priority, then yield
    ///
    /// Without a donation both priorities change. While a donation holds
    /// the effective priority above the base, only the base changes, and
    /// the effective priority is raised if the new base exceeds it.
    pub fn set_priority(&'static self, priority: ThreadPriority) -> Result {
        if !is_valid_priority(priority) {
            return Err(Error::InvalidArgs);
        }

        {
            let _irq = IrqSave::new(&self.arch);
            let mut st = self.state.lock();
            let thread = st.running_mut();
            if thread.priority == thread.base_priority {
                thread.priority = priority;
            } else {
                thread.priority = thread.priority.max(priority);
            }
            thread.base_priority = priority;
        }

        self.yield_now();
        Ok(())
    }

    /// Effective priority of the running thread
    pub fn get_priority(&self) -> ThreadPriority {
        let _irq = IrqSave::new(&self.arch);
        let st = self.state.lock();
        st.thread(st.current()).priority
    }

    /// ========================================================================
    /// MLFQS accessors
    /// ========================================================================

    /// Set the running thread's nice value
    ///
    /// The multi-level feedback queue is not implemented, so this always
    /// fails with `NotSupported`.
    pub fn set_nice(&self, _nice: i32) -> Result {
        Err(Error::NotSupported)
    }

    /// Nice value of the running thread; always 0
    pub fn nice(&self) -> i32 {
        0
    }

    /// 100 times the system load average; always 0
    pub fn load_avg(&self) -> i32 {
        0
    }

    /// 100 times the running thread's recent CPU; always 0
    pub fn recent_cpu(&self) -> i32 {
        0
    }

    /// Terminate the running thread
    ///
    /// The release hook runs first, while the thread is still listed in
    /// the all-threads registry; it then leaves the registry, and its
    /// block is freed by the next thread to run.
    pub fn exit(&'static self) -> ! {
        if self.in_interrupt() {
            fatal!("exit called from interrupt context");
        }

        let (tid, process, hooks) = {
            let _irq = IrqSave::new(&self.arch);
            let st = self.state.lock();
            let tid = st.current();
            (tid, st.thread(tid).process, st.hooks)
        };
        log_debug!("thread {} exiting", tid);

        if let Some(hooks) = hooks {
            hooks.release(tid, process);
        }

        self.arch.disable_interrupts();
        {
            let mut st = self.state.lock();
            st.all.remove(&tid);
            st.running_mut().status = ThreadState::Dying;
        }
        self.schedule();

        fatal!("dying thread {} was scheduled again", tid)
    }

    /// Visit a snapshot of every live thread
    ///
    /// Interrupts must already be disabled. The visitor may call back
    /// into the scheduler.
    pub fn for_each_thread<F>(&self, mut visit: F)
    where
        F: FnMut(&ThreadInfo),
    {
        if self.arch.interrupts_enabled() {
            fatal!("for_each_thread called with interrupts enabled");
        }

        let infos: Vec<ThreadInfo> = {
            let st = self.state.lock();
            st.all.iter().map(|&tid| st.thread(tid).info()).collect()
        };
        for info in &infos {
            visit(info);
        }
    }

    /// ========================================================================
    /// Interrupts
    /// ========================================================================

    /// Run an external interrupt handler
    ///
    /// Interrupts stay disabled while `handler` runs. If the handler
    /// asked for it, the interrupted thread yields before returning.
    pub fn interrupt_context<R>(&'static self, handler: impl FnOnce() -> R) -> R {
        let _irq = IrqSave::new(&self.arch);
        if self.in_interrupt.swap(true, Ordering::AcqRel) {
            fatal!("nested interrupt context");
        }

        let result = handler();

        self.in_interrupt.store(false, Ordering::Release);
        let yield_now = mem::take(&mut self.state.lock().yield_on_return);
        if yield_now {
            self.yield_now();
        }
        result
    }

    /// Whether an interrupt handler is running
    pub fn in_interrupt(&self) -> bool {
        self.in_interrupt.load(Ordering::Acquire)
    }

    /// Yield once the running interrupt handler returns
    pub fn yield_on_return(&self) {
        if !self.in_interrupt() {
            fatal!("yield_on_return outside interrupt context");
        }
        self.state.lock().yield_on_return = true;
    }

    /// Timer interrupt entry, called once per tick by the timer driver
    pub fn timer_interrupt(&'static self) {
        self.interrupt_context(|| self.tick());
    }

    fn tick(&self) {
        let now = self.timer.tick();

        let woken = {
            let mut st = self.state.lock();
            st.account_tick();
            let woken = st.wake_sleepers(now);

            st.slice_ticks += 1;
            if st.slice_ticks >= st.config.time_slice {
                st.yield_on_return = true;
                st.stats.preemptions += 1;
            }
            woken
        };

        if woken > 0 {
            log_trace!("tick {}: woke {} thread(s)", now, woken);
        }
    }

    /// ========================================================================
    /// Queries
    /// ========================================================================

    pub fn current_thread_id(&self) -> ThreadId {
        let _irq = IrqSave::new(&self.arch);
        self.state.lock().current()
    }

    /// Name of the running thread
    pub fn thread_name(&self) -> ThreadName {
        let _irq = IrqSave::new(&self.arch);
        let st = self.state.lock();
        st.thread(st.current()).info().name
    }

    /// Status of a thread whose block has not been reclaimed
    pub fn thread_status(&self, tid: ThreadId) -> Option<ThreadState> {
        self.thread_info(tid).map(|info| info.status)
    }

    pub fn thread_info(&self, tid: ThreadId) -> Option<ThreadInfo> {
        let _irq = IrqSave::new(&self.arch);
        let st = self.state.lock();
        st.threads.get(&tid).map(|block| block.thread().info())
    }

    /// Whether a live thread has this name
    pub fn find_by_name(&self, name: &str) -> bool {
        let _irq = IrqSave::new(&self.arch);
        let st = self.state.lock();
        st.all.iter().any(|&tid| st.thread(tid).name() == name)
    }

    /// Number of live threads, idle included
    pub fn thread_count(&self) -> usize {
        let _irq = IrqSave::new(&self.arch);
        self.state.lock().all.len()
    }

    /// Ready queue contents, next to run first
    pub fn ready_threads(&self) -> Vec<ThreadId> {
        let _irq = IrqSave::new(&self.arch);
        self.state.lock().ready.iter().collect()
    }

    pub fn policy(&self) -> SchedPolicy {
        let _irq = IrqSave::new(&self.arch);
        self.state.lock().ready.policy()
    }

    /// Effective priority of any live thread
    pub fn effective_priority(&self, tid: ThreadId) -> ThreadPriority {
        let _irq = IrqSave::new(&self.arch);
        self.state.lock().thread(tid).priority
    }

    pub fn stats(&self) -> SchedulerStats {
        let _irq = IrqSave::new(&self.arch);
        self.state.lock().stats
    }

    /// Prints thread statistics
    pub fn print_stats(&self) {
        let stats = self.stats();
        log_info!(
            "Thread: {} idle ticks, {} kernel ticks, {} user ticks",
            stats.idle_ticks,
            stats.kernel_ticks,
            stats.user_ticks
        );
    }

    /// Run `f` on the running thread's record
    pub(crate) fn with_current<R>(&self, f: impl FnOnce(&mut Thread) -> R) -> R {
        let _irq = IrqSave::new(&self.arch);
        let mut st = self.state.lock();
        let current = st.current();
        f(st.thread_mut(current))
    }

    #[cfg(test)]
    pub(crate) fn corrupt_thread(&self, tid: ThreadId) {
        let _irq = IrqSave::new(&self.arch);
        match self.state.lock().threads.get_mut(&tid) {
            Some(block) => block.corrupt_magic(),
            None => fatal!("no such thread: {}", tid),
        }
    }

    /// Stand-in for a donation: raise the effective priority only
    #[cfg(test)]
    pub(crate) fn force_effective_priority(&self, tid: ThreadId, priority: ThreadPriority) {
        let _irq = IrqSave::new(&self.arch);
        let mut st = self.state.lock();
        let thread = st.thread_mut(tid);
        thread.priority = priority.max(thread.base_priority);
    }
}

/// Entry point of threads created by [`Scheduler::spawn`]
fn run_boxed(arg: usize) {
    // SAFETY: `spawn` leaked exactly this box and handed it to us.
    let body = unsafe { Box::from_raw(arg as *mut Box<dyn FnOnce() + Send>) };
    body();
}
