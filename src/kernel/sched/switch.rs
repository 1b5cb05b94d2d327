// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Context switch
//!
//! [`Scheduler::schedule`] picks the next thread and switches to it.
//! Whatever thread runs next, the first thing it does is run
//! [`Scheduler::finish_switch`]: either on return from the switch
//! routine or, for a thread that never ran, from [`thread_start`].

use core::mem;
use core::ptr;

use super::Scheduler;
use crate::kernel::arch::amd64::context::{enter_new, switch_to, BootFrame};
use crate::kernel::arch::amd64::fpu::FpuArea;
use crate::kernel::arch::Arch;
use crate::kernel::thread::{Bootstrap, Continuation, SavedContext, ThreadState, TID_INVALID};
use crate::{fatal, log_debug, log_trace};

/// Where the incoming thread resumes
enum Target {
    Resume(usize),
    Enter(usize, Bootstrap),
}

/// Everything the switch routines need, gathered under the lock
struct Switch {
    save_sp: *mut usize,
    save_fpu: *mut FpuArea,
    load_fpu: *const FpuArea,
    target: Target,
}

impl<A: Arch> Scheduler<A> {
    /// Switch to the next thread to run
    ///
    /// Interrupts must be disabled and the running thread must already
    /// have left the RUNNING state.
    pub(super) fn schedule(&'static self) {
        if self.arch.interrupts_enabled() {
            fatal!("schedule called with interrupts enabled");
        }

        let switch = {
            let mut st = self.state.lock();
            let cur = st.current();
            if st.thread(cur).status == ThreadState::Running {
                fatal!("schedule called while thread {} is still running", cur);
            }

            let next = st.next_thread_to_run();
            st.stats.schedules += 1;

            if next == cur {
                st.prev = TID_INVALID;
                None
            } else {
                st.prev = cur;
                st.current = next;

                let out = st.block(cur).as_ptr();
                let incoming = st.block(next);
                let stack_top = incoming.stack_top();
                let inp = incoming.as_ptr();

                // SAFETY: both records are live and checked; they stay
                // allocated until the switch below has completed.
                unsafe {
                    let save_sp = (*out).continuation.suspend();
                    let resume = mem::replace(
                        &mut (*inp).continuation,
                        Continuation::Started(SavedContext::default()),
                    );
                    let target = match resume {
                        Continuation::Started(ctx) => Target::Resume(ctx.sp),
                        Continuation::NotStarted(boot) => Target::Enter(stack_top, boot),
                    };
                    Some(Switch {
                        save_sp,
                        save_fpu: ptr::addr_of_mut!((*out).fpu),
                        load_fpu: ptr::addr_of!((*inp).fpu),
                        target,
                    })
                }
            }
        };

        if let Some(switch) = switch {
            // SAFETY: the lock is released; the pointers were taken from
            // two distinct live blocks.
            unsafe {
                match switch.target {
                    Target::Resume(sp) => switch_to(switch.save_sp, sp, switch.save_fpu, switch.load_fpu),
                    Target::Enter(stack_top, boot) => enter_new(
                        switch.save_sp,
                        stack_top,
                        BootFrame::new(self as *const Self as usize, boot.entry, boot.arg),
                        switch.save_fpu,
                        switch.load_fpu,
                        thread_start::<A>,
                    ),
                }
            }
        }

        self.finish_switch();
    }

    /// Complete a switch on the incoming thread's stack
    ///
    /// Marks the thread RUNNING, starts a new time slice, and frees the
    /// previous thread's block if it was dying. Logging waits until the
    /// lock is released and the process hook has run, so a logger may
    /// query the scheduler.
    fn finish_switch(&self) {
        let (prev, current, process, reaped, pages, hooks) = {
            let mut st = self.state.lock();
            let current = st.current();
            let thread = st.thread_mut(current);
            thread.status = ThreadState::Running;
            let process = thread.process;
            st.slice_ticks = 0;

            let prev = mem::replace(&mut st.prev, TID_INVALID);
            let dying = prev != TID_INVALID
                && prev != current
                && prev != st.initial
                && st.thread(prev).status.has_exited();
            let reaped = if dying { st.threads.remove(&prev) } else { None };
            (prev, current, process, reaped, st.pages, st.hooks)
        };

        let reclaimed = reaped.is_some();
        if let Some(block) = reaped {
            match pages {
                // SAFETY: the dying thread is off its stack for good.
                Some(pages) => unsafe { block.release(pages) },
                None => fatal!("thread block with no page allocator"),
            }
        }

        if let Some(hooks) = hooks {
            hooks.activate(current, process);
        }

        if prev != TID_INVALID {
            log_trace!("switch {} -> {}", prev, current);
        }
        if reclaimed {
            log_debug!("reclaimed thread {}", prev);
        }
    }
}

/// First code run by every new thread
///
/// Completes the switch that started the thread, enables interrupts,
/// runs the body and exits when it returns.
extern "C" fn thread_start<A: Arch>(frame: *const BootFrame) -> ! {
    // SAFETY: written by `enter_new` at the top of this stack.
    let frame = unsafe { frame.read() };
    // SAFETY: `schedule` stores the address of a `&'static Scheduler<A>`.
    let sched: &'static Scheduler<A> = unsafe { &*(frame.sched as *const Scheduler<A>) };

    sched.finish_switch();
    sched.arch.enable_interrupts();

    (frame.entry)(frame.arg);
    sched.exit()
}
