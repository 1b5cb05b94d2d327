// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! x86-64 context switch
//!
//! Two routines move the CPU between kernel threads:
//!
//! - `sched_switch_stacks` resumes a thread that was suspended by an
//!   earlier switch
//! - `sched_enter_thread` starts a thread that has never run, calling a
//!   trampoline on the thread's fresh stack with a [`BootFrame`]
//!
//! Both save the outgoing thread the same way: FPU registers into its
//! save area, the callee-saved registers onto its stack, and the stack
//! pointer into the slot the caller provides. Either routine can
//! therefore resume a thread suspended by the other.
//!
//! Saved stack layout (growing down):
//!
//! ```text
//! +------------------+
//! | return address   |
//! | rbp              |
//! | rbx              |
//! | r12 .. r15       |  <- saved sp
//! +------------------+
//! ```

use core::arch::global_asm;
use core::mem::size_of;

use super::fpu::FpuArea;
use crate::kernel::thread::ThreadFn;

/// Trampoline run first on every new thread
pub type Trampoline = extern "C" fn(*const BootFrame) -> !;

/// Frame placed at the top of a new thread's stack
///
/// The trampoline receives a pointer to it in the first argument
/// register.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BootFrame {
    /// Address of the owning scheduler
    pub sched: usize,

    /// Thread body
    pub entry: ThreadFn,

    /// Argument passed to `entry`
    pub arg: usize,

    _pad: usize,
}

// Keeps the stack 16-byte aligned at the trampoline call.
const _: () = assert!(size_of::<BootFrame>() % 16 == 0);

impl BootFrame {
    pub const fn new(sched: usize, entry: ThreadFn, arg: usize) -> Self {
        Self {
            sched,
            entry,
            arg,
            _pad: 0,
        }
    }
}

global_asm!(
    ".text",
    ".global sched_switch_stacks",
    ".p2align 4",
    "sched_switch_stacks:",
    "fxsave64 [rdx]",
    "fxrstor64 [rcx]",
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "mov qword ptr [rdi], rsp",
    "mov rsp, rsi",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    "ret",
    "",
    ".global sched_enter_thread",
    ".p2align 4",
    "sched_enter_thread:",
    "fxsave64 [rdx]",
    "fxrstor64 [rcx]",
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "mov qword ptr [rdi], rsp",
    "mov rsp, rsi",
    "mov rdi, rsi",
    "xor ebp, ebp",
    "call r8",
    "ud2",
);

extern "C" {
    fn sched_switch_stacks(
        save_sp: *mut usize,
        load_sp: usize,
        save_fpu: *mut FpuArea,
        load_fpu: *const FpuArea,
    );

    fn sched_enter_thread(
        save_sp: *mut usize,
        boot_sp: usize,
        save_fpu: *mut FpuArea,
        load_fpu: *const FpuArea,
        trampoline: Trampoline,
    );
}

/// Suspend the calling thread and resume a previously suspended one
///
/// Returns when some later switch resumes the caller.
///
/// # Safety
///
/// `load_sp` must be a stack pointer saved by one of these routines for
/// a thread that has not been resumed since. All pointers must be valid
/// and `save_fpu`/`load_fpu` must be distinct.
#[inline(never)]
pub unsafe fn switch_to(
    save_sp: *mut usize,
    load_sp: usize,
    save_fpu: *mut FpuArea,
    load_fpu: *const FpuArea,
) {
    sched_switch_stacks(save_sp, load_sp, save_fpu, load_fpu);
}

/// Suspend the calling thread and start a new one
///
/// Writes `frame` just below `stack_top`, switches to that stack and
/// calls `trampoline` with a pointer to the frame. Returns when some
/// later switch resumes the caller.
///
/// # Safety
///
/// `stack_top` must be the 16-byte aligned top of an unused stack that
/// stays allocated for as long as the new thread runs. The FPU pointers
/// follow the rules of [`switch_to`].
#[inline(never)]
pub unsafe fn enter_new(
    save_sp: *mut usize,
    stack_top: usize,
    frame: BootFrame,
    save_fpu: *mut FpuArea,
    load_fpu: *const FpuArea,
    trampoline: Trampoline,
) {
    let boot_sp = stack_top - size_of::<BootFrame>();
    (boot_sp as *mut BootFrame).write(frame);
    sched_enter_thread(save_sp, boot_sp, save_fpu, load_fpu, trampoline);
}
