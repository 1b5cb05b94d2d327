// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Management
//!
//! Thread control blocks and the page blocks that hold them.
//!
//! # Design
//!
//! - Each thread has a unique thread ID (TID), never reused
//! - Each thread lives in its own block of `THREAD_PAGES` pages: the
//!   [`Thread`] record sits at the base, the kernel stack grows down
//!   from the top
//! - A magic value at the start of the record catches a stack that has
//!   grown down into it; every access checks it
//! - A thread that has never run carries a [`Continuation::NotStarted`]
//!   with its entry point, consumed by its first switch
//!
//! # Thread States
//!
//! ```text
//!          create          schedule
//! Blocked -------> Ready ----------> Running ----> Dying
//!    ^               ^  <----------   |   |
//!    |               |  yield/preempt |   |
//!    +--- block -----|----------------+   |
//!         unblock ---+                    |
//!                    +--- wake --- Sleeping <-- sleep
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let tid = sched.create("worker", PRIORITY_DEFAULT, worker_main, 0)?;
//! let info = sched.thread_info(tid);
//! ```

use alloc::vec::Vec;
use core::fmt;
use core::mem::size_of;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicU64, Ordering};

use crate::kernel::arch::amd64::fpu::FpuArea;
use crate::kernel::pmm::{pages_to_bytes, PageAllocator, PAGE_SIZE};

/// ============================================================================
/// Thread ID
/// ============================================================================

/// Thread ID type
pub type ThreadId = u64;

/// Invalid thread ID
pub const TID_INVALID: ThreadId = 0;

/// Thread ID allocator
///
/// Identifiers start at 1 and are never reused.
pub struct TidAllocator {
    next: AtomicU64,
}

impl TidAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1), // TID 0 is reserved/invalid
        }
    }

    pub fn allocate(&self) -> ThreadId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for TidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Process ID owned by the process layer
pub type ProcessId = u64;

/// Identity of a sleeping lock (its address)
pub type LockId = usize;

/// Thread body
pub type ThreadFn = fn(usize);

/// ============================================================================
/// Thread State
/// ============================================================================

/// Thread state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Just created, or waiting to be unblocked
    Blocked = 0,

    /// In the ready queue
    Ready = 1,

    /// On the CPU
    Running = 2,

    /// Waiting for a tick deadline
    Sleeping = 3,

    /// Exited; storage is reclaimed by the next thread to run
    Dying = 4,
}

impl ThreadState {
    /// Get the state name as a string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::Dying => "dying",
        }
    }

    /// Check if the thread may be picked by the scheduler
    pub const fn is_schedulable(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    /// Check if thread has exited
    pub const fn has_exited(self) -> bool {
        matches!(self, Self::Dying)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ============================================================================
/// Thread Priority
/// ============================================================================

/// Thread priority (higher runs first)
pub type ThreadPriority = u8;

/// Lowest priority
pub const PRIORITY_MIN: ThreadPriority = 0;

/// Default thread priority
pub const PRIORITY_DEFAULT: ThreadPriority = 31;

/// Highest priority
pub const PRIORITY_MAX: ThreadPriority = 63;

/// Check if a priority is in range
pub const fn is_valid_priority(priority: ThreadPriority) -> bool {
    priority <= PRIORITY_MAX
}

/// ============================================================================
/// Thread Name
/// ============================================================================

/// Maximum name length in bytes
pub const THREAD_NAME_LEN: usize = 16;

/// Fixed-size thread name
///
/// Longer names are truncated at a character boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ThreadName {
    bytes: [u8; THREAD_NAME_LEN],
    len: u8,
}

impl ThreadName {
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(THREAD_NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }

        let mut bytes = [0; THREAD_NAME_LEN];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from a prefix of a `&str` ending on a boundary.
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ============================================================================
/// Continuation
/// ============================================================================

/// Entry point of a thread that has not run yet
#[derive(Clone, Copy)]
pub struct Bootstrap {
    pub entry: ThreadFn,
    pub arg: usize,
}

/// Register state of a suspended thread
///
/// Everything except the stack pointer lives on the thread's own stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct SavedContext {
    pub sp: usize,
}

/// How the next switch into a thread resumes it
///
/// While the thread is running the saved context is stale.
#[derive(Clone, Copy)]
pub enum Continuation {
    /// Never ran; the switch starts it at `entry(arg)`
    NotStarted(Bootstrap),

    /// Suspended by an earlier switch
    Started(SavedContext),
}

impl Continuation {
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    /// Mark a running thread as suspended
    ///
    /// Returns the slot the switch routine stores the stack pointer in.
    pub(crate) fn suspend(&mut self) -> *mut usize {
        *self = Self::Started(SavedContext::default());
        match self {
            Self::Started(ctx) => &mut ctx.sp as *mut usize,
            Self::NotStarted(_) => crate::fatal!("suspended thread has no saved context"),
        }
    }
}

/// ============================================================================
/// Thread Structure
/// ============================================================================

/// Magic value guarding every thread record
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

/// Pages per thread block
pub const THREAD_PAGES: usize = 4;

/// Bytes per thread block
pub const THREAD_BLOCK_SIZE: usize = pages_to_bytes(THREAD_PAGES);

/// Thread control block
///
/// All fields except `magic` and `tid` are only touched with interrupts
/// disabled and the scheduler state locked.
#[repr(C)]
pub struct Thread {
    /// Overwritten first when the stack overflows
    magic: u32,

    pub(crate) status: ThreadState,

    tid: ThreadId,

    name: ThreadName,

    /// Effective priority, raised above `base_priority` by donation
    pub(crate) priority: ThreadPriority,

    /// Priority set by the thread itself
    pub(crate) base_priority: ThreadPriority,

    pub(crate) continuation: Continuation,

    /// Tick at which a sleeping thread becomes ready
    pub(crate) wake_time: u64,

    pub(crate) held_locks: Vec<LockId>,

    pub(crate) waiting_on_lock: Option<LockId>,

    pub(crate) process: Option<ProcessId>,

    pub(crate) fpu: FpuArea,
}

const _: () = assert!(size_of::<Thread>() <= PAGE_SIZE / 2);

impl Thread {
    pub(crate) fn new(
        tid: ThreadId,
        name: &str,
        priority: ThreadPriority,
        continuation: Continuation,
    ) -> Self {
        Self {
            magic: THREAD_MAGIC,
            status: ThreadState::Blocked,
            tid,
            name: ThreadName::new(name),
            priority,
            base_priority: priority,
            continuation,
            wake_time: 0,
            held_locks: Vec::new(),
            waiting_on_lock: None,
            process: None,
            fpu: FpuArea::zeroed(),
        }
    }

    pub fn tid(&self) -> ThreadId {
        self.tid
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn status(&self) -> ThreadState {
        self.status
    }

    pub fn priority(&self) -> ThreadPriority {
        self.priority
    }

    pub fn base_priority(&self) -> ThreadPriority {
        self.base_priority
    }

    /// Snapshot for diagnostics
    pub fn info(&self) -> ThreadInfo {
        ThreadInfo {
            tid: self.tid,
            name: self.name,
            status: self.status,
            priority: self.priority,
            base_priority: self.base_priority,
            wake_time: self.wake_time,
            locks_held: self.held_locks.len(),
            waiting_on: self.waiting_on_lock,
            process: self.process,
        }
    }
}

/// Copy of a thread's scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub tid: ThreadId,
    pub name: ThreadName,
    pub status: ThreadState,
    pub priority: ThreadPriority,
    pub base_priority: ThreadPriority,
    pub wake_time: u64,
    pub locks_held: usize,
    pub waiting_on: Option<LockId>,
    pub process: Option<ProcessId>,
}

/// ============================================================================
/// Thread Block
/// ============================================================================

/// Owning handle to one thread block
///
/// Dropping the handle leaks the block; it must be given back with
/// [`ThreadBlock::release`].
pub struct ThreadBlock {
    base: NonNull<Thread>,
}

// SAFETY: the block is only reached through the scheduler lock.
unsafe impl Send for ThreadBlock {}

impl ThreadBlock {
    /// Place `thread` at the base of a freshly allocated block
    ///
    /// # Safety
    ///
    /// `base` must be an unused allocation of `THREAD_PAGES` page-aligned
    /// pages.
    pub(crate) unsafe fn init(base: NonNull<u8>, thread: Thread) -> Self {
        let base = base.cast::<Thread>();
        base.as_ptr().write(thread);
        Self { base }
    }

    /// Raw pointer to the record, after checking it
    pub(crate) fn as_ptr(&self) -> *mut Thread {
        self.check();
        self.base.as_ptr()
    }

    pub fn thread(&self) -> &Thread {
        // SAFETY: the record is initialised and checked.
        unsafe { &*self.as_ptr() }
    }

    pub fn thread_mut(&mut self) -> &mut Thread {
        // SAFETY: as above, and `self` is borrowed mutably.
        unsafe { &mut *self.as_ptr() }
    }

    /// Address one past the end of the block
    pub fn stack_top(&self) -> usize {
        self.base.as_ptr() as usize + THREAD_BLOCK_SIZE
    }

    /// Halt if the record has been overwritten
    fn check(&self) {
        // SAFETY: `magic` is a plain integer at the base of the block; it
        // is read without forming a reference to a possibly corrupt record.
        let magic = unsafe { ptr::addr_of!((*self.base.as_ptr()).magic).read() };
        if magic != THREAD_MAGIC {
            crate::fatal!(
                "thread block at {:#x} corrupted (magic {:#x}); kernel stack overflow?",
                self.base.as_ptr() as usize,
                magic
            );
        }
    }

    /// Drop the record and return the pages
    ///
    /// # Safety
    ///
    /// No code may be running on the block's stack, and the pages must
    /// have come from `pages`.
    pub(crate) unsafe fn release(self, pages: &dyn PageAllocator) {
        let thread = self.as_ptr();
        ptr::drop_in_place(thread);
        pages.free_pages(self.base.cast(), THREAD_PAGES);
    }

    #[cfg(test)]
    pub(crate) fn corrupt_magic(&mut self) {
        // SAFETY: writes a plain integer inside the block.
        unsafe { ptr::addr_of_mut!((*self.base.as_ptr()).magic).write(0) };
    }
}

// ============================================================================
// Tests
// ============================================================================
