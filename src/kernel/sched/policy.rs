// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Ready-Queue Policies
//!
//! The ready queue holds the IDs of READY threads. The policy chosen at
//! boot decides where a thread is inserted and which one comes out.
//!
//! # Policies
//!
//! - **FIFO**: append at the tail, take from the head
//! - **Priority**: keep the queue sorted by descending effective
//!   priority, equal priorities in arrival order; take from the head
//! - **Fair-share** and **MLFQS**: selectable by name but not
//!   implemented; using them halts the kernel
//!
//! Any raw policy value outside the four known ones also halts the
//! kernel. There is no fallback policy.

use alloc::collections::VecDeque;
use core::fmt;

use crate::errors::{Error, Result};
use crate::fatal;
use crate::kernel::thread::{ThreadId, ThreadPriority};

/// ============================================================================
/// Policy Selection
/// ============================================================================

/// Size of the raw policy table; values 4..8 are reserved
pub const SCHED_POLICY_SLOTS: u8 = 8;

/// Ready-queue ordering policy
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// Arrival order
    Fifo = 0,

    /// Strict priority, arrival order among equals
    Priority = 1,

    /// Fair priority sharing (not implemented)
    FairShare = 2,

    /// Multi-level feedback queue (not implemented)
    Mlfqs = 3,
}

impl SchedPolicy {
    /// Map a raw policy value
    ///
    /// Reserved and out-of-range values are fatal.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Fifo,
            1 => Self::Priority,
            2 => Self::FairShare,
            3 => Self::Mlfqs,
            4..=7 => fatal!("invalid scheduler policy value: {} (reserved)", raw),
            _ => fatal!("invalid scheduler policy value: {} (out of range)", raw),
        }
    }

    /// Look up a policy by its command line name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "fifo" => Ok(Self::Fifo),
            "prio" => Ok(Self::Priority),
            "fair" => Ok(Self::FairShare),
            "mlfqs" => Ok(Self::Mlfqs),
            _ => Err(Error::NotFound),
        }
    }

    /// Command line name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Priority => "prio",
            Self::FairShare => "fair",
            Self::Mlfqs => "mlfqs",
        }
    }

    pub const fn is_implemented(self) -> bool {
        matches!(self, Self::Fifo | Self::Priority)
    }

    /// Halt unless the policy is implemented
    pub fn ensure_implemented(self) {
        if !self.is_implemented() {
            fatal!("unimplemented scheduler policy: \"-sched={}\"", self.name());
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ============================================================================
/// Ready Queue
/// ============================================================================

/// Queue of READY threads, ordered by the active policy
///
/// Priorities are not stored in the queue; callers pass a lookup for the
/// current effective priority of a thread.
pub struct ReadyQueue {
    policy: SchedPolicy,
    queue: VecDeque<ThreadId>,
}

impl ReadyQueue {
    pub const fn new(policy: SchedPolicy) -> Self {
        Self {
            policy,
            queue: VecDeque::new(),
        }
    }

    pub const fn policy(&self) -> SchedPolicy {
        self.policy
    }

    /// Insert a thread according to the policy
    pub fn push<F>(&mut self, tid: ThreadId, priority_of: F)
    where
        F: Fn(ThreadId) -> ThreadPriority,
    {
        match self.policy {
            SchedPolicy::Fifo => self.queue.push_back(tid),
            SchedPolicy::Priority => {
                let priority = priority_of(tid);
                let pos = self
                    .queue
                    .iter()
                    .position(|&queued| priority_of(queued) < priority)
                    .unwrap_or(self.queue.len());
                self.queue.insert(pos, tid);
            }
            SchedPolicy::FairShare | SchedPolicy::Mlfqs => {
                fatal!("unimplemented scheduling policy value: {}", self.policy as u8)
            }
        }
    }

    /// Remove and return the next thread to run
    ///
    /// `None` means the queue is empty and the idle thread should run.
    pub fn select_next(&mut self) -> Option<ThreadId> {
        match self.policy {
            SchedPolicy::Fifo | SchedPolicy::Priority => self.queue.pop_front(),
            SchedPolicy::FairShare => fatal!("unimplemented scheduler policy: \"-sched=fair\""),
            SchedPolicy::Mlfqs => fatal!("unimplemented scheduler policy: \"-sched=mlfqs\""),
        }
    }

    pub fn contains(&self, tid: ThreadId) -> bool {
        self.queue.contains(&tid)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued IDs, next to run first
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }
}

/// Remove and return the entry with the greatest priority
///
/// Scans the whole queue; the earliest entry wins a tie. For queues that
/// are not kept sorted, such as semaphore wait lists.
///
/// Must not be called on an empty queue.
pub fn take_highest_priority<T, F>(queue: &mut VecDeque<T>, priority_of: F) -> T
where
    F: Fn(&T) -> ThreadPriority,
{
    let mut best: Option<(usize, ThreadPriority)> = None;
    for (index, entry) in queue.iter().enumerate() {
        let priority = priority_of(entry);
        if best.map_or(true, |(_, top)| priority > top) {
            best = Some((index, priority));
        }
    }

    match best.and_then(|(index, _)| queue.remove(index)) {
        Some(entry) => entry,
        None => fatal!("take_highest_priority called on an empty queue"),
    }
}
