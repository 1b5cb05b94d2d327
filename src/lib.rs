// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Schedcore - Thread Scheduling Core
//!
//! Kernel threads, their lifecycle, the ready-queue policies that order
//! them, and the context switch that moves the CPU between them.
//!
//! The crate is split the same way the kernel is:
//!
//! - [`kernel::thread`]: thread control blocks and their page-sized blocks
//! - [`kernel::sched`]: lifecycle manager, ready queue, context switch
//! - [`kernel::sync`]: semaphores and sleeping locks built on block/unblock
//! - [`kernel::arch`]: interrupt control and the x86-64 switch routines
//! - [`kernel::timer`]: the tick counter driven by the timer interrupt

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[cfg(all(target_os = "none", not(test)))]
use panic_halt as _;

pub mod errors;

#[macro_use]
pub mod kernel;

pub use errors::{Error, Result};
