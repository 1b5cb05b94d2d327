// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Core Kernel Module
//!
//! Threads, the scheduler and the pieces of the kernel they lean on.

// Logging macros; declared first so every module below can use them.
#[macro_use]
pub mod debug;

pub mod arch;
pub mod cmdline;
pub mod pmm;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod timer;
