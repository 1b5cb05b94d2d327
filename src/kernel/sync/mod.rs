// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Synchronization Primitives
//!
//! Sleeping primitives built on the scheduler's block and unblock.
//!
//! # Primitives
//!
//! - **Semaphore**: counting semaphore, priority-aware wake order
//! - **Lock**: owned binary semaphore with per-thread bookkeeping
//!
//! Short critical sections on scheduler data use `spin::Mutex` with
//! interrupts disabled instead.

pub mod lock;
pub mod semaphore;

pub use lock::Lock;
pub use semaphore::Semaphore;
