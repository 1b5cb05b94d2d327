// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Timer Ticks
//!
//! The scheduler keeps time in timer ticks. The platform timer driver
//! calls `Scheduler::timer_interrupt` once per tick; that advances the
//! counter kept here.
//!
//! # Usage
//!
//! ```ignore
//! let start = sched.ticks();
//! sched.sleep(10);
//! assert!(sched.ticks() >= start + 10);
//! ```

use core::sync::atomic::{AtomicU64, Ordering};

/// Monotonic tick counter
pub struct TickCounter {
    ticks: AtomicU64,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Ticks since boot
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Advance by one tick and return the new count
    pub fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Absolute tick at which a wait of `ticks` from now ends
    pub fn deadline(&self, ticks: u64) -> u64 {
        self.ticks().saturating_add(ticks)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counter() {
        let timer = TickCounter::new();
        assert_eq!(timer.ticks(), 0);
        assert_eq!(timer.tick(), 1);
        assert_eq!(timer.tick(), 2);
        assert_eq!(timer.deadline(10), 12);
        assert_eq!(timer.deadline(u64::MAX), u64::MAX);
    }
}
