// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! x86-64 support
//!
//! The switch routines and FPU save areas are shared by every back-end.
//! The bare-metal back-end drives the real interrupt flag.

pub mod context;
pub mod fpu;

#[cfg(target_os = "none")]
pub use bare::Amd64;

#[cfg(target_os = "none")]
mod bare {
    use x86_64::instructions::interrupts;

    use crate::kernel::arch::Arch;
    use crate::kernel::sched::Scheduler;

    /// Bare-metal x86-64 back-end
    pub struct Amd64;

    impl Amd64 {
        pub const fn new() -> Self {
            Self
        }
    }

    impl Arch for Amd64 {
        fn interrupts_enabled(&self) -> bool {
            interrupts::are_enabled()
        }

        fn enable_interrupts(&self) {
            interrupts::enable();
        }

        fn disable_interrupts(&self) {
            interrupts::disable();
        }

        fn wait_for_interrupt(_sched: &'static Scheduler<Self>) {
            // `sti` holds off interrupts until after the next instruction,
            // so no interrupt slips in between enabling and halting.
            interrupts::enable_and_hlt();
        }
    }
}
