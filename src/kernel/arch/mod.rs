// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Architecture Abstraction Layer (AAL)
//!
//! The scheduler needs very little from the CPU: control over the
//! interrupt flag, a way to idle until the next interrupt, and the
//! stack/FPU switch routines in [`amd64`].
//!
//! # Back-ends
//!
//! - `Amd64`: bare metal, real `cli`/`sti`/`hlt`
//! - `Hosted`: user mode, the interrupt flag lives in memory and idling
//!   delivers one simulated timer tick

use crate::kernel::sched::Scheduler;

#[cfg(not(target_arch = "x86_64"))]
compile_error!("schedcore only supports x86_64");

pub mod amd64;

#[cfg(any(test, feature = "hosted"))]
pub mod hosted;

#[cfg(target_os = "none")]
pub use amd64::Amd64;

#[cfg(any(test, feature = "hosted"))]
pub use hosted::Hosted;

/// CPU services used by the scheduler
pub trait Arch: Sync + Sized + 'static {
    /// Whether maskable interrupts are currently enabled
    fn interrupts_enabled(&self) -> bool;

    /// Enable maskable interrupts
    fn enable_interrupts(&self);

    /// Disable maskable interrupts
    fn disable_interrupts(&self);

    /// Enable interrupts and wait for the next one
    ///
    /// Called only by the idle thread.
    fn wait_for_interrupt(sched: &'static Scheduler<Self>);
}

/// Interrupt-disable guard
///
/// Disables interrupts on creation and restores the previous level
/// when dropped.
pub struct IrqSave<'a, A: Arch> {
    arch: &'a A,
    was_enabled: bool,
}

impl<'a, A: Arch> IrqSave<'a, A> {
    pub fn new(arch: &'a A) -> Self {
        let was_enabled = arch.interrupts_enabled();
        arch.disable_interrupts();
        Self { arch, was_enabled }
    }

    /// Interrupt level at the time the guard was taken
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl<A: Arch> Drop for IrqSave<'_, A> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.arch.enable_interrupts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_save_restores_level() {
        let arch = Hosted::new();
        arch.enable_interrupts();
        {
            let guard = IrqSave::new(&arch);
            assert!(guard.was_enabled());
            assert!(!arch.interrupts_enabled());
            {
                let inner = IrqSave::new(&arch);
                assert!(!inner.was_enabled());
            }
            assert!(!arch.interrupts_enabled());
        }
        assert!(arch.interrupts_enabled());
    }
}
