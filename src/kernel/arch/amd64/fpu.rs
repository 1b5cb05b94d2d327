// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! x86-64 Floating Point Unit (FPU) support
//!
//! Each thread owns one `FXSAVE` area. The switch routine saves the
//! outgoing thread's x87/SSE registers into its area and reloads the
//! incoming thread's area on every switch.

use core::arch::asm;

/// Size of the legacy `FXSAVE` region
pub const FPU_AREA_SIZE: usize = 512;

/// x87 control word after `FNINIT`
pub const FCW_DEFAULT: u16 = 0x037f;

/// Offset of MXCSR within the save area
const MXCSR_OFFSET: usize = 24;

/// Per-thread FPU register save area
///
/// `FXSAVE` requires 16-byte alignment.
#[repr(C, align(16))]
#[derive(Clone)]
pub struct FpuArea([u8; FPU_AREA_SIZE]);

const _: () = assert!(core::mem::size_of::<FpuArea>() == FPU_AREA_SIZE);
const _: () = assert!(core::mem::align_of::<FpuArea>() == 16);

impl FpuArea {
    /// Create a zero-filled area
    ///
    /// A zero-filled area has an invalid MXCSR of 0 masking nothing; it
    /// must be initialised before it is ever loaded.
    pub const fn zeroed() -> Self {
        Self([0; FPU_AREA_SIZE])
    }

    /// Fill this area with a freshly reset FPU state
    ///
    /// The x87 unit is reset with `FNINIT`. MXCSR and the SSE registers
    /// are taken from the caller. The caller's own registers are left
    /// exactly as they were.
    pub fn init_fresh(&mut self) {
        let mut saved = FpuArea::zeroed();
        // SAFETY: both areas are valid, aligned and exclusively borrowed.
        unsafe {
            asm!(
                "fxsave64 [{saved}]",
                "fninit",
                "fxsave64 [{fresh}]",
                "fxrstor64 [{saved}]",
                saved = in(reg) saved.0.as_mut_ptr(),
                fresh = in(reg) self.0.as_mut_ptr(),
                options(nostack, preserves_flags),
            );
        }
    }

    /// x87 control word stored in the area
    pub fn fcw(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    /// MXCSR stored in the area
    pub fn mxcsr(&self) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.0[MXCSR_OFFSET..MXCSR_OFFSET + 4]);
        u32::from_le_bytes(raw)
    }
}

/// Read the live x87 control word
pub fn read_fcw() -> u16 {
    let mut fcw: u16 = 0;
    // SAFETY: FNSTCW only stores two bytes to the given location.
    unsafe {
        asm!(
            "fnstcw word ptr [{}]",
            in(reg) &mut fcw as *mut u16,
            options(nostack, preserves_flags),
        );
    }
    fcw
}

/// Load a new x87 control word
pub fn write_fcw(fcw: u16) {
    // SAFETY: FLDCW only changes x87 rounding/precision/exception masks.
    unsafe {
        asm!(
            "fldcw word ptr [{}]",
            in(reg) &fcw as *const u16,
            options(nostack, preserves_flags, readonly),
        );
    }
}
