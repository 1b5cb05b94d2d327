// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Page Allocation Interface
//!
//! The scheduler takes every thread block from a page-granularity
//! allocator owned by the embedding kernel. This module defines that
//! boundary and a heap-backed implementation.
//!
//! # Design
//!
//! - Blocks are `count` contiguous pages, aligned to `PAGE_SIZE`
//! - Allocation failure is reported as `None`, never by panicking,
//!   unless the caller passes [`PallocFlags::ASSERT`]
//! - [`HeapPages`] carves pages out of the global allocator and can be
//!   capped, which is how exhaustion is exercised on the host
//!
//! # Usage
//!
//! ```ignore
//! static PAGES: HeapPages = HeapPages::new();
//!
//! let block = PAGES.alloc_pages(4, PallocFlags::ZERO).ok_or(Error::NoMemory)?;
//! unsafe { PAGES.free_pages(block, 4) };
//! ```

use alloc::alloc::{alloc, alloc_zeroed, dealloc, Layout};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Page size in bytes
pub const PAGE_SIZE: usize = 4096;

/// Page size shift for quick division/multiplication
pub const PAGE_SIZE_SHIFT: u8 = 12;

/// Mask for page-aligned addresses
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// Check if an address is page-aligned
#[inline]
pub const fn is_page_aligned(addr: usize) -> bool {
    (addr & PAGE_MASK) == 0
}

/// Convert pages to bytes
#[inline]
pub const fn pages_to_bytes(pages: usize) -> usize {
    pages << PAGE_SIZE_SHIFT
}

bitflags::bitflags! {
    /// Page allocation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PallocFlags: u32 {
        /// Halt the kernel instead of returning `None`
        const ASSERT = 1 << 0;

        /// Zero the pages before returning them
        const ZERO = 1 << 1;

        /// Take the pages from the user pool
        const USER = 1 << 2;
    }
}

/// Page-granularity allocator used for thread blocks
pub trait PageAllocator: Sync {
    /// Allocate `count` contiguous, page-aligned pages
    fn alloc_pages(&self, count: usize, flags: PallocFlags) -> Option<NonNull<u8>>;

    /// Return pages obtained from [`PageAllocator::alloc_pages`]
    ///
    /// # Safety
    ///
    /// `base` must come from `alloc_pages(count, _)` on this allocator and
    /// must not be used afterwards.
    unsafe fn free_pages(&self, base: NonNull<u8>, count: usize);
}

/// ============================================================================
/// Heap-backed Allocator
/// ============================================================================

/// Page allocator backed by the global heap
///
/// Both pools come from the same heap; [`PallocFlags::USER`] is accepted
/// and ignored.
pub struct HeapPages {
    /// Maximum number of pages outstanding at once
    limit: Option<usize>,

    /// Pages currently outstanding
    in_use: AtomicUsize,

    /// Successful allocations
    allocs: AtomicUsize,

    /// Frees
    frees: AtomicUsize,
}

impl HeapPages {
    /// Create an allocator limited only by the heap
    pub const fn new() -> Self {
        Self {
            limit: None,
            in_use: AtomicUsize::new(0),
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    /// Create an allocator that hands out at most `pages` pages at once
    pub const fn with_limit(pages: usize) -> Self {
        Self {
            limit: Some(pages),
            in_use: AtomicUsize::new(0),
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    /// Pages currently outstanding
    pub fn pages_in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Number of successful `alloc_pages` calls
    pub fn alloc_count(&self) -> usize {
        self.allocs.load(Ordering::Acquire)
    }

    /// Number of `free_pages` calls
    pub fn free_count(&self) -> usize {
        self.frees.load(Ordering::Acquire)
    }

    fn layout(count: usize) -> Option<Layout> {
        Layout::from_size_align(pages_to_bytes(count), PAGE_SIZE).ok()
    }

    fn reserve(&self, count: usize) -> bool {
        let limit = match self.limit {
            Some(limit) => limit,
            None => {
                self.in_use.fetch_add(count, Ordering::AcqRel);
                return true;
            }
        };

        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(count).filter(|&total| total <= limit)
            })
            .is_ok()
    }
}

impl Default for HeapPages {
    fn default() -> Self {
        Self::new()
    }
}

impl PageAllocator for HeapPages {
    fn alloc_pages(&self, count: usize, flags: PallocFlags) -> Option<NonNull<u8>> {
        let block = match Self::layout(count) {
            Some(layout) if count > 0 && self.reserve(count) => {
                // SAFETY: layout has a non-zero size.
                let raw = unsafe {
                    if flags.contains(PallocFlags::ZERO) {
                        alloc_zeroed(layout)
                    } else {
                        alloc(layout)
                    }
                };
                let block = NonNull::new(raw);
                if block.is_none() {
                    self.in_use.fetch_sub(count, Ordering::AcqRel);
                }
                block
            }
            _ => None,
        };

        match block {
            Some(ptr) => {
                self.allocs.fetch_add(1, Ordering::AcqRel);
                Some(ptr)
            }
            None if flags.contains(PallocFlags::ASSERT) => {
                crate::fatal!("out of pages allocating {} page(s)", count)
            }
            None => None,
        }
    }

    unsafe fn free_pages(&self, base: NonNull<u8>, count: usize) {
        if let Some(layout) = Self::layout(count) {
            dealloc(base.as_ptr(), layout);
            self.in_use.fetch_sub(count, Ordering::AcqRel);
            self.frees.fetch_add(1, Ordering::AcqRel);
        }
    }
}
