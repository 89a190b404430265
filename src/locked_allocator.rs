//! Lock-protected buddy page allocator.
//!
//! The buddy allocator itself has no internal synchronization. This wrapper
//! puts it behind an IRQ-safe spin lock so a single instance can be shared by
//! every subsystem that needs physical pages.

use alloc::string::String;

use kspin::{SpinNoIrq, SpinNoIrqGuard};

use crate::buddy::{AllocFlags, BuddyPageAllocator, BuddyStats, PageBlock};
use crate::page::PageRegistry;
use crate::AllocResult;

/// Buddy page allocator shared behind a `SpinNoIrq` lock
///
/// Every operation takes the lock for its whole duration. Operations must not
/// be called while the same thread holds the guard returned by [`Self::lock`].
pub struct LockedPageAllocator<R: PageRegistry> {
    inner: SpinNoIrq<BuddyPageAllocator<R>>,
}

impl<R: PageRegistry> LockedPageAllocator<R> {
    pub const fn new(allocator: BuddyPageAllocator<R>) -> Self {
        Self {
            inner: SpinNoIrq::new(allocator),
        }
    }

    /// Lock the allocator for a sequence of operations.
    pub fn lock(&self) -> SpinNoIrqGuard<'_, BuddyPageAllocator<R>> {
        self.inner.lock()
    }

    /// Allocate a block of `2^order` pages
    pub fn allocate_pages(&self, order: usize, flags: AllocFlags) -> AllocResult<PageBlock> {
        self.inner.lock().allocate_pages(order, flags)
    }

    /// Free a block previously returned by [`Self::allocate_pages`]
    pub fn free_pages(&self, block: PageBlock) {
        self.inner.lock().free_pages(block.pfn, block.order);
    }

    /// Report a run of pages as available
    pub fn insert_pages(&self, range_start: u64, page_count: u64) {
        self.inner.lock().insert_pages(range_start, page_count);
    }

    /// Withdraw a previously inserted run of pages
    pub fn remove_pages(&self, range_start: u64, page_count: u64) {
        self.inner.lock().remove_pages(range_start, page_count);
    }

    pub fn total_free(&self) -> u64 {
        self.inner.lock().total_free()
    }

    pub fn stats(&self) -> BuddyStats {
        self.inner.lock().stats()
    }

    pub fn dump(&self) -> String {
        self.inner.lock().dump()
    }

    /// Unwrap the allocator, consuming the lock.
    pub fn into_inner(self) -> BuddyPageAllocator<R> {
        self.inner.into_inner()
    }
}
