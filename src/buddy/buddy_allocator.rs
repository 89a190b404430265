//! Buddy page allocator over a page registry
//!
//! Free blocks are tracked by their head page, linked into one address-sorted
//! list per order. Splitting happens on allocation, merging on free.

use alloc::string::String;
use core::fmt::Write;

#[cfg(feature = "log")]
use log::{debug, info, trace, warn};

use crate::page::{PageRegistry, PageState};
use crate::{is_aligned, AllocError, AllocResult};

use super::buddy_block::{pages_per_block, AllocFlags, PageBlock, MAX_ORDER};
use super::free_list::{FreeList, FreeListIter};
use super::stats::BuddyStats;

/// Buddy page allocator
///
/// Owns one free list per order `0..=last_order`. Page descriptors, and the
/// links stored in them, belong to the registry `R`.
pub struct BuddyPageAllocator<R: PageRegistry> {
    registry: R,
    free_lists: [FreeList; MAX_ORDER + 1],
    last_order: usize,
    base_pfn: u64,
    total_free: u64,
    #[cfg(feature = "tracking")]
    stats: BuddyStats,
}

impl<R: PageRegistry> BuddyPageAllocator<R> {
    /// Create an allocator with the largest supported block order.
    pub fn new(registry: R) -> Self {
        Self::with_last_order(registry, MAX_ORDER)
    }

    /// Create an allocator whose largest blocks are `2^last_order` pages.
    pub fn with_last_order(registry: R, last_order: usize) -> Self {
        assert!(
            last_order <= MAX_ORDER,
            "last order {} exceeds maximum order {}",
            last_order,
            MAX_ORDER
        );
        let base_pfn = registry.base_pfn();
        Self {
            registry,
            free_lists: [const { FreeList::new() }; MAX_ORDER + 1],
            last_order,
            base_pfn,
            total_free: 0,
            #[cfg(feature = "tracking")]
            stats: BuddyStats::new(),
        }
    }

    pub const fn last_order(&self) -> usize {
        self.last_order
    }

    /// Pages currently sitting in any free list.
    pub const fn total_free(&self) -> u64 {
        self.total_free
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Give the registry back, dropping all free-list bookkeeping.
    pub fn into_registry(self) -> R {
        self.registry
    }

    /// Number of free blocks at `order`.
    pub fn free_block_count(&self, order: usize) -> usize {
        if order <= self.last_order {
            self.free_lists[order].len()
        } else {
            0
        }
    }

    /// Head frames of the free blocks at `order`, lowest first.
    pub fn free_blocks(&self, order: usize) -> FreeListIter<'_, R> {
        assert!(order <= self.last_order, "order {} out of range", order);
        self.free_lists[order].iter(&self.registry)
    }

    /// Whether `pfn` heads a free block in the list for `order`.
    pub fn is_free_block(&self, order: usize, pfn: u64) -> bool {
        order <= self.last_order && self.free_lists[order].contains(&self.registry, pfn)
    }

    /// Alignment check relative to the registry's first frame.
    fn block_aligned(&self, order: usize, pfn: u64) -> bool {
        pfn >= self.base_pfn && is_aligned(pfn - self.base_pfn, pages_per_block(order))
    }

    fn buddy_of(&self, order: usize, pfn: u64) -> u64 {
        self.base_pfn + ((pfn - self.base_pfn) ^ pages_per_block(order))
    }

    fn insert_free_block(&mut self, order: usize, pfn: u64) {
        assert!(
            order <= self.last_order,
            "insert: order {} exceeds last order {}",
            order,
            self.last_order
        );
        assert!(
            self.block_aligned(order, pfn),
            "insert: pfn {:#x} is not aligned for order {}",
            pfn,
            order
        );
        assert!(
            self.free_lists[order].insert_sorted(&mut self.registry, pfn),
            "insert: pfn {:#x} already linked at order {} or not in registry",
            pfn,
            order
        );
        self.total_free += pages_per_block(order);
    }

    fn remove_free_block(&mut self, order: usize, pfn: u64) {
        assert!(
            order <= self.last_order,
            "remove: order {} exceeds last order {}",
            order,
            self.last_order
        );
        assert!(
            self.block_aligned(order, pfn),
            "remove: pfn {:#x} is not aligned for order {}",
            pfn,
            order
        );
        assert!(
            self.free_lists[order].remove(&mut self.registry, pfn),
            "remove: pfn {:#x} is not a free block at order {}",
            pfn,
            order
        );
        self.total_free -= pages_per_block(order);
    }

    /// Write `state` into every page of the block.
    fn set_block_state(&mut self, pfn: u64, page_count: u64, state: PageState) {
        for frame in pfn..pfn + page_count {
            match self.registry.page_mut(frame) {
                Some(page) => page.state = state,
                None => panic!("pfn {:#x} is not in the page registry", frame),
            }
        }
    }

    fn split_block(&mut self, order: usize, pfn: u64) {
        assert!(
            order > 0 && order <= self.last_order,
            "split: order {} out of range",
            order
        );

        self.remove_free_block(order, pfn);

        let lower_order = order - 1;
        let upper = pfn + pages_per_block(lower_order);
        self.insert_free_block(lower_order, pfn);
        self.insert_free_block(lower_order, upper);

        trace!(
            "buddy allocator: split {:#x} order {} -> {:#x}, {:#x}",
            pfn,
            order,
            pfn,
            upper
        );
        #[cfg(feature = "tracking")]
        {
            self.stats.splits += 1;
        }
    }

    /// Merge a free block with its buddy if the buddy is a free block head
    /// at the same order. Returns the head of the merged block.
    fn merge_buddies(&mut self, order: usize, pfn: u64) -> Option<u64> {
        assert!(order < self.last_order, "merge: order {} out of range", order);

        let buddy = self.buddy_of(order, pfn);
        let buddy_free = self
            .registry
            .page(buddy)
            .is_some_and(|page| page.state == PageState::Free);
        if !buddy_free
            || !self.block_aligned(order, buddy)
            || !self.free_lists[order].contains(&self.registry, buddy)
        {
            return None;
        }

        self.remove_free_block(order, pfn);
        self.remove_free_block(order, buddy);

        let merged = pfn.min(buddy);
        self.insert_free_block(order + 1, merged);

        trace!(
            "buddy allocator: merged {:#x} and {:#x} into order {}",
            pfn,
            buddy,
            order + 1
        );
        #[cfg(feature = "tracking")]
        {
            self.stats.merges += 1;
        }
        Some(merged)
    }

    /// Report `page_count` pages starting at `range_start` as available.
    ///
    /// The run is carved into the largest aligned blocks that fit, in address
    /// order. Neighbouring free blocks outside the run are not merged.
    pub fn insert_pages(&mut self, range_start: u64, page_count: u64) {
        if page_count == 0 {
            warn!("buddy allocator: inserting 0 pages at pfn {:#x}", range_start);
            return;
        }

        let end_pfn = range_start + page_count;
        assert!(
            self.registry.contains(range_start) && self.registry.contains(end_pfn - 1),
            "insert: range [{:#x}, {:#x}) is not in the page registry",
            range_start,
            end_pfn
        );
        for pfn in range_start..end_pfn {
            if let Some(page) = self.registry.page(pfn) {
                assert!(
                    page.state != PageState::Free,
                    "insert: pfn {:#x} is already free",
                    pfn
                );
            }
        }
        self.set_block_state(range_start, page_count, PageState::Free);

        let mut pfn = range_start;
        while pfn < end_pfn {
            let mut order = self.last_order;
            while order > 0
                && (pfn + pages_per_block(order) > end_pfn || !self.block_aligned(order, pfn))
            {
                order -= 1;
            }

            self.insert_free_block(order, pfn);
            pfn += pages_per_block(order);
        }

        debug!(
            "buddy allocator: inserted {} pages at pfn {:#x}, {} free",
            page_count,
            range_start,
            self.total_free
        );
    }

    /// Withdraw a previously inserted run of pages.
    ///
    /// Every block in the run must still be free and wholly inside the run.
    pub fn remove_pages(&mut self, range_start: u64, page_count: u64) {
        if page_count == 0 {
            warn!("buddy allocator: removing 0 pages at pfn {:#x}", range_start);
            return;
        }

        let end_pfn = range_start + page_count;
        let mut pfn = range_start;
        while pfn < end_pfn {
            let order = match self.find_order(pfn) {
                Some(order) => order,
                None => panic!("remove: pfn {:#x} does not head a free block", pfn),
            };
            let block_pages = pages_per_block(order);
            assert!(
                pfn + block_pages <= end_pfn,
                "remove: free block {:#x} order {} extends past end of range {:#x}",
                pfn,
                order,
                end_pfn
            );

            self.remove_free_block(order, pfn);
            self.set_block_state(pfn, block_pages, PageState::Allocated);
            pfn += block_pages;
        }

        debug!(
            "buddy allocator: removed {} pages at pfn {:#x}, {} free",
            page_count,
            range_start,
            self.total_free
        );
    }

    /// Order of the free block headed by `pfn`, found by scanning every list.
    fn find_order(&self, pfn: u64) -> Option<usize> {
        (0..=self.last_order).find(|&order| self.free_lists[order].contains(&self.registry, pfn))
    }

    /// Allocate a block of `2^order` pages.
    ///
    /// Takes the lowest-addressed block of the smallest non-empty order at or
    /// above `order` and splits it down. Never merges.
    pub fn allocate_pages(&mut self, order: usize, flags: AllocFlags) -> AllocResult<PageBlock> {
        if order > self.last_order {
            debug!(
                "buddy allocator: order {} exceeds last order {}",
                order,
                self.last_order
            );
            return Err(AllocError::InvalidOrder);
        }

        let Some(mut current_order) =
            (order..=self.last_order).find(|&o| !self.free_lists[o].is_empty())
        else {
            debug!(
                "buddy allocator: allocation failure: order {}, {} pages free",
                order,
                self.total_free
            );
            #[cfg(feature = "tracking")]
            {
                self.stats.failed_allocations += 1;
                self.print_alloc_failure_stats(order);
            }
            return Err(AllocError::NoMemory);
        };

        let pfn = match self.free_lists[current_order].first() {
            Some(pfn) => pfn,
            None => return Err(AllocError::NoMemory),
        };

        // Split down to required order, always keeping the lower half
        while current_order > order {
            self.split_block(current_order, pfn);
            current_order -= 1;
        }

        self.remove_free_block(order, pfn);
        self.set_block_state(pfn, pages_per_block(order), PageState::Allocated);

        #[cfg(feature = "tracking")]
        {
            self.stats.allocations += 1;
        }
        Ok(PageBlock::new(pfn, order, flags))
    }

    /// Return a block of `2^order` pages obtained from [`Self::allocate_pages`].
    ///
    /// `order` must be the order the block was allocated with. The block is
    /// merged with free buddies for as long as possible.
    pub fn free_pages(&mut self, pfn: u64, order: usize) {
        assert!(
            order <= self.last_order,
            "free: order {} exceeds last order {}",
            order,
            self.last_order
        );
        assert!(
            self.block_aligned(order, pfn),
            "free: pfn {:#x} is not aligned for order {}",
            pfn,
            order
        );
        // Every page of the block must be allocated, not just its head
        for frame in pfn..pfn + pages_per_block(order) {
            match self.registry.page(frame) {
                Some(page) if page.state == PageState::Allocated => {}
                Some(_) => panic!(
                    "free: double free of pfn {:#x} in block {:#x} order {}",
                    frame, pfn, order
                ),
                None => panic!("free: pfn {:#x} is not in the page registry", frame),
            }
        }

        self.set_block_state(pfn, pages_per_block(order), PageState::Free);
        self.insert_free_block(order, pfn);
        #[cfg(feature = "tracking")]
        {
            self.stats.frees += 1;
        }

        let mut block = pfn;
        let mut order = order;
        while order < self.last_order {
            match self.merge_buddies(order, block) {
                Some(merged) => {
                    block = merged;
                    order += 1;
                }
                None => break,
            }
        }
    }

    /// Snapshot of the free lists.
    pub fn stats(&self) -> BuddyStats {
        #[cfg(feature = "tracking")]
        let mut stats = self.stats;
        #[cfg(not(feature = "tracking"))]
        let mut stats = BuddyStats::new();

        stats.free_pages = self.total_free;
        for order in 0..=self.last_order {
            stats.free_blocks_by_order[order] = self.free_lists[order].len();
        }
        stats
    }

    #[cfg(feature = "tracking")]
    fn print_alloc_failure_stats(&self, order: usize) {
        super::stats::MemoryStatsReporter::print_alloc_failure_stats(
            R::PAGE_SIZE,
            self.last_order,
            &self.stats(),
            order,
        );
    }

    /// Text rendering of every free list, one line per order.
    ///
    /// Each block is shown as its inclusive physical byte range.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "*** buddy page allocator - free list ***");
        for order in 0..=self.last_order {
            let _ = write!(out, "[{:02}] ", order);
            for pfn in self.free_lists[order].iter(&self.registry) {
                let start = self.registry.base_address(pfn);
                let end = start + pages_per_block(order) * R::PAGE_SIZE as u64 - 1;
                let _ = write!(out, "{:x}--{:x} ", start, end);
            }
            out.push('\n');
        }
        out
    }

    /// Log the free lists at info level
    pub fn print_free_lists(&self) {
        for line in self.dump().lines() {
            info!("{}", line);
        }
    }
}
