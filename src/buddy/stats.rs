//! Statistics and debugging for buddy allocator
//!
//! Provides a snapshot of the free lists and failure reporting.

use super::buddy_block::{pages_per_block, MAX_ORDER};

/// Buddy system statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyStats {
    pub free_pages: u64,
    pub free_blocks_by_order: [usize; MAX_ORDER + 1],
    #[cfg(feature = "tracking")]
    pub allocations: u64,
    #[cfg(feature = "tracking")]
    pub frees: u64,
    #[cfg(feature = "tracking")]
    pub splits: u64,
    #[cfg(feature = "tracking")]
    pub merges: u64,
    #[cfg(feature = "tracking")]
    pub failed_allocations: u64,
}

impl Default for BuddyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BuddyStats {
    pub const fn new() -> Self {
        Self {
            free_pages: 0,
            free_blocks_by_order: [0; MAX_ORDER + 1],
            #[cfg(feature = "tracking")]
            allocations: 0,
            #[cfg(feature = "tracking")]
            frees: 0,
            #[cfg(feature = "tracking")]
            splits: 0,
            #[cfg(feature = "tracking")]
            merges: 0,
            #[cfg(feature = "tracking")]
            failed_allocations: 0,
        }
    }

    /// Pages held in free blocks of each order, recomputed from block counts.
    pub fn free_pages_in_order(&self, order: usize) -> u64 {
        self.free_blocks_by_order[order] as u64 * pages_per_block(order)
    }
}

/// Detailed memory statistics reporter
#[cfg(feature = "tracking")]
pub struct MemoryStatsReporter;

#[cfg(feature = "tracking")]
impl MemoryStatsReporter {
    /// Print detailed allocation failure statistics
    /// This is a standalone function to keep allocation logic clean
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats(
        page_size: usize,
        last_order: usize,
        stats: &BuddyStats,
        request_order: usize,
    ) {
        #[cfg(feature = "log")]
        use log::error;
        error!("========================================");
        error!(
            "Request: order {} ({} pages, {} KB)",
            request_order,
            pages_per_block(request_order),
            (pages_per_block(request_order) * page_size as u64) / 1024
        );
        error!(
            "  Free pages: {} ({} KB)",
            stats.free_pages,
            (stats.free_pages * page_size as u64) / 1024
        );
        error!(
            "  Allocations: {}, frees: {}, failed: {}",
            stats.allocations,
            stats.frees,
            stats.failed_allocations
        );
        error!("  Splits: {}, merges: {}", stats.splits, stats.merges);
        error!("  Free blocks by order:");

        for order in (0..=last_order).rev() {
            let count = stats.free_blocks_by_order[order];
            if count > 0 {
                let block_size = pages_per_block(order) * page_size as u64;
                error!(
                    "    Order {}: {} blocks ({} KB each, {} KB total)",
                    order,
                    count,
                    block_size / 1024,
                    (count as u64 * block_size) / 1024
                );
            }
        }
        error!("========================================");
    }
}
