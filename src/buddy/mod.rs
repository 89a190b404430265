//! Buddy page allocator module
//!
//! This module provides the buddy system implementation with:
//! - Address-sorted intrusive free lists, one per order
//! - Split on allocation, cascading merge on free
//! - Statistics and free-list dumps for debugging

pub mod buddy_allocator;
pub mod buddy_block;
pub mod free_list;
pub mod stats;

pub use buddy_allocator::BuddyPageAllocator;
pub use buddy_block::{pages_per_block, AllocFlags, PageBlock, MAX_ORDER};
pub use free_list::{FreeList, FreeListIter};
#[cfg(feature = "tracking")]
pub use stats::MemoryStatsReporter;
pub use stats::BuddyStats;
