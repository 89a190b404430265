//! Buddy Page Allocator
//!
//! This crate implements the physical page allocator of a kernel memory
//! subsystem, featuring:
//! - Power-of-two, naturally aligned block allocation over page frames
//! - Intrusive free lists threaded through the page descriptors themselves
//! - Eager buddy merging on free
//! - Range insert/remove for boot-time memory map accounting
//! - An IRQ-safe locked wrapper for kernel-wide sharing

#![no_std]

extern crate alloc;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Default page size
pub const DEFAULT_PAGE_SIZE: usize = 0x1000;

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Requested order is above the allocator's last order.
    InvalidOrder,
    /// No free block at or above the requested order.
    NoMemory,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocError::InvalidOrder => f.write_str("invalid block order"),
            AllocError::NoMemory => f.write_str("out of memory"),
        }
    }
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Checks whether the frame number has the demanded alignment.
///
/// Equivalent to `pfn % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(pfn: u64, align: u64) -> bool {
    pfn & (align - 1) == 0
}

pub mod page;
pub use page::{FrameTable, Page, PageRegistry, PageState};

pub mod buddy;
pub use buddy::{
    pages_per_block, AllocFlags, BuddyPageAllocator, BuddyStats, PageBlock, MAX_ORDER,
};

pub mod locked_allocator;
pub use locked_allocator::LockedPageAllocator;
