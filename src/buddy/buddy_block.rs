//! Buddy block metadata
//!
//! Represents an allocated block of pages with order and frame information.

use bitflags::bitflags;

/// Maximum order supported
pub const MAX_ORDER: usize = 16; // 2^16 pages, 256MB blocks with 4KB pages

/// Number of pages in a block of the given order.
#[inline]
pub const fn pages_per_block(order: usize) -> u64 {
    1 << order
}

bitflags! {
    /// Caller hints for an allocation.
    ///
    /// The buddy allocator does not interpret these. They ride along in the
    /// returned [`PageBlock`] for the mapping layer to act upon.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllocFlags: u32 {
        /// Contents should be zeroed before use.
        const ZERO = 1 << 0;
        /// Block is intended for device DMA.
        const DMA = 1 << 1;
    }
}

/// A block handed out by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBlock {
    pub pfn: u64,
    pub order: usize,
    pub flags: AllocFlags,
}

impl PageBlock {
    pub const fn new(pfn: u64, order: usize, flags: AllocFlags) -> Self {
        Self { pfn, order, flags }
    }

    /// Number of pages covered by this block.
    pub const fn page_count(&self) -> u64 {
        pages_per_block(self.order)
    }

    /// One past the last frame of this block.
    pub const fn end_pfn(&self) -> u64 {
        self.pfn + self.page_count()
    }
}
