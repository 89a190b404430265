//! Page descriptor metadata
//!
//! One descriptor per physical frame, carrying the allocation state and the
//! intrusive free-list link used while the frame heads a free block.

/// Allocation state of a single page frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Part of a block sitting in one of the free lists.
    Free,
    /// Handed out, reserved, or never reported to the allocator.
    Allocated,
}

/// Page descriptor
#[derive(Debug, Clone)]
pub struct Page {
    pfn: u64,
    pub(crate) state: PageState,
    /// Next block head in the same free list. Only meaningful on block heads.
    pub(crate) next_free: Option<u64>,
}

impl Page {
    /// Create an untracked descriptor for frame `pfn`.
    pub const fn new(pfn: u64) -> Self {
        Self {
            pfn,
            state: PageState::Allocated,
            next_free: None,
        }
    }

    /// Frame number of this page.
    pub const fn pfn(&self) -> u64 {
        self.pfn
    }

    pub const fn state(&self) -> PageState {
        self.state
    }

    pub fn is_free(&self) -> bool {
        self.state == PageState::Free
    }
}
