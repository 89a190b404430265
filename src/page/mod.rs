//! Page descriptors and the registry that maps frame numbers to them
//!
//! The buddy allocator never owns page metadata. It borrows descriptors
//! through [`PageRegistry`] and threads its free lists through them.

pub mod descriptor;
pub mod frame_table;

pub use descriptor::{Page, PageState};
pub use frame_table::FrameTable;

/// Lookup of page descriptors by frame number.
///
/// Frame numbers handed to the allocator must lie in
/// `base_pfn()..base_pfn() + frame_count()`.
pub trait PageRegistry {
    /// The size of a memory page.
    const PAGE_SIZE: usize;

    /// Frame number of the first descriptor. Block alignment is relative to it.
    fn base_pfn(&self) -> u64;

    /// Number of descriptors in the registry.
    fn frame_count(&self) -> u64;

    /// Shared access to the descriptor for `pfn`.
    fn page(&self, pfn: u64) -> Option<&Page>;

    /// Exclusive access to the descriptor for `pfn`.
    fn page_mut(&mut self, pfn: u64) -> Option<&mut Page>;

    /// Physical base address of the frame.
    fn base_address(&self, pfn: u64) -> u64 {
        pfn * Self::PAGE_SIZE as u64
    }

    /// Whether `pfn` has a descriptor.
    fn contains(&self, pfn: u64) -> bool {
        let base = self.base_pfn();
        pfn >= base && pfn - base < self.frame_count()
    }
}

impl<R: PageRegistry + ?Sized> PageRegistry for &mut R {
    const PAGE_SIZE: usize = R::PAGE_SIZE;

    fn base_pfn(&self) -> u64 {
        (**self).base_pfn()
    }

    fn frame_count(&self) -> u64 {
        (**self).frame_count()
    }

    fn page(&self, pfn: u64) -> Option<&Page> {
        (**self).page(pfn)
    }

    fn page_mut(&mut self, pfn: u64) -> Option<&mut Page> {
        (**self).page_mut(pfn)
    }

    fn base_address(&self, pfn: u64) -> u64 {
        (**self).base_address(pfn)
    }
}
