//! Arena of page descriptors indexed by frame number

use alloc::vec::Vec;

use super::{Page, PageRegistry};

/// A contiguous table of page descriptors
///
/// Descriptor `i` describes frame `base_pfn + i`. All descriptors start out
/// [`Allocated`](super::PageState::Allocated), i.e. unknown to the allocator.
pub struct FrameTable<const PAGE_SIZE: usize = { crate::DEFAULT_PAGE_SIZE }> {
    base_pfn: u64,
    pages: Vec<Page>,
}

impl<const PAGE_SIZE: usize> FrameTable<PAGE_SIZE> {
    /// Create a table describing `frame_count` frames starting at `base_pfn`.
    pub fn new(base_pfn: u64, frame_count: u64) -> Self {
        let pages = (base_pfn..base_pfn + frame_count).map(Page::new).collect();
        Self { base_pfn, pages }
    }

    /// Create a table describing every whole page inside a physical region.
    pub fn from_region(start_addr: usize, size: usize) -> Self {
        let aligned_start = (start_addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let aligned_end = (start_addr + size) & !(PAGE_SIZE - 1);
        let frame_count = aligned_end.saturating_sub(aligned_start) / PAGE_SIZE;
        Self::new((aligned_start / PAGE_SIZE) as u64, frame_count as u64)
    }

    /// Frame number of the page containing `addr`.
    pub const fn pfn_of(addr: usize) -> u64 {
        (addr / PAGE_SIZE) as u64
    }

    fn index_of(&self, pfn: u64) -> Option<usize> {
        let index = pfn.checked_sub(self.base_pfn)?;
        if index < self.pages.len() as u64 {
            Some(index as usize)
        } else {
            None
        }
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Page> {
        self.pages.iter()
    }
}

impl<const PAGE_SIZE: usize> PageRegistry for FrameTable<PAGE_SIZE> {
    const PAGE_SIZE: usize = PAGE_SIZE;

    fn base_pfn(&self) -> u64 {
        self.base_pfn
    }

    fn frame_count(&self) -> u64 {
        self.pages.len() as u64
    }

    fn page(&self, pfn: u64) -> Option<&Page> {
        let index = self.index_of(pfn)?;
        self.pages.get(index)
    }

    fn page_mut(&mut self, pfn: u64) -> Option<&mut Page> {
        let index = self.index_of(pfn)?;
        self.pages.get_mut(index)
    }
}
