//! Intrusive free list threaded through page descriptors
//!
//! A list only stores its head frame number and length. Each block head
//! carries the frame number of its successor in [`Page::next_free`], so the
//! list needs no storage beyond the descriptors it links.
//!
//! [`Page::next_free`]: crate::Page

#[cfg(feature = "log")]
use log::error;

use crate::page::PageRegistry;

/// Address-sorted singly-linked list of free block heads
pub struct FreeList {
    head: Option<u64>,
    len: usize,
}

impl FreeList {
    /// Create a new empty free list
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Insert a block head in sorted order (ascending by frame number)
    ///
    /// Returns `false` if the block is already linked or the list is corrupt.
    pub fn insert_sorted<R: PageRegistry>(&mut self, registry: &mut R, pfn: u64) -> bool {
        let mut prev = None;
        let mut current = self.head;
        let mut visited = 0;

        while let Some(idx) = current {
            if visited > self.len {
                error!("Potential cycle detected during insert of pfn {:#x}", pfn);
                return false;
            }
            if idx == pfn {
                return false;
            }
            if idx > pfn {
                break; // Found position
            }

            match registry.page(idx) {
                Some(page) => {
                    prev = current;
                    current = page.next_free;
                }
                None => {
                    error!("Invalid frame {:#x} linked in free list", idx);
                    return false;
                }
            }
            visited += 1;
        }

        match registry.page_mut(pfn) {
            Some(page) => page.next_free = current,
            None => return false,
        }

        match prev {
            Some(prev) => match registry.page_mut(prev) {
                Some(prev_page) => prev_page.next_free = Some(pfn),
                None => return false,
            },
            None => self.head = Some(pfn),
        }

        self.len += 1;
        true
    }

    /// Unlink a block head and clear its link
    ///
    /// Returns `false` if the block is not in this list.
    pub fn remove<R: PageRegistry>(&mut self, registry: &mut R, pfn: u64) -> bool {
        let Some(prev) = self.find_prev(registry, pfn) else {
            return false;
        };

        let next = match registry.page_mut(pfn) {
            Some(page) => page.next_free.take(),
            None => return false,
        };

        match prev {
            Some(prev) => match registry.page_mut(prev) {
                Some(prev_page) => prev_page.next_free = next,
                None => return false,
            },
            None => self.head = next,
        }

        self.len -= 1;
        true
    }

    /// Whether `pfn` heads a block in this list.
    pub fn contains<R: PageRegistry>(&self, registry: &R, pfn: u64) -> bool {
        self.find_prev(registry, pfn).is_some()
    }

    /// Locate `pfn` in the list
    ///
    /// Returns `Some(prev)` where `prev` is the block before it (or `None` if
    /// it is the head), or `None` if `pfn` is absent.
    fn find_prev<R: PageRegistry>(&self, registry: &R, pfn: u64) -> Option<Option<u64>> {
        let mut prev = None;
        let mut current = self.head;
        let mut visited = 0;

        while let Some(idx) = current {
            if visited > self.len {
                error!("Potential cycle detected during search for pfn {:#x}", pfn);
                return None;
            }
            // Early termination: list is sorted by frame number
            if idx > pfn {
                break;
            }
            if idx == pfn {
                return Some(prev);
            }
            prev = current;
            current = registry.page(idx)?.next_free;
            visited += 1;
        }

        None
    }

    /// Lowest-addressed block head, if any.
    pub fn first(&self) -> Option<u64> {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Iterate block heads in ascending order
    pub fn iter<'a, R: PageRegistry>(&self, registry: &'a R) -> FreeListIter<'a, R> {
        FreeListIter {
            registry,
            current: self.head,
        }
    }
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator for FreeList
pub struct FreeListIter<'a, R: PageRegistry> {
    registry: &'a R,
    current: Option<u64>,
}

impl<R: PageRegistry> Iterator for FreeListIter<'_, R> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        let pfn = self.current?;
        self.current = self.registry.page(pfn).and_then(|page| page.next_free);
        Some(pfn)
    }
}
