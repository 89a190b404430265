//! Integration tests for the buddy page allocator
//!
//! Drives the public API through boot-style range reporting and mixed
//! allocate/free workloads, checking the free-list invariants after each step.

use buddy_page_allocator::{
    pages_per_block, AllocError, AllocFlags, BuddyPageAllocator, FrameTable, PageBlock,
    PageRegistry, PageState,
};

const PAGE_SIZE: usize = 0x1000;

type Allocator = BuddyPageAllocator<FrameTable<PAGE_SIZE>>;

fn new_allocator(base_pfn: u64, frames: u64, last_order: usize) -> Allocator {
    BuddyPageAllocator::with_last_order(FrameTable::new(base_pfn, frames), last_order)
}

fn blocks(allocator: &Allocator, order: usize) -> Vec<u64> {
    allocator.free_blocks(order).collect()
}

/// Small deterministic generator so workloads are reproducible
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

/// Check conservation, sorting, alignment, no-overlap, state and merge
/// completeness over the whole allocator.
fn check_invariants(allocator: &Allocator) {
    let registry = allocator.registry();
    let base = registry.base_pfn();
    let last_order = allocator.last_order();

    let mut sum = 0;
    let mut ranges = Vec::new();
    for order in 0..=last_order {
        let heads = blocks(allocator, order);
        assert_eq!(heads.len(), allocator.free_block_count(order));
        assert!(heads.windows(2).all(|w| w[0] < w[1]), "order {} unsorted", order);

        for &pfn in &heads {
            let size = pages_per_block(order);
            assert_eq!((pfn - base) % size, 0, "pfn {:#x} misaligned at order {}", pfn, order);
            for frame in pfn..pfn + size {
                assert_eq!(registry.page(frame).unwrap().state(), PageState::Free);
            }
            if order < last_order {
                let buddy = base + ((pfn - base) ^ size);
                assert!(
                    !allocator.is_free_block(order, buddy),
                    "free buddies {:#x} and {:#x} left unmerged at order {}",
                    pfn,
                    buddy,
                    order
                );
            }
            ranges.push((pfn, pfn + size));
            sum += size;
        }
    }
    assert_eq!(sum, allocator.total_free());

    ranges.sort_unstable();
    assert!(ranges.windows(2).all(|w| w[0].1 <= w[1].0), "free blocks overlap");

    let free_pages = registry.iter().filter(|page| page.is_free()).count() as u64;
    assert_eq!(free_pages, allocator.total_free());
}

#[test]
fn test_scenario_single_page_from_fresh_block() {
    let mut allocator = new_allocator(0, 8, 3);
    allocator.insert_pages(0, 8);
    assert_eq!(blocks(&allocator, 3), [0]);

    let block = allocator.allocate_pages(0, AllocFlags::empty()).unwrap();
    assert_eq!(block.pfn, 0);
    assert!(blocks(&allocator, 3).is_empty());
    assert_eq!(blocks(&allocator, 2), [4]);
    assert_eq!(blocks(&allocator, 1), [2]);
    assert_eq!(blocks(&allocator, 0), [1]);
    assert_eq!(allocator.total_free(), 7);
    check_invariants(&allocator);
}

#[test]
fn test_scenario_free_without_free_buddy() {
    let mut allocator = new_allocator(0, 8, 3);
    allocator.insert_pages(0, 8);
    let first = allocator.allocate_pages(0, AllocFlags::empty()).unwrap();
    let second = allocator.allocate_pages(0, AllocFlags::empty()).unwrap();
    assert_eq!((first.pfn, second.pfn), (0, 1));

    // Buddy 1 is still allocated, so frame 0 stays at order 0
    allocator.free_pages(first.pfn, first.order);
    assert_eq!(blocks(&allocator, 0), [0]);
    assert_eq!(allocator.total_free(), 7);
    check_invariants(&allocator);

    allocator.free_pages(second.pfn, second.order);
    assert_eq!(blocks(&allocator, 3), [0]);
    assert_eq!(allocator.total_free(), 8);
    check_invariants(&allocator);
}

#[test]
fn test_scenario_allocate_never_merges() {
    let mut allocator = new_allocator(0, 8, 3);
    allocator.insert_pages(0, 4);
    allocator.insert_pages(4, 4);
    assert_eq!(blocks(&allocator, 2), [0, 4]);

    assert_eq!(
        allocator.allocate_pages(3, AllocFlags::empty()),
        Err(AllocError::NoMemory)
    );
    assert_eq!(blocks(&allocator, 2), [0, 4]);
    assert_eq!(allocator.total_free(), 8);

    // Freeing one half lets the free path merge them
    let block = allocator.allocate_pages(2, AllocFlags::empty()).unwrap();
    allocator.free_pages(block.pfn, block.order);
    assert_eq!(blocks(&allocator, 3), [0]);
}

#[test]
fn test_invalid_order_is_recoverable() {
    let mut allocator = new_allocator(0, 16, 2);
    allocator.insert_pages(0, 16);
    assert_eq!(
        allocator.allocate_pages(3, AllocFlags::empty()),
        Err(AllocError::InvalidOrder)
    );
    let block = allocator.allocate_pages(2, AllocFlags::empty()).unwrap();
    assert_eq!(block.end_pfn(), 4);
}

#[test]
fn test_insert_remove_round_trip() {
    let mut allocator = new_allocator(0x100, 0x200, 6);
    allocator.insert_pages(0x100, 0x40);
    let _held = allocator.allocate_pages(3, AllocFlags::empty()).unwrap();

    let before: Vec<Vec<u64>> = (0..=6).map(|o| blocks(&allocator, o)).collect();
    let free_before = allocator.total_free();

    allocator.insert_pages(0x145, 0x9b);
    check_invariants(&allocator);
    allocator.remove_pages(0x145, 0x9b);

    let after: Vec<Vec<u64>> = (0..=6).map(|o| blocks(&allocator, o)).collect();
    assert_eq!(before, after);
    assert_eq!(allocator.total_free(), free_before);
    check_invariants(&allocator);
}

#[test]
fn test_boot_reservation() {
    // Report 0..64 as free, then carve out the runs the loader still uses
    let mut allocator = new_allocator(0, 64, 4);
    allocator.insert_pages(0, 16);
    allocator.insert_pages(16, 3);
    allocator.insert_pages(19, 45);
    allocator.remove_pages(16, 3);
    check_invariants(&allocator);
    assert_eq!(allocator.total_free(), 61);

    for pfn in 16..19 {
        assert_eq!(
            allocator.registry().page(pfn).unwrap().state(),
            PageState::Allocated
        );
    }

    // The reserved frames are never handed out
    let mut handed_out = Vec::new();
    while let Ok(block) = allocator.allocate_pages(0, AllocFlags::empty()) {
        assert!(!(16..19).contains(&block.pfn));
        handed_out.push(block);
    }
    assert_eq!(handed_out.len(), 61);
    assert_eq!(allocator.total_free(), 0);
}

#[test]
fn test_random_workload_preserves_invariants() {
    let mut allocator = new_allocator(0x40, 256, 5);
    allocator.insert_pages(0x40, 200);
    allocator.insert_pages(0x40 + 203, 53);
    let inserted = allocator.total_free();
    assert_eq!(inserted, 253);

    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    let mut live: Vec<PageBlock> = Vec::new();

    for _ in 0..2000 {
        if live.is_empty() || rng.next() % 3 != 0 {
            let order = (rng.next() % 4) as usize;
            match allocator.allocate_pages(order, AllocFlags::empty()) {
                Ok(block) => {
                    assert_eq!(block.order, order);
                    assert!(live
                        .iter()
                        .all(|b| block.end_pfn() <= b.pfn || b.end_pfn() <= block.pfn));
                    live.push(block);
                }
                Err(err) => assert_eq!(err, AllocError::NoMemory),
            }
        } else {
            let index = (rng.next() as usize) % live.len();
            let block = live.swap_remove(index);
            allocator.free_pages(block.pfn, block.order);
        }

        let held: u64 = live.iter().map(PageBlock::page_count).sum();
        assert_eq!(allocator.total_free() + held, inserted);
        check_invariants(&allocator);
    }

    for block in live.drain(..) {
        allocator.free_pages(block.pfn, block.order);
    }
    check_invariants(&allocator);
    assert_eq!(allocator.total_free(), inserted);

    // Fully freed memory recombines into the canonical decomposition
    let mut fresh = new_allocator(0x40, 256, 5);
    fresh.insert_pages(0x40, 200);
    fresh.insert_pages(0x40 + 203, 53);
    for order in 0..=5 {
        assert_eq!(blocks(&allocator, order), blocks(&fresh, order));
    }
}

#[test]
fn test_dump_lists_every_order() {
    let mut allocator = new_allocator(0, 16, 4);
    allocator.insert_pages(0, 16);
    let _ = allocator.allocate_pages(0, AllocFlags::empty()).unwrap();

    let dump = allocator.dump();
    assert_eq!(dump.lines().count(), 6);
    assert!(dump.contains("[00] 1000--1fff "));
    assert!(dump.contains("[03] 8000--ffff "));
    allocator.print_free_lists();
}

#[test]
#[should_panic(expected = "not in the page registry")]
fn test_insert_outside_registry_is_fatal() {
    let mut allocator = new_allocator(0, 8, 3);
    allocator.insert_pages(4, 8);
}
