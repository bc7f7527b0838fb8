//! Power-of-two block allocation inside a fixed region.
//!
//! The allocator hands out byte offsets into a caller-owned buffer; it never touches
//! memory itself. Blocks are nodes of a complete binary tree: the root covers the whole
//! region, each level halves the block size, and leaves at the last level are
//! `min_block_size` bytes.
//!
//! # Tree Organization
//! - node `i` has children `2i + 1` and `2i + 2`, parent `(i - 1) / 2`
//! - a node's buddy is its sibling: `i + 1` for odd `i`, `i - 1` for even `i`
//! - level `l` holds nodes `2^l - 1 ..= 2^(l+1) - 2`, each `total_size >> l` bytes
//! - a node sits in its level's free list iff it is neither used nor split
//!
//! Allocation takes the lowest free node at the smallest sufficient level, splitting a
//! larger block if needed. Freeing merges buddies upward for as long as both are free.

use std::collections::{BTreeSet, HashMap};

use bitvec::prelude::*;
use log::error;
use thiserror::Error;

/// Invalid allocator geometry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuddyAllocatorError {
    /// The managed region is not a power of two
    #[error("total size {0} is not a power of two")]
    TotalSizeNotPowerOfTwo(u64),

    /// The smallest block is not a power of two
    #[error("minimum block size {0} is not a power of two")]
    MinBlockSizeNotPowerOfTwo(u64),

    /// The smallest block is larger than the region
    #[error("minimum block size {min_block_size} exceeds total size {total_size}")]
    MinBlockSizeExceedsTotal {
        /// Requested minimum block size
        min_block_size: u64,
        /// Requested region size
        total_size: u64,
    },
}

/// A region handed out by [`BuddyAllocator::allocate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BuddyBlock {
    /// Byte offset from the start of the region
    pub offset: u64,
    /// Size of the block in bytes, a power of two
    pub size: u64,
}

/// Logical buddy allocator over `[0, total_size)`.
pub struct BuddyAllocator {
    total_size: u64,
    min_block_size: u64,
    used: BitVec,
    split: BitVec,
    free_lists: Vec<BTreeSet<usize>>,
    offset_to_node: HashMap<u64, usize>,
    allocated_bytes: u64,
}

impl BuddyAllocator {
    /// Creates an allocator with the whole region free.
    ///
    /// # Errors
    /// Both sizes must be powers of two and `min_block_size <= total_size`.
    pub fn new(total_size: u64, min_block_size: u64) -> Result<Self, BuddyAllocatorError> {
        if !total_size.is_power_of_two() {
            return Err(BuddyAllocatorError::TotalSizeNotPowerOfTwo(total_size));
        }
        if !min_block_size.is_power_of_two() {
            return Err(BuddyAllocatorError::MinBlockSizeNotPowerOfTwo(min_block_size));
        }
        if min_block_size > total_size {
            return Err(BuddyAllocatorError::MinBlockSizeExceedsTotal {
                min_block_size,
                total_size,
            });
        }

        let num_levels = (total_size.trailing_zeros() - min_block_size.trailing_zeros()) as usize + 1;
        let node_count = 2 * (total_size / min_block_size) as usize - 1;

        let mut free_lists = vec![BTreeSet::new(); num_levels];
        free_lists[0].insert(0);

        Ok(BuddyAllocator {
            total_size,
            min_block_size,
            used: bitvec![0; node_count],
            split: bitvec![0; node_count],
            free_lists,
            offset_to_node: HashMap::new(),
            allocated_bytes: 0,
        })
    }

    /// Reserves a block of at least `size` bytes.
    ///
    /// The block size is `size` rounded up to a power of two, and at least
    /// `min_block_size`.
    ///
    /// # Returns
    /// `None` for zero-sized requests, requests larger than the region, or when no free
    /// block is large enough.
    pub fn allocate(&mut self, size: u64) -> Option<BuddyBlock> {
        if size == 0 || size > self.total_size {
            return None;
        }

        let block_size = size.next_power_of_two().max(self.min_block_size);
        let target_level = self.level_for_size(block_size);

        let found_level = (0..=target_level)
            .rev()
            .find(|&level| !self.free_lists[level].is_empty())?;
        let mut node = self.free_lists[found_level].pop_first()?;

        for level in found_level..target_level {
            self.split.set(node, true);
            self.free_lists[level + 1].insert(right_child(node));
            node = left_child(node);
        }

        if self.used[node] || self.split[node] {
            error!("buddy allocator node {} was free-listed while in use", node);
            return None;
        }

        self.used.set(node, true);
        let offset = self.offset_of(node, target_level);
        self.offset_to_node.insert(offset, node);
        self.allocated_bytes += block_size;

        Some(BuddyBlock {
            offset,
            size: block_size,
        })
    }

    /// Releases the block that starts at `offset` and merges free buddies.
    ///
    /// # Returns
    /// `false` if no block is allocated at `offset` (unknown offset or double free).
    pub fn free(&mut self, offset: u64) -> bool {
        let Some(&node) = self.offset_to_node.get(&offset) else {
            return false;
        };
        if !self.used[node] {
            return false;
        }
        self.offset_to_node.remove(&offset);

        let mut level = level_of(node);
        self.used.set(node, false);
        self.allocated_bytes -= self.block_size_at(level);
        self.free_lists[level].insert(node);

        let mut node = node;
        while node != 0 {
            let buddy = buddy_of(node);
            if !self.free_lists[level].contains(&buddy) {
                break;
            }

            self.free_lists[level].remove(&node);
            self.free_lists[level].remove(&buddy);

            let parent = parent_of(node);
            self.split.set(parent, false);
            self.used.set(parent, false);

            level -= 1;
            self.free_lists[level].insert(parent);
            node = parent;
        }

        true
    }

    /// Size of the managed region.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Smallest block handed out.
    pub fn min_block_size(&self) -> u64 {
        self.min_block_size
    }

    /// Bytes currently reserved, counted in whole blocks.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.offset_to_node.len()
    }

    /// Size of the largest block that could be allocated right now.
    pub fn largest_free_block(&self) -> u64 {
        self.free_lists
            .iter()
            .position(|list| !list.is_empty())
            .map_or(0, |level| self.block_size_at(level))
    }

    fn level_for_size(&self, size: u64) -> usize {
        (self.total_size.trailing_zeros() - size.trailing_zeros()) as usize
    }

    fn block_size_at(&self, level: usize) -> u64 {
        self.total_size >> level
    }

    fn offset_of(&self, node: usize, level: usize) -> u64 {
        let first_at_level = (1usize << level) - 1;
        (node - first_at_level) as u64 * self.block_size_at(level)
    }
}

#[inline]
fn left_child(node: usize) -> usize {
    2 * node + 1
}

#[inline]
fn right_child(node: usize) -> usize {
    2 * node + 2
}

#[inline]
fn parent_of(node: usize) -> usize {
    (node - 1) / 2
}

#[inline]
fn buddy_of(node: usize) -> usize {
    if node % 2 == 1 {
        node + 1
    } else {
        node - 1
    }
}

#[inline]
fn level_of(node: usize) -> usize {
    (node + 1).ilog2() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL: u64 = 1 << 16;
    const MIN: u64 = 256;

    fn allocator() -> BuddyAllocator {
        BuddyAllocator::new(TOTAL, MIN).unwrap()
    }

    #[test]
    fn test_rejects_invalid_geometry() {
        assert_eq!(
            BuddyAllocator::new(1000, 8).err(),
            Some(BuddyAllocatorError::TotalSizeNotPowerOfTwo(1000))
        );
        assert_eq!(
            BuddyAllocator::new(1024, 12).err(),
            Some(BuddyAllocatorError::MinBlockSizeNotPowerOfTwo(12))
        );
        assert!(matches!(
            BuddyAllocator::new(1024, 2048),
            Err(BuddyAllocatorError::MinBlockSizeExceedsTotal { .. })
        ));
        assert!(BuddyAllocator::new(1024, 1024).is_ok());
    }

    #[test]
    fn test_block_sizes_round_up() {
        let mut allocator = allocator();
        assert_eq!(allocator.allocate(1).map(|b| b.size), Some(MIN));
        assert_eq!(allocator.allocate(MIN + 1).map(|b| b.size), Some(2 * MIN));
        assert_eq!(allocator.allocate(3000).map(|b| b.size), Some(4096));
        assert_eq!(allocator.allocate(0), None);
        assert_eq!(allocator.allocate(TOTAL + 1), None);
        assert_eq!(allocator.allocated_bytes(), MIN + 2 * MIN + 4096);
        assert_eq!(allocator.allocation_count(), 3);
    }

    #[test]
    fn test_whole_region_allocation() {
        let mut allocator = allocator();
        assert_eq!(
            allocator.allocate(TOTAL),
            Some(BuddyBlock { offset: 0, size: TOTAL })
        );
        assert_eq!(allocator.allocate(1), None);
        assert_eq!(allocator.largest_free_block(), 0);
        assert!(allocator.free(0));
        assert_eq!(allocator.largest_free_block(), TOTAL);
    }

    #[test]
    fn test_split_hands_out_buddies_in_order() {
        let mut allocator = allocator();
        let first = allocator.allocate(MIN).unwrap();
        let second = allocator.allocate(MIN).unwrap();
        let third = allocator.allocate(MIN).unwrap();
        assert_eq!((first.offset, second.offset, third.offset), (0, MIN, 2 * MIN));
        assert_eq!(allocator.largest_free_block(), TOTAL / 2);
    }

    #[test]
    fn test_free_rejects_unknown_and_double_free() {
        let mut allocator = allocator();
        let block = allocator.allocate(1024).unwrap();
        assert!(!allocator.free(block.offset + 1));
        assert!(allocator.free(block.offset));
        assert!(!allocator.free(block.offset));
        assert_eq!(allocator.allocated_bytes(), 0);
    }

    #[test]
    fn test_exhaustion_and_reuse() {
        let mut allocator = BuddyAllocator::new(4096, 1024).unwrap();
        let blocks: Vec<_> = (0..4).map(|_| allocator.allocate(1000).unwrap()).collect();
        assert_eq!(allocator.allocate(1), None);

        assert!(allocator.free(blocks[2].offset));
        assert_eq!(allocator.allocate(2048), None);
        assert_eq!(allocator.allocate(512).map(|b| b.offset), Some(blocks[2].offset));
    }

    #[test]
    fn test_merge_waits_for_both_buddies() {
        let mut allocator = BuddyAllocator::new(4096, 1024).unwrap();
        let a = allocator.allocate(1024).unwrap();
        let b = allocator.allocate(1024).unwrap();
        let c = allocator.allocate(2048).unwrap();

        assert!(allocator.free(a.offset));
        assert_eq!(allocator.largest_free_block(), 1024);
        assert!(allocator.free(c.offset));
        assert_eq!(allocator.largest_free_block(), 2048);
        assert!(allocator.free(b.offset));
        assert_eq!(allocator.allocate(4096).map(|b| b.offset), Some(0));
    }

    #[test]
    fn test_random_sequences_stay_disjoint_and_coalesce() {
        let mut rng = fastrand::Rng::with_seed(0x5EED);

        for _ in 0..20 {
            let mut allocator = allocator();
            let mut live: Vec<BuddyBlock> = Vec::new();

            for _ in 0..400 {
                if live.is_empty() || rng.u8(0..3) > 0 {
                    let size = rng.u64(1..=TOTAL / 8);
                    if let Some(block) = allocator.allocate(size) {
                        assert_eq!(block.size, size.next_power_of_two().max(MIN));
                        assert_eq!(block.offset % block.size, 0);
                        assert!(block.offset + block.size <= TOTAL);
                        for other in &live {
                            assert!(
                                block.offset + block.size <= other.offset
                                    || other.offset + other.size <= block.offset,
                                "{:?} overlaps {:?}",
                                block,
                                other
                            );
                        }
                        live.push(block);
                    }
                } else {
                    let block = live.swap_remove(rng.usize(0..live.len()));
                    assert!(allocator.free(block.offset));
                }
                assert_eq!(
                    allocator.allocated_bytes(),
                    live.iter().map(|b| b.size).sum::<u64>()
                );
            }

            for block in live.drain(..) {
                assert!(allocator.free(block.offset));
            }
            assert_eq!(
                allocator.allocate(TOTAL),
                Some(BuddyBlock { offset: 0, size: TOTAL })
            );
        }
    }
}
