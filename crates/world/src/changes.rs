//! The block-change overlay.
//!
//! Player edits are stored as a sorted-by-coordinate array layered on top
//! of generated terrain. Reads vastly outnumber writes, so lookups are
//! binary searches and writes pay O(n) shifts to keep the array sorted
//! and free of holes.

use crate::block::{Block, BLOCK_NONE};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One overridden block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockChange {
    pub x: i32,
    pub y: u8,
    pub z: i32,
    pub block: Block,
}

/// The overlay is at capacity; the caller decides who pays for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("block change index is full")]
pub struct IndexFull;

/// Sort key: X, then Z, then Y, grouping nearby columns together.
fn compare_coords(ax: i32, ay: u8, az: i32, bx: i32, by: u8, bz: i32) -> Ordering {
    ax.cmp(&bx).then(az.cmp(&bz)).then(ay.cmp(&by))
}

/// Sorted, compacted set of block overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockChanges {
    entries: Vec<BlockChange>,
    capacity: usize,
}

impl BlockChanges {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockChange> {
        self.entries.iter()
    }

    fn search(&self, x: i32, y: u8, z: i32) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| compare_coords(e.x, e.y, e.z, x, y, z))
    }

    /// The override at `(x, y, z)`, or `None` when terrain shows through.
    pub fn get(&self, x: i32, y: u8, z: i32) -> Option<Block> {
        self.search(x, y, z).ok().map(|i| self.entries[i].block)
    }

    /// Record an override. Passing [`BLOCK_NONE`] deletes the entry; the
    /// array is compacted on the spot so no tombstone ever sits between
    /// valid entries.
    pub fn set(&mut self, x: i32, y: u8, z: i32, block: Block) -> Result<(), IndexFull> {
        match self.search(x, y, z) {
            Ok(i) => {
                if block == BLOCK_NONE {
                    self.entries.remove(i);
                } else {
                    self.entries[i].block = block;
                }
                Ok(())
            }
            Err(insert_at) => {
                if block == BLOCK_NONE {
                    return Ok(());
                }
                if self.entries.len() >= self.capacity {
                    return Err(IndexFull);
                }
                self.entries.insert(insert_at, BlockChange { x, y, z, block });
                Ok(())
            }
        }
    }

    /// Remove the override at `(x, y, z)` so terrain shows through again.
    pub fn remove(&mut self, x: i32, y: u8, z: i32) {
        // Deleting can never hit the capacity bound.
        let _ = self.set(x, y, z, BLOCK_NONE);
    }

    /// Drop every entry (world reset / reload).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the whole set from persisted records; input order is
    /// arbitrary, duplicates resolve to the last occurrence.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = BlockChange>) -> Result<(), IndexFull> {
        self.entries.clear();
        for rec in records {
            if rec.block == BLOCK_NONE {
                continue;
            }
            self.set(rec.x, rec.y, rec.z, rec.block)?;
        }
        Ok(())
    }

    /// Debug invariant: sorted with no sentinel entries.
    pub fn is_well_formed(&self) -> bool {
        self.entries.windows(2).all(|w| {
            compare_coords(w[0].x, w[0].y, w[0].z, w[1].x, w[1].y, w[1].z) == Ordering::Less
        }) && self.entries.iter().all(|e| e.block != BLOCK_NONE)
    }
}
