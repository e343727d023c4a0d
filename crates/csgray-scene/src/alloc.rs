//! Allocator interface for compiled scene buffers.
//!
//! The engine never assumes it owns the address space its buffers live in.
//! Every compiled buffer is requested through an [`Allocator`] supplied by
//! the platform, recorded in an [`AllocLedger`], and handed back when the
//! scene is dropped or when compilation fails part way.
//!
//! [`RegionAllocator`] carves blocks from a bounded address range with a
//! bump cursor that wraps to the start of the range once it runs off the
//! end. It is not thread-safe; callers that share one must serialize access.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::error::SceneError;

/// A block handed out by an [`Allocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    /// Start address.
    pub addr: usize,
    /// Size in bytes.
    pub size: usize,
}

/// Allocation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Not enough room for the request.
    #[error("cannot allocate {size} bytes ({available} available)")]
    Exhausted {
        /// Requested size.
        size: usize,
        /// Free bytes at the time of the request.
        available: usize,
    },

    /// Alignment is zero or not a power of two.
    #[error("invalid alignment {0}")]
    InvalidAlign(usize),
}

/// Source of memory for compiled buffers.
pub trait Allocator: Send + fmt::Debug {
    /// Reserve `size` bytes aligned to `align`.
    fn allocate(&mut self, size: usize, align: usize) -> Result<Block, AllocError>;

    /// Return a block. Unknown blocks are ignored.
    fn free(&mut self, block: Block);

    /// Bytes currently handed out.
    fn allocated(&self) -> usize;
}

fn align_up(addr: usize, align: usize) -> Option<usize> {
    addr.checked_add(align - 1).map(|a| a & !(align - 1))
}

fn check_align(align: usize) -> Result<(), AllocError> {
    if align == 0 || !align.is_power_of_two() {
        return Err(AllocError::InvalidAlign(align));
    }
    Ok(())
}

/// Process heap accounting with an optional byte budget.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    budget: Option<usize>,
    live: BTreeMap<usize, usize>,
    allocated: usize,
    next: usize,
}

impl HeapAllocator {
    /// Unlimited heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Heap refusing to hand out more than `budget` bytes at once.
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }
}

impl Allocator for HeapAllocator {
    fn allocate(&mut self, size: usize, align: usize) -> Result<Block, AllocError> {
        check_align(align)?;
        if let Some(budget) = self.budget {
            let available = budget.saturating_sub(self.allocated);
            if size > available {
                return Err(AllocError::Exhausted { size, available });
            }
        }
        let addr = align_up(self.next.max(align), align).ok_or(AllocError::Exhausted {
            size,
            available: 0,
        })?;
        self.next = addr + size.max(1);
        self.live.insert(addr, size);
        self.allocated += size;
        Ok(Block { addr, size })
    }

    fn free(&mut self, block: Block) {
        if let Some(size) = self.live.remove(&block.addr) {
            self.allocated -= size;
        } else {
            log::warn!("heap allocator asked to free unknown block {:#x}", block.addr);
        }
    }

    fn allocated(&self) -> usize {
        self.allocated
    }
}

/// Bump allocator over the bounded range `[base, base + capacity)`.
#[derive(Debug)]
pub struct RegionAllocator {
    base: usize,
    end: usize,
    cursor: usize,
    live: BTreeMap<usize, usize>,
    allocated: usize,
    wraps: u64,
}

impl RegionAllocator {
    /// Default start of the carved range.
    pub const DEFAULT_BASE: usize = 0x1000_0000;

    /// Region of `capacity` bytes at [`Self::DEFAULT_BASE`].
    pub fn new(capacity: usize) -> Self {
        Self::with_base(Self::DEFAULT_BASE, capacity)
    }

    /// Region of `capacity` bytes starting at `base`.
    pub fn with_base(base: usize, capacity: usize) -> Self {
        let end = base.saturating_add(capacity);
        Self {
            base,
            end,
            cursor: base,
            live: BTreeMap::new(),
            allocated: 0,
            wraps: 0,
        }
    }

    /// Total size of the range.
    pub fn capacity(&self) -> usize {
        self.end - self.base
    }

    /// Times the cursor wrapped back to the start.
    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    /// First free, aligned gap of `size` bytes in `[from, self.end)`.
    fn probe(&self, from: usize, size: usize, align: usize) -> Option<usize> {
        let mut candidate = align_up(from, align)?;
        loop {
            let stop = candidate.checked_add(size)?;
            if stop > self.end {
                return None;
            }
            // Last live block starting before the candidate's end.
            match self.live.range(..stop.max(candidate + 1)).next_back() {
                Some((&addr, &len)) if addr + len > candidate => {
                    candidate = align_up(addr + len.max(1), align)?;
                }
                _ => return Some(candidate),
            }
        }
    }
}

impl Allocator for RegionAllocator {
    fn allocate(&mut self, size: usize, align: usize) -> Result<Block, AllocError> {
        check_align(align)?;
        let exhausted = AllocError::Exhausted {
            size,
            available: self.capacity() - self.allocated,
        };
        let addr = match self.probe(self.cursor, size, align) {
            Some(addr) => addr,
            None => {
                self.wraps += 1;
                log::debug!("region allocator wrapped (wrap {})", self.wraps);
                self.probe(self.base, size, align).ok_or(exhausted)?
            }
        };
        self.live.insert(addr, size);
        self.allocated += size;
        self.cursor = addr + size.max(1);
        Ok(Block { addr, size })
    }

    fn free(&mut self, block: Block) {
        if let Some(size) = self.live.remove(&block.addr) {
            self.allocated -= size;
        } else {
            log::warn!("region allocator asked to free unknown block {:#x}", block.addr);
        }
    }

    fn allocated(&self) -> usize {
        self.allocated
    }
}

/// Every block acquired for one compiled scene.
#[derive(Debug, Default)]
pub struct AllocLedger {
    blocks: Vec<(&'static str, Block)>,
}

impl AllocLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for `len` values of `T`, labelled `what`.
    pub fn acquire<T>(&mut self, allocator: &mut dyn Allocator, what: &'static str, len: usize) -> Result<(), SceneError> {
        let size = len * std::mem::size_of::<T>();
        let block = allocator
            .allocate(size, std::mem::align_of::<T>())
            .map_err(|source| SceneError::AllocatorExhausted { what, source })?;
        self.blocks.push((what, block));
        Ok(())
    }

    /// Return every recorded block, newest first.
    pub fn release_all(&mut self, allocator: &mut dyn Allocator) {
        while let Some((_, block)) = self.blocks.pop() {
            allocator.free(block);
        }
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Bytes recorded.
    pub fn bytes(&self) -> usize {
        self.blocks.iter().map(|(_, b)| b.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_budget() {
        let mut heap = HeapAllocator::with_budget(100);
        let a = heap.allocate(60, 8).unwrap();
        assert_eq!(a.addr % 8, 0);
        assert!(matches!(
            heap.allocate(50, 8),
            Err(AllocError::Exhausted { size: 50, available: 40 })
        ));
        heap.free(a);
        assert_eq!(heap.allocated(), 0);
        heap.allocate(100, 4).unwrap();
    }

    #[test]
    fn test_bad_alignment() {
        let mut heap = HeapAllocator::new();
        assert_eq!(heap.allocate(4, 3), Err(AllocError::InvalidAlign(3)));
        let mut region = RegionAllocator::new(64);
        assert_eq!(region.allocate(4, 0), Err(AllocError::InvalidAlign(0)));
    }

    #[test]
    fn test_region_bump_and_wrap() {
        let mut r = RegionAllocator::with_base(0x1000, 100);
        let a = r.allocate(40, 8).unwrap();
        let b = r.allocate(40, 8).unwrap();
        assert_eq!(a.addr, 0x1000);
        assert_eq!(b.addr, 0x1028);
        // No room past the cursor and none at the start either.
        assert!(r.allocate(30, 8).is_err());
        assert_eq!(r.wraps(), 1);

        // Freeing the first block lets the wrapped probe reuse it.
        r.free(a);
        let c = r.allocate(30, 8).unwrap();
        assert_eq!(c.addr, 0x1000);
        assert_eq!(r.wraps(), 2);
        assert_eq!(r.allocated(), 70);
    }

    #[test]
    fn test_region_probe_skips_live_blocks() {
        let mut r = RegionAllocator::with_base(0, 64);
        let blocks: Vec<Block> = (0..4).map(|_| r.allocate(16, 1).unwrap()).collect();
        r.free(blocks[1]);
        r.free(blocks[3]);
        // Cursor is at the end, so the next request wraps and lands in the
        // first gap.
        let d = r.allocate(16, 1).unwrap();
        assert_eq!(d.addr, 16);
        let e = r.allocate(16, 1).unwrap();
        assert_eq!(e.addr, 48);
    }

    #[test]
    fn test_ledger_releases_everything() {
        let mut r = RegionAllocator::new(1024);
        let mut ledger = AllocLedger::new();
        ledger.acquire::<u64>(&mut r, "a", 10).unwrap();
        ledger.acquire::<u32>(&mut r, "b", 10).unwrap();
        assert_eq!(ledger.bytes(), 120);
        let err = ledger.acquire::<u64>(&mut r, "c", 1000).unwrap_err();
        assert!(matches!(err, SceneError::AllocatorExhausted { what: "c", .. }));
        ledger.release_all(&mut r);
        assert!(ledger.is_empty());
        assert_eq!(r.allocated(), 0);
    }
}
