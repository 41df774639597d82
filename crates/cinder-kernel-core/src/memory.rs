//! Free-list memory allocator
//!
//! The heap is one contiguous region. Free memory is kept as an
//! address-ascending singly-linked list whose nodes live inside the free
//! blocks themselves:
//!
//! ```text
//!   FreeList { first, free_total }
//!        |
//!        v
//!   +-----------+------+           +-----------+------+
//!   | next ---------------------->| next = 0  |      |
//!   | length    | .... |           | length    | .... |
//!   +-----------+------+           +-----------+------+
//! ```
//!
//! General requests are served first-fit from the low end; stack requests
//! take the last fit, carving from the high end. The two grow toward each
//! other through the same list.
//!
//! # Invariants
//!
//! 1. Blocks are strictly ordered by address and never overlap
//! 2. No two free blocks are address-adjacent (release coalesces)
//! 3. `free_total` equals the sum of block lengths
//! 4. Every address and length is a multiple of `ALLOC_UNIT`

use cinder_unsafe_primitives::{RawRegion, WORD_SIZE};

use crate::error::KernelError;

/// Allocation granularity: the size of a free-block header (next, length).
pub const ALLOC_UNIT: usize = 2 * WORD_SIZE;

/// Link value terminating the list.
const NIL: usize = 0;

/// Round a request up to the allocation unit.
pub fn round_unit(n: usize) -> Option<usize> {
    Some(n.checked_add(ALLOC_UNIT - 1)? & !(ALLOC_UNIT - 1))
}

/// Round a length down to the allocation unit.
pub fn trunc_unit(n: usize) -> usize {
    n & !(ALLOC_UNIT - 1)
}

/// A free block as stored in its header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
    /// Address of the block
    pub addr: usize,
    /// Length in bytes, header included
    pub length: usize,
}

/// The allocator state
#[derive(Debug)]
pub struct FreeList {
    region: RawRegion,
    /// Lowest usable heap address
    min_heap: usize,
    /// One past the highest usable heap address
    max_heap: usize,
    /// Address of the first free block, or NIL
    first: usize,
    /// Sum of all free block lengths
    free_total: usize,
}

impl FreeList {
    /// Take over `region` as one free block.
    ///
    /// The usable heap is the region trimmed inward to allocation-unit
    /// boundaries.
    pub fn new(region: RawRegion) -> Result<Self, KernelError> {
        let min_heap = round_unit(region.base()).ok_or(KernelError::OutOfHeap)?;
        let max_heap = trunc_unit(region.end());
        if max_heap <= min_heap {
            return Err(KernelError::OutOfMemory);
        }

        let mut list = Self {
            region,
            min_heap,
            max_heap,
            first: NIL,
            free_total: 0,
        };
        let length = max_heap - min_heap;
        list.write_header(min_heap, NIL, length)?;
        list.first = min_heap;
        list.free_total = length;
        log::debug!(
            "[Cinder Mem] heap {:#x}..{:#x} ({} bytes)",
            min_heap,
            max_heap,
            length
        );
        Ok(list)
    }

    // ========================================================================
    // Header access
    // ========================================================================

    fn next_of(&self, block: usize) -> Result<usize, KernelError> {
        self.region.read_word(block).ok_or(KernelError::OutOfHeap)
    }

    fn length_of(&self, block: usize) -> Result<usize, KernelError> {
        self.region
            .read_word(block + WORD_SIZE)
            .ok_or(KernelError::OutOfHeap)
    }

    fn write_header(&mut self, block: usize, next: usize, length: usize) -> Result<(), KernelError> {
        self.region
            .write_word(block, next)
            .ok_or(KernelError::OutOfHeap)?;
        self.region
            .write_word(block + WORD_SIZE, length)
            .ok_or(KernelError::OutOfHeap)
    }

    fn set_next(&mut self, prev: usize, next: usize) -> Result<(), KernelError> {
        if prev == NIL {
            self.first = next;
            Ok(())
        } else {
            self.region
                .write_word(prev, next)
                .ok_or(KernelError::OutOfHeap)
        }
    }

    fn set_length(&mut self, block: usize, length: usize) -> Result<(), KernelError> {
        self.region
            .write_word(block + WORD_SIZE, length)
            .ok_or(KernelError::OutOfHeap)
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// First-fit allocation from the low end of the heap.
    ///
    /// Returns the lowest address of the allocated block.
    pub fn allocate_general(&mut self, n: usize) -> Result<usize, KernelError> {
        if n == 0 {
            return Err(KernelError::InvalidArgument);
        }
        let n = round_unit(n).ok_or(KernelError::OutOfMemory)?;

        let mut prev = NIL;
        let mut curr = self.first;
        while curr != NIL {
            let length = self.length_of(curr)?;
            let next = self.next_of(curr)?;
            if length == n {
                self.set_next(prev, next)?;
                self.free_total -= n;
                return Ok(curr);
            }
            if length > n {
                let leftover = curr + n;
                self.write_header(leftover, next, length - n)?;
                self.set_next(prev, leftover)?;
                self.free_total -= n;
                return Ok(curr);
            }
            prev = curr;
            curr = next;
        }
        Err(KernelError::OutOfMemory)
    }

    /// Last-fit allocation from the high end of the heap.
    ///
    /// Returns the address of the highest word of the carved region, where
    /// a downward-growing stack starts.
    pub fn allocate_stack(&mut self, n: usize) -> Result<usize, KernelError> {
        if n == 0 {
            return Err(KernelError::InvalidArgument);
        }
        let n = round_unit(n).ok_or(KernelError::OutOfMemory)?;

        let mut prev = NIL;
        let mut curr = self.first;
        let mut fits: Option<(usize, usize)> = None;
        while curr != NIL {
            if self.length_of(curr)? >= n {
                fits = Some((prev, curr));
            }
            prev = curr;
            curr = self.next_of(curr)?;
        }

        let (fits_prev, fits) = fits.ok_or(KernelError::OutOfMemory)?;
        let length = self.length_of(fits)?;
        let carved = if length == n {
            let next = self.next_of(fits)?;
            self.set_next(fits_prev, next)?;
            fits
        } else {
            self.set_length(fits, length - n)?;
            fits + length - n
        };
        self.free_total -= n;
        Ok(carved + n - WORD_SIZE)
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Return `[addr, addr + n)` to the free list.
    ///
    /// Rejects, without modifying the list, a zero length, a range outside
    /// the heap, a misaligned address, or a block that would overlap its free
    /// neighbours.
    pub fn release(&mut self, addr: usize, n: usize) -> Result<(), KernelError> {
        if n == 0 {
            return Err(KernelError::InvalidArgument);
        }
        let n = round_unit(n).ok_or(KernelError::OutOfHeap)?;
        let end = addr.checked_add(n).ok_or(KernelError::OutOfHeap)?;
        if addr < self.min_heap || end > self.max_heap {
            return Err(KernelError::OutOfHeap);
        }
        if addr % ALLOC_UNIT != 0 {
            return Err(KernelError::InvalidArgument);
        }

        let mut prev = NIL;
        let mut next = self.first;
        while next != NIL && next < addr {
            prev = next;
            next = self.next_of(next)?;
        }

        let top = if prev == NIL {
            NIL
        } else {
            prev + self.length_of(prev)?
        };
        if (prev != NIL && addr < top) || (next != NIL && end > next) {
            log::warn!(
                "[Cinder Mem] release {:#x}+{} overlaps free memory",
                addr,
                n
            );
            return Err(KernelError::Overlap);
        }

        self.free_total += n;

        // Coalesce with the predecessor, or link as a new node.
        let block = if prev != NIL && top == addr {
            let merged = self.length_of(prev)? + n;
            self.set_length(prev, merged)?;
            prev
        } else {
            self.write_header(addr, next, n)?;
            self.set_next(prev, addr)?;
            addr
        };

        // Coalesce with the successor.
        let block_len = self.length_of(block)?;
        if next != NIL && block + block_len == next {
            let next_len = self.length_of(next)?;
            let next_next = self.next_of(next)?;
            self.write_header(block, next_next, block_len + next_len)?;
        }
        Ok(())
    }

    /// Release a stack by the top-word address `allocate_stack` returned.
    pub fn release_stack(&mut self, top: usize, n: usize) -> Result<(), KernelError> {
        let n = round_unit(n).ok_or(KernelError::OutOfHeap)?;
        let base = top
            .checked_add(WORD_SIZE)
            .ok_or(KernelError::OutOfHeap)?
            .checked_sub(n)
            .ok_or(KernelError::OutOfHeap)?;
        self.release(base, n)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Total free bytes.
    pub fn free_total(&self) -> usize {
        self.free_total
    }

    /// Lowest usable heap address.
    pub fn min_heap(&self) -> usize {
        self.min_heap
    }

    /// One past the highest usable heap address.
    pub fn max_heap(&self) -> usize {
        self.max_heap
    }

    /// Walk the free list in address order.
    pub fn blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            list: self,
            cursor: self.first,
        }
    }

    /// Number of free blocks.
    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// The underlying memory, for reading stacks and dumps.
    pub fn region(&self) -> &RawRegion {
        &self.region
    }

    /// The underlying memory, for writing initial stack frames.
    pub fn region_mut(&mut self) -> &mut RawRegion {
        &mut self.region
    }
}

/// Iterator over free blocks in address order
pub struct FreeBlocks<'a> {
    list: &'a FreeList,
    cursor: usize,
}

impl Iterator for FreeBlocks<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let addr = self.cursor;
        let length = self.list.length_of(addr).ok()?;
        self.cursor = self.list.next_of(addr).unwrap_or(NIL);
        Some(FreeBlock { addr, length })
    }
}
