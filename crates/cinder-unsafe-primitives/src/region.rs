//! Raw memory regions
//!
//! The kernel heap and every process stack live inside one contiguous span of
//! machine memory. The allocator keeps its free-list nodes inside the free
//! blocks themselves and process creation writes initial frames into stacks,
//! so both need word-level access to raw addresses.
//!
//! `RawRegion` is the only way the rest of the kernel touches that memory.
//!
//! # Safety Invariants
//!
//! 1. **In bounds**: every access lies entirely inside `[base, base + len)`
//! 2. **Aligned**: word accesses are aligned to `WORD_SIZE`
//! 3. **Exclusive**: the region owns its memory; nothing else reads or writes it
//!    except through this handle
//!
//! Invariants 1 and 2 are checked on every call. Invariant 3 is the caller's
//! promise when constructing the region with [`RawRegion::new`], and is upheld
//! by construction in [`RawRegion::from_static`].

use core::mem::size_of;

/// Size in bytes of one machine word.
pub const WORD_SIZE: usize = size_of::<usize>();

/// An exclusively owned, word-aligned span of machine memory.
pub struct RawRegion {
    base: usize,
    len: usize,
}

impl RawRegion {
    /// Create a region over `[base, base + len)`.
    ///
    /// Returns `None` when `base` is null or misaligned, when `len` is not a
    /// whole number of words, or when the range wraps the address space.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// 1. The memory is valid for reads and writes for the rest of the program
    /// 2. Nothing else accesses the memory while this region exists
    pub unsafe fn new(base: usize, len: usize) -> Option<Self> {
        if base == 0 || base % WORD_SIZE != 0 || len % WORD_SIZE != 0 {
            return None;
        }
        base.checked_add(len)?;
        Some(Self { base, len })
    }

    /// Create a region that takes ownership of a leaked word buffer.
    ///
    /// This is how hosted targets and tests hand the kernel a heap:
    ///
    /// ```ignore
    /// let heap = RawRegion::from_static(Box::leak(vec![0usize; 4096].into_boxed_slice()));
    /// ```
    pub fn from_static(buffer: &'static mut [usize]) -> Self {
        Self {
            base: buffer.as_mut_ptr() as usize,
            len: buffer.len() * WORD_SIZE,
        }
    }

    /// Lowest address in the region.
    pub fn base(&self) -> usize {
        self.base
    }

    /// One past the highest address in the region.
    pub fn end(&self) -> usize {
        self.base + self.len
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the region has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when `[addr, addr + len)` lies entirely inside the region.
    pub fn contains(&self, addr: usize, len: usize) -> bool {
        match addr.checked_add(len) {
            Some(end) => addr >= self.base && end <= self.end(),
            None => false,
        }
    }

    fn word_ok(&self, addr: usize) -> bool {
        addr % WORD_SIZE == 0 && self.contains(addr, WORD_SIZE)
    }

    /// Read the word at `addr`, or `None` if it is outside the region or misaligned.
    pub fn read_word(&self, addr: usize) -> Option<usize> {
        if !self.word_ok(addr) {
            return None;
        }
        // SAFETY: addr is aligned and inside memory this region exclusively owns.
        Some(unsafe { core::ptr::read_volatile(addr as *const usize) })
    }

    /// Write the word at `addr`. Returns `None` (and writes nothing) if the
    /// address is outside the region or misaligned.
    pub fn write_word(&mut self, addr: usize, value: usize) -> Option<()> {
        if !self.word_ok(addr) {
            return None;
        }
        // SAFETY: addr is aligned and inside memory this region exclusively owns.
        unsafe { core::ptr::write_volatile(addr as *mut usize, value) };
        Some(())
    }

    /// Read one byte, or `None` if `addr` is outside the region.
    pub fn read_byte(&self, addr: usize) -> Option<u8> {
        if !self.contains(addr, 1) {
            return None;
        }
        // SAFETY: addr is inside memory this region exclusively owns; bytes have no alignment.
        Some(unsafe { core::ptr::read_volatile(addr as *const u8) })
    }
}

impl core::fmt::Debug for RawRegion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawRegion")
            .field("base", &format_args!("{:#x}", self.base))
            .field("len", &self.len)
            .finish()
    }
}

// ============================================================================
// Kani Proofs for Region Bounds
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: an accepted word access always lies inside the region
    #[kani::proof]
    fn word_access_in_bounds() {
        let base: usize = kani::any();
        let len: usize = kani::any();
        let addr: usize = kani::any();
        kani::assume(base != 0 && base % WORD_SIZE == 0 && len % WORD_SIZE == 0);
        kani::assume(base.checked_add(len).is_some());

        let region = RawRegion { base, len };
        if region.word_ok(addr) {
            kani::assert(addr >= base, "Access below region base");
            kani::assert(addr + WORD_SIZE <= base + len, "Access past region end");
            kani::assert(addr % WORD_SIZE == 0, "Misaligned word access");
        }
    }

    /// Proof: contains() never overflows and rejects wrapping ranges
    #[kani::proof]
    fn contains_rejects_wrap() {
        let region = RawRegion { base: 0x1000, len: 0x100 };
        let addr: usize = kani::any();
        let len: usize = kani::any();
        if region.contains(addr, len) {
            kani::assert(addr.checked_add(len).is_some(), "Wrapping range accepted");
        }
    }
}
