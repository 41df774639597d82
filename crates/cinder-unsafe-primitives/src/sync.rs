//! Single-core sharing primitives
//!
//! The kernel runs on one core and its only mutual exclusion is the
//! interrupt mask. These wrappers carry that assumption explicitly.
//!
//! # Safety Documentation
//!
//! Each wrapper documents its safety invariants. Violating these invariants
//! is undefined behavior.

use core::cell::UnsafeCell;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

// ============================================================================
// Saved stack pointer slots
// ============================================================================

/// Location of a process's saved stack pointer.
///
/// A context switch stores the outgoing stack pointer through one slot and
/// loads the incoming one from another. The slot points into the process
/// table, which lives as long as the kernel.
///
/// # Safety Invariants
///
/// 1. The pointer must remain valid while the switch that receives it runs
/// 2. Access happens only with interrupts masked on a single core
#[repr(transparent)]
pub struct StackSlot {
    ptr: NonNull<usize>,
}

impl StackSlot {
    /// Point at a saved stack pointer field.
    pub fn new(slot: &mut usize) -> Self {
        Self {
            ptr: NonNull::from(slot),
        }
    }

    /// Address of the slot itself.
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Read the saved stack pointer.
    ///
    /// # Safety
    ///
    /// The slot must still be valid and no mutable reference to it may exist.
    pub unsafe fn load(&self) -> usize {
        core::ptr::read_volatile(self.ptr.as_ptr())
    }

    /// Overwrite the saved stack pointer.
    ///
    /// # Safety
    ///
    /// The slot must still be valid and no other reference to it may exist.
    pub unsafe fn store(&self, sp: usize) {
        core::ptr::write_volatile(self.ptr.as_ptr(), sp)
    }
}

// SAFETY: a slot is only dereferenced by the context switch, which runs with
// interrupts masked on the single core.
unsafe impl Send for StackSlot {}
unsafe impl Sync for StackSlot {}

impl Clone for StackSlot {
    fn clone(&self) -> Self {
        Self { ptr: self.ptr }
    }
}

impl Copy for StackSlot {}

impl core::fmt::Debug for StackSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StackSlot")
            .field("ptr", &self.ptr)
            .finish()
    }
}

// ============================================================================
// Global kernel cell
// ============================================================================

/// Storage for the one kernel instance on a bare-metal target.
///
/// The value is installed exactly once at boot. After that, every syscall
/// entry reaches it through [`KernelCell::get_mut`].
///
/// # Safety Invariants
///
/// This cell is ONLY sound when:
///
/// 1. **Single core**: there is exactly one hardware thread of execution
/// 2. **Masked access**: callers hold the interrupt mask (or are the only
///    code that can run) while using the returned reference
///
/// A context switch inside a syscall suspends the borrow of the outgoing
/// process; the incoming process resumes its own. Only one of them executes
/// at a time, which is the property the kernel relies on.
pub struct KernelCell<T> {
    installed: AtomicBool,
    inner: UnsafeCell<Option<T>>,
}

impl<T> KernelCell<T> {
    /// An empty cell, suitable for a `static`.
    pub const fn empty() -> Self {
        Self {
            installed: AtomicBool::new(false),
            inner: UnsafeCell::new(None),
        }
    }

    /// Install the value. Fails, returning the value, if one was already installed.
    pub fn install(&self, value: T) -> Result<(), T> {
        if self
            .installed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(value);
        }
        // SAFETY: the compare-exchange above admits exactly one installer, and
        // get_mut cannot hand out a reference before `installed` is observed.
        unsafe { *self.inner.get() = Some(value) };
        Ok(())
    }

    /// True once a value has been installed.
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Access the installed value.
    ///
    /// # Safety
    ///
    /// See the type-level invariants: single core, interrupts masked, and no
    /// other live reference obtained from this cell in the running context.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self) -> Option<&mut T> {
        if !self.is_installed() {
            return None;
        }
        (*self.inner.get()).as_mut()
    }
}

// SAFETY: see the type-level invariants. Sharing across "threads" means sharing
// across interrupt contexts of a single core, which the mask serializes.
unsafe impl<T: Send> Sync for KernelCell<T> {}

impl<T> Default for KernelCell<T> {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
