//! Heap and stack allocation syscalls
//!
//! Thin masked wrappers over the core free list.

use cinder_hal::Hal;
use cinder_kernel_core::{ContextBuilder, KernelError};

use crate::Kernel;

impl<H: Hal, C: ContextBuilder> Kernel<H, C> {
    /// Allocate `n` bytes from the low end of the heap (first fit).
    pub fn allocate_general(&mut self, n: usize) -> Result<usize, KernelError> {
        self.critical(|k| k.state.memory.allocate_general(n))
    }

    /// Return `[addr, addr + n)` to the heap.
    pub fn release(&mut self, addr: usize, n: usize) -> Result<(), KernelError> {
        self.critical(|k| k.state.memory.release(addr, n))
    }

    /// Allocate a stack of `n` bytes from the high end of the heap.
    ///
    /// Returns the address of the stack's top word.
    pub fn allocate_stack(&mut self, n: usize) -> Result<usize, KernelError> {
        self.critical(|k| k.state.memory.allocate_stack(n))
    }

    /// Return a stack by the top-word address `allocate_stack` gave out.
    pub fn release_stack(&mut self, top: usize, n: usize) -> Result<(), KernelError> {
        self.critical(|k| k.state.memory.release_stack(top, n))
    }

    /// Total free heap bytes.
    pub fn free_memory(&self) -> usize {
        self.state.memory.free_total()
    }
}
