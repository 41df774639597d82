//! Hardware Abstraction Layer trait for the Cinder kernel
//!
//! The kernel core owns the process table, queues, semaphores and the heap.
//! Everything it needs from outside that boundary goes through [`Hal`]:
//!
//! - the interrupt mask, which is the kernel's only mutual exclusion
//! - the context switch between two saved stack pointers
//! - the clock subsystem's sleep queue (cancel a pending sleep)
//! - the device layer (close a descriptor)
//! - halting the machine, and a console for diagnostics
//!
//! # Platform Implementations
//!
//! - **ARMv7-A** (`armv7a` module, 32-bit ARM only): CPSR masking and a board-supplied `ctxsw`
//! - **Host tests**: `cinder-hal-mock`, which records every call

#![no_std]
#![deny(unsafe_code)]

pub use cinder_unsafe_primitives::StackSlot;

#[cfg(target_arch = "arm")]
pub mod armv7a;

/// Saved interrupt state returned by [`Hal::disable_interrupts`].
///
/// Must be handed back to [`Hal::restore_interrupts`] exactly once; masks
/// nest by save/restore, not by counting.
#[must_use = "an interrupt mask must be restored"]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrqMask(pub u32);

/// Hardware Abstraction Layer trait
///
/// Implementations provide platform-specific functionality for:
/// - Interrupt masking
/// - Context switching
/// - The clock and device collaborators the kernel calls into
/// - Halting and debug output
///
/// All methods are called with the kernel's interrupt mask held, except
/// `disable_interrupts` itself.
pub trait Hal: Send + 'static {
    // === Interrupts ===

    /// Mask interrupts and return the previous mask state.
    fn disable_interrupts(&self) -> IrqMask;

    /// Restore a mask state previously returned by `disable_interrupts`.
    fn restore_interrupts(&self, mask: IrqMask);

    // === Scheduling ===

    /// Switch execution from one process to another
    ///
    /// Saves the running stack pointer through `from` and resumes the stack
    /// pointer stored in `to`. On hardware this returns only when some later
    /// switch resumes `from`; simulated platforms may return immediately.
    ///
    /// # Arguments
    /// * `from` - Saved stack pointer slot of the outgoing process
    /// * `to` - Saved stack pointer slot of the incoming process
    fn context_switch(&self, from: StackSlot, to: StackSlot);

    // === Collaborators ===

    /// Remove a process from the clock subsystem's sleep queue
    ///
    /// Called when a sleeping or timed-receiving process is killed, or when a
    /// message arrives for a timed receiver.
    ///
    /// # Returns
    /// * `Ok(())` - The pending sleep was cancelled
    /// * `Err(HalError::ProcessNotFound)` - The process was not sleeping
    /// * `Err(HalError::NotSupported)` - No clock subsystem on this platform
    fn cancel_sleep(&self, _pid: usize) -> Result<(), HalError> {
        Err(HalError::NotSupported)
    }

    /// Close a device descriptor held by a terminating process
    ///
    /// # Returns
    /// * `Ok(())` - Descriptor closed
    /// * `Err(HalError::DeviceError)` - The device rejected the close
    /// * `Err(HalError::NotSupported)` - No device layer on this platform
    fn close_descriptor(&self, _descriptor: i16) -> Result<(), HalError> {
        Err(HalError::NotSupported)
    }

    // === Halt & Debug ===

    /// Stop the machine permanently.
    fn halt(&self) -> !;

    /// Write a debug message to the platform's console
    fn debug_write(&self, msg: &str);
}

/// HAL errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalError {
    /// Operation not supported on this platform
    NotSupported,
    /// Process not known to the collaborator
    ProcessNotFound,
    /// Device-level failure
    DeviceError,
    /// Invalid argument
    InvalidArgument,
}

impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::NotSupported => write!(f, "operation not supported"),
            HalError::ProcessNotFound => write!(f, "process not found"),
            HalError::DeviceError => write!(f, "device error"),
            HalError::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}
