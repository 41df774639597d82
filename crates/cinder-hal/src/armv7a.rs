//! ARMv7-A HAL implementation
//!
//! Interrupt masking through the CPSR I bit and context switching through the
//! board's `ctxsw` routine. The clock and device collaborators are supplied
//! by the board as plain function pointers, as is the console.

use crate::{Hal, HalError, IrqMask, StackSlot};
use cinder_unsafe_primitives::cpu;

/// Board hooks for the collaborators the kernel calls into
#[derive(Clone, Copy)]
pub struct BoardHooks {
    /// Write to the board console
    pub console: fn(&str),
    /// Cancel a pending sleep in the clock subsystem
    pub cancel_sleep: Option<fn(usize) -> Result<(), HalError>>,
    /// Close a device descriptor
    pub close_descriptor: Option<fn(i16) -> Result<(), HalError>>,
}

/// HAL for single-core ARMv7-A boards
pub struct Armv7aHal {
    hooks: BoardHooks,
}

impl Armv7aHal {
    /// Create a HAL over the given board hooks.
    pub const fn new(hooks: BoardHooks) -> Self {
        Self { hooks }
    }
}

impl Hal for Armv7aHal {
    fn disable_interrupts(&self) -> IrqMask {
        IrqMask(cpu::irq_disable())
    }

    fn restore_interrupts(&self, mask: IrqMask) {
        cpu::irq_restore(mask.0)
    }

    fn context_switch(&self, from: StackSlot, to: StackSlot) {
        cpu::switch_stacks(from, to)
    }

    fn cancel_sleep(&self, pid: usize) -> Result<(), HalError> {
        match self.hooks.cancel_sleep {
            Some(hook) => hook(pid),
            None => Err(HalError::NotSupported),
        }
    }

    fn close_descriptor(&self, descriptor: i16) -> Result<(), HalError> {
        match self.hooks.close_descriptor {
            Some(hook) => hook(descriptor),
            None => Err(HalError::NotSupported),
        }
    }

    fn halt(&self) -> ! {
        let _ = self.disable_interrupts();
        loop {
            cpu::wait_for_interrupt();
        }
    }

    fn debug_write(&self, msg: &str) {
        (self.hooks.console)(msg)
    }
}
