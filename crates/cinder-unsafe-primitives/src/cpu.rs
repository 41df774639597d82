//! ARMv7-A processor status access
//!
//! Interrupt masking and idling on the AM335x class of boards the kernel
//! targets. Everything here compiles only for 32-bit ARM; hosted builds use a
//! HAL that simulates the mask instead.

/// CPSR I bit: IRQs masked when set.
pub const CPSR_IRQ_MASK: u32 = 1 << 7;

/// CPSR F bit: FIQs masked when set.
pub const CPSR_FIQ_MASK: u32 = 1 << 6;

/// Supervisor mode field of the CPSR.
pub const CPSR_MODE_SVC: u32 = 0x13;

#[cfg(target_arch = "arm")]
mod arm {
    use crate::sync::StackSlot;
    use core::arch::asm;

    extern "C" {
        /// Board-supplied switch routine: push callee-saved registers, store
        /// sp through `old`, load sp from `new`, pop and return.
        fn ctxsw(old: *mut usize, new: *mut usize);
    }

    /// Save the running stack pointer through `from` and resume the stack saved in `to`.
    ///
    /// Returns when some later switch resumes `from`.
    pub fn switch_stacks(from: StackSlot, to: StackSlot) {
        // SAFETY: both slots point into the process table, which outlives every
        // process, and the caller holds the interrupt mask.
        unsafe { ctxsw(from.addr() as *mut usize, to.addr() as *mut usize) }
    }

    /// Mask IRQs and return the CPSR as it was before.
    #[inline(always)]
    pub fn irq_disable() -> u32 {
        let cpsr: u32;
        // SAFETY: reading CPSR and setting the I bit has no memory effects.
        unsafe {
            asm!("mrs {0}, cpsr", "cpsid i", out(reg) cpsr, options(nomem, nostack));
        }
        cpsr
    }

    /// Restore the IRQ mask bit from a value returned by [`irq_disable`].
    #[inline(always)]
    pub fn irq_restore(cpsr: u32) {
        // SAFETY: only the control field is written; mode bits come from a
        // CPSR value read in this same mode.
        unsafe {
            asm!("msr cpsr_c, {0}", in(reg) cpsr, options(nomem, nostack));
        }
    }

    /// Wait for an interrupt.
    #[inline(always)]
    pub fn wait_for_interrupt() {
        // SAFETY: wfi only suspends the core until the next interrupt.
        unsafe { asm!("wfi", options(nomem, nostack)) };
    }
}

#[cfg(target_arch = "arm")]
pub use arm::{irq_disable, irq_restore, switch_stacks, wait_for_interrupt};
