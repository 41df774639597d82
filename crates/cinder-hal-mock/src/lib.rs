//! Mock HAL implementation for testing the Cinder kernel
//!
//! This provides a mock implementation of the HAL trait that can be used
//! for unit testing the kernel without hardware. Every collaborator call is
//! recorded so tests can assert on it afterwards.
//!
//! Context switches return immediately: the kernel's bookkeeping (who is
//! CURRENT, what is on the ready list) is updated, but no stack is actually
//! swapped. `halt` panics so a test can observe it with `catch_unwind`.

#![no_std]
extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use cinder_hal::{Hal, HalError, IrqMask, StackSlot};
use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A recorded context switch, identified by the addresses of the two saved
/// stack pointer slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwitchRecord {
    /// Slot of the outgoing process
    pub from_slot: usize,
    /// Slot of the incoming process
    pub to_slot: usize,
}

/// Mock HAL for unit testing
pub struct MockHal {
    /// 1 while interrupts are masked
    masked: AtomicU32,
    /// Number of disable_interrupts calls
    mask_count: AtomicU64,
    /// Context switches in call order
    switches: RefCell<Vec<SwitchRecord>>,
    /// Pids whose sleep was cancelled
    cancelled_sleeps: RefCell<Vec<usize>>,
    /// Descriptors closed
    closed_descriptors: RefCell<Vec<i16>>,
    /// Captured debug messages
    debug_log: RefCell<Vec<String>>,
    /// When set, close_descriptor fails with DeviceError
    fail_closes: AtomicU32,
}

impl MockHal {
    /// Create a new mock HAL
    pub fn new() -> Self {
        Self {
            masked: AtomicU32::new(0),
            mask_count: AtomicU64::new(0),
            switches: RefCell::new(Vec::new()),
            cancelled_sleeps: RefCell::new(Vec::new()),
            closed_descriptors: RefCell::new(Vec::new()),
            debug_log: RefCell::new(Vec::new()),
            fail_closes: AtomicU32::new(0),
        }
    }

    /// True while interrupts are masked
    pub fn interrupts_masked(&self) -> bool {
        self.masked.load(Ordering::SeqCst) != 0
    }

    /// Number of times interrupts were masked
    pub fn mask_count(&self) -> u64 {
        self.mask_count.load(Ordering::SeqCst)
    }

    /// Number of context switches performed
    pub fn switch_count(&self) -> usize {
        self.switches.borrow().len()
    }

    /// All context switches in call order
    pub fn switches(&self) -> Vec<SwitchRecord> {
        self.switches.borrow().clone()
    }

    /// Forget recorded switches
    pub fn clear_switches(&self) {
        self.switches.borrow_mut().clear();
    }

    /// Pids whose sleep was cancelled, in call order
    pub fn cancelled_sleeps(&self) -> Vec<usize> {
        self.cancelled_sleeps.borrow().clone()
    }

    /// Descriptors closed, in call order
    pub fn closed_descriptors(&self) -> Vec<i16> {
        self.closed_descriptors.borrow().clone()
    }

    /// Make every later close_descriptor call fail
    pub fn set_fail_closes(&self, fail: bool) {
        self.fail_closes.store(fail as u32, Ordering::SeqCst);
    }

    /// Get all captured debug messages
    pub fn get_debug_log(&self) -> Vec<String> {
        self.debug_log.borrow().clone()
    }

    /// Clear the debug log
    pub fn clear_debug_log(&self) {
        self.debug_log.borrow_mut().clear();
    }

    /// Check if a specific message was logged
    pub fn has_log_containing(&self, substr: &str) -> bool {
        self.debug_log
            .borrow()
            .iter()
            .any(|msg| msg.contains(substr))
    }
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for MockHal {
    fn disable_interrupts(&self) -> IrqMask {
        self.mask_count.fetch_add(1, Ordering::SeqCst);
        IrqMask(self.masked.swap(1, Ordering::SeqCst))
    }

    fn restore_interrupts(&self, mask: IrqMask) {
        self.masked.store(mask.0, Ordering::SeqCst);
    }

    fn context_switch(&self, from: StackSlot, to: StackSlot) {
        self.switches.borrow_mut().push(SwitchRecord {
            from_slot: from.addr(),
            to_slot: to.addr(),
        });
    }

    fn cancel_sleep(&self, pid: usize) -> Result<(), HalError> {
        self.cancelled_sleeps.borrow_mut().push(pid);
        Ok(())
    }

    fn close_descriptor(&self, descriptor: i16) -> Result<(), HalError> {
        if self.fail_closes.load(Ordering::SeqCst) != 0 {
            return Err(HalError::DeviceError);
        }
        self.closed_descriptors.borrow_mut().push(descriptor);
        Ok(())
    }

    fn halt(&self) -> ! {
        self.debug_log
            .borrow_mut()
            .push(String::from("[mock-hal] halt"));
        panic!("[mock-hal] halt");
    }

    fn debug_write(&self, msg: &str) {
        self.debug_log.borrow_mut().push(String::from(msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_save_restore_nests() {
        let hal = MockHal::new();
        let outer = hal.disable_interrupts();
        let inner = hal.disable_interrupts();
        assert_eq!(outer, IrqMask(0));
        assert_eq!(inner, IrqMask(1));

        hal.restore_interrupts(inner);
        assert!(hal.interrupts_masked());
        hal.restore_interrupts(outer);
        assert!(!hal.interrupts_masked());
        assert_eq!(hal.mask_count(), 2);
    }

    #[test]
    fn test_switches_recorded() {
        let hal = MockHal::new();
        let mut a = 0usize;
        let mut b = 0usize;
        let from = StackSlot::new(&mut a);
        let to = StackSlot::new(&mut b);
        hal.context_switch(from, to);

        assert_eq!(hal.switch_count(), 1);
        assert_eq!(hal.switches()[0].from_slot, from.addr());
        assert_eq!(hal.switches()[0].to_slot, to.addr());
    }

    #[test]
    fn test_close_failure_toggle() {
        let hal = MockHal::new();
        assert_eq!(hal.close_descriptor(3), Ok(()));
        hal.set_fail_closes(true);
        assert_eq!(hal.close_descriptor(4), Err(HalError::DeviceError));
        assert_eq!(hal.closed_descriptors(), alloc::vec![3]);
    }

    #[test]
    fn test_debug_log() {
        let hal = MockHal::new();
        hal.debug_write("All user processes have completed.");
        assert!(hal.has_log_containing("completed"));
        hal.clear_debug_log();
        assert!(hal.get_debug_log().is_empty());
    }
}
