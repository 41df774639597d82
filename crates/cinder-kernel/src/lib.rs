//! Cinder Kernel - syscall surface over a HAL
//!
//! This crate wraps the pure [`KernelState`] with a platform [`Hal`] and
//! implements every kernel operation on top of it:
//!
//! - process lifecycle: create, resume, suspend, kill, exit, chprio
//! - scheduling: resched, deferral, yield, clock-tick preemption
//! - counting semaphores
//! - direct one-word messaging
//! - the heap and stack allocator
//! - debug reports: free list, hexdump, snapshot, invariant check
//!
//! Every operation runs inside a scoped critical section: interrupts are
//! masked on entry and the saved mask is restored on every exit path.
//!
//! # Blocking
//!
//! On hardware a blocking call (`wait`, `receive`) returns only after its
//! caller has been dispatched again. A simulated HAL whose context switch
//! returns immediately gets `Err(KernelError::WouldBlock)` instead, and the
//! caller stays blocked in the tables until it is released.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod debug;
pub mod lifecycle;
pub mod memory;
pub mod message;
pub mod sched;
pub mod semaphore;

pub use cinder_hal::{Hal, HalError, IrqMask, StackSlot};
pub use cinder_kernel_core::{
    config, Armv7aContext, BootConfig, ContextBuilder, DeferRequest, InvariantViolation,
    KernelError, KernelSnapshot, KernelState, Message, Priority, ProcessId, ProcessState,
    SemaphoreId,
};
pub use cinder_unsafe_primitives::{KernelCell, RawRegion};

/// The kernel, generic over HAL implementation and initial-context layout.
pub struct Kernel<H: Hal, C: ContextBuilder = Armv7aContext> {
    hal: H,
    state: KernelState,
    context: C,
    /// Return address planted in every new process's first frame
    exit_trampoline: usize,
}

impl<H: Hal> Kernel<H, Armv7aContext> {
    /// Boot the kernel over `region` with ARMv7-A process frames.
    ///
    /// On return the idle process is CURRENT and every other table is empty.
    pub fn boot(hal: H, region: RawRegion, config: BootConfig) -> Result<Self, KernelError> {
        Self::with_context(hal, region, config, Armv7aContext)
    }
}

impl<H: Hal, C: ContextBuilder> Kernel<H, C> {
    /// Boot the kernel with a custom initial-context builder.
    pub fn with_context(
        hal: H,
        region: RawRegion,
        config: BootConfig,
        context: C,
    ) -> Result<Self, KernelError> {
        let mask = hal.disable_interrupts();
        let state = KernelState::new(region, &config);
        hal.restore_interrupts(mask);
        let state = state?;

        log::debug!(
            "[Cinder Boot] {} bytes free, idle stack {:#x}",
            state.memory.free_total(),
            state
                .procs
                .get(ProcessId::NULL)
                .map(|p| p.stack_base)
                .unwrap_or(0)
        );
        Ok(Self {
            hal,
            state,
            context,
            exit_trampoline: config.exit_trampoline,
        })
    }

    /// Get a reference to the HAL
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Read-only view of the kernel tables
    pub fn state(&self) -> &KernelState {
        &self.state
    }

    /// Lowest usable heap address.
    pub fn heap_base(&self) -> usize {
        self.state.memory.min_heap()
    }

    /// Run `f` with interrupts masked, restoring the previous mask after.
    ///
    /// Sections nest: an inner section restores the still-masked state.
    pub(crate) fn critical<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let mask = self.hal.disable_interrupts();
        let result = f(self);
        self.hal.restore_interrupts(mask);
        result
    }

    /// Run `f` inside a deferral section; the one reschedule it owes, if
    /// any, happens when the section closes. Interrupts must be masked.
    pub(crate) fn deferred<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, KernelError>,
    ) -> Result<R, KernelError> {
        self.state.deferral.start();
        let result = f(self);
        if self.state.deferral.stop()? {
            self.resched_locked()?;
        }
        result
    }

    /// True while `pid` is the process on the CPU.
    pub(crate) fn is_running(&self, pid: ProcessId) -> bool {
        self.state.current == pid
            && self
                .state
                .procs
                .get(pid)
                .is_ok_and(|p| p.state == ProcessState::Current)
    }
}

/// Declare the single global kernel instance for a target.
///
/// Expands to a `static` cell and two functions, `install_kernel` and
/// `kernel`. Call once at the crate root of the board support crate.
///
/// # Example
///
/// ```ignore
/// cinder_kernel::declare_kernel!(cinder_hal::armv7a::Armv7aHal);
///
/// let k = Kernel::boot(hal, region, BootConfig::default())?;
/// install_kernel(k).ok();
/// ```
#[macro_export]
macro_rules! declare_kernel {
    ($hal:ty) => {
        static CINDER_KERNEL: $crate::KernelCell<$crate::Kernel<$hal>> =
            $crate::KernelCell::empty();

        /// Install the booted kernel. Fails, handing it back, if one is
        /// already installed.
        pub fn install_kernel(kernel: $crate::Kernel<$hal>) -> Result<(), $crate::Kernel<$hal>> {
            CINDER_KERNEL.install(kernel)
        }

        /// The installed kernel, if any.
        ///
        /// # Safety
        ///
        /// Single core only, and the caller must not hold another reference
        /// returned by this function.
        pub unsafe fn kernel() -> Option<&'static mut $crate::Kernel<$hal>> {
            CINDER_KERNEL.get_mut()
        }
    };
}
