//! Scheduling syscalls
//!
//! - `resched()` - Give the CPU to the highest-priority ready process
//! - `resched_cntl()` - Open or close a deferral section
//! - `yield_now()` - Voluntarily let equal-priority processes run
//! - `preempt_tick()` - Clock tick entry; reschedules when the quantum expires
//! - `ready()` - Make a blocked process runnable

use cinder_hal::{Hal, StackSlot};
use cinder_kernel_core::config::QUANTUM;
use cinder_kernel_core::{ContextBuilder, DeferRequest, Dispatch, KernelError, ProcessId, ProcessState};

use crate::Kernel;

impl<H: Hal, C: ContextBuilder> Kernel<H, C> {
    // ========================================================================
    // Internal (interrupts already masked)
    // ========================================================================

    fn stack_slot(&mut self, pid: ProcessId) -> Result<StackSlot, KernelError> {
        let pcb = self
            .state
            .procs
            .slot_mut(pid)
            .ok_or(KernelError::InvalidProcess)?;
        Ok(StackSlot::new(&mut pcb.stack_ptr))
    }

    pub(crate) fn resched_locked(&mut self) -> Result<(), KernelError> {
        match self.state.dispatch()? {
            Dispatch::Deferred | Dispatch::Stay => Ok(()),
            Dispatch::Switch { from, to } => {
                let from = self.stack_slot(from)?;
                let to = self.stack_slot(to)?;
                self.hal.context_switch(from, to);
                Ok(())
            }
        }
    }

    /// Make `pid` READY and reschedule.
    pub(crate) fn ready_locked(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        self.state.make_ready(pid)?;
        self.resched_locked()
    }

    // ========================================================================
    // Syscalls
    // ========================================================================

    /// Reschedule: keep the current process only if it strictly outranks
    /// every ready process, otherwise switch to the ready head.
    pub fn resched(&mut self) -> Result<(), KernelError> {
        self.critical(|k| k.resched_locked())
    }

    /// Start or stop deferred rescheduling.
    ///
    /// Sections nest. Closing the outermost one runs exactly one reschedule
    /// if any was requested while it was open.
    pub fn resched_cntl(&mut self, request: DeferRequest) -> Result<(), KernelError> {
        self.critical(|k| match request {
            DeferRequest::Start => {
                k.state.deferral.start();
                Ok(())
            }
            DeferRequest::Stop => {
                let owed = k.state.deferral.stop().map_err(|e| {
                    log::warn!("[Cinder Sched] deferral stop without start");
                    e
                })?;
                if owed {
                    k.resched_locked()?;
                }
                Ok(())
            }
        })
    }

    /// Give up the CPU to any ready process of equal or higher priority.
    pub fn yield_now(&mut self) -> Result<(), KernelError> {
        self.critical(|k| k.resched_locked())
    }

    /// One clock tick. At the end of the quantum the quantum is refilled and
    /// the scheduler runs.
    pub fn preempt_tick(&mut self) -> Result<(), KernelError> {
        self.critical(|k| {
            k.state.preempt = k.state.preempt.saturating_sub(1);
            if k.state.preempt > 0 {
                return Ok(());
            }
            k.state.preempt = QUANTUM;
            k.resched_locked()
        })
    }

    /// Make a SUSPENDED or RECEIVING process runnable and reschedule.
    ///
    /// Any other state is rejected with `InvalidState`: a waiter is still
    /// linked on its semaphore list and a sleeper is owned by the clock, so
    /// those leave only through `signal`, `send` or `kill`.
    pub fn ready(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        self.critical(|k| {
            let state = k.state.procs.get(pid)?.state;
            if !matches!(state, ProcessState::Suspended | ProcessState::Receiving) {
                return Err(KernelError::InvalidState);
            }
            log::trace!("[Cinder Sched] ready {} from {:?}", pid, state);
            k.ready_locked(pid)
        })
    }
}
