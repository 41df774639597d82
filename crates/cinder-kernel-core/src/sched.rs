//! Scheduling decisions
//!
//! `KernelState::dispatch` is the pure half of a reschedule: it updates the
//! process table and ready list and says which stack pointers to swap. The
//! runtime performs the actual switch through the HAL.

use crate::config::QUANTUM;
use crate::error::KernelError;
use crate::state::KernelState;
use crate::types::{ProcessId, ProcessState};

/// Argument to `resched_cntl`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferRequest {
    /// Enter a deferral section
    Start,
    /// Leave a deferral section
    Stop,
}

impl TryFrom<i32> for DeferRequest {
    type Error = KernelError;

    /// Numeric form used by the C-style interface: 1 starts, 2 stops.
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DeferRequest::Start),
            2 => Ok(DeferRequest::Stop),
            _ => Err(KernelError::InvalidArgument),
        }
    }
}

/// Deferred rescheduling state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deferral {
    /// Nesting depth of open deferral sections
    pub depth: i32,
    /// A reschedule was requested while deferred
    pub attempted: bool,
}

impl Deferral {
    /// No deferral in effect.
    pub const fn new() -> Self {
        Self {
            depth: 0,
            attempted: false,
        }
    }

    /// True while any deferral section is open.
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    /// Open a section. The attempted flag is cleared only by the outermost one.
    pub fn start(&mut self) {
        if self.depth == 0 {
            self.attempted = false;
        }
        self.depth += 1;
    }

    /// Close a section. Returns true when this closed the outermost section
    /// and a reschedule is owed.
    pub fn stop(&mut self) -> Result<bool, KernelError> {
        if self.depth <= 0 {
            return Err(KernelError::DeferralUnderflow);
        }
        self.depth -= 1;
        Ok(self.depth == 0 && self.attempted)
    }
}

/// Outcome of a reschedule decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Deferral is active; the attempt was recorded
    Deferred,
    /// The current process keeps the CPU
    Stay,
    /// Switch stacks from one process to another
    Switch {
        /// Outgoing process (may already be free or blocked)
        from: ProcessId,
        /// Incoming process, now CURRENT
        to: ProcessId,
    },
}

impl KernelState {
    /// Decide who runs next and update the tables accordingly.
    ///
    /// A CURRENT process keeps the CPU only while its priority is strictly
    /// above every ready process. Otherwise it goes back on the ready list
    /// behind its equals and the ready head is dispatched with a fresh
    /// quantum.
    pub fn dispatch(&mut self) -> Result<Dispatch, KernelError> {
        if self.deferral.is_active() {
            self.deferral.attempted = true;
            return Ok(Dispatch::Deferred);
        }

        let old = self.current;
        let (old_state, old_prio) = {
            let pcb = self
                .procs
                .slot(old)
                .ok_or(KernelError::InvalidProcess)?;
            (pcb.state, pcb.prio)
        };

        if old_state != ProcessState::Current && self.queues.is_empty(self.ready_list)? {
            return Err(KernelError::InvalidState);
        }

        if old_state == ProcessState::Current {
            if i32::from(old_prio) > self.queues.first_key(self.ready_list)? {
                return Ok(Dispatch::Stay);
            }
            self.procs.get_mut(old)?.state = ProcessState::Ready;
            self.queues
                .insert(old, self.ready_list, i32::from(old_prio))?;
        }

        let new = self
            .queues
            .dequeue(self.ready_list)?
            .ok_or(KernelError::InvalidState)?;
        self.procs.get_mut(new)?.state = ProcessState::Current;
        self.current = new;
        self.preempt = QUANTUM;

        if new == old {
            return Ok(Dispatch::Stay);
        }
        log::trace!("[Cinder Sched] dispatch {} -> {}", old, new);
        Ok(Dispatch::Switch { from: old, to: new })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_deferral() {
        let mut d = Deferral::new();
        d.start();
        d.attempted = true;
        d.start();
        assert_eq!(d.depth, 2);
        assert!(d.attempted, "inner start must not clear the flag");

        assert_eq!(d.stop(), Ok(false));
        assert_eq!(d.stop(), Ok(true));
        assert!(!d.is_active());
    }

    #[test]
    fn test_stop_without_start() {
        let mut d = Deferral::new();
        assert_eq!(d.stop(), Err(KernelError::DeferralUnderflow));
        assert_eq!(d.depth, 0);
    }

    #[test]
    fn test_outer_start_clears_stale_attempt() {
        let mut d = Deferral::new();
        d.attempted = true;
        d.start();
        assert!(!d.attempted);
        assert_eq!(d.stop(), Ok(false));
    }

    #[test]
    fn test_numeric_requests() {
        assert_eq!(DeferRequest::try_from(1), Ok(DeferRequest::Start));
        assert_eq!(DeferRequest::try_from(2), Ok(DeferRequest::Stop));
        assert_eq!(DeferRequest::try_from(0), Err(KernelError::InvalidArgument));
    }
}
