//! Kernel state - pure data structure holding all kernel state
//!
//! This module contains the KernelState struct which holds all mutable kernel
//! state. It has NO HAL dependency - interrupt masking, context switches and
//! the external collaborators are in the runtime wrapper (`cinder-kernel`).

use cinder_unsafe_primitives::RawRegion;

use crate::config::{BootConfig, MINSTK, QUANTUM};
use crate::error::KernelError;
use crate::memory::{round_unit, FreeList};
use crate::process::{Process, ProcessTable};
use crate::queue::QueueTable;
use crate::sched::Deferral;
use crate::semaphore::SemaphoreTable;
use crate::types::{ProcessId, ProcessName, ProcessState, QueueId};

/// The pure kernel state - no HAL, no I/O.
///
/// This struct is the verification target: `check_all_invariants` inspects it.
pub struct KernelState {
    /// Every list node (processes and sentinels)
    pub queues: QueueTable,
    /// Process table
    pub procs: ProcessTable,
    /// Semaphore table
    pub sems: SemaphoreTable,
    /// Heap and stack allocator
    pub memory: FreeList,
    /// Runnable processes other than the current one
    pub ready_list: QueueId,
    /// Process on the CPU
    pub current: ProcessId,
    /// Deferred rescheduling
    pub deferral: Deferral,
    /// Ticks left in the current process's quantum
    pub preempt: u32,
}

impl KernelState {
    /// Build the boot-time state over a heap region.
    ///
    /// Every process slot starts free except the idle process, which is
    /// CURRENT at priority 0 with a stack carved from the top of the heap.
    /// Every semaphore gets its wait list, then the ready list is allocated.
    pub fn new(region: RawRegion, config: &BootConfig) -> Result<Self, KernelError> {
        let mut queues = QueueTable::new();
        let sems = SemaphoreTable::new(&mut queues)?;
        let ready_list = queues.new_list()?;
        let mut memory = FreeList::new(region)?;

        let stack_len = round_unit(config.null_stack.max(MINSTK)).ok_or(KernelError::OutOfMemory)?;
        let stack_base = memory.allocate_stack(stack_len)?;

        let mut procs = ProcessTable::new();
        let idle = procs
            .slot_mut(ProcessId::NULL)
            .ok_or(KernelError::InvalidProcess)?;
        *idle = Process {
            state: ProcessState::Current,
            prio: 0,
            stack_base,
            stack_len,
            name: ProcessName::new("prnull"),
            descriptors: Process::default_descriptors(),
            ..Process::FREE
        };
        procs.increment_count();

        Ok(Self {
            queues,
            procs,
            sems,
            memory,
            ready_list,
            current: ProcessId::NULL,
            deferral: Deferral::new(),
            preempt: QUANTUM,
        })
    }

    /// Mark a process READY and put it on the ready list by priority.
    ///
    /// Does not reschedule.
    pub fn make_ready(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        let pcb = self.procs.get_mut(pid)?;
        pcb.state = ProcessState::Ready;
        let key = i32::from(pcb.prio);
        self.queues.insert(pid, self.ready_list, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NPROC;
    use crate::sched::Dispatch;
    use std::boxed::Box;
    use std::vec;

    fn state() -> KernelState {
        let buffer = Box::leak(vec![0usize; 4096].into_boxed_slice());
        KernelState::new(RawRegion::from_static(buffer), &BootConfig::default()).unwrap()
    }

    fn spawn(state: &mut KernelState, prio: i16) -> ProcessId {
        let pid = state.procs.alloc_pid().unwrap();
        *state.procs.slot_mut(pid).unwrap() = Process {
            state: ProcessState::Suspended,
            prio,
            ..Process::FREE
        };
        state.procs.increment_count();
        pid
    }

    #[test]
    fn test_boot_state() {
        let s = state();
        assert_eq!(s.current, ProcessId::NULL);
        assert_eq!(s.procs.count(), 1);
        let idle = s.procs.get(ProcessId::NULL).unwrap();
        assert_eq!(idle.state, ProcessState::Current);
        assert_eq!(idle.name.as_str(), "prnull");
        assert_eq!(idle.stack_base, s.memory.max_heap() - cinder_unsafe_primitives::WORD_SIZE);
        assert!(s.queues.is_empty(s.ready_list).unwrap());
        for pid in 1..NPROC {
            assert!(!s.procs.is_valid(ProcessId(pid)));
        }
    }

    #[test]
    fn test_higher_priority_preempts() {
        let mut s = state();
        let p = spawn(&mut s, 10);
        s.make_ready(p).unwrap();

        assert_eq!(
            s.dispatch().unwrap(),
            Dispatch::Switch { from: ProcessId::NULL, to: p }
        );
        assert_eq!(s.current, p);
        assert_eq!(s.procs.get(ProcessId::NULL).unwrap().state, ProcessState::Ready);
        assert!(s.queues.contains(s.ready_list, ProcessId::NULL));
    }

    #[test]
    fn test_strictly_higher_current_stays() {
        let mut s = state();
        let a = spawn(&mut s, 10);
        s.make_ready(a).unwrap();
        s.dispatch().unwrap();

        let b = spawn(&mut s, 5);
        s.make_ready(b).unwrap();
        assert_eq!(s.dispatch().unwrap(), Dispatch::Stay);
        assert_eq!(s.current, a);
    }

    #[test]
    fn test_equal_priority_rotates() {
        let mut s = state();
        let a = spawn(&mut s, 10);
        let b = spawn(&mut s, 10);
        s.make_ready(a).unwrap();
        s.make_ready(b).unwrap();
        s.dispatch().unwrap();
        assert_eq!(s.current, a);

        assert_eq!(s.dispatch().unwrap(), Dispatch::Switch { from: a, to: b });
        assert_eq!(s.dispatch().unwrap(), Dispatch::Switch { from: b, to: a });
    }

    #[test]
    fn test_blocked_current_is_not_requeued() {
        let mut s = state();
        let a = spawn(&mut s, 10);
        s.make_ready(a).unwrap();
        s.dispatch().unwrap();

        s.procs.get_mut(a).unwrap().state = ProcessState::Waiting;
        assert_eq!(
            s.dispatch().unwrap(),
            Dispatch::Switch { from: a, to: ProcessId::NULL }
        );
        assert!(!s.queues.contains(s.ready_list, a));
    }

    #[test]
    fn test_blocked_current_with_nothing_ready_is_rejected() {
        let mut s = state();
        s.procs.get_mut(ProcessId::NULL).unwrap().state = ProcessState::Waiting;
        assert_eq!(s.dispatch(), Err(KernelError::InvalidState));
        assert_eq!(s.current, ProcessId::NULL);
        assert_eq!(s.preempt, QUANTUM);
        assert!(s.queues.is_empty(s.ready_list).unwrap());
        assert!(!s.queues.is_linked(ProcessId::NULL));
    }

    #[test]
    fn test_deferred_dispatch_records_attempt() {
        let mut s = state();
        let a = spawn(&mut s, 10);
        s.make_ready(a).unwrap();
        s.deferral.start();
        assert_eq!(s.dispatch().unwrap(), Dispatch::Deferred);
        assert!(s.deferral.attempted);
        assert_eq!(s.current, ProcessId::NULL);
    }

    #[test]
    fn test_dispatch_resets_quantum() {
        let mut s = state();
        s.preempt = 0;
        let a = spawn(&mut s, 10);
        s.make_ready(a).unwrap();
        s.dispatch().unwrap();
        assert_eq!(s.preempt, QUANTUM);
    }
}
