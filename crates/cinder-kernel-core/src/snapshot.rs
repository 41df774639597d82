//! Serializable views of kernel state
//!
//! A snapshot copies what a debugger or test wants to see out of the live
//! tables. It holds no references, so it can be serialized after the
//! critical section that took it has ended.

use serde::Serialize;

use crate::config::{NPROC, NSEM};
use crate::semaphore::SemaphoreState;
use crate::state::KernelState;
use crate::types::{Priority, ProcessId, ProcessState, SemaphoreId};

/// Free blocks reported per snapshot
pub const SNAPSHOT_BLOCKS: usize = 32;

/// One live process
#[derive(Clone, Debug, Serialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub name: heapless::String<16>,
    pub state: ProcessState,
    pub prio: Priority,
    pub parent: ProcessId,
    pub stack_base: usize,
    pub stack_len: usize,
    pub has_message: bool,
    pub sem: Option<SemaphoreId>,
}

/// One semaphore in use
#[derive(Clone, Debug, Serialize)]
pub struct SemaphoreInfo {
    pub id: SemaphoreId,
    pub count: i32,
}

/// One free block
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FreeBlockInfo {
    pub addr: usize,
    pub length: usize,
}

/// Point-in-time copy of the kernel tables
#[derive(Clone, Debug, Serialize)]
pub struct KernelSnapshot {
    pub current: ProcessId,
    pub process_count: usize,
    pub deferral_depth: i32,
    pub processes: heapless::Vec<ProcessInfo, NPROC>,
    pub ready: heapless::Vec<ProcessId, NPROC>,
    pub semaphores: heapless::Vec<SemaphoreInfo, NSEM>,
    pub free_total: usize,
    pub free_blocks: heapless::Vec<FreeBlockInfo, SNAPSHOT_BLOCKS>,
}

impl KernelSnapshot {
    /// Copy the tables out of `state`.
    ///
    /// Free blocks beyond `SNAPSHOT_BLOCKS` are left out; `free_total` still
    /// counts them.
    pub fn capture(state: &KernelState) -> Self {
        let mut processes = heapless::Vec::new();
        for (pid, p) in state.procs.iter() {
            if p.state == ProcessState::Free {
                continue;
            }
            let mut name = heapless::String::new();
            let _ = name.push_str(p.name.as_str());
            let _ = processes.push(ProcessInfo {
                pid,
                name,
                state: p.state,
                prio: p.prio,
                parent: p.parent,
                stack_base: p.stack_base,
                stack_len: p.stack_len,
                has_message: p.has_message,
                sem: p.sem,
            });
        }

        let mut ready = heapless::Vec::new();
        if let Ok(iter) = state.queues.iter(state.ready_list) {
            for (pid, _) in iter {
                let _ = ready.push(pid);
            }
        }

        let mut semaphores = heapless::Vec::new();
        for (id, sem) in state.sems.iter() {
            if sem.state == SemaphoreState::Used {
                let _ = semaphores.push(SemaphoreInfo {
                    id,
                    count: sem.count,
                });
            }
        }

        let mut free_blocks = heapless::Vec::new();
        for block in state.memory.blocks().take(SNAPSHOT_BLOCKS) {
            let _ = free_blocks.push(FreeBlockInfo {
                addr: block.addr,
                length: block.length,
            });
        }

        Self {
            current: state.current,
            process_count: state.procs.count(),
            deferral_depth: state.deferral.depth,
            processes,
            ready,
            semaphores,
            free_total: state.memory.free_total(),
            free_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootConfig;
    use cinder_unsafe_primitives::RawRegion;
    use std::boxed::Box;
    use std::vec;

    #[test]
    fn test_boot_snapshot() {
        let buffer = Box::leak(vec![0usize; 4096].into_boxed_slice());
        let mut state =
            KernelState::new(RawRegion::from_static(buffer), &BootConfig::default()).unwrap();
        state.sems.alloc(2).unwrap();

        let snap = KernelSnapshot::capture(&state);
        assert_eq!(snap.current, ProcessId::NULL);
        assert_eq!(snap.process_count, 1);
        assert_eq!(snap.processes.len(), 1);
        assert_eq!(snap.processes[0].name.as_str(), "prnull");
        assert!(snap.ready.is_empty());
        assert_eq!(snap.semaphores.len(), 1);
        assert_eq!(snap.semaphores[0].count, 2);
        assert_eq!(snap.free_blocks.len(), 1);
        assert_eq!(snap.free_blocks[0].length, snap.free_total);
    }
}
