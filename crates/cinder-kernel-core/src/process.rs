//! Process table
//!
//! Fixed array of process control blocks. A slot's index is its process id;
//! ids are reused only after the slot returns to `Free`.

use crate::config::{CONSOLE, NDESC, NO_DESCRIPTOR, NPROC, NSTDIO};
use crate::error::KernelError;
use crate::types::{Message, Priority, ProcessId, ProcessName, ProcessState, SemaphoreId};

/// Process control block
#[derive(Clone, Copy, Debug)]
pub struct Process {
    /// Current state
    pub state: ProcessState,
    /// Static priority
    pub prio: Priority,
    /// Saved stack pointer while not running
    pub stack_ptr: usize,
    /// Top word of the stack, as returned by the allocator
    pub stack_base: usize,
    /// Stack length in bytes
    pub stack_len: usize,
    /// Name for diagnostics
    pub name: ProcessName,
    /// Semaphore the process is waiting on
    pub sem: Option<SemaphoreId>,
    /// Creator, notified on termination
    pub parent: ProcessId,
    /// Pending message
    pub message: Message,
    /// True while `message` is undelivered
    pub has_message: bool,
    /// Device descriptors
    pub descriptors: [i16; NDESC],
}

impl Process {
    /// An unused slot.
    pub const FREE: Process = Process {
        state: ProcessState::Free,
        prio: 0,
        stack_ptr: 0,
        stack_base: 0,
        stack_len: 0,
        name: ProcessName::empty(),
        sem: None,
        parent: ProcessId::NULL,
        message: 0,
        has_message: false,
        descriptors: [NO_DESCRIPTOR; NDESC],
    };

    /// Descriptors opened on the console for every new process.
    pub fn default_descriptors() -> [i16; NDESC] {
        let mut descriptors = [NO_DESCRIPTOR; NDESC];
        for slot in descriptors.iter_mut().take(NSTDIO) {
            *slot = CONSOLE;
        }
        descriptors
    }
}

/// The process table
pub struct ProcessTable {
    procs: [Process; NPROC],
    /// Active processes, idle included
    count: usize,
    /// Where the next slot search starts
    next_pid: usize,
}

impl ProcessTable {
    /// A table with every slot free.
    pub const fn new() -> Self {
        Self {
            procs: [Process::FREE; NPROC],
            count: 0,
            next_pid: 1,
        }
    }

    /// Look up a live process.
    pub fn get(&self, pid: ProcessId) -> Result<&Process, KernelError> {
        match self.procs.get(pid.0) {
            Some(p) if p.state != ProcessState::Free => Ok(p),
            _ => Err(KernelError::InvalidProcess),
        }
    }

    /// Look up a live process for modification.
    pub fn get_mut(&mut self, pid: ProcessId) -> Result<&mut Process, KernelError> {
        match self.procs.get_mut(pid.0) {
            Some(p) if p.state != ProcessState::Free => Ok(p),
            _ => Err(KernelError::InvalidProcess),
        }
    }

    /// Look up any slot, free or not.
    pub fn slot(&self, pid: ProcessId) -> Option<&Process> {
        self.procs.get(pid.0)
    }

    /// Look up any slot for modification, free or not.
    pub fn slot_mut(&mut self, pid: ProcessId) -> Option<&mut Process> {
        self.procs.get_mut(pid.0)
    }

    /// True when `pid` names a live process.
    pub fn is_valid(&self, pid: ProcessId) -> bool {
        self.get(pid).is_ok()
    }

    /// Find a free slot, searching round-robin from the last id handed out.
    pub fn alloc_pid(&mut self) -> Result<ProcessId, KernelError> {
        for _ in 0..NPROC {
            self.next_pid %= NPROC;
            let candidate = self.next_pid;
            self.next_pid += 1;
            if self.procs[candidate].state == ProcessState::Free {
                return Ok(ProcessId(candidate));
            }
        }
        Err(KernelError::ProcessTableFull)
    }

    /// Active processes, idle included.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Record one more active process.
    pub fn increment_count(&mut self) {
        self.count += 1;
    }

    /// Record one fewer active process and return the new count.
    pub fn decrement_count(&mut self) -> usize {
        self.count = self.count.saturating_sub(1);
        self.count
    }

    /// Iterate over `(pid, pcb)` for every slot.
    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, &Process)> {
        self.procs
            .iter()
            .enumerate()
            .map(|(i, p)| (ProcessId(i), p))
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
