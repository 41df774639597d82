//! Semaphore table
//!
//! Each slot owns one wait list in the queue table, allocated once at boot
//! and kept for the life of the system whether the slot is free or used.

use crate::config::NSEM;
use crate::error::KernelError;
use crate::queue::QueueTable;
use crate::types::{QueueId, SemaphoreId};

/// Semaphore slot state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemaphoreState {
    /// Available for semaphore_create
    Free,
    /// In use
    Used,
}

/// One semaphore
#[derive(Clone, Copy, Debug)]
pub struct Semaphore {
    /// Slot state
    pub state: SemaphoreState,
    /// Count; negative means that many waiters
    pub count: i32,
    /// Wait list
    pub queue: QueueId,
}

/// The semaphore table
pub struct SemaphoreTable {
    entries: [Semaphore; NSEM],
    next_sem: usize,
}

impl SemaphoreTable {
    /// Build the table, giving every slot its own wait list.
    pub fn new(queues: &mut QueueTable) -> Result<Self, KernelError> {
        let mut entries = [Semaphore {
            state: SemaphoreState::Free,
            count: 0,
            queue: QueueId(0),
        }; NSEM];
        for entry in entries.iter_mut() {
            entry.queue = queues.new_list()?;
        }
        Ok(Self {
            entries,
            next_sem: 0,
        })
    }

    /// Look up a semaphore in use.
    pub fn get(&self, sem: SemaphoreId) -> Result<&Semaphore, KernelError> {
        match self.entries.get(sem.0) {
            Some(s) if s.state == SemaphoreState::Used => Ok(s),
            _ => Err(KernelError::InvalidSemaphore),
        }
    }

    /// Look up a semaphore in use for modification.
    pub fn get_mut(&mut self, sem: SemaphoreId) -> Result<&mut Semaphore, KernelError> {
        match self.entries.get_mut(sem.0) {
            Some(s) if s.state == SemaphoreState::Used => Ok(s),
            _ => Err(KernelError::InvalidSemaphore),
        }
    }

    /// Claim a free slot, searching round-robin.
    pub fn alloc(&mut self, count: i32) -> Result<SemaphoreId, KernelError> {
        for _ in 0..NSEM {
            let candidate = self.next_sem;
            self.next_sem = (self.next_sem + 1) % NSEM;
            let entry = &mut self.entries[candidate];
            if entry.state == SemaphoreState::Free {
                entry.state = SemaphoreState::Used;
                entry.count = count;
                return Ok(SemaphoreId(candidate));
            }
        }
        Err(KernelError::SemaphoreTableFull)
    }

    /// Iterate over `(id, semaphore)` for every slot.
    pub fn iter(&self) -> impl Iterator<Item = (SemaphoreId, &Semaphore)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, s)| (SemaphoreId(i), s))
    }
}
