//! Index-linked queue table
//!
//! One fixed array of nodes holds every list in the kernel: the ready list,
//! each semaphore's wait list and the clock's sleep queue. Nodes
//! `0..NPROC` are processes; above that, nodes come in (head, tail) sentinel
//! pairs, one pair per list. A process is on at most one list at a time, so
//! its node's links say where it is.
//!
//! ```text
//!   head(MAXKEY) <-> pid 3 (key 20) <-> pid 5 (key 20) <-> pid 1 (key 5) <-> tail(MINKEY)
//! ```
//!
//! Head and tail keys bound every other key, so a priority walk always stops
//! at or before the tail. All operations assume interrupts are masked.

use crate::config::{NPROC, NQENT};
use crate::error::KernelError;
use crate::types::{Key, ProcessId, QueueId, MAXKEY, MINKEY};

/// Link value of a node that is on no list.
const EMPTY: usize = usize::MAX;

/// One node of the queue table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    /// Ordering key
    pub key: Key,
    /// Index of the next node
    pub next: usize,
    /// Index of the previous node
    pub prev: usize,
}

impl QueueEntry {
    const UNLINKED: QueueEntry = QueueEntry {
        key: 0,
        next: EMPTY,
        prev: EMPTY,
    };
}

/// The queue table
pub struct QueueTable {
    entries: [QueueEntry; NQENT],
    /// Head index of the next list to hand out
    next_list: usize,
}

impl QueueTable {
    /// A table with every process node unlinked and no lists allocated.
    pub const fn new() -> Self {
        Self {
            entries: [QueueEntry::UNLINKED; NQENT],
            next_list: NPROC,
        }
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// Allocate a new, empty list.
    pub fn new_list(&mut self) -> Result<QueueId, KernelError> {
        if self.next_list + 1 >= NQENT {
            return Err(KernelError::QueueTableFull);
        }
        let q = QueueId(self.next_list);
        self.next_list += 2;

        self.entries[q.head()] = QueueEntry {
            key: MAXKEY,
            next: q.tail(),
            prev: EMPTY,
        };
        self.entries[q.tail()] = QueueEntry {
            key: MINKEY,
            next: EMPTY,
            prev: q.head(),
        };
        Ok(q)
    }

    /// Number of lists allocated so far.
    pub fn list_count(&self) -> usize {
        (self.next_list - NPROC) / 2
    }

    /// All allocated lists, in allocation order.
    pub fn lists(&self) -> impl Iterator<Item = QueueId> {
        (NPROC..self.next_list).step_by(2).map(QueueId)
    }

    fn check_list(&self, q: QueueId) -> Result<(), KernelError> {
        if q.0 < NPROC || q.0 >= self.next_list || (q.0 - NPROC) % 2 != 0 {
            return Err(KernelError::InvalidQueue);
        }
        Ok(())
    }

    fn check_pid(pid: ProcessId) -> Result<(), KernelError> {
        if !pid.in_range() {
            return Err(KernelError::InvalidQueue);
        }
        Ok(())
    }

    /// True when the list holds no processes.
    pub fn is_empty(&self, q: QueueId) -> Result<bool, KernelError> {
        self.check_list(q)?;
        Ok(self.entries[q.head()].next >= NPROC)
    }

    /// First process on the list without removing it.
    pub fn first_id(&self, q: QueueId) -> Result<Option<ProcessId>, KernelError> {
        self.check_list(q)?;
        let first = self.entries[q.head()].next;
        Ok((first < NPROC).then_some(ProcessId(first)))
    }

    /// Key of the first node. `MINKEY` (the tail's key) when the list is empty.
    pub fn first_key(&self, q: QueueId) -> Result<Key, KernelError> {
        self.check_list(q)?;
        Ok(self.entries[self.entries[q.head()].next].key)
    }

    /// Key of the last node. `MAXKEY` (the head's key) when the list is empty.
    pub fn last_key(&self, q: QueueId) -> Result<Key, KernelError> {
        self.check_list(q)?;
        Ok(self.entries[self.entries[q.tail()].prev].key)
    }

    /// Walk the list head to tail without modifying it.
    pub fn iter(&self, q: QueueId) -> Result<QueueIter<'_>, KernelError> {
        self.check_list(q)?;
        Ok(QueueIter {
            table: self,
            cursor: self.entries[q.head()].next,
        })
    }

    /// True when `pid` is on list `q`.
    pub fn contains(&self, q: QueueId, pid: ProcessId) -> bool {
        self.iter(q)
            .map(|mut it| it.any(|(id, _)| id == pid))
            .unwrap_or(false)
    }

    /// True when `pid`'s node is linked into some list.
    pub fn is_linked(&self, pid: ProcessId) -> bool {
        pid.in_range() && self.entries[pid.0].next != EMPTY
    }

    /// Raw node, for invariant checking.
    pub fn entry(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    fn link_before(&mut self, pid: ProcessId, next: usize, key: Key) {
        let prev = self.entries[next].prev;
        self.entries[pid.0] = QueueEntry { key, next, prev };
        self.entries[prev].next = pid.0;
        self.entries[next].prev = pid.0;
    }

    /// Insert by key: ahead of every node with a smaller key, behind every
    /// node with an equal or larger one.
    pub fn insert(&mut self, pid: ProcessId, q: QueueId, key: Key) -> Result<(), KernelError> {
        self.check_list(q)?;
        Self::check_pid(pid)?;

        let mut curr = self.entries[q.head()].next;
        while self.entries[curr].key >= key && curr != q.tail() {
            curr = self.entries[curr].next;
        }
        self.link_before(pid, curr, key);
        Ok(())
    }

    /// Append at the tail.
    pub fn enqueue(&mut self, pid: ProcessId, q: QueueId) -> Result<ProcessId, KernelError> {
        self.check_list(q)?;
        Self::check_pid(pid)?;
        let key = self.entries[pid.0].key;
        self.link_before(pid, q.tail(), key);
        Ok(pid)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    fn unlink(&mut self, index: usize) -> ProcessId {
        let QueueEntry { next, prev, .. } = self.entries[index];
        self.entries[prev].next = next;
        self.entries[next].prev = prev;
        self.entries[index].next = EMPTY;
        self.entries[index].prev = EMPTY;
        ProcessId(index)
    }

    /// Remove from the head (FIFO order for `enqueue`).
    pub fn dequeue(&mut self, q: QueueId) -> Result<Option<ProcessId>, KernelError> {
        self.get_first(q)
    }

    /// Remove the first process.
    pub fn get_first(&mut self, q: QueueId) -> Result<Option<ProcessId>, KernelError> {
        self.check_list(q)?;
        let first = self.entries[q.head()].next;
        if first >= NPROC {
            return Ok(None);
        }
        Ok(Some(self.unlink(first)))
    }

    /// Remove the last process.
    pub fn get_last(&mut self, q: QueueId) -> Result<Option<ProcessId>, KernelError> {
        self.check_list(q)?;
        let last = self.entries[q.tail()].prev;
        if last >= NPROC {
            return Ok(None);
        }
        Ok(Some(self.unlink(last)))
    }

    /// Splice a process out of whatever list holds it.
    pub fn remove(&mut self, pid: ProcessId) -> Result<ProcessId, KernelError> {
        Self::check_pid(pid)?;
        if !self.is_linked(pid) {
            return Err(KernelError::InvalidQueue);
        }
        Ok(self.unlink(pid.0))
    }
}

impl Default for QueueTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over `(pid, key)` pairs of one list
pub struct QueueIter<'a> {
    table: &'a QueueTable,
    cursor: usize,
}

impl Iterator for QueueIter<'_> {
    type Item = (ProcessId, Key);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= NPROC {
            return None;
        }
        let entry = self.table.entries[self.cursor];
        let item = (ProcessId(self.cursor), entry.key);
        self.cursor = entry.next;
        Some(item)
    }
}
