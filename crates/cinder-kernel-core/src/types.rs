//! Core type definitions for the kernel

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{NPROC, NSEM, PNMLEN};

/// Queue ordering key. Larger keys are scheduled sooner.
pub type Key = i32;

/// Static process priority.
pub type Priority = i16;

/// One-word message carried by direct messaging.
pub type Message = u32;

/// Key of every list head sentinel.
pub const MAXKEY: Key = Key::MAX;

/// Key of every list tail sentinel.
pub const MINKEY: Key = Key::MIN;

/// Process identifier: the index of the process table slot.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProcessId(pub usize);

impl ProcessId {
    /// The idle process.
    pub const NULL: ProcessId = ProcessId(crate::config::NULLPROC);

    /// Table index of this process.
    pub fn index(self) -> usize {
        self.0
    }

    /// True when the id names a process table slot.
    pub fn in_range(self) -> bool {
        self.0 < NPROC
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Semaphore identifier: the index of the semaphore table slot.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SemaphoreId(pub usize);

impl SemaphoreId {
    /// True when the id names a semaphore table slot.
    pub fn in_range(self) -> bool {
        self.0 < NSEM
    }
}

impl fmt::Display for SemaphoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// List identifier: the queue table index of the list's head sentinel.
/// The tail sentinel sits at the next index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId(pub usize);

impl QueueId {
    /// Index of the head sentinel.
    pub fn head(self) -> usize {
        self.0
    }

    /// Index of the tail sentinel.
    pub fn tail(self) -> usize {
        self.0 + 1
    }
}

/// Process state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Slot is unused
    Free,
    /// Running on the CPU
    Current,
    /// On the ready list
    Ready,
    /// Blocked in receive
    Receiving,
    /// On the clock's sleep queue
    Sleeping,
    /// Suspended; runs only after resume
    Suspended,
    /// On a semaphore's wait list
    Waiting,
    /// Blocked in a receive with timeout (clock-owned)
    ReceivingTimed,
}

impl ProcessState {
    /// True for states the clock subsystem holds on its sleep queue.
    pub fn is_sleeping(self) -> bool {
        matches!(self, ProcessState::Sleeping | ProcessState::ReceivingTimed)
    }
}

/// Fixed-length, NUL-terminated process name.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProcessName([u8; PNMLEN]);

impl ProcessName {
    /// An empty name.
    pub const fn empty() -> Self {
        Self([0; PNMLEN])
    }

    /// Copy `name`, truncated to fit with its terminator. Truncation never
    /// splits a UTF-8 character.
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(PNMLEN - 1);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; PNMLEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self(bytes)
    }

    /// The name up to its terminator.
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(PNMLEN);
        core::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

impl Default for ProcessName {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}
