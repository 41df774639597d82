//! Kernel errors

use core::fmt;

/// Kernel errors
///
/// Every syscall returns one of these instead of a single failure sentinel.
/// Identifier errors are always checked before any state is touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// Process id out of range, or the slot is free
    InvalidProcess,
    /// Semaphore id out of range, or the semaphore is free
    InvalidSemaphore,
    /// List id does not name an allocated list, or node id out of range
    InvalidQueue,
    /// Operation not allowed in the process's current state
    InvalidState,
    /// Invalid argument (zero length, negative count, priority below 1)
    InvalidArgument,
    /// No free process slot
    ProcessTableFull,
    /// No free semaphore slot
    SemaphoreTableFull,
    /// No free list sentinel pair
    QueueTableFull,
    /// No free block large enough
    OutOfMemory,
    /// Released block overlaps a block that is already free
    Overlap,
    /// Address range lies outside the heap
    OutOfHeap,
    /// Recipient already holds an undelivered message
    MessagePending,
    /// Deferral stop without a matching start
    DeferralUnderflow,
    /// The caller blocked and another process now runs (simulated platforms)
    WouldBlock,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            KernelError::InvalidProcess => "invalid process id",
            KernelError::InvalidSemaphore => "invalid semaphore id",
            KernelError::InvalidQueue => "invalid queue id",
            KernelError::InvalidState => "operation not valid in process state",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::ProcessTableFull => "process table full",
            KernelError::SemaphoreTableFull => "semaphore table full",
            KernelError::QueueTableFull => "queue table full",
            KernelError::OutOfMemory => "out of memory",
            KernelError::Overlap => "block overlaps free memory",
            KernelError::OutOfHeap => "address outside heap",
            KernelError::MessagePending => "message already pending",
            KernelError::DeferralUnderflow => "deferral stop without start",
            KernelError::WouldBlock => "caller blocked",
        };
        f.write_str(text)
    }
}
