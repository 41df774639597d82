//! Compile-time kernel configuration
//!
//! Table capacities and process defaults. Everything the kernel sizes is
//! fixed here; nothing grows at runtime.

use serde::{Deserialize, Serialize};

/// Number of process table slots (including the idle process).
pub const NPROC: usize = 8;

/// Number of semaphore table slots.
pub const NSEM: usize = 120;

/// Queue table entries: one node per process, a sentinel pair for the ready
/// list, a spare pair for the clock's sleep queue, and a pair per semaphore.
pub const NQENT: usize = NPROC + 4 + 2 * NSEM;

/// Process name length including the terminating NUL.
pub const PNMLEN: usize = 16;

/// Device descriptors per process.
pub const NDESC: usize = 5;

/// Descriptors closed on termination (stdin, stdout, stderr).
pub const NSTDIO: usize = 3;

/// Default device for the standard descriptors.
pub const CONSOLE: i16 = 0;

/// Descriptor value meaning "not open".
pub const NO_DESCRIPTOR: i16 = -1;

/// Id of the idle process.
pub const NULLPROC: usize = 0;

/// Default stack size for user processes.
pub const INITSTK: usize = 65536;

/// Default priority for user processes.
pub const INITPRIO: i16 = 20;

/// Minimum process stack size in bytes.
pub const MINSTK: usize = 400;

/// Stack size of the idle process.
pub const NULLSTK: usize = 8192;

/// Clock ticks a process runs before preemption.
pub const QUANTUM: u32 = 2;

/// Marker word written at the top of every process stack.
pub const STACK_MAGIC: usize = 0x0A0A_AAA9;

/// Maximum arguments passed to a new process.
pub const MAX_ARGS: usize = 16;

/// Runtime parameters supplied by the board at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    /// Stack size for the idle process
    pub null_stack: usize,
    /// Address new processes return to when their entry function returns
    pub exit_trampoline: usize,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            null_stack: NULLSTK,
            exit_trampoline: 0,
        }
    }
}
