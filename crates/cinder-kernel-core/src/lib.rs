//! Cinder Kernel Core - Pure Kernel State
//!
//! This crate contains the **HAL-free** half of the Cinder kernel: every
//! table the kernel owns and the pure decisions made over them.
//!
//! # Design Principles
//!
//! 1. **No HAL dependency**: interrupt masking and context switches live in `cinder-kernel`
//! 2. **Fixed capacity**: every table is sized at compile time in `config`
//! 3. **Checkable**: `check_all_invariants` inspects the whole state at any point
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    cinder-kernel-core                       │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │  KernelState  │    │  dispatch()   │                   │
//! │   │  - queues     │───▶│  ready list   │                   │
//! │   │  - procs      │    │  decision     │                   │
//! │   │  - sems       │    └───────────────┘                   │
//! │   │  - memory     │                                         │
//! │   └───────────────┘    ┌───────────────┐                   │
//! │                        │  Invariants   │                   │
//! │   ┌───────────────┐    │  Snapshot     │                   │
//! │   │ ContextBuilder│    └───────────────┘                   │
//! │   └───────────────┘                                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              │ used by
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      cinder-kernel                          │
//! │   - critical sections and context switches via the HAL      │
//! │   - process lifecycle, semaphores, messaging syscalls       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `config` - Table capacities and process defaults
//! - `types` - Identifiers, process state, names
//! - `queue` - Index-linked queue table shared by every list
//! - `memory` - Free-list allocator for heap blocks and stacks
//! - `process` - Process table
//! - `semaphore` - Semaphore table
//! - `sched` - Deferral and the dispatch decision
//! - `context` - Initial stack frames for new processes
//! - `state` - KernelState aggregating all of the above
//! - `invariants` - Runtime invariant checks
//! - `snapshot` - Serializable state views

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod context;
pub mod error;
pub mod invariants;
pub mod memory;
pub mod process;
pub mod queue;
pub mod sched;
pub mod semaphore;
pub mod snapshot;
pub mod state;
pub mod types;

pub use config::BootConfig;
pub use context::{Armv7aContext, ContextBuilder, InitialFrame};
pub use error::KernelError;
pub use invariants::{assert_invariants, check_all_invariants, InvariantViolation};
pub use memory::{FreeBlock, FreeList, ALLOC_UNIT};
pub use process::{Process, ProcessTable};
pub use queue::QueueTable;
pub use sched::{DeferRequest, Deferral, Dispatch};
pub use semaphore::{Semaphore, SemaphoreState, SemaphoreTable};
pub use snapshot::{FreeBlockInfo, KernelSnapshot, ProcessInfo, SemaphoreInfo};
pub use state::KernelState;
pub use types::{
    Key, Message, Priority, ProcessId, ProcessName, ProcessState, QueueId, SemaphoreId, MAXKEY,
    MINKEY,
};
