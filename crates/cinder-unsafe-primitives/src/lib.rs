//! Cinder Unsafe Primitives - Consolidated Unsafe Code TCB
//!
//! This crate contains ALL unsafe code in the Cinder kernel, consolidated
//! into a single auditable location. Every other crate in the workspace
//! uses `#![deny(unsafe_code)]`.
//!
//! # Design Principles
//!
//! 1. **Minimal unsafe surface**: raw word access, saved stack pointers, one global cell
//! 2. **Safe wrappers**: bounds and alignment are checked before any raw access
//! 3. **Auditable**: Small, focused modules for review
//! 4. **Verified**: Kani proofs where applicable
//!
//! # Module Organization
//!
//! - `region` - Bounds-checked word access to a span of machine memory (heap, stacks)
//! - `sync` - `StackSlot` for context switches and the single-core `KernelCell`
//! - `cpu` - ARMv7-A interrupt mask and idle instructions (target only)
//! - `loom_tests` - Concurrency tests using loom (with `loom` feature)
//!
//! # Verification
//!
//! 1. **Kani proofs** (`cargo kani`): bounds checks never admit an out-of-region access
//! 2. **Loom tests** (`cargo test --features loom`): install-once protocol of `KernelCell`
//! 3. **Unit tests**: Traditional testing for basic functionality

#![no_std]

#[cfg(test)]
extern crate std;

pub mod cpu;
pub mod region;
pub mod sync;

#[cfg(any(test, feature = "loom"))]
mod loom_tests;

pub use region::{RawRegion, WORD_SIZE};
pub use sync::{KernelCell, StackSlot};
