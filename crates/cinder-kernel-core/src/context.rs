//! Initial process contexts
//!
//! A new process starts life as if it had been switched out: its stack holds
//! the words the context switch pops, arranged for the target's calling
//! convention. Each architecture supplies a [`ContextBuilder`] that lays
//! those words out; the lifecycle code only copies them onto the stack.

use cinder_unsafe_primitives::cpu::{CPSR_FIQ_MASK, CPSR_MODE_SVC};
use cinder_unsafe_primitives::WORD_SIZE;

use crate::config::{MAX_ARGS, STACK_MAGIC};
use crate::error::KernelError;

/// Most words any builder may produce.
pub const FRAME_CAPACITY: usize = MAX_ARGS + 16;

/// Words of a new process's stack, from the top down.
///
/// `words()[0]` lands on the stack's top word, `words()[i]` at
/// `top - i * WORD_SIZE`. The last word is where the saved stack pointer
/// points.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InitialFrame {
    words: heapless::Vec<usize, FRAME_CAPACITY>,
}

impl InitialFrame {
    /// An empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the next word downward.
    pub fn push(&mut self, word: usize) -> Result<(), KernelError> {
        self.words
            .push(word)
            .map_err(|_| KernelError::InvalidArgument)
    }

    /// Words from the top of the stack down.
    pub fn words(&self) -> &[usize] {
        &self.words
    }

    /// Bytes the frame occupies.
    pub fn byte_len(&self) -> usize {
        self.words.len() * WORD_SIZE
    }

    /// Saved stack pointer for a stack whose top word is at `top`.
    pub fn stack_pointer(&self, top: usize) -> usize {
        top - self.words.len().saturating_sub(1) * WORD_SIZE
    }
}

/// Lays out the first context of a new process
pub trait ContextBuilder {
    /// Build the frame for a process entering `entry` with `args`, returning
    /// to `exit` when `entry` returns.
    fn initial_frame(
        &self,
        entry: usize,
        exit: usize,
        args: &[usize],
    ) -> Result<InitialFrame, KernelError>;
}

/// Supervisor mode with FIQs masked.
pub const ARM_INITIAL_STATUS: usize = (CPSR_MODE_SVC | CPSR_FIQ_MASK) as usize;

/// ARMv7-A (AAPCS) context builder
///
/// ```text
///   top  -> STACK_MAGIC
///           args[n-1] .. args[4]     (stack-passed arguments)
///           entry                    (popped into pc)
///           0 x 8                    (r11 .. r4)
///           args[3] .. args[0]       (r3 .. r0, zero when absent)
///           exit                     (lr)
///   sp   -> status word              (cpsr)
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Armv7aContext;

impl ContextBuilder for Armv7aContext {
    fn initial_frame(
        &self,
        entry: usize,
        exit: usize,
        args: &[usize],
    ) -> Result<InitialFrame, KernelError> {
        if args.len() > MAX_ARGS {
            return Err(KernelError::InvalidArgument);
        }
        let mut frame = InitialFrame::new();
        frame.push(STACK_MAGIC)?;
        for &arg in args.iter().skip(4).rev() {
            frame.push(arg)?;
        }
        frame.push(entry)?;
        for _ in 4..=11 {
            frame.push(0)?;
        }
        for i in (0..4).rev() {
            frame.push(args.get(i).copied().unwrap_or(0))?;
        }
        frame.push(exit)?;
        frame.push(ARM_INITIAL_STATUS)?;
        Ok(frame)
    }
}
