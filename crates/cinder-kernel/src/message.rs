//! Direct messaging
//!
//! Every process has a one-word mailbox. A send into a full mailbox fails
//! rather than overwriting; a receive on an empty one blocks.

use cinder_hal::Hal;
use cinder_kernel_core::{ContextBuilder, KernelError, Message, ProcessId, ProcessState};

use crate::Kernel;

impl<H: Hal, C: ContextBuilder> Kernel<H, C> {
    pub(crate) fn send_locked(&mut self, pid: ProcessId, msg: Message) -> Result<(), KernelError> {
        let pcb = self.state.procs.get_mut(pid)?;
        if pcb.has_message {
            return Err(KernelError::MessagePending);
        }
        pcb.message = msg;
        pcb.has_message = true;
        let state = pcb.state;
        log::trace!("[Cinder Msg] {} -> {}: {:#x}", self.state.current, pid, msg);

        match state {
            ProcessState::Receiving => self.ready_locked(pid),
            ProcessState::ReceivingTimed => {
                if let Err(e) = self.hal.cancel_sleep(pid.0) {
                    log::warn!("[Cinder Msg] cancel sleep for {} failed: {}", pid, e);
                }
                self.ready_locked(pid)
            }
            _ => Ok(()),
        }
    }

    /// Deliver `msg` to `pid`, waking it if it is receiving.
    ///
    /// # Returns
    /// * `Ok(())` - Delivered
    /// * `Err(KernelError::InvalidProcess)` - No such process
    /// * `Err(KernelError::MessagePending)` - The mailbox is already full
    pub fn send(&mut self, pid: ProcessId, msg: Message) -> Result<(), KernelError> {
        self.critical(|k| k.send_locked(pid, msg))
    }

    /// Take the caller's message, blocking until one arrives.
    ///
    /// The idle process gets `InvalidState` instead of blocking.
    pub fn receive(&mut self) -> Result<Message, KernelError> {
        self.critical(|k| {
            let me = k.state.current;
            if !k.state.procs.get(me)?.has_message {
                if me == ProcessId::NULL {
                    return Err(KernelError::InvalidState);
                }
                k.state.procs.get_mut(me)?.state = ProcessState::Receiving;
                k.resched_locked()?;
                if !k.is_running(me) {
                    return Err(KernelError::WouldBlock);
                }
            }
            let pcb = k.state.procs.get_mut(me)?;
            pcb.has_message = false;
            Ok(pcb.message)
        })
    }

    /// Take the caller's message if one is waiting. Never blocks.
    pub fn recvclr(&mut self) -> Result<Option<Message>, KernelError> {
        self.critical(|k| {
            let me = k.state.current;
            let pcb = k.state.procs.get_mut(me)?;
            if !pcb.has_message {
                return Ok(None);
            }
            pcb.has_message = false;
            Ok(Some(pcb.message))
        })
    }
}
