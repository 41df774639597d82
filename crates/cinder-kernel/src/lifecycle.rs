//! Process lifecycle syscalls
//!
//! This module contains the syscalls that move a process through its life:
//! - `create()` - Carve a stack, claim a slot, lay out the first frame
//! - `resume()` / `suspend()` - Move between SUSPENDED and runnable
//! - `kill()` / `exit()` - Tear a process down and return its stack
//! - `chprio()` / `get_priority()` / `get_pid()` / `process_count()`

use cinder_hal::Hal;
use cinder_kernel_core::config::{MINSTK, NSTDIO};
use cinder_kernel_core::memory::round_unit;
use cinder_kernel_core::{
    ContextBuilder, KernelError, Message, Priority, Process, ProcessId, ProcessName, ProcessState,
};
use cinder_unsafe_primitives::WORD_SIZE;

use crate::Kernel;

/// Printed when the last user process terminates.
pub const COMPLETION_MESSAGE: &str = "\n\nAll user processes have completed.\n\n";

impl<H: Hal, C: ContextBuilder> Kernel<H, C> {
    /// Create a SUSPENDED process that will run `entry` with `args`.
    ///
    /// The stack is raised to at least `MINSTK` and rounded to the
    /// allocation unit. Nothing changes if the stack, the slot, or the frame
    /// cannot be had.
    ///
    /// # Arguments
    /// * `entry` - Address of the process's entry function
    /// * `stack_size` - Requested stack size in bytes
    /// * `priority` - Static priority, at least 1
    /// * `name` - Diagnostic name, truncated to fit
    /// * `args` - Word arguments passed to `entry`
    pub fn create(
        &mut self,
        entry: usize,
        stack_size: usize,
        priority: Priority,
        name: &str,
        args: &[usize],
    ) -> Result<ProcessId, KernelError> {
        if priority < 1 {
            return Err(KernelError::InvalidArgument);
        }
        let frame = self
            .context
            .initial_frame(entry, self.exit_trampoline, args)?;
        let stack_len = round_unit(stack_size.max(MINSTK)).ok_or(KernelError::OutOfMemory)?;
        if frame.byte_len() > stack_len {
            return Err(KernelError::InvalidArgument);
        }

        self.critical(|k| {
            let top = k.state.memory.allocate_stack(stack_len)?;
            let pid = match k.state.procs.alloc_pid() {
                Ok(pid) => pid,
                Err(e) => {
                    k.state.memory.release_stack(top, stack_len)?;
                    return Err(e);
                }
            };

            let region = k.state.memory.region_mut();
            let written = frame
                .words()
                .iter()
                .enumerate()
                .try_for_each(|(i, &word)| region.write_word(top - i * WORD_SIZE, word));
            if written.is_none() {
                k.state.memory.release_stack(top, stack_len)?;
                return Err(KernelError::OutOfHeap);
            }

            let parent = k.state.current;
            let slot = k
                .state
                .procs
                .slot_mut(pid)
                .ok_or(KernelError::InvalidProcess)?;
            *slot = Process {
                state: ProcessState::Suspended,
                prio: priority,
                stack_ptr: frame.stack_pointer(top),
                stack_base: top,
                stack_len,
                name: ProcessName::new(name),
                sem: None,
                parent,
                message: 0,
                has_message: false,
                descriptors: Process::default_descriptors(),
            };
            log::debug!(
                "[Cinder Proc] create {} {:?} prio {} stack {:#x} ({} bytes)",
                pid,
                slot.name,
                priority,
                top,
                stack_len
            );
            k.state.procs.increment_count();
            Ok(pid)
        })
    }

    /// Make a SUSPENDED process READY. Returns its priority.
    pub fn resume(&mut self, pid: ProcessId) -> Result<Priority, KernelError> {
        self.critical(|k| {
            let pcb = k.state.procs.get(pid)?;
            if pcb.state != ProcessState::Suspended {
                return Err(KernelError::InvalidState);
            }
            let prio = pcb.prio;
            k.ready_locked(pid)?;
            Ok(prio)
        })
    }

    /// Suspend a CURRENT or READY process. Returns its priority.
    ///
    /// The idle process cannot be suspended.
    pub fn suspend(&mut self, pid: ProcessId) -> Result<Priority, KernelError> {
        if pid == ProcessId::NULL {
            return Err(KernelError::InvalidProcess);
        }
        self.critical(|k| {
            let pcb = k.state.procs.get(pid)?;
            let (prior, prio) = (pcb.state, pcb.prio);
            match prior {
                ProcessState::Ready => {
                    k.state.queues.remove(pid)?;
                    k.state.procs.get_mut(pid)?.state = ProcessState::Suspended;
                }
                ProcessState::Current => {
                    k.state.procs.get_mut(pid)?.state = ProcessState::Suspended;
                    k.resched_locked()?;
                }
                _ => return Err(KernelError::InvalidState),
            }
            log::trace!("[Cinder Proc] suspend {} from {:?}", pid, prior);
            Ok(prio)
        })
    }

    /// Change a process's priority. Returns the previous priority.
    ///
    /// A READY or WAITING process is moved to its new place in its list; no
    /// reschedule happens until the next scheduling point.
    pub fn chprio(&mut self, pid: ProcessId, priority: Priority) -> Result<Priority, KernelError> {
        self.critical(|k| {
            let pcb = k.state.procs.get_mut(pid)?;
            if priority < 1 {
                return Err(KernelError::InvalidArgument);
            }
            let old = pcb.prio;
            pcb.prio = priority;
            let list = match (pcb.state, pcb.sem) {
                (ProcessState::Ready, _) => Some(k.state.ready_list),
                (ProcessState::Waiting, Some(sem)) => Some(k.state.sems.get(sem)?.queue),
                _ => None,
            };
            if let Some(list) = list {
                k.state.queues.remove(pid)?;
                k.state.queues.insert(pid, list, i32::from(priority))?;
            }
            Ok(old)
        })
    }

    /// Current priority of a process.
    pub fn get_priority(&mut self, pid: ProcessId) -> Result<Priority, KernelError> {
        self.critical(|k| Ok(k.state.procs.get(pid)?.prio))
    }

    /// Id of the process on the CPU.
    pub fn get_pid(&self) -> ProcessId {
        self.state.current
    }

    /// Active processes, idle included.
    pub fn process_count(&self) -> usize {
        self.state.procs.count()
    }

    /// Terminate the calling process.
    pub fn exit(&mut self) -> Result<(), KernelError> {
        let pid = self.get_pid();
        self.kill(pid)
    }

    /// Terminate a process and reclaim its slot and stack.
    ///
    /// The parent is told the pid by message, the standard descriptors are
    /// closed and the process leaves whatever list held it. Collaborator
    /// failures along the way are logged and skipped. When only the idle
    /// process would remain the machine halts.
    pub fn kill(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        if pid == ProcessId::NULL {
            return Err(KernelError::InvalidProcess);
        }
        self.critical(|k| {
            let victim = *k.state.procs.get(pid)?;

            if k.state.procs.decrement_count() <= 1 {
                k.hal.debug_write(COMPLETION_MESSAGE);
                k.hal.halt();
            }

            k.deferred(|k| k.teardown(pid, &victim))
        })
    }

    fn teardown(&mut self, pid: ProcessId, victim: &Process) -> Result<(), KernelError> {
        if let Err(e) = self.send_locked(victim.parent, pid.0 as Message) {
            log::trace!("[Cinder Proc] parent {} not notified: {}", victim.parent, e);
        }
        for &descriptor in victim.descriptors.iter().take(NSTDIO) {
            if let Err(e) = self.hal.close_descriptor(descriptor) {
                log::warn!("[Cinder Proc] close {} for {} failed: {}", descriptor, pid, e);
            }
        }
        if let Err(e) = self
            .state
            .memory
            .release_stack(victim.stack_base, victim.stack_len)
        {
            log::warn!("[Cinder Proc] stack of {} not released: {}", pid, e);
        }

        match victim.state {
            ProcessState::Current => {
                self.free_slot(pid)?;
                self.resched_locked()?;
            }
            ProcessState::Sleeping | ProcessState::ReceivingTimed => {
                if let Err(e) = self.hal.cancel_sleep(pid.0) {
                    log::warn!("[Cinder Proc] cancel sleep for {} failed: {}", pid, e);
                }
                self.free_slot(pid)?;
            }
            ProcessState::Waiting => {
                if let Some(sem) = victim.sem {
                    if let Ok(s) = self.state.sems.get_mut(sem) {
                        s.count += 1;
                    }
                }
                self.state.queues.remove(pid)?;
                self.free_slot(pid)?;
            }
            ProcessState::Ready => {
                self.state.queues.remove(pid)?;
                self.free_slot(pid)?;
            }
            _ => self.free_slot(pid)?,
        }
        log::debug!("[Cinder Proc] kill {} (was {:?})", pid, victim.state);
        Ok(())
    }

    fn free_slot(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        let slot = self
            .state
            .procs
            .slot_mut(pid)
            .ok_or(KernelError::InvalidProcess)?;
        *slot = Process {
            stack_ptr: slot.stack_ptr,
            ..Process::FREE
        };
        Ok(())
    }
}
