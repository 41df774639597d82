//! Counting semaphores
//!
//! A negative count is the number of processes waiting. Waiters queue by
//! priority, first come first served among equals.

use cinder_hal::Hal;
use cinder_kernel_core::{
    ContextBuilder, KernelError, ProcessId, ProcessState, SemaphoreId, SemaphoreState,
};

use crate::Kernel;

impl<H: Hal, C: ContextBuilder> Kernel<H, C> {
    /// Clear a waiter's semaphore and make it READY.
    fn wake(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        self.state.procs.get_mut(pid)?.sem = None;
        self.ready_locked(pid)
    }

    fn signal_locked(&mut self, sem: SemaphoreId) -> Result<(), KernelError> {
        let s = self.state.sems.get_mut(sem)?;
        let prior = s.count;
        s.count += 1;
        if prior < 0 {
            let queue = s.queue;
            if let Some(pid) = self.state.queues.dequeue(queue)? {
                log::trace!("[Cinder Sem] {} releases {}", sem, pid);
                self.wake(pid)?;
            }
        }
        Ok(())
    }

    /// Allocate a semaphore with an initial count.
    pub fn semaphore_create(&mut self, count: i32) -> Result<SemaphoreId, KernelError> {
        if count < 0 {
            return Err(KernelError::InvalidArgument);
        }
        self.critical(|k| {
            let sem = k.state.sems.alloc(count)?;
            log::debug!("[Cinder Sem] create {} count {}", sem, count);
            Ok(sem)
        })
    }

    /// Decrement the count, blocking the caller while it is negative.
    ///
    /// The idle process may not wait on a semaphore that would block it.
    pub fn wait(&mut self, sem: SemaphoreId) -> Result<(), KernelError> {
        self.critical(|k| {
            let me = k.state.current;
            if me == ProcessId::NULL && k.state.sems.get(sem)?.count <= 0 {
                return Err(KernelError::InvalidState);
            }
            let s = k.state.sems.get_mut(sem)?;
            s.count -= 1;
            if s.count >= 0 {
                return Ok(());
            }
            let queue = s.queue;

            let pcb = k.state.procs.get_mut(me)?;
            pcb.state = ProcessState::Waiting;
            pcb.sem = Some(sem);
            let key = i32::from(pcb.prio);
            k.state.queues.insert(me, queue, key)?;
            log::trace!("[Cinder Sem] {} waits on {}", me, sem);

            k.resched_locked()?;
            if !k.is_running(me) {
                return Err(KernelError::WouldBlock);
            }
            Ok(())
        })
    }

    /// Increment the count, releasing the first waiter if there is one.
    pub fn signal(&mut self, sem: SemaphoreId) -> Result<(), KernelError> {
        self.critical(|k| k.signal_locked(sem))
    }

    /// Signal `count` times with at most one reschedule at the end.
    pub fn signal_n(&mut self, sem: SemaphoreId, count: i32) -> Result<(), KernelError> {
        self.critical(|k| {
            k.state.sems.get(sem)?;
            if count < 0 {
                return Err(KernelError::InvalidArgument);
            }
            k.deferred(|k| {
                for _ in 0..count {
                    k.signal_locked(sem)?;
                }
                Ok(())
            })
        })
    }

    /// Free a semaphore, making every waiter READY.
    pub fn semaphore_delete(&mut self, sem: SemaphoreId) -> Result<(), KernelError> {
        self.critical(|k| {
            let s = k.state.sems.get_mut(sem)?;
            let (queue, mut count) = (s.queue, s.count);
            s.count = 0;
            s.state = SemaphoreState::Free;
            log::debug!("[Cinder Sem] delete {} with count {}", sem, count);

            k.deferred(|k| {
                while count < 0 {
                    count += 1;
                    if let Some(pid) = k.state.queues.get_first(queue)? {
                        k.wake(pid)?;
                    }
                }
                Ok(())
            })
        })
    }

    /// Release every waiter and set the count to `count`.
    pub fn semaphore_reset(&mut self, sem: SemaphoreId, count: i32) -> Result<(), KernelError> {
        self.critical(|k| {
            let queue = k.state.sems.get(sem)?.queue;
            if count < 0 {
                return Err(KernelError::InvalidArgument);
            }
            k.deferred(|k| {
                while let Some(pid) = k.state.queues.get_first(queue)? {
                    k.wake(pid)?;
                }
                k.state.sems.get_mut(sem)?.count = count;
                Ok(())
            })
        })
    }

    /// Current count of a semaphore.
    pub fn semaphore_count(&mut self, sem: SemaphoreId) -> Result<i32, KernelError> {
        self.critical(|k| Ok(k.state.sems.get(sem)?.count))
    }
}
