//! Kernel integration tests
//!
//! Each test boots a kernel over a leaked heap buffer with the mock HAL and
//! acts as whichever process `get_pid()` reports. Context switches in the
//! mock return immediately, so a blocking call hands back `WouldBlock` and
//! the test carries on as the newly dispatched process.

use std::panic::{catch_unwind, AssertUnwindSafe};

use cinder_hal_mock::MockHal;
use cinder_kernel::config::{INITPRIO, NPROC};
use cinder_kernel::{
    BootConfig, DeferRequest, Kernel, KernelError, ProcessId, ProcessState, RawRegion,
};

cinder_kernel::declare_kernel!(MockHal);

// ============================================================================
// Helpers
// ============================================================================

const ENTRY: usize = 0x8000_0000;
const HEAP_WORDS: usize = 1 << 15;

fn boot() -> Kernel<MockHal> {
    let buffer = Box::leak(vec![0usize; HEAP_WORDS].into_boxed_slice());
    let config = BootConfig {
        exit_trampoline: 0x8000_F000,
        ..BootConfig::default()
    };
    Kernel::boot(MockHal::new(), RawRegion::from_static(buffer), config).unwrap()
}

fn assert_consistent(k: &mut Kernel<MockHal>) {
    let violations = k.check_invariants();
    assert!(violations.is_empty(), "{:?}", violations);
}

/// Create and resume a process, which then runs if it outranks the caller.
fn spawn(k: &mut Kernel<MockHal>, prio: i16, name: &str) -> ProcessId {
    let pid = k.create(ENTRY, 4096, prio, name, &[]).unwrap();
    k.resume(pid).unwrap();
    pid
}

fn state_of(k: &Kernel<MockHal>, pid: ProcessId) -> ProcessState {
    k.state().procs.get(pid).unwrap().state
}

// ============================================================================
// Memory
// ============================================================================

#[test]
fn test_general_allocation_returns_heap_base() {
    let mut k = boot();
    let total = k.free_memory();

    let addr = k.allocate_general(100).unwrap();
    assert_eq!(addr, k.heap_base());

    k.release(addr, 100).unwrap();
    let blocks: Vec<_> = k.state().memory.blocks().collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].addr, k.heap_base());
    assert_eq!(blocks[0].length, total);
    assert_consistent(&mut k);
}

#[test]
fn test_overlapping_release_rejected() {
    let mut k = boot();
    let a = k.allocate_general(64).unwrap();
    let _b = k.allocate_general(64).unwrap();
    k.release(a, 64).unwrap();

    let before: Vec<_> = k.state().memory.blocks().collect();
    assert_eq!(k.release(a, 64), Err(KernelError::Overlap));
    assert_eq!(k.release(a, 128), Err(KernelError::Overlap));
    let after: Vec<_> = k.state().memory.blocks().collect();
    assert_eq!(before, after);
    assert_consistent(&mut k);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_self_kill_restores_count_and_stack() {
    let mut k = boot();
    let main = spawn(&mut k, INITPRIO, "main");
    assert_eq!(k.get_pid(), main);

    let count = k.process_count();
    let free = k.free_memory();
    let blocks = k.state().memory.block_count();

    let child = spawn(&mut k, INITPRIO + 10, "child");
    assert_eq!(k.get_pid(), child);
    assert_eq!(k.process_count(), count + 1);

    k.exit().unwrap();

    assert_eq!(k.process_count(), count);
    assert_eq!(k.free_memory(), free);
    assert_eq!(k.state().memory.block_count(), blocks);
    assert_eq!(k.get_pid(), main);
    assert_eq!(state_of(&k, main), ProcessState::Current);
    // The parent hears which child ended.
    assert_eq!(k.recvclr(), Ok(Some(child.0 as u32)));
    assert_consistent(&mut k);
}

#[test]
fn test_kill_waiting_process_returns_its_unit() {
    let mut k = boot();
    let main = spawn(&mut k, 10, "main");
    let sem = k.semaphore_create(0).unwrap();

    let waiter = spawn(&mut k, 20, "waiter");
    assert_eq!(k.wait(sem), Err(KernelError::WouldBlock));
    assert_eq!(k.get_pid(), main);
    assert_eq!(k.semaphore_count(sem), Ok(-1));

    k.kill(waiter).unwrap();
    assert_eq!(k.semaphore_count(sem), Ok(0));
    assert!(!k.state().procs.is_valid(waiter));
    assert_consistent(&mut k);
}

#[test]
fn test_kill_ready_process_leaves_ready_list() {
    let mut k = boot();
    let main = spawn(&mut k, 20, "main");
    let low = spawn(&mut k, 5, "low");
    assert_eq!(state_of(&k, low), ProcessState::Ready);

    k.kill(low).unwrap();
    let ready = k.state().ready_list;
    assert!(!k.state().queues.contains(ready, low));
    assert_eq!(k.get_pid(), main);
    assert_consistent(&mut k);
}

#[test]
fn test_last_user_process_halts() {
    let mut k = boot();
    let only = spawn(&mut k, 20, "only");

    let result = catch_unwind(AssertUnwindSafe(|| k.kill(only)));
    assert!(result.is_err());
    assert!(k.hal().has_log_containing("All user processes have completed."));
    assert!(k.hal().has_log_containing("[mock-hal] halt"));
}

#[test]
fn test_create_fails_cleanly_when_table_full() {
    let mut k = boot();
    for n in 1..NPROC {
        k.create(ENTRY, 1024, 10, &format!("p{}", n), &[]).unwrap();
    }
    let free = k.free_memory();
    assert_eq!(
        k.create(ENTRY, 1024, 10, "extra", &[]),
        Err(KernelError::ProcessTableFull)
    );
    assert_eq!(k.free_memory(), free);
    assert_eq!(k.process_count(), NPROC);
    assert_consistent(&mut k);
}

#[test]
fn test_suspend_current_then_resume() {
    let mut k = boot();
    let main = spawn(&mut k, 10, "main");
    let worker = spawn(&mut k, 20, "worker");
    assert_eq!(k.get_pid(), worker);

    assert_eq!(k.suspend(worker), Ok(20));
    assert_eq!(k.get_pid(), main);
    assert_eq!(state_of(&k, worker), ProcessState::Suspended);

    assert_eq!(k.resume(worker), Ok(20));
    assert_eq!(k.get_pid(), worker);
    assert_consistent(&mut k);
}

#[test]
fn test_create_lays_out_arguments() {
    let mut k = boot();
    let pid = k.create(ENTRY, 4096, 10, "args", &[1, 2, 3, 4, 5]).unwrap();
    let pcb = *k.state().procs.get(pid).unwrap();
    let region = k.state().memory.region();
    let word = |i: usize| region.read_word(pcb.stack_base - i * core::mem::size_of::<usize>());

    assert_eq!(word(1), Some(5));
    assert_eq!(word(2), Some(ENTRY));
    // r3..r0 below the eight callee-saved slots
    assert_eq!(word(11), Some(4));
    assert_eq!(word(14), Some(1));
    assert_eq!(word(15), Some(0x8000_F000));
    assert_eq!(region.read_word(pcb.stack_ptr), Some(0x53));
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_equal_priorities_rotate_on_yield() {
    let mut k = boot();
    let a = spawn(&mut k, 20, "a");
    assert_eq!(k.get_pid(), a);
    // An equal-priority arrival takes the CPU; the runner goes behind it.
    let b = spawn(&mut k, 20, "b");
    assert_eq!(k.get_pid(), b);

    k.yield_now().unwrap();
    assert_eq!(k.get_pid(), a);
    k.yield_now().unwrap();
    assert_eq!(k.get_pid(), b);
    assert_consistent(&mut k);
}

#[test]
fn test_higher_priority_keeps_cpu_on_yield() {
    let mut k = boot();
    let high = spawn(&mut k, 30, "high");
    let _low = spawn(&mut k, 10, "low");
    let switches = k.hal().switch_count();

    k.yield_now().unwrap();
    assert_eq!(k.get_pid(), high);
    assert_eq!(k.hal().switch_count(), switches);
}

#[test]
fn test_quantum_expiry_preempts() {
    let mut k = boot();
    let a = spawn(&mut k, 20, "a");
    let b = spawn(&mut k, 20, "b");
    assert_eq!(k.get_pid(), b);

    k.preempt_tick().unwrap();
    assert_eq!(k.get_pid(), b);
    k.preempt_tick().unwrap();
    assert_eq!(k.get_pid(), a);
    assert_consistent(&mut k);
}

#[test]
fn test_chprio_reorders_ready_list() {
    let mut k = boot();
    let main = spawn(&mut k, 30, "main");
    let x = spawn(&mut k, 10, "x");
    let y = spawn(&mut k, 15, "y");
    let ready = k.state().ready_list;
    assert_eq!(k.state().queues.first_id(ready).unwrap(), Some(y));

    assert_eq!(k.chprio(x, 25), Ok(10));
    assert_eq!(k.state().queues.first_id(ready).unwrap(), Some(x));
    assert_eq!(k.get_pid(), main);

    k.chprio(main, 5).unwrap();
    k.yield_now().unwrap();
    assert_eq!(k.get_pid(), x);
    assert_consistent(&mut k);
}

// ============================================================================
// Semaphores
// ============================================================================

/// Main at priority 10 plus three priority-20 waiters blocked on `sem`.
fn three_waiters(k: &mut Kernel<MockHal>) -> (ProcessId, cinder_kernel::SemaphoreId, [ProcessId; 3]) {
    let main = spawn(k, 10, "main");
    let sem = k.semaphore_create(0).unwrap();
    let mut waiters = [ProcessId::NULL; 3];
    for (i, slot) in waiters.iter_mut().enumerate() {
        *slot = spawn(k, 20, &format!("w{}", i));
        assert_eq!(k.get_pid(), *slot);
        assert_eq!(k.wait(sem), Err(KernelError::WouldBlock));
        assert_eq!(k.get_pid(), main);
    }
    (main, sem, waiters)
}

#[test]
fn test_waiters_block_in_order() {
    let mut k = boot();
    let (_, sem, waiters) = three_waiters(&mut k);
    assert_eq!(k.semaphore_count(sem), Ok(-3));

    let queue = k.state().sems.get(sem).unwrap().queue;
    let order: Vec<_> = k.state().queues.iter(queue).unwrap().map(|(p, _)| p).collect();
    assert_eq!(order, waiters.to_vec());
    for w in waiters {
        assert_eq!(state_of(&k, w), ProcessState::Waiting);
    }
    assert_consistent(&mut k);
}

#[test]
fn test_signal_n_releases_first_two_with_one_switch() {
    let mut k = boot();
    let (main, sem, [w0, w1, w2]) = three_waiters(&mut k);
    k.hal().clear_switches();

    k.signal_n(sem, 2).unwrap();

    assert_eq!(k.semaphore_count(sem), Ok(-1));
    assert_eq!(k.hal().switch_count(), 1);
    assert_eq!(k.get_pid(), w0);
    assert_eq!(state_of(&k, w1), ProcessState::Ready);
    assert_eq!(state_of(&k, w2), ProcessState::Waiting);
    assert_eq!(state_of(&k, main), ProcessState::Ready);
    assert_consistent(&mut k);
}

#[test]
fn test_deferral_batches_two_signals_into_one_switch() {
    let mut k = boot();
    let (_, sem, [w0, w1, _]) = three_waiters(&mut k);
    k.hal().clear_switches();

    k.resched_cntl(DeferRequest::Start).unwrap();
    k.signal(sem).unwrap();
    k.signal(sem).unwrap();
    assert_eq!(k.hal().switch_count(), 0);
    assert_eq!(state_of(&k, w0), ProcessState::Ready);
    assert_eq!(state_of(&k, w1), ProcessState::Ready);

    k.resched_cntl(DeferRequest::Stop).unwrap();
    assert_eq!(k.hal().switch_count(), 1);
    assert_eq!(k.get_pid(), w0);
    assert_consistent(&mut k);
}

#[test]
fn test_delete_and_reset_wake_everyone() {
    let mut k = boot();
    let (main, sem, waiters) = three_waiters(&mut k);
    k.semaphore_delete(sem).unwrap();
    assert_eq!(k.semaphore_count(sem), Err(KernelError::InvalidSemaphore));
    for w in waiters {
        assert_ne!(state_of(&k, w), ProcessState::Waiting);
        assert_eq!(k.state().procs.get(w).unwrap().sem, None);
    }
    assert_eq!(state_of(&k, main), ProcessState::Ready);
    assert_consistent(&mut k);

    let mut k = boot();
    let (_, sem, waiters) = three_waiters(&mut k);
    k.semaphore_reset(sem, 4).unwrap();
    assert_eq!(k.semaphore_count(sem), Ok(4));
    for w in waiters {
        assert_ne!(state_of(&k, w), ProcessState::Waiting);
    }
    assert_consistent(&mut k);
}

#[test]
fn test_woken_waiter_returns_from_wait() {
    let mut k = boot();
    let main = spawn(&mut k, 10, "main");
    let sem = k.semaphore_create(0).unwrap();
    let waiter = spawn(&mut k, 20, "waiter");
    assert_eq!(k.wait(sem), Err(KernelError::WouldBlock));

    k.signal(sem).unwrap();
    assert_eq!(k.get_pid(), waiter);
    assert_eq!(k.semaphore_count(sem), Ok(0));

    // Balanced again: a wait that does not block.
    k.signal(sem).unwrap();
    assert_eq!(k.wait(sem), Ok(()));
    assert_eq!(k.semaphore_count(sem), Ok(0));
    assert_eq!(state_of(&k, main), ProcessState::Ready);
    assert_consistent(&mut k);
}

// ============================================================================
// Messaging
// ============================================================================

#[test]
fn test_receive_blocks_until_send() {
    let mut k = boot();
    let main = spawn(&mut k, 10, "main");
    let rx = spawn(&mut k, 20, "rx");

    assert_eq!(k.receive(), Err(KernelError::WouldBlock));
    assert_eq!(state_of(&k, rx), ProcessState::Receiving);
    assert_eq!(k.get_pid(), main);

    k.send(rx, 0xCAFE).unwrap();
    assert_eq!(k.get_pid(), rx);
    assert_eq!(k.receive(), Ok(0xCAFE));
    assert_eq!(k.recvclr(), Ok(None));
    assert_consistent(&mut k);
}

#[test]
fn test_mailbox_holds_one_message() {
    let mut k = boot();
    let _main = spawn(&mut k, 20, "main");
    let idle_rx = spawn(&mut k, 10, "rx");

    k.send(idle_rx, 1).unwrap();
    assert_eq!(k.send(idle_rx, 2), Err(KernelError::MessagePending));
    assert_eq!(state_of(&k, idle_rx), ProcessState::Ready);
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_snapshot_serializes() {
    let mut k = boot();
    let main = spawn(&mut k, 20, "main");
    k.semaphore_create(1).unwrap();

    let snap = k.snapshot();
    assert_eq!(snap.current, main);
    assert_eq!(snap.ready.as_slice(), &[ProcessId::NULL]);

    let json = serde_json::to_string(&snap).unwrap();
    assert!(json.contains("\"name\":\"prnull\""));
    assert!(json.contains("\"name\":\"main\""));
    assert!(json.contains("\"state\":\"Current\""));
    assert!(json.contains("\"free_total\""));
}

#[test]
fn test_panic_reports_and_halts() {
    let k = boot();
    let result = catch_unwind(AssertUnwindSafe(|| k.panic("bad trap")));
    assert!(result.is_err());
    assert!(k.hal().has_log_containing("panic: "));
    assert!(k.hal().has_log_containing("bad trap"));
    assert!(k.hal().interrupts_masked());
}

#[test]
fn test_global_kernel_installs_once() {
    assert!(install_kernel(boot()).is_ok());
    assert!(install_kernel(boot()).is_err());

    // SAFETY: single test thread touches the global kernel.
    let k = unsafe { kernel() }.unwrap();
    assert_eq!(k.get_pid(), ProcessId::NULL);
    let pid = k.create(ENTRY, 1024, 10, "global", &[]).unwrap();
    assert_eq!(k.process_count(), 2);
    assert!(k.state().procs.is_valid(pid));
}
