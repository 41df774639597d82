//! Runtime-checkable kernel invariants
//!
//! These are used for:
//! 1. Assertions in tests after every scenario step
//! 2. The `check_invariants` debug operation on a live kernel
//!
//! # Invariants
//!
//! 1. **Queue Link Symmetry**: Every list walks head to tail with matching
//!    back links and non-increasing keys
//! 2. **Ready List Membership**: The ready list holds exactly the READY processes
//! 3. **Single Current**: Exactly one process is CURRENT, and it is `current`
//! 4. **Semaphore Waiters**: A negative count equals minus the number of waiters
//! 5. **Free List Shape**: Free blocks are sorted, aligned, separated and
//!    sum to `free_total`
//! 6. **Process Count**: The active count matches the non-free slots

use core::fmt::{self, Write};

use crate::config::NPROC;
use crate::memory::ALLOC_UNIT;
use crate::semaphore::SemaphoreState;
use crate::state::KernelState;
use crate::types::{ProcessId, ProcessState};

/// Most violations one check reports.
pub const MAX_VIOLATIONS: usize = 32;

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: heapless::String<96>,
}

/// Violations found by one check
pub type Violations = heapless::Vec<InvariantViolation, MAX_VIOLATIONS>;

fn report(violations: &mut Violations, invariant: &'static str, args: fmt::Arguments<'_>) {
    let mut description = heapless::String::new();
    // Overlong descriptions are truncated.
    let _ = description.write_fmt(args);
    let _ = violations.push(InvariantViolation {
        invariant,
        description,
    });
}

/// Check all kernel invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_all_invariants(state: &KernelState) -> Violations {
    let mut violations = Violations::new();

    check_queue_links(state, &mut violations);
    check_ready_list(state, &mut violations);
    check_single_current(state, &mut violations);
    check_semaphore_waiters(state, &mut violations);
    check_free_list(state, &mut violations);
    check_process_count(state, &mut violations);

    violations
}

/// Invariant 1: lists are well linked and key-ordered
fn check_queue_links(state: &KernelState, violations: &mut Violations) {
    for q in state.queues.lists() {
        let mut prev = q.head();
        let mut prev_key = match state.queues.entry(q.head()) {
            Some(e) => e.key,
            None => continue,
        };
        let mut cursor = state.queues.entry(q.head()).map_or(q.tail(), |e| e.next);
        let mut steps = 0;

        while cursor != q.tail() {
            steps += 1;
            if cursor >= NPROC || steps > NPROC {
                report(
                    violations,
                    "queue_link_symmetry",
                    format_args!("list {} links to node {} outside the process range", q.0, cursor),
                );
                break;
            }
            let Some(entry) = state.queues.entry(cursor) else {
                break;
            };
            if entry.prev != prev {
                report(
                    violations,
                    "queue_link_symmetry",
                    format_args!("node {} on list {} has prev {} not {}", cursor, q.0, entry.prev, prev),
                );
            }
            if entry.key > prev_key {
                report(
                    violations,
                    "queue_link_symmetry",
                    format_args!("node {} on list {} has key {} above {}", cursor, q.0, entry.key, prev_key),
                );
            }
            prev = cursor;
            prev_key = entry.key;
            cursor = entry.next;
        }

        if cursor == q.tail() && state.queues.entry(q.tail()).map(|e| e.prev) != Some(prev) {
            report(
                violations,
                "queue_link_symmetry",
                format_args!("tail of list {} does not point back to node {}", q.0, prev),
            );
        }
    }
}

/// Invariant 2: ready list holds exactly the READY processes
fn check_ready_list(state: &KernelState, violations: &mut Violations) {
    if let Ok(iter) = state.queues.iter(state.ready_list) {
        for (pid, key) in iter {
            match state.procs.slot(pid) {
                Some(p) if p.state == ProcessState::Ready => {
                    if key != i32::from(p.prio) {
                        report(
                            violations,
                            "ready_list_membership",
                            format_args!("process {} queued at key {} with priority {}", pid, key, p.prio),
                        );
                    }
                }
                Some(p) => report(
                    violations,
                    "ready_list_membership",
                    format_args!("process {} on ready list in state {:?}", pid, p.state),
                ),
                None => {}
            }
        }
    }

    for (pid, p) in state.procs.iter() {
        if p.state == ProcessState::Ready && !state.queues.contains(state.ready_list, pid) {
            report(
                violations,
                "ready_list_membership",
                format_args!("process {} is READY but not on the ready list", pid),
            );
        }
    }
}

/// Invariant 3: exactly one CURRENT process
fn check_single_current(state: &KernelState, violations: &mut Violations) {
    let mut found = 0;
    for (pid, p) in state.procs.iter() {
        if p.state != ProcessState::Current {
            continue;
        }
        found += 1;
        if pid != state.current {
            report(
                violations,
                "single_current",
                format_args!("process {} is CURRENT but current is {}", pid, state.current),
            );
        }
        if state.queues.is_linked(pid) {
            report(
                violations,
                "single_current",
                format_args!("CURRENT process {} is linked into a list", pid),
            );
        }
    }
    if found != 1 {
        report(
            violations,
            "single_current",
            format_args!("{} processes are CURRENT", found),
        );
    }
}

/// Invariant 4: semaphore counts agree with their wait lists
fn check_semaphore_waiters(state: &KernelState, violations: &mut Violations) {
    for (id, sem) in state.sems.iter() {
        let Ok(waiters) = state.queues.iter(sem.queue) else {
            continue;
        };
        let mut n = 0i32;
        for (pid, _) in waiters {
            n += 1;
            let waiting_here = state
                .procs
                .slot(pid)
                .is_some_and(|p| p.state == ProcessState::Waiting && p.sem == Some(id));
            if !waiting_here {
                report(
                    violations,
                    "semaphore_waiters",
                    format_args!("process {} on semaphore {} is not waiting on it", pid, id),
                );
            }
        }

        let expected = match sem.state {
            SemaphoreState::Used => (-sem.count).max(0),
            SemaphoreState::Free => 0,
        };
        if n != expected {
            report(
                violations,
                "semaphore_waiters",
                format_args!("semaphore {} has count {} and {} waiters", id, sem.count, n),
            );
        }
    }
}

/// Invariant 5: the free list is sorted, aligned, separated and totalled
fn check_free_list(state: &KernelState, violations: &mut Violations) {
    let memory = &state.memory;
    let mut total = 0usize;
    let mut prev_end: Option<usize> = None;

    for block in memory.blocks() {
        if block.addr % ALLOC_UNIT != 0 || block.length % ALLOC_UNIT != 0 || block.length == 0 {
            report(
                violations,
                "free_list_shape",
                format_args!("block {:#x}+{} is misaligned", block.addr, block.length),
            );
        }
        if block.addr < memory.min_heap() || block.addr + block.length > memory.max_heap() {
            report(
                violations,
                "free_list_shape",
                format_args!("block {:#x}+{} lies outside the heap", block.addr, block.length),
            );
        }
        if let Some(end) = prev_end {
            if block.addr <= end {
                report(
                    violations,
                    "free_list_shape",
                    format_args!("block {:#x} overlaps or touches the block ending {:#x}", block.addr, end),
                );
            }
        }
        prev_end = Some(block.addr + block.length);
        total += block.length;
    }

    if total != memory.free_total() {
        report(
            violations,
            "free_list_shape",
            format_args!("blocks sum to {} but free_total is {}", total, memory.free_total()),
        );
    }
}

/// Invariant 6: active count matches the table
fn check_process_count(state: &KernelState, violations: &mut Violations) {
    let live = state
        .procs
        .iter()
        .filter(|(_, p)| p.state != ProcessState::Free)
        .count();
    if live != state.procs.count() {
        report(
            violations,
            "process_count",
            format_args!("{} live slots but count is {}", live, state.procs.count()),
        );
    }
    if state.procs.slot(ProcessId::NULL).map(|p| p.state) == Some(ProcessState::Free) {
        report(
            violations,
            "process_count",
            format_args!("the idle process slot is free"),
        );
    }
}

/// Assert all invariants hold (panic if not)
pub fn assert_invariants(state: &KernelState) {
    if let Some(v) = check_all_invariants(state).first() {
        panic!("Invariant violated: {}: {}", v.invariant, v.description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootConfig;
    use crate::process::Process;
    use cinder_unsafe_primitives::RawRegion;
    use std::boxed::Box;
    use std::vec;

    fn state() -> KernelState {
        let buffer = Box::leak(vec![0usize; 4096].into_boxed_slice());
        KernelState::new(RawRegion::from_static(buffer), &BootConfig::default()).unwrap()
    }

    fn names(state: &KernelState) -> heapless::Vec<&'static str, MAX_VIOLATIONS> {
        check_all_invariants(state)
            .iter()
            .map(|v| v.invariant)
            .collect()
    }

    #[test]
    fn test_invariants_hold_for_boot_state() {
        assert_invariants(&state());
    }

    #[test]
    fn test_detects_ready_process_off_list() {
        let mut s = state();
        let pid = s.procs.alloc_pid().unwrap();
        *s.procs.slot_mut(pid).unwrap() = Process {
            state: ProcessState::Ready,
            ..Process::FREE
        };
        s.procs.increment_count();
        assert!(names(&s).contains(&"ready_list_membership"));

        s.queues.insert(pid, s.ready_list, 0).unwrap();
        assert!(check_all_invariants(&s).is_empty());
    }

    #[test]
    fn test_detects_two_current() {
        let mut s = state();
        let pid = s.procs.alloc_pid().unwrap();
        *s.procs.slot_mut(pid).unwrap() = Process {
            state: ProcessState::Current,
            ..Process::FREE
        };
        s.procs.increment_count();
        assert!(names(&s).contains(&"single_current"));
    }

    #[test]
    fn test_detects_semaphore_count_mismatch() {
        let mut s = state();
        let sem = s.sems.alloc(0).unwrap();
        s.sems.get_mut(sem).unwrap().count = -1;
        assert_eq!(names(&s).as_slice(), &["semaphore_waiters"]);
    }

    #[test]
    fn test_detects_count_drift() {
        let mut s = state();
        s.procs.increment_count();
        assert_eq!(names(&s).as_slice(), &["process_count"]);
    }

    #[test]
    fn test_memory_churn_keeps_free_list_shape() {
        let mut s = state();
        let a = s.memory.allocate_general(40).unwrap();
        let b = s.memory.allocate_general(72).unwrap();
        let top = s.memory.allocate_stack(512).unwrap();
        s.memory.release(a, 40).unwrap();
        assert_invariants(&s);
        s.memory.release_stack(top, 512).unwrap();
        s.memory.release(b, 72).unwrap();
        assert_invariants(&s);
    }
}
