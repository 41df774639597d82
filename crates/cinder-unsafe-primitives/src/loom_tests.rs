//! Loom tests for the install-once protocol of `KernelCell`
//!
//! Boot installs the kernel exactly once. On a target with a second
//! execution context (an early interrupt, a secondary boot path) two installs
//! can race; the compare-exchange must admit exactly one of them.
//!
//! # Running Loom Tests
//!
//! ```bash
//! cargo test --package cinder-unsafe-primitives --features loom -- --test-threads=1 loom
//! ```

#[cfg(all(test, feature = "loom"))]
mod tests {
    use loom::cell::UnsafeCell;
    use loom::sync::atomic::{AtomicBool, Ordering};
    use loom::sync::Arc;
    use loom::thread;

    /// The `KernelCell` protocol rebuilt on loom's tracked types
    struct LoomCell {
        installed: AtomicBool,
        inner: UnsafeCell<Option<u32>>,
    }

    impl LoomCell {
        fn new() -> Self {
            Self {
                installed: AtomicBool::new(false),
                inner: UnsafeCell::new(None),
            }
        }

        fn install(&self, value: u32) -> Result<(), u32> {
            if self
                .installed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(value);
            }
            self.inner.with_mut(|slot| unsafe { *slot = Some(value) });
            Ok(())
        }
    }

    unsafe impl Sync for LoomCell {}

    /// Test: exactly one of two racing installs wins
    #[test]
    fn loom_install_exactly_once() {
        loom::model(|| {
            let cell = Arc::new(LoomCell::new());

            let c1 = cell.clone();
            let c2 = cell.clone();

            let t1 = thread::spawn(move || c1.install(1));
            let t2 = thread::spawn(move || c2.install(2));

            let r1 = t1.join().unwrap();
            let r2 = t2.join().unwrap();

            assert!(r1.is_ok() != r2.is_ok(), "Exactly one install must succeed");
        });
    }

    /// Test: the losing install gets its value back untouched
    #[test]
    fn loom_loser_keeps_value() {
        loom::model(|| {
            let cell = Arc::new(LoomCell::new());
            let c1 = cell.clone();

            let t1 = thread::spawn(move || c1.install(10));
            let r2 = cell.install(20);
            let r1 = t1.join().unwrap();

            match (r1, r2) {
                (Ok(()), Err(v)) => assert_eq!(v, 20),
                (Err(v), Ok(())) => assert_eq!(v, 10),
                other => panic!("unexpected install outcome: {:?}", other),
            }
        });
    }
}
