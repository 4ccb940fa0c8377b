//! Poisonable full-team barrier
//!
//! [`std::sync::Barrier`] leaves waiters blocked forever when a sibling
//! thread dies before reaching the rendezvous. Lanes run user closures that
//! may panic, so the group barrier is poisonable: when a lane unwinds, the
//! dispatcher poisons the barrier and every waiter (current and future)
//! panics out of `wait` instead of hanging, letting the whole group unwind
//! and the launch propagate the original panic.

use parking_lot::{Condvar, Mutex};

struct BarrierState {
    arrived: usize,
    generation: usize,
    poisoned: bool,
}

/// Reusable rendezvous for the lanes of one group.
///
/// The mutex hand-off doubles as the memory-visibility fence: writes a lane
/// makes before `wait` are visible to every lane after it.
pub(crate) struct GroupBarrier {
    state: Mutex<BarrierState>,
    cvar: Condvar,
    size: usize,
}

impl GroupBarrier {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                poisoned: false,
            }),
            cvar: Condvar::new(),
            size,
        }
    }

    /// Block until every lane of the group has arrived.
    ///
    /// Panics if the barrier is (or becomes) poisoned, so no lane sleeps
    /// through a sibling's death.
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock();
        if state.poisoned {
            panic!("group barrier poisoned: a sibling lane panicked");
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return;
        }
        while state.generation == generation && !state.poisoned {
            self.cvar.wait(&mut state);
        }
        if state.poisoned {
            panic!("group barrier poisoned: a sibling lane panicked");
        }
    }

    /// Mark the barrier dead and wake every waiter. Called by the dispatcher
    /// when a lane unwinds out of its kernel.
    pub(crate) fn poison(&self) {
        let mut state = self.state.lock();
        state.poisoned = true;
        self.cvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_no_thread_passes_early() {
        let barrier = GroupBarrier::new(3);
        let before = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..3 {
                scope.spawn(|| {
                    before.fetch_add(1, Ordering::Relaxed);
                    barrier.wait();
                    assert_eq!(before.load(Ordering::Relaxed), 3);
                });
            }
        });
    }

    #[test]
    fn test_reusable_across_generations() {
        let barrier = GroupBarrier::new(2);
        thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        barrier.wait();
                    }
                });
            }
        });
    }

    #[test]
    fn test_poison_panics_waiters_instead_of_hanging() {
        let barrier = GroupBarrier::new(2);
        thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let r = catch_unwind(AssertUnwindSafe(|| barrier.wait()));
                assert!(r.is_err());
            });
            barrier.poison();
            waiter.join().unwrap();
        });
    }
}
