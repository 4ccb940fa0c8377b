//! Launch/dispatch shim
//!
//! Maps a logical request - "`num_groups` groups of shape (size, grain)" -
//! onto a concrete parallel dispatch. Groups are fully independent: they
//! share no scratch and write disjoint output regions, so they fan out over
//! rayon (or a plain loop without the `rayon` feature). Lanes within a
//! group are scoped OS threads sharing one barrier and one scratch pool.
//!
//! [`launch`] is synchronous: it returns only after every lane of every
//! group has finished. Orchestrators that issue dependent phases (the
//! global scan's upsweep / carry scan / downsweep) rely on exactly this for
//! their inter-phase ordering guarantee.

use crate::error::{Error, Result};
use crate::group::{Group, GroupBarrier, SharedPool};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::thread;

/// Default fast-pool capacity per group, a stand-in for on-chip shared
/// memory budgets.
pub const DEFAULT_POOL_BYTES: usize = 48 * 1024;

/// Shape of one execution group: team size and per-lane grain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupShape {
    /// Lanes per group.
    pub size: usize,
    /// Elements each lane processes per group-local pass.
    pub grain: usize,
}

impl GroupShape {
    /// A shape with `size` lanes of `grain` elements each.
    pub fn new(size: usize, grain: usize) -> Self {
        Self { size, grain }
    }

    /// Elements one group covers in a single pass.
    pub fn tile(&self) -> usize {
        self.size * self.grain
    }
}

impl Default for GroupShape {
    fn default() -> Self {
        // 32 lanes x 128 elements: tiles of 4096. Wide enough grain that
        // barrier traffic stays small relative to per-lane serial work.
        Self {
            size: 32,
            grain: 128,
        }
    }
}

/// A validated dispatch request: group shape, group count, and the fast
/// scratch capacity given to each group.
#[derive(Clone, Copy, Debug)]
pub struct LaunchConfig {
    shape: GroupShape,
    num_groups: usize,
    pool_bytes: usize,
}

impl LaunchConfig {
    /// Validate a (shape, group count) request.
    ///
    /// # Errors
    /// [`Error::InvalidLaunch`] when the shape has zero lanes or zero grain,
    /// or when `num_groups` is zero.
    pub fn new(shape: GroupShape, num_groups: usize) -> Result<Self> {
        if shape.size == 0 || shape.grain == 0 {
            return Err(Error::InvalidLaunch {
                reason: format!(
                    "group shape must be non-degenerate, got size={} grain={}",
                    shape.size, shape.grain
                ),
            });
        }
        if num_groups == 0 {
            return Err(Error::InvalidLaunch {
                reason: "num_groups must be at least 1".to_string(),
            });
        }
        Ok(Self {
            shape,
            num_groups,
            pool_bytes: DEFAULT_POOL_BYTES,
        })
    }

    /// Override the per-group fast pool capacity (a scratch-size hint).
    ///
    /// Undersized pools are not an error: allocations spill to the heap
    /// transparently.
    pub fn with_pool_bytes(mut self, bytes: usize) -> Self {
        self.pool_bytes = bytes;
        self
    }

    /// Requested group shape.
    pub fn shape(&self) -> GroupShape {
        self.shape
    }

    /// Requested group count.
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }
}

/// Platform parallelism budget: how many groups are worth running at once.
///
/// Orchestrators treat this as an opaque integer cap on `num_groups` to
/// avoid oversubscription; it never affects results, only partitioning.
pub fn parallelism_budget() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Instantiate `config.num_groups()` group invocations of `kernel`.
///
/// `kernel` is called once per lane as `kernel(group_id, &group)`. It must
/// keep group-uniform control flow around every collective operation (see
/// [`crate::group`]).
///
/// Synchronous: returns after every lane of every group has completed, so
/// consecutive `launch` calls are totally ordered with respect to memory.
///
/// A panic in `kernel` poisons the group's barrier so sibling lanes unwind
/// instead of blocking on a dead lane, and `launch` itself panics with the
/// original payload once the group has been joined.
///
/// # Errors
/// Currently infallible after config validation; the `Result` is the
/// contract surface for dispatch backends that can fail.
pub fn launch<F>(config: &LaunchConfig, kernel: F) -> Result<()>
where
    F: Fn(usize, &Group<'_>) + Sync,
{
    let run_group = |group_id: usize| {
        let pool = SharedPool::new(config.pool_bytes);
        let barrier = GroupBarrier::new(config.shape.size);
        thread::scope(|scope| {
            for lane in 0..config.shape.size {
                let pool = &pool;
                let barrier = &barrier;
                let kernel = &kernel;
                scope.spawn(move || {
                    let group =
                        Group::new(config.shape.size, config.shape.grain, lane, barrier, pool);
                    let outcome = catch_unwind(AssertUnwindSafe(|| kernel(group_id, &group)));
                    if let Err(payload) = outcome {
                        barrier.poison();
                        resume_unwind(payload);
                    }
                });
            }
        });
    };

    #[cfg(feature = "rayon")]
    (0..config.num_groups).into_par_iter().for_each(run_group);

    #[cfg(not(feature = "rayon"))]
    (0..config.num_groups).for_each(run_group);

    Ok(())
}
