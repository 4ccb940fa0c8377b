//! Global orchestrators
//!
//! The public slice-level surface. These functions tile arbitrarily large
//! inputs across many independent groups and stitch the per-group results
//! into a globally correct answer: scan through a three-phase
//! upsweep / carry-scan / downsweep protocol, merge through precomputed
//! merge-path split points. A [`Policy`] controls the group shape and the
//! single-group threshold; varying it never changes results, only how the
//! work is partitioned.

pub mod merge;
pub mod partition;
pub mod scan;

pub use merge::{merge, merge_with_policy};
pub use partition::divide_task_ranges;
pub use scan::{
    exclusive_scan, exclusive_scan_with_policy, inclusive_scan, inclusive_scan_from_first,
    inclusive_scan_from_first_with_policy, inclusive_scan_with_policy,
};

use crate::runtime::GroupShape;

/// Tuning knobs for the global orchestrators.
///
/// Results are invariant under every policy; only partitioning and
/// performance change. Tests exploit this to force both orchestrator modes
/// on the same input.
#[derive(Clone, Copy, Debug)]
pub struct Policy {
    /// Shape of every dispatched group.
    pub shape: GroupShape,
    /// Inputs of at most this many elements are handled by a single group
    /// with no carry-propagation phases.
    pub single_group_threshold: usize,
    /// Cap on the scan orchestrator's task partition (groups loop over
    /// extra tiles when oversubscribed); defaults to the platform
    /// parallelism budget when `None`. Merge dispatches one group per tile
    /// regardless - its tiles have no sequential dependency.
    pub max_groups: Option<usize>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            shape: GroupShape::default(),
            // Below this, the fixed cost of three dispatch phases outweighs
            // the parallelism they buy.
            single_group_threshold: 20_000,
            max_groups: None,
        }
    }
}
