//! Group-local cooperative kernels
//!
//! Everything in this module runs *inside* a group: each function is called
//! by every lane of the team (group-uniform), coordinates through
//! [`Group::wait`](crate::group::Group::wait), and stages data through
//! scratch allocated from the group's pool. The global orchestrators in
//! [`crate::ops`] compose these kernels across many independent groups.
//!
//! Bounded kernels (one pass) handle at most
//! [`tile_size`](crate::group::Group::tile_size) elements; the scan, reduce
//! and merge entry points loop over larger ranges in tile-sized chunks,
//! threading a carry (scan/reduce) or advancing source cursors (merge).

pub mod copy;
pub mod merge;
pub mod reduce;
pub mod scan;

pub use copy::copy_n;
pub use merge::{bounded_merge, merge, merge_path};
pub use reduce::reduce;
pub use scan::{exclusive_scan, inclusive_scan, inclusive_scan_from_first};
