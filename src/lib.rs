//! # coopr
//!
//! **Cooperative-group parallel primitives for Rust.**
//!
//! coopr provides scan (prefix reduction) and merge over arbitrarily large
//! inputs, built from fixed-size teams of lanes that share a small scratch
//! pool and cooperate through barrier synchronization - the same execution
//! discipline GPU compute kernels use, expressed with OS threads.
//!
//! ## Architecture
//!
//! ```text
//! ops (global orchestrators)
//! ├── scan: upsweep / carry scan / downsweep over task ranges
//! └── merge: merge-path split points, one group per tile
//!         │
//! runtime (launch shim: group shape × group count → lane threads)
//!         │
//! algorithm (group-local kernels: copy_n, reduce, scan, merge)
//!         │
//! group (Group barrier abstraction, scoped scratch pool, shared spans)
//! ```
//!
//! Each group-local pass handles at most `size * grain` elements (one
//! *tile*); the orchestrators tile larger inputs and stitch the per-group
//! partial results back together, threading carries for scan and
//! precomputing independent split points for merge.
//!
//! ## Quick Start
//!
//! ```rust
//! use coopr::prelude::*;
//!
//! let input = vec![1u64; 1000];
//! let mut output = vec![0u64; 1000];
//! inclusive_scan(&input, &mut output, 13, |a, b| a + b)?;
//! assert_eq!(output[0], 14);
//! assert_eq!(output[999], 1013);
//! # Ok::<(), coopr::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): dispatch independent groups in parallel

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod error;
pub mod group;
pub mod ops;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::group::{Group, Span};
    pub use crate::ops::{
        exclusive_scan, inclusive_scan, inclusive_scan_from_first, merge, Policy,
    };
    pub use crate::runtime::{GroupShape, LaunchConfig};
}
