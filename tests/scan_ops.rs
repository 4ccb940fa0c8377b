//! Integration tests for the global scan orchestrator
//!
//! Tests verify correctness against sequential references across:
//! - Both orchestrator modes (single-group and three-phase), straddling the
//!   size threshold
//! - Non-commutative combine operations
//! - Tiling invariance under forced policies
//! - Edge cases: empty input, single element, length mismatches

use coopr::ops::{
    exclusive_scan, exclusive_scan_with_policy, inclusive_scan, inclusive_scan_from_first,
    inclusive_scan_from_first_with_policy, inclusive_scan_with_policy, Policy,
};
use coopr::algorithm;
use coopr::group::Span;
use coopr::runtime::{launch, GroupShape, LaunchConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn seq_inclusive<T: Copy>(input: &[T], init: T, combine: impl Fn(T, T) -> T) -> Vec<T> {
    let mut out = Vec::with_capacity(input.len());
    let mut acc = init;
    for &v in input {
        acc = combine(acc, v);
        out.push(acc);
    }
    out
}

fn seq_exclusive<T: Copy>(input: &[T], init: T, combine: impl Fn(T, T) -> T) -> Vec<T> {
    let mut out = Vec::with_capacity(input.len());
    let mut acc = init;
    for &v in input {
        out.push(acc);
        acc = combine(acc, v);
    }
    out
}

fn random_u64s(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(0..1_000_000)).collect()
}

/// Affine maps x -> a*x + b under composition: associative, not
/// commutative, and Copy - the canonical non-commutative scan payload.
type Affine = (u64, u64);

fn compose(f: Affine, g: Affine) -> Affine {
    (
        g.0.wrapping_mul(f.0),
        g.0.wrapping_mul(f.1).wrapping_add(g.1),
    )
}

#[test]
fn test_inclusive_scan_matches_reference() {
    let input = random_u64s(1000, 1);
    let expected = seq_inclusive(&input, 7, |a, b| a.wrapping_add(b));
    let mut output = vec![0u64; input.len()];
    inclusive_scan(&input, &mut output, 7, |a, b| a.wrapping_add(b)).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn test_exclusive_scan_matches_reference() {
    let input = random_u64s(1000, 2);
    let expected = seq_exclusive(&input, 99, |a, b| a.wrapping_add(b));
    let mut output = vec![0u64; input.len()];
    exclusive_scan(&input, &mut output, 99, |a, b| a.wrapping_add(b)).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn test_both_modes_across_threshold_boundary() {
    // Threshold 512 with tile 32: n = 511 and 512 run the single-group
    // mode, n = 513 runs upsweep / carry scan / downsweep.
    let policy = Policy {
        shape: GroupShape::new(4, 8),
        single_group_threshold: 512,
        max_groups: Some(3),
    };
    for n in [511, 512, 513] {
        let input = random_u64s(n, n as u64);
        let combine = |a: u64, b: u64| a.wrapping_add(b);

        let mut inc = vec![0u64; n];
        inclusive_scan_with_policy(&input, &mut inc, 5, combine, &policy).unwrap();
        assert_eq!(inc, seq_inclusive(&input, 5, combine), "inclusive, n={n}");

        let mut exc = vec![0u64; n];
        exclusive_scan_with_policy(&input, &mut exc, 5, combine, &policy).unwrap();
        assert_eq!(exc, seq_exclusive(&input, 5, combine), "exclusive, n={n}");
    }
}

#[test]
fn test_large_mode_with_oversubscribed_groups() {
    // 64 tiles over at most 3 groups: every group loops over many tiles.
    let policy = Policy {
        shape: GroupShape::new(4, 8),
        single_group_threshold: 100,
        max_groups: Some(3),
    };
    let input = random_u64s(2048, 3);
    let combine = |a: u64, b: u64| a.wrapping_add(b);
    let mut output = vec![0u64; input.len()];
    inclusive_scan_with_policy(&input, &mut output, 0, combine, &policy).unwrap();
    assert_eq!(output, seq_inclusive(&input, 0, combine));
}

#[test]
fn test_non_commutative_combine() {
    let mut rng = StdRng::seed_from_u64(4);
    let input: Vec<Affine> = (0..3000)
        .map(|_| (rng.random_range(1..9), rng.random_range(0..1000)))
        .collect();
    let policy = Policy {
        shape: GroupShape::new(4, 4),
        single_group_threshold: 100,
        max_groups: Some(4),
    };
    let init: Affine = (1, 0);

    let mut inc = vec![(0, 0); input.len()];
    inclusive_scan_with_policy(&input, &mut inc, init, compose, &policy).unwrap();
    assert_eq!(inc, seq_inclusive(&input, init, compose));

    let mut exc = vec![(0, 0); input.len()];
    exclusive_scan_with_policy(&input, &mut exc, init, compose, &policy).unwrap();
    assert_eq!(exc, seq_exclusive(&input, init, compose));
}

#[test]
fn test_scan_from_first_element() {
    let input = random_u64s(70, 5);
    let combine = |a: u64, b: u64| a.wrapping_add(b);
    let mut output = vec![0u64; input.len()];
    inclusive_scan_from_first(&input, &mut output, combine).unwrap();
    // [x0, x0+x1, ...]: the first element is the seed, written unmodified.
    let mut expected = vec![input[0]];
    expected.extend(seq_inclusive(&input[1..], input[0], combine));
    assert_eq!(output, expected);
}

#[test]
fn test_scan_from_first_single_element() {
    let input = [42u64];
    let mut output = [0u64];
    inclusive_scan_from_first(&input, &mut output, |a, b| a + b).unwrap();
    assert_eq!(output, [42]);
}

#[test]
fn test_scan_from_first_empty_writes_nothing() {
    let input: [u64; 0] = [];
    let mut output: [u64; 0] = [];
    inclusive_scan_from_first(&input, &mut output, |a, b| a + b).unwrap();
}

#[test]
fn test_scan_from_first_forced_large_mode() {
    let input = random_u64s(4000, 6);
    let policy = Policy {
        shape: GroupShape::new(4, 8),
        single_group_threshold: 64,
        max_groups: Some(4),
    };
    let combine = |a: u64, b: u64| a.wrapping_add(b);
    let mut output = vec![0u64; input.len()];
    inclusive_scan_from_first_with_policy(&input, &mut output, combine, &policy).unwrap();
    let mut expected = vec![input[0]];
    expected.extend(seq_inclusive(&input[1..], input[0], combine));
    assert_eq!(output, expected);
}

#[test]
fn test_tiling_invariance() {
    let input = random_u64s(5000, 7);
    let combine = |a: u64, b: u64| a.wrapping_add(b);
    let expected = seq_inclusive(&input, 11, combine);

    let policies = [
        Policy {
            shape: GroupShape::new(2, 2),
            single_group_threshold: 8,
            max_groups: Some(2),
        },
        Policy {
            shape: GroupShape::new(8, 16),
            single_group_threshold: 10_000,
            max_groups: None,
        },
        Policy::default(),
    ];
    for policy in &policies {
        let mut output = vec![0u64; input.len()];
        inclusive_scan_with_policy(&input, &mut output, 11, combine, policy).unwrap();
        assert_eq!(output, expected, "policy {policy:?} changed the result");
    }
}

#[test]
fn test_inclusive_scan_ones_concrete() {
    // 1<<20 ones with init 13: output must be exactly [14, 15, ..., 13+n].
    let n = 1usize << 20;
    let input = vec![1u64; n];
    let policy = Policy {
        max_groups: Some(8),
        ..Policy::default()
    };
    let mut output = vec![0u64; n];
    inclusive_scan_with_policy(&input, &mut output, 13, |a, b| a + b, &policy).unwrap();
    assert!(output
        .iter()
        .enumerate()
        .all(|(i, &v)| v == 14 + i as u64));
}

#[test]
fn test_large_default_policy() {
    let input = random_u64s(100_000, 8);
    let combine = |a: u64, b: u64| a.wrapping_add(b);
    let mut output = vec![0u64; input.len()];
    exclusive_scan(&input, &mut output, 1, combine).unwrap();
    assert_eq!(output, seq_exclusive(&input, 1, combine));
}

#[test]
fn test_group_local_scan_from_first() {
    // The group-local seed-from-first variant, driven directly through the
    // launch shim: element 0 passes through, the rest scan with it as carry.
    let input = random_u64s(50, 9);
    let combine = |a: u64, b: u64| a.wrapping_add(b);
    let mut expected = vec![input[0]];
    expected.extend(seq_inclusive(&input[1..], input[0], combine));

    let mut output = vec![0u64; 50];
    let config = LaunchConfig::new(GroupShape::new(4, 3), 1).unwrap();
    let src = Span::from_slice(&input);
    let dst = Span::from_mut_slice(&mut output);
    launch(&config, |_, g| {
        let total = algorithm::inclusive_scan_from_first(g, src, 50, dst, &combine);
        assert_eq!(total, Some(*expected.last().unwrap()));
    })
    .unwrap();
    assert_eq!(output, expected);
}

#[test]
fn test_scan_with_exhausted_fast_pool() {
    // A zero-byte fast pool forces every scratch allocation onto the heap
    // fallback; results must be unaffected.
    let input = random_u64s(200, 20);
    let combine = |a: u64, b: u64| a.wrapping_add(b);
    let mut output = vec![0u64; 200];
    let config = LaunchConfig::new(GroupShape::new(4, 4), 1)
        .unwrap()
        .with_pool_bytes(0);
    let src = Span::from_slice(&input);
    let dst = Span::from_mut_slice(&mut output);
    launch(&config, |_, g| {
        algorithm::inclusive_scan(g, src, 200, dst, 3, &combine);
    })
    .unwrap();
    assert_eq!(output, seq_inclusive(&input, 3, combine));
}

#[test]
fn test_empty_input() {
    let input: Vec<u64> = Vec::new();
    let mut output: Vec<u64> = Vec::new();
    inclusive_scan(&input, &mut output, 0, |a, b| a + b).unwrap();
    exclusive_scan(&input, &mut output, 0, |a, b| a + b).unwrap();
}

#[test]
fn test_single_element() {
    let input = [5u64];
    let mut inc = [0u64];
    inclusive_scan(&input, &mut inc, 2, |a, b| a + b).unwrap();
    assert_eq!(inc, [7]);

    let mut exc = [0u64];
    exclusive_scan(&input, &mut exc, 2, |a, b| a + b).unwrap();
    assert_eq!(exc, [2]);
}

#[test]
fn test_length_mismatch_is_an_error() {
    let input = [1u64, 2, 3];
    let mut output = [0u64; 2];
    assert!(inclusive_scan(&input, &mut output, 0, |a, b| a + b).is_err());
    assert!(exclusive_scan(&input, &mut output, 0, |a, b| a + b).is_err());
    assert!(inclusive_scan_from_first(&input, &mut output, |a, b| a + b).is_err());
}

#[test]
fn test_scan_over_aligned_elements() {
    // Scratch staging must honor the element alignment, not just a pool
    // default, or wide payloads land on misaligned storage.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[repr(align(32))]
    struct Wide(u64);

    let input = vec![Wide(1); 300];
    let mut output = vec![Wide(0); 300];
    let add = |a: Wide, b: Wide| Wide(a.0 + b.0);

    // Single-group mode.
    let policy = Policy {
        shape: GroupShape::new(4, 4),
        ..Policy::default()
    };
    inclusive_scan_with_policy(&input, &mut output, Wide(0), add, &policy).unwrap();
    for (i, v) in output.iter().enumerate() {
        assert_eq!(v.0, i as u64 + 1);
    }

    // Three-phase mode, staging Wide through every pool path.
    let policy = Policy {
        shape: GroupShape::new(4, 4),
        single_group_threshold: 32,
        max_groups: Some(3),
    };
    let mut output = vec![Wide(0); 300];
    inclusive_scan_with_policy(&input, &mut output, Wide(0), add, &policy).unwrap();
    for (i, v) in output.iter().enumerate() {
        assert_eq!(v.0, i as u64 + 1);
    }
}
