//! Per-segment priority assignment and submission-order shuffling.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::task::Priority;

/// How many leading segments are urgent outright.
const URGENT_HEAD_COUNT: usize = 3;

/// Compute the effective priority of one segment.
///
/// Early segments unblock downstream consumption soonest: the first few are
/// urgent and the first ~10% elevated. A destination that already exists is
/// demoted one level; already-satisfied work should not compete with real
/// work.
pub(super) fn segment_priority(
    base: Priority,
    index: usize,
    total: usize,
    destination: &Path,
) -> Priority {
    let mut priority = base;
    if index < URGENT_HEAD_COUNT {
        priority = priority.max(Priority::Urgent);
    } else if index < total / 10 {
        priority = priority.max(Priority::High);
    }
    if destination.exists() {
        priority = priority.lowered();
    }
    priority
}

/// Deterministic per-asset shuffle of segment indices.
///
/// Randomizing submission order decorrelates the request sequence from
/// server-side rate limiting; seeding from the asset id keeps the order
/// stable across runs of the same asset.
pub(super) fn shuffled_indices(count: usize, asset_id: &str) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..count).collect();
    let mut hasher = DefaultHasher::new();
    asset_id.hash(&mut hasher);
    let mut rng = rand::rngs::StdRng::seed_from_u64(hasher.finish());
    indices.shuffle(&mut rng);
    indices
}
