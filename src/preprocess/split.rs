//! Per-user train/test partitioning.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::types::ConfidenceInteraction;

/// Train and test partitions
#[derive(Debug, Default)]
pub struct Split {
    pub train: Vec<ConfidenceInteraction>,
    pub test: Vec<ConfidenceInteraction>,
}

/// Number of held-out rows for a user with `n` interactions.
///
/// `floor(n * test_size)`, but never less than one.
pub fn test_count(n: usize, test_size: f64) -> usize {
    ((n as f64 * test_size).floor() as usize).clamp(1, n.max(1))
}

/// Hold out a random sample of each user's interactions.
///
/// Users are visited in ascending id order and each user's rows keep their
/// input order, so the result only depends on the seed and the input order.
/// A user with a single interaction ends up entirely in the test partition.
pub fn train_test_split(rows: Vec<ConfidenceInteraction>, test_size: f64, seed: u64) -> Split {
    let total = rows.len();
    let mut by_user: BTreeMap<String, Vec<ConfidenceInteraction>> = BTreeMap::new();
    for row in rows {
        by_user.entry(row.user_id.clone()).or_default().push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split::default();
    let mut test_only_users = 0usize;

    for (user_id, user_rows) in by_user {
        let n = user_rows.len();
        let n_test = test_count(n, test_size);
        let mut held_out = vec![false; n];
        for idx in rand::seq::index::sample(&mut rng, n, n_test).into_iter() {
            held_out[idx] = true;
        }

        if n_test == n {
            test_only_users += 1;
            debug!(%user_id, "User has no training rows after split");
        }

        for (row, is_test) in user_rows.into_iter().zip(held_out) {
            if is_test {
                split.test.push(row);
            } else {
                split.train.push(row);
            }
        }
    }

    info!(
        train = split.train.len(),
        test = split.test.len(),
        total,
        test_only_users,
        "Split interactions"
    );
    split
}
