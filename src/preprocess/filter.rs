//! Iterative sparsity filtering of users and artists.

use std::collections::HashMap;

use tracing::info;

use crate::types::Interaction;

/// Thresholds applied by [`filter_sparse`]
#[derive(Debug, Clone, Copy)]
pub struct SparsityThresholds {
    pub min_user_interactions: usize,
    pub min_artist_listeners: usize,
}

/// Outcome of sparsity filtering
#[derive(Debug, Default)]
pub struct Filtered {
    pub rows: Vec<Interaction>,
    /// Number of passes until a pass removed nothing
    pub iterations: usize,
}

/// Remove low-activity users and artists until nothing changes.
///
/// Each pass first drops users with fewer than `min_user_interactions`
/// rows, then artists with fewer than `min_artist_listeners` rows among the
/// survivors. Rows are assumed deduplicated, so a row count per artist is its
/// listener count. Filtering everything away yields an empty result, not an
/// error.
pub fn filter_sparse(mut rows: Vec<Interaction>, thresholds: SparsityThresholds) -> Filtered {
    let initial_rows = rows.len();
    let mut iterations = 0usize;

    loop {
        iterations += 1;
        let rows_before = rows.len();

        retain_by_count(
            &mut rows,
            |r| r.user_id.as_str(),
            thresholds.min_user_interactions,
        );
        retain_by_count(
            &mut rows,
            |r| r.artist_name.as_str(),
            thresholds.min_artist_listeners,
        );

        info!(
            iteration = iterations,
            rows = rows.len(),
            removed = rows_before - rows.len(),
            "Sparsity filter pass"
        );

        if rows.len() == rows_before {
            break;
        }
    }

    info!(
        rows_before = initial_rows,
        rows_after = rows.len(),
        iterations,
        "Sparsity filter converged"
    );
    Filtered { rows, iterations }
}

/// Keep only rows whose key occurs at least `min` times.
fn retain_by_count<F>(rows: &mut Vec<Interaction>, key: F, min: usize)
where
    F: Fn(&Interaction) -> &str,
{
    let keep: Vec<bool> = {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in rows.iter() {
            *counts.entry(key(row)).or_insert(0) += 1;
        }
        rows.iter().map(|r| counts[key(r)] >= min).collect()
    };

    let mut keep = keep.into_iter();
    rows.retain(|_| keep.next().unwrap_or(false));
}
