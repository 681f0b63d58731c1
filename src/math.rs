//! Vector helpers shared by the solver and the query engine.

use ndarray::ArrayView1;
use std::cmp::Ordering;

/// L2 norm (magnitude) of a factor vector.
pub fn l2_norm(v: ArrayView1<'_, f32>) -> f32 {
    v.dot(&v).sqrt()
}

/// Cosine similarity between two factor vectors.
///
/// Returns 0.0 when the lengths differ, the vectors are empty, or either has
/// zero magnitude. The result is not clamped: vectors with negative
/// components can score below zero.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    a.dot(&b) / (norm_a * norm_b)
}

/// Descending order on score, ascending on index for equal scores.
///
/// NaN sorts last so a degenerate score never takes a top slot.
pub fn by_score_desc(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    match (a.1.is_nan(), b.1.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)),
    }
}

/// Keep the `k` best `(index, score)` pairs, highest score first.
pub fn top_k(mut scored: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    if k == 0 {
        return Vec::new();
    }
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, by_score_desc);
        scored.truncate(k);
    }
    scored.sort_by(by_score_desc);
    scored
}
