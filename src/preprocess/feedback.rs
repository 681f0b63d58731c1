//! Implicit-feedback weighting.

use tracing::info;

use crate::types::{ConfidenceInteraction, Interaction};

/// Confidence for a play count: `1 + alpha * play_count`.
///
/// Always at least 1 since both operands are unsigned.
pub fn confidence(play_count: u64, alpha: u32) -> f64 {
    1.0 + f64::from(alpha) * play_count as f64
}

/// Attach confidence and a constant preference of 1 to every row.
pub fn apply_confidence(rows: Vec<Interaction>, alpha: u32) -> Vec<ConfidenceInteraction> {
    let out: Vec<ConfidenceInteraction> = rows
        .into_iter()
        .map(|r| ConfidenceInteraction {
            confidence: confidence(r.play_count, alpha),
            preference: 1,
            user_id: r.user_id,
            artist_name: r.artist_name,
            artist_mbid: r.artist_mbid,
            play_count: r.play_count,
        })
        .collect();

    if let Some((min, max, sum)) = out.iter().map(|r| r.confidence).fold(None, |acc, c| {
        Some(match acc {
            None => (c, c, c),
            Some((lo, hi, s)) => (f64::min(lo, c), f64::max(hi, c), s + c),
        })
    }) {
        info!(
            alpha,
            min_confidence = min,
            max_confidence = max,
            mean_confidence = sum / out.len() as f64,
            "Created implicit feedback"
        );
    }
    out
}
