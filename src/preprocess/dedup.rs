//! Merging of repeated `(user, artist)` pairs.

use std::collections::HashMap;

use tracing::info;

use crate::types::Interaction;

/// Outcome of deduplication
#[derive(Debug, Default)]
pub struct Deduplicated {
    pub rows: Vec<Interaction>,
    /// Rows folded into an earlier row with the same pair
    pub merged: usize,
}

/// Merge rows sharing `(user_id, artist_name)`.
///
/// Play counts are summed and the first non-missing mbid is kept. The merged
/// row takes the position of the pair's first occurrence, so output order is
/// reproducible for a given input order.
pub fn deduplicate(rows: Vec<Interaction>) -> Deduplicated {
    let mut positions: HashMap<(String, String), usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<Interaction> = Vec::with_capacity(rows.len());
    let mut merged = 0usize;

    for row in rows {
        let key = (row.user_id.clone(), row.artist_name.clone());
        match positions.get(&key) {
            Some(&pos) => {
                let existing = &mut out[pos];
                existing.play_count = existing.play_count.saturating_add(row.play_count);
                if existing.artist_mbid.is_none() {
                    existing.artist_mbid = row.artist_mbid;
                }
                merged += 1;
            }
            None => {
                positions.insert(key, out.len());
                out.push(row);
            }
        }
    }

    info!(
        duplicates = merged,
        rows = out.len(),
        "Merged duplicate user-artist pairs"
    );
    Deduplicated { rows: out, merged }
}
