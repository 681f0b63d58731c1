//! Popularity charts over the training interactions.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::ConfidenceInteraction;

/// One artist's position in the charts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub artist_name: String,
    /// Total plays across all listeners
    pub play_count: u64,
    /// Distinct listeners
    pub listener_count: usize,
    /// 1-based position
    pub rank: usize,
}

/// Rank every artist by total plays, descending.
///
/// Equal totals keep the order in which the artists first appear in `rows`.
pub fn compute_charts(rows: &[ConfidenceInteraction]) -> Vec<ChartEntry> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, (u64, HashSet<&str>)> = HashMap::new();

    for row in rows {
        let entry = totals.entry(row.artist_name.as_str()).or_insert_with(|| {
            order.push(row.artist_name.as_str());
            (0, HashSet::new())
        });
        entry.0 = entry.0.saturating_add(row.play_count);
        entry.1.insert(row.user_id.as_str());
    }

    let mut charts: Vec<ChartEntry> = order
        .into_iter()
        .map(|name| {
            let (plays, listeners) = &totals[name];
            ChartEntry {
                artist_name: name.to_string(),
                play_count: *plays,
                listener_count: listeners.len(),
                rank: 0,
            }
        })
        .collect();

    // stable
    charts.sort_by(|a, b| b.play_count.cmp(&a.play_count));
    for (i, entry) in charts.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    charts
}
