//! Interaction records flowing through the preprocessing pipeline.

use serde::{Deserialize, Serialize};

/// One row of the raw listening log, before cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInteraction {
    /// Opaque user identifier, never altered
    pub user_id: String,
    /// External artist identifier (MusicBrainz id), often missing
    pub artist_mbid: Option<String>,
    /// Display name; rows without one are unusable
    pub artist_name: Option<String>,
    /// Number of plays
    pub play_count: u64,
}

/// A cleaned `(user, artist, plays)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub user_id: String,
    pub artist_mbid: Option<String>,
    /// Normalized display name, used as the item key
    pub artist_name: String,
    pub play_count: u64,
}

/// An interaction weighted for implicit-feedback factorization.
///
/// Serialized as one row of `train_interactions.csv` / `test_interactions.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInteraction {
    pub user_id: String,
    pub artist_name: String,
    #[serde(default)]
    pub artist_mbid: Option<String>,
    pub play_count: u64,
    /// `1 + alpha * play_count`, always >= 1
    pub confidence: f64,
    /// Binary preference indicator, always 1 for an observed interaction
    pub preference: u8,
}
