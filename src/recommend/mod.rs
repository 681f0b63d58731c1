//! Query engine over a trained factor model.
//!
//! [`RecommenderService`] is built once and never mutated, so handlers share
//! it behind an `Arc` without locking. Every query returns ranked
//! `(artist, score, rank)` lists with ranks starting at 1.

pub mod charts;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ServingConfig;
use crate::model::artifacts::{load_metadata, load_model};
use crate::model::{FactorModel, ModelError, ModelMetadata};
use crate::mood::{get_mood, MoodProfile};
use crate::preprocess::ingest::normalize_name;
use crate::preprocess::{IdMapping, ProcessedData, SparseMatrix};
use crate::types::ConfidenceInteraction;

pub use charts::{compute_charts, ChartEntry};

/// Coarse failure category, mapped to a transport status by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    OutOfRange,
    Unavailable,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecommendError {
    /// Unknown user, artist or mood, or nothing left to recommend
    #[error("{0}")]
    NotFound(String),

    /// Index known to a mapping but absent from the trained factors
    #[error("{0}")]
    OutOfRange(String),

    /// Model or data not loaded, or inconsistent with each other
    #[error("{0}")]
    Unavailable(String),
}

impl RecommendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            Self::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<ModelError> for RecommendError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::IndexOutOfRange { .. } => Self::OutOfRange(err.to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub artist_name: String,
    pub score: f32,
    pub rank: usize,
}

/// Result of a mood query
#[derive(Debug, Clone)]
pub struct MoodRecommendations {
    pub mood: &'static MoodProfile,
    pub items: Vec<Recommendation>,
    /// Seed artists found in the item mapping, in profile order
    pub seeds_used: Vec<String>,
    pub proxy_users: usize,
    /// Proxy users whose own recommendation call failed
    pub failed_proxies: usize,
}

/// Result of a random-user query
#[derive(Debug, Clone)]
pub struct RandomUserRecommendations {
    pub user_id: String,
    pub items: Vec<Recommendation>,
}

/// Result of a similar-artists query
#[derive(Debug, Clone)]
pub struct SimilarArtists {
    /// The query as found in the item mapping
    pub query: String,
    pub items: Vec<Recommendation>,
}

/// Read-only recommendation service over one trained model
pub struct RecommenderService {
    users: IdMapping,
    artists: IdMapping,
    model: FactorModel,
    /// Train confidences, user x artist
    user_items: SparseMatrix,
    /// Same matrix, artist x user, for seed-listener lookups
    item_users: SparseMatrix,
    charts: Vec<ChartEntry>,
    metadata: Option<ModelMetadata>,
    proxy_user_limit: usize,
}

impl RecommenderService {
    /// Load processed data and model artifacts from disk.
    pub fn load(
        processed_dir: &Path,
        model_dir: &Path,
        serving: &ServingConfig,
    ) -> Result<Self, RecommendError> {
        let data = ProcessedData::load(processed_dir)
            .map_err(|e| RecommendError::Unavailable(format!("Processed data not available: {e}")))?;
        let model = load_model(model_dir)
            .map_err(|e| RecommendError::Unavailable(format!("Model not available: {e}")))?;
        let metadata = load_metadata(model_dir).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable model metadata");
            None
        });

        Self::from_parts(
            data.users,
            data.artists,
            data.matrix,
            &data.train,
            model,
            metadata,
            serving,
        )
    }

    /// Assemble a service from in-memory parts.
    ///
    /// The user mapping may hold more users than the model was trained on;
    /// queries for those users fail with `OutOfRange`. The item side must
    /// line up exactly.
    pub fn from_parts(
        users: IdMapping,
        artists: IdMapping,
        user_items: SparseMatrix,
        train: &[ConfidenceInteraction],
        model: FactorModel,
        metadata: Option<ModelMetadata>,
        serving: &ServingConfig,
    ) -> Result<Self, RecommendError> {
        if model.n_items() != artists.len() {
            return Err(RecommendError::Unavailable(format!(
                "Model has {} item factors but the artist mapping has {} entries",
                model.n_items(),
                artists.len()
            )));
        }
        if user_items.shape() != (users.len(), artists.len()) {
            return Err(RecommendError::Unavailable(format!(
                "Train matrix shape {:?} does not match mappings ({}, {})",
                user_items.shape(),
                users.len(),
                artists.len()
            )));
        }
        if model.n_users() > users.len() {
            warn!(
                model_users = model.n_users(),
                mapped_users = users.len(),
                "Model has more user factors than mapped users"
            );
        }

        let item_users = user_items.transpose();
        let charts = compute_charts(train);
        info!(
            users = users.len(),
            artists = artists.len(),
            trained_users = model.n_users(),
            factors = model.factors(),
            "Recommender ready"
        );

        Ok(Self {
            users,
            artists,
            model,
            user_items,
            item_users,
            charts,
            metadata,
            proxy_user_limit: serving.proxy_user_limit,
        })
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_artists(&self) -> usize {
        self.artists.len()
    }

    pub fn model(&self) -> &FactorModel {
        &self.model
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    pub fn total_artists_charted(&self) -> usize {
        self.charts.len()
    }

    /// Top `k` unseen artists for a known user.
    pub fn recommend_for_user(&self, user_id: &str, k: usize) -> Result<Vec<Recommendation>, RecommendError> {
        let idx = self
            .users
            .get(user_id)
            .ok_or_else(|| RecommendError::NotFound(format!("User {user_id} not found")))?;
        if idx >= self.model.n_users() {
            return Err(RecommendError::OutOfRange(format!(
                "User {user_id} has index {idx} but the model has {} users",
                self.model.n_users()
            )));
        }
        self.recommend_index(idx, k)
    }

    /// Recommendations for a uniformly sampled trained user.
    ///
    /// A sampled index without a mapped id is reported as `user_{index}`.
    pub fn recommend_random_user<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        k: usize,
    ) -> Result<RandomUserRecommendations, RecommendError> {
        let n = self.model.n_users();
        if n == 0 {
            return Err(RecommendError::Unavailable("Model has no users".to_string()));
        }
        let idx = rng.gen_range(0..n);
        let user_id = self
            .users
            .key(idx)
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("user_{idx}"));

        Ok(RandomUserRecommendations {
            items: self.recommend_index(idx, k)?,
            user_id,
        })
    }

    /// Aggregate recommendations of listeners who share a mood's seeds.
    pub fn recommend_for_mood(&self, mood_key: &str, k: usize) -> Result<MoodRecommendations, RecommendError> {
        let mood = get_mood(mood_key)
            .ok_or_else(|| RecommendError::NotFound(format!("Unknown mood: {mood_key}")))?;

        let mut seeds: Vec<usize> = Vec::new();
        let mut seeds_used: Vec<String> = Vec::new();
        for seed in mood.seed_artists {
            let name = normalize_name(seed);
            if let Some(idx) = self.artists.get(&name) {
                if !seeds.contains(&idx) {
                    seeds.push(idx);
                    seeds_used.push(name);
                }
            }
        }
        if seeds.is_empty() {
            return Err(RecommendError::NotFound(format!(
                "None of the seed artists for mood {} are known",
                mood.key
            )));
        }

        let proxies = self.proxy_users(&seeds);
        if proxies.is_empty() {
            return Err(RecommendError::NotFound(format!(
                "No listeners found for the seed artists of mood {}",
                mood.key
            )));
        }

        let seed_set: HashSet<usize> = seeds.iter().copied().collect();
        let mut totals: HashMap<usize, f32> = HashMap::new();
        let mut failed_proxies = 0usize;
        let mut first_failure: Option<RecommendError> = None;

        for &user in &proxies {
            match self
                .model
                .recommend(user, self.user_items.row(user), k.saturating_mul(2), true)
            {
                Ok(recs) => {
                    for (item, score) in recs {
                        if !seed_set.contains(&item) {
                            *totals.entry(item).or_insert(0.0) += score;
                        }
                    }
                }
                Err(e) => {
                    debug!(user, error = %e, "Proxy user recommendation failed");
                    failed_proxies += 1;
                    first_failure.get_or_insert_with(|| e.into());
                }
            }
        }

        if failed_proxies == proxies.len() {
            if let Some(err) = first_failure {
                return Err(err);
            }
        }
        if failed_proxies > 0 {
            warn!(mood = mood.key, failed_proxies, proxies = proxies.len(), "Some proxy users failed");
        }

        let mut ranked: Vec<(&str, f32)> = totals
            .into_iter()
            .filter_map(|(item, score)| self.artists.key(item).map(|name| (name, score)))
            .collect();
        if ranked.is_empty() {
            return Err(RecommendError::NotFound(format!(
                "No recommendations found for mood {}",
                mood.key
            )));
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let items = ranked
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(i, (name, score))| Recommendation {
                artist_name: name.to_string(),
                score,
                rank: i + 1,
            })
            .collect();

        Ok(MoodRecommendations {
            mood,
            items,
            seeds_used,
            proxy_users: proxies.len(),
            failed_proxies,
        })
    }

    /// Artists closest to `artist_name` by cosine similarity of factors.
    ///
    /// The query is lowercased and trimmed; if that is not a known artist the
    /// fully cleaned form is tried too.
    pub fn similar_artists(&self, artist_name: &str, k: usize) -> Result<SimilarArtists, RecommendError> {
        let simple = artist_name.trim().to_lowercase();
        let (query, idx) = match self.artists.get(&simple) {
            Some(idx) => (simple, idx),
            None => {
                let cleaned = normalize_name(artist_name);
                let idx = self
                    .artists
                    .get(&cleaned)
                    .ok_or_else(|| RecommendError::NotFound(format!("Artist {artist_name} not found")))?;
                (cleaned, idx)
            }
        };

        let items = self.to_recommendations(self.model.similar_items(idx, k)?);
        Ok(SimilarArtists { query, items })
    }

    /// The `k` most played artists in the training data.
    pub fn top_charts(&self, k: usize) -> Vec<ChartEntry> {
        self.charts.iter().take(k).cloned().collect()
    }

    /// Seed listeners ranked by how many distinct seeds they played.
    fn proxy_users(&self, seeds: &[usize]) -> Vec<usize> {
        let mut overlap: HashMap<usize, usize> = HashMap::new();
        for &seed in seeds {
            for (user, confidence) in self.item_users.row(seed).iter() {
                if confidence != 0.0 {
                    *overlap.entry(user).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(usize, usize)> = overlap.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(self.proxy_user_limit);
        ranked.into_iter().map(|(user, _)| user).collect()
    }

    fn recommend_index(&self, idx: usize, k: usize) -> Result<Vec<Recommendation>, RecommendError> {
        let scored = self.model.recommend(idx, self.user_items.row(idx), k, true)?;
        Ok(self.to_recommendations(scored))
    }

    fn to_recommendations(&self, scored: Vec<(usize, f32)>) -> Vec<Recommendation> {
        scored
            .into_iter()
            .filter_map(|(item, score)| self.artists.key(item).map(|name| (name, score)))
            .enumerate()
            .map(|(i, (name, score))| Recommendation {
                artist_name: name.to_string(),
                score,
                rank: i + 1,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::matrix::{build_mappings, build_matrix};
    use ndarray::{array, Array2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn row(user: &str, artist: &str, plays: u64) -> ConfidenceInteraction {
        ConfidenceInteraction {
            user_id: user.to_string(),
            artist_name: artist.to_string(),
            artist_mbid: None,
            play_count: plays,
            confidence: 1.0 + 40.0 * plays as f64,
            preference: 1,
        }
    }

    /// Artists: radiohead, bon iver, muse, queen, coldplay (indices 0..5).
    /// Users: u1, u2 listen to heartbreak seeds; u3 listens to muse only.
    fn train() -> Vec<ConfidenceInteraction> {
        vec![
            row("u1", "radiohead", 10),
            row("u1", "bon iver", 3),
            row("u2", "radiohead", 2),
            row("u3", "muse", 50),
            row("u3", "queen", 1),
            row("u4", "coldplay", 4),
        ]
    }

    fn item_factors() -> Array2<f32> {
        array![
            [1.0, 0.0, 0.0],
            [0.9, 0.1, 0.0],
            [0.0, 1.0, 0.0],
            [0.1, 0.9, 0.0],
            [0.5, 0.5, 0.1],
        ]
    }

    fn service_with(user_factors: Array2<f32>) -> RecommenderService {
        service_with_serving(user_factors, &ServingConfig::default())
    }

    fn service_with_serving(user_factors: Array2<f32>, serving: &ServingConfig) -> RecommenderService {
        let rows = train();
        let (users, artists) = build_mappings(&rows);
        let matrix = build_matrix(&rows, &users, &artists).unwrap();
        let model = FactorModel::new(user_factors, item_factors()).unwrap();
        RecommenderService::from_parts(
            users,
            artists,
            matrix,
            &rows,
            model,
            None,
            serving,
        )
        .unwrap()
    }

    fn default_user_factors() -> Array2<f32> {
        array![
            [1.0, 0.2, 0.0],
            [0.8, 0.0, 1.0],
            [0.0, 1.0, 0.0],
            [0.3, 0.3, 0.3],
        ]
    }

    fn service() -> RecommenderService {
        service_with(default_user_factors())
    }

    fn names(items: &[Recommendation]) -> Vec<&str> {
        items.iter().map(|r| r.artist_name.as_str()).collect()
    }

    fn assert_ranked(items: &[Recommendation], k: usize) {
        assert!(items.len() <= k);
        for (i, r) in items.iter().enumerate() {
            assert_eq!(r.rank, i + 1);
        }
    }

    #[test]
    fn test_recommend_for_user_excludes_seen() {
        let recs = service().recommend_for_user("u1", 10).unwrap();
        assert_ranked(&recs, 10);
        let got = names(&recs);
        assert!(!got.contains(&"radiohead") && !got.contains(&"bon iver"));
        assert_eq!(got[0], "coldplay");
    }

    #[test]
    fn test_recommend_for_user_respects_k() {
        let recs = service().recommend_for_user("u4", 2).unwrap();
        assert_eq!(recs.len(), 2);
        assert_ranked(&recs, 2);
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let err = service().recommend_for_user("nobody", 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_untrained_user_is_out_of_range() {
        let svc = service_with(array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let err = svc.recommend_for_user("u3", 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_mood_aggregates_proxy_recommendations() {
        let result = service().recommend_for_mood("heartbreak", 3).unwrap();
        assert_eq!(result.seeds_used, vec!["radiohead", "bon iver"]);
        assert_eq!(result.proxy_users, 2);
        assert_eq!(result.failed_proxies, 0);
        assert_ranked(&result.items, 3);

        let got = names(&result.items);
        assert!(!got.contains(&"radiohead") && !got.contains(&"bon iver"));
        assert!(result.items.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_mood_scores_sum_over_proxies() {
        let svc = service();
        let k = 3;
        let result = svc.recommend_for_mood("heartbreak", k).unwrap();

        // coldplay: u1 scores 0.6, u2 scores 0.5
        let coldplay = result
            .items
            .iter()
            .find(|r| r.artist_name == "coldplay")
            .unwrap();
        assert!((coldplay.score - 1.1).abs() < 1e-5);

        let seeds: HashSet<usize> = ["radiohead", "bon iver"]
            .iter()
            .map(|s| svc.artists.get(s).unwrap())
            .collect();
        let mut expected: HashMap<usize, f32> = HashMap::new();
        for user in [0, 1] {
            let recs = svc
                .model
                .recommend(user, svc.user_items.row(user), 2 * k, true)
                .unwrap();
            for (item, score) in recs.into_iter().filter(|(i, _)| !seeds.contains(i)) {
                *expected.entry(item).or_insert(0.0) += score;
            }
        }
        for r in &result.items {
            let item = svc.artists.get(&r.artist_name).unwrap();
            assert!((r.score - expected[&item]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_mood_proxy_limit_keeps_highest_overlap() {
        let serving = ServingConfig {
            proxy_user_limit: 1,
            ..ServingConfig::default()
        };
        let svc = service_with_serving(default_user_factors(), &serving);
        let result = svc.recommend_for_mood("heartbreak", 3).unwrap();

        assert_eq!(result.proxy_users, 1);
        // only u1 (both seeds) contributes: coldplay 0.6, queen 0.28, muse 0.2
        assert_eq!(names(&result.items), vec!["coldplay", "queen", "muse"]);
        assert!((result.items[0].score - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_mood_with_unknown_seeds_is_not_found() {
        let err = service().recommend_for_mood("rock", 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unknown_mood_is_not_found() {
        let err = service().recommend_for_mood("polka", 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_mood_fails_when_every_proxy_fails() {
        // only u1 is trained, and "motivation" seeds (muse, queen) are played by u3 alone
        let svc = service_with(array![[1.0, 0.0, 0.0]]);
        let err = svc.recommend_for_mood("motivation", 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_mood_counts_partial_proxy_failures() {
        // u1 trained, u2 not: heartbreak proxies are u1 and u2
        let svc = service_with(array![[1.0, 0.2, 0.0]]);
        let result = svc.recommend_for_mood("heartbreak", 5).unwrap();
        assert_eq!(result.proxy_users, 2);
        assert_eq!(result.failed_proxies, 1);
        assert!(!result.items.is_empty());
    }

    #[test]
    fn test_proxy_users_ranked_by_overlap_then_index() {
        let svc = service();
        let radiohead = svc.artists.get("radiohead").unwrap();
        let bon_iver = svc.artists.get("bon iver").unwrap();
        // u1 (index 0) played both seeds, u2 (index 1) one
        assert_eq!(svc.proxy_users(&[bon_iver, radiohead]), vec![0, 1]);
    }

    #[test]
    fn test_similar_artists_never_include_query() {
        let result = service().similar_artists("  RadioHead ", 10).unwrap();
        assert_eq!(result.query, "radiohead");
        assert_ranked(&result.items, 10);
        assert_eq!(result.items.len(), 4);
        assert!(names(&result.items).iter().all(|n| *n != "radiohead"));
        assert_eq!(result.items[0].artist_name, "bon iver");
    }

    #[test]
    fn test_similar_artists_unknown() {
        let err = service().similar_artists("nickelback", 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_top_charts() {
        let svc = service();
        let charts = svc.top_charts(2);
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].artist_name, "muse");
        assert_eq!(charts[0].rank, 1);
        assert_eq!(charts[1].artist_name, "radiohead");
        assert_eq!(charts[1].play_count, 12);
        assert_eq!(charts[1].listener_count, 2);
        assert_eq!(svc.total_artists_charted(), 5);
    }

    #[test]
    fn test_random_user_is_a_trained_user() {
        let svc = service();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10 {
            let result = svc.recommend_random_user(&mut rng, 2).unwrap();
            assert!(svc.users.contains(&result.user_id));
            assert_ranked(&result.items, 2);
        }
    }

    #[test]
    fn test_random_user_placeholder_when_unmapped() {
        let rows = train();
        let (_, artists) = build_mappings(&rows);
        let mut users_short = IdMapping::new();
        users_short.insert("u1");
        let matrix_short = SparseMatrix::empty(1, artists.len());

        // two trained users, one mapped
        let model = FactorModel::new(array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], item_factors()).unwrap();
        let svc = RecommenderService::from_parts(
            users_short,
            artists,
            matrix_short,
            &rows,
            model,
            None,
            &ServingConfig::default(),
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let seen: HashSet<String> = (0..50)
            .map(|_| svc.recommend_random_user(&mut rng, 1).unwrap().user_id)
            .collect();
        assert!(seen.contains("user_1"));
    }

    #[test]
    fn test_mismatched_items_rejected() {
        let rows = train();
        let (users, artists) = build_mappings(&rows);
        let matrix = build_matrix(&rows, &users, &artists).unwrap();
        let model = FactorModel::new(Array2::zeros((4, 3)), Array2::zeros((2, 3))).unwrap();
        let result = RecommenderService::from_parts(
            users,
            artists,
            matrix,
            &rows,
            model,
            None,
            &ServingConfig::default(),
        );
        assert!(matches!(result, Err(RecommendError::Unavailable(_))));
    }

    #[test]
    fn test_model_error_kinds() {
        let err: RecommendError = ModelError::IndexOutOfRange {
            kind: "user",
            index: 9,
            len: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        let err: RecommendError = ModelError::Solver("x".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
