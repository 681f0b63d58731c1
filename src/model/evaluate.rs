//! Ranking metrics on the held-out split.

use std::collections::{BTreeMap, HashSet};

use tracing::info;

use super::{FactorModel, ModelError};
use crate::preprocess::SparseMatrix;

/// Averages over every evaluated user
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankingMetrics {
    pub k: usize,
    pub precision: f64,
    pub map: f64,
    pub ndcg: f64,
    pub users_evaluated: usize,
    pub test_interactions: usize,
}

impl RankingMetrics {
    /// Flatten into the `metrics` map of the model metadata.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            (format!("precision@{}", self.k), self.precision),
            (format!("map@{}", self.k), self.map),
            (format!("ndcg@{}", self.k), self.ndcg),
            ("test_users".to_string(), self.users_evaluated as f64),
            ("test_interactions".to_string(), self.test_interactions as f64),
        ])
    }
}

/// Scores for one ranked list against a relevant set.
///
/// Precision and average precision are normalized by `min(k, |relevant|)`
/// so a user with fewer than `k` held-out items can still reach 1.0.
fn score_ranking(ranked: &[usize], relevant: &HashSet<usize>, k: usize) -> (f64, f64, f64) {
    let ideal = k.min(relevant.len());
    if ideal == 0 {
        return (0.0, 0.0, 0.0);
    }

    let mut hits = 0usize;
    let mut ap = 0.0;
    let mut dcg = 0.0;
    for (pos, item) in ranked.iter().take(k).enumerate() {
        if relevant.contains(item) {
            hits += 1;
            ap += hits as f64 / (pos + 1) as f64;
            dcg += 1.0 / ((pos + 2) as f64).log2();
        }
    }
    let idcg: f64 = (0..ideal).map(|pos| 1.0 / ((pos + 2) as f64).log2()).sum();

    (
        hits as f64 / ideal as f64,
        ap / ideal as f64,
        dcg / idcg,
    )
}

/// Precision@k, MAP@k and NDCG@k for every user with held-out items.
///
/// Recommendations exclude anything already in the user's train row. Test
/// users outside the trained factor range are skipped.
pub fn evaluate(
    model: &FactorModel,
    train: &SparseMatrix,
    test: &SparseMatrix,
    k: usize,
) -> Result<RankingMetrics, ModelError> {
    let mut metrics = RankingMetrics {
        k,
        ..Default::default()
    };
    let (mut precision, mut map, mut ndcg) = (0.0, 0.0, 0.0);

    for user in 0..test.shape().0.min(model.n_users()) {
        let held_out = test.row(user);
        if held_out.nnz() == 0 {
            continue;
        }
        let relevant: HashSet<usize> = held_out.indices.iter().copied().collect();
        let ranked: Vec<usize> = model
            .recommend(user, train.row(user), k, true)?
            .into_iter()
            .map(|(item, _)| item)
            .collect();

        let (p, ap, n) = score_ranking(&ranked, &relevant, k);
        precision += p;
        map += ap;
        ndcg += n;
        metrics.users_evaluated += 1;
        metrics.test_interactions += relevant.len();
    }

    if metrics.users_evaluated > 0 {
        let users = metrics.users_evaluated as f64;
        metrics.precision = precision / users;
        metrics.map = map / users;
        metrics.ndcg = ndcg / users;
    }

    info!(
        k,
        precision = metrics.precision,
        map = metrics.map,
        ndcg = metrics.ndcg,
        users = metrics.users_evaluated,
        "Evaluation complete"
    );
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_score_ranking_perfect() {
        let relevant = HashSet::from([3, 5]);
        let (p, ap, ndcg) = score_ranking(&[3, 5, 1], &relevant, 3);
        assert_eq!(p, 1.0);
        assert_eq!(ap, 1.0);
        assert!((ndcg - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_ranking_partial() {
        let relevant = HashSet::from([2]);
        let (p, ap, ndcg) = score_ranking(&[0, 2], &relevant, 2);
        assert_eq!(p, 1.0);
        assert_eq!(ap, 0.5);
        assert!((ndcg - 1.0 / 3f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn test_score_ranking_miss() {
        let relevant = HashSet::from([9]);
        assert_eq!(score_ranking(&[0, 1], &relevant, 2), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_evaluate_skips_users_without_test_rows() {
        let model = FactorModel::new(
            array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            array![[3.0, 0.0], [2.0, 0.0], [0.0, 5.0]],
        )
        .unwrap();
        // user 0 has seen item 0, so its best unseen item is 1
        let train = SparseMatrix::from_triplets(3, 3, &[(0, 0, 1.0), (1, 2, 1.0)]).unwrap();
        let test = SparseMatrix::from_triplets(3, 3, &[(0, 1, 1.0), (1, 0, 1.0)]).unwrap();

        let metrics = evaluate(&model, &train, &test, 1).unwrap();
        assert_eq!(metrics.users_evaluated, 2);
        assert_eq!(metrics.test_interactions, 2);
        // user 0 hits, user 1 recommends item 1 (score 0) or item 0 (score 0): tie goes to index 0
        assert!((metrics.precision - 1.0).abs() < 1e-12);
        assert_eq!(metrics.to_map()["precision@1"], metrics.precision);
    }
}
