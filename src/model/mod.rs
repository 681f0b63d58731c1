//! Factor model: training, persistence and the `recommend` capability.
//!
//! The solver only ever sees the train matrix oriented item x user and hands
//! back a [`FactorModel`]. Everything downstream treats the factors as
//! read-only.

pub mod als;
pub mod artifacts;
pub mod evaluate;
pub mod trainer;

use ndarray::{Array2, ArrayView1};

use crate::math;
use crate::preprocess::{ArtifactError, SparseMatrix, SparseRow};
use crate::preprocess::matrix::MatrixError;

pub use als::ImplicitAls;
pub use artifacts::ModelMetadata;
pub use trainer::Trainer;

/// Errors from fitting, loading or querying a factor model
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Solver failed: {0}")]
    Solver(String),

    #[error("Factor dimensions differ: users have {user}, items have {item}")]
    DimensionMismatch { user: usize, item: usize },

    #[error("{kind} index {index} outside trained range 0..{len}")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),
}

/// Hyperparameters for implicit-feedback ALS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlsParams {
    pub factors: usize,
    pub regularization: f32,
    pub iterations: usize,
    /// Only recorded; the matrix already carries `1 + alpha * plays`
    pub alpha: u32,
    pub seed: u64,
}

impl Default for AlsParams {
    fn default() -> Self {
        Self {
            factors: 100,
            regularization: 0.01,
            iterations: 15,
            alpha: 40,
            seed: 42,
        }
    }
}

/// Something that can factorize an item x user confidence matrix
pub trait Factorizer {
    fn fit(&self, item_users: &SparseMatrix) -> Result<FactorModel, ModelError>;
}

/// Dense user and item factor matrices sharing one latent dimension
#[derive(Debug, Clone, PartialEq)]
pub struct FactorModel {
    user_factors: Array2<f32>,
    item_factors: Array2<f32>,
}

impl FactorModel {
    pub fn new(user_factors: Array2<f32>, item_factors: Array2<f32>) -> Result<Self, ModelError> {
        if user_factors.ncols() != item_factors.ncols() {
            return Err(ModelError::DimensionMismatch {
                user: user_factors.ncols(),
                item: item_factors.ncols(),
            });
        }
        Ok(Self {
            user_factors,
            item_factors,
        })
    }

    pub fn n_users(&self) -> usize {
        self.user_factors.nrows()
    }

    pub fn n_items(&self) -> usize {
        self.item_factors.nrows()
    }

    pub fn factors(&self) -> usize {
        self.item_factors.ncols()
    }

    pub fn user_factors(&self) -> &Array2<f32> {
        &self.user_factors
    }

    pub fn item_factors(&self) -> &Array2<f32> {
        &self.item_factors
    }

    pub fn user_vector(&self, user: usize) -> Option<ArrayView1<'_, f32>> {
        (user < self.n_users()).then(|| self.user_factors.row(user))
    }

    pub fn item_vector(&self, item: usize) -> Option<ArrayView1<'_, f32>> {
        (item < self.n_items()).then(|| self.item_factors.row(item))
    }

    /// Top `n` items for a user, highest score first.
    ///
    /// Scores are dot products of factor vectors. With `exclude_seen`, every
    /// item holding a nonzero value in `seen` is skipped.
    pub fn recommend(
        &self,
        user: usize,
        seen: SparseRow<'_>,
        n: usize,
        exclude_seen: bool,
    ) -> Result<Vec<(usize, f32)>, ModelError> {
        let user_vec = self.user_vector(user).ok_or(ModelError::IndexOutOfRange {
            kind: "user",
            index: user,
            len: self.n_users(),
        })?;

        let scores = self.item_factors.dot(&user_vec);
        let candidates: Vec<(usize, f32)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(item, _)| !(exclude_seen && seen.contains(*item)))
            .collect();

        Ok(math::top_k(candidates, n))
    }

    /// Top `n` items by cosine similarity to `item`, never including `item`.
    pub fn similar_items(&self, item: usize, n: usize) -> Result<Vec<(usize, f32)>, ModelError> {
        let query = self.item_vector(item).ok_or(ModelError::IndexOutOfRange {
            kind: "item",
            index: item,
            len: self.n_items(),
        })?;

        let candidates: Vec<(usize, f32)> = self
            .item_factors
            .outer_iter()
            .enumerate()
            .filter(|(other, _)| *other != item)
            .map(|(other, vec)| (other, math::cosine_similarity(query, vec)))
            .collect();

        Ok(math::top_k(candidates, n))
    }
}
