//! Implicit-feedback Alternating Least Squares.
//!
//! Follows Hu, Koren and Volinsky: every observed cell has preference 1 and
//! confidence `c`, unobserved cells have preference 0 and confidence 1. Each
//! half-step solves, per row,
//!
//! ```text
//! (YᵀY + Yᵀ(Cᵤ - I)Y + λI) xᵤ = YᵀCᵤp(u)
//! ```
//!
//! with `YᵀY` computed once per half-step so the per-row cost only depends on
//! that row's nonzeros.

use std::time::Instant;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::{AlsParams, FactorModel, Factorizer, ModelError};
use crate::preprocess::SparseMatrix;

/// ALS solver over a confidence matrix
#[derive(Debug, Clone)]
pub struct ImplicitAls {
    params: AlsParams,
}

impl ImplicitAls {
    pub fn new(params: AlsParams) -> Self {
        Self { params }
    }

    fn init_factors(rows: usize, factors: usize, rng: &mut StdRng) -> Array2<f32> {
        let scale = 0.01 / (factors as f32).sqrt();
        Array2::from_shape_fn((rows, factors), |_| rng.gen::<f32>() * scale)
    }

    /// Recompute every row of `target` from `fixed` and the rows of `matrix`.
    ///
    /// `matrix` has one row per row of `target` and one column per row of
    /// `fixed`.
    fn half_step(
        &self,
        matrix: &SparseMatrix,
        fixed: &Array2<f32>,
        target: &mut Array2<f32>,
    ) -> Result<(), ModelError> {
        let k = fixed.ncols();
        let lambda = f64::from(self.params.regularization);
        let gram = fixed.t().dot(fixed).mapv(f64::from);

        for r in 0..target.nrows() {
            let row = matrix.row(r);
            if row.nnz() == 0 {
                target.row_mut(r).fill(0.0);
                continue;
            }

            let mut a = gram.clone();
            let mut b = Array1::<f64>::zeros(k);
            for (col, confidence) in row.iter() {
                let y = fixed.row(col);
                let c = f64::from(confidence);
                for i in 0..k {
                    let yi = f64::from(y[i]);
                    b[i] += c * yi;
                    for j in 0..k {
                        a[[i, j]] += (c - 1.0) * yi * f64::from(y[j]);
                    }
                }
            }
            for i in 0..k {
                a[[i, i]] += lambda;
            }

            let x = cholesky_solve(a, &b).map_err(|e| ModelError::Solver(format!("row {r}: {e}")))?;
            for (dst, v) in target.row_mut(r).iter_mut().zip(x.iter()) {
                *dst = *v as f32;
            }
        }
        Ok(())
    }
}

impl Factorizer for ImplicitAls {
    fn fit(&self, item_users: &SparseMatrix) -> Result<FactorModel, ModelError> {
        let AlsParams {
            factors,
            iterations,
            seed,
            ..
        } = self.params;
        if factors == 0 {
            return Err(ModelError::Solver("factors must be positive".to_string()));
        }

        let user_items = item_users.transpose();
        let (n_items, n_users) = item_users.shape();
        info!(
            n_users,
            n_items,
            nnz = item_users.nnz(),
            factors,
            iterations,
            regularization = self.params.regularization,
            "Fitting implicit ALS"
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let mut user_factors = Self::init_factors(n_users, factors, &mut rng);
        let mut item_factors = Self::init_factors(n_items, factors, &mut rng);

        for iteration in 1..=iterations {
            let started = Instant::now();
            self.half_step(&user_items, &item_factors, &mut user_factors)?;
            self.half_step(item_users, &user_factors, &mut item_factors)?;
            debug!(
                iteration,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "ALS iteration complete"
            );
        }

        FactorModel::new(user_factors, item_factors)
    }
}

/// Solve `a x = b` for symmetric positive definite `a` via Cholesky.
pub fn cholesky_solve(a: Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, String> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(format!(
            "shape mismatch: a is {}x{}, b has {}",
            a.nrows(),
            a.ncols(),
            b.len()
        ));
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for p in 0..j {
                sum -= l[[i, p]] * l[[j, p]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err("matrix is not positive definite".to_string());
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for p in 0..i {
            sum -= l[[i, p]] * y[p];
        }
        y[i] = sum / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for p in (i + 1)..n {
            sum -= l[[p, i]] * x[p];
        }
        x[i] = sum / l[[i, i]];
    }
    Ok(x)
}
