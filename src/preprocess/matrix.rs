//! ID mappings and the sparse user x artist confidence matrix.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use tracing::info;

use crate::types::ConfidenceInteraction;

/// Errors raised while placing interactions into the matrix
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("No index for {kind} '{key}'")]
    UnknownKey { kind: &'static str, key: String },

    #[error("Index ({row}, {col}) outside matrix shape ({rows}, {cols})")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// Bijection between raw identifiers and dense zero-based indices.
///
/// Indices are assigned in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    index: HashMap<String, usize>,
    keys: Vec<String>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the key's index, assigning the next one if it is new.
    pub fn insert(&mut self, key: &str) -> usize {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.keys.len();
        self.index.insert(key.to_string(), idx);
        self.keys.push(key.to_string());
        idx
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Reverse lookup
    pub fn key(&self, idx: usize) -> Option<&str> {
        self.keys.get(idx).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Flat `key -> index` view, the persisted form
    pub fn to_map(&self) -> HashMap<String, usize> {
        self.index.clone()
    }

    /// Rebuild from a persisted `key -> index` map.
    ///
    /// Returns `None` unless the indices are exactly `0..len`.
    pub fn from_map(map: HashMap<String, usize>) -> Option<Self> {
        let mut keys = vec![None; map.len()];
        for (key, &idx) in &map {
            let slot = keys.get_mut(idx)?;
            if slot.is_some() {
                return None;
            }
            *slot = Some(key.clone());
        }
        let keys = keys.into_iter().collect::<Option<Vec<_>>>()?;
        Some(Self { index: map, keys })
    }
}

/// Nonzero entries of one matrix row
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub indices: &'a [usize],
    pub values: &'a [f32],
}

impl SparseRow<'_> {
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Whether column `col` holds a nonzero value
    pub fn contains(&self, col: usize) -> bool {
        self.indices
            .binary_search(&col)
            .map(|pos| self.values[pos] != 0.0)
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

/// Compressed sparse row matrix of `f32` values.
///
/// Column indices within a row are sorted and unique. The matrix is never
/// densified.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    inner: CsMat<f32>,
}

/// Coordinate form used for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triplets {
    pub shape: (usize, usize),
    pub row: Vec<usize>,
    pub col: Vec<usize>,
    pub value: Vec<f32>,
}

impl SparseMatrix {
    /// Build from `(row, col, value)` entries; duplicate coordinates are summed.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        entries: &[(usize, usize, f32)],
    ) -> Result<Self, MatrixError> {
        let mut tri = TriMat::with_capacity((rows, cols), entries.len());
        for &(row, col, value) in entries {
            if row >= rows || col >= cols {
                return Err(MatrixError::IndexOutOfRange {
                    row,
                    col,
                    rows,
                    cols,
                });
            }
            tri.add_triplet(row, col, value);
        }
        Ok(Self {
            inner: tri.to_csr(),
        })
    }

    /// An all-zero matrix of the given shape
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            inner: CsMat::zero((rows, cols)),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    /// Fraction of cells without an entry
    pub fn sparsity(&self) -> f64 {
        let (rows, cols) = self.shape();
        let cells = rows as f64 * cols as f64;
        if cells == 0.0 {
            return 1.0;
        }
        1.0 - self.nnz() as f64 / cells
    }

    /// Row view; out-of-range rows read as empty.
    pub fn row(&self, r: usize) -> SparseRow<'_> {
        if r >= self.inner.rows() {
            return SparseRow {
                indices: &[],
                values: &[],
            };
        }
        let range = self.inner.indptr().outer_inds_sz(r);
        SparseRow {
            indices: &self.inner.indices()[range.clone()],
            values: &self.inner.data()[range],
        }
    }

    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.inner.get(r, c).copied().unwrap_or(0.0)
    }

    /// Transposed copy, still in row-major storage.
    pub fn transpose(&self) -> Self {
        Self {
            inner: self.inner.transpose_view().to_csr(),
        }
    }

    pub fn to_triplets(&self) -> Triplets {
        let mut t = Triplets {
            shape: self.shape(),
            row: Vec::with_capacity(self.nnz()),
            col: Vec::with_capacity(self.nnz()),
            value: Vec::with_capacity(self.nnz()),
        };
        for (r, row) in self.inner.outer_iterator().enumerate() {
            for (c, &v) in row.iter() {
                t.row.push(r);
                t.col.push(c);
                t.value.push(v);
            }
        }
        t
    }

    pub fn from_coo(t: &Triplets) -> Result<Self, MatrixError> {
        let entries: Vec<(usize, usize, f32)> = t
            .row
            .iter()
            .zip(&t.col)
            .zip(&t.value)
            .map(|((&r, &c), &v)| (r, c, v))
            .collect();
        Self::from_triplets(t.shape.0, t.shape.1, &entries)
    }
}

/// Build user and artist mappings from every filtered interaction.
///
/// Both partitions share this coordinate space; indices follow first
/// appearance in `rows`.
pub fn build_mappings(rows: &[ConfidenceInteraction]) -> (IdMapping, IdMapping) {
    let mut users = IdMapping::new();
    let mut artists = IdMapping::new();
    for row in rows {
        users.insert(&row.user_id);
        artists.insert(&row.artist_name);
    }
    info!(
        users = users.len(),
        artists = artists.len(),
        "Created ID mappings"
    );
    (users, artists)
}

/// Build the user x artist confidence matrix from `rows`.
///
/// The shape is always `(users.len(), artists.len())`, however few rows
/// there are.
pub fn build_matrix(
    rows: &[ConfidenceInteraction],
    users: &IdMapping,
    artists: &IdMapping,
) -> Result<SparseMatrix, MatrixError> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let u = users.get(&row.user_id).ok_or_else(|| MatrixError::UnknownKey {
            kind: "user",
            key: row.user_id.clone(),
        })?;
        let a = artists
            .get(&row.artist_name)
            .ok_or_else(|| MatrixError::UnknownKey {
                kind: "artist",
                key: row.artist_name.clone(),
            })?;
        entries.push((u, a, row.confidence as f32));
    }

    let matrix = SparseMatrix::from_triplets(users.len(), artists.len(), &entries)?;
    info!(
        shape = ?matrix.shape(),
        nnz = matrix.nnz(),
        sparsity = matrix.sparsity(),
        "Created sparse user-item matrix"
    );
    Ok(matrix)
}
