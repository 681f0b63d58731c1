//! Preprocessing pipeline: raw listening log to sparse confidence matrix.
//!
//! Stages run in order and each one logs what it changed:
//!
//! 1. [`ingest`]: parse the tab-separated log and clean artist names
//! 2. [`dedup`]: merge repeated `(user, artist)` pairs
//! 3. [`filter`]: drop sparse users and artists until a fixed point
//! 4. [`feedback`]: attach implicit-feedback confidence
//! 5. [`split`]: per-user train/test partition
//! 6. [`matrix`]: ID mappings and the train matrix
//!
//! An empty dataset after filtering stops the run before anything is written.

pub mod artifacts;
pub mod dedup;
pub mod feedback;
pub mod filter;
pub mod ingest;
pub mod matrix;
pub mod split;

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{DataConfig, PreprocessingConfig};
use artifacts::STATS_FILE;
use filter::SparsityThresholds;
use ingest::{IngestError, RawLog};
use matrix::MatrixError;

pub use artifacts::{ArtifactError, ProcessedData};
pub use matrix::{IdMapping, SparseMatrix, SparseRow};

/// Errors that abort a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Dataset is empty after {stage}")]
    EmptyDataset { stage: &'static str },

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),
}

/// Counts collected over a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingStats {
    pub original_rows: usize,
    pub original_users: usize,
    pub original_artists: usize,
    pub rows_malformed: usize,
    pub rows_dropped_missing: usize,
    pub duplicates_removed: usize,
    pub users_after_filter: usize,
    pub artists_after_filter: usize,
    pub rows_after_filter: usize,
    pub filter_iterations: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub matrix_shape: (usize, usize),
    pub matrix_nnz: usize,
    pub matrix_sparsity: f64,
}

/// Runs the preprocessing stages and writes their artifacts
pub struct DataPreprocessor {
    raw_data_path: PathBuf,
    output_dir: PathBuf,
    params: PreprocessingConfig,
}

impl DataPreprocessor {
    pub fn new(data: &DataConfig, params: PreprocessingConfig) -> Self {
        Self {
            raw_data_path: data.raw_data_path.clone(),
            output_dir: data.processed_dir.clone(),
            params,
        }
    }

    /// Load, transform and persist.
    pub fn run_pipeline(&self) -> Result<PreprocessingStats, PipelineError> {
        info!(
            raw = %self.raw_data_path.display(),
            output = %self.output_dir.display(),
            "Starting preprocessing pipeline"
        );

        let log = ingest::load_raw_log(&self.raw_data_path)?;
        let (data, stats) = self.process(log)?;

        data.save(&self.output_dir)?;
        artifacts::write_json(&self.output_dir.join(STATS_FILE), &stats)?;

        info!(
            users = stats.users_after_filter,
            artists = stats.artists_after_filter,
            train = stats.train_rows,
            test = stats.test_rows,
            "Preprocessing complete"
        );
        Ok(stats)
    }

    /// Run every in-memory stage over an already parsed log.
    pub fn process(&self, log: RawLog) -> Result<(ProcessedData, PreprocessingStats), PipelineError> {
        self.validate()?;

        let mut stats = PreprocessingStats {
            original_rows: log.rows.len(),
            original_users: log.distinct_users(),
            original_artists: log.distinct_artists(),
            rows_malformed: log.malformed,
            ..Default::default()
        };
        info!(
            rows = stats.original_rows,
            users = stats.original_users,
            artists = stats.original_artists,
            "Raw dataset statistics"
        );

        let cleaned = ingest::clean(log.rows);
        stats.rows_dropped_missing = cleaned.dropped_missing;

        let deduped = dedup::deduplicate(cleaned.rows);
        stats.duplicates_removed = deduped.merged;

        let filtered = filter::filter_sparse(
            deduped.rows,
            SparsityThresholds {
                min_user_interactions: self.params.min_user_interactions,
                min_artist_listeners: self.params.min_artist_listeners,
            },
        );
        stats.filter_iterations = filtered.iterations;
        stats.rows_after_filter = filtered.rows.len();
        stats.users_after_filter = filtered
            .rows
            .iter()
            .map(|r| r.user_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        stats.artists_after_filter = filtered
            .rows
            .iter()
            .map(|r| r.artist_name.as_str())
            .collect::<HashSet<_>>()
            .len();

        if filtered.rows.is_empty() {
            warn!(
                min_user_interactions = self.params.min_user_interactions,
                min_artist_listeners = self.params.min_artist_listeners,
                "Sparsity filter removed every interaction"
            );
            return Err(PipelineError::EmptyDataset {
                stage: "sparsity filtering",
            });
        }

        let weighted = feedback::apply_confidence(filtered.rows, self.params.alpha);
        let (users, artists) = matrix::build_mappings(&weighted);

        let split = split::train_test_split(weighted, self.params.test_size, self.params.random_seed);
        stats.train_rows = split.train.len();
        stats.test_rows = split.test.len();

        let train_matrix = matrix::build_matrix(&split.train, &users, &artists)?;
        stats.matrix_shape = train_matrix.shape();
        stats.matrix_nnz = train_matrix.nnz();
        stats.matrix_sparsity = train_matrix.sparsity();

        let data = ProcessedData {
            train: split.train,
            test: split.test,
            users,
            artists,
            matrix: train_matrix,
        };
        Ok((data, stats))
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let ts = self.params.test_size;
        if !(ts > 0.0 && ts < 1.0) {
            return Err(PipelineError::Validation(format!(
                "test_size must be in (0, 1), got {ts}"
            )));
        }
        Ok(())
    }
}
