//! Persisted factor matrices and training metadata.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AlsParams, FactorModel, ModelError};
use crate::preprocess::artifacts::{read_bincode, read_json, write_bincode, write_json};

pub const USER_FACTORS_FILE: &str = "user_factors.bin";
pub const ITEM_FACTORS_FILE: &str = "item_factors.bin";
pub const METADATA_FILE: &str = "model_metadata.json";

/// What was trained, how, and how well it did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    pub n_users: usize,
    pub n_artists: usize,
    pub factors: usize,
    pub regularization: f32,
    pub iterations: usize,
    pub alpha: u32,
    pub training_time_seconds: f64,
    pub trained_at: DateTime<Utc>,
    /// Metric name to value, e.g. `precision@10`
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl ModelMetadata {
    pub fn new(model: &FactorModel, params: &AlsParams, training_time_seconds: f64) -> Self {
        Self {
            model_type: "ALS".to_string(),
            n_users: model.n_users(),
            n_artists: model.n_items(),
            factors: model.factors(),
            regularization: params.regularization,
            iterations: params.iterations,
            alpha: params.alpha,
            training_time_seconds,
            trained_at: Utc::now(),
            metrics: BTreeMap::new(),
        }
    }
}

pub fn save_model(dir: &Path, model: &FactorModel, metadata: &ModelMetadata) -> Result<(), ModelError> {
    write_bincode(&dir.join(USER_FACTORS_FILE), model.user_factors())?;
    write_bincode(&dir.join(ITEM_FACTORS_FILE), model.item_factors())?;
    write_json(&dir.join(METADATA_FILE), metadata)?;
    info!(
        dir = %dir.display(),
        n_users = model.n_users(),
        n_items = model.n_items(),
        "Saved model"
    );
    Ok(())
}

pub fn load_model(dir: &Path) -> Result<FactorModel, ModelError> {
    let user_factors: Array2<f32> = read_bincode(&dir.join(USER_FACTORS_FILE))?;
    let item_factors: Array2<f32> = read_bincode(&dir.join(ITEM_FACTORS_FILE))?;
    let model = FactorModel::new(user_factors, item_factors)?;
    info!(
        dir = %dir.display(),
        n_users = model.n_users(),
        n_items = model.n_items(),
        factors = model.factors(),
        "Loaded model"
    );
    Ok(model)
}

/// Metadata is informational; a missing file is not an error.
pub fn load_metadata(dir: &Path) -> Result<Option<ModelMetadata>, ModelError> {
    let path = dir.join(METADATA_FILE);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(read_json(&path)?))
}
