//! Training pipeline: load processed data, fit, evaluate, save.

use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use super::artifacts::{save_model, ModelMetadata};
use super::evaluate::evaluate;
use super::{AlsParams, Factorizer, ImplicitAls, ModelError};
use crate::config::{DataConfig, ModelConfig, PreprocessingConfig};
use crate::preprocess::matrix::build_matrix;
use crate::preprocess::ProcessedData;

pub struct Trainer {
    processed_dir: PathBuf,
    model_dir: PathBuf,
    params: AlsParams,
    eval_k: usize,
}

impl Trainer {
    pub fn new(data: &DataConfig, preprocessing: &PreprocessingConfig, model: &ModelConfig) -> Self {
        Self {
            processed_dir: data.processed_dir.clone(),
            model_dir: data.model_dir.clone(),
            params: AlsParams {
                factors: model.factors,
                regularization: model.regularization,
                iterations: model.iterations,
                alpha: preprocessing.alpha,
                seed: preprocessing.random_seed,
            },
            eval_k: model.eval_k,
        }
    }

    pub fn run_training_pipeline(&self) -> Result<ModelMetadata, ModelError> {
        let data = ProcessedData::load(&self.processed_dir)?;
        let metadata = self.train(&data, &ImplicitAls::new(self.params))?;
        Ok(metadata)
    }

    /// Fit with `factorizer`, evaluate on the test split and persist.
    pub fn train<F: Factorizer>(
        &self,
        data: &ProcessedData,
        factorizer: &F,
    ) -> Result<ModelMetadata, ModelError> {
        let item_users = data.matrix.transpose();

        let started = Instant::now();
        let model = factorizer.fit(&item_users)?;
        let training_time = started.elapsed().as_secs_f64();
        info!(
            seconds = training_time,
            n_users = model.n_users(),
            n_items = model.n_items(),
            "Training complete"
        );

        let test_matrix = build_matrix(&data.test, &data.users, &data.artists)?;
        let metrics = evaluate(&model, &data.matrix, &test_matrix, self.eval_k)?;

        let mut metadata = ModelMetadata::new(&model, &self.params, training_time);
        metadata.metrics = metrics.to_map();

        save_model(&self.model_dir, &model, &metadata)?;
        Ok(metadata)
    }
}
