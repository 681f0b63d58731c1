//! Music Recommender
//!
//! Collaborative-filtering artist recommendations from implicit listening
//! data. The crate covers the whole lifecycle: a preprocessing pipeline that
//! turns a raw play-count log into a sparse confidence matrix, an implicit
//! ALS trainer, and a read-only query engine served over HTTP.

pub mod config;
pub mod error;
pub mod math;
pub mod model;
pub mod mood;
pub mod preprocess;
pub mod recommend;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use model::{FactorModel, Trainer};
pub use preprocess::DataPreprocessor;
pub use recommend::{RecommendError, RecommenderService};
