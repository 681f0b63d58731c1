use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Application configuration.
///
/// Sources are layered: built-in defaults, then an optional config file, then
/// environment variables with the `RECOMMENDER_` prefix. Nested values use a
/// double underscore, e.g. `RECOMMENDER_MODEL__FACTORS=64`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and artifact locations
    #[serde(default)]
    pub data: DataConfig,

    /// Cleaning, filtering and split parameters
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    /// ALS hyperparameters
    #[serde(default)]
    pub model: ModelConfig,

    /// Query engine tunables
    #[serde(default)]
    pub serving: ServingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Raw tab-separated listening log
    #[serde(default = "default_raw_data_path")]
    pub raw_data_path: PathBuf,

    /// Output directory for mappings, matrix and partitions
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    /// Output directory for factor matrices and metadata
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_data_path: default_raw_data_path(),
            processed_dir: default_processed_dir(),
            model_dir: default_model_dir(),
        }
    }
}

fn default_raw_data_path() -> PathBuf {
    PathBuf::from("data/raw/usersha1-artmbid-artname-plays.tsv")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Users with fewer surviving interactions are removed
    #[serde(default = "default_min_user_interactions")]
    pub min_user_interactions: usize,

    /// Artists with fewer surviving listeners are removed
    #[serde(default = "default_min_artist_listeners")]
    pub min_artist_listeners: usize,

    /// Confidence weight: `confidence = 1 + alpha * play_count`
    #[serde(default = "default_alpha")]
    pub alpha: u32,

    /// Fraction of each user's interactions held out for testing
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the per-user train/test sampling and solver initialisation
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            min_user_interactions: default_min_user_interactions(),
            min_artist_listeners: default_min_artist_listeners(),
            alpha: default_alpha(),
            test_size: default_test_size(),
            random_seed: default_random_seed(),
        }
    }
}

fn default_min_user_interactions() -> usize {
    5
}

fn default_min_artist_listeners() -> usize {
    3
}

fn default_alpha() -> u32 {
    40
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_seed() -> u64 {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Latent dimension F
    #[serde(default = "default_factors")]
    pub factors: usize,

    /// L2 regularization (lambda)
    #[serde(default = "default_regularization")]
    pub regularization: f32,

    /// Number of alternating sweeps
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Cutoff used for Precision/MAP/NDCG on the test split
    #[serde(default = "default_eval_k")]
    pub eval_k: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            factors: default_factors(),
            regularization: default_regularization(),
            iterations: default_iterations(),
            eval_k: default_eval_k(),
        }
    }
}

fn default_factors() -> usize {
    100
}

fn default_regularization() -> f32 {
    0.01
}

fn default_iterations() -> usize {
    15
}

fn default_eval_k() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// How many seed listeners stand in for a mood's audience.
    /// Tunable, not derived from the data.
    #[serde(default = "default_proxy_user_limit")]
    pub proxy_user_limit: usize,

    /// `k` used when a request does not specify one
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Upper bound for `k` on recommendation and similarity requests
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// `k` used by the charts endpoint when a request does not specify one
    #[serde(default = "default_chart_k")]
    pub default_chart_k: usize,

    /// Upper bound for `k` on the charts endpoint
    #[serde(default = "default_max_chart_k")]
    pub max_chart_k: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            proxy_user_limit: default_proxy_user_limit(),
            default_k: default_k(),
            max_k: default_max_k(),
            default_chart_k: default_chart_k(),
            max_chart_k: default_max_chart_k(),
        }
    }
}

fn default_proxy_user_limit() -> usize {
    50
}

fn default_k() -> usize {
    10
}

fn default_max_k() -> usize {
    50
}

fn default_chart_k() -> usize {
    20
}

fn default_max_chart_k() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl ServerConfig {
    /// Returns the socket address for binding the server.
    ///
    /// Falls back to all interfaces when `host` is not an IP literal.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self
            .host
            .parse::<IpAddr>()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port)
    }
}

impl AppConfig {
    /// Load configuration from an optional file and the environment.
    ///
    /// Environment variables should be prefixed with `RECOMMENDER_` and use
    /// double underscores for nested values:
    /// - `RECOMMENDER_PREPROCESSING__ALPHA` -> preprocessing.alpha
    /// - `RECOMMENDER_MODEL__FACTORS` -> model.factors
    /// - `RECOMMENDER_SERVER__PORT` -> server.port
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("RECOMMENDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline or query engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.preprocessing;
        if !(p.test_size > 0.0 && p.test_size < 1.0) {
            return Err(invalid(format!(
                "preprocessing.test_size must be in (0, 1), got {}",
                p.test_size
            )));
        }

        let m = &self.model;
        if m.factors == 0 {
            return Err(invalid("model.factors must be at least 1".to_string()));
        }
        if m.iterations == 0 {
            return Err(invalid("model.iterations must be at least 1".to_string()));
        }
        if !m.regularization.is_finite() || m.regularization <= 0.0 {
            return Err(invalid(format!(
                "model.regularization must be positive, got {}",
                m.regularization
            )));
        }
        if m.eval_k == 0 {
            return Err(invalid("model.eval_k must be at least 1".to_string()));
        }

        let s = &self.serving;
        if s.proxy_user_limit == 0 {
            return Err(invalid(
                "serving.proxy_user_limit must be at least 1".to_string(),
            ));
        }
        if s.default_k == 0 || s.default_k > s.max_k {
            return Err(invalid(format!(
                "serving.default_k must be in 1..={}, got {}",
                s.max_k, s.default_k
            )));
        }
        if s.default_chart_k == 0 || s.default_chart_k > s.max_chart_k {
            return Err(invalid(format!(
                "serving.default_chart_k must be in 1..={}, got {}",
                s.max_chart_k, s.default_chart_k
            )));
        }

        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Message(message)
}
