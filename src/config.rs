//! Configuration module for the retrieval engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CS_` and use double underscores
//! to separate nested levels:
//! - `CS_CLUSTERING__PARTITION_COUNT=4` sets `clustering.partition_count`
//! - `CS_CLUSTERING__MODE=density` sets `clustering.mode`
//! - `CS_SEARCH__THRESHOLD=0.05` sets `search.threshold`

use crate::engine::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::vector::{ClusterAggregation, ClusteringMode, KMeansOptions};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-workspace configuration directory.
pub const CONFIG_DIR: &str = ".clusearch";

const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Directory of normalized `.txt` documents
    #[serde(default = "default_documents_path")]
    pub documents_path: PathBuf,

    /// Workspace root directory (where .clusearch is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub recommend: RecommendConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// Which clustering strategy the engine runs.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringStrategy {
    #[default]
    Partition,
    Density,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusteringConfig {
    #[serde(default)]
    pub mode: ClusteringStrategy,

    /// Target cluster count for partition mode
    #[serde(default = "default_partition_count")]
    pub partition_count: usize,

    /// Neighbourhood radius in cosine distance for density mode
    #[serde(default = "default_density_eps")]
    pub density_eps: f32,

    /// Minimum neighbour count of a core point in density mode
    #[serde(default = "default_density_min_points")]
    pub density_min_points: usize,

    /// Seed for K-means++ initialization
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Independent K-means runs; the lowest inertia wins
    #[serde(default = "default_restarts")]
    pub restarts: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Minimum similarity of a returned document
    #[serde(default = "default_search_threshold")]
    pub threshold: f32,

    /// How member similarities combine into a cluster score
    #[serde(default)]
    pub aggregation: ClusterAggregation,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecommendConfig {
    #[serde(default = "default_recommend_threshold")]
    pub threshold: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EvaluationConfig {
    /// Cutoff for NDCG
    #[serde(default = "default_ndcg_k")]
    pub ndcg_k: usize,
}

fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_documents_path() -> PathBuf {
    PathBuf::from("processed_files")
}
fn default_partition_count() -> usize {
    6
}
fn default_density_eps() -> f32 {
    0.5
}
fn default_density_min_points() -> usize {
    2
}
fn default_seed() -> u64 {
    KMeansOptions::default().seed
}
fn default_max_iterations() -> usize {
    KMeansOptions::default().max_iterations
}
fn default_restarts() -> usize {
    KMeansOptions::default().restarts
}
fn default_search_threshold() -> f32 {
    0.02
}
fn default_recommend_threshold() -> f32 {
    0.1
}
fn default_ndcg_k() -> usize {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: default_false(),
            documents_path: default_documents_path(),
            workspace_root: None,
            clustering: ClusteringConfig::default(),
            search: SearchConfig::default(),
            recommend: RecommendConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            mode: ClusteringStrategy::default(),
            partition_count: default_partition_count(),
            density_eps: default_density_eps(),
            density_min_points: default_density_min_points(),
            seed: default_seed(),
            max_iterations: default_max_iterations(),
            restarts: default_restarts(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: default_search_threshold(),
            aggregation: ClusterAggregation::default(),
        }
    }
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            threshold: default_recommend_threshold(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            ndcg_k: default_ndcg_k(),
        }
    }
}

/// Checks that a threshold lies in [0, 1].
pub(crate) fn validate_threshold(parameter: &'static str, value: f32) -> EngineResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::InvalidConfiguration {
            parameter,
            reason: format!("must be between 0 and 1, got {value}"),
        })
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .clusearch directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| Path::new(CONFIG_DIR).join(CONFIG_FILE));

        Self::figment(config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                // If workspace_root is not set in config, detect it
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: impl AsRef<Path>) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path.as_ref()))
            // Double underscore (__) separates nested levels, single
            // underscore stays part of the field name
            .merge(Env::prefixed("CS_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Find the workspace config by looking for a .clusearch directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .clusearch is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| Path::new(CONFIG_DIR).join(CONFIG_FILE));

        if !config_path.exists() {
            return Err("No configuration file found".to_string());
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Cannot read configuration file: {e}"))?;
        toml::from_str::<Settings>(&content).map_err(|e| {
            format!(
                "Configuration file is corrupted: {e}\nRun 'clusearch init --force' to regenerate."
            )
        })?;

        Ok(())
    }

    /// Documents directory, resolved against the workspace root when relative.
    pub fn resolved_documents_path(&self) -> PathBuf {
        match &self.workspace_root {
            Some(root) if self.documents_path.is_relative() => root.join(&self.documents_path),
            _ => self.documents_path.clone(),
        }
    }

    /// Checks every option against its allowed range.
    pub fn validate(&self) -> EngineResult<()> {
        self.clustering_mode().validate()?;

        if self.clustering.restarts < 1 {
            return Err(EngineError::InvalidConfiguration {
                parameter: "restarts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.clustering.max_iterations < 1 {
            return Err(EngineError::InvalidConfiguration {
                parameter: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        validate_threshold("search.threshold", self.search.threshold)?;
        validate_threshold("recommend.threshold", self.recommend.threshold)?;
        if self.evaluation.ndcg_k < 1 {
            return Err(EngineError::InvalidConfiguration {
                parameter: "ndcg_k",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// The active clustering strategy with its parameters.
    pub fn clustering_mode(&self) -> ClusteringMode {
        match self.clustering.mode {
            ClusteringStrategy::Partition => ClusteringMode::Partition {
                k: self.clustering.partition_count,
            },
            ClusteringStrategy::Density => ClusteringMode::Density {
                eps: self.clustering.density_eps,
                min_points: self.clustering.density_min_points,
            },
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_at(Path::new(CONFIG_DIR).join(CONFIG_FILE), force)
    }

    /// Create a default settings file with helpful comments at `config_path`
    pub fn init_config_file_at(
        config_path: impl Into<PathBuf>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = config_path.into();

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let defaults = Settings::default();
        let template = format!(
            r#"# clusearch configuration file

# Version of the configuration schema
version = {version}

# Global debug mode (same as --verbose)
debug = false

# Directory of normalized .txt documents (relative to workspace root)
documents_path = "{documents}"

[clustering]
# "partition" (K-means, every document clustered) or
# "density" (DBSCAN, outliers become noise)
mode = "partition"

# Target number of clusters in partition mode.
# Small corpora get max(2, documents / 2) instead.
partition_count = {partition_count}

# Density mode: neighbourhood radius in cosine distance (1 - similarity)
density_eps = {eps}

# Density mode: other documents needed within density_eps for a core point
density_min_points = {min_points}

# K-means++ seed, iteration cap and number of restarts
seed = {seed}
max_iterations = {max_iterations}
restarts = {restarts}

[search]
# Minimum cosine similarity of a search result (0.0 - 1.0)
threshold = {search_threshold}

# How the best cluster is chosen: "mean" or "sum" of member similarities
aggregation = "mean"

[recommend]
# Minimum cosine similarity of a recommendation (0.0 - 1.0)
threshold = {recommend_threshold}

[evaluation]
# Cutoff for NDCG
ndcg_k = {ndcg_k}
"#,
            version = defaults.version,
            documents = defaults.documents_path.display(),
            partition_count = defaults.clustering.partition_count,
            eps = defaults.clustering.density_eps,
            min_points = defaults.clustering.density_min_points,
            seed = defaults.clustering.seed,
            max_iterations = defaults.clustering.max_iterations,
            restarts = defaults.clustering.restarts,
            search_threshold = defaults.search.threshold,
            recommend_threshold = defaults.recommend.threshold,
            ndcg_k = defaults.evaluation.ndcg_k,
        );

        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}

impl TryFrom<&Settings> for EngineConfig {
    type Error = EngineError;

    fn try_from(settings: &Settings) -> EngineResult<Self> {
        settings.validate()?;
        Ok(EngineConfig {
            mode: settings.clustering_mode(),
            kmeans: KMeansOptions {
                seed: settings.clustering.seed,
                max_iterations: settings.clustering.max_iterations,
                restarts: settings.clustering.restarts,
            },
            search_threshold: settings.search.threshold,
            recommend_threshold: settings.recommend.threshold,
            ndcg_k: settings.evaluation.ndcg_k,
            aggregation: settings.search.aggregation,
        })
    }
}
