//! Collection configuration.
//!
//! Configuration is plain serde data with defaults, so it can be built in code
//! or loaded from JSON:
//!
//! ```
//! use halberd::collection::CollectionConfig;
//! use halberd::vector::DistanceMetric;
//!
//! let config: CollectionConfig = serde_json::from_str(
//!     r#"{"name": "smart_home", "dimension": 384, "metric": "cosine", "index": {"nlist": 128}}"#,
//! ).unwrap();
//! assert_eq!(config.metric, DistanceMetric::Cosine);
//! assert_eq!(config.index.max_iterations, 25);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HalberdError, Result};
use crate::index::IvfBuildConfig;
use crate::vector::DistanceMetric;

/// Default collection name.
pub const DEFAULT_COLLECTION_NAME: &str = "default";
/// Default vector dimension (the output size of common MiniLM sentence
/// embedders).
pub const DEFAULT_DIMENSION: usize = 384;

/// Configuration for a single vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub name: String,
    /// Length of every vector stored in the collection.
    pub dimension: usize,
    pub metric: DistanceMetric,
    /// Parameters used by [`Collection::build_index`](super::Collection::build_index).
    pub index: IvfBuildConfig,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COLLECTION_NAME.to_string(),
            dimension: DEFAULT_DIMENSION,
            metric: DistanceMetric::default(),
            index: IvfBuildConfig::default(),
        }
    }
}

impl CollectionConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_index(mut self, index: IvfBuildConfig) -> Self {
        self.index = index;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(HalberdError::invalid_argument("dimension must be at least 1"));
        }
        self.index.validate()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CollectionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
