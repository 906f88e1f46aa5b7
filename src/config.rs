//! Check-run configuration, loadable from a JSON file.
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::fold::FoldOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at JSON path {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown codec {name:?}")]
    UnknownCodec { name: String },

    #[error("max_depth {requested} is above the supported ceiling of {ceiling}")]
    DepthLimit { requested: usize, ceiling: usize },
}

pub const DEFAULT_SIZES: [usize; 5] = [1, 10, 100, 1_000, 10_000];

pub const DEFAULT_GENERATOR_SEED: u64 = 0x5eed;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    /// Size budgets to generate trees for.
    pub sizes: Vec<usize>,
    /// Generator seed, shared by every size.
    pub seed: u64,
    /// Codec names to run. Empty means every registered codec.
    pub codecs: Vec<String>,
    pub fold: FoldOptions,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_SIZES.to_vec(),
            seed: DEFAULT_GENERATOR_SEED,
            codecs: Vec::new(),
            fold: FoldOptions::default(),
        }
    }
}

impl CheckConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = from_slice_with_path(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Every named codec must be registered and the fold limits supported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = self.codecs.iter().find(|name| crate::codec::by_name(name).is_none()) {
            return Err(ConfigError::UnknownCodec { name: name.clone() });
        }
        self.fold.validate()
    }
}

/// Deserialize with JSON-path context in error messages.
pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ConfigError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| ConfigError::Invalid {
        path: err.path().to_string(),
        source: err.into_inner(),
    })
}
