//! Serializable pipeline configuration.
//!
//! One TOML document configures every stage; each section has defaults so a
//! partial file (or none at all) yields a working pipeline.

use farsight_core::features::FeatureSpec;
use farsight_core::models::{BlendConfig, ResidualConfig, ScenarioConfig, TrendConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Data gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub cache_dir: PathBuf,
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data"),
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

/// Full pipeline configuration: one section per stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Master seed for the deterministic RNG hierarchy.
    pub seed: u64,
    pub data: DataConfig,
    pub features: FeatureSpec,
    pub trend: TrendConfig,
    pub residual: ResidualConfig,
    pub blend: BlendConfig,
    pub scenario: ScenarioConfig,
}

impl PipelineConfig {
    /// Load from a TOML file; missing sections fall back to defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_reasonable() {
        let config = PipelineConfig::default();
        assert_eq!(config.residual.sequence_length, 60);
        assert_eq!(config.scenario.n_paths, 2000);
        assert_eq!(config.scenario.threshold_days, 756);
        assert_eq!(config.trend.min_observations, 90);
        assert_eq!(config.data.max_retries, 3);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            seed = 7

            [scenario]
            n_paths = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.scenario.n_paths, 500);
        // untouched sections keep defaults
        assert_eq!(config.scenario.threshold_days, 756);
        assert_eq!(config.residual.hidden_size, 16);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = PipelineConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.seed, config.seed);
        assert_eq!(back.features.sma_windows, config.features.sma_windows);
    }
}
