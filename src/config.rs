//! Paths and hyperparameters for the training pipeline.

use std::path::PathBuf;

use crate::error::{Result, RiskError};

pub static CARDIO_FILE_NAME: &str = "cardio_train.csv";
pub static HEART_FILE_NAME: &str = "heart.csv";
pub static MODEL_FILE_NAME: &str = "heart_rf_model.json";

/// Where the pipeline reads its sources and writes its outputs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cardio_path: PathBuf,
    pub heart_path: PathBuf,
    pub model_path: PathBuf,
    /// Optional dump of the harmonized table (`.parquet` or `.csv`)
    pub export_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cardio_path: PathBuf::from(CARDIO_FILE_NAME),
            heart_path: PathBuf::from(HEART_FILE_NAME),
            model_path: PathBuf::from(MODEL_FILE_NAME),
            export_path: None,
        }
    }
}

/// Ensemble hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig {
    /// Number of bagged trees (default: 300)
    pub n_trees: usize,

    /// Depth cap of every tree (default: 10)
    pub max_depth: u16,

    /// Seed shared by the split and the bootstrap sampler (default: 42)
    pub seed: u64,

    /// Share of each class held out for evaluation (default: 0.2)
    pub test_fraction: f64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 300,
            max_depth: 10,
            seed: 42,
            test_fraction: 0.2,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(RiskError::InvalidConfig("n_trees must be positive".to_string()));
        }
        if self.max_depth == 0 {
            return Err(RiskError::InvalidConfig("max_depth must be positive".to_string()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(RiskError::InvalidConfig(format!(
                "test_fraction must lie in (0, 1), got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }
}
