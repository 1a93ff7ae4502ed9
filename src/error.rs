use polars::prelude::PolarsError;
use smartcore::error::Failed;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("source {source_name:?} is missing required column {column:?}")]
    SchemaMismatch {
        source_name: &'static str,
        column: String,
    },
    #[error("source {source_name:?} has no rows")]
    EmptyDataset { source_name: &'static str },
    #[error("column {column:?} still has a missing value at row {row}")]
    MissingValue { column: &'static str, row: usize },
    #[error("expected {expected} features, got {found}")]
    FeatureCountMismatch { expected: usize, found: usize },
    #[error("estimator has not been trained")]
    NotTrained,
    #[error("estimator is already trained")]
    AlreadyTrained,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error("model error: {0}")]
    Model(#[from] Failed),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, RiskError>;
