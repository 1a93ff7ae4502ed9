//! Heart-disease risk estimation from two harmonized clinical datasets.
//!
//! The [`harmonize`](harmonize::harmonize) step maps a cardiovascular table
//! and a UCI-style heart table onto one eleven-field record; the
//! [`estimator`] trains a bagged tree ensemble on those records and turns ten
//! patient features into a risk percentage.

pub mod config;
pub mod error;
pub mod estimator;
pub mod harmonize;
pub mod io;
pub mod pipeline;
pub mod records;

pub use config::{ForestConfig, PipelineConfig};
pub use error::{Result, RiskError};
pub use estimator::{train, Estimator, Evaluation};
pub use harmonize::harmonize;
pub use records::{PatientFeatures, PatientRecord};
