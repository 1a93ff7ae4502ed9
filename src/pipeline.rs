//! End-to-end runs: sources to saved model, and batch scoring.

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use log::info;
use serde::Serialize;

use crate::config::{ForestConfig, PipelineConfig};
use crate::error::Result;
use crate::estimator::{self, Estimator, Evaluation};
use crate::harmonize::{harmonize, records_to_frame};
use crate::io::{read_source, write_table};
use crate::records::{PatientFeatures, CARDIO_SOURCE, HEART_SOURCE};

/// Sample patient scored after every training run.
pub fn reference_patient() -> PatientFeatures {
    PatientFeatures {
        age: 55.0,
        sex: 1.0,
        bp: 140.0,
        chol: 230.0,
        sugar: 1.0,
        ecg: 1.0,
        heartrate: 150.0,
        exercise: 1.0,
        smoking: Some(1.0),
        alcohol: Some(0.0),
    }
}

#[derive(Debug)]
pub struct TrainingReport {
    pub estimator: Estimator,
    pub evaluation: Evaluation,
    pub records: usize,
}

/// Reads both sources, harmonizes them, trains and saves the estimator.
pub fn run_training(config: &PipelineConfig, forest: &ForestConfig) -> Result<TrainingReport> {
    let start = Instant::now();
    let cardio = read_source(&config.cardio_path, &CARDIO_SOURCE)?;
    let heart = read_source(&config.heart_path, &HEART_SOURCE)?;

    let records = harmonize(&cardio, &heart)?;
    if let Some(export_path) = &config.export_path {
        let mut frame = records_to_frame(&records)?;
        write_table(export_path, &mut frame)?;
        info!("harmonized table written to {}", export_path.display());
    }

    let (estimator, evaluation) = estimator::train(&records, forest)?;
    estimator.save(&config.model_path)?;
    info!("training run finished in {:?}", start.elapsed());

    Ok(TrainingReport {
        estimator,
        evaluation,
        records: records.len(),
    })
}

#[derive(Debug, Serialize)]
struct ScoredRow {
    age: f64,
    sex: f64,
    bp: f64,
    chol: f64,
    sugar: f64,
    ecg: f64,
    heartrate: f64,
    exercise: f64,
    smoking: f64,
    alcohol: f64,
    risk_percent: f64,
}

/// Scores every row of an encoded patient CSV, writing the inputs back out
/// with their `risk_percent`. Returns the number of rows scored.
pub fn score_csv<P: AsRef<Path>, Q: AsRef<Path>>(estimator: &Estimator, input: P, output: Q) -> Result<usize> {
    let mut reader = csv::Reader::from_path(input.as_ref())?;
    let mut writer = csv::Writer::from_writer(File::create(output.as_ref())?);

    let mut scored = 0;
    for row in reader.deserialize() {
        let patient: PatientFeatures = row?;
        let risk_percent = estimator.predict(&patient)?;
        writer.serialize(ScoredRow {
            age: patient.age,
            sex: patient.sex,
            bp: patient.bp,
            chol: patient.chol,
            sugar: patient.sugar,
            ecg: patient.ecg,
            heartrate: patient.heartrate,
            exercise: patient.exercise,
            smoking: patient.smoking.unwrap_or(0.0),
            alcohol: patient.alcohol.unwrap_or(0.0),
            risk_percent,
        })?;
        scored += 1;
    }
    writer.flush()?;

    info!(
        "scored {} patients from {} into {}",
        scored,
        input.as_ref().display(),
        output.as_ref().display()
    );
    Ok(scored)
}
