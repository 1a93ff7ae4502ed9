//! Command line surface. Turns human answers (Male/Female, Yes/No, mg/dl)
//! into the encoded features the estimator expects.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use heart_risk::config::{CARDIO_FILE_NAME, HEART_FILE_NAME, MODEL_FILE_NAME};
use heart_risk::PatientFeatures;

/// Fasting blood sugar above this (mg/dl) counts as elevated.
const FASTING_SUGAR_THRESHOLD: f64 = 120.0;

/// Risk percentage above which a patient is reported as high risk.
const HIGH_RISK_PERCENT: f64 = 50.0;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Verbose level")]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Harmonize both datasets, train the estimator and save it
    Train(TrainArgs),
    /// Estimate the risk of one patient with a saved estimator
    Predict(PredictArgs),
    /// Score a CSV of encoded patients with a saved estimator
    Score(ScoreArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value = CARDIO_FILE_NAME, help = "Cardiovascular dataset (';' separated)")]
    pub cardio: PathBuf,
    #[arg(long, default_value = HEART_FILE_NAME, help = "Heart disease dataset")]
    pub heart: PathBuf,
    #[arg(short, long, default_value = MODEL_FILE_NAME, help = "Where to save the model")]
    pub model: PathBuf,
    #[arg(short, long, help = "Also write the harmonized table (.parquet or .csv)")]
    pub export: Option<PathBuf>,
    #[arg(long, default_value_t = 300, help = "Number of trees")]
    pub trees: usize,
    #[arg(long, default_value_t = 10, help = "Maximum tree depth")]
    pub max_depth: u16,
    #[arg(long, default_value_t = 42, help = "Random seed for the split and the bootstrap")]
    pub seed: u64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum)]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum)]
pub enum Ecg {
    Normal,
    Abnormal,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(short, long, default_value = MODEL_FILE_NAME, help = "Saved model")]
    pub model: PathBuf,
    #[arg(long, help = "Age in years")]
    pub age: f64,
    #[arg(long, value_enum)]
    pub sex: Sex,
    #[arg(long, help = "Resting blood pressure (mm Hg)")]
    pub bp: f64,
    #[arg(long, help = "Serum cholesterol (mg/dl)")]
    pub chol: f64,
    #[arg(long, help = "Fasting blood sugar (mg/dl)")]
    pub fasting_sugar: f64,
    #[arg(long, help = "Max heart rate achieved")]
    pub max_heart_rate: f64,
    #[arg(long, value_enum, default_value_t = Ecg::Normal, help = "Resting ECG")]
    pub ecg: Ecg,
    #[arg(long, help = "Exercises regularly")]
    pub exercise: bool,
    #[arg(long, help = "Current smoker")]
    pub smoking: bool,
    #[arg(long, help = "Regular alcohol intake")]
    pub alcohol: bool,
}

fn flag(set: bool) -> f64 {
    if set {
        1.0
    } else {
        0.0
    }
}

impl PredictArgs {
    pub fn patient(&self) -> PatientFeatures {
        PatientFeatures {
            age: self.age,
            sex: flag(self.sex == Sex::Male),
            bp: self.bp,
            chol: self.chol,
            sugar: flag(self.fasting_sugar > FASTING_SUGAR_THRESHOLD),
            ecg: flag(self.ecg == Ecg::Abnormal),
            heartrate: self.max_heart_rate,
            exercise: flag(self.exercise),
            // lifestyle answers are optional; unanswered counts as "No"
            smoking: self.smoking.then_some(1.0),
            alcohol: self.alcohol.then_some(1.0),
        }
    }
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[arg(short, long, default_value = MODEL_FILE_NAME, help = "Saved model")]
    pub model: PathBuf,
    #[arg(short, long, help = "CSV of encoded patient features")]
    pub input: PathBuf,
    #[arg(short, long, default_value = "scored.csv", help = "Output CSV")]
    pub output: PathBuf,
}

pub fn verdict(percentage: f64) -> String {
    if percentage > HIGH_RISK_PERCENT {
        format!("High Risk of Heart Disease. Estimated Risk: {}%", percentage)
    } else {
        format!("Low Risk of Heart Disease. Estimated Risk: {}%", percentage)
    }
}
