use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

pub const TARGET_COLUMN: &str = "target";

/// Model inputs, in the order the estimator is trained on.
pub const FEATURE_COLUMNS: [&str; 10] = [
    "age",
    "sex",
    "bp",
    "chol",
    "sugar",
    "ecg",
    "heartrate",
    "exercise",
    "smoking",
    "alcohol",
];

pub const CANONICAL_COLUMNS: [&str; 11] = [
    "age",
    "sex",
    "bp",
    "chol",
    "sugar",
    "ecg",
    "heartrate",
    "exercise",
    "smoking",
    "alcohol",
    TARGET_COLUMN,
];

/// How a source value becomes a canonical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    /// Age recorded in days, floor-divided into whole years
    DaysToYears,
}

impl Transform {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::DaysToYears => (value / 365.0).floor(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub source: &'static str,
    pub canonical: &'static str,
    pub transform: Transform,
}

const fn keep(source: &'static str, canonical: &'static str) -> ColumnMapping {
    ColumnMapping {
        source,
        canonical,
        transform: Transform::Identity,
    }
}

/// Everything needed to project one source table onto the canonical schema.
#[derive(Debug, Clone, Copy)]
pub struct SourceMapping {
    pub name: &'static str,
    pub delimiter: u8,
    pub columns: &'static [ColumnMapping],
    /// Canonical columns the source lacks, filled with a constant
    pub defaults: &'static [(&'static str, f64)],
}

impl SourceMapping {
    pub fn required_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|mapping| mapping.source)
    }
}

/// Cardiovascular disease table (`cardio_train.csv`).
pub const CARDIO_SOURCE: SourceMapping = SourceMapping {
    name: "cardio",
    delimiter: b';',
    columns: &[
        ColumnMapping {
            source: "age",
            canonical: "age",
            transform: Transform::DaysToYears,
        },
        keep("gender", "sex"),
        keep("ap_hi", "bp"),
        keep("cholesterol", "chol"),
        keep("gluc", "sugar"),
        keep("cardio", TARGET_COLUMN),
    ],
    defaults: &[
        ("ecg", 0.0),
        ("heartrate", 0.0),
        ("exercise", 0.0),
        ("smoking", 0.0),
        ("alcohol", 0.0),
    ],
};

/// UCI-style heart disease table (`heart.csv`).
pub const HEART_SOURCE: SourceMapping = SourceMapping {
    name: "heart",
    delimiter: b',',
    columns: &[
        keep("age", "age"),
        keep("sex", "sex"),
        keep("trestbps", "bp"),
        keep("chol", "chol"),
        keep("fbs", "sugar"),
        keep("restecg", "ecg"),
        keep("thalach", "heartrate"),
        keep("exang", "exercise"),
        keep("target", TARGET_COLUMN),
    ],
    defaults: &[("smoking", 0.0), ("alcohol", 0.0)],
};

/// One fully populated row of the harmonized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub age: f64,
    pub sex: f64,
    pub bp: f64,
    pub chol: f64,
    pub sugar: f64,
    pub ecg: f64,
    pub heartrate: f64,
    pub exercise: f64,
    pub smoking: f64,
    pub alcohol: f64,
    pub target: i32,
}

impl PatientRecord {
    pub fn features(&self) -> [f64; 10] {
        [
            self.age,
            self.sex,
            self.bp,
            self.chol,
            self.sugar,
            self.ecg,
            self.heartrate,
            self.exercise,
            self.smoking,
            self.alcohol,
        ]
    }
}

/// Already-encoded inputs for a single prediction.
///
/// `smoking` and `alcohol` are optional and count as 0 when omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientFeatures {
    pub age: f64,
    pub sex: f64,
    pub bp: f64,
    pub chol: f64,
    pub sugar: f64,
    pub ecg: f64,
    pub heartrate: f64,
    pub exercise: f64,
    #[serde(default)]
    pub smoking: Option<f64>,
    #[serde(default)]
    pub alcohol: Option<f64>,
}

impl PatientFeatures {
    /// Order matches `FEATURE_COLUMNS`.
    pub fn to_row(&self) -> [f64; 10] {
        [
            self.age,
            self.sex,
            self.bp,
            self.chol,
            self.sugar,
            self.ecg,
            self.heartrate,
            self.exercise,
            self.smoking.unwrap_or(0.0),
            self.alcohol.unwrap_or(0.0),
        ]
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.to_row().to_vec()
    }

    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != FEATURE_COLUMNS.len() {
            return Err(RiskError::FeatureCountMismatch {
                expected: FEATURE_COLUMNS.len(),
                found: values.len(),
            });
        }
        Ok(Self {
            age: values[0],
            sex: values[1],
            bp: values[2],
            chol: values[3],
            sugar: values[4],
            ecg: values[5],
            heartrate: values[6],
            exercise: values[7],
            smoking: Some(values[8]),
            alcohol: Some(values[9]),
        })
    }
}
