//! Bagged decision-tree ensemble estimating heart-disease probability.
//!
//! Every tree is a smartcore `DecisionTreeClassifier` fitted on its own
//! seeded bootstrap sample of the training rows. A bootstrap sample holding a
//! single class becomes a constant vote for that class. The positive-class
//! probability of a row is the share of trees voting for class 1.
//!
//! An [`Estimator`] starts untrained and becomes trained exactly once, through
//! [`Estimator::fit`] or [`train`]; there is no retraining.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::error::Failed;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::metrics::{accuracy, roc_auc_score};
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};

use crate::config::ForestConfig;
use crate::error::{Result, RiskError};
use crate::records::{PatientFeatures, PatientRecord, FEATURE_COLUMNS};

pub const N_FEATURES: usize = FEATURE_COLUMNS.len();

pub type FeatureRow = [f64; N_FEATURES];

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// One member of the ensemble.
#[derive(Serialize, Deserialize)]
enum Voter {
    Tree(Tree),
    /// Fitted on a bootstrap sample that held only this class
    Constant(i32),
}

impl Voter {
    fn predict(&self, x: &DenseMatrix<f64>, n_rows: usize) -> Result<Vec<i32>> {
        match self {
            Voter::Tree(tree) => Ok(tree.predict(x)?),
            Voter::Constant(class) => Ok(vec![*class; n_rows]),
        }
    }
}

/// Held-out metrics of a freshly trained estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub roc_auc: f64,
    pub test_rows: usize,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {}", round_to(self.accuracy, 3))?;
        write!(f, "ROC-AUC: {}", round_to(self.roc_auc, 3))
    }
}

#[derive(Serialize, Deserialize)]
pub struct Estimator {
    trees: Vec<Voter>,
}

impl fmt::Debug for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Estimator")
            .field("trees", &self.trees.len())
            .finish()
    }
}

impl Default for Estimator {
    fn default() -> Self {
        Self::untrained()
    }
}

impl Estimator {
    pub fn untrained() -> Self {
        Self { trees: Vec::new() }
    }

    pub fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fits `config.n_trees` trees, each on a bootstrap sample drawn with a
    /// generator seeded from `config.seed`.
    pub fn fit(&mut self, features: &[FeatureRow], labels: &[i32], config: &ForestConfig) -> Result<()> {
        if self.is_trained() {
            return Err(RiskError::AlreadyTrained);
        }
        config.validate()?;
        if features.is_empty() {
            return Err(Failed::fit("no training rows").into());
        }
        if features.len() != labels.len() {
            return Err(Failed::fit(&format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            ))
            .into());
        }

        let parameters = DecisionTreeClassifierParameters::default().with_max_depth(config.max_depth);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let n = features.len();

        let mut trees = Vec::with_capacity(config.n_trees);
        for i in 0..config.n_trees {
            let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let y: Vec<i32> = sample.iter().map(|&row| labels[row]).collect();
            let x = to_matrix(sample.iter().map(|&row| &features[row]));

            let voter = match y.first() {
                Some(&class) if y.iter().all(|&label| label == class) => {
                    trace!("bootstrap {} holds only class {}", i + 1, class);
                    Voter::Constant(class)
                }
                _ => {
                    let tree: Tree = DecisionTreeClassifier::fit(&x, &y, parameters.clone())?;
                    Voter::Tree(tree)
                }
            };
            trace!("fitted tree {} of {}", i + 1, config.n_trees);
            trees.push(voter);
        }

        self.trees = trees;
        debug!("ensemble fitted with {} trees on {} rows", self.trees.len(), n);
        Ok(())
    }

    /// Positive-class probability in [0, 1] for every row.
    pub fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        if !self.is_trained() {
            return Err(RiskError::NotTrained);
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let x = to_matrix(rows.iter());
        let mut votes = vec![0usize; rows.len()];
        for tree in &self.trees {
            let predicted = tree.predict(&x, rows.len())?;
            for (count, class) in votes.iter_mut().zip(predicted) {
                if class == 1 {
                    *count += 1;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        Ok(votes.into_iter().map(|v| v as f64 / n_trees).collect())
    }

    /// Risk percentage for ten ordered feature values.
    pub fn predict_features(&self, features: &[f64]) -> Result<f64> {
        self.predict(&PatientFeatures::from_slice(features)?)
    }

    /// Risk percentage for one patient, rounded to two decimals.
    ///
    /// With other inputs fixed, raising cholesterol from a low baseline is
    /// expected to not lower the result, but that trend comes from the
    /// training data and is not enforced.
    pub fn predict(&self, patient: &PatientFeatures) -> Result<f64> {
        let probability = self.predict_proba(&[patient.to_row()])?[0];
        Ok(round_to(probability * 100.0, 2))
    }

    /// Accuracy of the majority vote and ROC-AUC of the vote share.
    pub fn evaluate(&self, rows: &[FeatureRow], labels: &[i32]) -> Result<Evaluation> {
        if rows.is_empty() {
            return Err(Failed::predict("evaluation partition is empty").into());
        }
        let probabilities = self.predict_proba(rows)?;
        Ok(score_partition(&probabilities, labels))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if !self.is_trained() {
            return Err(RiskError::NotTrained);
        }
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(writer, self)?;
        info!("model saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let estimator: Estimator = serde_json::from_reader(reader)?;
        debug!(
            "loaded {} trees from {}",
            estimator.n_trees(),
            path.as_ref().display()
        );
        Ok(estimator)
    }
}

/// Splits row indices so each label keeps its share in both partitions.
///
/// Returns `(train, test)`, each sorted ascending. A label with at least two
/// rows always contributes at least one row to each side.
pub fn stratified_split(labels: &[i32], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut by_label: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_label.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for (label, mut indices) in by_label {
        indices.shuffle(&mut rng);
        let len = indices.len();
        let mut n_test = (len as f64 * test_fraction).round() as usize;
        if len >= 2 {
            n_test = n_test.clamp(1, len - 1);
        }
        debug!("label {}: {} rows, {} held out", label, len, n_test);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Stratified split, fit and held-out evaluation in one call.
pub fn train(records: &[PatientRecord], config: &ForestConfig) -> Result<(Estimator, Evaluation)> {
    config.validate()?;
    let labels: Vec<i32> = records.iter().map(|r| r.target).collect();
    let (train_idx, test_idx) = stratified_split(&labels, config.test_fraction, config.seed);

    let rows = |idx: &[usize]| -> (Vec<FeatureRow>, Vec<i32>) {
        idx.iter()
            .map(|&i| (records[i].features(), records[i].target))
            .unzip()
    };
    let (train_x, train_y) = rows(&train_idx);
    let (test_x, test_y) = rows(&test_idx);

    info!(
        "training {} trees (max depth {}) on {} rows, {} held out",
        config.n_trees,
        config.max_depth,
        train_x.len(),
        test_x.len()
    );
    let mut estimator = Estimator::untrained();
    estimator.fit(&train_x, &train_y, config)?;

    let evaluation = estimator.evaluate(&test_x, &test_y)?;
    info!(
        "held-out accuracy {:.3}, ROC-AUC {:.3} over {} rows",
        evaluation.accuracy, evaluation.roc_auc, evaluation.test_rows
    );
    Ok((estimator, evaluation))
}

/// Metrics of held-out probabilities against their labels.
fn score_partition(probabilities: &[f64], labels: &[i32]) -> Evaluation {
    // a tied vote goes to class 0
    let predicted: Vec<i32> = probabilities.iter().map(|&p| i32::from(p > 0.5)).collect();

    Evaluation {
        accuracy: accuracy(&labels.to_vec(), &predicted),
        roc_auc: roc_auc(probabilities, labels),
        test_rows: probabilities.len(),
    }
}

/// ROC-AUC with tied probabilities sharing their average rank.
///
/// smartcore only averages ranks of ties that are adjacent in its input, so
/// the pairs are handed over sorted by probability.
fn roc_auc(probabilities: &[f64], labels: &[i32]) -> f64 {
    let mut pairs: Vec<(f64, i32)> = probabilities.iter().copied().zip(labels.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (sorted, truth): (Vec<f64>, Vec<f64>) = pairs
        .into_iter()
        .map(|(p, label)| (p, f64::from(label)))
        .unzip();
    roc_auc_score(&truth, &sorted)
}

fn to_matrix<'a, I>(rows: I) -> DenseMatrix<f64>
where
    I: IntoIterator<Item = &'a FeatureRow>,
{
    let values: Vec<f64> = rows.into_iter().flat_map(|row| row.iter().copied()).collect();
    let nrows = values.len() / N_FEATURES;
    DenseMatrix::new(nrows, N_FEATURES, values, false)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Noisy but learnable cohort: risk rises with age, cholesterol and
    /// blood pressure.
    fn cohort(n: usize) -> Vec<PatientRecord> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..n)
            .map(|_| {
                let age = rng.random_range(30..80) as f64;
                let bp = rng.random_range(90..190) as f64;
                let chol = rng.random_range(120..380) as f64;
                let score = (age - 30.0) / 50.0 + (chol - 120.0) / 260.0 + (bp - 90.0) / 100.0;
                let flip = rng.random_range(0..10) == 0;
                let target = i32::from((score > 1.4) != flip);
                PatientRecord {
                    age,
                    sex: rng.random_range(0..2) as f64,
                    bp,
                    chol,
                    sugar: rng.random_range(0..2) as f64,
                    ecg: rng.random_range(0..2) as f64,
                    heartrate: rng.random_range(90..200) as f64,
                    exercise: rng.random_range(0..2) as f64,
                    smoking: 0.0,
                    alcohol: 0.0,
                    target,
                }
            })
            .collect()
    }

    fn small_forest() -> ForestConfig {
        ForestConfig {
            n_trees: 40,
            ..Default::default()
        }
    }

    fn reference_patient() -> PatientFeatures {
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

    #[test]
    fn split_preserves_class_balance() {
        let labels: Vec<i32> = (0..100).map(|i| i32::from(i % 4 == 0)).collect();
        let (train, test) = stratified_split(&labels, 0.2, 42);

        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.len(), 20);
        let positives = test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(positives, 5);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn split_is_reproducible_for_a_seed() {
        let labels: Vec<i32> = (0..50).map(|i| i % 2).collect();
        assert_eq!(stratified_split(&labels, 0.2, 42), stratified_split(&labels, 0.2, 42));
        assert_ne!(stratified_split(&labels, 0.2, 42), stratified_split(&labels, 0.2, 43));
    }

    #[test]
    fn untrained_estimator_refuses_to_predict() {
        let estimator = Estimator::untrained();
        assert!(!estimator.is_trained());
        assert!(matches!(
            estimator.predict(&reference_patient()),
            Err(RiskError::NotTrained)
        ));
    }

    #[test]
    fn training_is_terminal() {
        let records = cohort(60);
        let (mut estimator, _) = train(&records, &small_forest()).unwrap();
        let rows: Vec<FeatureRow> = records.iter().map(|r| r.features()).collect();
        let labels: Vec<i32> = records.iter().map(|r| r.target).collect();
        assert!(matches!(
            estimator.fit(&rows, &labels, &small_forest()),
            Err(RiskError::AlreadyTrained)
        ));
    }

    #[test]
    fn reference_prediction_is_a_rounded_percentage() {
        let (estimator, evaluation) = train(&cohort(200), &ForestConfig::default()).unwrap();
        assert_eq!(estimator.n_trees(), 300);
        assert!(evaluation.accuracy > 0.6, "accuracy {}", evaluation.accuracy);
        assert!((0.0..=1.0).contains(&evaluation.roc_auc));

        let risk = estimator.predict(&reference_patient()).unwrap();
        assert!((0.0..=100.0).contains(&risk));
        assert!(((risk * 100.0).round() - risk * 100.0).abs() < 1e-9);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let (estimator, _) = train(&cohort(60), &small_forest()).unwrap();
        for n in [9, 11] {
            assert!(matches!(
                estimator.predict_features(&vec![1.0; n]),
                Err(RiskError::FeatureCountMismatch { expected: 10, found }) if found == n
            ));
        }
    }

    #[test]
    fn omitted_lifestyle_fields_match_explicit_zeros() {
        let (estimator, _) = train(&cohort(80), &small_forest()).unwrap();
        let omitted = PatientFeatures {
            smoking: None,
            alcohol: None,
            ..reference_patient()
        };
        let explicit = PatientFeatures {
            smoking: Some(0.0),
            alcohol: Some(0.0),
            ..reference_patient()
        };
        assert_eq!(
            estimator.predict(&omitted).unwrap(),
            estimator.predict(&explicit).unwrap()
        );
    }

    #[test]
    fn training_is_deterministic() {
        let records = cohort(120);
        let (first, first_eval) = train(&records, &small_forest()).unwrap();
        let (second, second_eval) = train(&records, &small_forest()).unwrap();

        assert_eq!(first_eval, second_eval);
        let rows: Vec<FeatureRow> = records.iter().map(|r| r.features()).collect();
        assert_eq!(
            first.predict_proba(&rows).unwrap(),
            second.predict_proba(&rows).unwrap()
        );
    }

    #[test]
    fn loaded_model_predicts_like_the_saved_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let (estimator, _) = train(&cohort(80), &small_forest()).unwrap();

        estimator.save(&path).unwrap();
        let loaded = Estimator::load(&path).unwrap();

        assert_eq!(loaded.n_trees(), estimator.n_trees());
        assert_eq!(
            loaded.predict(&reference_patient()).unwrap(),
            estimator.predict(&reference_patient()).unwrap()
        );
    }

    #[test]
    fn untrained_model_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let err = Estimator::untrained().save(dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, RiskError::NotTrained));
    }

    #[test]
    fn tied_probabilities_share_their_rank() {
        assert_eq!(roc_auc(&[0.5, 0.2, 0.5], &[1, 0, 0]), 0.75);
        assert_eq!(roc_auc(&[0.1, 0.4, 0.35, 0.8], &[0, 0, 1, 1]), 0.75);
    }

    #[test]
    fn held_out_metrics_are_exact() {
        let evaluation = score_partition(&[0.5, 0.2, 0.5, 0.9], &[1, 0, 0, 1]);
        // only 0.9 clears the majority vote
        assert_eq!(evaluation.accuracy, 0.75);
        // positive/negative pairs: 1 + 0.5 + 1 + 1 out of 4
        assert_eq!(evaluation.roc_auc, 0.875);
        assert_eq!(evaluation.test_rows, 4);
    }

    #[test]
    fn rare_positive_class_still_trains() {
        let records: Vec<PatientRecord> = cohort(100)
            .into_iter()
            .enumerate()
            .map(|(i, record)| PatientRecord {
                target: i32::from(i % 34 == 0),
                ..record
            })
            .collect();
        assert_eq!(records.iter().filter(|r| r.target == 1).count(), 3);

        let (estimator, evaluation) = train(&records, &ForestConfig::default()).unwrap();
        assert_eq!(estimator.n_trees(), 300);
        assert!((0.0..=1.0).contains(&evaluation.accuracy));
        let risk = estimator.predict(&reference_patient()).unwrap();
        assert!((0.0..=100.0).contains(&risk));
    }

    #[test]
    fn single_class_training_votes_that_class() {
        let rows: Vec<FeatureRow> = cohort(20).iter().map(|r| r.features()).collect();
        let mut estimator = Estimator::untrained();
        estimator.fit(&rows, &[0; 20], &small_forest()).unwrap();

        assert!(estimator.is_trained());
        assert_eq!(estimator.predict_proba(&rows).unwrap(), vec![0.0; 20]);
    }

    #[test]
    fn empty_evaluation_partition_is_a_model_error() {
        let (estimator, _) = train(&cohort(60), &small_forest()).unwrap();
        assert!(matches!(
            estimator.evaluate(&[], &[]),
            Err(RiskError::Model(_))
        ));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(12.345_6, 2), 12.35);
        assert_eq!(round_to(0.733_49, 3), 0.733);
    }
}
