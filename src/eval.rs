//! Detection quality metrics
//!
//! `output` is the averaged ensemble prediction and `labels` the one-hot
//! oracle, both with one row per entity and the smell in column 0. Ratios
//! with a zero denominator are reported as NaN rather than failing.

use crate::dataset::{check_parallel, DataResult};
use crate::ensemble::DECISION_THRESHOLD;
use nalgebra::{DMatrix, RowDVector};
use serde::{Deserialize, Serialize};

fn is_detected(output: &DMatrix<f64>, row: usize) -> bool {
    output[(row, 0)] > DECISION_THRESHOLD
}

fn is_positive(labels: &DMatrix<f64>, row: usize) -> bool {
    labels[(row, 0)] > DECISION_THRESHOLD
}

/// Number of instances scored as smells
pub fn detected(output: &DMatrix<f64>) -> usize {
    (0..output.nrows()).filter(|&i| is_detected(output, i)).count()
}

/// Number of instances labeled as smells
pub fn positive(labels: &DMatrix<f64>) -> usize {
    (0..labels.nrows()).filter(|&i| is_positive(labels, i)).count()
}

/// Number of instances both scored and labeled as smells
pub fn true_positive(output: &DMatrix<f64>, labels: &DMatrix<f64>) -> DataResult<usize> {
    check_parallel(output.nrows(), labels.nrows())?;
    Ok((0..output.nrows())
        .filter(|&i| is_detected(output, i) && is_positive(labels, i))
        .count())
}

pub fn precision(output: &DMatrix<f64>, labels: &DMatrix<f64>) -> DataResult<f64> {
    Ok(ratio(true_positive(output, labels)?, detected(output)))
}

pub fn recall(output: &DMatrix<f64>, labels: &DMatrix<f64>) -> DataResult<f64> {
    Ok(ratio(true_positive(output, labels)?, positive(labels)))
}

/// Harmonic mean of precision and recall; 0 when both are 0
pub fn f_measure(output: &DMatrix<f64>, labels: &DMatrix<f64>) -> DataResult<f64> {
    Ok(harmonic(precision(output, labels)?, recall(output, labels)?))
}

/// Fraction of instances whose predicted class matches the label
pub fn accuracy(output: &DMatrix<f64>, labels: &DMatrix<f64>) -> DataResult<f64> {
    check_parallel(output.nrows(), labels.nrows())?;
    let correct = (0..output.nrows())
        .filter(|&i| predicted_class(output, i) == predicted_class(labels, i))
        .count();
    Ok(ratio(correct, output.nrows()))
}

/// Arg-max of a row (first maximum wins); single-column rows use the threshold
fn predicted_class(matrix: &DMatrix<f64>, row: usize) -> usize {
    if matrix.ncols() == 1 {
        return if matrix[(row, 0)] > DECISION_THRESHOLD { 0 } else { 1 };
    }
    let values: RowDVector<f64> = matrix.row(row).into_owned();
    let mut best = 0;
    for (j, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = j;
        }
    }
    best
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        f64::NAN
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic(precision: f64, recall: f64) -> f64 {
    if precision.is_nan() || recall.is_nan() {
        f64::NAN
    } else if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// All metrics of one system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub system: String,
    pub instances: usize,
    pub detected: usize,
    pub positive: usize,
    pub true_positive: usize,
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
    pub accuracy: f64,
}

impl Evaluation {
    pub fn compute(
        system: impl Into<String>,
        output: &DMatrix<f64>,
        labels: &DMatrix<f64>,
    ) -> DataResult<Self> {
        let true_positive = true_positive(output, labels)?;
        let detected = detected(output);
        let positive = positive(labels);
        let precision = ratio(true_positive, detected);
        let recall = ratio(true_positive, positive);
        Ok(Self {
            system: system.into(),
            instances: output.nrows(),
            detected,
            positive,
            true_positive,
            precision,
            recall,
            f_measure: harmonic(precision, recall),
            accuracy: accuracy(output, labels)?,
        })
    }
}

/// Unweighted mean of per-system metrics; any NaN makes the mean NaN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub systems: usize,
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
    pub accuracy: f64,
}

impl EvaluationSummary {
    pub fn mean(evaluations: &[Evaluation]) -> Self {
        let avg = |f: fn(&Evaluation) -> f64| {
            if evaluations.is_empty() {
                f64::NAN
            } else {
                evaluations.iter().map(f).sum::<f64>() / evaluations.len() as f64
            }
        };
        Self {
            systems: evaluations.len(),
            precision: avg(|e| e.precision),
            recall: avg(|e| e.recall),
            f_measure: avg(|e| e.f_measure),
            accuracy: avg(|e| e.accuracy),
        }
    }
}
