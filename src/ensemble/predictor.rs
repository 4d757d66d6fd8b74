//! Ensemble prediction
//!
//! Members are run one after another through a single [`InferenceSession`]
//! and their outputs averaged element-wise.

use crate::models::with_constants;
use crate::nn::{Architecture, InferenceSession, ModelError, ModelResult, Scorer};
use nalgebra::DMatrix;
use std::path::Path;

/// Minimum averaged smell score for an instance to be reported
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Element-wise mean of member predictions.
///
/// Values are summed in sorted order, so the result does not depend on the
/// order of the members.
pub fn aggregate(predictions: &[DMatrix<f64>]) -> ModelResult<DMatrix<f64>> {
    let first = predictions.first().ok_or(ModelError::EmptyEnsemble)?;
    let shape = first.shape();
    if let Some(other) = predictions.iter().find(|p| p.shape() != shape) {
        return Err(ModelError::PredictionShape {
            expected: shape,
            found: other.shape(),
        });
    }

    let count = predictions.len() as f64;
    let mut values = Vec::with_capacity(predictions.len());
    Ok(DMatrix::from_fn(shape.0, shape.1, |i, j| {
        values.clear();
        values.extend(predictions.iter().map(|p| p[(i, j)]));
        values.sort_by(f64::total_cmp);
        values.iter().sum::<f64>() / count
    }))
}

/// Average the outputs of in-memory scorers
pub fn predict_members<S: Scorer>(
    members: &[S],
    inputs: &DMatrix<f64>,
) -> ModelResult<DMatrix<f64>> {
    let predictions = members
        .iter()
        .map(|member| member.score(inputs))
        .collect::<ModelResult<Vec<_>>>()?;
    aggregate(&predictions)
}

/// Average the outputs of the members stored at `checkpoints`
pub fn ensemble_prediction<P: AsRef<Path>>(
    architecture: &Architecture,
    checkpoints: &[P],
    inputs: &DMatrix<f64>,
) -> ModelResult<DMatrix<f64>> {
    if checkpoints.is_empty() {
        return Err(ModelError::EmptyEnsemble);
    }

    let mut session = InferenceSession::new(architecture.clone());
    let mut predictions = Vec::with_capacity(checkpoints.len());
    for path in checkpoints {
        session.restore(path.as_ref())?;
        predictions.push(session.run(inputs)?);
    }
    tracing::debug!(
        "Averaged {} members over {} instances",
        predictions.len(),
        inputs.nrows()
    );
    aggregate(&predictions)
}

/// [`ensemble_prediction`] with the system constants appended to every row
pub fn ensemble_prediction_with_constants<P: AsRef<Path>>(
    architecture: &Architecture,
    checkpoints: &[P],
    instances: &DMatrix<f64>,
    constants: Option<&[f64]>,
) -> ModelResult<DMatrix<f64>> {
    match constants {
        Some(constants) => {
            ensemble_prediction(architecture, checkpoints, &with_constants(instances, constants))
        }
        None => ensemble_prediction(architecture, checkpoints, instances),
    }
}

/// Rows whose smell score (column 0) is above [`DECISION_THRESHOLD`]
pub fn positive_indices(output: &DMatrix<f64>) -> Vec<usize> {
    output
        .row_iter()
        .enumerate()
        .filter(|(_, row)| row[0] > DECISION_THRESHOLD)
        .map(|(i, _)| i)
        .collect()
}
