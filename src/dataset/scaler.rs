//! Column-wise z-score scaling
//!
//! Population statistics (divide by `n`). A column with zero variance keeps a
//! scale of 1 so it maps to 0 instead of NaN.

use nalgebra::{DMatrix, DVector};

/// Per-column mean and standard deviation
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: DVector<f64>,
    scale: DVector<f64>,
}

impl StandardScaler {
    /// Fit on the rows of `data`
    pub fn fit(data: &DMatrix<f64>) -> Self {
        let n = data.nrows().max(1) as f64;
        let mean = DVector::from_iterator(data.ncols(), data.column_iter().map(|c| c.sum() / n));
        let scale = DVector::from_iterator(
            data.ncols(),
            data.column_iter().zip(mean.iter()).map(|(col, &m)| {
                let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std == 0.0 {
                    1.0
                } else {
                    std
                }
            }),
        );
        Self { mean, scale }
    }

    /// Standardize `data` with the fitted statistics
    pub fn transform(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(data.nrows(), data.ncols(), |i, j| {
            (data[(i, j)] - self.mean[j]) / self.scale[j]
        })
    }

    pub fn fit_transform(data: &DMatrix<f64>) -> DMatrix<f64> {
        Self::fit(data).transform(data)
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &DVector<f64> {
        &self.scale
    }
}
