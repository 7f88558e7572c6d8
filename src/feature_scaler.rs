//! Column standardization for descriptor matrices

use crate::errors::{ScreenError, ScreenResult};
use nalgebra::DMatrix;

/// Build a dense matrix from row vectors, rejecting ragged or non-finite input.
///
/// `width` pins the expected column count; `None` takes it from the first row.
pub fn matrix_from_rows(
    rows: &[Vec<f64>],
    width: Option<usize>,
    field: &str,
) -> ScreenResult<DMatrix<f64>> {
    let ncols = match width {
        Some(w) => w,
        None => rows.first().map(Vec::len).unwrap_or(0),
    };

    for (i, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(ScreenError::invalid_input(
                field,
                format!("row {i} has {} values, expected {ncols}", row.len()),
            ));
        }
        if let Some(j) = row.iter().position(|v| !v.is_finite()) {
            return Err(ScreenError::invalid_input(
                field,
                format!("non-finite value at row {i}, column {j}"),
            ));
        }
    }

    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

/// Reject non-finite targets
pub fn check_targets(y: &[f64], field: &str) -> ScreenResult<()> {
    match y.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(ScreenError::invalid_input(
            field,
            format!("non-finite target at index {i}"),
        )),
        None => Ok(()),
    }
}

/// Zero-mean, unit-variance scaling fitted on a training matrix
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit column statistics (population standard deviation).
    ///
    /// Columns with zero variance get unit scale.
    pub fn fit(x: &DMatrix<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mut means = Vec::with_capacity(x.ncols());
        let mut scales = Vec::with_capacity(x.ncols());

        for column in x.column_iter() {
            let mean = column.sum() / n;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            means.push(mean);
            scales.push(if std > 0.0 { std } else { 1.0 });
        }

        Self { means, scales }
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| {
            (x[(i, j)] - self.means[j]) / self.scales[j]
        })
    }

    pub fn fit_transform(x: &DMatrix<f64>) -> (Self, DMatrix<f64>) {
        let scaler = Self::fit(x);
        let scaled = scaler.transform(x);
        (scaler, scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_columns() {
        let x = matrix_from_rows(&[vec![1.0, 10.0], vec![3.0, 30.0]], None, "x").unwrap();
        let (scaler, scaled) = StandardScaler::fit_transform(&x);

        assert_eq!(scaler.means, vec![2.0, 20.0]);
        assert!((scaled[(0, 0)] + 1.0).abs() < 1e-12);
        assert!((scaled[(1, 1)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_uses_unit_scale() {
        let x = matrix_from_rows(&[vec![4.0], vec![4.0], vec![4.0]], None, "x").unwrap();
        let scaler = StandardScaler::fit(&x);
        assert_eq!(scaler.scales, vec![1.0]);

        let query = matrix_from_rows(&[vec![6.0]], Some(1), "query").unwrap();
        assert_eq!(scaler.transform(&query)[(0, 0)], 2.0);
    }

    #[test]
    fn test_rejects_ragged_and_non_finite_rows() {
        let ragged = matrix_from_rows(&[vec![1.0, 2.0], vec![1.0]], None, "x");
        assert!(matches!(ragged, Err(ScreenError::InvalidInput { .. })));

        let nan = matrix_from_rows(&[vec![1.0, f64::NAN]], None, "x");
        assert!(matches!(nan, Err(ScreenError::InvalidInput { .. })));

        assert!(check_targets(&[0.1, f64::INFINITY], "y").is_err());
    }
}
