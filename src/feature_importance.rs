//! Feature importance for very small datasets (n <= ~10)
//!
//! Leave-one-out predicts each held-out target with the mean of the remaining
//! targets. Sensitivity is the target range over the feature range, and the
//! ranking uses the absolute Pearson correlation with the target.

use crate::errors::{ScreenError, ScreenResult};
use crate::feature_scaler::{check_targets, matrix_from_rows};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveOneOutError {
    pub left_out_index: usize,
    pub actual: f64,
    pub predicted_mean: f64,
    pub error: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSensitivity {
    pub feature: String,
    pub sensitivity: f64,
    pub correlation_with_target: f64,
    pub feature_range: f64,
    pub feature_mean: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportanceReport {
    pub leave_one_out: Vec<LeaveOneOutError>,
    /// Per-feature statistics in input column order
    pub feature_sensitivity: Vec<FeatureSensitivity>,
    pub ranked_features: Vec<FeatureSensitivity>,
    pub most_important: Option<String>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn range(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

/// Pearson correlation; 0 when either side is constant
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 || population_std(a) == 0.0 || population_std(b) == 0.0 {
        return 0.0;
    }
    let (ma, mb) = (mean(a), mean(b));
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let sa: f64 = a.iter().map(|x| (x - ma).powi(2)).sum::<f64>().sqrt();
    let sb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum::<f64>().sqrt();
    (cov / (sa * sb)).clamp(-1.0, 1.0)
}

fn leave_one_out(y: &[f64]) -> Vec<LeaveOneOutError> {
    if y.len() < 3 {
        return Vec::new();
    }
    let total: f64 = y.iter().sum();
    let rest = (y.len() - 1) as f64;
    y.iter()
        .enumerate()
        .map(|(i, &actual)| {
            let predicted_mean = (total - actual) / rest;
            LeaveOneOutError {
                left_out_index: i,
                actual,
                predicted_mean,
                error: (actual - predicted_mean).abs(),
            }
        })
        .collect()
}

/// Analyze which descriptors track the target.
pub fn analyze(x: &[Vec<f64>], y: &[f64], feature_names: &[String]) -> ScreenResult<FeatureImportanceReport> {
    if y.is_empty() {
        return Err(ScreenError::insufficient_data("feature_importance", 1, 0));
    }
    if x.len() != y.len() {
        return Err(ScreenError::invalid_input(
            "y",
            format!("{} targets for {} rows", y.len(), x.len()),
        ));
    }
    let matrix = matrix_from_rows(x, Some(feature_names.len()), "x")?;
    check_targets(y, "y")?;

    let n = y.len();
    let y_range = range(y);

    let feature_sensitivity: Vec<FeatureSensitivity> = feature_names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let column: Vec<f64> = matrix.column(j).iter().copied().collect();
            let feature_range = range(&column);
            let (sensitivity, correlation) = if n >= 2 {
                let s = if feature_range > 0.0 { (y_range / feature_range).abs() } else { 0.0 };
                (s, pearson(&column, y))
            } else {
                (0.0, 0.0)
            };
            FeatureSensitivity {
                feature: name.clone(),
                sensitivity,
                correlation_with_target: correlation,
                feature_range,
                feature_mean: mean(&column),
            }
        })
        .collect();

    let mut ranked_features = feature_sensitivity.clone();
    ranked_features.sort_by(|a, b| {
        b.correlation_with_target
            .abs()
            .total_cmp(&a.correlation_with_target.abs())
    });
    let most_important = ranked_features.first().map(|f| f.feature.clone());

    Ok(FeatureImportanceReport {
        leave_one_out: leave_one_out(y),
        feature_sensitivity,
        ranked_features,
        most_important,
    })
}
