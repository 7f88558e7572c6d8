//! Closed-form fits of adsorption energy against descriptors
//!
//! Two engines implement [`FitEngine`]: a genetic-programming equation search
//! (compiled with the `symbolic-search` feature) and a per-feature linear
//! fallback. [`detect_fit_engine`] picks one once; call sites only ever hold a
//! `Box<dyn FitEngine>`.

pub mod expr;
pub mod fallback;
#[cfg(feature = "symbolic-search")]
pub mod search;

use crate::config::SymbolicSettings;
use crate::errors::{ScreenError, ScreenResult};
use crate::feature_scaler::{check_targets, matrix_from_rows};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use fallback::AnalyticalFallbackEngine;
#[cfg(feature = "symbolic-search")]
pub use search::SymbolicSearchEngine;

/// One fitted expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equation {
    pub equation: String,
    pub complexity: usize,
    /// Mean squared error on the training data
    pub loss: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_squared: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub method: String,
    pub equations: Vec<Equation>,
    pub best_equation: String,
    pub feature_names: Vec<String>,
    pub n_datapoints: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Data handed to an engine
#[derive(Debug, Clone, Copy)]
pub struct FitProblem<'a> {
    pub x: &'a [Vec<f64>],
    pub y: &'a [f64],
    pub feature_names: &'a [String],
    pub target_name: &'a str,
}

impl<'a> FitProblem<'a> {
    pub fn new(x: &'a [Vec<f64>], y: &'a [f64], feature_names: &'a [String]) -> Self {
        Self {
            x,
            y,
            feature_names,
            target_name: "E_ads",
        }
    }

    pub fn with_target(mut self, target_name: &'a str) -> Self {
        self.target_name = target_name;
        self
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Column `j` as an owned vector
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.x.iter().map(|row| row[j]).collect()
    }

    pub fn validate(&self) -> ScreenResult<()> {
        if self.y.len() < 2 {
            return Err(ScreenError::insufficient_data("symbolic_fit", 2, self.y.len()));
        }
        if self.x.len() != self.y.len() {
            return Err(ScreenError::invalid_input(
                "y",
                format!("{} targets for {} rows", self.y.len(), self.x.len()),
            ));
        }
        matrix_from_rows(self.x, Some(self.feature_names.len()), "x")?;
        check_targets(self.y, "y")
    }
}

/// Search budget
#[derive(Debug, Clone, Copy)]
pub struct FitBudget {
    pub max_complexity: usize,
    pub iterations: usize,
}

impl From<&SymbolicSettings> for FitBudget {
    fn from(settings: &SymbolicSettings) -> Self {
        Self {
            max_complexity: settings.max_complexity,
            iterations: settings.iterations,
        }
    }
}

pub trait FitEngine: Send + Sync {
    fn method(&self) -> &'static str;

    fn fit(&self, problem: &FitProblem<'_>, budget: FitBudget) -> ScreenResult<FitReport>;
}

#[cfg(feature = "symbolic-search")]
fn search_engine(settings: &SymbolicSettings) -> Option<Box<dyn FitEngine>> {
    Some(Box::new(SymbolicSearchEngine::from_settings(settings)))
}

#[cfg(not(feature = "symbolic-search"))]
fn search_engine(_settings: &SymbolicSettings) -> Option<Box<dyn FitEngine>> {
    None
}

/// Choose the fit engine for this build and configuration
pub fn detect_fit_engine(settings: &SymbolicSettings) -> Box<dyn FitEngine> {
    let searched = if settings.enabled { search_engine(settings) } else { None };
    let engine = searched.unwrap_or_else(|| Box::new(AnalyticalFallbackEngine));
    info!("Using fit engine: {}", engine.method());
    engine
}

/// Mean squared error and R² of predictions against targets.
/// R² is 0 when the targets are constant.
pub(crate) fn fit_quality(predicted: &[f64], y: &[f64]) -> (f64, f64) {
    let n = y.len() as f64;
    let y_mean = y.iter().sum::<f64>() / n;
    let ss_res: f64 = predicted.iter().zip(y).map(|(p, t)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y.iter().map(|t| (t - y_mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
    (ss_res / n, r_squared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        let names = vec!["a".to_string()];
        let x = vec![vec![1.0]];
        let one = FitProblem::new(&x, &[0.1], &names);
        assert!(matches!(one.validate(), Err(ScreenError::InsufficientData { .. })));

        let x = vec![vec![1.0], vec![2.0, 3.0]];
        let ragged = FitProblem::new(&x, &[0.1, 0.2], &names);
        assert!(matches!(ragged.validate(), Err(ScreenError::InvalidInput { .. })));

        let x = vec![vec![1.0], vec![f64::NAN]];
        let nan = FitProblem::new(&x, &[0.1, 0.2], &names);
        assert!(matches!(nan.validate(), Err(ScreenError::InvalidInput { .. })));
    }

    #[test]
    fn test_disabled_search_selects_fallback() {
        let settings = SymbolicSettings {
            enabled: false,
            ..SymbolicSettings::default()
        };
        assert_eq!(detect_fit_engine(&settings).method(), fallback::METHOD);
    }

    #[cfg(feature = "symbolic-search")]
    #[test]
    fn test_enabled_search_selects_search() {
        let engine = detect_fit_engine(&SymbolicSettings::default());
        assert_eq!(engine.method(), search::METHOD);
    }

    #[test]
    fn test_fit_quality() {
        let (mse, r2) = fit_quality(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert_eq!(mse, 0.0);
        assert_eq!(r2, 1.0);

        let (_, flat) = fit_quality(&[0.0, 0.0], &[0.5, 0.5]);
        assert_eq!(flat, 0.0);
    }
}
