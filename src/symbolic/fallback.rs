//! Per-feature least-squares lines, used when equation search is unavailable

use super::{fit_quality, Equation, FitBudget, FitEngine, FitProblem, FitReport};
use crate::errors::ScreenResult;
use tracing::debug;

pub const METHOD: &str = "analytical_fallback";

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticalFallbackEngine;

impl AnalyticalFallbackEngine {
    fn fit_line(problem: &FitProblem<'_>, j: usize) -> Option<Equation> {
        let xs = problem.column(j);
        let n = xs.len() as f64;
        let x_mean = xs.iter().sum::<f64>() / n;
        let y_mean = problem.y.iter().sum::<f64>() / n;

        // both moments divide by n
        let var_x = xs.iter().map(|x| (x - x_mean).powi(2)).sum::<f64>() / n;
        if var_x <= 0.0 {
            return None;
        }
        let cov = xs
            .iter()
            .zip(problem.y)
            .map(|(x, y)| (x - x_mean) * (y - y_mean))
            .sum::<f64>()
            / n;

        let slope = cov / var_x;
        let intercept = y_mean - slope * x_mean;
        let predicted: Vec<f64> = xs.iter().map(|x| slope * x + intercept).collect();
        let (loss, r_squared) = fit_quality(&predicted, problem.y);

        let feature = &problem.feature_names[j];
        let sign = if intercept >= 0.0 { '+' } else { '-' };
        Some(Equation {
            equation: format!(
                "{} = {slope:.4} * {feature} {sign} {:.4}",
                problem.target_name,
                intercept.abs()
            ),
            complexity: 3,
            loss,
            r_squared: Some(r_squared),
            score: None,
            feature: Some(feature.clone()),
        })
    }
}

impl FitEngine for AnalyticalFallbackEngine {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn fit(&self, problem: &FitProblem<'_>, _budget: FitBudget) -> ScreenResult<FitReport> {
        problem.validate()?;

        let mut equations: Vec<Equation> = (0..problem.feature_names.len())
            .filter_map(|j| Self::fit_line(problem, j))
            .collect();
        equations.sort_by(|a, b| {
            b.r_squared
                .unwrap_or(0.0)
                .total_cmp(&a.r_squared.unwrap_or(0.0))
        });
        debug!("Fallback fitted {} single-feature lines", equations.len());

        let best_equation = equations
            .first()
            .map(|e| e.equation.clone())
            .unwrap_or_else(|| "No fit found".to_string());

        Ok(FitReport {
            method: METHOD.to_string(),
            equations,
            best_equation,
            feature_names: problem.feature_names.to_vec(),
            n_datapoints: problem.len(),
            note: Some("Equation search not enabled; showing single-feature linear fits".to_string()),
        })
    }
}
