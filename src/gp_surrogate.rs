//! Gaussian-process surrogate for adsorption energies
//!
//! Zero-mean GP over standardized descriptors with a squared-exponential
//! kernel plus white noise:
//!
//! `k(a, b) = s * exp(-|a - b|^2 / (2 l^2)) + n * [a == b]`
//!
//! Hyperparameters `(s, l, n)` maximize the log marginal likelihood. With only
//! a handful of points the likelihood surface is multimodal, so the search
//! runs Nelder-Mead in log space from the configured start plus seeded
//! random restarts and keeps the best optimum.

use crate::config::SurrogateSettings;
use crate::errors::{ScreenError, ScreenResult};
use crate::feature_scaler::{check_targets, matrix_from_rows, StandardScaler};
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Multipliers on the base jitter tried when the optimized kernel cannot be factored
const FALLBACK_JITTER: [f64; 5] = [1e2, 1e4, 1e6, 1e8, 1e10];

/// Kernel hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    pub signal_variance: f64,
    pub length_scale: f64,
    pub noise_variance: f64,
}

impl KernelParams {
    fn from_settings(settings: &SurrogateSettings) -> Self {
        Self {
            signal_variance: settings.initial_signal_variance,
            length_scale: settings.initial_length_scale,
            noise_variance: settings.initial_noise_variance,
        }
    }

    fn to_log(self) -> [f64; 3] {
        [
            self.signal_variance.ln(),
            self.length_scale.ln(),
            self.noise_variance.ln(),
        ]
    }

    fn from_log(theta: &[f64; 3]) -> Self {
        Self {
            signal_variance: theta[0].exp(),
            length_scale: theta[1].exp(),
            noise_variance: theta[2].exp(),
        }
    }

    /// Human-readable kernel expression
    pub fn describe(&self) -> String {
        format!(
            "{:.3}**2 * RBF(length_scale={:.3}) + WhiteKernel(noise_level={:.3e})",
            self.signal_variance.sqrt(),
            self.length_scale,
            self.noise_variance
        )
    }
}

/// Fit introspection reported alongside predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateDiagnostics {
    pub kernel: KernelParams,
    pub kernel_description: String,
    pub log_marginal_likelihood: f64,
    pub jitter: f64,
    pub restarts_evaluated: usize,
    pub used_fallback_jitter: bool,
}

/// Posterior predictions at query and training points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogatePrediction {
    pub predictions: Vec<f64>,
    pub uncertainties: Vec<f64>,
    pub train_predictions: Vec<f64>,
    pub train_uncertainties: Vec<f64>,
    pub train_targets: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_labels: Option<Vec<String>>,
    pub diagnostics: SurrogateDiagnostics,
}

impl SurrogatePrediction {
    /// Attach one label per query row
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.candidate_labels = Some(labels);
        self
    }
}

/// Factored training covariance for one set of hyperparameters
struct Posterior {
    chol: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    log_marginal_likelihood: f64,
}

fn squared_distance(x: &DMatrix<f64>, i: usize, z: &DMatrix<f64>, j: usize) -> f64 {
    (0..x.ncols()).map(|c| (x[(i, c)] - z[(j, c)]).powi(2)).sum()
}

/// Noise-free cross covariance, `a.nrows() x b.nrows()`
fn cross_covariance(a: &DMatrix<f64>, b: &DMatrix<f64>, params: &KernelParams) -> DMatrix<f64> {
    let two_l2 = 2.0 * params.length_scale * params.length_scale;
    DMatrix::from_fn(a.nrows(), b.nrows(), |i, j| {
        params.signal_variance * (-squared_distance(a, i, b, j) / two_l2).exp()
    })
}

fn condition(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    params: &KernelParams,
    jitter: f64,
) -> Option<Posterior> {
    let n = x.nrows();
    let mut k = cross_covariance(x, x, params);
    for i in 0..n {
        k[(i, i)] += params.noise_variance + jitter;
    }

    let chol = k.cholesky()?;
    let alpha = chol.solve(y);
    let half_log_det: f64 = chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
    let lml = -0.5 * y.dot(&alpha) - half_log_det - 0.5 * n as f64 * LN_2PI;

    if lml.is_finite() && alpha.iter().all(|a| a.is_finite()) {
        Some(Posterior {
            chol,
            alpha,
            log_marginal_likelihood: lml,
        })
    } else {
        None
    }
}

/// Bounded Nelder-Mead minimizer over three log-parameters
fn nelder_mead<F>(objective: F, start: [f64; 3], lower: f64, upper: f64, max_iterations: usize) -> ([f64; 3], f64)
where
    F: Fn(&[f64; 3]) -> f64,
{
    let clamp = |p: [f64; 3]| p.map(|v| v.clamp(lower, upper));

    let start = clamp(start);
    let mut simplex: Vec<([f64; 3], f64)> = Vec::with_capacity(4);
    simplex.push((start, objective(&start)));
    for d in 0..3 {
        let mut vertex = start;
        vertex[d] = if start[d] + 0.5 <= upper { start[d] + 0.5 } else { start[d] - 0.5 };
        simplex.push((vertex, objective(&vertex)));
    }

    for _ in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[3].1;
        if best.is_finite() && (worst - best).abs() < 1e-10 {
            break;
        }

        let mut centroid = [0.0; 3];
        for (vertex, _) in &simplex[..3] {
            for d in 0..3 {
                centroid[d] += vertex[d] / 3.0;
            }
        }
        let toward = |coef: f64| {
            let mut p = [0.0; 3];
            for d in 0..3 {
                p[d] = centroid[d] + coef * (simplex[3].0[d] - centroid[d]);
            }
            clamp(p)
        };

        let reflected = toward(-1.0);
        let f_reflected = objective(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = toward(-2.0);
            let f_expanded = objective(&expanded);
            simplex[3] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
        } else if f_reflected < simplex[2].1 {
            simplex[3] = (reflected, f_reflected);
        } else {
            let contracted = toward(0.5);
            let f_contracted = objective(&contracted);
            if f_contracted < simplex[3].1 {
                simplex[3] = (contracted, f_contracted);
            } else {
                let anchor = simplex[0].0;
                for entry in simplex.iter_mut().skip(1) {
                    let mut p = [0.0; 3];
                    for d in 0..3 {
                        p[d] = anchor[d] + 0.5 * (entry.0[d] - anchor[d]);
                    }
                    *entry = (p, objective(&p));
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    simplex[0]
}

/// A fitted Gaussian-process regressor
pub struct GaussianProcess {
    scaler: StandardScaler,
    x_train: DMatrix<f64>,
    y_train: Vec<f64>,
    params: KernelParams,
    jitter: f64,
    posterior: Posterior,
    restarts_evaluated: usize,
    used_fallback_jitter: bool,
}

impl GaussianProcess {
    /// Standardize `x`, optimize kernel hyperparameters and factor the posterior.
    pub fn fit(x: &[Vec<f64>], y: &[f64], settings: &SurrogateSettings) -> ScreenResult<Self> {
        if x.len() < 2 {
            return Err(ScreenError::insufficient_data("gaussian_process", 2, x.len()));
        }
        if x.len() != y.len() {
            return Err(ScreenError::invalid_input(
                "y_train",
                format!("{} targets for {} training rows", y.len(), x.len()),
            ));
        }
        let x_raw = matrix_from_rows(x, None, "x_train")?;
        if x_raw.ncols() == 0 {
            return Err(ScreenError::invalid_input("x_train", "training rows have no features"));
        }
        check_targets(y, "y_train")?;

        let (scaler, x_scaled) = StandardScaler::fit_transform(&x_raw);
        let y_vec = DVector::from_column_slice(y);

        let n = y.len() as f64;
        let y_mean = y.iter().sum::<f64>() / n;
        let y_var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n;
        let jitter = settings.alpha * y_var.max(f64::EPSILON);

        let lower = settings.lower_bound.ln();
        let upper = settings.upper_bound.ln();
        let objective = |theta: &[f64; 3]| {
            let params = KernelParams::from_log(theta);
            condition(&x_scaled, &y_vec, &params, jitter)
                .map(|p| -p.log_marginal_likelihood)
                .unwrap_or(f64::INFINITY)
        };

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let mut starts = vec![KernelParams::from_settings(settings).to_log()];
        for _ in 0..settings.restarts {
            starts.push([
                rng.random_range(lower..upper),
                rng.random_range(lower..upper),
                rng.random_range(lower..upper),
            ]);
        }

        let mut best: Option<([f64; 3], f64)> = None;
        for (i, start) in starts.iter().enumerate() {
            let (theta, value) = nelder_mead(&objective, *start, lower, upper, settings.max_iterations);
            debug!("GP start {} reached -lml {:.6}", i, value);
            if value.is_finite() && best.map_or(true, |(_, b)| value < b) {
                best = Some((theta, value));
            }
        }

        let optimized = best.and_then(|(theta, _)| {
            let params = KernelParams::from_log(&theta);
            condition(&x_scaled, &y_vec, &params, jitter).map(|p| (params, jitter, p))
        });

        let (params, jitter, posterior, used_fallback_jitter) = match optimized {
            Some((params, jitter, posterior)) => (params, jitter, posterior, false),
            None => {
                let params = KernelParams::from_settings(settings);
                warn!("GP hyperparameter search failed; falling back to default kernel with larger jitter");
                let mut recovered = None;
                for factor in FALLBACK_JITTER {
                    let larger = jitter * factor + settings.alpha * factor;
                    if let Some(posterior) = condition(&x_scaled, &y_vec, &params, larger) {
                        recovered = Some((larger, posterior));
                        break;
                    }
                }
                let (larger, posterior) = recovered.ok_or_else(|| {
                    ScreenError::numerical("gaussian_process", "covariance not positive definite after jitter fallback")
                })?;
                (params, larger, posterior, true)
            }
        };

        info!(
            "GP fitted on {} points: {} (lml {:.4})",
            y.len(),
            params.describe(),
            posterior.log_marginal_likelihood
        );

        Ok(Self {
            scaler,
            x_train: x_scaled,
            y_train: y.to_vec(),
            params,
            jitter,
            posterior,
            restarts_evaluated: starts.len(),
            used_fallback_jitter,
        })
    }

    fn predict_scaled(&self, xq: &DMatrix<f64>) -> (Vec<f64>, Vec<f64>) {
        let k_star = cross_covariance(xq, &self.x_train, &self.params);
        let prior = self.params.signal_variance + self.params.noise_variance;

        let mut means = Vec::with_capacity(xq.nrows());
        let mut stds = Vec::with_capacity(xq.nrows());
        for i in 0..xq.nrows() {
            let k_i: DVector<f64> = k_star.row(i).transpose();
            means.push(k_i.dot(&self.posterior.alpha));

            let reduction = k_i.dot(&self.posterior.chol.solve(&k_i));
            // round-off can push the variance slightly negative
            stds.push((prior - reduction).max(0.0).sqrt());
        }
        (means, stds)
    }

    /// Posterior mean and standard deviation at raw (unscaled) query rows
    pub fn predict(&self, x_query: &[Vec<f64>]) -> ScreenResult<(Vec<f64>, Vec<f64>)> {
        let raw = matrix_from_rows(x_query, Some(self.x_train.ncols()), "x_query")?;
        Ok(self.predict_scaled(&self.scaler.transform(&raw)))
    }

    /// Posterior mean and standard deviation at the training points
    pub fn predict_training(&self) -> (Vec<f64>, Vec<f64>) {
        self.predict_scaled(&self.x_train)
    }

    pub fn params(&self) -> KernelParams {
        self.params
    }

    pub fn diagnostics(&self) -> SurrogateDiagnostics {
        SurrogateDiagnostics {
            kernel: self.params,
            kernel_description: self.params.describe(),
            log_marginal_likelihood: self.posterior.log_marginal_likelihood,
            jitter: self.jitter,
            restarts_evaluated: self.restarts_evaluated,
            used_fallback_jitter: self.used_fallback_jitter,
        }
    }

    /// Predictions at the query rows plus the fit at the training rows
    pub fn prediction(&self, x_query: &[Vec<f64>]) -> ScreenResult<SurrogatePrediction> {
        let (predictions, uncertainties) = self.predict(x_query)?;
        let (train_predictions, train_uncertainties) = self.predict_training();

        Ok(SurrogatePrediction {
            predictions,
            uncertainties,
            train_predictions,
            train_uncertainties,
            train_targets: self.y_train.clone(),
            candidate_labels: None,
            diagnostics: self.diagnostics(),
        })
    }
}

/// Fit on the training set and predict at the query rows.
pub fn fit_predict(
    x_train: &[Vec<f64>],
    y_train: &[f64],
    x_query: &[Vec<f64>],
    settings: &SurrogateSettings,
) -> ScreenResult<SurrogatePrediction> {
    GaussianProcess::fit(x_train, y_train, settings)?.prediction(x_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ti_zr() -> (Vec<Vec<f64>>, Vec<f64>) {
        (
            vec![
                vec![1.54, 0.605, 2.0, 4.0, 47.87],
                vec![1.33, 0.72, 2.0, 4.0, 91.22],
            ],
            vec![-0.5871, -0.4683],
        )
    }

    #[test]
    fn test_predicts_candidates_with_nonnegative_uncertainty() {
        let (x, y) = ti_zr();
        let query = vec![
            vec![1.63, 0.54, 3.0, 5.0, 50.94],
            vec![2.36, 0.60, 4.0, 6.0, 183.84],
        ];

        let result = fit_predict(&x, &y, &query, &SurrogateSettings::default()).unwrap();
        assert_eq!(result.predictions.len(), 2);
        assert_eq!(result.uncertainties.len(), 2);
        assert!(result.uncertainties.iter().all(|u| *u >= 0.0));
        assert!(result.predictions.iter().all(|p| p.is_finite()));
        assert_eq!(result.train_predictions.len(), 2);
        assert_eq!(result.diagnostics.restarts_evaluated, 11);
    }

    #[test]
    fn test_rejects_single_point() {
        let result = fit_predict(&[vec![1.0]], &[0.5], &[vec![2.0]], &SurrogateSettings::default());
        assert!(matches!(result, Err(ScreenError::InsufficientData { actual: 1, .. })));
    }

    #[test]
    fn test_rejects_non_finite_and_mismatched_input() {
        let settings = SurrogateSettings::default();
        let x = vec![vec![1.0, 2.0], vec![2.0, 3.0]];

        let nan_target = fit_predict(&x, &[0.1, f64::NAN], &[], &settings);
        assert!(matches!(nan_target, Err(ScreenError::InvalidInput { .. })));

        let narrow_query = fit_predict(&x, &[0.1, 0.2], &[vec![1.0]], &settings);
        assert!(matches!(narrow_query, Err(ScreenError::InvalidInput { .. })));
    }

    #[test]
    fn test_duplicate_points_do_not_crash() {
        let x = vec![vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]];
        let y = vec![-0.4, -0.4, -0.4];
        let result = fit_predict(&x, &y, &[vec![2.0, 0.0]], &SurrogateSettings::default()).unwrap();
        assert!(result.uncertainties[0] >= 0.0);
        assert!(result.diagnostics.log_marginal_likelihood.is_finite());
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = ti_zr();
        let settings = SurrogateSettings::default();
        let a = GaussianProcess::fit(&x, &y, &settings).unwrap();
        let b = GaussianProcess::fit(&x, &y, &settings).unwrap();
        assert_eq!(a.params(), b.params());
    }

    #[test]
    fn test_interpolates_smooth_function() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64 * 0.5]).collect();
        let y: Vec<f64> = x.iter().map(|r| (r[0]).sin()).collect();
        let gp = GaussianProcess::fit(&x, &y, &SurrogateSettings::default()).unwrap();

        let (train_mean, _) = gp.predict_training();
        for (pred, actual) in train_mean.iter().zip(&y) {
            assert!((pred - actual).abs() < 0.1, "pred {pred} vs actual {actual}");
        }

        let (_, near) = gp.predict(&[vec![1.25]]).unwrap();
        let (_, far) = gp.predict(&[vec![25.0]]).unwrap();
        assert!(far[0] >= near[0]);
    }

    #[test]
    fn test_nelder_mead_finds_quadratic_minimum() {
        let f = |p: &[f64; 3]| (p[0] - 1.0).powi(2) + (p[1] + 2.0).powi(2) + (p[2] - 0.5).powi(2);
        let (best, value) = nelder_mead(f, [0.0, 0.0, 0.0], -10.0, 10.0, 500);
        assert!(value < 1e-6);
        assert!((best[0] - 1.0).abs() < 1e-2);
        assert!((best[1] + 2.0).abs() < 1e-2);
    }
}
