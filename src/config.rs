// Runtime configuration for dopant screening
// Defaults are serialized into figment first, then overridden by file and env.

use crate::active_learning::AcquisitionPolicy;
use crate::errors::{ScreenError, ScreenResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub data_dir: String,
    #[serde(default)]
    pub acquisition: AcquisitionPolicy,
    #[serde(default)]
    pub surrogate: SurrogateSettings,
    #[serde(default)]
    pub symbolic: SymbolicSettings,
    #[serde(default)]
    pub thermo: ThermoSettings,
}

/// Gaussian-process hyperparameter search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateSettings {
    /// Random restarts on top of the default starting point
    pub restarts: usize,
    pub seed: u64,
    /// Nelder-Mead iterations per start
    pub max_iterations: usize,
    /// Diagonal jitter relative to the target variance
    pub alpha: f64,
    /// Bounds applied to every kernel hyperparameter
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub initial_signal_variance: f64,
    pub initial_length_scale: f64,
    pub initial_noise_variance: f64,
}

impl Default for SurrogateSettings {
    fn default() -> Self {
        Self {
            restarts: 10,
            seed: 42,
            max_iterations: 400,
            alpha: 1e-6,
            lower_bound: 1e-5,
            upper_bound: 1e5,
            initial_signal_variance: 1.0,
            initial_length_scale: 1.0,
            initial_noise_variance: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolicSettings {
    /// Use the equation search when it is compiled in
    pub enabled: bool,
    pub max_complexity: usize,
    pub iterations: usize,
    pub population_size: usize,
    pub seed: u64,
}

impl Default for SymbolicSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_complexity: 10,
            iterations: 40,
            population_size: 120,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermoSettings {
    pub default_pressure_bar: f64,
    /// Temperature of the CLI coverage-vs-pressure sweep. System comparisons
    /// always report coverage at 298.15 K.
    pub reference_temperature_k: f64,
}

impl Default for ThermoSettings {
    fn default() -> Self {
        Self {
            default_pressure_bar: 1.0,
            reference_temperature_k: 298.15,
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/projects".to_string(),
            surrogate: SurrogateSettings::default(),
            symbolic: SymbolicSettings::default(),
            acquisition: AcquisitionPolicy::default(),
            thermo: ThermoSettings::default(),
        }
    }
}

impl ScreenConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> ScreenResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ScreenError::config("data_dir cannot be empty"));
        }
        if self.surrogate.restarts < 5 {
            return Err(ScreenError::config("surrogate.restarts must be at least 5"));
        }
        if self.surrogate.max_iterations == 0 {
            return Err(ScreenError::config("surrogate.max_iterations must be positive"));
        }
        if !(self.surrogate.alpha > 0.0) {
            return Err(ScreenError::config("surrogate.alpha must be positive"));
        }
        if !(self.surrogate.lower_bound > 0.0 && self.surrogate.lower_bound < self.surrogate.upper_bound) {
            return Err(ScreenError::config(
                "surrogate bounds must satisfy 0 < lower_bound < upper_bound",
            ));
        }
        if self.symbolic.max_complexity == 0 {
            return Err(ScreenError::config("symbolic.max_complexity must be at least 1"));
        }
        if self.symbolic.population_size < 2 {
            return Err(ScreenError::config("symbolic.population_size must be at least 2"));
        }
        if !(self.thermo.default_pressure_bar > 0.0) {
            return Err(ScreenError::config("thermo.default_pressure_bar must be positive"));
        }
        if !(self.thermo.reference_temperature_k > 0.0) {
            return Err(ScreenError::config("thermo.reference_temperature_k must be positive"));
        }
        Ok(())
    }
}
