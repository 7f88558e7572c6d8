//! Langmuir/van't Hoff thermodynamics for H2 uptake
//!
//! Adsorption enthalpy is taken as the DFT adsorption energy; the entropy
//! change is the loss of the gas-phase standard entropy of H2. Pressures are
//! in bar against a 1 bar reference.

use crate::errors::{ScreenError, ScreenResult};
use serde::{Deserialize, Serialize};

/// Gas constant (J/(mol·K))
pub const R_J_MOL_K: f64 = 8.314;
/// Standard molar entropy of H2 (J/(mol·K))
pub const S0_H2: f64 = 130.68;
pub const EV_TO_KJ_MOL: f64 = 96.485;
pub const ZERO_CELSIUS_K: f64 = 273.15;
/// DOE operating window for onboard storage, in Celsius
pub const DOE_MIN_C: f64 = -40.0;
pub const DOE_MAX_C: f64 = 85.0;
pub const REFERENCE_TEMPERATURE_K: f64 = 298.15;

fn enthalpy_j_mol(e_ads_ev: f64) -> f64 {
    e_ads_ev * EV_TO_KJ_MOL * 1000.0
}

fn entropy_j_mol_k() -> f64 {
    -S0_H2
}

fn check_positive(field: &str, value: f64) -> ScreenResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ScreenError::invalid_input(field, format!("must be positive, got {value}")))
    }
}

/// Equilibrium coverage θ = KP / (1 + KP)
pub fn langmuir_coverage(e_ads_ev: f64, temperature_k: f64, pressure_bar: f64) -> ScreenResult<f64> {
    check_positive("temperature_k", temperature_k)?;
    check_positive("pressure_bar", pressure_bar)?;

    let ln_k = -(enthalpy_j_mol(e_ads_ev) - temperature_k * entropy_j_mol_k()) / (R_J_MOL_K * temperature_k);
    // logistic form stays finite when K overflows
    let ln_kp = ln_k + pressure_bar.ln();
    Ok(1.0 / (1.0 + (-ln_kp).exp()))
}

/// Temperature at which coverage falls to one half.
///
/// Returns +∞ when the denominator vanishes.
pub fn desorption_midpoint_t50(e_ads_ev: f64, pressure_bar: f64) -> ScreenResult<f64> {
    check_positive("pressure_bar", pressure_bar)?;
    let denominator = entropy_j_mol_k() + R_J_MOL_K * pressure_bar.ln();
    if denominator == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(enthalpy_j_mol(e_ads_ev) / denominator)
}

/// Sweep bounds and resolution
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepRange {
    pub min: f64,
    pub max: f64,
    pub points: usize,
}

impl SweepRange {
    pub fn pressure() -> Self {
        Self {
            min: 0.01,
            max: 100.0,
            points: 100,
        }
    }

    pub fn temperature() -> Self {
        Self {
            min: 200.0,
            max: 1000.0,
            points: 100,
        }
    }

    fn validate(&self, field: &str) -> ScreenResult<()> {
        check_positive(field, self.min)?;
        if !(self.max >= self.min) || !self.max.is_finite() {
            return Err(ScreenError::invalid_input(
                field,
                format!("max {} must be finite and at least min {}", self.max, self.min),
            ));
        }
        Ok(())
    }

    fn linspace(&self) -> Vec<f64> {
        match self.points {
            0 => Vec::new(),
            1 => vec![self.min],
            n => {
                let step = (self.max - self.min) / (n - 1) as f64;
                (0..n).map(|i| self.min + step * i as f64).collect()
            }
        }
    }

    fn logspace(&self) -> Vec<f64> {
        let exponents = SweepRange {
            min: self.min.log10(),
            max: self.max.log10(),
            points: self.points,
        };
        exponents.linspace().into_iter().map(|e| 10f64.powf(e)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressureSweep {
    pub pressures_bar: Vec<f64>,
    pub coverages: Vec<f64>,
    pub temperature_k: f64,
    pub e_ads_ev: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureSweep {
    pub temperatures_k: Vec<f64>,
    pub coverages: Vec<f64>,
    pub pressure_bar: f64,
    pub e_ads_ev: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct T50Sweep {
    pub pressures_bar: Vec<f64>,
    pub t50_k: Vec<f64>,
    pub e_ads_ev: f64,
}

/// Coverage over a log-spaced pressure grid at fixed temperature
pub fn coverage_vs_pressure(e_ads_ev: f64, temperature_k: f64, range: SweepRange) -> ScreenResult<PressureSweep> {
    range.validate("pressure_range")?;
    let pressures_bar = range.logspace();
    let coverages = pressures_bar
        .iter()
        .map(|&p| langmuir_coverage(e_ads_ev, temperature_k, p))
        .collect::<ScreenResult<Vec<_>>>()?;
    Ok(PressureSweep {
        pressures_bar,
        coverages,
        temperature_k,
        e_ads_ev,
    })
}

/// Coverage over a linear temperature grid at fixed pressure
pub fn coverage_vs_temperature(e_ads_ev: f64, pressure_bar: f64, range: SweepRange) -> ScreenResult<TemperatureSweep> {
    range.validate("temperature_range")?;
    let temperatures_k = range.linspace();
    let coverages = temperatures_k
        .iter()
        .map(|&t| langmuir_coverage(e_ads_ev, t, pressure_bar))
        .collect::<ScreenResult<Vec<_>>>()?;
    Ok(TemperatureSweep {
        temperatures_k,
        coverages,
        pressure_bar,
        e_ads_ev,
    })
}

pub fn t50_vs_pressure(e_ads_ev: f64, range: SweepRange) -> ScreenResult<T50Sweep> {
    range.validate("pressure_range")?;
    let pressures_bar = range.logspace();
    let t50_k = pressures_bar
        .iter()
        .map(|&p| desorption_midpoint_t50(e_ads_ev, p))
        .collect::<ScreenResult<Vec<_>>>()?;
    Ok(T50Sweep {
        pressures_bar,
        t50_k,
        e_ads_ev,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoeWindow {
    pub t50_k: f64,
    pub t50_c: f64,
    pub doe_min_c: f64,
    pub doe_max_c: f64,
    pub in_doe_window: bool,
    pub above_window: bool,
    pub below_window: bool,
}

pub fn doe_window_check(t50_k: f64) -> DoeWindow {
    let min_k = ZERO_CELSIUS_K + DOE_MIN_C;
    let max_k = ZERO_CELSIUS_K + DOE_MAX_C;
    DoeWindow {
        t50_k,
        t50_c: t50_k - ZERO_CELSIUS_K,
        doe_min_c: DOE_MIN_C,
        doe_max_c: DOE_MAX_C,
        in_doe_window: (min_k..=max_k).contains(&t50_k),
        above_window: t50_k > max_k,
        below_window: t50_k < min_k,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemThermo {
    pub system: String,
    pub e_ads_ev: f64,
    pub e_ads_kj_mol: f64,
    pub t50_k: f64,
    pub t50_c: f64,
    pub theta_298k: f64,
    pub in_doe_window: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermoComparison {
    pub pressure_bar: f64,
    pub systems: Vec<SystemThermo>,
    pub best_deliverability: Option<String>,
}

/// Compare systems by desorption midpoint; lower T50 releases H2 more easily.
/// Input order is kept among equal T50 values.
pub fn compare_systems(systems: &[(String, f64)], pressure_bar: f64) -> ScreenResult<ThermoComparison> {
    let mut rows = systems
        .iter()
        .map(|(label, e_ads)| -> ScreenResult<SystemThermo> {
            let t50_k = desorption_midpoint_t50(*e_ads, pressure_bar)?;
            Ok(SystemThermo {
                system: label.clone(),
                e_ads_ev: *e_ads,
                e_ads_kj_mol: e_ads * EV_TO_KJ_MOL,
                t50_k,
                t50_c: t50_k - ZERO_CELSIUS_K,
                theta_298k: langmuir_coverage(*e_ads, REFERENCE_TEMPERATURE_K, pressure_bar)?,
                in_doe_window: doe_window_check(t50_k).in_doe_window,
            })
        })
        .collect::<ScreenResult<Vec<_>>>()?;
    rows.sort_by(|a, b| a.t50_k.total_cmp(&b.t50_k));

    Ok(ThermoComparison {
        pressure_bar,
        best_deliverability: rows.first().map(|r| r.system.clone()),
        systems: rows,
    })
}
