//! Energy decomposition terms relative to the pristine reference system

use crate::errors::{ScreenError, ScreenResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const SYSTEM_COLUMN: &str = "system";

pub const DECOMPOSITION_TERMS: [&str; 4] = ["E_elec_eV", "E_rep_eV", "E_disp_eV", "E_total_eV"];

/// One system's raw terms and their shift against the reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionEntry {
    pub system: String,
    pub terms: BTreeMap<String, Option<f64>>,
    /// Keyed `d<term>`; missing when either value is missing
    pub shifts: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyDecomposition {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub energy_columns: Vec<String>,
    pub systems: Vec<DecompositionEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EnergyDecomposition {
    fn not_found(note: &str) -> Self {
        Self {
            found: false,
            reference: None,
            energy_columns: Vec::new(),
            systems: Vec::new(),
            note: Some(note.to_string()),
        }
    }

    /// Read a decomposition file. A missing file is reported, not an error.
    pub fn load(path: &Path) -> ScreenResult<Self> {
        if !path.is_file() {
            debug!("No energy decomposition at {}", path.display());
            return Ok(Self::not_found("No energy_decomposition.csv in project"));
        }
        let bytes = std::fs::read(path).map_err(|e| ScreenError::io(format!("read {}", path.display()), e))?;
        Self::from_bytes(&bytes)
    }

    /// Shifts are taken against the first system whose name contains
    /// "pristine", case-insensitively.
    pub fn from_bytes(bytes: &[u8]) -> ScreenResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes);
        let headers = reader
            .headers()
            .map_err(|e| ScreenError::csv("read decomposition header", e))?
            .clone();

        let system_index = headers
            .iter()
            .position(|h| h == SYSTEM_COLUMN)
            .ok_or_else(|| ScreenError::invalid_input("energy_decomposition", "missing required column 'system'"))?;
        let term_indices = DECOMPOSITION_TERMS
            .iter()
            .map(|term| {
                headers.iter().position(|h| h == *term).ok_or_else(|| {
                    ScreenError::invalid_input("energy_decomposition", format!("missing required column '{term}'"))
                })
            })
            .collect::<ScreenResult<Vec<_>>>()?;

        let mut rows: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        for (row_number, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ScreenError::csv(format!("decomposition row {}", row_number + 1), e))?;
            let system = record.get(system_index).unwrap_or("").to_string();
            let values = term_indices
                .iter()
                .map(|&j| record.get(j).and_then(|cell| cell.parse::<f64>().ok()))
                .collect();
            rows.push((system, values));
        }

        let Some((reference, reference_values)) = rows
            .iter()
            .find(|(system, _)| system.to_lowercase().contains("pristine"))
            .cloned()
        else {
            return Ok(Self::not_found("No pristine reference system found"));
        };

        let systems = rows
            .into_iter()
            .map(|(system, values)| {
                let mut terms = BTreeMap::new();
                let mut shifts = BTreeMap::new();
                for ((term, value), base) in DECOMPOSITION_TERMS.iter().zip(&values).zip(&reference_values) {
                    terms.insert(term.to_string(), *value);
                    let shift = match (value, base) {
                        (Some(v), Some(b)) => Some(v - b),
                        _ => None,
                    };
                    shifts.insert(format!("d{term}"), shift);
                }
                DecompositionEntry { system, terms, shifts }
            })
            .collect();

        Ok(Self {
            found: true,
            reference: Some(reference),
            energy_columns: DECOMPOSITION_TERMS.iter().map(|t| t.to_string()).collect(),
            systems,
            note: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
system, E_elec_eV, E_rep_eV, E_disp_eV, E_total_eV
Zr-doped, -10.5, 4.0, -0.8, -7.3
TiO2_Pristine, -10.0, 3.5, -0.5, -7.0
Hf-doped, -10.2, , -0.6, -7.1
";

    #[test]
    fn test_shifts_against_pristine_reference() {
        let decomposition = EnergyDecomposition::from_bytes(CSV.as_bytes()).unwrap();
        assert!(decomposition.found);
        assert_eq!(decomposition.reference.as_deref(), Some("TiO2_Pristine"));
        assert_eq!(decomposition.systems.len(), 3);

        let zr = &decomposition.systems[0];
        assert_eq!(zr.system, "Zr-doped");
        assert_eq!(zr.terms["E_elec_eV"], Some(-10.5));
        assert!((zr.shifts["dE_elec_eV"].unwrap() + 0.5).abs() < 1e-12);
        assert!((zr.shifts["dE_rep_eV"].unwrap() - 0.5).abs() < 1e-12);
        assert!((zr.shifts["dE_total_eV"].unwrap() + 0.3).abs() < 1e-12);

        let reference = &decomposition.systems[1];
        assert!(reference.shifts.values().all(|s| *s == Some(0.0)));

        // a blank term has no shift
        let hf = &decomposition.systems[2];
        assert_eq!(hf.terms["E_rep_eV"], None);
        assert_eq!(hf.shifts["dE_rep_eV"], None);
    }

    #[test]
    fn test_no_pristine_row() {
        let csv = "system,E_elec_eV,E_rep_eV,E_disp_eV,E_total_eV\nZr-doped,-10.5,4.0,-0.8,-7.3\n";
        let decomposition = EnergyDecomposition::from_bytes(csv.as_bytes()).unwrap();
        assert!(!decomposition.found);
        assert!(decomposition.systems.is_empty());
        assert_eq!(decomposition.note.as_deref(), Some("No pristine reference system found"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let decomposition = EnergyDecomposition::load(&dir.path().join("energy_decomposition.csv")).unwrap();
        assert!(!decomposition.found);
        assert_eq!(decomposition.note.as_deref(), Some("No energy_decomposition.csv in project"));
    }

    #[test]
    fn test_missing_columns_are_invalid() {
        let err = EnergyDecomposition::from_bytes(b"label,E_elec_eV\npristine,1.0\n").unwrap_err();
        assert!(matches!(err, ScreenError::InvalidInput { .. }));
        let err = EnergyDecomposition::from_bytes(b"system,E_elec_eV\npristine,1.0\n").unwrap_err();
        assert!(err.to_string().contains("E_rep_eV"));
    }
}
