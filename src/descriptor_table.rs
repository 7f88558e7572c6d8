//! Electronic-structure descriptor tables
//!
//! A project's `descriptors.csv` has one row per computed system, keyed by a
//! `system_label` column. A column is numeric when every non-empty cell parses
//! as a float; empty cells are missing values.

use crate::dopant_catalog::{lookup, DopantRecord};
use crate::errors::{ScreenError, ScreenResult};
use crate::feature_importance::pearson;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

pub const LABEL_COLUMN: &str = "system_label";

/// Adsorption-energy column names, in lookup order
pub const ENERGY_COLUMNS: [&str; 5] = ["E_ads_eV", "E_ads", "Eads_eV", "Eads", "adsorption_energy"];

/// Total energies that make up an adsorption energy; never used as features
pub const ENERGY_COMPONENT_COLUMNS: [&str; 6] = [
    "E_surface_eV",
    "E_surface+H2_eV",
    "E_H2_eV",
    "E_surface",
    "E_surface+H2",
    "E_H2",
];

/// Label suffixes marking the adsorbed partner of a bare system
const ADSORBED_SUFFIXES: [&str; 5] = ["-H2", "_H2", "-ads", "_ads", "-adsorbed"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl NumericColumn {
    fn present(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorTable {
    labels: Vec<String>,
    columns: Vec<NumericColumn>,
    text_columns: Vec<String>,
    fingerprint: String,
}

/// Rows with a measured target and the descriptor columns usable as features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingView {
    pub target_column: String,
    pub labels: Vec<String>,
    pub feature_names: Vec<String>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsorptionEnergies {
    pub column: String,
    /// (system label, E_ads) in table order
    pub data: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub range: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub num_systems: usize,
    pub system_labels: Vec<String>,
    pub num_descriptors: usize,
    pub descriptors: Vec<String>,
    pub descriptor_stats: Vec<ColumnStats>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsorptionShift {
    pub base: String,
    pub adsorbed: String,
    /// adsorbed minus bare, for columns present in both rows
    pub shifts: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorShifts {
    pub pairs_found: usize,
    pub pairs: Vec<AdsorptionShift>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl DescriptorTable {
    /// Read and parse a descriptor CSV from disk.
    pub fn load(path: &Path) -> ScreenResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScreenError::not_found("descriptor table", path.display().to_string())
            } else {
                ScreenError::io(format!("read {}", path.display()), e)
            }
        })?;
        debug!("Loaded {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> ScreenResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ScreenError::csv("read header", e))?
            .iter()
            .map(str::to_string)
            .collect();
        let label_index = headers
            .iter()
            .position(|h| h == LABEL_COLUMN)
            .ok_or_else(|| ScreenError::invalid_input("csv", format!("missing required column '{LABEL_COLUMN}'")))?;

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (row_number, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ScreenError::csv(format!("row {}", row_number + 1), e))?;
            for (j, column) in cells.iter_mut().enumerate() {
                column.push(record.get(j).unwrap_or("").to_string());
            }
        }

        let labels = std::mem::take(&mut cells[label_index]);
        let mut columns = Vec::new();
        let mut text_columns = Vec::new();
        for (j, (name, raw)) in headers.into_iter().zip(cells).enumerate() {
            if j == label_index {
                continue;
            }
            let parsed: Option<Vec<Option<f64>>> = raw
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Some(None)
                    } else {
                        cell.parse::<f64>().ok().map(Some)
                    }
                })
                .collect();
            match parsed {
                Some(values) => columns.push(NumericColumn { name, values }),
                None => text_columns.push(name),
            }
        }

        Ok(Self {
            labels,
            columns,
            text_columns,
            fingerprint: sha256_hex(bytes),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// SHA-256 of the raw CSV bytes
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn column(&self, name: &str) -> Option<&NumericColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn text_column_names(&self) -> &[String] {
        &self.text_columns
    }

    pub fn energy_column(&self) -> Option<&str> {
        ENERGY_COLUMNS
            .iter()
            .copied()
            .find(|name| self.column(name).is_some())
    }

    /// Systems with a finite adsorption energy
    pub fn adsorption_energies(&self) -> Option<AdsorptionEnergies> {
        let column = self.column(self.energy_column()?)?;
        let data = self
            .labels
            .iter()
            .zip(&column.values)
            .filter_map(|(label, value)| match value {
                Some(v) if v.is_finite() => Some((label.clone(), *v)),
                _ => None,
            })
            .collect();
        Some(AdsorptionEnergies {
            column: column.name.clone(),
            data,
        })
    }

    /// Training rows and feature columns for the adsorption-energy models.
    ///
    /// Features are the numeric columns other than the target and energy
    /// components that have no missing values in the training rows.
    pub fn training_view(&self) -> ScreenResult<TrainingView> {
        let target_name = self
            .energy_column()
            .ok_or_else(|| ScreenError::not_found("adsorption energy column", ENERGY_COLUMNS.join(", ")))?;
        let target = self
            .column(target_name)
            .ok_or_else(|| ScreenError::internal(format!("column {target_name} vanished")))?;

        let rows: Vec<usize> = target
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some_and(f64::is_finite))
            .map(|(i, _)| i)
            .collect();

        let features: Vec<&NumericColumn> = self
            .columns
            .iter()
            .filter(|c| c.name != target_name && !ENERGY_COMPONENT_COLUMNS.contains(&c.name.as_str()))
            .filter(|c| rows.iter().all(|&i| c.values[i].is_some_and(f64::is_finite)))
            .collect();

        let x = rows
            .iter()
            .map(|&i| features.iter().map(|c| c.values[i].unwrap_or(f64::NAN)).collect())
            .collect();
        let y = rows.iter().map(|&i| target.values[i].unwrap_or(f64::NAN)).collect();

        Ok(TrainingView {
            target_column: target_name.to_string(),
            labels: rows.iter().map(|&i| self.labels[i].clone()).collect(),
            feature_names: features.iter().map(|c| c.name.clone()).collect(),
            x,
            y,
        })
    }

    pub fn summary(&self) -> DatasetSummary {
        let descriptor_stats = self
            .columns
            .iter()
            .filter_map(|c| {
                let values = c.present();
                if values.is_empty() {
                    return None;
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Some(ColumnStats {
                    name: c.name.clone(),
                    min,
                    max,
                    mean: values.iter().sum::<f64>() / values.len() as f64,
                    range: max - min,
                })
            })
            .collect();

        DatasetSummary {
            num_systems: self.len(),
            system_labels: self.labels.clone(),
            num_descriptors: self.columns.len(),
            descriptors: self.numeric_column_names(),
            descriptor_stats,
            fingerprint: self.fingerprint.clone(),
        }
    }

    /// All numeric values of one system; missing cells map to None
    pub fn system(&self, label: &str) -> ScreenResult<BTreeMap<String, Option<f64>>> {
        let row = self
            .labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| ScreenError::not_found("system", format!("{label} (available: {})", self.labels.join(", "))))?;
        Ok(self
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.values[row]))
            .collect())
    }

    /// Pairwise Pearson correlations over rows where both columns are present.
    /// Columns with no values at all are left out; constant pairs score 0.
    pub fn correlation_matrix(&self) -> CorrelationMatrix {
        let usable: Vec<&NumericColumn> = self
            .columns
            .iter()
            .filter(|c| c.values.iter().any(Option::is_some))
            .collect();

        let matrix = usable
            .iter()
            .map(|a| {
                usable
                    .iter()
                    .map(|b| {
                        if a.name == b.name {
                            return 1.0;
                        }
                        let (xs, ys): (Vec<f64>, Vec<f64>) = a
                            .values
                            .iter()
                            .zip(&b.values)
                            .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                            .unzip();
                        pearson(&xs, &ys)
                    })
                    .collect()
            })
            .collect();

        CorrelationMatrix {
            columns: usable.iter().map(|c| c.name.clone()).collect(),
            matrix,
        }
    }

    /// Descriptor changes on adsorption for bare/adsorbed label pairs such as
    /// `X` and `X-H2`.
    pub fn descriptor_shifts(&self) -> DescriptorShifts {
        let mut pairs = Vec::new();
        for (ads_row, label) in self.labels.iter().enumerate() {
            let base_row = ADSORBED_SUFFIXES.iter().find_map(|suffix| {
                let base = label.strip_suffix(suffix)?;
                self.labels.iter().position(|l| l == base)
            });
            let Some(base_row) = base_row else {
                continue;
            };
            let shifts = self
                .columns
                .iter()
                .filter_map(|c| match (c.values[base_row], c.values[ads_row]) {
                    (Some(bare), Some(adsorbed)) => Some((c.name.clone(), adsorbed - bare)),
                    _ => None,
                })
                .collect();
            pairs.push(AdsorptionShift {
                base: self.labels[base_row].clone(),
                adsorbed: label.clone(),
                shifts,
            });
        }

        DescriptorShifts {
            pairs_found: pairs.len(),
            note: pairs.is_empty().then(|| "No adsorption pairs detected".to_string()),
            pairs,
        }
    }
}

/// Dopant elements already covered by the labelled systems
pub fn tested_elements(labels: &[String]) -> HashSet<String> {
    let mut tested = HashSet::new();
    for label in labels {
        let lower = label.to_lowercase();
        if lower.contains("zr") {
            tested.insert("Zr".to_string());
        }
        if lower.contains("ti") {
            tested.insert("Ti".to_string());
        }
    }
    tested
}

/// Dopant whose properties stand in for a labelled system: Zr-containing
/// systems map to Zr, everything else to the Ti host.
pub fn provenance_record(label: &str) -> ScreenResult<&'static DopantRecord> {
    let symbol = if label.to_lowercase().contains("zr") { "Zr" } else { "Ti" };
    lookup(symbol).ok_or_else(|| ScreenError::internal(format!("{symbol} missing from dopant catalog")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
system_label , band_gap_eV, d_band_center, E_surface_eV, E_ads_eV, note
TiO2_pristine, 3.2, -2.1, -100.0, -0.30, reference
1Zr-TiO2, 3.1, -1.9, -101.5, -0.45, dilute
2Zr-TiO2, 3.0, -1.8, -102.0, -0.52,
TiO2_pristine-H2, 3.3, -2.4, , , adsorbed
";

    fn table() -> DescriptorTable {
        DescriptorTable::from_bytes(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_trims_and_types_columns() {
        let t = table();
        assert_eq!(t.len(), 4);
        assert_eq!(t.labels()[0], "TiO2_pristine");
        assert_eq!(
            t.numeric_column_names(),
            vec!["band_gap_eV", "d_band_center", "E_surface_eV", "E_ads_eV"]
        );
        assert_eq!(t.text_column_names(), ["note".to_string()]);
        assert_eq!(t.column("E_ads_eV").unwrap().values[3], None);
        assert_eq!(t.fingerprint().len(), 64);
    }

    #[test]
    fn test_missing_label_column() {
        let result = DescriptorTable::from_bytes(b"name,E_ads\nx,1.0\n");
        assert!(matches!(result, Err(ScreenError::InvalidInput { .. })));
    }

    #[test]
    fn test_training_view_excludes_target_and_components() {
        let view = table().training_view().unwrap();
        assert_eq!(view.target_column, "E_ads_eV");
        assert_eq!(view.labels, vec!["TiO2_pristine", "1Zr-TiO2", "2Zr-TiO2"]);
        assert_eq!(view.feature_names, vec!["band_gap_eV", "d_band_center"]);
        assert_eq!(view.x[1], vec![3.1, -1.9]);
        assert_eq!(view.y, vec![-0.30, -0.45, -0.52]);
    }

    #[test]
    fn test_energy_column_priority_and_absence() {
        let t = DescriptorTable::from_bytes(b"system_label,Eads,E_ads\na,1.0,2.0\n").unwrap();
        assert_eq!(t.energy_column(), Some("E_ads"));

        let none = DescriptorTable::from_bytes(b"system_label,gap\na,1.0\n").unwrap();
        assert!(none.adsorption_energies().is_none());
        assert!(matches!(none.training_view(), Err(ScreenError::NotFound { .. })));
    }

    #[test]
    fn test_feature_with_gap_in_training_rows_is_dropped() {
        let csv = "system_label,gap,E_ads\na,1.0,-0.1\nb,,-0.2\nc,3.0,\n";
        let view = DescriptorTable::from_bytes(csv.as_bytes()).unwrap().training_view().unwrap();
        assert!(view.feature_names.is_empty());
        assert_eq!(view.y.len(), 2);
    }

    #[test]
    fn test_summary_and_system_lookup() {
        let t = table();
        let summary = t.summary();
        assert_eq!(summary.num_systems, 4);
        assert_eq!(summary.num_descriptors, 4);
        let gap = &summary.descriptor_stats[0];
        assert_eq!(gap.name, "band_gap_eV");
        assert!((gap.range - 0.3).abs() < 1e-12);
        assert!((gap.mean - 3.15).abs() < 1e-12);

        let row = t.system("1Zr-TiO2").unwrap();
        assert_eq!(row["E_ads_eV"], Some(-0.45));
        assert!(matches!(t.system("nope"), Err(ScreenError::NotFound { .. })));
    }

    #[test]
    fn test_correlation_and_shifts() {
        let t = table();
        let corr = t.correlation_matrix();
        assert_eq!(corr.columns.len(), 4);
        assert_eq!(corr.matrix[0][0], 1.0);
        assert!((corr.matrix[0][1] - corr.matrix[1][0]).abs() < 1e-12);

        let shifts = t.descriptor_shifts();
        assert_eq!(shifts.pairs_found, 1);
        assert_eq!(shifts.pairs[0].base, "TiO2_pristine");
        assert!((shifts.pairs[0].shifts["d_band_center"] + 0.3).abs() < 1e-12);
        assert!(!shifts.pairs[0].shifts.contains_key("E_ads_eV"));
    }

    #[test]
    fn test_tested_elements_and_provenance() {
        let labels = vec!["TiO2_pristine".to_string(), "1Zr-TiO2".to_string()];
        let tested = tested_elements(&labels);
        assert!(tested.contains("Ti") && tested.contains("Zr"));
        assert_eq!(tested.len(), 2);

        assert_eq!(provenance_record("2ZR-TiO2").unwrap().element, "Zr");
        assert_eq!(provenance_record("TiO2_pristine").unwrap().element, "Ti");
    }
}
