//! Static registry of candidate dopant elements
//!
//! The table is built once and never mutated; its insertion order defines the
//! order of candidates and of the feature columns for the life of the process.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Feature columns derived from a dopant record, in vector order.
pub const FEATURE_NAMES: [&str; 5] = [
    "electronegativity",
    "ionic_radius_ang",
    "d_electrons",
    "oxidation_state",
    "atomic_mass",
];

/// Physicochemical properties of a single dopant element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DopantRecord {
    pub element: String,
    pub atomic_number: u32,
    pub electronegativity: f64,
    pub ionic_radius_ang: f64,
    pub d_electrons: u32,
    pub oxidation_state: i32,
    pub atomic_mass: f64,
}

impl DopantRecord {
    fn new(
        element: &str,
        atomic_number: u32,
        electronegativity: f64,
        ionic_radius_ang: f64,
        d_electrons: u32,
        oxidation_state: i32,
        atomic_mass: f64,
    ) -> Self {
        Self {
            element: element.to_string(),
            atomic_number,
            electronegativity,
            ionic_radius_ang,
            d_electrons,
            oxidation_state,
            atomic_mass,
        }
    }

    /// Feature vector ordered as [`FEATURE_NAMES`]
    pub fn feature_vector(&self) -> Vec<f64> {
        vec![
            self.electronegativity,
            self.ionic_radius_ang,
            f64::from(self.d_electrons),
            f64::from(self.oxidation_state),
            self.atomic_mass,
        ]
    }
}

lazy_static! {
    static ref CATALOG: Vec<DopantRecord> = vec![
        DopantRecord::new("Ti", 22, 1.54, 0.605, 2, 4, 47.87),
        DopantRecord::new("Zr", 40, 1.33, 0.72, 2, 4, 91.22),
        DopantRecord::new("Hf", 72, 1.30, 0.71, 2, 4, 178.49),
        DopantRecord::new("V", 23, 1.63, 0.54, 3, 5, 50.94),
        DopantRecord::new("Nb", 41, 1.60, 0.64, 4, 5, 92.91),
        DopantRecord::new("Mo", 42, 2.16, 0.65, 5, 6, 95.95),
        DopantRecord::new("W", 74, 2.36, 0.60, 4, 6, 183.84),
        DopantRecord::new("Ce", 58, 1.12, 0.87, 1, 4, 140.12),
        DopantRecord::new("La", 57, 1.10, 1.032, 1, 3, 138.91),
        DopantRecord::new("Sn", 50, 1.96, 0.69, 0, 4, 118.71),
        DopantRecord::new("Al", 13, 1.61, 0.535, 0, 3, 26.98),
        DopantRecord::new("Fe", 26, 1.83, 0.645, 6, 3, 55.85),
    ];
}

/// An untested element with its feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateVector {
    pub element: String,
    pub features: Vec<f64>,
    pub properties: DopantRecord,
}

/// Candidates plus the feature names their vectors follow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCatalog {
    pub feature_names: Vec<String>,
    pub candidates: Vec<CandidateVector>,
}

impl CandidateCatalog {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate feature vectors as matrix rows
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.candidates.iter().map(|c| c.features.clone()).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.element.clone()).collect()
    }
}

/// All known dopants in catalog order
pub fn all_dopants() -> &'static [DopantRecord] {
    &CATALOG
}

/// Look up a dopant by its exact element symbol
pub fn lookup(element: &str) -> Option<&'static DopantRecord> {
    CATALOG.iter().find(|d| d.element == element)
}

/// Feature vectors for every element not in `exclude`.
///
/// Matching is case-sensitive. Excluding every element yields an empty
/// candidate list rather than an error.
pub fn list_candidates(exclude: &HashSet<String>) -> CandidateCatalog {
    let candidates = CATALOG
        .iter()
        .filter(|d| !exclude.contains(&d.element))
        .map(|d| CandidateVector {
            element: d.element.clone(),
            features: d.feature_vector(),
            properties: d.clone(),
        })
        .collect();

    CandidateCatalog {
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exclude(elements: &[&str]) -> HashSet<String> {
        elements.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_catalog() {
        let catalog = list_candidates(&HashSet::new());
        assert_eq!(catalog.len(), 12);
        assert_eq!(catalog.feature_names.len(), FEATURE_NAMES.len());
        assert_eq!(catalog.candidates[0].element, "Ti");
        assert_eq!(catalog.candidates[11].element, "Fe");
    }

    #[test]
    fn test_exclusion_is_case_sensitive() {
        let catalog = list_candidates(&exclude(&["Ti", "Zr"]));
        assert_eq!(catalog.len(), 10);
        assert!(catalog.candidates.iter().all(|c| c.element != "Ti" && c.element != "Zr"));

        let lowercase = list_candidates(&exclude(&["ti", "zr"]));
        assert_eq!(lowercase.len(), 12);
    }

    #[test]
    fn test_excluding_everything_returns_empty() {
        let everything: HashSet<String> = all_dopants().iter().map(|d| d.element.clone()).collect();
        let catalog = list_candidates(&everything);
        assert!(catalog.is_empty());
        assert!(catalog.feature_matrix().is_empty());
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let set = exclude(&["Mo"]);
        assert_eq!(list_candidates(&set), list_candidates(&set));
    }

    #[test]
    fn test_feature_vector_order() {
        let ti = lookup("Ti").expect("Ti is in the catalog");
        assert_eq!(ti.feature_vector(), vec![1.54, 0.605, 2.0, 4.0, 47.87]);
        assert!(lookup("Xx").is_none());
    }
}
