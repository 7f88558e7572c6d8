//! Active-learning ranking of untested dopants

use crate::config::SurrogateSettings;
use crate::dopant_catalog::{CandidateCatalog, DopantRecord};
use crate::errors::ScreenResult;
use crate::gp_surrogate::{GaussianProcess, SurrogateDiagnostics};
use crate::rationale::generate_rationale;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Rule used to order candidates for the next experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionPolicy {
    /// Pure exploration: highest predictive standard deviation first
    #[default]
    MaxUncertainty,
}

impl AcquisitionPolicy {
    pub fn criterion(&self) -> &'static str {
        match self {
            AcquisitionPolicy::MaxUncertainty => {
                "Maximum GP uncertainty (most informative for model improvement)"
            }
        }
    }
}

/// A scored candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub element: String,
    pub predicted_e_ads_ev: f64,
    pub uncertainty_ev: f64,
    pub properties: DopantRecord,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub ranked_candidates: Vec<CandidateScore>,
    pub most_informative: Option<String>,
    pub selection_criterion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surrogate: Option<SurrogateDiagnostics>,
}

impl Ranking {
    fn empty(policy: AcquisitionPolicy) -> Self {
        Self {
            ranked_candidates: Vec::new(),
            most_informative: None,
            selection_criterion: policy.criterion().to_string(),
            surrogate: None,
        }
    }
}

/// Rank catalog candidates for the next experiment.
///
/// Training data is validated even when there is nothing to rank; an empty
/// catalog yields an empty ranking.
pub fn suggest_next(
    x_train: &[Vec<f64>],
    y_train: &[f64],
    catalog: &CandidateCatalog,
    policy: AcquisitionPolicy,
    settings: &SurrogateSettings,
) -> ScreenResult<Ranking> {
    let gp = GaussianProcess::fit(x_train, y_train, settings)?;
    rank_candidates(&gp, catalog, policy)
}

/// Uncertainty as compared when ranking, at 1e-4 eV resolution
fn ranking_key(uncertainty_ev: f64) -> f64 {
    (uncertainty_ev * 1e4).round() / 1e4
}

fn sort_candidates(ranked: &mut [CandidateScore], policy: AcquisitionPolicy) {
    match policy {
        // stable: ties at the rounded resolution keep catalog order
        AcquisitionPolicy::MaxUncertainty => {
            ranked.sort_by(|a, b| ranking_key(b.uncertainty_ev).total_cmp(&ranking_key(a.uncertainty_ev)))
        }
    }
}

/// Rank catalog candidates with an already fitted surrogate.
pub fn rank_candidates(
    gp: &GaussianProcess,
    catalog: &CandidateCatalog,
    policy: AcquisitionPolicy,
) -> ScreenResult<Ranking> {
    if catalog.is_empty() {
        info!("No untested candidates left to rank");
        return Ok(Ranking::empty(policy));
    }

    let (means, stds) = gp.predict(&catalog.feature_matrix())?;

    let mut ranked: Vec<CandidateScore> = catalog
        .candidates
        .iter()
        .zip(means.into_iter().zip(stds))
        .map(|(candidate, (mean, std))| CandidateScore {
            element: candidate.element.clone(),
            predicted_e_ads_ev: mean,
            uncertainty_ev: std,
            properties: candidate.properties.clone(),
            rationale: generate_rationale(&candidate.properties),
        })
        .collect();

    sort_candidates(&mut ranked, policy);

    let most_informative = ranked.first().map(|c| c.element.clone());
    info!(
        "Ranked {} candidates; most informative: {}",
        ranked.len(),
        most_informative.as_deref().unwrap_or("none")
    );

    Ok(Ranking {
        ranked_candidates: ranked,
        most_informative,
        selection_criterion: policy.criterion().to_string(),
        surrogate: Some(gp.diagnostics()),
    })
}
