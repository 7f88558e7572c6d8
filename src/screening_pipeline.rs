//! screening_pipeline.rs
//! Runs every analysis over a project's descriptor table and collects the
//! outcomes into one report. A failing analysis is recorded and the rest
//! still run.

use crate::active_learning::{rank_candidates, CandidateScore, Ranking};
use crate::config::ScreenConfig;
use crate::descriptor_table::{provenance_record, tested_elements, TrainingView};
use crate::dopant_catalog::{list_candidates, CandidateCatalog};
use crate::errors::{ScreenError, ScreenResult};
use crate::feature_importance::{analyze, FeatureImportanceReport};
use crate::gp_surrogate::{GaussianProcess, SurrogatePrediction};
use crate::narrative::{DigestNarrator, NarrativeSynthesizer};
use crate::project_context::ProjectContext;
use crate::query_router::{KeywordClassifier, QueryClassifier, TopicTag};
use crate::symbolic::{detect_fit_engine, FitBudget, FitEngine, FitProblem, FitReport};
use crate::table_cache::TableCache;
use crate::thermo::{compare_systems, ThermoComparison};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Entries kept per ranked list in a summary
const SUMMARY_TOP_N: usize = 5;

/// Result of one analysis within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome<T> {
    Completed(T),
    Failed { error: String },
    Skipped { reason: String },
}

impl<T> AnalysisOutcome<T> {
    fn record(analysis: &str, result: ScreenResult<T>) -> Self {
        match result {
            Ok(value) => AnalysisOutcome::Completed(value),
            Err(e) => {
                warn!("Analysis {} failed: {}", analysis, e);
                AnalysisOutcome::Failed { error: e.to_string() }
            }
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            AnalysisOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, AnalysisOutcome::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AnalysisOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, AnalysisOutcome::Skipped { .. })
    }

    fn error(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub topics: Vec<TopicTag>,
    pub table_fingerprint: String,
    pub target_column: String,
    pub training_labels: Vec<String>,
    pub feature_names: Vec<String>,
    pub feature_importance: AnalysisOutcome<FeatureImportanceReport>,
    pub symbolic_fit: AnalysisOutcome<FitReport>,
    pub gp_predictions: AnalysisOutcome<SurrogatePrediction>,
    pub active_learning: AnalysisOutcome<Ranking>,
    pub thermo: AnalysisOutcome<ThermoComparison>,
    pub narrative: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAnalysis {
    pub analysis: String,
    pub error: String,
}

/// Compact view of a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningSummary {
    pub project: String,
    pub n_datapoints: usize,
    pub feature_names: Vec<String>,
    pub topics: Vec<TopicTag>,
    pub method: Option<String>,
    pub best_equation: Option<String>,
    pub most_important: Option<String>,
    pub ranked_features: Vec<String>,
    pub most_informative: Option<String>,
    pub ranked_candidates: Vec<CandidateScore>,
    pub selection_criterion: Option<String>,
    pub best_deliverability: Option<String>,
    pub failures: Vec<FailedAnalysis>,
}

impl ScreeningReport {
    pub fn summary(&self) -> ScreeningSummary {
        let importance = self.feature_importance.completed();
        let fit = self.symbolic_fit.completed();
        let ranking = self.active_learning.completed();

        let failures = [
            ("feature_importance", self.feature_importance.error()),
            ("symbolic_fit", self.symbolic_fit.error()),
            ("gp_predictions", self.gp_predictions.error()),
            ("active_learning", self.active_learning.error()),
            ("thermo", self.thermo.error()),
        ]
        .into_iter()
        .filter_map(|(analysis, error)| {
            error.map(|e| FailedAnalysis {
                analysis: analysis.to_string(),
                error: e.to_string(),
            })
        })
        .collect();

        ScreeningSummary {
            project: self.project.clone(),
            n_datapoints: self.training_labels.len(),
            feature_names: self.feature_names.clone(),
            topics: self.topics.clone(),
            method: fit.map(|f| f.method.clone()),
            best_equation: fit.map(|f| f.best_equation.clone()),
            most_important: importance.and_then(|r| r.most_important.clone()),
            ranked_features: importance
                .map(|r| {
                    r.ranked_features
                        .iter()
                        .take(SUMMARY_TOP_N)
                        .map(|f| f.feature.clone())
                        .collect()
                })
                .unwrap_or_default(),
            most_informative: ranking.and_then(|r| r.most_informative.clone()),
            ranked_candidates: ranking
                .map(|r| r.ranked_candidates.iter().take(SUMMARY_TOP_N).cloned().collect())
                .unwrap_or_default(),
            selection_criterion: ranking.map(|r| r.selection_criterion.clone()),
            best_deliverability: self.thermo.completed().and_then(|t| t.best_deliverability.clone()),
            failures,
        }
    }
}

/// Owns the long-lived services a screening run needs
pub struct ScreeningRuntime {
    config: ScreenConfig,
    cache: Arc<TableCache>,
    fit_engine: Box<dyn FitEngine>,
    classifier: Box<dyn QueryClassifier>,
    narrator: Box<dyn NarrativeSynthesizer>,
}

impl ScreeningRuntime {
    pub fn new(config: ScreenConfig, cache: Arc<TableCache>) -> ScreenResult<Self> {
        config.validate()?;
        let fit_engine = detect_fit_engine(&config.symbolic);
        Ok(Self {
            config,
            cache,
            fit_engine,
            classifier: Box::new(KeywordClassifier),
            narrator: Box::new(DigestNarrator),
        })
    }

    pub fn with_fit_engine(mut self, engine: Box<dyn FitEngine>) -> Self {
        self.fit_engine = engine;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn QueryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_narrator(mut self, narrator: Box<dyn NarrativeSynthesizer>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TableCache> {
        &self.cache
    }

    pub fn fit_engine(&self) -> &dyn FitEngine {
        self.fit_engine.as_ref()
    }

    /// Screen a project. Errors only when there is nothing to analyze:
    /// no table, no adsorption-energy column or no usable feature column.
    pub fn run(&self, ctx: &ProjectContext, query: Option<&str>) -> ScreenResult<ScreeningReport> {
        info!("Screening run started: {}", ctx.summary_string());
        let table = self.cache.get_or_load(ctx)?;
        let view = table.training_view()?;
        if view.feature_names.is_empty() {
            return Err(ScreenError::invalid_input(
                "features",
                "no descriptor column is complete for the systems with adsorption energies",
            ));
        }

        let feature_importance = AnalysisOutcome::record(
            "feature_importance",
            analyze(&view.x, &view.y, &view.feature_names),
        );

        let problem = FitProblem::new(&view.x, &view.y, &view.feature_names).with_target(&view.target_column);
        let symbolic_fit = AnalysisOutcome::record(
            "symbolic_fit",
            self.fit_engine.fit(&problem, FitBudget::from(&self.config.symbolic)),
        );

        let catalog = list_candidates(&tested_elements(&view.labels));
        let (gp_predictions, active_learning) = if catalog.is_empty() {
            info!("Every catalog dopant is already tested; skipping surrogate analyses");
            let reason = "no untested candidate dopants".to_string();
            (
                AnalysisOutcome::Skipped { reason: reason.clone() },
                AnalysisOutcome::Skipped { reason },
            )
        } else {
            self.surrogate_analyses(&view, &catalog)
        };

        let thermo = AnalysisOutcome::record(
            "thermo",
            table
                .adsorption_energies()
                .ok_or_else(|| ScreenError::not_found("adsorption energies", ctx.project.clone()))
                .and_then(|energies| compare_systems(&energies.data, self.config.thermo.default_pressure_bar)),
        );

        let topics = query.map(|q| self.classifier.classify(q)).unwrap_or_default();

        let mut report = ScreeningReport {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            project: ctx.project.clone(),
            query: query.map(str::to_string),
            topics,
            table_fingerprint: table.fingerprint().to_string(),
            target_column: view.target_column.clone(),
            training_labels: view.labels.clone(),
            feature_names: view.feature_names.clone(),
            feature_importance,
            symbolic_fit,
            gp_predictions,
            active_learning,
            thermo,
            narrative: String::new(),
        };
        report.narrative = self.narrator.synthesize(query.unwrap_or(""), &report.summary());

        info!(
            "Screening run {} finished for {} ({} training systems)",
            report.run_id,
            report.project,
            report.training_labels.len()
        );
        Ok(report)
    }

    /// GP predictions and active-learning ranking over untested dopants.
    ///
    /// Training systems are represented by the dopant they contain so that
    /// training and candidate rows share the catalog feature space.
    fn surrogate_analyses(
        &self,
        view: &TrainingView,
        catalog: &CandidateCatalog,
    ) -> (AnalysisOutcome<SurrogatePrediction>, AnalysisOutcome<Ranking>) {
        let fitted = view
            .labels
            .iter()
            .map(|label| provenance_record(label).map(|r| r.feature_vector()))
            .collect::<ScreenResult<Vec<_>>>()
            .and_then(|x_train| GaussianProcess::fit(&x_train, &view.y, &self.config.surrogate));
        // one model serves both analyses
        let gp = match fitted {
            Ok(gp) => gp,
            Err(e) => {
                warn!("Surrogate model unavailable: {}", e);
                let error = e.to_string();
                return (
                    AnalysisOutcome::Failed { error: error.clone() },
                    AnalysisOutcome::Failed { error },
                );
            }
        };

        let predictions = gp
            .prediction(&catalog.feature_matrix())
            .map(|p| p.with_labels(catalog.labels()));
        let ranking = rank_candidates(&gp, catalog, self.config.acquisition);

        (
            AnalysisOutcome::record("gp_predictions", predictions),
            AnalysisOutcome::record("active_learning", ranking),
        )
    }
}
