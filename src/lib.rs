//! Library root for the `dopant_screen` crate
//! Data-driven screening of dopants for hydrogen adsorption on oxide surfaces

// Core error handling
pub mod errors;

// Configuration
pub mod config;
pub mod config_loader;

// Dopant data
pub mod dopant_catalog;
pub mod rationale;

// Models and analyses
pub mod active_learning;
pub mod feature_importance;
pub mod feature_scaler;
pub mod gp_surrogate;
pub mod symbolic;
pub mod thermo;

// Project data
pub mod descriptor_table;
pub mod energy_decomposition;
pub mod project_context;
pub mod table_cache;

// Orchestration
pub mod narrative;
pub mod query_router;
pub mod screening_pipeline;

// Output and command line
pub mod cli;
pub mod report_writer;


pub use errors::{ScreenError, ScreenResult};
pub use config::ScreenConfig;
pub use dopant_catalog::{list_candidates, CandidateCatalog, DopantRecord};
pub use active_learning::{suggest_next, AcquisitionPolicy, Ranking};
pub use gp_surrogate::{fit_predict, GaussianProcess, SurrogatePrediction};
pub use feature_importance::{analyze, FeatureImportanceReport};
pub use symbolic::{detect_fit_engine, FitEngine, FitProblem, FitReport};
pub use project_context::ProjectContext;
pub use table_cache::TableCache;
pub use screening_pipeline::{AnalysisOutcome, ScreeningReport, ScreeningRuntime};
