use crate::active_learning::suggest_next;
use crate::config::ScreenConfig;
use crate::config_loader::load_config;
use crate::descriptor_table::{CorrelationMatrix, DatasetSummary, DescriptorShifts, DescriptorTable};
use crate::energy_decomposition::EnergyDecomposition;
use crate::dopant_catalog::{list_candidates, lookup, CandidateCatalog, DopantRecord};
use crate::errors::{ScreenError, ScreenResult};
use crate::feature_importance::analyze;
use crate::gp_surrogate::fit_predict;
use crate::project_context::{list_projects, ProjectContext};
use crate::query_router::{route, KeywordClassifier};
use crate::report_writer::write_json;
use crate::screening_pipeline::ScreeningRuntime;
use crate::symbolic::{detect_fit_engine, FitBudget, FitProblem};
use crate::table_cache::TableCache;
use crate::thermo::{
    compare_systems, coverage_vs_pressure, coverage_vs_temperature, doe_window_check,
    desorption_midpoint_t50, t50_vs_pressure, DoeWindow, PressureSweep, SweepRange, T50Sweep,
    TemperatureSweep,
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Top-level CLI for dopant screening
#[derive(Parser)]
#[command(
    name = "dopant_screen",
    version,
    about = "Data-driven screening of dopants for H2 adsorption"
)]
pub struct Cli {
    /// Config file; replaces the default search
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write JSON output to this file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List catalog dopants with their feature vectors
    Candidates {
        /// Elements to leave out, e.g. Ti,Zr
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Fit the GP surrogate on element energies and predict others
    Predict {
        /// JSON file: {"training": {"Ti": -0.59, ...}, "query": ["V", ...]}
        #[arg(long)]
        train: PathBuf,
    },

    /// Rank untested dopants for the next experiment
    Suggest {
        #[arg(long)]
        train: PathBuf,
    },

    /// Leave-one-out feature importance over a descriptor CSV
    Importance {
        #[arg(long)]
        csv: PathBuf,
    },

    /// Fit equations for adsorption energy over a descriptor CSV
    Fit {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        max_complexity: Option<usize>,
        #[arg(long)]
        iterations: Option<usize>,
    },

    /// Run every analysis for a project
    Screen {
        #[arg(short, long)]
        project: String,
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Coverage, desorption temperature and DOE window per system
    Thermo {
        /// SYSTEM=E_ADS_EV, repeatable
        #[arg(long = "e-ads", value_parser = parse_system_energy, required = true)]
        e_ads: Vec<(String, f64)>,
        /// Pressure in bar; defaults to the configured value
        #[arg(long)]
        pressure: Option<f64>,
        /// Include pressure and temperature sweeps per system
        #[arg(long)]
        sweeps: bool,
    },

    /// Show which analyses a question routes to
    Route {
        #[arg(short, long)]
        query: String,
    },

    /// Summarize a project's descriptor table
    Describe {
        #[arg(short, long)]
        project: String,
        /// Show every descriptor for one system
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        correlations: bool,
        #[arg(long)]
        shifts: bool,
        /// Include energy_decomposition.csv terms and shifts vs pristine
        #[arg(long)]
        decomposition: bool,
    },

    /// List projects under the data directory
    Projects,

    /// Print the effective configuration as TOML
    Config,
}

fn parse_system_energy(s: &str) -> Result<(String, f64), String> {
    let (system, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SYSTEM=E_ADS_EV, got '{s}'"))?;
    let system = system.trim();
    if system.is_empty() {
        return Err(format!("missing system name in '{s}'"));
    }
    let energy: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid energy '{}'", value.trim()))?;
    if !energy.is_finite() {
        return Err(format!("energy for {system} must be finite"));
    }
    Ok((system.to_string(), energy))
}

/// Element-level training data for `predict` and `suggest`
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingRequest {
    pub training: BTreeMap<String, f64>,
    #[serde(default)]
    pub query: Vec<String>,
}

impl TrainingRequest {
    pub fn load(path: &Path) -> ScreenResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScreenError::io(format!("read {}", path.display()), e))?;
        serde_json::from_str(&text).map_err(|e| ScreenError::serialization("parse training request", e))
    }

    fn record(element: &str) -> ScreenResult<&'static DopantRecord> {
        lookup(element).ok_or_else(|| ScreenError::not_found("dopant", element))
    }

    pub fn training_matrix(&self) -> ScreenResult<(Vec<Vec<f64>>, Vec<f64>)> {
        let mut x = Vec::with_capacity(self.training.len());
        let mut y = Vec::with_capacity(self.training.len());
        for (element, energy) in &self.training {
            x.push(Self::record(element)?.feature_vector());
            y.push(*energy);
        }
        Ok((x, y))
    }

    /// Query rows; every untested catalog dopant when none were named
    pub fn query_catalog(&self) -> ScreenResult<CandidateCatalog> {
        let tested: HashSet<String> = self.training.keys().cloned().collect();
        let catalog = list_candidates(&tested);
        if self.query.is_empty() {
            return Ok(catalog);
        }
        for element in &self.query {
            Self::record(element)?;
        }
        let wanted: HashSet<&str> = self.query.iter().map(String::as_str).collect();
        let all = list_candidates(&HashSet::new());
        Ok(CandidateCatalog {
            feature_names: all.feature_names,
            candidates: all
                .candidates
                .into_iter()
                .filter(|c| wanted.contains(c.element.as_str()))
                .collect(),
        })
    }
}

#[derive(Debug, Serialize)]
struct SystemSweeps {
    system: String,
    doe: DoeWindow,
    pressure: PressureSweep,
    temperature: TemperatureSweep,
    t50: T50Sweep,
}

fn system_sweeps(
    system: &str,
    e_ads_ev: f64,
    pressure_bar: f64,
    temperature_k: f64,
) -> ScreenResult<SystemSweeps> {
    Ok(SystemSweeps {
        system: system.to_string(),
        doe: doe_window_check(desorption_midpoint_t50(e_ads_ev, pressure_bar)?),
        pressure: coverage_vs_pressure(e_ads_ev, temperature_k, SweepRange::pressure())?,
        temperature: coverage_vs_temperature(e_ads_ev, pressure_bar, SweepRange::temperature())?,
        t50: t50_vs_pressure(e_ads_ev, SweepRange::pressure())?,
    })
}

#[derive(Debug, Serialize)]
struct ProjectDescription {
    project: String,
    summary: DatasetSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<BTreeMap<String, Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlations: Option<CorrelationMatrix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shifts: Option<DescriptorShifts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decomposition: Option<EnergyDecomposition>,
}

fn load_csv(path: &Path) -> ScreenResult<DescriptorTable> {
    info!("Loading descriptor table {}", path.display());
    DescriptorTable::load(path)
}

fn emit_text(text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

pub fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config: ScreenConfig = load_config(cli.config.as_deref())?;
    let output = cli.output.as_deref();

    match cli.command {
        Commands::Candidates { exclude } => {
            let exclude: HashSet<String> = exclude.into_iter().map(|e| e.trim().to_string()).collect();
            write_json(&list_candidates(&exclude), output)?;
        }
        Commands::Predict { train } => {
            let request = TrainingRequest::load(&train)?;
            let (x, y) = request.training_matrix()?;
            let catalog = request.query_catalog()?;
            let prediction = fit_predict(&x, &y, &catalog.feature_matrix(), &config.surrogate)?
                .with_labels(catalog.labels());
            write_json(&prediction, output)?;
        }
        Commands::Suggest { train } => {
            let request = TrainingRequest::load(&train)?;
            let (x, y) = request.training_matrix()?;
            let catalog = request.query_catalog()?;
            let ranking = suggest_next(&x, &y, &catalog, config.acquisition, &config.surrogate)?;
            write_json(&ranking, output)?;
        }
        Commands::Importance { csv } => {
            let view = load_csv(&csv)?.training_view()?;
            write_json(&analyze(&view.x, &view.y, &view.feature_names)?, output)?;
        }
        Commands::Fit {
            csv,
            max_complexity,
            iterations,
        } => {
            let view = load_csv(&csv)?.training_view()?;
            let mut budget = FitBudget::from(&config.symbolic);
            if let Some(max_complexity) = max_complexity {
                anyhow::ensure!(max_complexity >= 1, "--max-complexity must be at least 1");
                budget.max_complexity = max_complexity;
            }
            if let Some(iterations) = iterations {
                budget.iterations = iterations;
            }
            let problem = FitProblem::new(&view.x, &view.y, &view.feature_names).with_target(&view.target_column);
            let report = detect_fit_engine(&config.symbolic).fit(&problem, budget)?;
            write_json(&report, output)?;
        }
        Commands::Screen { project, query } => {
            let ctx = ProjectContext::from_config(&project, &config)?;
            let runtime = ScreeningRuntime::new(config, Arc::new(TableCache::new()))?;
            let report = runtime.run(&ctx, query.as_deref())?;
            write_json(&report, output)?;
        }
        Commands::Thermo {
            e_ads,
            pressure,
            sweeps,
        } => {
            let pressure = pressure.unwrap_or(config.thermo.default_pressure_bar);
            let comparison = compare_systems(&e_ads, pressure)?;
            if sweeps {
                let per_system = e_ads
                    .iter()
                    .map(|(system, energy)| system_sweeps(system, *energy, pressure, config.thermo.reference_temperature_k))
                    .collect::<ScreenResult<Vec<_>>>()?;
                write_json(
                    &serde_json::json!({ "comparison": comparison, "sweeps": per_system }),
                    output,
                )?;
            } else {
                write_json(&comparison, output)?;
            }
        }
        Commands::Route { query } => {
            write_json(&route(&KeywordClassifier, &query), output)?;
        }
        Commands::Describe {
            project,
            system,
            correlations,
            shifts,
            decomposition,
        } => {
            let ctx = ProjectContext::from_config(&project, &config)?;
            let table = TableCache::new().get_or_load(&ctx)?;
            let description = ProjectDescription {
                project: ctx.project.clone(),
                summary: table.summary(),
                system: system.map(|label| table.system(&label)).transpose()?,
                correlations: correlations.then(|| table.correlation_matrix()),
                shifts: shifts.then(|| table.descriptor_shifts()),
                decomposition: decomposition
                    .then(|| EnergyDecomposition::load(&ctx.decomposition_path()))
                    .transpose()?,
            };
            write_json(&description, output)?;
        }
        Commands::Projects => {
            write_json(&list_projects(Path::new(&config.data_dir))?, output)?;
        }
        Commands::Config => {
            emit_text(&toml::to_string_pretty(&config)?, output)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_system_energy() {
        assert_eq!(
            parse_system_energy("TiO2 = -0.59").unwrap(),
            ("TiO2".to_string(), -0.59)
        );
        assert!(parse_system_energy("TiO2").is_err());
        assert!(parse_system_energy("=-0.5").is_err());
        assert!(parse_system_energy("TiO2=abc").is_err());
        assert!(parse_system_energy("TiO2=NaN").is_err());
    }

    #[test]
    fn test_thermo_args_parse() {
        let cli = Cli::try_parse_from([
            "dopant_screen",
            "thermo",
            "--e-ads",
            "TiO2=-0.59",
            "--e-ads",
            "Zr=-0.47",
            "--pressure",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Thermo { e_ads, pressure, .. } => {
                assert_eq!(e_ads.len(), 2);
                assert_eq!(pressure, Some(5.0));
            }
            _ => panic!("expected thermo"),
        }
    }

    #[test]
    fn test_exclude_list_is_comma_separated() {
        let cli = Cli::try_parse_from(["dopant_screen", "candidates", "--exclude", "Ti,Zr"]).unwrap();
        match cli.command {
            Commands::Candidates { exclude } => assert_eq!(exclude, vec!["Ti", "Zr"]),
            _ => panic!("expected candidates"),
        }
    }

    #[test]
    fn test_training_request_queries() {
        let request: TrainingRequest =
            serde_json::from_str(r#"{"training": {"Ti": -0.5871, "Zr": -0.4683}, "query": ["V", "W"]}"#)
                .unwrap();
        let (x, y) = request.training_matrix().unwrap();
        assert_eq!(x.len(), 2);
        assert_eq!(y, vec![-0.5871, -0.4683]);
        assert_eq!(request.query_catalog().unwrap().labels(), vec!["V", "W"]);

        let open: TrainingRequest = serde_json::from_str(r#"{"training": {"Ti": -0.5}}"#).unwrap();
        assert!(!open.query_catalog().unwrap().labels().contains(&"Ti".to_string()));

        let unknown: TrainingRequest = serde_json::from_str(r#"{"training": {"Xx": -0.5}}"#).unwrap();
        assert!(matches!(unknown.training_matrix(), Err(ScreenError::NotFound { .. })));
    }
}
