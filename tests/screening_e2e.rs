// End-to-end screening through the public API and the command line

use clap::Parser;
use dopant_screen::cli::{dispatch, Cli};
use dopant_screen::config::SymbolicSettings;
use dopant_screen::{list_candidates, ProjectContext, ScreenConfig, ScreeningRuntime, TableCache};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const DESCRIPTORS: &str = "\
system_label,band_gap_eV,d_band_center,E_ads_eV
TiO2_pristine,3.20,-2.10,-0.5871
1Zr-TiO2,3.05,-1.95,-0.4683
2Zr-TiO2,2.98,-1.80,-0.4102
";

fn data_dir_with_project(root: &Path, project: &str) {
    let dir = root.join(project);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("descriptors.csv"), DESCRIPTORS).unwrap();
}

fn run_cli(args: &[&str]) {
    let cli = Cli::try_parse_from(std::iter::once("dopant_screen").chain(args.iter().copied())).unwrap();
    dispatch(cli).unwrap();
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn excluding_every_element_yields_no_candidates() {
    let all = list_candidates(&HashSet::new());
    assert_eq!(all, list_candidates(&HashSet::new()));

    let everything: HashSet<String> = all.labels().into_iter().collect();
    assert!(list_candidates(&everything).is_empty());
}

#[test]
fn runtime_screens_a_project_on_disk() {
    let root = tempfile::tempdir().unwrap();
    data_dir_with_project(root.path(), "zr-tio2");

    let config = ScreenConfig {
        data_dir: root.path().display().to_string(),
        symbolic: SymbolicSettings {
            enabled: false,
            ..SymbolicSettings::default()
        },
        ..ScreenConfig::default()
    };
    let ctx = ProjectContext::from_config("zr-tio2", &config).unwrap();
    let runtime = ScreeningRuntime::new(config, Arc::new(TableCache::new())).unwrap();
    let report = runtime.run(&ctx, Some("Which dopant next?")).unwrap();

    let summary = report.summary();
    assert_eq!(summary.n_datapoints, 3);
    assert!(summary.failures.is_empty());
    assert!(summary.most_informative.is_some());
    assert!(summary.ranked_candidates.iter().all(|c| c.uncertainty_ev >= 0.0));
}

#[test]
fn cli_writes_screening_report() {
    let root = tempfile::tempdir().unwrap();
    let data_dir = root.path().join("projects");
    data_dir_with_project(&data_dir, "zr-tio2");

    let config_path = root.path().join("screen.toml");
    fs::write(
        &config_path,
        format!(
            "data_dir = \"{}\"\n[symbolic]\nenabled = false\n",
            data_dir.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();
    let output = root.path().join("report.json");

    run_cli(&[
        "--config",
        &path_arg(&config_path),
        "--output",
        &path_arg(&output),
        "screen",
        "--project",
        "zr-tio2",
    ]);

    let report = read_json(&output);
    assert_eq!(report["project"], "zr-tio2");
    assert_eq!(report["gp_predictions"]["status"], "completed");
    assert_eq!(report["active_learning"]["status"], "completed");
}

#[test]
fn cli_thermo_and_projects() {
    let root = tempfile::tempdir().unwrap();
    let data_dir = root.path().join("projects");
    data_dir_with_project(&data_dir, "zr-tio2");
    fs::create_dir_all(data_dir.join("empty")).unwrap();

    let config_path = root.path().join("screen.toml");
    fs::write(
        &config_path,
        format!("data_dir = \"{}\"\n", data_dir.display().to_string().replace('\\', "/")),
    )
    .unwrap();

    let thermo_out = root.path().join("thermo.json");
    run_cli(&[
        "--config",
        &path_arg(&config_path),
        "--output",
        &path_arg(&thermo_out),
        "thermo",
        "--e-ads",
        "weak=-0.2",
        "--e-ads",
        "strong=-0.6",
    ]);
    let thermo = read_json(&thermo_out);
    assert_eq!(thermo["best_deliverability"], "weak");
    assert_eq!(thermo["systems"].as_array().unwrap().len(), 2);

    let projects_out = root.path().join("projects.json");
    run_cli(&[
        "--config",
        &path_arg(&config_path),
        "--output",
        &path_arg(&projects_out),
        "projects",
    ]);
    assert_eq!(read_json(&projects_out), serde_json::json!(["zr-tio2"]));
}

#[test]
fn cli_describe_includes_energy_decomposition() {
    let root = tempfile::tempdir().unwrap();
    let data_dir = root.path().join("projects");
    data_dir_with_project(&data_dir, "zr-tio2");
    data_dir_with_project(&data_dir, "bare");
    fs::write(
        data_dir.join("zr-tio2").join("energy_decomposition.csv"),
        "system,E_elec_eV,E_rep_eV,E_disp_eV,E_total_eV\nTiO2_pristine,-10.0,3.5,-0.5,-7.0\n1Zr-TiO2,-10.5,4.0,-0.75,-7.25\n",
    )
    .unwrap();

    let config_path = root.path().join("screen.toml");
    fs::write(
        &config_path,
        format!("data_dir = \"{}\"\n", data_dir.display().to_string().replace('\\', "/")),
    )
    .unwrap();

    let out = root.path().join("describe.json");
    run_cli(&[
        "--config",
        &path_arg(&config_path),
        "--output",
        &path_arg(&out),
        "describe",
        "--project",
        "zr-tio2",
        "--decomposition",
    ]);
    let described = read_json(&out);
    let decomposition = &described["decomposition"];
    assert_eq!(decomposition["found"], true);
    assert_eq!(decomposition["reference"], "TiO2_pristine");
    assert_eq!(decomposition["systems"][1]["shifts"]["dE_disp_eV"], -0.25);

    let bare_out = root.path().join("bare.json");
    run_cli(&[
        "--config",
        &path_arg(&config_path),
        "--output",
        &path_arg(&bare_out),
        "describe",
        "--project",
        "bare",
        "--decomposition",
    ]);
    let bare = read_json(&bare_out);
    assert_eq!(bare["decomposition"]["found"], false);
    assert_eq!(bare["decomposition"]["note"], "No energy_decomposition.csv in project");
}
