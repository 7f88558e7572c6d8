// Cross-module behavior of a screening run

use crate::config::{ScreenConfig, SymbolicSettings};
use crate::dopant_catalog::{list_candidates, lookup};
use crate::gp_surrogate::fit_predict;
use crate::query_router::TopicTag;
use crate::screening_pipeline::ScreeningRuntime;
use crate::table_cache::TableCache;
use crate::thermo::{langmuir_coverage, REFERENCE_TEMPERATURE_K};
use crate::tests::test_utils::{write_project, ZR_TIO2_CSV};
use std::collections::HashSet;
use std::sync::Arc;

fn fast_config() -> ScreenConfig {
    ScreenConfig {
        symbolic: SymbolicSettings {
            enabled: false,
            ..SymbolicSettings::default()
        },
        ..ScreenConfig::default()
    }
}

#[test]
pub fn ti_zr_training_predicts_v_and_w() {
    let ti = lookup("Ti").unwrap();
    let zr = lookup("Zr").unwrap();
    let x_train = vec![ti.feature_vector(), zr.feature_vector()];
    let y_train = vec![-0.5871, -0.4683];
    let query = vec![lookup("V").unwrap().feature_vector(), lookup("W").unwrap().feature_vector()];

    let prediction = fit_predict(&x_train, &y_train, &query, &fast_config().surrogate).unwrap();
    assert_eq!(prediction.predictions.len(), 2);
    assert_eq!(prediction.uncertainties.len(), 2);
    assert!(prediction.uncertainties.iter().all(|s| *s >= 0.0));
    assert!(prediction.predictions.iter().all(|p| p.is_finite()));
}

#[test]
pub fn runs_share_the_cached_table() {
    let (_root, ctx) = write_project("zr-tio2", ZR_TIO2_CSV);
    let cache = Arc::new(TableCache::new());
    let runtime = ScreeningRuntime::new(fast_config(), Arc::clone(&cache)).unwrap();

    let first = runtime.run(&ctx, Some("What is the desorption temperature?")).unwrap();
    assert_eq!(cache.len().unwrap(), 1);

    // edits on disk are invisible until the entry is invalidated
    std::fs::write(ctx.descriptor_path(), "system_label,gap,E_ads\nTiO2,3.2,-0.5\nZrO2,3.0,-0.4\n").unwrap();
    let second = runtime.run(&ctx, None).unwrap();
    assert_eq!(first.table_fingerprint, second.table_fingerprint);

    assert!(cache.invalidate(&ctx.cache_key()).unwrap());
    let third = runtime.run(&ctx, None).unwrap();
    assert_ne!(first.table_fingerprint, third.table_fingerprint);
    assert_eq!(third.feature_names, vec!["gap"]);
}

#[test]
pub fn report_reflects_training_view() {
    let (_root, ctx) = write_project("zr-tio2", ZR_TIO2_CSV);
    let runtime = ScreeningRuntime::new(fast_config(), Arc::new(TableCache::new())).unwrap();
    let report = runtime.run(&ctx, Some("Explain the thermo trend")).unwrap();

    assert_eq!(report.target_column, "E_ads_eV");
    assert_eq!(report.training_labels.len(), 4);
    assert!(!report.feature_names.iter().any(|f| f == "E_surface_eV"));
    assert_eq!(report.topics, vec![TopicTag::Reasoning, TopicTag::Thermo]);

    let thermo = report.thermo.completed().unwrap();
    assert_eq!(thermo.systems.len(), 4);
    let t50: Vec<f64> = thermo.systems.iter().map(|s| s.t50_k).collect();
    assert!(t50.windows(2).all(|w| w[0] <= w[1]));

    // Ti and Zr are tested, so every other catalog element is ranked
    let ranking = report.active_learning.completed().unwrap();
    let untested = list_candidates(&HashSet::from(["Ti".to_string(), "Zr".to_string()]));
    assert_eq!(ranking.ranked_candidates.len(), untested.len());
    let uncertainties: Vec<f64> = ranking.ranked_candidates.iter().map(|c| c.uncertainty_ev).collect();
    assert!(uncertainties.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
pub fn report_serializes_without_non_finite_numbers() {
    let (_root, ctx) = write_project("zr-tio2", ZR_TIO2_CSV);
    let runtime = ScreeningRuntime::new(fast_config(), Arc::new(TableCache::new())).unwrap();
    let report = runtime.run(&ctx, None).unwrap();

    let json = crate::report_writer::to_json_string(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["project"], "zr-tio2");
    assert_eq!(value["symbolic_fit"]["status"], "completed");
}

#[test]
pub fn comparison_coverage_ignores_sweep_temperature() {
    let (_root, ctx) = write_project("zr-tio2", ZR_TIO2_CSV);
    let mut config = fast_config();
    config.thermo.reference_temperature_k = 500.0;
    let runtime = ScreeningRuntime::new(config, Arc::new(TableCache::new())).unwrap();
    let report = runtime.run(&ctx, None).unwrap();

    let thermo = report.thermo.completed().unwrap();
    for system in &thermo.systems {
        let expected = langmuir_coverage(system.e_ads_ev, REFERENCE_TEMPERATURE_K, thermo.pressure_bar).unwrap();
        assert!((system.theta_298k - expected).abs() < 1e-12);
    }
}
