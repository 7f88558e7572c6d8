//! Human-readable write-ups of screening results

use crate::screening_pipeline::ScreeningSummary;
use std::fmt::Write;

pub trait NarrativeSynthesizer: Send + Sync {
    fn synthesize(&self, query: &str, summary: &ScreeningSummary) -> String;
}

/// Deterministic markdown digest built only from the summary fields
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestNarrator;

impl NarrativeSynthesizer for DigestNarrator {
    fn synthesize(&self, query: &str, summary: &ScreeningSummary) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = writeln!(out, "## Screening digest: {}", summary.project);
        if !query.trim().is_empty() {
            let _ = writeln!(out, "\n**Question:** {}", query.trim());
        }
        if !summary.topics.is_empty() {
            let topics: Vec<&str> = summary.topics.iter().map(|t| t.as_str()).collect();
            let _ = writeln!(out, "**Routed to:** {}", topics.join(", "));
        }

        let _ = writeln!(
            out,
            "\n- Training systems: {} (features: {})",
            summary.n_datapoints,
            summary.feature_names.join(", ")
        );
        if let Some(feature) = &summary.most_important {
            let _ = writeln!(out, "- Most important descriptor: {feature}");
        }
        if let (Some(equation), Some(method)) = (&summary.best_equation, &summary.method) {
            let _ = writeln!(out, "- Best equation ({method}): `{equation}`");
        }
        if let Some(element) = &summary.most_informative {
            let criterion = summary.selection_criterion.as_deref().unwrap_or("");
            let _ = writeln!(out, "- Most informative next dopant: **{element}** ({criterion})");
        }
        if !summary.ranked_candidates.is_empty() {
            let _ = writeln!(out, "- Top candidates:");
            for (rank, c) in summary.ranked_candidates.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. {}: E_ads {:.3} ± {:.3} eV; {}",
                    rank + 1,
                    c.element,
                    c.predicted_e_ads_ev,
                    c.uncertainty_ev,
                    c.rationale
                );
            }
        }
        if let Some(system) = &summary.best_deliverability {
            let _ = writeln!(out, "- Best H2 deliverability (lowest T50): {system}");
        }
        if !summary.failures.is_empty() {
            let _ = writeln!(out, "\n**Analyses that failed:**");
            for failure in &summary.failures {
                let _ = writeln!(out, "- {}: {}", failure.analysis, failure.error);
            }
        }
        if summary.n_datapoints < 20 {
            let _ = writeln!(
                out,
                "\n_Small dataset ({} points): treat fitted trends as hypotheses._",
                summary.n_datapoints
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_router::TopicTag;
    use crate::screening_pipeline::FailedAnalysis;

    fn summary() -> ScreeningSummary {
        ScreeningSummary {
            project: "zr-tio2".to_string(),
            n_datapoints: 3,
            feature_names: vec!["band_gap_eV".to_string()],
            topics: vec![TopicTag::Screening, TopicTag::Thermo],
            method: Some("analytical_fallback".to_string()),
            best_equation: Some("E_ads = 0.2000 * band_gap_eV - 0.7000".to_string()),
            most_important: Some("band_gap_eV".to_string()),
            ranked_features: vec!["band_gap_eV".to_string()],
            most_informative: None,
            ranked_candidates: Vec::new(),
            selection_criterion: None,
            best_deliverability: Some("TiO2".to_string()),
            failures: vec![FailedAnalysis {
                analysis: "gp_predictions".to_string(),
                error: "Insufficient data".to_string(),
            }],
        }
    }

    #[test]
    fn test_digest_mentions_key_findings() {
        let text = DigestNarrator.synthesize("What next?", &summary());
        assert!(text.starts_with("## Screening digest: zr-tio2"));
        assert!(text.contains("**Question:** What next?"));
        assert!(text.contains("**Routed to:** screening, thermo"));
        assert!(text.contains("`E_ads = 0.2000 * band_gap_eV - 0.7000`"));
        assert!(text.contains("- gp_predictions: Insufficient data"));
        assert!(text.contains("Small dataset (3 points)"));
        assert!(!text.contains("Most informative"));
    }

    #[test]
    fn test_digest_is_deterministic() {
        let s = summary();
        assert_eq!(DigestNarrator.synthesize("", &s), DigestNarrator.synthesize("", &s));
        assert!(!DigestNarrator.synthesize("  ", &s).contains("Question"));
    }
}
