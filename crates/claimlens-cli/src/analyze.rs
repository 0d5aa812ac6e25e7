//! Per-narrative analysis pipeline: embed → predict → explain → classify.
//!
//! Strictly linear, one narrative per invocation. Failures propagate out of
//! the request without touching the loaded artifact bundle.

use anyhow::Context;
use serde::Serialize;

use claimlens_ai::{Attribution, Booster, TreeShap};
use claimlens_core::{PriorityTier, ReserveEstimate};

use crate::artifacts::ArtifactBundle;

/// Everything the presentation layer needs for one analyzed narrative.
#[derive(Serialize)]
pub struct AnalysisReport {
    pub narrative: String,
    /// Recommended reserve in dollars (clamped non-negative).
    pub reserve: f64,
    /// Unclamped model margin; attributions sum to this.
    pub raw_margin: f64,
    pub tier: PriorityTier,
    pub assessment: &'static str,
    pub attribution: Attribution,
}

/// Run the full pipeline for one narrative.
pub fn run_analysis(bundle: &mut ArtifactBundle, narrative: &str) -> anyhow::Result<AnalysisReport> {
    let embedding = bundle
        .embedder
        .embed(narrative)
        .context("embedding narrative")?;
    analyze_embedding(&bundle.booster, &embedding, narrative)
}

/// Predict, explain, and classify an already-embedded narrative.
pub fn analyze_embedding(
    booster: &Booster,
    embedding: &[f32],
    narrative: &str,
) -> anyhow::Result<AnalysisReport> {
    let margin = booster
        .predict(embedding)
        .context("predicting reserve")? as f64;
    let estimate = ReserveEstimate::from_margin(margin);

    let attribution = TreeShap::new(booster)
        .explain(embedding)
        .context("computing attribution")?;

    let tier = estimate.tier();
    Ok(AnalysisReport {
        narrative: narrative.to_string(),
        reserve: estimate.amount(),
        raw_margin: estimate.raw_margin(),
        tier,
        assessment: tier.assessment(),
        attribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Minimal two-feature regression model for pipeline tests.
    fn small_booster(base_score: f64) -> Booster {
        let model = json!({
            "learner": {
                "gradient_booster": {"model": {"trees": [
                    {
                        "left_children": [1, -1, -1],
                        "right_children": [2, -1, -1],
                        "split_indices": [0, 0, 0],
                        "split_conditions": [0.5, 10_000.0, 90_000.0],
                        "default_left": [1, 0, 0],
                        "sum_hessian": [10.0, 5.0, 5.0]
                    }
                ]}},
                "learner_model_param": {
                    "base_score": base_score.to_string(),
                    "num_feature": "2"
                },
                "objective": {"name": "reg:squarederror"}
            }
        });
        Booster::from_json(serde_json::to_vec(&model).unwrap().as_slice()).unwrap()
    }

    #[test]
    fn report_fields_are_consistent() {
        let booster = small_booster(0.0);
        let report = analyze_embedding(&booster, &[0.9, 0.0], "forklift crush injury").unwrap();

        assert_eq!(report.reserve, 90_000.0);
        assert_eq!(report.tier, PriorityTier::Critical);
        assert_eq!(report.assessment, PriorityTier::Critical.assessment());
        assert_eq!(report.attribution.values.len(), 2);

        // Local fidelity against the raw margin.
        let reconstructed = report.attribution.reconstructed();
        assert!(
            (reconstructed - report.raw_margin).abs() < 1e-3 * report.raw_margin.abs().max(1.0)
        );
    }

    #[test]
    fn tier_tracks_reserve() {
        let booster = small_booster(0.0);
        let low = analyze_embedding(&booster, &[0.1, 0.0], "minor incident").unwrap();
        assert_eq!(low.reserve, 10_000.0);
        assert_eq!(low.tier, PriorityTier::Routine);
    }

    #[test]
    fn negative_margin_clamps_but_keeps_fidelity() {
        let booster = small_booster(-20_000.0);
        let report = analyze_embedding(&booster, &[0.1, 0.0], "negative margin").unwrap();
        assert_eq!(report.reserve, 0.0);
        assert_eq!(report.raw_margin, -10_000.0);
        let reconstructed = report.attribution.reconstructed();
        assert!((reconstructed - report.raw_margin).abs() < 1e-3 * 10_000.0);
    }

    #[test]
    fn wrong_embedding_width_fails_the_request() {
        let booster = small_booster(0.0);
        assert!(analyze_embedding(&booster, &[0.1], "too narrow").is_err());
    }

    #[test]
    #[ignore = "requires pretrained artifacts under models/"]
    fn end_to_end_warehouse_narrative() {
        use std::path::PathBuf;

        let models = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models");
        let mut bundle = ArtifactBundle::load(&models).unwrap();

        let narrative = "Employee was struck by a falling pallet in the warehouse, \
                         resulting in a fractured leg and emergency hospitalization.";
        let embedding = bundle.embedder.embed(narrative).unwrap();
        assert_eq!(embedding.len(), claimlens_core::EMBED_DIM);

        let report = run_analysis(&mut bundle, narrative).unwrap();
        assert!(report.reserve >= 0.0);
        assert_eq!(report.tier, PriorityTier::from_reserve(report.reserve));
        assert_eq!(report.attribution.values.len(), claimlens_core::EMBED_DIM);

        let tol = 1e-3 * report.raw_margin.abs().max(1.0);
        assert!((report.attribution.reconstructed() - report.raw_margin).abs() < tol);
    }

    #[test]
    fn report_serializes_to_json() {
        let booster = small_booster(0.0);
        let report = analyze_embedding(&booster, &[0.9, 0.0], "serialization check").unwrap();
        let value: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["tier"], "CRITICAL");
        assert_eq!(value["attribution"]["values"].as_array().unwrap().len(), 2);
    }
}
