//! One-time artifact loading.
//!
//! All four pretrained artifacts are deserialized up front and held for the
//! process lifetime; the bundle is constructed once in `main` and passed by
//! reference into the pipeline. Any missing or corrupt artifact is a fatal
//! error before the first narrative is processed.

use std::path::Path;

use anyhow::Context;
use tracing::warn;

use claimlens_ai::{Booster, Embedder, ExplainerSidecar, TreeShap};
use claimlens_store::BackgroundData;

/// The four loaded artifacts: regression model, embedding model, explainer
/// sidecar, and background reference data.
#[derive(Debug)]
pub struct ArtifactBundle {
    pub embedder: Embedder,
    pub booster: Booster,
    pub explainer: ExplainerSidecar,
    pub background: BackgroundData,
}

impl ArtifactBundle {
    /// Load and cross-validate every artifact under `models_dir`.
    pub fn load(models_dir: &Path) -> anyhow::Result<Self> {
        let booster = Booster::load(&models_dir.join("claims_model.json"))
            .context("loading regression model (claims_model.json)")?;

        let embedder = Embedder::load(&models_dir.join("all-MiniLM-L6-v2"))
            .context("loading embedding model (all-MiniLM-L6-v2)")?;

        let explainer = ExplainerSidecar::load(&models_dir.join("shap_explainer.json"))
            .context("loading explainer sidecar (shap_explainer.json)")?;

        let background = BackgroundData::load(&models_dir.join("shap_background.parquet"))
            .context("loading background reference data (shap_background.parquet)")?;

        // A model/explainer pair from different training runs would produce
        // explanations that do not sum to the prediction; refuse to start.
        let derived_baseline = TreeShap::new(&booster).baseline();
        explainer
            .verify(derived_baseline)
            .context("cross-checking explainer against regression model")?;

        // The background sample should predict near the model's expected
        // value; drift suggests a stale background file but is survivable.
        let mut sum = 0.0f64;
        for row in background.rows() {
            sum += booster.predict(row).context("predicting background row")? as f64;
        }
        let background_mean = sum / background.len() as f64;
        let scale = derived_baseline.abs().max(1.0);
        if (background_mean - derived_baseline).abs() > 0.05 * scale {
            warn!(
                background_mean,
                derived_baseline, "background mean prediction drifts from model baseline"
            );
        }

        Ok(Self {
            embedder,
            booster,
            explainer,
            background,
        })
    }
}
