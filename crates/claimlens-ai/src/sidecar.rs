//! Explainer sidecar artifact (`shap_explainer.json`).
//!
//! The training side exports the explainer's expected value and settings as
//! JSON. The attribution engine itself is reconstructed from the regression
//! model's trees, so the sidecar's job is version-skew detection: if the
//! stored expected value disagrees with the baseline derived from the loaded
//! model, the model and explainer artifacts were not produced together and
//! every explanation would be invalid. That mismatch is a load-time error.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Relative tolerance for the stored-vs-derived expected value check.
const BASELINE_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("explainer file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid explainer json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "explainer expected value {stored} disagrees with model-derived baseline {derived}; \
         model and explainer artifacts are from different training runs"
    )]
    BaselineMismatch { stored: f64, derived: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainerSidecar {
    /// Expected model output recorded at training time.
    pub expected_value: f64,
    /// Attribution variant the explainer was built with.
    #[serde(default = "default_perturbation")]
    pub feature_perturbation: String,
}

fn default_perturbation() -> String {
    "tree_path_dependent".to_string()
}

impl ExplainerSidecar {
    pub fn load(path: &Path) -> Result<Self, SidecarError> {
        if !path.exists() {
            return Err(SidecarError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let sidecar: Self = serde_json::from_slice(&bytes)?;
        info!(
            expected_value = sidecar.expected_value,
            perturbation = %sidecar.feature_perturbation,
            path = %path.display(),
            "loaded explainer sidecar"
        );
        Ok(sidecar)
    }

    /// Check the stored expected value against the baseline derived from the
    /// loaded model's trees.
    pub fn verify(&self, derived_baseline: f64) -> Result<(), SidecarError> {
        let scale = self.expected_value.abs().max(1.0);
        if (self.expected_value - derived_baseline).abs() > BASELINE_TOLERANCE * scale {
            return Err(SidecarError::BaselineMismatch {
                stored: self.expected_value,
                derived: derived_baseline,
            });
        }
        Ok(())
    }
}
