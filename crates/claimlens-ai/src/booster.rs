//! Gradient-boosted regression trees loaded from the XGBoost JSON format.
//!
//! Parses the upstream `save_model` layout (`{"learner": {...}}`) and
//! evaluates the ensemble directly: a prediction is `base_score` plus the sum
//! of one leaf value per tree. Only what this pipeline needs is read — tree
//! structure, split conditions, missing-value routing, and per-node cover
//! (`sum_hessian`, which the attribution engine consumes).
//!
//! XGBoost stores leaf values in `split_conditions` (for leaf nodes) and
//! writes scalar model parameters as JSON strings ("384", "5E-1"); both
//! quirks are handled here.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use claimlens_core::{SchemaError, validate_feature_names};

#[derive(Debug, Error)]
pub enum BoosterError {
    #[error("model file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid model json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed model: {0}")]
    Malformed(String),

    #[error("feature schema mismatch: {0}")]
    Schema(#[from] SchemaError),
}

/// A regression tree ensemble.
#[derive(Debug)]
pub struct Booster {
    trees: Vec<Tree>,
    base_score: f32,
    num_features: usize,
    feature_names: Vec<String>,
}

/// One regression tree in flat-array form, as stored by XGBoost.
///
/// `left[n] < 0` marks a leaf; a leaf's value lives in `split_cond[n]`.
#[derive(Debug)]
pub(crate) struct Tree {
    pub left: Vec<i32>,
    pub right: Vec<i32>,
    pub split_index: Vec<u32>,
    pub split_cond: Vec<f32>,
    pub default_left: Vec<bool>,
    pub cover: Vec<f32>,
}

impl Tree {
    pub fn is_leaf(&self, node: usize) -> bool {
        self.left[node] < 0
    }

    /// Route a feature vector to its leaf and return the leaf value.
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let mut node = 0usize;
        while !self.is_leaf(node) {
            let value = features[self.split_index[node] as usize];
            let go_left = if value.is_nan() {
                self.default_left[node]
            } else {
                value < self.split_cond[node]
            };
            node = if go_left {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        self.split_cond[node]
    }

    /// Cover-weighted expectation of the tree's output: the leaf values
    /// averaged under the training distribution recorded in `sum_hessian`.
    pub fn expected_value(&self) -> f32 {
        self.node_mean(0)
    }

    fn node_mean(&self, node: usize) -> f32 {
        if self.is_leaf(node) {
            return self.split_cond[node];
        }
        let l = self.left[node] as usize;
        let r = self.right[node] as usize;
        let total = self.cover[node];
        if total <= 0.0 {
            return 0.0;
        }
        (self.cover[l] * self.node_mean(l) + self.cover[r] * self.node_mean(r)) / total
    }
}

impl Booster {
    /// Load an XGBoost JSON model from disk and validate its feature schema.
    pub fn load(path: &Path) -> Result<Self, BoosterError> {
        if !path.exists() {
            return Err(BoosterError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let booster = Self::from_json(&bytes)?;
        info!(
            trees = booster.trees.len(),
            features = booster.num_features,
            base_score = booster.base_score as f64,
            path = %path.display(),
            "loaded regression model"
        );
        Ok(booster)
    }

    /// Parse a model from XGBoost JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, BoosterError> {
        let model: ModelJson = serde_json::from_slice(bytes)?;
        let learner = model.learner;

        let base_score = learner.learner_model_param.base_score.parse()?;
        let num_features = learner.learner_model_param.num_feature.parse()? as usize;

        if let Some(objective) = &learner.objective
            && objective.name != "reg:squarederror"
        {
            return Err(BoosterError::Malformed(format!(
                "unsupported objective {:?} (expected reg:squarederror)",
                objective.name
            )));
        }

        // Feature names are present when the model was fit against a named
        // frame; validate them against the shared schema so a model trained
        // on a different column layout fails at load, not at request time.
        if !learner.feature_names.is_empty() {
            validate_feature_names(&learner.feature_names)?;
        }

        let trees = learner
            .gradient_booster
            .model
            .trees
            .into_iter()
            .map(|t| Tree::from_json(t, num_features))
            .collect::<Result<Vec<_>, _>>()?;

        if trees.is_empty() {
            return Err(BoosterError::Malformed("model has no trees".into()));
        }

        Ok(Self {
            trees,
            base_score,
            num_features,
            feature_names: learner.feature_names,
        })
    }

    /// Predict the raw regression margin for one feature vector.
    pub fn predict(&self, features: &[f32]) -> Result<f32, SchemaError> {
        if features.len() != self.num_features {
            return Err(SchemaError::WrongWidth {
                expected: self.num_features,
                got: features.len(),
            });
        }
        let sum: f32 = self.trees.iter().map(|t| t.predict_row(features)).sum();
        Ok(self.base_score + sum)
    }

    /// Model-wide expected value: `base_score` plus each tree's
    /// cover-weighted mean output.
    pub fn expected_value(&self) -> f64 {
        self.base_score as f64
            + self
                .trees
                .iter()
                .map(|t| t.expected_value() as f64)
                .sum::<f64>()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub(crate) fn trees(&self) -> &[Tree] {
        &self.trees
    }
}

// ── JSON layout ──

#[derive(Deserialize)]
struct ModelJson {
    learner: LearnerJson,
}

#[derive(Deserialize)]
struct LearnerJson {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBoosterJson,
    learner_model_param: LearnerModelParamJson,
    objective: Option<ObjectiveJson>,
}

#[derive(Deserialize)]
struct GradientBoosterJson {
    model: GbModelJson,
}

#[derive(Deserialize)]
struct GbModelJson {
    trees: Vec<TreeJson>,
}

#[derive(Deserialize)]
struct LearnerModelParamJson {
    base_score: Scalar,
    num_feature: Scalar,
}

#[derive(Deserialize)]
struct ObjectiveJson {
    name: String,
}

#[derive(Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    sum_hessian: Vec<f32>,
}

impl Tree {
    fn from_json(t: TreeJson, num_features: usize) -> Result<Self, BoosterError> {
        let n = t.left_children.len();
        if t.right_children.len() != n
            || t.split_indices.len() != n
            || t.split_conditions.len() != n
            || t.default_left.len() != n
            || t.sum_hessian.len() != n
        {
            return Err(BoosterError::Malformed(
                "tree arrays have inconsistent lengths".into(),
            ));
        }
        if n == 0 {
            return Err(BoosterError::Malformed("tree has no nodes".into()));
        }
        // Every node index the evaluator will follow is checked here so that
        // a corrupt artifact fails at load rather than during a request.
        for i in 0..n {
            let (l, r) = (t.left_children[i], t.right_children[i]);
            if l < 0 {
                if r >= 0 {
                    return Err(BoosterError::Malformed(format!(
                        "leaf node {i} has a right child {r}"
                    )));
                }
                continue;
            }
            if r < 0 || l as usize >= n || r as usize >= n {
                return Err(BoosterError::Malformed(format!(
                    "node {i} child indices ({l}, {r}) fall outside the tree"
                )));
            }
            let split = t.split_indices[i] as usize;
            if split >= num_features {
                return Err(BoosterError::Malformed(format!(
                    "node {i} splits on feature {split} but the model declares {num_features}"
                )));
            }
        }
        Ok(Self {
            left: t.left_children,
            right: t.right_children,
            split_index: t.split_indices,
            split_cond: t.split_conditions,
            default_left: t.default_left.into_iter().map(|f| f.0).collect(),
            cover: t.sum_hessian,
        })
    }
}

/// XGBoost writes scalar params as strings ("5E-1", "384"); accept either.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    fn parse(&self) -> Result<f32, BoosterError> {
        match self {
            Scalar::Number(n) => Ok(*n as f32),
            Scalar::Text(s) => s
                .trim()
                .parse::<f32>()
                .map_err(|_| BoosterError::Malformed(format!("unparseable scalar {s:?}"))),
        }
    }
}

/// `default_left` appears as 0/1 integers or booleans depending on the
/// writer version.
struct Flag(bool);

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(Flag(b)),
            Raw::Int(i) => Ok(Flag(i != 0)),
        }
    }
}
