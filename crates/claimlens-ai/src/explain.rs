//! Local feature attribution for the regression ensemble (TreeSHAP).
//!
//! Path-dependent TreeSHAP: exact Shapley values for tree ensembles, with
//! the reference distribution taken from the per-node cover (`sum_hessian`)
//! recorded at training time. The algorithm maintains a path of unique
//! features from the root, extending it at each split and unwinding it when
//! a feature repeats, so each feature's weight reflects all subset
//! permutations in polynomial time.
//!
//! Efficiency holds exactly: `baseline + Σ values == booster.predict(x)`
//! up to float accumulation, which is the local-fidelity guarantee the
//! force-plot rendering depends on.

use serde::Serialize;
use thiserror::Error;

use crate::booster::{Booster, Tree};

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("expected {expected} features, got {got}")]
    WrongWidth { expected: usize, got: usize },
}

/// Per-feature contributions plus the expected-value baseline.
#[derive(Debug, Clone, Serialize)]
pub struct Attribution {
    /// One contribution per embedding dimension, in schema order.
    pub values: Vec<f32>,
    /// Expected model output over the training distribution.
    pub baseline: f64,
}

impl Attribution {
    pub fn contribution_sum(&self) -> f64 {
        self.values.iter().map(|&v| v as f64).sum()
    }

    /// `baseline + Σ contributions`; equals the raw prediction.
    pub fn reconstructed(&self) -> f64 {
        self.baseline + self.contribution_sum()
    }

    /// The `n` largest contributions by magnitude, as `(feature, value)`
    /// pairs sorted descending by |value|.
    pub fn top_drivers(&self, n: usize) -> Vec<(usize, f32)> {
        let mut indexed: Vec<(usize, f32)> =
            self.values.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        indexed.truncate(n);
        indexed
    }
}

/// Attribution engine over a loaded [`Booster`].
pub struct TreeShap<'a> {
    booster: &'a Booster,
    baseline: f64,
}

impl<'a> TreeShap<'a> {
    pub fn new(booster: &'a Booster) -> Self {
        Self {
            booster,
            baseline: booster.expected_value(),
        }
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Compute Shapley contributions for one feature vector.
    pub fn explain(&self, features: &[f32]) -> Result<Attribution, ExplainError> {
        if features.len() != self.booster.num_features() {
            return Err(ExplainError::WrongWidth {
                expected: self.booster.num_features(),
                got: features.len(),
            });
        }

        let mut phi = vec![0.0f64; features.len()];
        for tree in self.booster.trees() {
            recurse(tree, features, &mut phi, 0, Vec::new(), 1.0, 1.0, -1);
        }

        Ok(Attribution {
            values: phi.into_iter().map(|v| v as f32).collect(),
            baseline: self.baseline,
        })
    }
}

/// One unique feature on the root-to-node path.
#[derive(Clone, Copy)]
struct PathElement {
    feature: i32,
    /// Fraction of reference paths that flow through this split ("cold").
    zero: f64,
    /// Whether the explained instance follows this split (1.0 or 0.0).
    one: f64,
    /// Permutation weight for the subset size at this position.
    weight: f64,
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    x: &[f32],
    phi: &mut [f64],
    node: usize,
    parent_path: Vec<PathElement>,
    parent_zero: f64,
    parent_one: f64,
    parent_feature: i32,
) {
    let mut path = parent_path;
    extend(&mut path, parent_zero, parent_one, parent_feature);

    if tree.is_leaf(node) {
        let leaf = tree.split_cond[node] as f64;
        for i in 1..path.len() {
            let w = unwound_sum(&path, i);
            let el = path[i];
            phi[el.feature as usize] += w * (el.one - el.zero) * leaf;
        }
        return;
    }

    let split = tree.split_index[node] as usize;
    let value = x[split];
    let left = tree.left[node] as usize;
    let right = tree.right[node] as usize;

    let go_left = if value.is_nan() {
        tree.default_left[node]
    } else {
        value < tree.split_cond[node]
    };
    let (hot, cold) = if go_left { (left, right) } else { (right, left) };

    let cover = tree.cover[node] as f64;
    let hot_zero = tree.cover[hot] as f64 / cover;
    let cold_zero = tree.cover[cold] as f64 / cover;

    // A repeated feature on the path is undone before re-splitting on it.
    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;
    if let Some(k) = path.iter().position(|e| e.feature == split as i32) {
        incoming_zero = path[k].zero;
        incoming_one = path[k].one;
        unwind(&mut path, k);
    }

    recurse(
        tree,
        x,
        phi,
        hot,
        path.clone(),
        hot_zero * incoming_zero,
        incoming_one,
        split as i32,
    );
    recurse(
        tree,
        x,
        phi,
        cold,
        path,
        cold_zero * incoming_zero,
        0.0,
        split as i32,
    );
}

/// Grow the path by one feature, updating permutation weights.
fn extend(path: &mut Vec<PathElement>, zero: f64, one: f64, feature: i32) {
    let weight = if path.is_empty() { 1.0 } else { 0.0 };
    path.push(PathElement {
        feature,
        zero,
        one,
        weight,
    });

    let d = path.len() - 1;
    for i in (0..d).rev() {
        path[i + 1].weight += one * path[i].weight * (i + 1) as f64 / (d + 1) as f64;
        path[i].weight = zero * path[i].weight * (d - i) as f64 / (d + 1) as f64;
    }
}

/// Remove the path element at `k`, restoring the weights it contributed.
fn unwind(path: &mut Vec<PathElement>, k: usize) {
    let d = path.len() - 1;
    let one = path[k].one;
    let zero = path[k].zero;

    let mut next_one = path[d].weight;
    for i in (0..d).rev() {
        if one != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one * (d + 1) as f64 / ((i + 1) as f64 * one);
            next_one = tmp - path[i].weight * zero * (d - i) as f64 / (d + 1) as f64;
        } else {
            path[i].weight = path[i].weight * (d + 1) as f64 / (zero * (d - i) as f64);
        }
    }

    for i in k..d {
        path[i].feature = path[i + 1].feature;
        path[i].zero = path[i + 1].zero;
        path[i].one = path[i + 1].one;
    }
    path.pop();
}

/// Total permutation weight the element at `k` would leave behind if
/// unwound, without mutating the path.
fn unwound_sum(path: &[PathElement], k: usize) -> f64 {
    let d = path.len() - 1;
    let one = path[k].one;
    let zero = path[k].zero;
    let mut total = 0.0;

    let mut next_one = path[d].weight;
    for i in (0..d).rev() {
        if one != 0.0 {
            let tmp = next_one * (d + 1) as f64 / ((i + 1) as f64 * one);
            total += tmp;
            next_one = path[i].weight - tmp * zero * (d - i) as f64 / (d + 1) as f64;
        } else if zero != 0.0 {
            total += path[i].weight / zero * (d + 1) as f64 / (d - i) as f64;
        }
    }
    total
}
