use anyhow::{anyhow, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::linear::sigmoid;
use crate::types::ScoreError;

const HESSIAN_REGULARIZER: f64 = 1.0;
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// One node of a regression tree, stored flat. Internal nodes route on
/// `feature <= threshold`; leaves carry the boosting step in `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub value: f64,
    pub is_leaf: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Callers guarantee node indices and feature indices are in range;
    /// artifacts are checked once at load time.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf {
                return node.value;
            }
            idx = if features[node.feature] <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }

    /// Structural check used when loading an artifact from disk.
    pub fn validate(&self, num_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf {
                continue;
            }
            if node.feature >= num_features {
                return Err(format!(
                    "node {} splits on feature {} of {}",
                    i, node.feature, num_features
                ));
            }
            // Children must point forward, so traversal terminates.
            if node.left <= i || node.right <= i {
                return Err(format!("node {} has backward child link", i));
            }
            if node.left >= self.nodes.len() || node.right >= self.nodes.len() {
                return Err(format!("node {} child out of range", i));
            }
        }
        Ok(())
    }
}

/// Gradient-boosted trees on logistic loss. Leaf values are Newton steps;
/// shrinkage is applied at prediction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTreesModel {
    pub num_features: usize,
    pub base_score: f64,
    pub shrinkage: f64,
    pub trees: Vec<RegressionTree>,
}

impl BoostedTreesModel {
    pub fn predict(&self, features: &[f64]) -> Result<f64, ScoreError> {
        if features.len() != self.num_features {
            return Err(ScoreError::FeatureShape {
                detail: format!(
                    "boosted model expects {} features, got {}",
                    self.num_features,
                    features.len()
                ),
            });
        }
        let mut logit = self.base_score;
        for tree in &self.trees {
            logit += self.shrinkage * tree.predict(features);
        }
        Ok(sigmoid(logit))
    }
}

pub struct BoostedTrainer {
    pub trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub min_leaf: usize,
    pub seed: u64,
}

impl Default for BoostedTrainer {
    fn default() -> Self {
        Self {
            trees: 300,
            max_depth: 5,
            learning_rate: 0.05,
            subsample: 0.8,
            min_leaf: 5,
            seed: 42,
        }
    }
}

impl BoostedTrainer {
    pub fn fit(&self, features: &Array2<f64>, labels: &[f64]) -> Result<BoostedTreesModel> {
        let n = features.nrows();
        let num_features = features.ncols();
        if n != labels.len() {
            return Err(anyhow!(
                "feature rows ({}) and labels ({}) disagree",
                n,
                labels.len()
            ));
        }
        if n < 2 {
            return Err(anyhow!("need at least 2 rows to fit, got {}", n));
        }
        if !(0.0..=1.0).contains(&self.subsample) || self.subsample == 0.0 {
            return Err(anyhow!("subsample must be in (0, 1], got {}", self.subsample));
        }

        let positive = labels.iter().filter(|&&l| l >= 0.5).count() as f64;
        let prior = (positive / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut scores = vec![base_score; n];
        let mut trees = Vec::with_capacity(self.trees);

        for _round in 0..self.trees {
            let mut grad = vec![0.0; n];
            let mut hess = vec![0.0; n];
            for i in 0..n {
                let p = sigmoid(scores[i]);
                grad[i] = labels[i] - p;
                hess[i] = p * (1.0 - p);
            }

            let rows = self.sample_rows(n, &mut rng);
            let tree = grow_tree(features, &grad, &hess, &rows, self.max_depth, self.min_leaf);

            for i in 0..n {
                let mut row = vec![0.0; num_features];
                for j in 0..num_features {
                    row[j] = features[[i, j]];
                }
                scores[i] += self.learning_rate * tree.predict(&row);
            }
            trees.push(tree);
        }

        debug!(rows = n, trees = trees.len(), "fitted boosted trees");

        Ok(BoostedTreesModel {
            num_features,
            base_score,
            shrinkage: self.learning_rate,
            trees,
        })
    }

    fn sample_rows(&self, n: usize, rng: &mut StdRng) -> Vec<usize> {
        if self.subsample >= 1.0 {
            return (0..n).collect();
        }
        let take = ((n as f64 * self.subsample).round() as usize).clamp(1, n);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(take);
        indices
    }
}

fn grow_tree(
    features: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    max_depth: usize,
    min_leaf: usize,
) -> RegressionTree {
    let mut nodes = Vec::new();
    build_node(features, grad, hess, rows, max_depth, min_leaf, &mut nodes);
    RegressionTree { nodes }
}

fn build_node(
    features: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    depth_left: usize,
    min_leaf: usize,
    nodes: &mut Vec<TreeNode>,
) -> usize {
    let sum_g: f64 = rows.iter().map(|&i| grad[i]).sum();
    let sum_h: f64 = rows.iter().map(|&i| hess[i]).sum();

    let make_leaf = |nodes: &mut Vec<TreeNode>| {
        let idx = nodes.len();
        nodes.push(TreeNode {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: sum_g / (sum_h + HESSIAN_REGULARIZER),
            is_leaf: true,
        });
        idx
    };

    if depth_left == 0 || rows.len() < 2 * min_leaf {
        return make_leaf(nodes);
    }

    let Some((feature, threshold)) =
        best_split(features, grad, hess, rows, min_leaf, sum_g, sum_h)
    else {
        return make_leaf(nodes);
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&i| features[[i, feature]] <= threshold);

    let idx = nodes.len();
    nodes.push(TreeNode {
        feature,
        threshold,
        left: 0,
        right: 0,
        value: 0.0,
        is_leaf: false,
    });
    let left = build_node(features, grad, hess, &left_rows, depth_left - 1, min_leaf, nodes);
    let right = build_node(features, grad, hess, &right_rows, depth_left - 1, min_leaf, nodes);
    nodes[idx].left = left;
    nodes[idx].right = right;
    idx
}

fn best_split(
    features: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    min_leaf: usize,
    sum_g: f64,
    sum_h: f64,
) -> Option<(usize, f64)> {
    let parent_score = sum_g * sum_g / (sum_h + HESSIAN_REGULARIZER);
    let mut best: Option<(usize, f64)> = None;
    let mut best_gain = MIN_SPLIT_GAIN;

    for feature in 0..features.ncols() {
        let mut ordered: Vec<usize> = rows.to_vec();
        ordered.sort_by(|&a, &b| {
            features[[a, feature]]
                .partial_cmp(&features[[b, feature]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_g = 0.0;
        let mut left_h = 0.0;
        for split_at in 1..ordered.len() {
            let prev = ordered[split_at - 1];
            left_g += grad[prev];
            left_h += hess[prev];

            let prev_value = features[[prev, feature]];
            let next_value = features[[ordered[split_at], feature]];
            if prev_value == next_value {
                continue;
            }
            if split_at < min_leaf || ordered.len() - split_at < min_leaf {
                continue;
            }

            let right_g = sum_g - left_g;
            let right_h = sum_h - left_h;
            let gain = left_g * left_g / (left_h + HESSIAN_REGULARIZER)
                + right_g * right_g / (right_h + HESSIAN_REGULARIZER)
                - parent_score;
            if gain > best_gain {
                best_gain = gain;
                best = Some((feature, (prev_value + next_value) / 2.0));
            }
        }
    }

    best
}
