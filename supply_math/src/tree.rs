//! CART regression tree
//!
//! Greedy binary splits chosen by the largest reduction in squared error.
//! Used as the base learner of the bagged and boosted forecast generators.

use crate::{MathError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a regression tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth of any leaf (root is depth 0)
    pub max_depth: usize,
    /// Minimum number of samples a node needs before it may split
    pub min_samples_split: usize,
    /// Minimum number of samples in each child of a split
    pub min_samples_leaf: usize,
    /// Number of features sampled at each split (`None` uses all of them)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 4,
            min_samples_leaf: 2,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

impl RegressionTree {
    /// Fit a tree on a row-major design matrix
    pub fn fit<R: Rng + ?Sized>(
        rows: &[Vec<f64>],
        targets: &[f64],
        params: &TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a tree without training rows".to_string(),
            ));
        }
        if rows.len() != targets.len() {
            return Err(MathError::InvalidInput(format!(
                "Row count ({}) doesn't match target count ({})",
                rows.len(),
                targets.len()
            )));
        }
        if params.min_samples_leaf == 0 {
            return Err(MathError::InvalidInput(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }

        let n_features = rows[0].len();
        if n_features == 0 {
            return Err(MathError::InvalidInput(
                "Rows must have at least one feature".to_string(),
            ));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(MathError::InvalidInput(format!(
                    "Row {} has {} features, expected {}",
                    i,
                    row.len(),
                    n_features
                )));
            }
            if row.iter().any(|v| !v.is_finite()) || !targets[i].is_finite() {
                return Err(MathError::InvalidInput(format!(
                    "Row {} contains a non-finite value",
                    i
                )));
            }
        }

        let mut tree = Self {
            nodes: Vec::new(),
            n_features,
        };
        let indices: Vec<usize> = (0..rows.len()).collect();
        tree.grow(rows, targets, indices, 0, params, rng);

        Ok(tree)
    }

    /// Predict the target for one row
    pub fn predict(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(MathError::InvalidInput(format!(
                "Row has {} features, tree was fitted on {}",
                row.len(),
                self.n_features
            )));
        }

        let mut node = 0;
        loop {
            match self.nodes[node] {
                Node::Leaf { value } => return Ok(value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Number of features the tree was fitted on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn grow<R: Rng + ?Sized>(
        &mut self,
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut R,
    ) -> usize {
        let node_id = self.nodes.len();
        let value = indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64;
        self.nodes.push(Node::Leaf { value });

        let min_split = params
            .min_samples_split
            .max(2 * params.min_samples_leaf);
        if depth >= params.max_depth || indices.len() < min_split {
            return node_id;
        }

        let Some((feature, threshold)) = self.best_split(rows, targets, &indices, params, rng)
        else {
            return node_id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| rows[i][feature] <= threshold);

        let left = self.grow(rows, targets, left_idx, depth + 1, params, rng);
        let right = self.grow(rows, targets, right_idx, depth + 1, params, rng);
        self.nodes[node_id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };

        node_id
    }

    fn best_split<R: Rng + ?Sized>(
        &self,
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Option<(usize, f64)> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if let Some(k) = params.max_features {
            if k < features.len() {
                features.shuffle(rng);
                features.truncate(k.max(1));
                features.sort_unstable();
            }
        }

        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        // (feature, threshold, sse)
        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = indices.to_vec();

        for &feature in &features {
            order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let y = targets[order[pos]];
                left_sum += y;
                left_sq += y * y;

                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < params.min_samples_leaf || right_n < params.min_samples_leaf {
                    continue;
                }

                let x_here = rows[order[pos]][feature];
                let x_next = rows[order[pos + 1]][feature];
                if x_next <= x_here {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n as f64)
                    + (right_sq - right_sum * right_sum / right_n as f64);

                if best.map_or(true, |(_, _, b)| sse < b) {
                    let mid = (x_here + x_next) / 2.0;
                    let threshold = if mid < x_next { mid } else { x_here };
                    best = Some((feature, threshold, sse));
                }
            }
        }

        best.filter(|&(_, _, sse)| sse < parent_sse - 1e-12)
            .map(|(feature, threshold, _)| (feature, threshold))
    }
}
