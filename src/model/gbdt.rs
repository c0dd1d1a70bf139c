//! Gradient Boosted Regression Trees.
//!
//! Squared-error boosting: the ensemble starts from the mean target and each
//! round fits a depth-limited regression tree to the current residuals, adding
//! `learning_rate * tree` to the prediction.
//!
//! Trees are grown depth-first with exact greedy splits. For every node the
//! candidate features are scanned in parallel; each scan sorts the node's rows
//! by feature value and sweeps the split point, scoring it by variance
//! reduction. Thresholds sit halfway between adjacent distinct values.

use super::features::{FeatureVector, N_FEATURES};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Gains below this are treated as no improvement.
const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Error, Debug)]
pub enum GbdtError {
    #[error("Cannot fit a regressor on an empty training set")]
    EmptyTrainingSet,
    #[error("Feature rows ({rows}) and targets ({targets}) differ in length")]
    LengthMismatch { rows: usize, targets: usize },
    #[error("Invalid boosting parameters: {0}")]
    InvalidParams(String),
    #[error("Target at row {row} is not finite")]
    NonFiniteTarget { row: usize },
}

/// Parameters for boosting.
///
/// Use struct construction with `..Default::default()` for convenient configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    /// Number of boosting rounds (trees to train).
    pub n_estimators: usize,
    /// Learning rate (shrinkage).
    pub learning_rate: f64,
    /// Maximum depth of each tree. The root is depth 0.
    pub max_depth: usize,
    /// Minimum rows a node needs before it may be split.
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 600,
            learning_rate: 0.05,
            max_depth: 7,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> Result<(), GbdtError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(GbdtError::InvalidParams(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(GbdtError::InvalidParams(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A tree node. Children are indices into the owning tree's node list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: u32,
        right: u32,
    },
    Leaf {
        value: f64,
    },
}

/// A single regression tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Traverse from the root; rows with `row[feature] <= threshold` go left.
    pub fn predict(&self, row: &FeatureVector) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).copied().unwrap_or(f64::NAN);
                    let next = if x <= *threshold { *left } else { *right };
                    idx = next as usize;
                }
                None => return 0.0,
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Children must point forward to existing nodes so traversal terminates.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                Node::Leaf { value } => value.is_finite(),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let (left, right) = (*left as usize, *right as usize);
                    *feature < N_FEATURES
                        && !threshold.is_nan()
                        && left > i
                        && right > i
                        && left < self.nodes.len()
                        && right < self.nodes.len()
                }
            })
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows one tree against a residual vector.
struct TreeGrower<'a> {
    rows: &'a [FeatureVector],
    residuals: &'a [f64],
    params: &'a BoostingParams,
    nodes: Vec<Node>,
}

impl<'a> TreeGrower<'a> {
    fn new(rows: &'a [FeatureVector], residuals: &'a [f64], params: &'a BoostingParams) -> Self {
        Self {
            rows,
            residuals,
            params,
            nodes: Vec::new(),
        }
    }

    fn grow(mut self) -> RegressionTree {
        let all: Vec<usize> = (0..self.rows.len()).collect();
        self.grow_node(all, 0);
        RegressionTree { nodes: self.nodes }
    }

    fn grow_node(&mut self, members: Vec<usize>, depth: usize) -> u32 {
        let id = self.nodes.len();
        let sum: f64 = members.iter().map(|&r| self.residuals[r]).sum();
        let value = if members.is_empty() {
            0.0
        } else {
            sum / members.len() as f64
        };
        self.nodes.push(Node::Leaf { value });

        if depth >= self.params.max_depth || members.len() < self.params.min_samples_split.max(2) {
            return id as u32;
        }
        let Some(split) = self.best_split(&members, sum) else {
            return id as u32;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = members
            .into_iter()
            .partition(|&r| self.rows[r][split.feature] <= split.threshold);

        let left = self.grow_node(left_rows, depth + 1);
        let right = self.grow_node(right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id as u32
    }

    /// Best split across all features. Equal gains keep the lower feature index.
    fn best_split(&self, members: &[usize], sum: f64) -> Option<SplitCandidate> {
        let candidates: Vec<Option<SplitCandidate>> = (0..N_FEATURES)
            .into_par_iter()
            .map(|feature| self.best_split_for_feature(members, sum, feature))
            .collect();

        candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, c| match best {
                Some(b) if b.gain >= c.gain => Some(b),
                _ => Some(c),
            })
    }

    fn best_split_for_feature(
        &self,
        members: &[usize],
        sum: f64,
        feature: usize,
    ) -> Option<SplitCandidate> {
        let n = members.len();
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut sorted: Vec<(f64, f64)> = members
            .iter()
            .map(|&r| (self.rows[r][feature], self.residuals[r]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let parent_score = sum * sum / n as f64;
        let mut best: Option<SplitCandidate> = None;
        let mut left_sum = 0.0;

        for i in 0..n - 1 {
            left_sum += sorted[i].1;
            let (lo, hi) = (sorted[i].0, sorted[i + 1].0);
            if lo == hi {
                continue;
            }
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = sum - left_sum;
            let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64
                - parent_score;
            if gain <= MIN_SPLIT_GAIN || best.is_some_and(|b| b.gain >= gain) {
                continue;
            }

            let mut threshold = lo + (hi - lo) / 2.0;
            if threshold >= hi || !threshold.is_finite() {
                threshold = lo;
            }
            best = Some(SplitCandidate {
                feature,
                threshold,
                gain,
            });
        }
        best
    }
}

/// Additive ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    params: BoostingParams,
    init: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostingRegressor {
    pub fn fit(
        rows: &[FeatureVector],
        targets: &[f64],
        params: &BoostingParams,
    ) -> Result<Self, GbdtError> {
        params.validate()?;
        if rows.len() != targets.len() {
            return Err(GbdtError::LengthMismatch {
                rows: rows.len(),
                targets: targets.len(),
            });
        }
        if rows.is_empty() {
            return Err(GbdtError::EmptyTrainingSet);
        }
        if let Some(row) = targets.iter().position(|t| !t.is_finite()) {
            return Err(GbdtError::NonFiniteTarget { row });
        }

        let n = rows.len();
        let init = targets.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![init; n];
        let mut residuals = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            for ((r, y), p) in residuals.iter_mut().zip(targets).zip(&predictions) {
                *r = y - p;
            }

            let tree = TreeGrower::new(rows, &residuals, params).grow();
            for (p, row) in predictions.iter_mut().zip(rows) {
                *p += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);

            if (round + 1) % 100 == 0 {
                let mse = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
                debug!(round = round + 1, train_rmse = mse.sqrt(), "Boosting progress");
            }
        }

        Ok(Self {
            params: params.clone(),
            init,
            trees,
        })
    }

    pub fn predict(&self, row: &FeatureVector) -> f64 {
        self.init
            + self.params.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    #[cfg(test)]
    pub(crate) fn with_init(mut self, init: f64) -> Self {
        self.init = init;
        self
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.init.is_finite()
            && self.params.learning_rate.is_finite()
            && self.trees.iter().all(RegressionTree::is_well_formed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(x: f64) -> FeatureVector {
        [x, 0.0, 0.0, 0.0, 0.0, 0.0]
    }

    #[test]
    fn single_stump_separates_a_step() {
        let rows: Vec<FeatureVector> = [1.0, 2.0, 3.0, 4.0].map(row).to_vec();
        let targets = [0.0, 0.0, 10.0, 10.0];
        let params = BoostingParams {
            n_estimators: 1,
            learning_rate: 1.0,
            max_depth: 1,
            ..Default::default()
        };

        let model = GradientBoostingRegressor::fit(&rows, &targets, &params).unwrap();
        let tree = &model.trees()[0];
        assert_eq!(tree.n_leaves(), 2);
        match tree.nodes()[0] {
            Node::Split {
                feature, threshold, ..
            } => {
                assert_eq!(feature, 0);
                assert_eq!(threshold, 2.5);
            }
            other => panic!("expected a split at the root, got {other:?}"),
        }
        assert_relative_eq!(model.predict(&row(1.5)), 0.0);
        assert_relative_eq!(model.predict(&row(3.5)), 10.0);
        assert!(model.is_well_formed());
    }

    #[test]
    fn boosting_converges_on_training_rows() {
        let rows: Vec<FeatureVector> = (0..12).map(|i| row(i as f64)).collect();
        let targets: Vec<f64> = (0..12).map(|i| ((i * 7) % 5) as f64).collect();
        let params = BoostingParams {
            n_estimators: 300,
            learning_rate: 0.1,
            max_depth: 6,
            ..Default::default()
        };

        let model = GradientBoostingRegressor::fit(&rows, &targets, &params).unwrap();
        for (r, y) in rows.iter().zip(&targets) {
            assert_relative_eq!(model.predict(r), *y, epsilon = 0.05);
        }
    }

    #[test]
    fn constant_target_yields_leaf_only_trees() {
        let rows: Vec<FeatureVector> = (0..5).map(|i| row(i as f64)).collect();
        let targets = [3.0; 5];
        let params = BoostingParams {
            n_estimators: 3,
            ..Default::default()
        };
        let model = GradientBoostingRegressor::fit(&rows, &targets, &params).unwrap();
        assert!(model.trees().iter().all(|t| t.nodes().len() == 1));
        assert_eq!(model.predict(&row(100.0)), 3.0);
    }

    #[test]
    fn fitting_is_deterministic() {
        let rows: Vec<FeatureVector> = (0..30)
            .map(|i| [(i % 3) as f64, (i % 5) as f64, 0.0, 1.0, i as f64, (i * i) as f64])
            .collect();
        let targets: Vec<f64> = (0..30).map(|i| (i as f64).sin()).collect();
        let params = BoostingParams {
            n_estimators: 20,
            ..Default::default()
        };
        let a = GradientBoostingRegressor::fit(&rows, &targets, &params).unwrap();
        let b = GradientBoostingRegressor::fit(&rows, &targets, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_inputs() {
        let params = BoostingParams::default();
        assert!(matches!(
            GradientBoostingRegressor::fit(&[], &[], &params),
            Err(GbdtError::EmptyTrainingSet)
        ));
        assert!(matches!(
            GradientBoostingRegressor::fit(&[row(1.0)], &[1.0, 2.0], &params),
            Err(GbdtError::LengthMismatch { .. })
        ));
        let bad = BoostingParams {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(GradientBoostingRegressor::fit(&[row(1.0)], &[1.0], &bad).is_err());
        assert!(matches!(
            GradientBoostingRegressor::fit(&[row(1.0), row(2.0)], &[1.0, f64::NEG_INFINITY], &params),
            Err(GbdtError::NonFiniteTarget { row: 1 })
        ));
    }

    #[test]
    fn corrupt_tree_is_detected() {
        let tree = RegressionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 5,
            }],
        };
        assert!(!tree.is_well_formed());
        assert_eq!(tree.predict(&row(2.0)), 0.0);
    }
}
