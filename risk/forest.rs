//! # Bagged Decision-Tree Ensemble
//!
//! A random forest of depth-limited CART trees for a binary label. Each tree
//! is grown on a bootstrap sample, splitting on Gini impurity over a random
//! subset of features at every node. A leaf stores the fraction of positive
//! samples that reached it, and the forest probability is the mean of the
//! leaf fractions over all trees.
//!
//! Trees are fitted in parallel. Every tree owns an RNG seeded from a value
//! drawn, in tree order, from a master RNG seeded by `ForestConfig::seed`, so
//! the fitted forest does not depend on thread scheduling.

use crate::config::ForestConfig;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForestError {
    #[error("Cannot fit a forest on zero samples.")]
    EmptyTrainingSet,
    #[error("Feature matrix has {rows} rows but {labels} labels were given.")]
    LabelLengthMismatch { rows: usize, labels: usize },
    #[error("Labels must be 0 or 1; found {0}.")]
    InvalidLabel(u8),
    #[error("Training matrix contains a non-finite value at row {row}, column {column}.")]
    NonFiniteFeature { row: usize, column: usize },
    #[error("Row has {found} features but the forest was fitted on {expected}.")]
    FeatureCountMismatch { expected: usize, found: usize },
    #[error("Invalid forest configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        positive_fraction: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Stopping rules shared by every tree of a forest.
#[derive(Debug, Clone, Copy)]
struct TreeParams {
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Sum of child impurities weighted by child sample counts.
    weighted_impurity: f64,
}

/// `n * gini` for a node holding `positives` of `n` samples.
fn weighted_gini(n: usize, positives: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n_f = n as f64;
    let pos = positives as f64;
    let neg = n_f - pos;
    n_f - (pos * pos + neg * neg) / n_f
}

/// A single CART classification tree stored as a flat node arena.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn fit(
        x: ArrayView2<f64>,
        y: &[u8],
        mut samples: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, &mut samples, 0, params, rng);
        tree
    }

    fn grow(
        &mut self,
        x: ArrayView2<f64>,
        y: &[u8],
        samples: &mut [usize],
        depth: usize,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let n = samples.len();
        let positives = samples.iter().filter(|&&i| y[i] == 1).count();
        let node_index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            positive_fraction: positives as f64 / n as f64,
        });

        let pure = positives == 0 || positives == n;
        if pure || depth >= params.max_depth || n < params.min_samples_split {
            return node_index;
        }
        let Some(split) = best_split(x, y, samples, positives, params.max_features, rng) else {
            return node_index;
        };
        if split.weighted_impurity >= weighted_gini(n, positives) - 1e-12 {
            return node_index;
        }

        let mut boundary = 0;
        for i in 0..n {
            if x[[samples[i], split.feature]] <= split.threshold {
                samples.swap(i, boundary);
                boundary += 1;
            }
        }
        let (left_samples, right_samples) = samples.split_at_mut(boundary);
        let left = self.grow(x, y, left_samples, depth + 1, params, rng);
        let right = self.grow(x, y, right_samples, depth + 1, params, rng);
        self.nodes[node_index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_index
    }

    /// Positive fraction of the leaf `row` falls into.
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { positive_fraction } => return *positive_fraction,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Scans features in random order. At least `max_features` are examined; if
/// none of them admits a split the scan continues until one does.
fn best_split(
    x: ArrayView2<f64>,
    y: &[u8],
    samples: &[usize],
    positives: usize,
    max_features: usize,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let n = samples.len();
    let mut best: Option<SplitCandidate> = None;
    let mut ordered: Vec<(f64, u8)> = Vec::with_capacity(n);
    for (visited, &feature) in features.iter().enumerate() {
        if visited >= max_features && best.is_some() {
            break;
        }
        ordered.clear();
        ordered.extend(samples.iter().map(|&i| (x[[i, feature]], y[i])));
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_pos = 0;
        for i in 0..n - 1 {
            left_pos += ordered[i].1 as usize;
            let (here, next) = (ordered[i].0, ordered[i + 1].0);
            if here >= next {
                continue;
            }
            let left_n = i + 1;
            let impurity = weighted_gini(left_n, left_pos)
                + weighted_gini(n - left_n, positives - left_pos);
            if best.is_none_or(|b| impurity < b.weighted_impurity) {
                let mut threshold = here + (next - here) / 2.0;
                if threshold >= next {
                    threshold = here;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    weighted_impurity: impurity,
                });
            }
        }
    }
    best
}

/// A fitted ensemble. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<u8>,
        config: &ForestConfig,
    ) -> Result<Self, ForestError> {
        if config.n_trees == 0 || config.max_depth == 0 || config.min_samples_split < 2 {
            return Err(ForestError::InvalidConfig(format!(
                "n_trees={}, max_depth={}, min_samples_split={}",
                config.n_trees, config.max_depth, config.min_samples_split
            )));
        }
        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(ForestError::EmptyTrainingSet);
        }
        if y.len() != n {
            return Err(ForestError::LabelLengthMismatch {
                rows: n,
                labels: y.len(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&label| label > 1) {
            return Err(ForestError::InvalidLabel(bad));
        }
        if let Some(((row, column), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ForestError::NonFiniteFeature { row, column });
        }

        let labels: Vec<u8> = y.to_vec();
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            max_features: config.features_per_split(x.ncols()),
        };
        let mut master = StdRng::seed_from_u64(config.seed);
        let seeds: Vec<u64> = (0..config.n_trees).map(|_| master.next_u64()).collect();

        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, &labels, bootstrap, params, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    /// Mean over trees of the positive fraction in the reached leaf.
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> Result<f64, ForestError> {
        if row.len() != self.n_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: self.n_features,
                found: row.len(),
            });
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.predict_proba_row(row))
            .sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ForestError> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_proba_row(row))
            .collect()
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<u8, ForestError> {
        Ok(class_of(self.predict_proba_row(row)?))
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<u8>, ForestError> {
        Ok(self.predict_proba(x)?.mapv(class_of))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Class `1` wins only on a strict majority; ties go to class `0`.
pub fn class_of(probability: f64) -> u8 {
    if probability > 0.5 { 1 } else { 0 }
}
