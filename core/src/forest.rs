//! Bagged ensemble of CART classification trees.
//!
//! Each tree is grown on a bootstrap sample and considers √d randomly
//! chosen features per split (Gini impurity). Probabilities are the mean
//! of the leaf churn fractions across trees; importances are the mean
//! per-tree normalized impurity decrease.
//!
//! All randomness comes from the caller's StageRng, so a fixed seed
//! reproduces the same forest.

use crate::{
    error::{PipelineError, PipelineResult},
    rng::StageRng,
};

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        p_positive: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Normalized impurity decrease per feature (sums to 1, or all 0).
    importances: Vec<f64>,
}

impl DecisionTree {
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { p_positive } => return *p_positive,
                Node::Split { feature, threshold, left, right } => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match &nodes[at] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fit on `x` (one row per sample) and binary labels `y`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        params: ForestParams,
        rng: &mut StageRng,
    ) -> PipelineResult<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(PipelineError::EmptyDataset(format!(
                "cannot fit a forest on {} rows and {} labels",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(PipelineError::DataFormat("ragged feature matrix".into()));
        }

        let max_features = ((n_features as f64).sqrt().round() as usize).clamp(1, n_features.max(1));
        let trees = (0..params.n_trees.max(1))
            .map(|t| {
                let mut sample: Vec<usize> = (0..x.len())
                    .map(|_| rng.next_u64_below(x.len() as u64) as usize)
                    .collect();
                let mut builder = TreeBuilder {
                    x,
                    y,
                    params,
                    max_features,
                    nodes: Vec::new(),
                    importances: vec![0.0; n_features],
                };
                builder.grow(&mut sample, 0, rng);
                let tree = builder.finish();
                log::debug!(
                    "forest: tree {t} grown ({} nodes, depth {})",
                    tree.nodes.len(),
                    tree.depth()
                );
                tree
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    /// Mean churn probability over all trees, in [0, 1].
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
        sum / self.trees.len() as f64
    }

    /// Mean decrease in impurity per feature, normalized to sum to 1.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (acc, imp) in total.iter_mut().zip(&tree.importances) {
                *acc += imp;
            }
        }
        normalize(&mut total);
        total
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity: n_left·gini_left + n_right·gini_right.
    child_impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    params: ForestParams,
    max_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn finish(mut self) -> DecisionTree {
        normalize(&mut self.importances);
        DecisionTree {
            nodes: self.nodes,
            importances: self.importances,
        }
    }

    /// Grow the subtree for `samples`; returns its node index.
    fn grow(&mut self, samples: &mut [usize], depth: usize, rng: &mut StageRng) -> usize {
        let n = samples.len();
        let positives = samples.iter().filter(|&&i| self.y[i] == 1).count();
        let at = self.nodes.len();
        self.nodes.push(Node::Leaf {
            p_positive: positives as f64 / n.max(1) as f64,
        });

        if depth >= self.params.max_depth
            || n < self.params.min_samples_split.max(2)
            || positives == 0
            || positives == n
        {
            return at;
        }

        let Some(split) = self.best_split(samples, rng) else {
            return at;
        };

        let mut mid = 0;
        for k in 0..n {
            if self.x[samples[k]][split.feature] <= split.threshold {
                samples.swap(k, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == n {
            return at;
        }

        let parent_impurity = n as f64 * gini(positives, n);
        self.importances[split.feature] += (parent_impurity - split.child_impurity).max(0.0);

        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(left_samples, depth + 1, rng);
        let right = self.grow(right_samples, depth + 1, rng);
        self.nodes[at] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        at
    }

    /// Best threshold over `max_features` random features. When none of
    /// those can separate the samples, keep drawing from the rest.
    fn best_split(&self, samples: &[usize], rng: &mut StageRng) -> Option<BestSplit> {
        let n_features = self.importances.len();
        let mut order: Vec<usize> = (0..n_features).collect();
        rng.shuffle(&mut order);

        let total_pos = samples.iter().filter(|&&i| self.y[i] == 1).count();
        let n = samples.len();
        let mut best: Option<BestSplit> = None;
        let mut pairs: Vec<(f64, u8)> = Vec::with_capacity(n);

        for (visited, &feature) in order.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            pairs.clear();
            pairs.extend(samples.iter().map(|&i| (self.x[i][feature], self.y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0;
            for k in 0..n - 1 {
                left_pos += pairs[k].1 as usize;
                let (lo, hi) = (pairs[k].0, pairs[k + 1].0);
                if lo >= hi {
                    continue;
                }
                let n_left = k + 1;
                let n_right = n - n_left;
                let child = n_left as f64 * gini(left_pos, n_left)
                    + n_right as f64 * gini(total_pos - left_pos, n_right);
                if best.as_ref().map_or(true, |b| child < b.child_impurity) {
                    let mid = lo + (hi - lo) / 2.0;
                    best = Some(BestSplit {
                        feature,
                        threshold: if mid >= hi { lo } else { mid },
                        child_impurity: child,
                    });
                }
            }
        }
        best
    }
}
