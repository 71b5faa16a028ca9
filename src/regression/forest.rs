use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Regressor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub trees: usize,
    /// Unlimited when `None`.
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples become leaves.
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: 100,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Node::Leaf(v) => *v,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// Bagged CART regression trees.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<Node>,
    /// Normalized mean impurity decrease per feature; sums to 1 unless no
    /// tree ever split.
    pub importances: Vec<f64>,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestParams,
    /// Total squared-error reduction per feature.
    gains: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, samples: &mut [usize], depth: usize) -> Node {
        let n = samples.len();
        let mean = samples.iter().map(|&i| self.y[i]).sum::<f64>() / n as f64;
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if n < self.params.min_samples_split.max(2) || depth_reached {
            return Node::Leaf(mean);
        }

        let parent_sse = samples.iter().map(|&i| (self.y[i] - mean).powi(2)).sum::<f64>();
        let Some((feature, threshold, sse)) = self.best_split(samples) else {
            return Node::Leaf(mean);
        };
        let gain = parent_sse - sse;
        if gain.is_nan() || gain <= parent_sse * 1e-12 {
            return Node::Leaf(mean);
        }

        // stable partition: left side first
        let x = self.x;
        let goes_left = |i: usize| x[i][feature] <= threshold;
        samples.sort_by_key(|&i| !goes_left(i));
        let split_at = samples.iter().filter(|&&i| goes_left(i)).count();
        if split_at == 0 || split_at == n {
            return Node::Leaf(mean);
        }
        self.gains[feature] += gain;
        let (left, right) = samples.split_at_mut(split_at);
        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    /// Split minimizing the summed squared error of both children.
    fn best_split(&self, samples: &[usize]) -> Option<(usize, f64, f64)> {
        let n = samples.len();
        let features = self.x.first().map_or(0, Vec::len);
        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted = samples.to_vec();

        for f in 0..features {
            sorted.sort_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));
            let total: f64 = sorted.iter().map(|&i| self.y[i]).sum();
            let total_sq: f64 = sorted.iter().map(|&i| self.y[i].powi(2)).sum();

            let (mut sum, mut sum_sq) = (0.0, 0.0);
            for k in 1..n {
                let prev = sorted[k - 1];
                sum += self.y[prev];
                sum_sq += self.y[prev].powi(2);
                let (lo, hi) = (self.x[prev][f], self.x[sorted[k]][f]);
                // equal or NaN neighbours admit no threshold between them
                if lo.partial_cmp(&hi) != Some(Ordering::Less) {
                    continue;
                }
                let left = sum_sq - sum * sum / k as f64;
                let right_sum = total - sum;
                let right = (total_sq - sum_sq) - right_sum * right_sum / (n - k) as f64;
                let sse = left + right;
                if best.map_or(true, |(_, _, b)| sse < b) {
                    best = Some((f, threshold_between(lo, hi), sse));
                }
            }
        }
        best
    }
}

/// Midpoint of `lo < hi`, or `lo` when the midpoint rounds up to `hi`
/// (adjacent floats) or overflows, so `x <= threshold` always separates them.
fn threshold_between(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid.is_finite() && mid < hi {
        mid
    } else {
        lo
    }
}

impl RandomForest {
    /// Fit `params.trees` trees, each on a bootstrap sample drawn from `rng`.
    pub fn fit<R: Rng>(x: &[Vec<f64>], y: &[f64], params: &ForestParams, rng: &mut R) -> Self {
        let n = y.len();
        let features = x.first().map_or(0, Vec::len);
        let mut importances = vec![0.0; features];
        let mut trees = Vec::with_capacity(params.trees);

        for _ in 0..params.trees {
            let mut samples: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let mut builder = TreeBuilder {
                x,
                y,
                params,
                gains: vec![0.0; features],
            };
            trees.push(builder.build(&mut samples, 0));

            let total: f64 = builder.gains.iter().sum();
            if total > 0.0 {
                for (imp, g) in importances.iter_mut().zip(&builder.gains) {
                    *imp += g / total;
                }
            }
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        Self { trees, importances }
    }
}

impl Regressor for RandomForest {
    fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }
}
