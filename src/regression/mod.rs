//! Magnitude regression from location / depth features.
//!
//! [`fit_and_evaluate`] drops incomplete rows, makes a seeded train/test
//! split, fits either ordinary least squares or a random forest on the
//! training side and scores it on the held-out side only.

pub mod forest;
pub mod linear;
pub mod split;

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::data::model::Table;
use crate::error::{Error, Result};

pub use forest::{ForestParams, RandomForest};
pub use linear::LinearModel;
pub use split::{train_test_split, Split};

/// A fitted model that maps one feature row to a prediction.
pub trait Regressor {
    fn predict(&self, row: &[f64]) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    RandomForest(ForestParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionParams {
    pub model: ModelKind,
    /// Share of complete rows held out for scoring, in `(0, 1)`.
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for RegressionParams {
    fn default() -> Self {
        Self {
            model: ModelKind::Linear,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSummary {
    Linear {
        intercept: f64,
        coefficients: Vec<FeatureWeight>,
    },
    RandomForest {
        trees: usize,
        importances: Vec<FeatureWeight>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionResult {
    pub target: String,
    pub model: ModelSummary,
    /// Coefficient of determination on the test rows.
    pub r2: f64,
    /// Mean squared error on the test rows.
    pub mse: f64,
    /// Complete rows, before splitting.
    pub n_samples: usize,
    pub n_train: usize,
    pub n_test: usize,
}

/// Fit `target ~ features` and score it on a held-out split.
pub fn fit_and_evaluate(
    table: &Table,
    features: &[&str],
    target: &str,
    params: &RegressionParams,
) -> Result<RegressionResult> {
    if features.is_empty() {
        return Err(Error::InvalidParameter("at least one feature is required".into()));
    }
    let feature_columns = features
        .iter()
        .map(|f| table.numeric(f))
        .collect::<Result<Vec<_>>>()?;
    let target_column = table.numeric(target)?;

    let (x, y): (Vec<Vec<f64>>, Vec<f64>) = (0..table.len())
        .filter_map(|row| {
            let xs = feature_columns
                .iter()
                .map(|col| col[row])
                .collect::<Option<Vec<f64>>>()?;
            Some((xs, target_column[row]?))
        })
        .unzip();
    let n_samples = y.len();
    log::debug!(
        "regression: {n_samples} of {} rows complete for {target} ~ {features:?}",
        table.len()
    );

    let mut rng = Pcg64::seed_from_u64(params.seed);
    let Split { train, test } = train_test_split(n_samples, params.test_fraction, &mut rng)?;
    let pick_x = |idx: &[usize]| idx.iter().map(|&i| x[i].clone()).collect::<Vec<_>>();
    let pick_y = |idx: &[usize]| idx.iter().map(|&i| y[i]).collect::<Vec<_>>();
    let (x_train, y_train) = (pick_x(&train), pick_y(&train));
    let (x_test, y_test) = (pick_x(&test), pick_y(&test));

    let weights = |values: &[f64]| {
        features
            .iter()
            .zip(values)
            .map(|(f, v)| FeatureWeight {
                feature: f.to_string(),
                value: *v,
            })
            .collect()
    };

    let (model, predictions): (ModelSummary, Vec<f64>) = match &params.model {
        ModelKind::Linear => {
            let fitted = LinearModel::fit(&x_train, &y_train)?;
            (
                ModelSummary::Linear {
                    intercept: fitted.intercept,
                    coefficients: weights(&fitted.coefficients),
                },
                predict_all(&fitted, &x_test),
            )
        }
        ModelKind::RandomForest(forest_params) => {
            if forest_params.trees < 1 {
                return Err(Error::InvalidParameter("a forest needs at least one tree".into()));
            }
            let fitted = RandomForest::fit(&x_train, &y_train, forest_params, &mut rng);
            (
                ModelSummary::RandomForest {
                    trees: forest_params.trees,
                    importances: weights(&fitted.importances),
                },
                predict_all(&fitted, &x_test),
            )
        }
    };

    let result = RegressionResult {
        target: target.to_string(),
        model,
        r2: r2_score(&y_test, &predictions),
        mse: mean_squared_error(&y_test, &predictions),
        n_samples,
        n_train: train.len(),
        n_test: test.len(),
    };
    log::info!(
        "regression on {} train / {} test rows: r2={:.4} mse={:.4}",
        result.n_train,
        result.n_test,
        result.r2,
        result.mse
    );
    Ok(result)
}

fn predict_all<M: Regressor>(model: &M, rows: &[Vec<f64>]) -> Vec<f64> {
    rows.iter().map(|r| model.predict(r)).collect()
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// `1 − SSres / SStot`. A constant `actual` scores 1 when predicted exactly
/// and 0 otherwise; fewer than two samples is `NaN`.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() < 2 {
        return f64::NAN;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
