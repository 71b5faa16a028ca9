use super::Regressor;
use crate::error::{Error, Result};

/// Ordinary least squares with an intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    /// Fit on rows of `x` (one slice per sample) against `y`.
    ///
    /// Solves the centred normal equations. Collinear or constant features
    /// leave the system singular, which is reported as insufficient data.
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        let n = y.len();
        let p = x.first().map_or(0, Vec::len);
        if n == 0 || p == 0 {
            return Err(Error::InsufficientData("no training rows".into()));
        }

        let nf = n as f64;
        let x_mean: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / nf)
            .collect();
        let y_mean = y.iter().sum::<f64>() / nf;

        let mut a = vec![vec![0.0; p]; p];
        let mut b = vec![0.0; p];
        for (row, &target) in x.iter().zip(y) {
            let dy = target - y_mean;
            for i in 0..p {
                let di = row[i] - x_mean[i];
                b[i] += di * dy;
                for j in i..p {
                    a[i][j] += di * (row[j] - x_mean[j]);
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                a[i][j] = a[j][i];
            }
        }

        let coefficients = solve(a, b).ok_or_else(|| {
            Error::InsufficientData("features are constant or collinear on the training rows".into())
        })?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(c, m)| c * m)
                .sum::<f64>();
        Ok(Self {
            intercept,
            coefficients,
        })
    }
}

impl Regressor for LinearModel {
    fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

/// Gaussian elimination with partial pivoting. `None` when singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let p = b.len();
    let scale = (0..p).map(|i| a[i][i].abs()).fold(0.0, f64::max);
    if scale == 0.0 {
        return None;
    }
    let tolerance = scale * 1e-10;

    for col in 0..p {
        let pivot = (col..p).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col].abs() <= tolerance {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for r in col + 1..p {
            let factor = a[r][col] / a[col][col];
            for c in col..p {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; p];
    for r in (0..p).rev() {
        let tail: f64 = (r + 1..p).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    Some(x)
}
