use serde::Serialize;

use crate::data::model::Table;

/// Pairwise Pearson coefficients over the numeric columns of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `columns.len()²` entries.
    values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Coefficient at `(row, col)` by position.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.columns.len() + col]
    }

    /// Coefficient by column names; `None` if either is not in the matrix.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.at(i, j))
    }

    /// Rows of the matrix, for display.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.columns.len().max(1))
    }
}

/// Pearson correlation between every pair of numeric columns.
///
/// Each pair uses only the rows where both values are present. Pairs with
/// fewer than two such rows, or with zero variance on either side, are `NaN`.
pub fn correlation(table: &Table) -> CorrelationMatrix {
    let numeric: Vec<(&str, &[Option<f64>])> = table.numeric_columns().collect();
    let n = numeric.len();
    let mut values = vec![f64::NAN; n * n];

    for i in 0..n {
        for j in i..n {
            let r = pearson(numeric[i].1, numeric[j].1);
            let r = if i == j && !r.is_nan() { 1.0 } else { r };
            values[i * n + j] = r;
            values[j * n + i] = r;
        }
    }

    CorrelationMatrix {
        columns: numeric.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}

/// Pearson coefficient over pairwise-complete observations, clamped to `[-1, 1]`.
/// `NaN` cells count as missing.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in &pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    #[test]
    fn symmetric_with_unit_diagonal() {
        let table = Table::new(vec![
            Column::numeric("depth", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            Column::numeric("magnitude", vec![Some(2.0), Some(4.0), Some(6.0), Some(8.5)]),
            Column::numeric("sig", vec![Some(4.0), Some(3.0), Some(2.0), Some(1.0)]),
        ])
        .unwrap();
        let m = correlation(&table);
        assert_eq!(m.len(), 3);
        for i in 0..3 {
            assert_eq!(m.at(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(m.at(i, j), m.at(j, i));
            }
        }
        assert!((m.get("depth", "sig").unwrap() + 1.0).abs() < 1e-12);
        assert!(m.get("depth", "magnitude").unwrap() > 0.99);
    }

    #[test]
    fn zero_variance_is_nan() {
        let table = Table::new(vec![
            Column::numeric("depth", vec![Some(1.0), Some(2.0), Some(3.0)]),
            Column::numeric("flat", vec![Some(5.0), Some(5.0), Some(5.0)]),
        ])
        .unwrap();
        let m = correlation(&table);
        assert!(m.get("depth", "flat").unwrap().is_nan());
        assert!(m.get("flat", "flat").unwrap().is_nan());
        assert_eq!(m.get("depth", "depth"), Some(1.0));
    }

    #[test]
    fn uses_pairwise_complete_rows() {
        let xs = [Some(1.0), None, Some(2.0), Some(3.0)];
        let ys = [Some(2.0), Some(100.0), Some(4.0), Some(6.0)];
        assert!((pearson(&xs, &ys) - 1.0).abs() < 1e-12);
        let xs = [Some(1.0), Some(f64::NAN), Some(2.0), Some(3.0)];
        assert!((pearson(&xs, &ys) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn text_columns_are_skipped() {
        let table = Table::new(vec![
            Column::text("country", vec![Some("Fiji".into())]),
            Column::numeric("depth", vec![Some(1.0)]),
        ])
        .unwrap();
        let m = correlation(&table);
        assert_eq!(m.columns, vec!["depth".to_string()]);
        assert!(m.at(0, 0).is_nan());
    }
}
