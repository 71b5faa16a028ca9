use serde::Serialize;

use super::descriptive::quantile_sorted;
use crate::data::model::Table;
use crate::error::{Error, Result};

/// Standard Tukey fence multiplier.
pub const TUKEY_K: f64 = 1.5;

/// Quartiles and fences used for one outlier pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fences {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Fences {
    /// `[Q1 − k·IQR, Q3 + k·IQR]` over the non-null, non-NaN values; `None`
    /// if there are none.
    pub fn new(values: &[Option<f64>], k: f64) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - k * iqr,
            upper: q3 + k * iqr,
        })
    }

    pub fn contains(&self, v: f64) -> bool {
        (self.lower..=self.upper).contains(&v)
    }
}

/// Rows whose `column` value lies strictly outside the 1.5·IQR fences,
/// in original order.
pub fn outliers(table: &Table, column: &str) -> Result<Table> {
    outliers_with(table, column, TUKEY_K)
}

/// [`outliers`] with a custom fence multiplier `k > 0`.
pub fn outliers_with(table: &Table, column: &str, k: f64) -> Result<Table> {
    Ok(table.take(&outlier_indices(table, column, k)?))
}

/// Row indices flagged by the fences. Null and `NaN` cells are never outliers.
pub fn outlier_indices(table: &Table, column: &str, k: f64) -> Result<Vec<usize>> {
    if !(k.is_finite() && k > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "fence multiplier must be positive, got {k}"
        )));
    }
    let values = table.numeric(column)?;
    let Some(fences) = Fences::new(values, k) else {
        return Ok(Vec::new());
    };
    let rows: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_some_and(|x| !x.is_nan() && !fences.contains(x)))
        .map(|(i, _)| i)
        .collect();
    log::debug!(
        "outliers in '{column}': {} rows outside [{}, {}]",
        rows.len(),
        fences.lower,
        fences.upper
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, Value};

    fn table(values: Vec<Option<f64>>) -> Table {
        Table::new(vec![
            Column::numeric("magnitude", values.clone()),
            Column::numeric("id", (0..values.len()).map(|i| Some(i as f64)).collect()),
        ])
        .unwrap()
    }

    #[test]
    fn flags_only_the_extreme_value() {
        let t = table(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(100.0)]);
        let out = outliers(&t, "magnitude").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.row(0), vec![Value::Number(100.0), Value::Number(4.0)]);
    }

    #[test]
    fn preserves_row_order_and_skips_nulls() {
        let t = table(vec![
            Some(-50.0),
            Some(5.0),
            None,
            Some(5.0),
            Some(6.0),
            Some(5.0),
            Some(60.0),
        ]);
        assert_eq!(outlier_indices(&t, "magnitude", TUKEY_K).unwrap(), vec![0, 6]);
    }

    #[test]
    fn boundary_values_are_not_outliers() {
        // q1 = 2, q3 = 4, upper fence = 7
        let t = table(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(7.0)]);
        let fences = Fences::new(t.numeric("magnitude").unwrap(), TUKEY_K).unwrap();
        assert_eq!(fences.upper, 7.0);
        assert!(outliers(&t, "magnitude").unwrap().is_empty());
    }

    #[test]
    fn missing_column_and_bad_multiplier() {
        let t = table(vec![Some(1.0)]);
        assert!(matches!(outliers(&t, "depth"), Err(Error::ColumnNotFound(_))));
        assert!(matches!(
            outliers_with(&t, "magnitude", 0.0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn all_null_column_has_no_outliers() {
        let t = table(vec![None, None]);
        assert!(outliers(&t, "magnitude").unwrap().is_empty());
    }

    #[test]
    fn nan_cells_leave_fences_finite() {
        let t = table(vec![Some(1.0), Some(f64::NAN), Some(2.0), Some(3.0), Some(4.0), Some(100.0)]);
        let fences = Fences::new(t.numeric("magnitude").unwrap(), TUKEY_K).unwrap();
        assert_eq!((fences.q1, fences.q3), (2.0, 4.0));
        assert_eq!(outlier_indices(&t, "magnitude", TUKEY_K).unwrap(), vec![5]);
    }
}
