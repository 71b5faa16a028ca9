use serde::Serialize;

use crate::data::model::Table;

/// Descriptive statistics for one numeric column, the same set a
/// `describe()` table shows.
///
/// A column with no non-null values has `count == 0` and every other field
/// `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub column: String,
    /// Number of non-null values.
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (`n - 1` denominator); `NaN` below two values.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl SummaryStats {
    /// Computes statistics over the non-null values of a column. `NaN`
    /// cells count as missing.
    ///
    /// # Examples
    ///
    /// ```
    /// # use quakelens::stats::descriptive::SummaryStats;
    /// let stats = SummaryStats::new("depth", &[Some(1.0), None, Some(3.0), Some(2.0)]);
    /// assert_eq!(stats.count, 3);
    /// assert_eq!(stats.mean, 2.0);
    /// assert_eq!(stats.median, 2.0);
    /// assert_eq!(stats.std, 1.0);
    /// ```
    #[must_use]
    pub fn new(column: &str, values: &[Option<f64>]) -> Self {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(column, &sorted)
    }

    /// Computes statistics from values already sorted ascending.
    ///
    /// Unsorted input gives meaningless quantiles but never panics.
    #[must_use]
    pub fn from_sorted(column: &str, sorted_values: &[f64]) -> Self {
        let count = sorted_values.len();
        let n = count as f64;
        let (min, max) = match (sorted_values.first(), sorted_values.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => (f64::NAN, f64::NAN),
        };
        let mean = if count == 0 {
            f64::NAN
        } else {
            sorted_values.iter().sum::<f64>() / n
        };
        let std = if count < 2 {
            f64::NAN
        } else {
            let ss = sorted_values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
            (ss / (n - 1.0)).sqrt()
        };

        Self {
            column: column.to_string(),
            count,
            mean,
            std,
            min,
            q25: quantile_sorted(sorted_values, 0.25),
            median: quantile_sorted(sorted_values, 0.5),
            q75: quantile_sorted(sorted_values, 0.75),
            max,
        }
    }
}

/// Summary statistics for every numeric column, in schema order.
pub fn summary(table: &Table) -> Vec<SummaryStats> {
    table
        .numeric_columns()
        .map(|(name, values)| SummaryStats::new(name, values))
        .collect()
}

/// Quantile of sorted data by linear interpolation between closest ranks.
///
/// `q` is a fraction in `[0, 1]`. The position is `q * (n - 1)`; a
/// fractional position interpolates between its two neighbours.
/// Returns `NaN` for empty input.
///
/// # Examples
///
/// ```
/// use quakelens::stats::descriptive::quantile_sorted;
///
/// let values = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(quantile_sorted(&values, 0.5), 2.5);
/// assert_eq!(quantile_sorted(&values, 0.0), 1.0);
/// assert_eq!(quantile_sorted(&values, 1.0), 4.0);
/// ```
#[must_use]
pub fn quantile_sorted(sorted_values: &[f64], q: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted_values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted_values[lo] + frac * (sorted_values[hi] - sorted_values[lo])
}
