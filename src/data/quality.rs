use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::{ColumnData, Table};
use crate::error::{Error, Result};
use crate::stats::descriptive::quantile_sorted;

// ---------------------------------------------------------------------------
// Missing values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
    /// Share of rows that are null, 0–100.
    pub percent: f64,
}

/// Null count per column, in schema order.
pub fn missing_counts(table: &Table) -> Vec<MissingCount> {
    let rows = table.len();
    table
        .columns()
        .iter()
        .map(|col| {
            let missing = col.data.null_count();
            MissingCount {
                column: col.name.clone(),
                missing,
                percent: if rows == 0 {
                    0.0
                } else {
                    missing as f64 * 100.0 / rows as f64
                },
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Fill strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    #[default]
    None,
    Mean,
    Median,
    Mode,
    LinearInterpolation,
}

impl FromStr for FillStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(FillStrategy::None),
            "mean" => Ok(FillStrategy::Mean),
            "median" => Ok(FillStrategy::Median),
            "mode" => Ok(FillStrategy::Mode),
            "linear_interpolation" | "interpolate" | "linear" => Ok(FillStrategy::LinearInterpolation),
            other => Err(Error::InvalidParameter(format!("unknown fill strategy '{other}'"))),
        }
    }
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillStrategy::None => "none",
            FillStrategy::Mean => "mean",
            FillStrategy::Median => "median",
            FillStrategy::Mode => "mode",
            FillStrategy::LinearInterpolation => "linear_interpolation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillReport {
    pub strategy: FillStrategy,
    /// Cells filled per column; columns with nothing filled are omitted.
    pub filled: Vec<(String, usize)>,
}

/// Resolve null cells in place.
///
/// Mean, median and interpolation touch numeric columns only; mode also
/// fills text, bool and timestamp columns. Only null cells change, and a
/// failing call leaves the table untouched.
pub fn fill(table: &mut Table, strategy: FillStrategy) -> Result<FillReport> {
    if strategy == FillStrategy::LinearInterpolation {
        for col in table.columns() {
            if let ColumnData::Numeric(values) = &col.data {
                let present = values.iter().flatten().count();
                if present < values.len() && present < 2 {
                    return Err(Error::InsufficientData(format!(
                        "column '{}' has {present} non-null values, interpolation needs 2",
                        col.name
                    )));
                }
            }
        }
    }

    let mut filled = Vec::new();
    for col in table.columns_mut() {
        let count = match (&mut col.data, strategy) {
            (_, FillStrategy::None) => 0,
            (ColumnData::Numeric(values), FillStrategy::Mean) => {
                let m = mean(values);
                fill_constant(values, m)
            }
            (ColumnData::Numeric(values), FillStrategy::Median) => {
                let m = median(values);
                fill_constant(values, m)
            }
            (ColumnData::Numeric(values), FillStrategy::Mode) => {
                let bits: Vec<Option<u64>> = values.iter().map(|v| v.map(f64::to_bits)).collect();
                fill_constant(values, mode(&bits).map(f64::from_bits))
            }
            (ColumnData::Numeric(values), FillStrategy::LinearInterpolation) => interpolate(values),
            (ColumnData::Text(values), FillStrategy::Mode) => {
                let m = mode(values.as_slice());
                fill_constant(values, m)
            }
            (ColumnData::Bool(values), FillStrategy::Mode) => {
                let m = mode(values.as_slice());
                fill_constant(values, m)
            }
            (ColumnData::Timestamp(values), FillStrategy::Mode) => {
                let m = mode(values.as_slice());
                fill_constant(values, m)
            }
            _ => 0,
        };
        if count > 0 {
            log::debug!("{strategy} fill: {count} cells in '{}'", col.name);
            filled.push((col.name.clone(), count));
        }
    }
    Ok(FillReport { strategy, filled })
}

/// Rows with a null in any of `subset` removed; an empty subset means every column.
pub fn drop_nulls(table: &Table, subset: &[&str]) -> Result<Table> {
    let columns = if subset.is_empty() {
        table.columns().iter().collect::<Vec<_>>()
    } else {
        subset
            .iter()
            .map(|name| table.column(name))
            .collect::<Result<Vec<_>>>()?
    };
    let keep: Vec<usize> = (0..table.len())
        .filter(|&row| columns.iter().all(|c| !c.data.is_null(row)))
        .collect();
    log::debug!("drop_nulls: kept {} of {} rows", keep.len(), table.len());
    Ok(table.take(&keep))
}

// -- helpers --

fn fill_constant<T: Clone>(values: &mut [Option<T>], fill: Option<T>) -> usize {
    let Some(fill) = fill else {
        return 0;
    };
    let mut count = 0;
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(fill.clone());
        count += 1;
    }
    count
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    Some(quantile_sorted(&sorted, 0.5))
}

/// Most frequent value; ties go to the one seen first.
fn mode<T: Eq + Hash + Clone>(values: &[Option<T>]) -> Option<T> {
    let mut counts: HashMap<&T, (usize, usize)> = HashMap::new();
    for (pos, v) in values.iter().flatten().enumerate() {
        counts.entry(v).or_insert((0, pos)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(v, _)| v.clone())
}

/// Linear interpolation by row position; edges take the nearest known value.
fn interpolate(values: &mut [Option<f64>]) -> usize {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();
    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return 0;
    };

    let mut count = 0;
    for (i, slot) in values.iter_mut().enumerate() {
        if slot.is_some() {
            continue;
        }
        let filled = if i < first.0 {
            first.1
        } else if i > last.0 {
            last.1
        } else {
            let p = known.partition_point(|&(k, _)| k < i);
            let ((lo, lo_v), (hi, hi_v)) = (known[p - 1], known[p]);
            let t = (i - lo) as f64 / (hi - lo) as f64;
            lo_v + t * (hi_v - lo_v)
        };
        *slot = Some(filled);
        count += 1;
    }
    count
}
