use std::collections::{BTreeMap, BTreeSet};

use super::model::{ColumnData, Table, Value};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// A column absent from the map is unconstrained.
pub type FilterState = BTreeMap<String, BTreeSet<Value>>;

/// Sorted set of distinct values in a column, `Null` included when present.
pub fn unique_values(table: &Table, column: &str) -> Result<BTreeSet<Value>> {
    let col = table.column(column)?;
    Ok((0..table.len()).map(|i| col.data.get(i)).collect())
}

/// A [`FilterState`] with every value of every categorical (text or bool)
/// column selected, i.e. show everything.
pub fn init_filter_state(table: &Table) -> FilterState {
    table
        .columns()
        .iter()
        .filter(|c| matches!(c.data, ColumnData::Text(_) | ColumnData::Bool(_)))
        .map(|c| {
            let values = (0..table.len()).map(|i| c.data.get(i)).collect();
            (c.name.clone(), values)
        })
        .collect()
}

/// Return indices of rows that pass all active filters.
///
/// A row passes a column filter when:
/// * The filter set for that column is empty → nothing selected → fails
/// * The row's value for that column is in the selected set → passes
///
/// Filters on unknown columns are an error rather than silently ignored.
pub fn filtered_indices(table: &Table, filters: &FilterState) -> Result<Vec<usize>> {
    let active = filters
        .iter()
        .map(|(col, selected)| Ok((table.column(col)?, selected)))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..table.len())
        .filter(|&row| {
            active
                .iter()
                .all(|(col, selected)| selected.contains(&col.data.get(row)))
        })
        .collect())
}

/// Rows whose numeric `column` lies in `[min, max]`; either bound may be open.
/// Null cells never match.
pub fn range_indices(
    table: &Table,
    column: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Vec<usize>> {
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(Error::InvalidParameter(format!(
                "range minimum {lo} exceeds maximum {hi}"
            )));
        }
    }
    let values = table.numeric(column)?;
    Ok(values
        .iter()
        .enumerate()
        .filter(|(_, v)| {
            v.is_some_and(|x| min.map_or(true, |lo| x >= lo) && max.map_or(true, |hi| x <= hi))
        })
        .map(|(i, _)| i)
        .collect())
}
