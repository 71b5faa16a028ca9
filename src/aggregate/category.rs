use std::collections::HashMap;

use serde::Serialize;

use super::{with_percentages, Bucket};
use crate::data::model::{Table, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBuckets {
    pub column: String,
    /// Descending by count, ties in first-seen order.
    pub buckets: Vec<Bucket<Value>>,
    /// Distinct non-null categories before truncation.
    pub distinct: usize,
    /// Rows skipped because the category is null.
    pub excluded: usize,
}

/// Rank the values of `column` by frequency, keeping at most `top_n`.
///
/// Percentages are relative to every non-null row, so a truncated ranking
/// sums to less than 100.
pub fn group_by_category(table: &Table, column: &str, top_n: Option<usize>) -> Result<CategoryBuckets> {
    if top_n == Some(0) {
        return Err(Error::InvalidParameter("top_n must be at least 1".into()));
    }
    let col = table.column(column)?;

    let mut order: Vec<(Value, usize)> = Vec::new();
    let mut index: HashMap<Value, usize> = HashMap::new();
    let mut excluded = 0;
    for row in 0..table.len() {
        let value = col.data.get(row);
        if value.is_null() {
            excluded += 1;
            continue;
        }
        match index.get(&value) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(value.clone(), order.len());
                order.push((value, 1));
            }
        }
    }

    let distinct = order.len();
    let total = table.len() - excluded;
    // stable sort keeps first-seen order among equal counts
    order.sort_by(|a, b| b.1.cmp(&a.1));
    if let Some(n) = top_n {
        order.truncate(n);
    }

    Ok(CategoryBuckets {
        column: col.name.clone(),
        buckets: with_percentages(order, total),
        distinct,
        excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn table() -> Table {
        let countries = ["Japan", "Chile", "Japan", "Peru", "Chile", "Fiji", "Japan"];
        let mut values: Vec<Option<String>> = countries.iter().map(|c| Some(c.to_string())).collect();
        values.push(None);
        Table::new(vec![Column::text("country", values)]).unwrap()
    }

    fn keys(b: &CategoryBuckets) -> Vec<(String, usize)> {
        b.buckets.iter().map(|b| (b.key.to_string(), b.count)).collect()
    }

    #[test]
    fn sorted_by_count_with_first_seen_ties() {
        let b = group_by_category(&table(), "country", None).unwrap();
        assert_eq!(
            keys(&b),
            vec![
                ("Japan".into(), 3),
                ("Chile".into(), 2),
                ("Peru".into(), 1),
                ("Fiji".into(), 1)
            ]
        );
        assert_eq!(b.excluded, 1);
        assert_eq!(b.distinct, 4);
    }

    #[test]
    fn truncates_to_top_n() {
        let b = group_by_category(&table(), "country", Some(2)).unwrap();
        assert_eq!(keys(&b), vec![("Japan".into(), 3), ("Chile".into(), 2)]);
        assert_eq!(b.distinct, 4);
        assert!((b.buckets[0].percentage - 300.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn zero_top_n_is_rejected() {
        assert!(matches!(
            group_by_category(&table(), "country", Some(0)),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn unknown_column() {
        assert!(matches!(
            group_by_category(&table(), "continent", None),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn signed_zeros_land_in_one_bucket() {
        let table = Table::new(vec![Column::numeric(
            "felt",
            vec![Some(0.0), Some(-0.0), Some(2.0), Some(0.0)],
        )])
        .unwrap();
        let b = group_by_category(&table, "felt", None).unwrap();
        assert_eq!(b.distinct, 2);
        assert_eq!(b.buckets[0].count, 3);
    }
}
