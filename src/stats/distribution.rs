use std::ops::Range;

use serde::Serialize;

use super::correlation::pearson;
use crate::data::model::Table;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub range: Range<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: String,
    pub bins: Vec<HistogramBin>,
    /// Null and `NaN` cells, not counted in any bin.
    pub excluded: usize,
}

/// Equal-width histogram over `[min, max]` of the non-null values.
///
/// Bins are half-open except the last, which also holds `max`. A column
/// whose values are all equal gets one bin of width 1 centred on the value.
pub fn histogram(table: &Table, column: &str, bins: usize) -> Result<Histogram> {
    if bins == 0 {
        return Err(Error::InvalidParameter("histogram needs at least one bin".into()));
    }
    let values = table.numeric(column)?;
    let present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    let excluded = values.len() - present.len();
    let name = table.column(column)?.name.clone();

    let Some((min, max)) = present.iter().fold(None, |acc: Option<(f64, f64)>, &v| {
        Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
    }) else {
        return Ok(Histogram {
            column: name,
            bins: Vec::new(),
            excluded,
        });
    };

    let (start, width, bins) = if max > min {
        (min, (max - min) / bins as f64, bins)
    } else {
        (min - 0.5, 1.0, 1)
    };
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            range: start + width * i as f64..start + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for v in present {
        let idx = (((v - start) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }

    Ok(Histogram {
        column: name,
        bins: out,
        excluded,
    })
}

/// Paired observations of two numeric columns, e.g. magnitude against
/// casualties or economic loss.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scatter {
    pub x: String,
    pub y: String,
    /// Rows where both cells are present, in row order.
    pub points: Vec<(f64, f64)>,
    pub pearson: f64,
}

pub fn scatter(table: &Table, x: &str, y: &str) -> Result<Scatter> {
    let xs = table.numeric(x)?;
    let ys = table.numeric(y)?;
    let points = xs
        .iter()
        .zip(ys)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    Ok(Scatter {
        x: table.column(x)?.name.clone(),
        y: table.column(y)?.name.clone(),
        points,
        pearson: pearson(xs, ys),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn table() -> Table {
        Table::new(vec![
            Column::numeric(
                "magnitude",
                vec![Some(6.5), Some(7.0), None, Some(7.5), Some(9.0)],
            ),
            Column::numeric(
                "casualties",
                vec![Some(10.0), None, Some(5.0), Some(300.0), Some(2000.0)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn bins_cover_the_range_and_include_max() {
        let h = histogram(&table(), "magnitude", 5).unwrap();
        assert_eq!(h.bins.len(), 5);
        assert_eq!(h.excluded, 1);
        assert_eq!(h.bins[0].range.start, 6.5);
        assert_eq!(h.bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![1, 1, 1, 0, 1]);
    }

    #[test]
    fn constant_column_gets_one_bin() {
        let t = Table::new(vec![Column::numeric("m", vec![Some(3.0), Some(3.0)])]).unwrap();
        let h = histogram(&t, "m", 10).unwrap();
        assert_eq!(h.bins.len(), 1);
        assert_eq!(h.bins[0].count, 2);
        assert!(h.bins[0].range.contains(&3.0));
    }

    #[test]
    fn zero_bins_is_rejected() {
        assert!(matches!(
            histogram(&table(), "magnitude", 0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn scatter_keeps_complete_pairs() {
        let s = scatter(&table(), "magnitude", "casualties").unwrap();
        assert_eq!(s.points, vec![(6.5, 10.0), (7.5, 300.0), (9.0, 2000.0)]);
        assert!(s.pearson > 0.9);
        assert!(matches!(
            scatter(&table(), "magnitude", "economic_loss"),
            Err(Error::ColumnNotFound(_))
        ));
    }
}
