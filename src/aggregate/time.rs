use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::{with_percentages, Bucket};
use crate::data::model::Table;
use crate::error::{Error, Result};

/// Calendar unit for time bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Year,
    /// Calendar month within its year (`2023-08`).
    Month,
    /// Month of the year regardless of year, for seasonal profiles.
    MonthOfYear,
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "year" => Ok(TimeUnit::Year),
            "month" => Ok(TimeUnit::Month),
            "month_of_year" | "season" => Ok(TimeUnit::MonthOfYear),
            other => Err(Error::InvalidParameter(format!("unknown time unit '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum TimeKey {
    Year(i32),
    Month { year: i32, month: u32 },
    MonthOfYear(u32),
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeKey::Year(y) => write!(f, "{y}"),
            TimeKey::Month { year, month } => write!(f, "{year}-{month:02}"),
            TimeKey::MonthOfYear(m) => write!(f, "{m:02}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBuckets {
    pub unit: TimeUnit,
    /// Ascending by key. Only observed keys appear.
    pub buckets: Vec<Bucket<TimeKey>>,
    /// Rows skipped because their timestamp is null.
    pub excluded: usize,
}

/// Count rows per calendar unit of the timestamp `column`.
pub fn bucket_by_time(table: &Table, column: &str, unit: TimeUnit) -> Result<TimeBuckets> {
    let timestamps = table.timestamps(column)?;

    let mut counts: BTreeMap<TimeKey, usize> = BTreeMap::new();
    let mut excluded = 0;
    for ts in timestamps {
        let Some(ts) = ts else {
            excluded += 1;
            continue;
        };
        let key = match unit {
            TimeUnit::Year => TimeKey::Year(ts.year()),
            TimeUnit::Month => TimeKey::Month {
                year: ts.year(),
                month: ts.month(),
            },
            TimeUnit::MonthOfYear => TimeKey::MonthOfYear(ts.month()),
        };
        *counts.entry(key).or_default() += 1;
    }
    if excluded > 0 {
        log::debug!("bucket_by_time: {excluded} rows without timestamp excluded");
    }

    let total = timestamps.len() - excluded;
    Ok(TimeBuckets {
        unit,
        buckets: with_percentages(counts, total),
        excluded,
    })
}
