//! Spatiotemporal aggregation: calendar buckets, category rankings and
//! density-based clustering of epicentres.
//!
//! Everything here is a pure function of a `&Table`.

pub mod category;
pub mod cluster;
pub mod time;

use serde::Serialize;

use crate::error::{Error, Result};

pub use category::{group_by_category, CategoryBuckets};
pub use cluster::{cluster, cluster_sizes, NOISE};
pub use time::{bucket_by_time, TimeBuckets, TimeKey, TimeUnit};

/// One aggregation bucket: a key, its row count and share of all counted rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<K> {
    pub key: K,
    pub count: usize,
    /// `count` as a percentage (0–100) of the rows that were bucketed.
    pub percentage: f64,
}

pub(crate) fn with_percentages<K>(counts: impl IntoIterator<Item = (K, usize)>, total: usize) -> Vec<Bucket<K>> {
    counts
        .into_iter()
        .map(|(key, count)| Bucket {
            key,
            count,
            percentage: if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            },
        })
        .collect()
}

/// Trailing mean of bucket counts over `window` buckets.
///
/// The result is aligned with `buckets`; the first `window - 1` entries are
/// `None` since no partial windows are averaged.
pub fn rolling_average<K>(buckets: &[Bucket<K>], window: usize) -> Result<Vec<Option<f64>>> {
    if window < 1 {
        return Err(Error::InvalidParameter("rolling window must be at least 1".into()));
    }
    let counts: Vec<f64> = buckets.iter().map(|b| b.count as f64).collect();
    Ok((0..counts.len())
        .map(|i| {
            (i + 1 >= window).then(|| counts[i + 1 - window..=i].iter().sum::<f64>() / window as f64)
        })
        .collect())
}
