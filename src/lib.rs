//! Earthquake event analytics.
//!
//! `quakelens` loads one event dataset into a typed, nullable [`Table`] and
//! computes what an earthquake dashboard shows: missing-value reports,
//! descriptive statistics, correlations, IQR outliers, time buckets,
//! category rankings, spatial clusters and a magnitude regression.
//!
//! ```text
//!  data::loader ─► data::quality ─┬─► stats
//!                                 ├─► aggregate
//!                                 └─► regression
//! ```
//!
//! [`session::Session`] wraps the pipeline behind explicit
//! request/response calls with a file-level cache.
//!
//! [`Table`]: data::model::Table

pub mod aggregate;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod regression;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
