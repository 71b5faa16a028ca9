//! Descriptive statistics over the numeric columns of a [`Table`](crate::data::model::Table).
//!
//! - [`descriptive`]: count, mean, std, min, quartiles, max per column
//! - [`correlation`]: pairwise Pearson correlation matrix
//! - [`outliers`]: Tukey IQR fences and the rows outside them
//! - [`distribution`]: histograms and paired scatter series

pub mod correlation;
pub mod descriptive;
pub mod distribution;
pub mod outliers;

pub use correlation::{correlation, CorrelationMatrix};
pub use descriptive::{summary, SummaryStats};
pub use distribution::{histogram, scatter, Histogram, Scatter};
pub use outliers::{outliers, outliers_with};
