use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::data::quality::FillStrategy;

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Which source columns carry the event attributes.
///
/// Names are matched after normalization (see
/// [`normalize_column_name`](crate::data::model::normalize_column_name)), so
/// `Latitude` and `latitude` refer to the same column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub timestamp: String,
    pub latitude: String,
    pub longitude: String,
    pub magnitude: String,
    pub depth: String,
    pub country: Option<String>,
    pub continent: Option<String>,
    pub location: Option<String>,
    pub tsunami: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            timestamp: "date_time".into(),
            latitude: "latitude".into(),
            longitude: "longitude".into(),
            magnitude: "magnitude".into(),
            depth: "depth".into(),
            country: Some("country".into()),
            continent: Some("continent".into()),
            location: Some("location".into()),
            tsunami: Some("tsunami".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub eps: f64,
    pub min_samples: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            eps: 0.3,
            min_samples: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    pub features: Vec<String>,
    pub target: String,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            features: vec!["depth".into(), "latitude".into(), "longitude".into()],
            target: "magnitude".into(),
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Everything a caller chooses before running an analysis.
///
/// Loaded from JSON; every field is optional and falls back to the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnMapping,
    pub fill: FillStrategy,
    /// Tukey fence multiplier for outlier detection.
    pub outlier_multiplier: f64,
    pub cluster: ClusterConfig,
    pub regression: RegressionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMapping::default(),
            fill: FillStrategy::Mean,
            outlier_multiplier: 1.5,
            cluster: ClusterConfig::default(),
            regression: RegressionConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::debug!("loaded config from {}: {config:?}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "fill": "median", "columns": { "latitude": "Lat" } }"#)
                .unwrap();
        assert_eq!(config.fill, FillStrategy::Median);
        assert_eq!(config.columns.latitude, "Lat");
        assert_eq!(config.columns.longitude, "longitude");
        assert_eq!(config.outlier_multiplier, 1.5);
        assert_eq!(config.regression.seed, 42);
    }

    #[test]
    fn empty_object_is_default() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
