use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, CategoryBuckets, TimeBuckets, TimeUnit};
use crate::color::{magnitude_color, marker_radius, ClusterColors};
use crate::config::{ColumnMapping, PipelineConfig};
use crate::data::filter::{filtered_indices, range_indices, FilterState};
use crate::data::loader::{load_file, parse_timestamp};
use crate::data::model::{ColumnType, Table, Value};
use crate::data::quality::{self, FillReport, MissingCount};
use crate::error::{Error, Result};
use crate::regression::{self, ModelKind, RegressionParams, RegressionResult};
use crate::stats::correlation::{correlation, CorrelationMatrix};
use crate::stats::descriptive::{summary, SummaryStats};
use crate::stats::distribution::{histogram, scatter, Histogram, Scatter};
use crate::stats::outliers::{outlier_indices, Fences};

// ---------------------------------------------------------------------------
// Dataset cache
// ---------------------------------------------------------------------------

struct CachedTable {
    modified: SystemTime,
    mapping: ColumnMapping,
    table: Table,
}

/// Loaded tables keyed by path, reused while the file's modification time
/// and the column mapping stay the same.
#[derive(Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, CachedTable>,
}

impl DatasetCache {
    pub fn get_or_load(&mut self, path: &Path, mapping: &ColumnMapping) -> Result<&Table> {
        let key = path.canonicalize()?;
        let modified = std::fs::metadata(&key)?.modified()?;

        let fresh = self
            .entries
            .get(&key)
            .is_some_and(|c| c.modified == modified && c.mapping == *mapping);
        if fresh {
            log::debug!("cache hit for {}", key.display());
        } else {
            let table = load_file(&key, mapping)?;
            self.entries.insert(
                key.clone(),
                CachedTable {
                    modified,
                    mapping: mapping.clone(),
                    table,
                },
            );
        }
        Ok(&self.entries[&key].table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

const DEFAULT_BINS: usize = 20;

/// One interaction from a reporting front end. Unset fields fall back to
/// the session's [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum Request {
    Overview,
    Summary,
    Correlation,
    Outliers {
        column: Option<String>,
        multiplier: Option<f64>,
    },
    Histogram {
        column: Option<String>,
        bins: Option<usize>,
    },
    Scatter {
        x: Option<String>,
        y: String,
    },
    Timeline {
        unit: TimeUnit,
        window: Option<usize>,
    },
    Categories {
        column: Option<String>,
        top_n: Option<usize>,
    },
    Clusters {
        eps: Option<f64>,
        min_samples: Option<usize>,
    },
    MapPoints {
        min_magnitude: Option<f64>,
        #[serde(default)]
        color_by_cluster: bool,
    },
    Regression {
        features: Option<Vec<String>>,
        target: Option<String>,
        model: Option<ModelKind>,
        test_fraction: Option<f64>,
        seed: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub rows: usize,
    pub schema: Vec<(String, ColumnType)>,
    /// Missing values as loaded, before filling.
    pub missing: Vec<MissingCount>,
    pub fill: FillReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: Option<f64>,
    pub depth: Option<f64>,
    pub label: Option<String>,
    pub color: String,
    pub radius: f64,
    pub cluster: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum Response {
    Overview(Overview),
    Summary {
        columns: Vec<SummaryStats>,
    },
    Correlation(CorrelationMatrix),
    Outliers {
        column: String,
        fences: Option<Fences>,
        rows: Table,
    },
    Histogram(Histogram),
    Scatter(Scatter),
    Timeline {
        buckets: TimeBuckets,
        rolling: Option<Vec<Option<f64>>>,
    },
    Categories(CategoryBuckets),
    Clusters {
        labels: Vec<i32>,
        sizes: Vec<(i32, usize)>,
    },
    MapPoints {
        /// Mean position of the plotted points.
        center: Option<(f64, f64)>,
        points: Vec<MapPoint>,
    },
    Regression(RegressionResult),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Explicit request/response handler over one dataset file.
///
/// Every request starts from the cached table as loaded, applies the
/// configured fill strategy and row filters to a private copy, then runs
/// one analysis. Nothing from a previous request leaks into the next.
pub struct Session {
    path: PathBuf,
    config: PipelineConfig,
    filters: Vec<(String, Vec<String>)>,
    cache: DatasetCache,
}

impl Session {
    pub fn new(path: impl Into<PathBuf>, config: PipelineConfig) -> Self {
        Self {
            path: path.into(),
            config,
            filters: Vec::new(),
            cache: DatasetCache::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Keep only rows whose `column` equals one of `values` (compared after
    /// parsing each value as the column's type). Repeated calls for the same
    /// column widen its selection.
    pub fn add_filter(&mut self, column: &str, values: Vec<String>) {
        match self.filters.iter_mut().find(|(c, _)| c == column) {
            Some((_, selected)) => selected.extend(values),
            None => self.filters.push((column.to_string(), values)),
        }
    }

    pub fn handle(&mut self, request: Request) -> Result<Response> {
        log::debug!("handling {request:?}");
        let loaded = self.cache.get_or_load(&self.path, &self.config.columns)?;
        let missing = quality::missing_counts(loaded);
        let mut table = loaded.clone();
        let fill = quality::fill(&mut table, self.config.fill)?;
        let table = self.apply_filters(table)?;
        let cfg = &self.config;
        let cols = &cfg.columns;

        let response = match request {
            Request::Overview => Response::Overview(Overview {
                rows: table.len(),
                schema: table.schema(),
                missing,
                fill,
            }),
            Request::Summary => Response::Summary {
                columns: summary(&table),
            },
            Request::Correlation => Response::Correlation(correlation(&table)),
            Request::Outliers { column, multiplier } => {
                let column = column.unwrap_or_else(|| cols.magnitude.clone());
                let k = multiplier.unwrap_or(cfg.outlier_multiplier);
                let rows = outlier_indices(&table, &column, k)?;
                Response::Outliers {
                    fences: Fences::new(table.numeric(&column)?, k),
                    rows: table.take(&rows),
                    column,
                }
            }
            Request::Histogram { column, bins } => {
                let column = column.unwrap_or_else(|| cols.magnitude.clone());
                Response::Histogram(histogram(&table, &column, bins.unwrap_or(DEFAULT_BINS))?)
            }
            Request::Scatter { x, y } => {
                let x = x.unwrap_or_else(|| cols.magnitude.clone());
                Response::Scatter(scatter(&table, &x, &y)?)
            }
            Request::Timeline { unit, window } => {
                let buckets = aggregate::bucket_by_time(&table, &cols.timestamp, unit)?;
                let rolling = window
                    .map(|w| aggregate::rolling_average(&buckets.buckets, w))
                    .transpose()?;
                Response::Timeline { buckets, rolling }
            }
            Request::Categories { column, top_n } => {
                let column = column
                    .or_else(|| cols.country.clone())
                    .ok_or_else(|| Error::InvalidParameter("no category column configured".into()))?;
                Response::Categories(aggregate::group_by_category(&table, &column, top_n)?)
            }
            Request::Clusters { eps, min_samples } => {
                let labels = aggregate::cluster(
                    &table,
                    &cols.latitude,
                    &cols.longitude,
                    eps.unwrap_or(cfg.cluster.eps),
                    min_samples.unwrap_or(cfg.cluster.min_samples),
                )?;
                Response::Clusters {
                    sizes: aggregate::cluster_sizes(&labels),
                    labels,
                }
            }
            Request::MapPoints {
                min_magnitude,
                color_by_cluster,
            } => {
                let points = map_points(&table, cfg, min_magnitude, color_by_cluster)?;
                Response::MapPoints {
                    center: map_center(&points),
                    points,
                }
            }
            Request::Regression {
                features,
                target,
                model,
                test_fraction,
                seed,
            } => {
                let features = features.unwrap_or_else(|| cfg.regression.features.clone());
                let features: Vec<&str> = features.iter().map(String::as_str).collect();
                let target = target.unwrap_or_else(|| cfg.regression.target.clone());
                let params = RegressionParams {
                    model: model.unwrap_or(ModelKind::Linear),
                    test_fraction: test_fraction.unwrap_or(cfg.regression.test_fraction),
                    seed: seed.unwrap_or(cfg.regression.seed),
                };
                Response::Regression(regression::fit_and_evaluate(&table, &features, &target, &params)?)
            }
        };
        Ok(response)
    }

    fn apply_filters(&self, table: Table) -> Result<Table> {
        if self.filters.is_empty() {
            return Ok(table);
        }
        let mut state = FilterState::new();
        for (column, raw) in &self.filters {
            let col = table.column(column)?;
            let selected: BTreeSet<Value> = raw
                .iter()
                .map(|v| {
                    selection_value(col.column_type(), v).ok_or_else(|| {
                        Error::InvalidParameter(format!(
                            "'{v}' is not a valid {} value for '{}'",
                            col.column_type(),
                            col.name
                        ))
                    })
                })
                .collect::<Result<_>>()?;
            state.insert(col.name.clone(), selected);
        }
        let keep = filtered_indices(&table, &state)?;
        log::debug!("filters kept {} of {} rows", keep.len(), table.len());
        Ok(table.take(&keep))
    }
}

fn selection_value(column_type: ColumnType, raw: &str) -> Option<Value> {
    match column_type {
        ColumnType::Text => Some(Value::Text(raw.to_string())),
        ColumnType::Numeric => raw.trim().parse().ok().map(Value::Number),
        ColumnType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        ColumnType::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
    }
}

fn map_center(points: &[MapPoint]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let lon = points.iter().map(|p| p.longitude).sum::<f64>() / n;
    Some((lat, lon))
}

fn map_points(
    table: &Table,
    config: &PipelineConfig,
    min_magnitude: Option<f64>,
    color_by_cluster: bool,
) -> Result<Vec<MapPoint>> {
    let cols = &config.columns;
    let rows = match min_magnitude {
        Some(min) => range_indices(table, &cols.magnitude, Some(min), None)?,
        None => (0..table.len()).collect(),
    };
    let clusters = if color_by_cluster {
        Some(aggregate::cluster(
            table,
            &cols.latitude,
            &cols.longitude,
            config.cluster.eps,
            config.cluster.min_samples,
        )?)
    } else {
        None
    };
    let cluster_colors = clusters.as_deref().map(ClusterColors::new);

    let magnitudes = table.numeric(&cols.magnitude)?;
    let (lo, hi) = magnitudes
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| (lo.min(m), hi.max(m)));

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let rec = table.record(row, cols);
            let (latitude, longitude) = (rec.latitude?, rec.longitude?);
            let cluster = clusters.as_ref().map(|labels| labels[row]);
            let color = match (&cluster_colors, cluster) {
                (Some(colors), Some(label)) => colors.color_for(label).to_string(),
                _ => rec
                    .magnitude
                    .map_or_else(|| crate::color::GREY.to_string(), |m| magnitude_color(m, lo, hi)),
            };
            Some(MapPoint {
                latitude,
                longitude,
                magnitude: rec.magnitude,
                depth: rec.depth,
                label: rec.location.or(rec.country),
                color,
                radius: rec.magnitude.map_or(2.0, marker_radius),
                cluster,
            })
        })
        .collect())
}
