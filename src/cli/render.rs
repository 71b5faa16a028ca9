use std::fmt::Write as _;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use quakelens::aggregate::NOISE;
use quakelens::color::ClusterColors;
use quakelens::data::model::Table;
use quakelens::regression::ModelSummary;
use quakelens::session::Response;

/// Aligned text rendering of a response.
pub fn text(response: &Response) -> anyhow::Result<String> {
    let mut out = String::new();
    match response {
        Response::Overview(o) => {
            writeln!(out, "rows: {}", o.rows)?;
            let rows = o
                .schema
                .iter()
                .map(|(name, ty)| {
                    let missing = o.missing.iter().find(|m| &m.column == name);
                    vec![
                        name.clone(),
                        ty.to_string(),
                        missing.map_or_else(String::new, |m| m.missing.to_string()),
                        missing.map_or_else(String::new, |m| format!("{:.1}", m.percent)),
                    ]
                })
                .collect();
            out += &grid(&["column", "type", "missing", "missing %"], rows)?;
            writeln!(out)?;
            let filled: Vec<String> = o.fill.filled.iter().map(|(c, n)| format!("{c}={n}")).collect();
            write!(out, "fill ({}): {}", o.fill.strategy, filled.join(", "))?;
        }
        Response::Summary { columns } => {
            let rows = columns
                .iter()
                .map(|s| {
                    let mut row = vec![s.column.clone(), s.count.to_string()];
                    row.extend(
                        [s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max]
                            .iter()
                            .map(|v| num(*v)),
                    );
                    row
                })
                .collect();
            out += &grid(
                &["column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"],
                rows,
            )?;
        }
        Response::Correlation(matrix) => {
            let mut headers = vec!["column"];
            headers.extend(matrix.columns.iter().map(String::as_str));
            let rows = matrix
                .columns
                .iter()
                .zip(matrix.rows())
                .map(|(name, values)| {
                    let mut row = vec![name.clone()];
                    row.extend(values.iter().map(|v| num(*v)));
                    row
                })
                .collect();
            out += &grid(&headers, rows)?;
        }
        Response::Outliers {
            column,
            fences,
            rows,
        } => {
            match fences {
                Some(f) => writeln!(
                    out,
                    "{column}: q1={} q3={} fences=[{}, {}]",
                    num(f.q1),
                    num(f.q3),
                    num(f.lower),
                    num(f.upper)
                )?,
                None => writeln!(out, "{column}: no values")?,
            }
            writeln!(out, "{} outlier rows", rows.len())?;
            out += &table(rows)?;
        }
        Response::Histogram(h) => {
            let rows = h
                .bins
                .iter()
                .map(|b| vec![num(b.range.start), num(b.range.end), b.count.to_string()])
                .collect();
            out += &grid(&["from", "to", "count"], rows)?;
            if h.excluded > 0 {
                write!(out, "\n{} null values in '{}'", h.excluded, h.column)?;
            }
        }
        Response::Scatter(s) => {
            writeln!(out, "{} pairs, pearson r = {}", s.points.len(), num(s.pearson))?;
            let rows = s.points.iter().map(|(x, y)| vec![num(*x), num(*y)]).collect();
            out += &grid(&[s.x.as_str(), s.y.as_str()], rows)?;
        }
        Response::Timeline { buckets, rolling } => {
            let rows = buckets
                .buckets
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    let avg = rolling
                        .as_ref()
                        .and_then(|r| r[i])
                        .map_or_else(String::new, num);
                    vec![b.key.to_string(), b.count.to_string(), pct(b.percentage), avg]
                })
                .collect();
            out += &grid(&["bucket", "count", "%", "rolling"], rows)?;
            if buckets.excluded > 0 {
                write!(out, "\n{} rows without a timestamp", buckets.excluded)?;
            }
        }
        Response::Categories(c) => {
            let rows = c
                .buckets
                .iter()
                .map(|b| vec![b.key.to_string(), b.count.to_string(), pct(b.percentage)])
                .collect();
            out += &grid(&[c.column.as_str(), "count", "%"], rows)?;
            write!(out, "\n{} distinct, {} null", c.distinct, c.excluded)?;
        }
        Response::Clusters { labels, sizes } => {
            let colors = ClusterColors::new(labels);
            let rows = sizes
                .iter()
                .map(|(label, size)| {
                    vec![
                        cluster_label(*label),
                        size.to_string(),
                        colors.color_for(*label).to_string(),
                    ]
                })
                .collect();
            out += &grid(&["cluster", "events", "color"], rows)?;
        }
        Response::MapPoints { center, points } => {
            if let Some((lat, lon)) = center {
                writeln!(out, "center: {}, {}", num(*lat), num(*lon))?;
            }
            let rows = points
                .iter()
                .map(|p| {
                    vec![
                        num(p.latitude),
                        num(p.longitude),
                        p.magnitude.map_or_else(String::new, num),
                        p.depth.map_or_else(String::new, num),
                        p.label.clone().unwrap_or_default(),
                        p.color.clone(),
                        num(p.radius),
                        p.cluster.map_or_else(String::new, cluster_label),
                    ]
                })
                .collect();
            out += &grid(
                &["lat", "lon", "mag", "depth", "label", "color", "radius", "cluster"],
                rows,
            )?;
        }
        Response::Regression(r) => {
            writeln!(
                out,
                "target: {}  rows: {} (train {}, test {})",
                r.target, r.n_samples, r.n_train, r.n_test
            )?;
            writeln!(out, "r2: {}  mse: {}", num(r.r2), num(r.mse))?;
            let (header, weights) = match &r.model {
                ModelSummary::Linear {
                    intercept,
                    coefficients,
                } => {
                    writeln!(out, "intercept: {}", num(*intercept))?;
                    ("coefficient", coefficients)
                }
                ModelSummary::RandomForest { trees, importances } => {
                    writeln!(out, "trees: {trees}")?;
                    ("importance", importances)
                }
            };
            let rows = weights
                .iter()
                .map(|w| vec![w.feature.clone(), num(w.value)])
                .collect();
            out += &grid(&["feature", header], rows)?;
        }
    }
    Ok(out)
}

fn num(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v:.4}")
    }
}

fn pct(v: f64) -> String {
    format!("{v:.2}")
}

fn cluster_label(label: i32) -> String {
    if label == NOISE {
        "noise".to_string()
    } else {
        label.to_string()
    }
}

fn table(t: &Table) -> anyhow::Result<String> {
    let rows = (0..t.len())
        .map(|i| t.row(i).iter().map(ToString::to_string).collect())
        .collect();
    grid(&t.column_names(), rows)
}

/// Render string cells through arrow's pretty printer.
fn grid(headers: &[&str], rows: Vec<Vec<String>>) -> anyhow::Result<String> {
    if headers.is_empty() {
        return Ok(String::new());
    }
    let columns = headers.iter().enumerate().map(|(i, h)| {
        let cells: Vec<String> = rows.iter().map(|r| r[i].clone()).collect();
        (*h, Arc::new(StringArray::from(cells)) as ArrayRef)
    });
    let batch = RecordBatch::try_from_iter(columns)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}
