use std::collections::BTreeMap;

use crate::data::model::Table;
use crate::error::{Error, Result};

/// Label for points that belong to no cluster.
pub const NOISE: i32 = -1;

/// DBSCAN over standardized `(lat, lon)` pairs, one label per table row.
///
/// Coordinates are z-scored (population standard deviation; a constant
/// axis is left unscaled) before Euclidean distances are taken. A point
/// is a neighbour of another when their distance is at most `eps`, and
/// every point counts toward its own `min_samples`. Clusters are numbered
/// from 0 in the order their first core point appears; rows with a null
/// coordinate, like border-less sparse points, are [`NOISE`].
///
/// Output depends only on the input order and parameters.
///
/// Every point's neighbour list is materialized up front, so time and
/// memory are quadratic in the row count once `eps` covers most points.
pub fn cluster(table: &Table, lat: &str, lon: &str, eps: f64, min_samples: usize) -> Result<Vec<i32>> {
    if !(eps.is_finite() && eps > 0.0) {
        return Err(Error::InvalidParameter(format!("eps must be positive, got {eps}")));
    }
    if min_samples < 1 {
        return Err(Error::InvalidParameter("min_samples must be at least 1".into()));
    }
    let lats = table.numeric(lat)?;
    let lons = table.numeric(lon)?;

    let (rows, points): (Vec<usize>, Vec<[f64; 2]>) = lats
        .iter()
        .zip(lons)
        .enumerate()
        .filter_map(|(i, (la, lo))| Some((i, [(*la)?, (*lo)?])))
        .unzip();
    if points.is_empty() {
        return Err(Error::InsufficientData(
            "no rows with both coordinates to cluster".into(),
        ));
    }

    let scaled = standardize(&points);
    let point_labels = dbscan(&scaled, eps, min_samples);

    let mut labels = vec![NOISE; table.len()];
    for (row, label) in rows.into_iter().zip(point_labels) {
        labels[row] = label;
    }
    log::debug!(
        "cluster: {} points, {} clusters",
        points.len(),
        labels.iter().copied().max().map_or(0, |m| m + 1)
    );
    Ok(labels)
}

/// Row count per label, noise included, ascending by label.
pub fn cluster_sizes(labels: &[i32]) -> Vec<(i32, usize)> {
    let mut sizes: BTreeMap<i32, usize> = BTreeMap::new();
    for &label in labels {
        *sizes.entry(label).or_default() += 1;
    }
    sizes.into_iter().collect()
}

fn standardize(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let n = points.len() as f64;
    let mut mean = [0.0; 2];
    let mut scale = [0.0; 2];
    for axis in 0..2 {
        mean[axis] = points.iter().map(|p| p[axis]).sum::<f64>() / n;
        let var = points.iter().map(|p| (p[axis] - mean[axis]).powi(2)).sum::<f64>() / n;
        scale[axis] = if var > 0.0 { var.sqrt() } else { 1.0 };
    }
    points
        .iter()
        .map(|p| [(p[0] - mean[0]) / scale[0], (p[1] - mean[1]) / scale[1]])
        .collect()
}

/// O(n²) distance pass; the neighbour lists hold up to n² indices.
fn dbscan(points: &[[f64; 2]], eps: f64, min_samples: usize) -> Vec<i32> {
    let eps2 = eps * eps;
    let neighbours: Vec<Vec<usize>> = points
        .iter()
        .map(|p| {
            points
                .iter()
                .enumerate()
                .filter(|(_, q)| (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2) <= eps2)
                .map(|(j, _)| j)
                .collect()
        })
        .collect();
    let core: Vec<bool> = neighbours.iter().map(|n| n.len() >= min_samples).collect();

    let mut labels = vec![NOISE; points.len()];
    let mut next_label = 0;
    let mut stack = Vec::new();
    for start in 0..points.len() {
        if labels[start] != NOISE || !core[start] {
            continue;
        }
        stack.push(start);
        while let Some(i) = stack.pop() {
            if labels[i] != NOISE {
                continue;
            }
            labels[i] = next_label;
            if core[i] {
                stack.extend(neighbours[i].iter().copied().filter(|&j| labels[j] == NOISE));
            }
        }
        next_label += 1;
    }
    labels
}
