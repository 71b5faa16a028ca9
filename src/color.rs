use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};

use crate::aggregate::NOISE;

/// Colour used for noise points and unknown labels.
pub const GREY: &str = "#808080";

fn hsl_hex(hue: f32, saturation: f32, lightness: f32) -> String {
    let rgb: Srgb = Hsl::new(hue, saturation, lightness).into_color();
    format!(
        "#{:02x}{:02x}{:02x}",
        (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| hsl_hex((i as f32 / n as f32) * 360.0, 0.75, 0.55))
        .collect()
}

/// Green at `min` through yellow to red at `max`.
pub fn magnitude_color(magnitude: f64, min: f64, max: f64) -> String {
    let t = if max > min {
        ((magnitude - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    hsl_hex(120.0 * (1.0 - t as f32), 0.85, 0.5)
}

/// Marker radius in pixels for a magnitude.
pub fn marker_radius(magnitude: f64) -> f64 {
    (magnitude * 1.5).max(2.0)
}

// ---------------------------------------------------------------------------
// Color mapping: cluster label → colour
// ---------------------------------------------------------------------------

/// Maps cluster labels to distinct colours; noise is grey.
#[derive(Debug, Clone)]
pub struct ClusterColors {
    mapping: BTreeMap<i32, String>,
}

impl ClusterColors {
    pub fn new(labels: &[i32]) -> Self {
        let clusters: Vec<i32> = labels
            .iter()
            .copied()
            .filter(|&l| l != NOISE)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let palette = generate_palette(clusters.len());
        Self {
            mapping: clusters.into_iter().zip(palette).collect(),
        }
    }

    pub fn color_for(&self, label: i32) -> &str {
        self.mapping.get(&label).map_or(GREY, String::as_str)
    }

    /// Legend entries (label → colour), noise excluded.
    pub fn legend_entries(&self) -> Vec<(i32, &str)> {
        self.mapping.iter().map(|(l, c)| (*l, c.as_str())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_distinct_entries() {
        let p = generate_palette(4);
        assert_eq!(p.len(), 4);
        let unique: std::collections::HashSet<_> = p.iter().collect();
        assert_eq!(unique.len(), 4);
        assert!(generate_palette(0).is_empty());
    }

    fn channels(hex: &str) -> [u8; 3] {
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap();
        [byte(1), byte(3), byte(5)]
    }

    #[test]
    fn magnitude_ramp_endpoints() {
        let [r, g, b] = channels(&magnitude_color(6.5, 6.5, 9.0));
        assert!(g > 200 && r < 40 && b < 40);
        let [r, g, b] = channels(&magnitude_color(9.0, 6.5, 9.0));
        assert!(r > 200 && g < 40 && b < 40);
        assert_eq!(magnitude_color(12.0, 6.5, 9.0), magnitude_color(9.0, 6.5, 9.0));
    }

    #[test]
    fn radius_has_floor() {
        assert_eq!(marker_radius(0.5), 2.0);
        assert_eq!(marker_radius(7.0), 10.5);
    }

    #[test]
    fn noise_is_grey() {
        let colors = ClusterColors::new(&[0, 1, NOISE, 1]);
        assert_eq!(colors.color_for(NOISE), GREY);
        assert_ne!(colors.color_for(0), colors.color_for(1));
        assert_eq!(colors.legend_entries().len(), 2);
    }
}
