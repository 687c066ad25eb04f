//! Diversification summary of a correlation matrix
//!
//! Statistics over the strict lower triangle, the verdict derived from the mean
//! correlation, and a plain-text rendering for terminals.

use crate::correlation::CorrelationMatrix;
use serde::Serialize;
use std::fmt::Write;

/// Mean correlation above which a portfolio is poorly diversified
pub const HIGH_CORRELATION: f64 = 0.7;
/// Mean correlation below which a portfolio is well diversified
pub const LOW_CORRELATION: f64 = 0.3;

const MAX_LABEL_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Defined pairs the statistics are based on
    pub pairs: usize,
}

impl CorrelationStats {
    /// Statistics over the finite lower-triangle values. `None` when there are none.
    pub fn from_matrix(matrix: &CorrelationMatrix) -> Option<Self> {
        let values: Vec<f64> = matrix
            .lower_triangle()
            .into_iter()
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return None;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            mean,
            min,
            max,
            pairs: values.len(),
        })
    }

    /// Colour scale bounds for heatmaps: 20% padding, clamped to [-1, 1].
    pub fn color_range(&self) -> (f64, f64) {
        let vmin = (self.min - 0.2 * self.min.abs()).max(-1.0);
        let vmax = (self.max + 0.2 * self.max.abs()).min(1.0);
        (vmin, vmax)
    }

    pub fn diversification(&self) -> Diversification {
        Diversification::from_mean(self.mean)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Diversification {
    Poor,
    Moderate,
    Good,
}

impl Diversification {
    pub fn from_mean(mean: f64) -> Self {
        if mean > HIGH_CORRELATION {
            Self::Poor
        } else if mean < LOW_CORRELATION {
            Self::Good
        } else {
            Self::Moderate
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Poor => "High average correlation (>0.7) indicates poor diversification.",
            Self::Moderate => "Moderate average correlation indicates acceptable diversification.",
            Self::Good => "Low average correlation (<0.3) indicates good diversification.",
        }
    }
}

/// Truncate long display names to 20 characters plus "...".
pub fn shorten_label(label: &str) -> String {
    if label.chars().count() > MAX_LABEL_CHARS {
        let head: String = label.chars().take(MAX_LABEL_CHARS).collect();
        format!("{}...", head)
    } else {
        label.to_string()
    }
}

/// Render the matrix as an aligned text table, two decimals, NaN as "-".
pub fn format_matrix(matrix: &CorrelationMatrix) -> String {
    let labels: Vec<String> = matrix.labels.iter().map(|l| shorten_label(l)).collect();
    let width = labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(5);

    let mut out = String::new();
    let _ = write!(out, "{:width$}", "", width = width);
    for label in &labels {
        let _ = write!(out, " {:>width$}", label, width = width);
    }
    out.push('\n');

    for (label, row) in labels.iter().zip(&matrix.matrix) {
        let _ = write!(out, "{:width$}", label, width = width);
        for value in row {
            if value.is_nan() {
                let _ = write!(out, " {:>width$}", "-", width = width);
            } else {
                let _ = write!(out, " {:>width$.2}", value, width = width);
            }
        }
        out.push('\n');
    }

    out
}
