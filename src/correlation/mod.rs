//! Correlation Matrix
//!
//! Pairwise Pearson correlation of log-return series. Each pair uses only the
//! days on which both series have a return (pairwise complete), so rows can
//! differ between pairs when the alignment left gaps.

use crate::returns::ReturnSeries;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

// ============================================================================
// Data Types
// ============================================================================

/// Correlation between two symbols
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPair {
    pub symbol1: String,
    pub name1: String,
    pub symbol2: String,
    pub name2: String,
    /// NaN when undefined (zero variance or fewer than two shared days)
    pub correlation: f64,
    /// Number of shared return days
    pub observations: usize,
}

/// Full correlation matrix result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationMatrix {
    /// Row/column order
    pub symbols: Vec<String>,
    /// Axis labels; display names, falling back to the symbol. May repeat.
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    /// Shared return days per cell; the diagonal holds each series' own length
    pub observations: Vec<Vec<usize>>,
    /// Off-diagonal pairs, most correlated first, undefined ones last
    pub pairs: Vec<CorrelationPair>,
}

impl CorrelationMatrix {
    pub fn empty() -> Self {
        Self {
            symbols: vec![],
            labels: vec![],
            matrix: vec![],
            observations: vec![],
            pairs: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.matrix.get(i).and_then(|row| row.get(j)).copied()
    }

    /// Correlation by symbol
    pub fn between(&self, symbol1: &str, symbol2: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == symbol1)?;
        let j = self.symbols.iter().position(|s| s == symbol2)?;
        self.get(i, j)
    }

    /// Strict lower triangle (no diagonal), row by row
    pub fn lower_triangle(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.len() * self.len().saturating_sub(1) / 2);
        for (i, row) in self.matrix.iter().enumerate() {
            values.extend(row.iter().take(i).copied());
        }
        values
    }
}

// ============================================================================
// Implementation
// ============================================================================

/// Pearson correlation over the days both series share.
///
/// Returns `(correlation, shared_days)`; the correlation is NaN with fewer than
/// two shared days or when either side has zero variance.
pub fn pairwise_correlation(a: &ReturnSeries, b: &ReturnSeries) -> (f64, usize) {
    let (returns1, returns2): (Vec<f64>, Vec<f64>) = a
        .iter()
        .filter_map(|(date, r1)| b.get(date).map(|r2| (*r1, *r2)))
        .unzip();

    (calculate_correlation(&returns1, &returns2), returns1.len())
}

/// Calculate correlation between two aligned return series
fn calculate_correlation(returns1: &[f64], returns2: &[f64]) -> f64 {
    if returns1.len() != returns2.len() || returns1.len() < 2 {
        return f64::NAN;
    }

    let n = returns1.len() as f64;
    let mean1 = returns1.iter().sum::<f64>() / n;
    let mean2 = returns2.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var1 = 0.0;
    let mut var2 = 0.0;

    for (r1, r2) in returns1.iter().zip(returns2) {
        let d1 = r1 - mean1;
        let d2 = r2 - mean2;
        cov += d1 * d2;
        var1 += d1 * d1;
        var2 += d2 * d2;
    }

    if !is_flat(var1, n, mean1) && !is_flat(var2, n, mean2) {
        (cov / (var1.sqrt() * var2.sqrt())).clamp(-1.0, 1.0)
    } else {
        f64::NAN
    }
}

/// True when the spread of a series is within rounding noise. Log-returns carry
/// an absolute error of a few ulps of the price ratio, so a steadily compounding
/// price leaves a tiny non-zero sum of squares that must still count as flat.
fn is_flat(sum_sq: f64, n: f64, mean: f64) -> bool {
    let tolerance = 64.0 * f64::EPSILON * (1.0 + mean.abs());
    sum_sq / n <= tolerance * tolerance
}

/// Compute full correlation matrix, labelled with display names.
pub fn correlate(
    returns: &IndexMap<String, ReturnSeries>,
    symbol_to_name: &HashMap<String, String>,
) -> CorrelationMatrix {
    if returns.is_empty() {
        return CorrelationMatrix::empty();
    }

    let symbols: Vec<String> = returns.keys().cloned().collect();
    let labels: Vec<String> = symbols
        .iter()
        .map(|s| symbol_to_name.get(s).cloned().unwrap_or_else(|| s.clone()))
        .collect();
    let series: Vec<&ReturnSeries> = returns.values().collect();

    let n = symbols.len();
    let mut matrix = vec![vec![f64::NAN; n]; n];
    let mut observations = vec![vec![0usize; n]; n];
    let mut pairs: Vec<CorrelationPair> = Vec::with_capacity(n * n.saturating_sub(1) / 2);

    for i in 0..n {
        // By definition, independent of the series' variance
        matrix[i][i] = 1.0;
        observations[i][i] = series[i].len();

        for j in (i + 1)..n {
            let (corr, shared) = pairwise_correlation(series[i], series[j]);
            if corr.is_nan() {
                log::debug!(
                    "Correlation {} / {} undefined ({} shared days)",
                    symbols[i],
                    symbols[j],
                    shared
                );
            }

            matrix[i][j] = corr;
            matrix[j][i] = corr;
            observations[i][j] = shared;
            observations[j][i] = shared;

            pairs.push(CorrelationPair {
                symbol1: symbols[i].clone(),
                name1: labels[i].clone(),
                symbol2: symbols[j].clone(),
                name2: labels[j].clone(),
                correlation: corr,
                observations: shared,
            });
        }
    }

    // Sort pairs by absolute correlation (most correlated first, NaN last)
    pairs.sort_by(|a, b| match (a.correlation.is_nan(), b.correlation.is_nan()) {
        (false, false) => b.correlation.abs().total_cmp(&a.correlation.abs()),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });

    CorrelationMatrix {
        symbols,
        labels,
        matrix,
        observations,
        pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn returns(start: u32, values: &[f64]) -> ReturnSeries {
        values
            .iter()
            .enumerate()
            .map(|(i, r)| (NaiveDate::from_ymd_opt(2024, 1, start + i as u32).unwrap(), *r))
            .collect()
    }

    fn input(entries: Vec<(&str, ReturnSeries)>) -> IndexMap<String, ReturnSeries> {
        entries
            .into_iter()
            .map(|(s, r)| (s.to_string(), r))
            .collect()
    }

    #[test]
    fn test_identical_series_fully_correlated() {
        let r = returns(3, &[1.05_f64.ln(), (100.0_f64 / 105.0).ln(), 1.05_f64.ln()]);
        let matrix = correlate(&input(vec![("A", r.clone()), ("B", r)]), &HashMap::new());

        assert_eq!(matrix.len(), 2);
        assert!((matrix.get(0, 1).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(matrix.get(0, 0), Some(1.0));
        assert_eq!(matrix.observations[0][1], 3);
    }

    #[test]
    fn test_anti_correlated() {
        let a = returns(3, &[0.01, -0.02, 0.03, -0.01]);
        let b = returns(3, &[-0.01, 0.02, -0.03, 0.01]);
        let matrix = correlate(&input(vec![("A", a), ("B", b)]), &HashMap::new());
        assert!((matrix.between("A", "B").unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_value() {
        // x = [1, 2, 3], y = [1, 3, 2] -> r = 0.5
        let a = returns(3, &[1.0, 2.0, 3.0]);
        let b = returns(3, &[1.0, 3.0, 2.0]);
        let (corr, shared) = pairwise_correlation(&a, &b);
        assert!((corr - 0.5).abs() < 1e-12);
        assert_eq!(shared, 3);
    }

    #[test]
    fn test_zero_variance_is_nan_not_panic() {
        let constant = returns(3, &[0.0, 0.0, 0.0]);
        let varying = returns(3, &[0.01, -0.02, 0.03]);
        let matrix = correlate(
            &input(vec![("CONST", constant), ("VAR", varying)]),
            &HashMap::new(),
        );

        assert_eq!(matrix.get(0, 0), Some(1.0));
        assert_eq!(matrix.get(1, 1), Some(1.0));
        assert!(matrix.get(0, 1).unwrap().is_nan());
        assert!(matrix.get(1, 0).unwrap().is_nan());
    }

    #[test]
    fn test_constant_growth_is_zero_variance() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut price = 100.0_f64;
        let mut prices = Vec::new();
        for _ in 0..60 {
            prices.push(price);
            price *= 1.01;
        }
        let steady: ReturnSeries = prices
            .windows(2)
            .enumerate()
            .map(|(i, w)| (start + chrono::Duration::days(i as i64 + 1), (w[1] / w[0]).ln()))
            .collect();
        let varying: ReturnSeries = (1..60)
            .map(|i| (start + chrono::Duration::days(i), 0.01 * ((i % 5) as f64 - 2.0)))
            .collect();

        let (corr, shared) = pairwise_correlation(&steady, &varying);
        assert_eq!(shared, 59);
        assert!(corr.is_nan(), "got {}", corr);
    }

    #[test]
    fn test_pairwise_complete_overlap() {
        let a = returns(3, &[0.01, 0.02, -0.01, 0.03, 0.00]);
        let b = returns(3, &[0.02, 0.04, -0.02, 0.06, 0.00]);
        let c = returns(20, &[0.01, 0.02, 0.03]);
        let matrix = correlate(&input(vec![("A", a), ("B", b), ("C", c)]), &HashMap::new());

        assert_eq!(matrix.len(), 3);
        assert!(matrix.matrix.iter().all(|row| row.len() == 3));
        assert!((matrix.between("A", "B").unwrap() - 1.0).abs() < 1e-12);
        assert!(matrix.between("A", "C").unwrap().is_nan());
        assert_eq!(matrix.observations[0][2], 0);

        // NaN pairs sort last
        assert_eq!(matrix.pairs.len(), 3);
        assert_eq!(matrix.pairs[0].symbol2, "B");
        assert!(matrix.pairs[1].correlation.is_nan());
        assert!(matrix.pairs[2].correlation.is_nan());
    }

    #[test]
    fn test_labels_fall_back_and_may_collide() {
        let a = returns(3, &[0.01, 0.02, -0.01]);
        let b = returns(3, &[0.02, 0.01, -0.02]);
        let c = returns(3, &[0.03, -0.01, 0.00]);
        let names: HashMap<String, String> = [
            ("A".to_string(), "World ETF".to_string()),
            ("B".to_string(), "World ETF".to_string()),
        ]
        .into_iter()
        .collect();

        let matrix = correlate(&input(vec![("A", a), ("B", b), ("C", c)]), &names);
        assert_eq!(matrix.labels, ["World ETF", "World ETF", "C"]);
        assert_eq!(matrix.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        let matrix = correlate(&IndexMap::new(), &HashMap::new());
        assert!(matrix.is_empty());
        assert!(matrix.lower_triangle().is_empty());
    }

    #[test]
    fn test_lower_triangle_order() {
        let matrix = CorrelationMatrix {
            symbols: vec!["A".into(), "B".into(), "C".into()],
            labels: vec!["A".into(), "B".into(), "C".into()],
            matrix: vec![
                vec![1.0, 0.1, 0.2],
                vec![0.1, 1.0, 0.3],
                vec![0.2, 0.3, 1.0],
            ],
            observations: vec![vec![0; 3]; 3],
            pairs: vec![],
        };
        assert_eq!(matrix.lower_triangle(), vec![0.1, 0.2, 0.3]);
    }
}
