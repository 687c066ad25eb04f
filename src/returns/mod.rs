//! Return series builder
//!
//! Cleans raw price series, aligns them on a shared calendar and converts them
//! into daily log-returns:
//!
//! 1. symbols without any usable price are dropped (and reported)
//! 2. the calendar is the union of days on which at least one symbol has a price
//! 3. the window runs from the latest first price to the earliest last price, so
//!    every symbol is listed throughout; if that span holds fewer than two
//!    calendar days the whole calendar is used instead, and the result is flagged
//! 4. `r[t] = ln(p[t] / p[t-1])`, emitted only where both prices exist, which
//!    also skips the rows around a single symbol's holidays inside the window
//! 5. per-symbol observation counts are reported, no threshold is applied

use crate::quotes::PriceSeries;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Daily log-returns of one symbol, keyed by the later day of each pair.
pub type ReturnSeries = BTreeMap<NaiveDate, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The provider returned no prices at all
    EmptySeries,
    /// Prices were returned but none was finite and positive
    NoValidPrices,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedSymbol {
    pub symbol: String,
    pub reason: DropReason,
}

/// Which window the returns were computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Every symbol is listed from the first to the last day of the window;
    /// isolated missing days (holidays) are left out of the affected returns
    CommonPeriod,
    /// No common period exists; the union calendar was used and correlations
    /// are pairwise complete only
    UnionWithGaps,
    /// Nothing to align
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSet {
    /// Surviving symbols in input order
    pub series: IndexMap<String, ReturnSeries>,
    /// Valid return observations per surviving symbol
    pub observations: IndexMap<String, usize>,
    pub dropped: Vec<DroppedSymbol>,
    pub alignment: Alignment,
    /// First and last calendar day of the window
    pub window: Option<(NaiveDate, NaiveDate)>,
}

impl ReturnSet {
    fn empty(dropped: Vec<DroppedSymbol>) -> Self {
        Self {
            series: IndexMap::new(),
            observations: IndexMap::new(),
            dropped,
            alignment: Alignment::Empty,
            window: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// True when the gap-tolerant fallback window was used.
    pub fn is_degraded(&self) -> bool {
        self.alignment == Alignment::UnionWithGaps
    }
}

pub fn build_returns(raw: &IndexMap<String, PriceSeries>) -> ReturnSet {
    let mut dropped = Vec::new();
    let mut kept: Vec<(String, PriceSeries)> = Vec::with_capacity(raw.len());

    for (symbol, series) in raw {
        if series.is_empty() {
            log::warn!("Dropping {}: no price data", symbol);
            dropped.push(DroppedSymbol {
                symbol: symbol.clone(),
                reason: DropReason::EmptySeries,
            });
            continue;
        }

        let valid: PriceSeries = series
            .iter()
            .filter(|(_, price)| price.is_finite() && **price > 0.0)
            .map(|(date, price)| (*date, *price))
            .collect();
        if valid.is_empty() {
            log::warn!("Dropping {}: no valid prices", symbol);
            dropped.push(DroppedSymbol {
                symbol: symbol.clone(),
                reason: DropReason::NoValidPrices,
            });
            continue;
        }

        kept.push((symbol.clone(), valid));
    }

    if kept.is_empty() {
        return ReturnSet::empty(dropped);
    }

    // Days on which no symbol traded never make it into the calendar
    let calendar: Vec<NaiveDate> = kept
        .iter()
        .flat_map(|(_, series)| series.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let (alignment, first, last) = match common_span(&kept, &calendar) {
        Some((first, last)) => (Alignment::CommonPeriod, first, last),
        None => {
            log::warn!(
                "No common trading period for {} symbols, using {} days with gaps",
                kept.len(),
                calendar.len()
            );
            (Alignment::UnionWithGaps, 0, calendar.len() - 1)
        }
    };

    let mut series = IndexMap::with_capacity(kept.len());
    let mut observations = IndexMap::with_capacity(kept.len());

    for (symbol, prices) in kept {
        let mut returns = ReturnSeries::new();
        for t in (first + 1)..=last {
            let prev = prices.get(&calendar[t - 1]);
            let curr = prices.get(&calendar[t]);
            if let (Some(prev), Some(curr)) = (prev, curr) {
                returns.insert(calendar[t], (curr / prev).ln());
            }
        }

        log::debug!("{}: {} return observations", symbol, returns.len());
        observations.insert(symbol.clone(), returns.len());
        series.insert(symbol, returns);
    }

    ReturnSet {
        series,
        observations,
        dropped,
        alignment,
        window: Some((calendar[first], calendar[last])),
    }
}

/// Calendar index bounds of the span on which every symbol is listed, i.e. from
/// the latest first price to the earliest last price. `None` below two days.
fn common_span(kept: &[(String, PriceSeries)], calendar: &[NaiveDate]) -> Option<(usize, usize)> {
    let start = kept
        .iter()
        .filter_map(|(_, series)| series.keys().next())
        .max()?;
    let end = kept
        .iter()
        .filter_map(|(_, series)| series.keys().next_back())
        .min()?;
    if start >= end {
        return None;
    }

    let first = calendar.binary_search(start).ok()?;
    let last = calendar.binary_search(end).ok()?;
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    /// One price per consecutive day from `start`
    fn series(start: u32, prices: &[f64]) -> PriceSeries {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| (day(start + i as u32), *p))
            .collect()
    }

    fn raw(entries: Vec<(&str, PriceSeries)>) -> IndexMap<String, PriceSeries> {
        entries
            .into_iter()
            .map(|(s, p)| (s.to_string(), p))
            .collect()
    }

    #[test]
    fn test_log_returns() {
        let prices = [100.0, 105.0, 100.0, 105.0];
        let set = build_returns(&raw(vec![("A", series(2, &prices)), ("B", series(2, &prices))]));

        assert_eq!(set.alignment, Alignment::CommonPeriod);
        assert_eq!(set.window, Some((day(2), day(5))));

        let expected = [1.05_f64.ln(), (100.0_f64 / 105.0).ln(), 1.05_f64.ln()];
        let a: Vec<f64> = set.series["A"].values().copied().collect();
        assert_eq!(a.len(), 3);
        for (got, want) in a.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-12, "got {}, want {}", got, want);
        }
        assert_eq!(set.series["A"], set.series["B"]);
        assert_eq!(set.observations["A"], 3);
    }

    #[test]
    fn test_empty_and_invalid_series_dropped() {
        let set = build_returns(&raw(vec![
            ("A", series(2, &[10.0, 11.0, 12.0])),
            ("EMPTY", PriceSeries::new()),
            ("ZERO", series(2, &[0.0, -1.0, f64::NAN])),
        ]));

        assert_eq!(set.series.len(), 1);
        assert_eq!(
            set.dropped,
            vec![
                DroppedSymbol { symbol: "EMPTY".to_string(), reason: DropReason::EmptySeries },
                DroppedSymbol { symbol: "ZERO".to_string(), reason: DropReason::NoValidPrices },
            ]
        );
    }

    #[test]
    fn test_all_empty_is_empty_set() {
        let set = build_returns(&raw(vec![("A", PriceSeries::new())]));
        assert!(set.is_empty());
        assert_eq!(set.alignment, Alignment::Empty);
        assert_eq!(set.window, None);
        assert_eq!(set.dropped.len(), 1);

        let none = build_returns(&IndexMap::new());
        assert!(none.is_empty());
        assert!(none.dropped.is_empty());
    }

    #[test]
    fn test_common_period_spans_shared_listing() {
        // A trades 2..=11; B misses the 5th; C only starts on the 3rd
        let a = series(2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let mut b = a.clone();
        b.remove(&day(5));
        let c = series(3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);

        let set = build_returns(&raw(vec![("A", a), ("B", b), ("C", c)]));

        assert_eq!(set.alignment, Alignment::CommonPeriod);
        assert_eq!(set.window, Some((day(3), day(11))));
        assert_eq!(set.observations["A"], 8);
        assert_eq!(set.observations["C"], 8);
        // The returns into and out of the 5th are missing for B
        assert_eq!(set.observations["B"], 6);
        assert!(!set.series["B"].contains_key(&day(5)));
        assert!(!set.series["B"].contains_key(&day(6)));
        assert!(!set.is_degraded());
    }

    #[test]
    fn test_holidays_keep_the_full_common_period() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let a: PriceSeries = (0..100)
            .map(|i| (start + chrono::Duration::days(i), 100.0 + (i % 7) as f64))
            .collect();
        let mut b = a.clone();
        b.remove(&(start + chrono::Duration::days(40)));
        b.remove(&(start + chrono::Duration::days(80)));

        let set = build_returns(&raw(vec![("A", a), ("B", b)]));

        assert_eq!(set.alignment, Alignment::CommonPeriod);
        assert_eq!(set.window, Some((start, start + chrono::Duration::days(99))));
        assert_eq!(set.observations["A"], 99);
        assert_eq!(set.observations["B"], 95);
    }

    #[test]
    fn test_disjoint_history_falls_back_to_union() {
        let a = series(2, &[10.0, 11.0, 12.0, 13.0]);
        let b = series(2, &[20.0, 21.0, 23.0, 22.0]);
        let c = series(10, &[5.0, 6.0, 5.5, 6.5]);

        let set = build_returns(&raw(vec![("A", a), ("B", b), ("C", c)]));

        assert_eq!(set.alignment, Alignment::UnionWithGaps);
        assert!(set.is_degraded());
        assert_eq!(set.window, Some((day(2), day(13))));
        assert_eq!(set.series.len(), 3);
        assert_eq!(set.observations["A"], 3);
        assert_eq!(set.observations["B"], 3);
        assert_eq!(set.observations["C"], 3);
        // No return spans the gap between the two listing histories
        assert!(!set.series["C"].contains_key(&day(10)));
    }

    #[test]
    fn test_single_day_overlap_is_not_a_common_period() {
        let a = series(2, &[10.0, 11.0, 12.0]);
        let b = series(4, &[20.0, 21.0, 22.0]);

        let set = build_returns(&raw(vec![("A", a), ("B", b)]));
        assert_eq!(set.alignment, Alignment::UnionWithGaps);
        assert_eq!(set.observations["A"], 2);
        assert_eq!(set.observations["B"], 2);
    }

    #[test]
    fn test_single_symbol() {
        let set = build_returns(&raw(vec![("A", series(2, &[10.0, 11.0]))]));
        assert_eq!(set.alignment, Alignment::CommonPeriod);
        assert_eq!(set.observations["A"], 1);
    }

    #[test]
    fn test_common_span_bounds() {
        let a = series(2, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = series(4, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let kept = vec![("A".to_string(), a), ("B".to_string(), b)];
        let calendar: Vec<NaiveDate> = (2..=8).map(day).collect();

        assert_eq!(common_span(&kept, &calendar), Some((2, 4)));
        assert_eq!(common_span(&kept[..1], &calendar), Some((0, 4)));
        assert_eq!(common_span(&[], &calendar), None);
    }
}
