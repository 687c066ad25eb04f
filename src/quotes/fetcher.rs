//! Market data fetcher
//!
//! Turns one batched provider call into a per-symbol price series mapping with
//! the same shape whether one or many symbols were requested.

use super::{PriceBar, PriceSeries, QuoteProvider};
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Result of [`fetch_prices`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceFetch {
    /// Requested symbols in request order. Symbols the provider had nothing for
    /// are present with an empty series, unless the whole request came back empty.
    pub series: IndexMap<String, PriceSeries>,
    /// Requested symbols without any price in range
    pub missing: Vec<String>,
}

impl PriceFetch {
    /// True when no symbol has a single price.
    pub fn is_empty(&self) -> bool {
        self.series.values().all(|s| s.is_empty())
    }

    /// True when some but not all symbols came back without data.
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty() && !self.is_empty()
    }
}

/// Fetch daily prices for `symbols` over `[start, end]` with a single provider
/// request. Provider failures yield an empty mapping, never an error.
pub async fn fetch_prices<P: QuoteProvider>(
    provider: &P,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> PriceFetch {
    let mut requested: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if !symbol.trim().is_empty() && !requested.contains(symbol) {
            requested.push(symbol.clone());
        }
    }

    if requested.is_empty() {
        return PriceFetch::default();
    }
    if start > end {
        log::warn!("Empty date range {} > {}, nothing to fetch", start, end);
        return empty_fetch(requested);
    }

    let mut raw = match provider.fetch_history(&requested, start, end).await {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!(
                "{} history request for {} symbols failed: {}",
                provider.name(),
                requested.len(),
                e
            );
            return empty_fetch(requested);
        }
    };

    let mut fetch = PriceFetch::default();
    for symbol in requested {
        let bars = take_bars(&mut raw, &symbol).unwrap_or_default();
        let series = to_series(&bars, start, end);
        if series.is_empty() {
            log::warn!("No prices for {} between {} and {}", symbol, start, end);
            fetch.missing.push(symbol.clone());
        }
        fetch.series.insert(symbol, series);
    }

    if fetch.is_empty() {
        log::warn!("{} returned no prices at all", provider.name());
        return empty_fetch(fetch.missing);
    }

    log::info!(
        "Fetched prices for {} symbols ({} without data)",
        fetch.series.len(),
        fetch.missing.len()
    );
    fetch
}

fn empty_fetch(missing: Vec<String>) -> PriceFetch {
    PriceFetch {
        series: IndexMap::new(),
        missing,
    }
}

/// Providers may echo symbols in a different case.
fn take_bars(raw: &mut HashMap<String, Vec<PriceBar>>, symbol: &str) -> Option<Vec<PriceBar>> {
    if let Some(bars) = raw.remove(symbol) {
        return Some(bars);
    }
    let key = raw
        .keys()
        .find(|k| k.eq_ignore_ascii_case(symbol))
        .cloned()?;
    raw.remove(&key)
}

/// Preferred price per day inside the range. The last bar wins on duplicate days.
fn to_series(bars: &[PriceBar], start: NaiveDate, end: NaiveDate) -> PriceSeries {
    bars.iter()
        .filter(|bar| bar.date >= start && bar.date <= end)
        .filter_map(|bar| bar.preferred_price().map(|price| (bar.date, price)))
        .collect()
}
