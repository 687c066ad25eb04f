//! Quote Provider Framework
//!
//! The rest of the crate depends only on the [`QuoteProvider`] capability:
//! identifier search and batched daily history. Yahoo Finance is the bundled
//! implementation.

pub mod fetcher;
pub mod yahoo;

pub use fetcher::{fetch_prices, PriceFetch};
pub use yahoo::YahooProvider;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Daily price series of one symbol, keyed by business day.
pub type PriceSeries = BTreeMap<NaiveDate, f64>;

/// One hit of a provider search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub symbol: String,
    pub short_name: Option<String>,
}

/// Einzelner Kursdatenpunkt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: Option<f64>,
    /// Split/dividend adjusted close
    pub adj_close: Option<f64>,
}

impl PriceBar {
    /// Adjusted close when usable, raw close otherwise.
    pub fn preferred_price(&self) -> Option<f64> {
        self.adj_close
            .filter(|p| p.is_finite())
            .or_else(|| self.close.filter(|p| p.is_finite()))
    }
}

/// External market-data capability.
///
/// Errors are transport-level failures; callers in this crate recover from
/// them and never propagate them.
#[allow(async_fn_in_trait)]
pub trait QuoteProvider {
    /// Provider name for diagnostics
    fn name(&self) -> &str;

    /// Search by identifier (ISIN, ticker or free text), best match first.
    async fn search(&self, query: &str) -> Result<Vec<SearchMatch>>;

    /// Daily bars for all `symbols` in `[from, to]`, in a single request.
    /// Symbols without data may be missing from the result.
    async fn fetch_history(
        &self,
        symbols: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<String, Vec<PriceBar>>>;
}

impl<P: QuoteProvider> QuoteProvider for &P {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchMatch>> {
        (**self).search(query).await
    }

    async fn fetch_history(
        &self,
        symbols: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<String, Vec<PriceBar>>> {
        (**self).fetch_history(symbols, from, to).await
    }
}
