//! End-to-end correlation pipeline
//!
//! identifiers → symbols and names → one batched price request → aligned
//! log-returns → correlation matrix, with every loss along the way reported.

use crate::correlation::{correlate, CorrelationMatrix};
use crate::error::StoreError;
use crate::identifiers::{IdentifierStore, Resolution, SymbolResolver};
use crate::quotes::{fetch_prices, QuoteProvider};
use crate::returns::{build_returns, Alignment, DroppedSymbol};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

/// How far the matrix can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// No matrix could be computed
    NoData,
    /// A matrix exists but instruments were lost, gaps were tolerated, or fewer
    /// than two series survived
    Partial,
    /// Every requested instrument contributed over a common period
    Full,
}

#[derive(Debug, Clone)]
pub struct CorrelationReport {
    pub matrix: CorrelationMatrix,
    /// Display name per symbol, falling back to the symbol itself
    pub symbol_to_name: HashMap<String, String>,
    pub resolution: Resolution,
    /// Symbols the provider returned no prices for
    pub missing_prices: Vec<String>,
    pub dropped: Vec<DroppedSymbol>,
    pub alignment: Alignment,
    pub window: Option<(NaiveDate, NaiveDate)>,
    /// Return observations per symbol in the matrix
    pub observations: IndexMap<String, usize>,
    pub quality: DataQuality,
}

pub struct CorrelationPipeline<P> {
    resolver: SymbolResolver<P>,
    store: IdentifierStore,
}

impl<P: QuoteProvider> CorrelationPipeline<P> {
    pub fn new(resolver: SymbolResolver<P>, store: IdentifierStore) -> Self {
        Self { resolver, store }
    }

    pub fn store(&self) -> &IdentifierStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut IdentifierStore {
        &mut self.store
    }

    pub fn resolver(&self) -> &SymbolResolver<P> {
        &self.resolver
    }

    /// Correlation matrix of every instrument on the watch-list.
    pub async fn correlate_watchlist(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CorrelationReport, StoreError> {
        let identifiers = self.store.watchlist().to_vec();
        self.correlate_identifiers(&identifiers, start, end).await
    }

    /// Correlation matrix of the given instruments over `[start, end]`.
    ///
    /// Only a failed cache write is an error; missing data is reported through
    /// the returned [`CorrelationReport`].
    pub async fn correlate_identifiers(
        &mut self,
        identifiers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CorrelationReport, StoreError> {
        let resolution = self
            .resolver
            .resolve_all(&mut self.store, identifiers)
            .await?;

        let mut symbols: Vec<String> = Vec::with_capacity(resolution.resolved.len());
        let mut symbol_to_name: HashMap<String, String> = HashMap::new();

        // Every identifier gets its name cached; the label of a shared symbol
        // comes from the first identifier that maps to it
        for (identifier, symbol) in &resolution.resolved {
            let name = self
                .resolver
                .resolve_name(&mut self.store, identifier, Some(symbol))
                .await?;
            if symbol_to_name.contains_key(symbol) {
                continue;
            }
            symbols.push(symbol.clone());
            symbol_to_name.insert(symbol.clone(), name.unwrap_or_else(|| symbol.clone()));
        }

        log::info!(
            "Resolved {} of {} identifiers to {} symbols",
            resolution.resolved.len(),
            identifiers.len(),
            symbols.len()
        );

        let fetch = fetch_prices(self.resolver.provider(), &symbols, start, end).await;
        let returns = build_returns(&fetch.series);
        let matrix = correlate(&returns.series, &symbol_to_name);

        let quality = if matrix.is_empty() {
            DataQuality::NoData
        } else if matrix.len() < 2
            || !resolution.unresolved.is_empty()
            || !fetch.missing.is_empty()
            || !returns.dropped.is_empty()
            || returns.is_degraded()
        {
            DataQuality::Partial
        } else {
            DataQuality::Full
        };

        if quality != DataQuality::Full {
            log::warn!("Correlation matrix data quality: {:?}", quality);
        }

        Ok(CorrelationReport {
            matrix,
            symbol_to_name,
            resolution,
            missing_prices: fetch.missing,
            dropped: returns.dropped,
            alignment: returns.alignment,
            window: returns.window,
            observations: returns.observations,
            quality,
        })
    }
}
