//! Identifier → symbol / display name resolution
//!
//! Cache first, provider second, curated overrides last. Provider trouble never
//! reaches the caller; only a failed cache write does.

use super::{IdentifierStore, SymbolOverrides};
use crate::error::StoreError;
use crate::quotes::{QuoteProvider, SearchMatch};

/// Outcome of resolving a batch of identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// `(identifier, symbol)` in input order
    pub resolved: Vec<(String, String)>,
    /// Identifiers no source could map to a symbol
    pub unresolved: Vec<String>,
    /// Symbols reached from more than one identifier, with those identifiers
    pub shared_symbols: Vec<(String, Vec<String>)>,
}

pub struct SymbolResolver<P> {
    provider: P,
    overrides: SymbolOverrides,
}

impl<P: QuoteProvider> SymbolResolver<P> {
    pub fn new(provider: P, overrides: SymbolOverrides) -> Self {
        Self {
            provider,
            overrides,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn overrides(&self) -> &SymbolOverrides {
        &self.overrides
    }

    /// Resolve an identifier to a provider symbol.
    ///
    /// `Ok(None)` means no source knows the identifier. A newly found symbol is
    /// cached; `Err` only when that cache write fails.
    pub async fn resolve(
        &self,
        store: &mut IdentifierStore,
        identifier: &str,
    ) -> Result<Option<String>, StoreError> {
        if let Some(symbol) = store.get_symbol(identifier) {
            return Ok(Some(symbol.to_string()));
        }

        let symbol = match self.search_symbol(identifier).await {
            Some(symbol) => symbol,
            None => match self.overrides.get(identifier) {
                Some(symbol) => {
                    log::info!("Using curated symbol {} for {}", symbol, identifier);
                    symbol.to_string()
                }
                None => {
                    log::warn!("Could not resolve a symbol for {}", identifier);
                    return Ok(None);
                }
            },
        };

        store.put_symbol(identifier, &symbol)?;
        Ok(Some(symbol))
    }

    /// Resolve a human-readable short name, cached under the identifier.
    ///
    /// The symbol is resolved first when not supplied.
    pub async fn resolve_name(
        &self,
        store: &mut IdentifierStore,
        identifier: &str,
        symbol: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        if let Some(name) = store.get_name(identifier) {
            return Ok(Some(name.to_string()));
        }

        let symbol = match symbol {
            Some(symbol) => symbol.to_string(),
            None => match self.resolve(store, identifier).await? {
                Some(symbol) => symbol,
                None => return Ok(None),
            },
        };

        let name = match self.provider.search(&symbol).await {
            Ok(matches) => pick_name(&matches, &symbol),
            Err(e) => {
                log::warn!(
                    "Error fetching name for {} ({}) from {}: {}",
                    symbol,
                    identifier,
                    self.provider.name(),
                    e
                );
                None
            }
        };

        match name {
            Some(name) => {
                store.put_name(identifier, &name)?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    /// Resolve every identifier, keeping input order.
    pub async fn resolve_all(
        &self,
        store: &mut IdentifierStore,
        identifiers: &[String],
    ) -> Result<Resolution, StoreError> {
        let mut resolution = Resolution::default();

        for identifier in identifiers {
            match self.resolve(store, identifier).await? {
                Some(symbol) => resolution.resolved.push((identifier.clone(), symbol)),
                None => resolution.unresolved.push(identifier.clone()),
            }
        }

        for (identifier, symbol) in &resolution.resolved {
            match resolution
                .shared_symbols
                .iter_mut()
                .find(|(s, _)| s == symbol)
            {
                Some((_, ids)) => ids.push(identifier.clone()),
                None => resolution
                    .shared_symbols
                    .push((symbol.clone(), vec![identifier.clone()])),
            }
        }
        resolution.shared_symbols.retain(|(_, ids)| ids.len() > 1);

        for (symbol, ids) in &resolution.shared_symbols {
            log::warn!("{} is the symbol of several identifiers: {}", symbol, ids.join(", "));
        }

        Ok(resolution)
    }

    async fn search_symbol(&self, identifier: &str) -> Option<String> {
        match self.provider.search(identifier).await {
            Ok(matches) => matches
                .into_iter()
                .map(|m| m.symbol.trim().to_string())
                .find(|s| !s.is_empty()),
            Err(e) => {
                log::warn!(
                    "Error fetching ticker for {} from {}: {}",
                    identifier,
                    self.provider.name(),
                    e
                );
                None
            }
        }
    }
}

/// Name of the exact symbol match, else of the first match carrying a name.
fn pick_name(matches: &[SearchMatch], symbol: &str) -> Option<String> {
    let has_name = |m: &&SearchMatch| {
        m.short_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    };
    matches
        .iter()
        .filter(has_name)
        .find(|m| m.symbol.eq_ignore_ascii_case(symbol))
        .or_else(|| matches.iter().find(has_name))
        .and_then(|m| m.short_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::PriceBar;
    use anyhow::{anyhow, Result};
    use chrono::NaiveDate;
    use std::cell::Cell;
    use std::collections::HashMap;

    /// Answers searches from a fixed table and counts calls.
    struct TableProvider {
        table: HashMap<String, Vec<SearchMatch>>,
        fail: bool,
        searches: Cell<usize>,
    }

    impl TableProvider {
        fn new(entries: &[(&str, &str, Option<&str>)]) -> Self {
            let mut table: HashMap<String, Vec<SearchMatch>> = HashMap::new();
            for (query, symbol, name) in entries {
                table.entry(query.to_string()).or_default().push(SearchMatch {
                    symbol: symbol.to_string(),
                    short_name: name.map(String::from),
                });
            }
            Self {
                table,
                fail: false,
                searches: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }
    }

    impl QuoteProvider for TableProvider {
        fn name(&self) -> &str {
            "TABLE"
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchMatch>> {
            self.searches.set(self.searches.get() + 1);
            if self.fail {
                return Err(anyhow!("connection reset"));
            }
            Ok(self.table.get(query).cloned().unwrap_or_default())
        }

        async fn fetch_history(
            &self,
            _symbols: &[String],
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<HashMap<String, Vec<PriceBar>>> {
            Ok(HashMap::new())
        }
    }

    fn temp_store() -> (tempfile::TempDir, IdentifierStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentifierStore::open(dir.path().join("data.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_second_resolve_served_from_cache() {
        let (_dir, mut store) = temp_store();
        let provider = TableProvider::new(&[("US0378331005", "AAPL", Some("Apple Inc."))]);
        let resolver = SymbolResolver::new(&provider, SymbolOverrides::empty());

        let first = resolver.resolve(&mut store, "US0378331005").await.unwrap();
        let second = resolver.resolve(&mut store, "US0378331005").await.unwrap();

        assert_eq!(first.as_deref(), Some("AAPL"));
        assert_eq!(second, first);
        assert_eq!(provider.searches.get(), 1);
        assert_eq!(store.get_symbol("US0378331005"), Some("AAPL"));
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_overrides() {
        let (_dir, mut store) = temp_store();
        let provider = TableProvider::failing();
        let resolver = SymbolResolver::new(&provider, SymbolOverrides::builtin());

        let symbol = resolver.resolve(&mut store, "FR0011550193").await.unwrap();
        assert_eq!(symbol.as_deref(), Some("PAEEM.PA"));
        assert_eq!(store.get_symbol("FR0011550193"), Some("PAEEM.PA"));

        let unknown = resolver.resolve(&mut store, "XS0000000000").await.unwrap();
        assert_eq!(unknown, None);
        assert_eq!(store.get_symbol("XS0000000000"), None);
    }

    #[tokio::test]
    async fn test_provider_wins_over_overrides() {
        let (_dir, mut store) = temp_store();
        let provider = TableProvider::new(&[("FR0011550193", "PAEEM.PA", None)]);
        let overrides: SymbolOverrides = [("FR0011550193", "STALE.PA")].into_iter().collect();
        let resolver = SymbolResolver::new(&provider, overrides);

        let symbol = resolver.resolve(&mut store, "FR0011550193").await.unwrap();
        assert_eq!(symbol.as_deref(), Some("PAEEM.PA"));
    }

    #[tokio::test]
    async fn test_resolve_name_resolves_symbol_first() {
        let (_dir, mut store) = temp_store();
        let provider = TableProvider::new(&[
            ("IE00B4L5Y983", "IWDA.AS", None),
            ("IWDA.AS", "IWDA.L", Some("iShares Core MSCI World (GBP)")),
            ("IWDA.AS", "IWDA.AS", Some("iShares Core MSCI World")),
        ]);
        let resolver = SymbolResolver::new(&provider, SymbolOverrides::empty());

        let name = resolver
            .resolve_name(&mut store, "IE00B4L5Y983", None)
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("iShares Core MSCI World"));
        assert_eq!(store.get_symbol("IE00B4L5Y983"), Some("IWDA.AS"));
        assert_eq!(store.get_name("IE00B4L5Y983"), Some("iShares Core MSCI World"));

        let searches = provider.searches.get();
        resolver
            .resolve_name(&mut store, "IE00B4L5Y983", None)
            .await
            .unwrap();
        assert_eq!(provider.searches.get(), searches);
    }

    #[tokio::test]
    async fn test_resolve_name_absent_without_symbol() {
        let (_dir, mut store) = temp_store();
        let provider = TableProvider::new(&[]);
        let resolver = SymbolResolver::new(&provider, SymbolOverrides::empty());

        let name = resolver
            .resolve_name(&mut store, "XS0000000000", None)
            .await
            .unwrap();
        assert_eq!(name, None);
        assert!(store.data().names_cache.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_all_reports_shared_symbols() {
        let (_dir, mut store) = temp_store();
        let provider = TableProvider::new(&[
            ("ID-A", "SAME.PA", None),
            ("ID-B", "SAME.PA", None),
            ("ID-C", "OTHER.PA", None),
        ]);
        let resolver = SymbolResolver::new(&provider, SymbolOverrides::empty());
        let ids: Vec<String> = ["ID-A", "ID-B", "ID-C", "ID-D"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let resolution = resolver.resolve_all(&mut store, &ids).await.unwrap();
        assert_eq!(resolution.resolved.len(), 3);
        assert_eq!(resolution.unresolved, vec!["ID-D".to_string()]);
        assert_eq!(
            resolution.shared_symbols,
            vec![("SAME.PA".to_string(), vec!["ID-A".to_string(), "ID-B".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let mut store = IdentifierStore::open(blocker.join("data.json"));

        let provider = TableProvider::new(&[("US0378331005", "AAPL", None)]);
        let resolver = SymbolResolver::new(&provider, SymbolOverrides::empty());

        assert!(resolver.resolve(&mut store, "US0378331005").await.is_err());
    }
}
