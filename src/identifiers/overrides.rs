//! Curated identifier → symbol exceptions
//!
//! Some instruments are never returned by the provider's identifier search
//! (mostly Euronext Paris ETF share classes). They are listed here and consulted
//! only after the provider lookup came back empty.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static DEFAULT_OVERRIDES: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    [
        ("FR0011550193", "PAEEM.PA"), // Amundi MSCI Emerging Markets
        ("FR0011550185", "PAASI.PA"), // Amundi MSCI Pacific ex Japan
        ("FR0013380607", "EESM.PA"),  // BNP Paribas Easy ECPI Global ESG Med Tech
        ("FR0013412012", "EUBS.PA"),  // BNP Paribas Easy ECPI Circular Economy Leaders
        ("FR0013411980", "ESG5.PA"),  // BNP Paribas Easy ECPI Global ESG Blue Economy
    ]
    .into_iter()
    .map(|(id, symbol)| (id.to_string(), symbol.to_string()))
    .collect()
});

/// Injectable table of known identifier → symbol mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolOverrides {
    entries: BTreeMap<String, String>,
}

impl SymbolOverrides {
    /// Empty table: no fallback at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in curated table.
    pub fn builtin() -> Self {
        Self {
            entries: DEFAULT_OVERRIDES.clone(),
        }
    }

    /// Add or replace a mapping. Blank keys or values are ignored.
    pub fn insert(&mut self, identifier: impl Into<String>, symbol: impl Into<String>) {
        let identifier = identifier.into().trim().to_string();
        let symbol = symbol.into().trim().to_string();
        if identifier.is_empty() || symbol.is_empty() {
            return;
        }
        self.entries.insert(identifier, symbol);
    }

    /// Layer `other` on top of `self`; entries of `other` win.
    pub fn extend(&mut self, other: &SymbolOverrides) {
        for (identifier, symbol) in &other.entries {
            self.insert(identifier.clone(), symbol.clone());
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.entries.get(identifier).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SymbolOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut overrides = Self::empty();
        for (identifier, symbol) in iter {
            overrides.insert(identifier, symbol);
        }
        overrides
    }
}
