//! Identifier cache and watch-list store
//!
//! One JSON document holds the watch-list and the two identifier caches. The
//! document is loaded once, kept in memory and rewritten in full after every
//! mutation, so a successful call always means the change is on disk.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current layout version of the persisted document.
pub const STORE_VERSION: u32 = 1;

/// Persisted layout. Absent fields default to empty; an absent `version` means 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreData {
    pub version: u32,
    /// Watch-list, in insertion order, without duplicates
    pub isin_list: Vec<String>,
    /// identifier → symbol
    pub tickers_cache: BTreeMap<String, String>,
    /// identifier → display name
    pub names_cache: BTreeMap<String, String>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            isin_list: Vec::new(),
            tickers_cache: BTreeMap::new(),
            names_cache: BTreeMap::new(),
        }
    }
}

impl StoreData {
    /// Normalize a freshly parsed document. `None` if the layout is unsupported.
    fn validated(mut self) -> Option<Self> {
        if self.version == 0 || self.version > STORE_VERSION {
            return None;
        }

        let mut seen = std::collections::HashSet::new();
        self.isin_list
            .retain(|id| !is_blank(id) && seen.insert(id.clone()));
        self.tickers_cache
            .retain(|id, symbol| !is_blank(id) && !is_blank(symbol));
        self.names_cache
            .retain(|id, name| !is_blank(id) && !is_blank(name));
        self.version = STORE_VERSION;

        Some(self)
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Read the document at `path`. Missing, unreadable or malformed content all
/// degrade to an empty store.
fn load_data(path: &Path) -> StoreData {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No store at {:?}, starting empty", path);
            return StoreData::default();
        }
        Err(e) => {
            log::warn!("Cannot read store {:?}, starting empty: {}", path, e);
            return StoreData::default();
        }
    };

    match serde_json::from_str::<StoreData>(&raw) {
        Ok(data) => data.validated().unwrap_or_else(|| {
            log::warn!("Unsupported store version in {:?}, starting empty", path);
            StoreData::default()
        }),
        Err(e) => {
            log::warn!("Malformed store {:?}, starting empty: {}", path, e);
            StoreData::default()
        }
    }
}

/// Durable identifier cache + watch-list.
///
/// Mutations take `&mut self`, which serializes writers within a process.
#[derive(Debug)]
pub struct IdentifierStore {
    path: PathBuf,
    data: StoreData,
}

impl IdentifierStore {
    /// Open the store at `path`. Never fails; see [`load_data`].
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = load_data(&path);
        log::debug!(
            "Opened store {:?}: {} watched, {} symbols, {} names",
            path,
            data.isin_list.len(),
            data.tickers_cache.len(),
            data.names_cache.len()
        );
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the in-memory document
    pub fn data(&self) -> &StoreData {
        &self.data
    }

    // ------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------

    pub fn get_symbol(&self, identifier: &str) -> Option<&str> {
        self.data.tickers_cache.get(identifier).map(String::as_str)
    }

    pub fn get_name(&self, identifier: &str) -> Option<&str> {
        self.data.names_cache.get(identifier).map(String::as_str)
    }

    /// Cache a symbol. Blank identifiers or symbols are ignored, as on load.
    pub fn put_symbol(&mut self, identifier: &str, symbol: &str) -> Result<(), StoreError> {
        if is_blank(identifier) || is_blank(symbol) {
            log::debug!("Ignoring blank symbol entry for {:?}", identifier);
            return Ok(());
        }
        let previous = self.data.clone();
        self.data
            .tickers_cache
            .insert(identifier.to_string(), symbol.to_string());
        self.commit(previous)
    }

    pub fn put_name(&mut self, identifier: &str, name: &str) -> Result<(), StoreError> {
        if is_blank(identifier) || is_blank(name) {
            log::debug!("Ignoring blank name entry for {:?}", identifier);
            return Ok(());
        }
        let previous = self.data.clone();
        self.data
            .names_cache
            .insert(identifier.to_string(), name.to_string());
        self.commit(previous)
    }

    /// Invalidate a cached symbol. Returns whether an entry was removed.
    pub fn clear_symbol(&mut self, identifier: &str) -> Result<bool, StoreError> {
        if !self.data.tickers_cache.contains_key(identifier) {
            return Ok(false);
        }
        let previous = self.data.clone();
        self.data.tickers_cache.remove(identifier);
        self.commit(previous).map(|_| true)
    }

    /// Invalidate a cached name. Returns whether an entry was removed.
    pub fn clear_name(&mut self, identifier: &str) -> Result<bool, StoreError> {
        if !self.data.names_cache.contains_key(identifier) {
            return Ok(false);
        }
        let previous = self.data.clone();
        self.data.names_cache.remove(identifier);
        self.commit(previous).map(|_| true)
    }

    // ------------------------------------------------------------------
    // Watch-list
    // ------------------------------------------------------------------

    pub fn watchlist(&self) -> &[String] {
        &self.data.isin_list
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.data.isin_list.iter().any(|id| id == identifier)
    }

    /// Append to the watch-list. No-op (returns `false`) when already present or blank.
    pub fn add(&mut self, identifier: &str) -> Result<bool, StoreError> {
        if is_blank(identifier) || self.contains(identifier) {
            return Ok(false);
        }
        let previous = self.data.clone();
        self.data.isin_list.push(identifier.to_string());
        self.commit(previous).map(|_| true)
    }

    /// Remove from the watch-list. No-op (returns `false`) when absent.
    pub fn remove(&mut self, identifier: &str) -> Result<bool, StoreError> {
        if !self.contains(identifier) {
            return Ok(false);
        }
        let previous = self.data.clone();
        self.data.isin_list.retain(|id| id != identifier);
        self.commit(previous).map(|_| true)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the full document, replacing the file atomically.
    pub fn save(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(io_err)?;
        let json = serde_json::to_vec_pretty(&self.data)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|source| StoreError::Persist {
            path: self.path.clone(),
            source,
        })?;

        Ok(())
    }

    /// Persist the current state, or restore `previous` if that fails.
    fn commit(&mut self, previous: StoreData) -> Result<(), StoreError> {
        if let Err(e) = self.save() {
            log::error!("Store update not saved, rolling back: {}", e);
            self.data = previous;
            return Err(e);
        }
        Ok(())
    }
}
