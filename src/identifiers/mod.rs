//! Identifier resolution subsystem
//!
//! Owns the persisted identifier cache / watch-list and maps instrument
//! identifiers (ISINs) to provider symbols and display names.

pub mod overrides;
pub mod resolver;
pub mod store;

pub use overrides::SymbolOverrides;
pub use resolver::{Resolution, SymbolResolver};
pub use store::{IdentifierStore, StoreData, STORE_VERSION};
