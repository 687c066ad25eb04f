pub mod config;
pub mod correlation;
pub mod error;
pub mod identifiers;
pub mod pipeline;
pub mod quotes;
pub mod report;
pub mod returns;

pub use config::Config;
pub use correlation::{correlate, CorrelationMatrix, CorrelationPair};
pub use error::{ConfigError, StoreError};
pub use identifiers::{IdentifierStore, SymbolOverrides, SymbolResolver};
pub use pipeline::{CorrelationPipeline, CorrelationReport, DataQuality};
pub use quotes::{fetch_prices, QuoteProvider, YahooProvider};
pub use returns::{build_returns, Alignment, ReturnSet};
