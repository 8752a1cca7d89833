pub mod sink;
pub mod store;

pub use sink::PersistenceSink;
pub use store::{DieselQuoteStore, QuoteStore, SymbolStore};
