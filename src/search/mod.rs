//! Search and filtering: the query mini-language, structured filters and
//! their evaluation over a record set.

pub mod filter;
pub mod filter_engine;
pub mod query_parser;

pub use filter::{Filter, FilterList, FilterOperator, FilterValue};
pub use filter_engine::{FilterCache, FilterEngine};
pub use query_parser::{QueryParser, SearchTerm};
