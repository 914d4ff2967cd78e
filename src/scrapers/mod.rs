pub mod http;
pub mod parser;
pub mod traits;
pub mod types;

pub use http::{HttpFetcher, RetryPolicy};
pub use parser::ListingParser;
pub use traits::Fetcher;
pub use types::{FieldRule, SearchConfig, SelectorRules};
