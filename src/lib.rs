//! Scrape rental listings for a search, clean them, and keep them in a
//! local SQLite store.
//!
//! [`Pipeline`] drives the stages; each stage lives in its own module so it
//! can be used and tested on its own.

pub mod analysis;
pub mod cleaning;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod store;

pub use cleaning::Cleaner;
pub use config::AppConfig;
pub use error::{Error, Result};
pub use models::{Listing, RawListing};
pub use pipeline::{Pipeline, RunSummary, Stage, StageFailure};
pub use scrapers::{Fetcher, HttpFetcher, ListingParser, SearchConfig, SelectorRules};
pub use store::{DuplicatePolicy, InsertOutcome, ListingStore};
