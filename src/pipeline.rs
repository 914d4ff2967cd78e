//! Fetch → parse → clean → store for one search configuration.
//!
//! Every stage reports its outcome as a value. The driver counts them into a
//! [`RunSummary`]; nothing is raised to the caller. A fetch or structural
//! parse failure skips the rest of that page, anything smaller skips only
//! the listing.

use crate::cleaning::Cleaner;
use crate::config::AppConfig;
use crate::error::Error;
use crate::export;
use crate::models::Listing;
use crate::scrapers::{Fetcher, HttpFetcher, ListingParser, RetryPolicy, SearchConfig};
use crate::store::{InsertOutcome, ListingStore};
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Clean,
    Store,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Clean => "clean",
            Stage::Store => "store",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: Stage,
    pub page_url: String,
    pub listing_id: Option<String>,
    pub reason: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.listing_id {
            Some(id) => write!(f, "[{}] {} ({}): {}", self.stage, id, self.page_url, self.reason),
            None => write!(f, "[{}] {}: {}", self.stage, self.page_url, self.reason),
        }
    }
}

/// Counts for one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub pages: usize,
    pub fetched: usize,
    pub parsed: usize,
    pub cleaned: usize,
    /// Inserted plus updated rows
    pub stored: usize,
    pub updated: usize,
    /// Duplicates left untouched under the skip policy
    pub skipped: usize,
    pub failed_fetch: usize,
    pub failed_parse: usize,
    pub failed_cleaning: usize,
    pub failed_store: usize,
    pub failed_export: usize,
    pub failures: Vec<StageFailure>,
    pub export_path: Option<PathBuf>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failed_fetch
            + self.failed_parse
            + self.failed_cleaning
            + self.failed_store
            + self.failed_export
    }

    fn record(&mut self, stage: Stage, page_url: &str, listing_id: Option<&str>, reason: String) {
        match stage {
            Stage::Fetch => self.failed_fetch += 1,
            Stage::Parse => self.failed_parse += 1,
            Stage::Clean => self.failed_cleaning += 1,
            Stage::Store => self.failed_store += 1,
            Stage::Export => self.failed_export += 1,
        }

        let failure = StageFailure {
            stage,
            page_url: page_url.to_string(),
            listing_id: listing_id.map(str::to_string),
            reason,
        };
        warn!("{}", failure);
        self.failures.push(failure);
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pages={} fetched={} parsed={} cleaned={} stored={} (updated={} skipped={}) failed={} \
             [fetch={} parse={} clean={} store={} export={}]",
            self.pages,
            self.fetched,
            self.parsed,
            self.cleaned,
            self.stored,
            self.updated,
            self.skipped,
            self.failed(),
            self.failed_fetch,
            self.failed_parse,
            self.failed_cleaning,
            self.failed_store,
            self.failed_export,
        )
    }
}

pub struct Pipeline {
    fetcher: Box<dyn Fetcher>,
    parser: ListingParser,
    cleaner: Cleaner,
    export_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(fetcher: Box<dyn Fetcher>, parser: ListingParser) -> Self {
        Self {
            fetcher,
            parser,
            cleaner: Cleaner::standard(),
            export_dir: None,
        }
    }

    /// HTTP fetcher, configured selectors, CSV export into the output directory
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            ..RetryPolicy::default()
        };
        let fetcher = HttpFetcher::with_retry(config.timeout, retry)?;
        let parser = ListingParser::new(&config.selectors)?;

        Ok(Self::new(Box::new(fetcher), parser).with_export_dir(config.output_dir.clone()))
    }

    pub fn with_cleaner(mut self, cleaner: Cleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    /// Write each run's stored listings under a dated directory in `dir`
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    pub async fn run(&self, search: &SearchConfig, store: &ListingStore) -> RunSummary {
        info!(
            "Starting {} scrape: '{}' in {}",
            self.fetcher.name(),
            search.search_term,
            search.city
        );

        let mut summary = RunSummary::default();
        let mut written: Vec<Listing> = Vec::new();

        for page_url in search.page_urls() {
            summary.pages += 1;

            let html = match self.fetcher.fetch(&page_url).await {
                Ok(html) => html,
                Err(e) => {
                    summary.record(Stage::Fetch, &page_url, None, e.to_string());
                    continue;
                }
            };
            summary.fetched += 1;

            self.process_page(&html, &page_url, search, store, &mut summary, &mut written);
        }

        if let Some(dir) = &self.export_dir {
            self.export(dir, search, &written, &mut summary);
        }

        info!("✅ Run complete: {}", summary);
        summary
    }

    /// Merge this run's written listings into the day's CSV. A run that wrote
    /// nothing leaves any earlier file alone.
    fn export(
        &self,
        dir: &Path,
        search: &SearchConfig,
        written: &[Listing],
        summary: &mut RunSummary,
    ) {
        if written.is_empty() {
            info!("Nothing new to export");
            return;
        }

        let path = export::dated_path(dir, search, Utc::now().date_naive(), "csv");
        match export::merge_csv(&path, written) {
            Ok(_) => summary.export_path = Some(path),
            Err(e) => {
                let target = path.display().to_string();
                summary.record(Stage::Export, &target, None, e.to_string());
            }
        }
    }

    fn process_page(
        &self,
        html: &str,
        page_url: &str,
        search: &SearchConfig,
        store: &ListingStore,
        summary: &mut RunSummary,
        written: &mut Vec<Listing>,
    ) {
        let records = match self.parser.parse(html, page_url, &search.city, Utc::now()) {
            Ok(records) => records,
            Err(e) => {
                summary.record(Stage::Parse, page_url, None, e.to_string());
                return;
            }
        };
        info!("Found {} listing cards on {}", records.len(), page_url);

        for record in records {
            let raw = match record {
                Ok(raw) => raw,
                Err(e) => {
                    summary.record(Stage::Parse, page_url, None, e.to_string());
                    continue;
                }
            };
            summary.parsed += 1;

            let id = raw.id.clone();
            let listing = match self.cleaner.clean(raw) {
                Ok(listing) => listing,
                Err(e) => {
                    summary.record(Stage::Clean, page_url, Some(&id), e.to_string());
                    continue;
                }
            };
            summary.cleaned += 1;

            match store.insert(&listing) {
                Ok(InsertOutcome::Inserted) => {
                    summary.stored += 1;
                    written.push(listing);
                }
                Ok(InsertOutcome::Updated) => {
                    summary.stored += 1;
                    summary.updated += 1;
                    match written.iter_mut().find(|l| l.id == listing.id) {
                        Some(previous) => *previous = listing,
                        None => written.push(listing),
                    }
                }
                Ok(InsertOutcome::Skipped) => summary.skipped += 1,
                Err(e) => summary.record(Stage::Store, page_url, Some(&id), e.to_string()),
            }
        }
    }
}
