use async_trait::async_trait;
use chrono::Utc;
use rental_scout::cleaning::{CleaningStep, PriceStep};
use rental_scout::error::{CleaningError, NetworkError};
use rental_scout::export;
use rental_scout::{
    Cleaner, DuplicatePolicy, Fetcher, ListingParser, ListingStore, Pipeline, RawListing,
    SearchConfig, SelectorRules, Stage,
};
use std::collections::HashMap;
use std::path::Path;

const THREE_LISTINGS: &str = include_str!("fixtures/three_listings.html");
const MALFORMED_PRICE: &str = include_str!("fixtures/malformed_price.html");
const REDESIGNED: &str = include_str!("fixtures/redesigned.html");

/// Serves canned pages by URL; anything else is a 404
struct FixtureFetcher {
    pages: HashMap<String, String>,
}

impl FixtureFetcher {
    fn new(pages: &[(u32, &str)]) -> Self {
        let search = search(pages.len() as u32);
        Self {
            pages: pages
                .iter()
                .map(|(page, html)| (search.page_url(*page), html.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String, NetworkError> {
        self.pages.get(url).cloned().ok_or_else(|| NetworkError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

fn search(pages: u32) -> SearchConfig {
    SearchConfig {
        city: "Portland".to_string(),
        search_term: "apartment".to_string(),
        url_template: "https://rentals.test/search?city={city}&q={query}&page={page}".to_string(),
        pages,
    }
}

fn pipeline(fetcher: FixtureFetcher) -> Pipeline {
    let parser = ListingParser::new(&SelectorRules::default()).unwrap();
    Pipeline::new(Box::new(fetcher), parser)
}

fn stored_prices(store: &ListingStore) -> Vec<f64> {
    store.all().unwrap().into_iter().map(|l| l.price).collect()
}

fn exported_ids(path: &Path) -> Vec<String> {
    export::read_csv(path)
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect()
}

/// Flips one listing's price negative after it was parsed, so only the
/// store's own constraint can catch it
struct NegatePrice(&'static str);

impl CleaningStep for NegatePrice {
    fn name(&self) -> &'static str {
        "negate"
    }

    fn apply(&self, listing: &mut RawListing) -> Result<(), CleaningError> {
        if listing.id == self.0 {
            listing.price = listing.price.map(|p| -p);
        }
        Ok(())
    }
}

#[tokio::test]
async fn three_cards_end_to_end() {
    let store = ListingStore::open_in_memory().unwrap();
    let summary = pipeline(FixtureFetcher::new(&[(1, THREE_LISTINGS)]))
        .run(&search(1), &store)
        .await;

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.parsed, 3);
    assert_eq!(summary.cleaned, 3);
    assert_eq!(summary.stored, 3);
    assert_eq!(summary.failed(), 0);
    assert_eq!(store.count().unwrap(), 3);
    assert_eq!(stored_prices(&store), vec![1500.0, 2000.0, 900.0]);

    let first = store.get("pdx-101").unwrap().unwrap();
    assert_eq!(first.title, "Sunny one-bedroom near the park");
    assert_eq!(first.address, "812 Nw Glisan St");
    assert_eq!(first.city, "Portland");
    assert_eq!(first.amenities, "Parking, Laundry");
    assert_eq!(first.url, "https://rentals.test/listing/pdx-101");

    // no city on the card: falls back to the search city
    assert_eq!(store.get("pdx-103").unwrap().unwrap().city, "Portland");
}

#[tokio::test]
async fn malformed_price_only_fails_its_own_listing() {
    let store = ListingStore::open_in_memory().unwrap();
    let summary = pipeline(FixtureFetcher::new(&[(1, MALFORMED_PRICE)]))
        .run(&search(1), &store)
        .await;

    assert_eq!(summary.parsed, 3);
    assert_eq!(summary.cleaned, 2);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failed_cleaning, 1);
    assert_eq!(summary.failures[0].stage, Stage::Clean);
    assert_eq!(summary.failures[0].listing_id.as_deref(), Some("pdx-202"));
    assert_eq!(stored_prices(&store), vec![1750.0, 1100.0]);
}

#[tokio::test]
async fn changed_markup_fails_the_page_but_not_the_run() {
    let store = ListingStore::open_in_memory().unwrap();
    let summary = pipeline(FixtureFetcher::new(&[(1, REDESIGNED), (2, THREE_LISTINGS)]))
        .run(&search(2), &store)
        .await;

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.failed_parse, 1);
    assert_eq!(summary.failures[0].stage, Stage::Parse);
    assert_eq!(summary.stored, 3);
}

#[tokio::test]
async fn fetch_failure_skips_only_that_page() {
    let store = ListingStore::open_in_memory().unwrap();
    // page 1 is not served and comes back as a 404
    let fetcher = FixtureFetcher::new(&[(2, THREE_LISTINGS)]);

    let summary = pipeline(fetcher).run(&search(2), &store).await;

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.failed_fetch, 1);
    assert_eq!(summary.parsed, 3);
    assert_eq!(summary.stored, 3);
}

#[tokio::test]
async fn rescrape_keeps_one_row_per_listing() {
    let store = ListingStore::open_in_memory().unwrap();
    let pipeline = pipeline(FixtureFetcher::new(&[(1, THREE_LISTINGS)]));

    pipeline.run(&search(1), &store).await;
    let second = pipeline.run(&search(1), &store).await;

    assert_eq!(store.count().unwrap(), 3);
    assert_eq!(second.stored, 3);
    assert_eq!(second.updated, 3);
    assert_eq!(second.failed(), 0);
}

#[tokio::test]
async fn rescrape_under_skip_policy_leaves_rows_alone() {
    let store = ListingStore::open_in_memory()
        .unwrap()
        .with_policy(DuplicatePolicy::Skip);
    let pipeline = pipeline(FixtureFetcher::new(&[(1, THREE_LISTINGS)]));

    let first = pipeline.run(&search(1), &store).await;
    let before = store.get("pdx-102").unwrap().unwrap();
    let second = pipeline.run(&search(1), &store).await;

    assert_eq!(first.stored, 3);
    assert_eq!(second.stored, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(store.get("pdx-102").unwrap().unwrap(), before);
}

#[tokio::test]
async fn run_exports_csv_into_a_dated_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = ListingStore::open(dir.path().join("listings.db")).unwrap();
    let summary = pipeline(FixtureFetcher::new(&[(1, MALFORMED_PRICE)]))
        .with_export_dir(dir.path().join("output"))
        .run(&search(1), &store)
        .await;

    let expected = export::dated_path(
        &dir.path().join("output"),
        &search(1),
        Utc::now().date_naive(),
        "csv",
    );
    assert_eq!(summary.export_path.as_deref(), Some(expected.as_path()));

    let mut reader = csv::Reader::from_path(&expected).unwrap();
    let ids: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[0].to_string())
        .collect();
    assert_eq!(ids, vec!["pdx-201", "pdx-203"]);
}

#[tokio::test]
async fn rejected_insert_only_fails_its_own_listing() {
    let store = ListingStore::open_in_memory().unwrap();
    let cleaner = Cleaner::new(vec![Box::new(PriceStep), Box::new(NegatePrice("pdx-102"))]);
    let summary = pipeline(FixtureFetcher::new(&[(1, THREE_LISTINGS)]))
        .with_cleaner(cleaner)
        .run(&search(1), &store)
        .await;

    assert_eq!(summary.cleaned, 3);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failed_store, 1);
    assert_eq!(summary.failures[0].stage, Stage::Store);
    assert_eq!(summary.failures[0].listing_id.as_deref(), Some("pdx-102"));
    assert!(store.get("pdx-102").unwrap().is_none());
    assert_eq!(stored_prices(&store), vec![1500.0, 900.0]);
}

#[tokio::test]
async fn unwritable_export_dir_is_an_export_failure() {
    let dir = tempfile::tempdir().unwrap();
    // a plain file where the output directory should be
    let blocked = dir.path().join("output");
    std::fs::write(&blocked, "not a directory").unwrap();

    let store = ListingStore::open_in_memory().unwrap();
    let summary = pipeline(FixtureFetcher::new(&[(1, THREE_LISTINGS)]))
        .with_export_dir(&blocked)
        .run(&search(1), &store)
        .await;

    assert_eq!(summary.stored, 3);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failed_export, 1);
    assert_eq!(summary.failures[0].stage, Stage::Export);
    assert_eq!(summary.failures[0].listing_id, None);
    assert_eq!(summary.export_path, None);
    assert_eq!(store.count().unwrap(), 3);
}

#[tokio::test]
async fn rerun_that_stores_nothing_keeps_the_days_export() {
    let dir = tempfile::tempdir().unwrap();
    let store = ListingStore::open_in_memory()
        .unwrap()
        .with_policy(DuplicatePolicy::Skip);
    let pipeline = pipeline(FixtureFetcher::new(&[(1, THREE_LISTINGS)]))
        .with_export_dir(dir.path().join("output"));

    let first = pipeline.run(&search(1), &store).await;
    let path = first.export_path.clone().unwrap();
    let second = pipeline.run(&search(1), &store).await;

    assert_eq!(second.stored, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.export_path, None);
    assert_eq!(exported_ids(&path), vec!["pdx-101", "pdx-102", "pdx-103"]);
}

#[tokio::test]
async fn later_run_merges_into_the_days_export() {
    let dir = tempfile::tempdir().unwrap();
    let store = ListingStore::open_in_memory().unwrap();
    let output = dir.path().join("output");

    let first = pipeline(FixtureFetcher::new(&[(1, MALFORMED_PRICE)]))
        .with_export_dir(&output)
        .run(&search(1), &store)
        .await;
    let second = pipeline(FixtureFetcher::new(&[(1, THREE_LISTINGS)]))
        .with_export_dir(&output)
        .run(&search(1), &store)
        .await;

    assert_eq!(first.export_path, second.export_path);
    assert_eq!(
        exported_ids(&second.export_path.unwrap()),
        vec!["pdx-201", "pdx-203", "pdx-101", "pdx-102", "pdx-103"]
    );
}
