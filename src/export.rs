use crate::error::ExportError;
use crate::models::Listing;
use crate::scrapers::types::SearchConfig;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Per-run output path: `<root>/<YYYY-MM-DD>/<city>-<term>.<ext>`
pub fn dated_path(root: &Path, search: &SearchConfig, date: NaiveDate, ext: &str) -> PathBuf {
    root.join(date.format("%Y-%m-%d").to_string()).join(format!(
        "{}-{}.{}",
        slug(&search.city),
        slug(&search.search_term),
        ext
    ))
}

const CSV_HEADER: [&str; 9] = [
    "id",
    "title",
    "description",
    "amenities",
    "price",
    "address",
    "city",
    "url",
    "scraped_at",
];

/// Write listings as CSV, replacing the file. The header row is written even
/// when there are no listings.
pub fn write_csv(path: &Path, listings: &[Listing]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(CSV_HEADER)?;
    for listing in listings {
        writer.serialize(listing)?;
    }
    writer.flush()?;

    info!("💾 Wrote {} listings to {}", listings.len(), path.display());
    Ok(())
}

/// Fold listings into the CSV at `path`.
///
/// Rows already in the file keep their position; a listing with the same id
/// replaces its row, new ids are appended. Returns the number of rows now in
/// the file.
pub fn merge_csv(path: &Path, listings: &[Listing]) -> Result<usize, ExportError> {
    let mut rows = read_csv(path)?;
    for listing in listings {
        match rows.iter_mut().find(|row| row.id == listing.id) {
            Some(row) => *row = listing.clone(),
            None => rows.push(listing.clone()),
        }
    }
    write_csv(path, &rows)?;
    Ok(rows.len())
}

/// Listings from an earlier export, or none when the file does not exist
pub fn read_csv(path: &Path) -> Result<Vec<Listing>, ExportError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<Listing>, _>>()?;
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Write any serializable report as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    info!("💾 Saved report to {}", path.display());
    Ok(())
}

fn slug(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let parts: Vec<&str> = lowered.split('-').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        "all".to_string()
    } else {
        parts.join("-")
    }
}
