//! SQLite persistence for cleaned listings.
//!
//! One row per listing id. What happens when the same id is stored again is
//! decided by [`DuplicatePolicy`].

use crate::error::StoreError;
use crate::models::Listing;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    id          TEXT PRIMARY KEY NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    amenities   TEXT NOT NULL,
    price       REAL NOT NULL CHECK (price >= 0),
    address     TEXT NOT NULL,
    city        TEXT NOT NULL,
    url         TEXT NOT NULL,
    scraped_at  TEXT NOT NULL
);
"#;

const COLUMNS: &str = "id, title, description, amenities, price, address, city, url, scraped_at";

/// What to do when a listing id is already stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Replace the stored row with the newer scrape
    #[default]
    Overwrite,
    /// Keep the first stored row
    Skip,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" | "update" => Ok(Self::Overwrite),
            "skip" | "ignore" => Ok(Self::Skip),
            other => Err(other.to_string()),
        }
    }
}

/// Result of storing one listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Updated,
    Skipped,
}

pub struct ListingStore {
    conn: Connection,
    policy: DuplicatePolicy,
}

impl ListingStore {
    /// Open (or create) the database file, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Opening listing store at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            policy: DuplicatePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn insert(&self, listing: &Listing) -> Result<InsertOutcome, StoreError> {
        let scraped_at = listing.scraped_at.to_rfc3339_opts(SecondsFormat::Nanos, true);

        let inserted = self.conn.execute(
            &format!(
                "INSERT INTO listings ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO NOTHING"
            ),
            params![
                listing.id,
                listing.title,
                listing.description,
                listing.amenities,
                listing.price,
                listing.address,
                listing.city,
                listing.url,
                scraped_at,
            ],
        )?;
        if inserted == 1 {
            return Ok(InsertOutcome::Inserted);
        }

        match self.policy {
            DuplicatePolicy::Skip => Ok(InsertOutcome::Skipped),
            DuplicatePolicy::Overwrite => {
                self.conn.execute(
                    "UPDATE listings
                     SET title = ?2, description = ?3, amenities = ?4, price = ?5,
                         address = ?6, city = ?7, url = ?8, scraped_at = ?9
                     WHERE id = ?1",
                    params![
                        listing.id,
                        listing.title,
                        listing.description,
                        listing.amenities,
                        listing.price,
                        listing.address,
                        listing.city,
                        listing.url,
                        scraped_at,
                    ],
                )?;
                Ok(InsertOutcome::Updated)
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<Listing>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM listings WHERE id = ?1"),
                params![id],
                StoredRow::from_row,
            )
            .optional()?
            .map(StoredRow::into_listing)
            .transpose()
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Every stored listing, ordered by id
    pub fn all(&self) -> Result<Vec<Listing>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM listings ORDER BY id"))?;
        let rows = stmt.query_map([], StoredRow::from_row)?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?.into_listing()?);
        }
        Ok(listings)
    }
}

struct StoredRow {
    id: String,
    title: String,
    description: String,
    amenities: String,
    price: f64,
    address: String,
    city: String,
    url: String,
    scraped_at: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            amenities: row.get(3)?,
            price: row.get(4)?,
            address: row.get(5)?,
            city: row.get(6)?,
            url: row.get(7)?,
            scraped_at: row.get(8)?,
        })
    }

    fn into_listing(self) -> Result<Listing, StoreError> {
        let scraped_at = DateTime::parse_from_rfc3339(&self.scraped_at)
            .map_err(|e| StoreError::Corrupt {
                id: self.id.clone(),
                column: "scraped_at",
                message: e.to_string(),
            })?
            .with_timezone(&Utc);

        Ok(Listing {
            id: self.id,
            title: self.title,
            description: self.description,
            amenities: self.amenities,
            price: self.price,
            address: self.address,
            city: self.city,
            url: self.url,
            scraped_at,
        })
    }
}
