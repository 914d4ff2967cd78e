use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CleaningError;

/// A listing as extracted from a search page, before cleaning.
///
/// Cleaning steps mutate this in place; `price` stays `None` until the
/// price step has coerced `price_text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub amenities: String,
    pub price_text: String,
    pub price: Option<f64>,
    pub address: String,
    pub city: String,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
}

/// A cleaned rental listing, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub amenities: String,
    pub price: f64,
    pub address: String,
    pub city: String,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
}

impl TryFrom<RawListing> for Listing {
    type Error = CleaningError;

    fn try_from(raw: RawListing) -> Result<Self, Self::Error> {
        let price = raw.price.ok_or_else(|| CleaningError::MissingPrice {
            id: raw.id.clone(),
        })?;

        Ok(Self {
            id: raw.id,
            title: raw.title,
            description: raw.description,
            amenities: raw.amenities,
            price,
            address: raw.address,
            city: raw.city,
            url: raw.url,
            scraped_at: raw.scraped_at,
        })
    }
}
