//! Descriptive statistics over stored listings: prices, cities, and the
//! words and amenities that show up most in listing text.

use crate::models::Listing;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "are", "from", "you", "your", "our", "has",
    "have", "all", "its", "into", "near", "very", "will", "can", "not", "but", "was", "per",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityStats {
    pub city: String,
    pub listings: usize,
    pub mean_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub listings: usize,
    pub price: Option<PriceStats>,
    pub cities: Vec<CityStats>,
    pub top_terms: Vec<TermCount>,
    pub amenities: Vec<TermCount>,
}

pub fn analyze(listings: &[Listing], top_n: usize) -> AnalysisReport {
    AnalysisReport {
        listings: listings.len(),
        price: price_stats(listings.iter().map(|l| l.price).collect()),
        cities: city_stats(listings),
        top_terms: top_terms(listings, top_n),
        amenities: amenity_counts(listings),
    }
}

fn price_stats(mut prices: Vec<f64>) -> Option<PriceStats> {
    if prices.is_empty() {
        return None;
    }
    prices.sort_by(f64::total_cmp);

    let n = prices.len();
    let median = if n % 2 == 0 {
        (prices[n / 2 - 1] + prices[n / 2]) / 2.0
    } else {
        prices[n / 2]
    };

    Some(PriceStats {
        min: prices[0],
        max: prices[n - 1],
        mean: prices.iter().sum::<f64>() / n as f64,
        median,
    })
}

fn city_stats(listings: &[Listing]) -> Vec<CityStats> {
    let mut by_city: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for listing in listings {
        let entry = by_city.entry(listing.city.as_str()).or_default();
        entry.0 += 1;
        entry.1 += listing.price;
    }

    by_city
        .into_iter()
        .map(|(city, (count, total))| CityStats {
            city: city.to_string(),
            listings: count,
            mean_price: total / count as f64,
        })
        .collect()
}

fn top_terms(listings: &[Listing], top_n: usize) -> Vec<TermCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for listing in listings {
        let words = listing
            .description
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| w.chars().count() >= 3)
            .map(str::to_lowercase)
            .filter(|w| !STOPWORDS.contains(&w.as_str()));
        for word in words {
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut terms = ranked(counts);
    terms.truncate(top_n);
    terms
}

fn amenity_counts(listings: &[Listing]) -> Vec<TermCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for listing in listings {
        for amenity in listing.amenities.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            *counts.entry(amenity.to_lowercase()).or_default() += 1;
        }
    }
    ranked(counts)
}

/// Highest count first, ties alphabetical
fn ranked(counts: HashMap<String, usize>) -> Vec<TermCount> {
    let mut terms: Vec<TermCount> = counts
        .into_iter()
        .map(|(term, count)| TermCount { term, count })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms
}
