use crate::error::ParseError;
use crate::models::RawListing;
use crate::scrapers::types::{FieldRule, SelectorRules};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

struct CompiledRule {
    selector: Option<Selector>,
    attr: Option<String>,
    join: Option<String>,
}

impl CompiledRule {
    fn compile(field: &str, rule: &FieldRule) -> Result<Self, ParseError> {
        let selector = rule
            .selector
            .as_deref()
            .map(|s| compile_selector(field, s))
            .transpose()?;

        Ok(Self {
            selector,
            attr: rule.attr.clone(),
            join: rule.join.clone(),
        })
    }

    fn read(&self, element: ElementRef<'_>) -> Option<String> {
        match self.attr.as_deref() {
            Some(attr) => element.value().attr(attr).map(str::to_string),
            None => Some(element.text().collect::<String>()),
        }
    }

    /// Extract this field from a card, `None` when nothing matched
    fn extract(&self, card: ElementRef<'_>) -> Option<String> {
        let Some(selector) = &self.selector else {
            return self.read(card);
        };

        match &self.join {
            Some(separator) => {
                let parts: Vec<String> = card
                    .select(selector)
                    .filter_map(|el| self.read(el))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                (!parts.is_empty()).then(|| parts.join(separator))
            }
            None => card.select(selector).next().and_then(|el| self.read(el)),
        }
    }
}

fn compile_selector(field: &str, selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Turns search-result HTML into raw listings using a [`SelectorRules`] set
pub struct ListingParser {
    container_css: String,
    container: Selector,
    card: Selector,
    id: CompiledRule,
    title: CompiledRule,
    description: CompiledRule,
    amenities: CompiledRule,
    price: CompiledRule,
    address: CompiledRule,
    city: CompiledRule,
    url: CompiledRule,
}

impl ListingParser {
    /// Compile the rules. Fails on any invalid CSS selector.
    pub fn new(rules: &SelectorRules) -> Result<Self, ParseError> {
        Ok(Self {
            container_css: rules.container.clone(),
            container: compile_selector("container", &rules.container)?,
            card: compile_selector("card", &rules.card)?,
            id: CompiledRule::compile("id", &rules.id)?,
            title: CompiledRule::compile("title", &rules.title)?,
            description: CompiledRule::compile("description", &rules.description)?,
            amenities: CompiledRule::compile("amenities", &rules.amenities)?,
            price: CompiledRule::compile("price", &rules.price)?,
            address: CompiledRule::compile("address", &rules.address)?,
            city: CompiledRule::compile("city", &rules.city)?,
            url: CompiledRule::compile("url", &rules.url)?,
        })
    }

    /// Extract one raw listing per card.
    ///
    /// The outer error means the page structure is missing entirely; inner
    /// errors are per card. `default_city` fills cards that carry no city.
    pub fn parse(
        &self,
        html: &str,
        page_url: &str,
        default_city: &str,
        scraped_at: DateTime<Utc>,
    ) -> Result<Vec<Result<RawListing, ParseError>>, ParseError> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let containers: Vec<_> = document.select(&self.container).collect();
        if containers.is_empty() {
            return Err(ParseError::MissingContainer {
                selector: self.container_css.clone(),
            });
        }

        // nested containers match the same cards more than once
        let mut seen = HashSet::new();
        let cards: Vec<_> = containers
            .iter()
            .flat_map(|container| container.select(&self.card))
            .filter(|card| seen.insert(card.id()))
            .collect();
        debug!("Found {} listing cards in {}", cards.len(), page_url);

        Ok(cards
            .into_iter()
            .enumerate()
            .map(|(index, card)| {
                self.parse_card(index, card, base.as_ref(), default_city, scraped_at)
            })
            .collect())
    }

    fn parse_card(
        &self,
        index: usize,
        card: ElementRef<'_>,
        base: Option<&Url>,
        default_city: &str,
        scraped_at: DateTime<Utc>,
    ) -> Result<RawListing, ParseError> {
        let href = self.url.extract(card).map(|h| h.trim().to_string()).unwrap_or_default();
        let url = resolve(base, &href);

        let id = self
            .id
            .extract(card)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .or_else(|| id_from_url(&url))
            .ok_or(ParseError::MissingId { index })?;

        let city = self
            .city
            .extract(card)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| default_city.to_string());

        Ok(RawListing {
            id,
            title: self.title.extract(card).unwrap_or_default(),
            description: self.description.extract(card).unwrap_or_default(),
            amenities: self.amenities.extract(card).unwrap_or_default(),
            price_text: self.price.extract(card).unwrap_or_default(),
            price: None,
            address: self.address.extract(card).unwrap_or_default(),
            city,
            url,
            scraped_at,
        })
    }
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    match base.and_then(|b| b.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}

/// Last non-empty path segment of a listing URL, e.g. `/listing/4411/` -> `4411`
fn id_from_url(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.split('/')
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}
