use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Search configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// City to search in, also the fallback city for cards without one
    pub city: String,
    /// Free-text search term
    pub search_term: String,
    /// URL with `{city}`, `{query}` and `{page}` placeholders
    pub url_template: String,
    /// Number of result pages to fetch, starting at page 1
    pub pages: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            city: "Portland".to_string(),
            search_term: "apartment".to_string(),
            url_template: "https://rentals.example.com/search?city={city}&q={query}&page={page}"
                .to_string(),
            pages: 1,
        }
    }
}

impl SearchConfig {
    /// URL of the given 1-based result page
    pub fn page_url(&self, page: u32) -> String {
        self.url_template
            .replace("{city}", &encode(&self.city))
            .replace("{query}", &encode(&self.search_term))
            .replace("{page}", &page.to_string())
    }

    /// URLs of every page this configuration covers
    pub fn page_urls(&self) -> Vec<String> {
        (1..=self.pages.max(1)).map(|p| self.page_url(p)).collect()
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// How to read one field out of a listing card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// CSS selector relative to the card; `None` selects the card itself
    #[serde(default)]
    pub selector: Option<String>,
    /// Attribute to read instead of the element text
    #[serde(default)]
    pub attr: Option<String>,
    /// Join every match with this separator instead of taking the first
    #[serde(default)]
    pub join: Option<String>,
}

impl FieldRule {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            attr: None,
            join: None,
        }
    }

    pub fn attr(selector: &str, attr: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            attr: Some(attr.to_string()),
            join: None,
        }
    }

    pub fn card_attr(attr: &str) -> Self {
        Self {
            selector: None,
            attr: Some(attr.to_string()),
            join: None,
        }
    }

    pub fn joined(selector: &str, separator: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            attr: None,
            join: Some(separator.to_string()),
        }
    }
}

/// Declarative extraction rules for a search results page.
///
/// A markup change on the site only needs a new set of rules, e.g. loaded
/// from JSON, not a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorRules {
    /// Element that must exist on every results page
    pub container: String,
    /// One match per listing, searched inside the container
    pub card: String,
    pub id: FieldRule,
    pub title: FieldRule,
    pub description: FieldRule,
    pub amenities: FieldRule,
    pub price: FieldRule,
    pub address: FieldRule,
    pub city: FieldRule,
    pub url: FieldRule,
}

impl Default for SelectorRules {
    fn default() -> Self {
        Self {
            container: "div.search-results".to_string(),
            card: "article.listing-card".to_string(),
            id: FieldRule::card_attr("data-listing-id"),
            title: FieldRule::text(".listing-title"),
            description: FieldRule::text(".listing-description"),
            amenities: FieldRule::joined("ul.listing-amenities li", ", "),
            price: FieldRule::text(".listing-price"),
            address: FieldRule::text(".listing-address"),
            city: FieldRule::text(".listing-city"),
            url: FieldRule::attr("a.listing-link", "href"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_fills_and_encodes_placeholders() {
        let config = SearchConfig {
            city: "San Francisco".into(),
            search_term: "2 bed & bath".into(),
            url_template: "https://x.test/s?c={city}&q={query}&p={page}".into(),
            pages: 2,
        };

        assert_eq!(
            config.page_urls(),
            vec![
                "https://x.test/s?c=San+Francisco&q=2+bed+%26+bath&p=1".to_string(),
                "https://x.test/s?c=San+Francisco&q=2+bed+%26+bath&p=2".to_string(),
            ]
        );
    }

    #[test]
    fn zero_pages_still_fetches_the_first() {
        let config = SearchConfig {
            pages: 0,
            ..SearchConfig::default()
        };
        assert_eq!(config.page_urls().len(), 1);
    }

    #[test]
    fn rules_load_from_json_with_optional_keys_omitted() {
        let json = r##"{
            "container": "#results",
            "card": ".card",
            "id": { "attr": "data-id" },
            "title": { "selector": "h3" },
            "description": { "selector": "p" },
            "amenities": { "selector": "li", "join": "; " },
            "price": { "selector": ".price" },
            "address": { "selector": ".addr" },
            "city": { "selector": ".city" },
            "url": { "selector": "a", "attr": "href" }
        }"##;

        let rules: SelectorRules = serde_json::from_str(json).unwrap();
        assert_eq!(rules.id, FieldRule::card_attr("data-id"));
        assert_eq!(rules.amenities, FieldRule::joined("li", "; "));
        assert_eq!(rules.url, FieldRule::attr("a", "href"));
    }
}
