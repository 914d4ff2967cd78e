//! Listing cleaning.
//!
//! A [`Cleaner`] runs a fixed, ordered list of [`CleaningStep`]s over each
//! raw listing. Steps mutate the listing in place and may reject it with a
//! [`CleaningError`]; a rejection only affects that one listing.

use crate::error::CleaningError;
use crate::models::{Listing, RawListing};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CURRENCY_AMOUNT_RE: Regex = Regex::new(
        r"(?P<sign>-)?\p{Sc}\s*(?P<inner>-)?(?P<amount>\d(?:[\d,\u{a0}\u{202f}]*\d)?(?:\.\d+)?)"
    )
    .unwrap();
    static ref BARE_AMOUNT_RE: Regex = Regex::new(
        r"(?P<sign>-)?(?P<amount>\d(?:[\d,\u{a0}\u{202f}]*\d)?(?:\.\d+)?)"
    )
    .unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// One normalization pass over a listing
pub trait CleaningStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, listing: &mut RawListing) -> Result<(), CleaningError>;
}

/// Coerces `price_text` into a numeric price.
///
/// Currency symbols, thousands separators and trailing units (`/mo`,
/// `per month`) are dropped. Text with no digits is rejected rather than
/// read as zero.
pub struct PriceStep;

impl CleaningStep for PriceStep {
    fn name(&self) -> &'static str {
        "price"
    }

    fn apply(&self, listing: &mut RawListing) -> Result<(), CleaningError> {
        listing.price = Some(parse_price(&listing.price_text)?);
        Ok(())
    }
}

/// Amount next to a currency symbol wins; otherwise the first number that
/// stands on its own, so `2-bed` or `Unit4` never read as a price.
/// A minus counts only when it is glued to the amount or its symbol.
pub fn parse_price(text: &str) -> Result<f64, CleaningError> {
    let no_number = || CleaningError::NoNumericContent {
        text: text.to_string(),
    };

    let caps = CURRENCY_AMOUNT_RE
        .captures(text)
        .or_else(|| {
            BARE_AMOUNT_RE.captures_iter(text).find(|caps| {
                caps.get(0)
                    .is_some_and(|m| is_standalone(text, m.start(), m.end()))
            })
        })
        .ok_or_else(no_number)?;

    let digits: String = caps["amount"]
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = digits.parse().map_err(|_| no_number())?;

    let leading_minus = caps
        .name("sign")
        .is_some_and(|m| !preceded_by_word(text, m.start()));
    let negative = leading_minus || caps.name("inner").is_some();
    if negative && value != 0.0 {
        return Err(CleaningError::NegativePrice {
            text: text.to_string(),
        });
    }
    Ok(value)
}

fn preceded_by_word(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .next_back()
        .is_some_and(char::is_alphanumeric)
}

/// Not touching letters on either side. A following `-` is fine only as a
/// range (`1200-1400`).
fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    if preceded_by_word(text, start) {
        return false;
    }
    let mut rest = text[end..].chars();
    match rest.next() {
        None => true,
        Some('-') => rest.next().is_some_and(|c| c.is_ascii_digit()),
        Some(c) => !c.is_alphanumeric(),
    }
}

/// Trims and collapses whitespace in every free-text field
pub struct WhitespaceStep;

impl CleaningStep for WhitespaceStep {
    fn name(&self) -> &'static str {
        "whitespace"
    }

    fn apply(&self, listing: &mut RawListing) -> Result<(), CleaningError> {
        for field in [
            &mut listing.title,
            &mut listing.description,
            &mut listing.amenities,
            &mut listing.address,
            &mut listing.city,
        ] {
            *field = collapse_whitespace(field);
        }
        Ok(())
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Title-cases city and address
pub struct CasingStep;

impl CleaningStep for CasingStep {
    fn name(&self) -> &'static str {
        "casing"
    }

    fn apply(&self, listing: &mut RawListing) -> Result<(), CleaningError> {
        listing.city = title_case(&listing.city);
        listing.address = title_case(&listing.address);
        Ok(())
    }
}

/// `"new  YORK"` -> `"New York"`, `"winston-salem"` -> `"Winston-Salem"`.
/// Words containing digits (`4B`, `21st`) are left alone.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            if word.chars().any(|c| c.is_ascii_digit()) {
                word.to_string()
            } else {
                word.split('-').map(capitalize).collect::<Vec<_>>().join("-")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Ordered cleaning pipeline
pub struct Cleaner {
    steps: Vec<Box<dyn CleaningStep>>,
}

impl Cleaner {
    /// Steps run in the order given
    pub fn new(steps: Vec<Box<dyn CleaningStep>>) -> Self {
        Self { steps }
    }

    /// Price, then whitespace, then casing
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(PriceStep),
            Box::new(WhitespaceStep),
            Box::new(CasingStep),
        ])
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step, then require a price before producing a [`Listing`]
    pub fn clean(&self, mut raw: RawListing) -> Result<Listing, CleaningError> {
        for step in &self.steps {
            step.apply(&mut raw)?;
        }
        Listing::try_from(raw)
    }

    /// Clean each listing independently
    pub fn clean_all(&self, raws: Vec<RawListing>) -> Vec<Result<Listing, CleaningError>> {
        raws.into_iter().map(|raw| self.clean(raw)).collect()
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::standard()
    }
}
