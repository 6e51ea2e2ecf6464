use crate::models::ListingRecord;
use crate::scrapers::traits::BrowserSession;
use regex::Regex;
use tracing::debug;

/// One way of finding a listing's display name
#[derive(Debug, Clone)]
pub enum NameStrategy {
    /// Attribute value of the first descendant matching `selector`
    Attribute { selector: String, attribute: String },
    /// Longest non-empty text among all descendants matching `selector`
    LongestText { selector: String },
}

impl NameStrategy {
    pub fn attribute(selector: &str, attribute: &str) -> Self {
        Self::Attribute {
            selector: selector.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn longest_text(selector: &str) -> Self {
        Self::LongestText {
            selector: selector.to_string(),
        }
    }

    /// Try this strategy on a listing. DOM errors count as "no match".
    pub fn resolve<S: BrowserSession>(
        &self,
        session: &mut S,
        listing: &S::Element,
    ) -> Option<String> {
        match self {
            Self::Attribute {
                selector,
                attribute,
            } => {
                let element = session
                    .find_element_in(listing, selector)
                    .map_err(|e| debug!(selector = %selector, "name attribute lookup: {}", e))
                    .ok()?;
                let value = session.attribute(&element, attribute).ok().flatten()?;
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            Self::LongestText { selector } => {
                let elements = session
                    .find_elements_in(listing, selector)
                    .map_err(|e| debug!(selector = %selector, "name text lookup failed: {}", e))
                    .ok()?;
                elements
                    .iter()
                    .filter_map(|element| session.text(element).ok())
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty())
                    .fold(None, |longest: Option<String>, text| match longest {
                        Some(current) if current.chars().count() >= text.chars().count() => {
                            Some(current)
                        }
                        _ => Some(text),
                    })
            }
        }
    }
}

/// Currency-per-night matcher, e.g. `120 CHF pro Nacht` -> `120 CHF`
#[derive(Debug, Clone)]
pub struct PricePattern {
    regex: Regex,
    currency: String,
}

impl PricePattern {
    /// `pattern` must capture the amount either as a group named `amount` or as group 1
    pub fn new(pattern: &str, currency: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            currency: currency.to_string(),
        })
    }

    pub fn parse(&self, text: &str) -> Option<String> {
        let caps = self.regex.captures(text)?;
        let amount = caps.name("amount").or_else(|| caps.get(1))?;
        Some(format!("{} {}", amount.as_str().trim(), self.currency))
    }
}

/// Site-specific selectors and patterns.
/// These track the target site's markup and locale and are expected to change.
#[derive(Debug, Clone)]
pub struct ExtractionProfile {
    /// Container of a single listing card
    pub listing_selector: String,
    /// Name strategies, tried in order
    pub name_strategies: Vec<NameStrategy>,
    /// Price containers, tried in order
    pub price_selectors: Vec<String>,
    pub price_pattern: PricePattern,
    /// "Next page" controls, tried in order
    pub next_selectors: Vec<String>,
    /// Class fragments marking a control as unusable
    pub disabled_class_markers: Vec<String>,
    /// Prefix of output file names
    pub file_prefix: String,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        let mut name_strategies =
            vec![NameStrategy::attribute(r#"meta[itemprop="name"]"#, "content")];
        name_strategies.extend(
            [
                r#"div[data-testid="listing-card-title"] div"#,
                r#"div[data-testid="listing-card-title"] span"#,
                r#"div[data-section-id="title"]"#,
                r#"span[data-testid="listing-card-name"]"#,
                r#"div[style*="--title-name"]"#,
                r#"div[itemprop="name"]"#,
                r#"div[data-testid*="title"]"#,
                r#"div[role="heading"]"#,
            ]
            .into_iter()
            .map(NameStrategy::longest_text),
        );

        Self {
            listing_selector: r#"div[itemprop="itemListElement"]"#.to_string(),
            name_strategies,
            price_selectors: to_strings(&[
                r#"div[data-testid*="price-line"]"#,
                r#"div[data-testid*="price"]"#,
                r#"span[data-testid*="price"]"#,
                "div._1jo4hgw",
                "span._tyxjp1",
            ]),
            price_pattern: PricePattern::new(r"(?P<amount>\d+)\s*CHF\s+pro\s+Nacht", "CHF")
                .expect("built-in price pattern is valid"),
            next_selectors: to_strings(&[
                r#"a[aria-label="Next"]"#,
                r#"a[aria-label="Nächste"]"#,
                r#"button[aria-label="Next"]"#,
                r#"button[aria-label="Nächste"]"#,
                r#"[data-testid="pagination-next-btn"]"#,
                "button._1mzhry13",
                r#"*[aria-label*="next"]"#,
                r#"*[aria-label*="nächste"]"#,
                "a._1bfat5l",
                r#"button[aria-label*="pagination-button-next"]"#,
            ]),
            disabled_class_markers: to_strings(&["disabled", "inactive", "_disabled"]),
            file_prefix: "airbnb_results_search".to_string(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ExtractionProfile {
    pub fn resolve_name<S: BrowserSession>(
        &self,
        session: &mut S,
        listing: &S::Element,
    ) -> Option<String> {
        self.name_strategies
            .iter()
            .find_map(|strategy| strategy.resolve(session, listing))
    }

    /// First price selector whose text matches the price pattern
    pub fn resolve_price<S: BrowserSession>(
        &self,
        session: &mut S,
        listing: &S::Element,
    ) -> Option<String> {
        self.price_selectors.iter().find_map(|selector| {
            let element = session.find_element_in(listing, selector).ok()?;
            let text = session.text(&element).ok()?;
            self.price_pattern.parse(&text)
        })
    }

    /// True when the element's class attribute carries a disabled marker
    pub fn looks_disabled(&self, class_attr: &str) -> bool {
        let class_attr = class_attr.to_lowercase();
        self.disabled_class_markers
            .iter()
            .any(|marker| class_attr.contains(marker.as_str()))
    }
}

/// Build a record from a listing card, or `None` if name or price is missing
pub fn extract_record<S: BrowserSession>(
    session: &mut S,
    listing: &S::Element,
    profile: &ExtractionProfile,
) -> Option<ListingRecord> {
    let name = profile.resolve_name(session, listing)?;
    let price = match profile.resolve_price(session, listing) {
        Some(price) => price,
        None => {
            debug!(name = %name, "Skipping listing without a recognisable price");
            return None;
        }
    };

    Some(ListingRecord::new(name.trim(), price.trim()))
}
