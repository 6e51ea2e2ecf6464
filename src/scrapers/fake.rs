//! In-memory browser and sink doubles for crawler tests.

use crate::models::ListingRecord;
use crate::scrapers::error::SessionError;
use crate::scrapers::traits::{BrowserSession, ResultSink};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Handle to the n-th element of the current document, in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeElement(usize);

/// Serves static HTML pages. Clicking an element with a `data-href` that names
/// a known page navigates there; anything else leaves the URL unchanged.
pub struct FakeSession {
    pages: HashMap<String, String>,
    current_url: String,
    document: Html,
    all: Selector,
    height: f64,
    pub growing_height: bool,
    pub fail_scripts: bool,
    pub fail_finds: bool,
    pub find_calls: usize,
    pub height_queries: usize,
    pub clicks: usize,
    pub refreshes: usize,
    pub quit_calls: usize,
    pub navigations: Vec<String>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            current_url: "about:blank".to_string(),
            document: Html::parse_document(""),
            all: Selector::parse("*").unwrap(),
            height: 2000.0,
            growing_height: false,
            fail_scripts: false,
            fail_finds: false,
            find_calls: 0,
            height_queries: 0,
            clicks: 0,
            refreshes: 0,
            quit_calls: 0,
            navigations: Vec::new(),
        }
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    /// A session already showing one page
    pub fn single(url: &str, body: &str) -> Self {
        let mut session = Self::new().with_page(url, body);
        session.navigate(url).unwrap();
        session.navigations.clear();
        session
    }

    fn load(&mut self, url: &str) -> Result<(), SessionError> {
        let body = self
            .pages
            .get(url)
            .ok_or_else(|| SessionError::Navigation(format!("no page at {}", url)))?;
        self.document = Html::parse_document(&format!("<html><body>{}</body></html>", body));
        self.current_url = url.to_string();
        Ok(())
    }

    fn element(&self, handle: &FakeElement) -> Result<ElementRef<'_>, SessionError> {
        self.document
            .select(&self.all)
            .nth(handle.0)
            .ok_or_else(|| SessionError::StaleElement(format!("element #{}", handle.0)))
    }

    fn handles<'a>(&'a self, found: impl Iterator<Item = ElementRef<'a>>) -> Vec<FakeElement> {
        let all: Vec<ElementRef<'a>> = self.document.select(&self.all).collect();
        found
            .filter_map(|element| all.iter().position(|candidate| *candidate == element))
            .map(FakeElement)
            .collect()
    }

    fn parse_selector(selector: &str) -> Result<Selector, SessionError> {
        Selector::parse(selector)
            .map_err(|e| SessionError::Script(format!("bad selector {}: {:?}", selector, e)))
    }
}

impl BrowserSession for FakeSession {
    type Element = FakeElement;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.navigations.push(url.to_string());
        self.load(url)
    }

    fn execute_script(&mut self, _script: &str) -> Result<Value, SessionError> {
        if self.fail_scripts {
            return Err(SessionError::Script("script execution disabled".to_string()));
        }
        Ok(Value::Null)
    }

    fn find_elements(&mut self, selector: &str) -> Result<Vec<FakeElement>, SessionError> {
        self.find_calls += 1;
        if self.fail_finds {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        let selector = Self::parse_selector(selector)?;
        Ok(self.handles(self.document.select(&selector)))
    }

    fn find_elements_in(
        &mut self,
        parent: &FakeElement,
        selector: &str,
    ) -> Result<Vec<FakeElement>, SessionError> {
        let selector = Self::parse_selector(selector)?;
        let parent = self.element(parent)?;
        Ok(self.handles(parent.select(&selector)))
    }

    fn text(&mut self, element: &FakeElement) -> Result<String, SessionError> {
        Ok(self.element(element)?.text().collect())
    }

    fn attribute(
        &mut self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        Ok(self.element(element)?.value().attr(name).map(str::to_string))
    }

    fn is_enabled(&mut self, element: &FakeElement) -> Result<bool, SessionError> {
        Ok(self.element(element)?.value().attr("disabled").is_none())
    }

    fn is_displayed(&mut self, element: &FakeElement) -> Result<bool, SessionError> {
        let element = self.element(element)?;
        let style = element.value().attr("style").unwrap_or("").replace(' ', "");
        Ok(element.value().attr("hidden").is_none() && !style.contains("display:none"))
    }

    fn scroll_into_view(&mut self, element: &FakeElement) -> Result<(), SessionError> {
        self.element(element)?;
        Ok(())
    }

    fn click(&mut self, element: &FakeElement) -> Result<(), SessionError> {
        self.clicks += 1;
        let target = self.element(element)?.value().attr("data-href").map(str::to_string);
        match target {
            Some(url) if self.pages.contains_key(&url) => self.navigate(&url),
            _ => Ok(()),
        }
    }

    fn current_url(&mut self) -> Result<String, SessionError> {
        Ok(self.current_url.clone())
    }

    fn refresh(&mut self) -> Result<(), SessionError> {
        self.refreshes += 1;
        let url = self.current_url.clone();
        self.load(&url)
    }

    fn quit(&mut self) -> Result<(), SessionError> {
        self.quit_calls += 1;
        Ok(())
    }

    fn page_height(&mut self) -> Result<f64, SessionError> {
        if self.fail_scripts {
            return Err(SessionError::Script("script execution disabled".to_string()));
        }
        self.height_queries += 1;
        if self.growing_height {
            self.height += 500.0;
        }
        Ok(self.height)
    }
}

/// Keeps every persisted batch in memory
#[derive(Default)]
pub struct MemorySink {
    pub saved: Vec<(String, Vec<ListingRecord>)>,
    pub fail: bool,
}

impl ResultSink for MemorySink {
    fn persist(
        &mut self,
        seed_url: &str,
        records: &[ListingRecord],
    ) -> anyhow::Result<Vec<PathBuf>> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }
        self.saved.push((seed_url.to_string(), records.to_vec()));
        Ok(vec![PathBuf::from(format!("memory/{}", self.saved.len()))])
    }
}

/// Listing card markup in the default profile's shape
pub fn listing_card(name: &str, price: u32) -> String {
    format!(
        concat!(
            r#"<div itemprop="itemListElement"><meta itemprop="name" content="{}">"#,
            r#"<div data-testid="price-line">{} CHF pro Nacht</div></div>"#,
        ),
        name, price
    )
}

/// "Next" button pointing at `target`, or a dead button when `None`
pub fn next_button(target: Option<&str>) -> String {
    match target {
        Some(url) => format!(r#"<button aria-label="Next" data-href="{}">Weiter</button>"#, url),
        None => r#"<button aria-label="Next">Weiter</button>"#.to_string(),
    }
}
