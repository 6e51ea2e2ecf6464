use crate::models::ListingRecord;
use crate::scrapers::error::SessionError;
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

/// A controllable browser session.
/// Element handles are opaque tokens owned by the session; they may go stale
/// after navigation or refresh.
pub trait BrowserSession {
    type Element: Clone;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Evaluate a JavaScript expression in the page and return its value
    fn execute_script(&mut self, script: &str) -> Result<Value, SessionError>;

    /// All elements in the document matching a CSS selector
    fn find_elements(&mut self, selector: &str) -> Result<Vec<Self::Element>, SessionError>;

    /// All descendants of `parent` matching a CSS selector
    fn find_elements_in(
        &mut self,
        parent: &Self::Element,
        selector: &str,
    ) -> Result<Vec<Self::Element>, SessionError>;

    /// First descendant of `parent` matching a CSS selector
    fn find_element_in(
        &mut self,
        parent: &Self::Element,
        selector: &str,
    ) -> Result<Self::Element, SessionError> {
        self.find_elements_in(parent, selector)?
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::ElementNotFound(selector.to_string()))
    }

    fn text(&mut self, element: &Self::Element) -> Result<String, SessionError>;

    fn attribute(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    fn is_enabled(&mut self, element: &Self::Element) -> Result<bool, SessionError>;

    fn is_displayed(&mut self, element: &Self::Element) -> Result<bool, SessionError>;

    /// Scroll the element to the vertical center of the viewport
    fn scroll_into_view(&mut self, element: &Self::Element) -> Result<(), SessionError>;

    fn click(&mut self, element: &Self::Element) -> Result<(), SessionError>;

    fn current_url(&mut self) -> Result<String, SessionError>;

    fn refresh(&mut self) -> Result<(), SessionError>;

    /// Release the browser. Calling it twice is harmless.
    fn quit(&mut self) -> Result<(), SessionError>;

    fn page_height(&mut self) -> Result<f64, SessionError> {
        let value = self.execute_script("document.body.scrollHeight")?;
        value
            .as_f64()
            .ok_or_else(|| SessionError::Script(format!("scrollHeight returned {}", value)))
    }

    fn scroll_by(&mut self, dy: f64) -> Result<(), SessionError> {
        self.execute_script(&format!("window.scrollBy(0, {})", dy))?;
        Ok(())
    }

    fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        self.execute_script("window.scrollTo(0, document.body.scrollHeight)")?;
        Ok(())
    }
}

/// Where finished crawls end up
pub trait ResultSink {
    /// Persist the records collected for `seed_url`.
    /// Returns the written artifact paths.
    fn persist(&mut self, seed_url: &str, records: &[ListingRecord]) -> Result<Vec<PathBuf>>;
}
