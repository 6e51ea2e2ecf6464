use crate::scrapers::error::SessionError;
use crate::scrapers::traits::BrowserSession;
use crate::scrapers::types::CrawlerConfig;
use anyhow::{Context, Result};
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::protocol::cdp::DOM::NodeId;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Element handle that survives across calls by DOM node id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromeElement {
    node_id: NodeId,
}

/// `BrowserSession` backed by a headless Chrome tab
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// Launch Chrome and open the working tab
    pub fn launch(config: &CrawlerConfig) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .window_size(Some(config.window_size))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;

        Ok(Self {
            browser: Some(browser),
            tab,
        })
    }

    fn resolve(&self, element: &ChromeElement) -> Result<Element<'_>, SessionError> {
        if self.browser.is_none() {
            return Err(SessionError::Closed);
        }
        Element::new(&self.tab, element.node_id)
            .map_err(|e| SessionError::StaleElement(format!("node {}: {}", element.node_id, e)))
    }

    /// Call `function_declaration` with `this` bound to the element
    fn call_on(
        &self,
        element: &ChromeElement,
        function_declaration: &str,
        args: Vec<Value>,
    ) -> Result<Value, SessionError> {
        let resolved = self.resolve(element)?;
        let result = resolved
            .call_js_fn(function_declaration, args, false)
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn handles(elements: Vec<Element<'_>>) -> Vec<ChromeElement> {
        elements
            .into_iter()
            .map(|element| ChromeElement {
                node_id: element.node_id,
            })
            .collect()
    }
}

/// headless_chrome reports "no match" as an error; only that one means an empty result
fn matches_or_error(
    selector: &str,
    found: anyhow::Result<Vec<Element<'_>>>,
) -> Result<Vec<ChromeElement>, SessionError> {
    match found {
        Ok(elements) => Ok(ChromeSession::handles(elements)),
        Err(e) if e.downcast_ref::<NoElementFound>().is_some() => {
            debug!(selector = %selector, "No elements match");
            Ok(Vec::new())
        }
        Err(e) => Err(SessionError::Script(format!("Query {} failed: {}", selector, e))),
    }
}

impl BrowserSession for ChromeSession {
    type Element = ChromeElement;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        if self.browser.is_none() {
            return Err(SessionError::Closed);
        }
        self.tab
            .navigate_to(url)
            .map_err(|e| {
                SessionError::Navigation(format!("Failed to navigate to {}: {}", url, e))
            })?;
        self.tab.wait_until_navigated().map_err(|e| {
            SessionError::Navigation(format!("Navigation timeout for {}: {}", url, e))
        })?;
        Ok(())
    }

    fn execute_script(&mut self, script: &str) -> Result<Value, SessionError> {
        if self.browser.is_none() {
            return Err(SessionError::Closed);
        }
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn find_elements(&mut self, selector: &str) -> Result<Vec<ChromeElement>, SessionError> {
        if self.browser.is_none() {
            return Err(SessionError::Closed);
        }
        matches_or_error(selector, self.tab.find_elements(selector))
    }

    fn find_elements_in(
        &mut self,
        parent: &ChromeElement,
        selector: &str,
    ) -> Result<Vec<ChromeElement>, SessionError> {
        let parent = self.resolve(parent)?;
        matches_or_error(selector, parent.find_elements(selector))
    }

    fn text(&mut self, element: &ChromeElement) -> Result<String, SessionError> {
        self.resolve(element)?
            .get_inner_text()
            .map_err(|e| SessionError::Script(e.to_string()))
    }

    fn attribute(
        &mut self,
        element: &ChromeElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let value = self.call_on(
            element,
            "function(name) { return this.getAttribute(name); }",
            vec![json!(name)],
        )?;
        Ok(value.as_str().map(str::to_string))
    }

    fn is_enabled(&mut self, element: &ChromeElement) -> Result<bool, SessionError> {
        let value = self.call_on(element, "function() { return !this.disabled; }", vec![])?;
        Ok(value.as_bool().unwrap_or(true))
    }

    fn is_displayed(&mut self, element: &ChromeElement) -> Result<bool, SessionError> {
        let value = self.call_on(
            element,
            r#"function() {
                const rect = this.getBoundingClientRect();
                const style = window.getComputedStyle(this);
                return rect.width > 0 && rect.height > 0
                    && style.visibility !== 'hidden' && style.display !== 'none';
            }"#,
            vec![],
        )?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn scroll_into_view(&mut self, element: &ChromeElement) -> Result<(), SessionError> {
        self.call_on(
            element,
            "function() { this.scrollIntoView({block: 'center'}); }",
            vec![],
        )?;
        Ok(())
    }

    fn click(&mut self, element: &ChromeElement) -> Result<(), SessionError> {
        self.resolve(element)?
            .click()
            .map_err(|e| SessionError::Interaction(format!("Click failed: {}", e)))?;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, SessionError> {
        if self.browser.is_none() {
            return Err(SessionError::Closed);
        }
        Ok(self.tab.get_url())
    }

    fn refresh(&mut self) -> Result<(), SessionError> {
        if self.browser.is_none() {
            return Err(SessionError::Closed);
        }
        self.tab
            .reload(false, None)
            .map_err(|e| SessionError::Navigation(format!("Reload failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| SessionError::Navigation(format!("Reload timeout: {}", e)))?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), SessionError> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };
        info!("Closing browser");
        let closed = self.tab.close(true);
        // Dropping the browser kills the Chrome process
        drop(browser);
        closed
            .map(|_| ())
            .map_err(|e| SessionError::Interaction(format!("Tab close failed: {}", e)))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}
