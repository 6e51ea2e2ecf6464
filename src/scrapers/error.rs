/// Errors raised by a browser session
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("JavaScript execution error: {0}")]
    Script(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("Element interaction failed: {0}")]
    Interaction(String),

    #[error("Browser session already closed")]
    Closed,
}
