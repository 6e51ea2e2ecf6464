pub mod browser;
pub mod crawler;
pub mod error;
pub mod extract;
#[cfg(test)]
pub mod fake;
pub mod pagination;
pub mod sink;
pub mod traits;
pub mod types;

pub use browser::ChromeSession;
pub use crawler::CrawlDriver;
pub use sink::FileSink;
pub use types::CrawlerConfig;
