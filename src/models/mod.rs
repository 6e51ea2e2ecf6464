use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One apartment card as persisted to disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ListingRecord {
    pub name: String,
    pub price_per_night: String,
}

impl ListingRecord {
    pub fn new(name: impl Into<String>, price_per_night: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price_per_night: price_per_night.into(),
        }
    }
}

/// How a crawl of one seed URL ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Target record count reached
    Done,
    /// Pagination stuck on the same URL past the retry budget, or page ceiling hit
    Exhausted,
    /// No next-page control and no usable fallback
    NoMorePages,
    /// Repeated unexpected failures
    Faulted,
    /// Stop requested from outside (Ctrl-C)
    Interrupted,
}

/// Accumulated state for one seed URL
#[derive(Debug, Clone)]
pub struct CrawlState {
    records: Vec<ListingRecord>,
    seen_records: HashSet<ListingRecord>,
    visited_pages: HashSet<String>,
    max_apartments: usize,
    persisted_len: Option<usize>,
    pages_visited: usize,
}

impl CrawlState {
    pub fn new(seed_url: &str, max_apartments: usize) -> Self {
        let mut visited_pages = HashSet::new();
        visited_pages.insert(seed_url.to_string());
        Self {
            records: Vec::new(),
            seen_records: HashSet::new(),
            visited_pages,
            max_apartments,
            persisted_len: None,
            pages_visited: 1,
        }
    }

    /// Records in discovery order
    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_apartments(&self) -> usize {
        self.max_apartments
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.max_apartments
    }

    pub fn remaining(&self) -> usize {
        self.max_apartments.saturating_sub(self.records.len())
    }

    /// Add a record unless it is a duplicate or the cap is reached.
    /// Returns whether the record was accepted.
    pub fn push(&mut self, record: ListingRecord) -> bool {
        if self.is_full() || self.seen_records.contains(&record) {
            return false;
        }
        self.seen_records.insert(record.clone());
        self.records.push(record);
        true
    }

    /// Mark a page URL as visited. Returns false if it was already seen.
    pub fn mark_visited(&mut self, page_url: &str) -> bool {
        let fresh = self.visited_pages.insert(page_url.to_string());
        if fresh {
            self.pages_visited += 1;
        }
        fresh
    }

    pub fn pages_visited(&self) -> usize {
        self.pages_visited
    }

    /// True when there are records the sink has not received yet
    pub fn has_unsaved(&self) -> bool {
        !self.records.is_empty() && self.persisted_len != Some(self.records.len())
    }

    pub fn mark_persisted(&mut self) {
        self.persisted_len = Some(self.records.len());
    }
}
