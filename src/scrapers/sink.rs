use crate::models::ListingRecord;
use crate::scrapers::traits::ResultSink;
use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes each finished crawl as a CSV file plus a JSON backup sharing one stem
pub struct FileSink {
    dir: PathBuf,
    prefix: String,
}

impl FileSink {
    /// Create the sink, making sure the results directory exists
    pub fn new(dir: impl Into<PathBuf>, prefix: &str) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create results directory {}", dir.display()))?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
        })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next search number: one more than the CSV files already in the directory
    fn next_search_number(&self) -> Result<usize> {
        let existing = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "csv"))
            .count();
        Ok(existing + 1)
    }

    fn write_csv(path: &Path, records: &[ListingRecord]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_json(path: &Path, records: &[ListingRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl ResultSink for FileSink {
    fn persist(&mut self, seed_url: &str, records: &[ListingRecord]) -> Result<Vec<PathBuf>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let search_number = self.next_search_number()?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let stem = format!("{}_{}_{}", self.prefix, search_number, timestamp);

        let csv_path = self.dir.join(format!("{}.csv", stem));
        let json_path = self.dir.join(format!("{}.json", stem));

        Self::write_csv(&csv_path, records)?;
        Self::write_json(&json_path, records)?;

        info!(
            seed = %seed_url,
            "💾 Saved {} results to {} and {}",
            records.len(),
            csv_path.display(),
            json_path.display()
        );

        Ok(vec![csv_path, json_path])
    }
}
