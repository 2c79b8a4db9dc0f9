use crate::{record::Field, CrawlerError};
use serde::Deserialize;
use std::{path::Path, time::Duration};

/// When a fetched page counts as ready to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Readiness {
    /// The response body has been fully received.
    #[default]
    NetworkIdle,
    /// The page is polled until `selector` matches or `timeout_ms` passes.
    Selector { selector: String, timeout_ms: u64 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub base_url: String,
    pub start_page: u32,
    pub end_page: u32,
    pub listing_readiness: Readiness,
    pub detail_readiness: Readiness,
    pub concurrency: usize,
    pub delay_ms: u64,
    pub retries: u32,
    pub obey_robots: bool,
    pub user_agent: String,
    pub columns: Vec<Field>,
    pub output: String,
    pub sqlite: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            base_url: "https://playtoearn.com/blockchaingames".to_string(),
            start_page: 1,
            end_page: 4,
            listing_readiness: Readiness::NetworkIdle,
            detail_readiness: Readiness::NetworkIdle,
            concurrency: 8,
            delay_ms: 250,
            retries: 2,
            obey_robots: true,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            columns: Field::ALL.to_vec(),
            output: "games.csv".to_string(),
            sqlite: None,
        }
    }
}

impl CrawlConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<CrawlConfig, CrawlerError> {
        let raw = std::fs::read_to_string(path)?;
        let config: CrawlConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CrawlerError> {
        if self.start_page < 1 {
            return Err(CrawlerError::InvalidConfig(
                "start_page must be at least 1".to_string(),
            ));
        }
        if self.start_page > self.end_page {
            return Err(CrawlerError::InvalidConfig(format!(
                "start_page {} is after end_page {}",
                self.start_page, self.end_page
            )));
        }
        if self.concurrency == 0 {
            return Err(CrawlerError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.columns.is_empty() {
            return Err(CrawlerError::InvalidConfig("no output columns".to_string()));
        }
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
