use scraper::Html;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub mod config;
pub mod dedup;
pub mod extract;
pub mod fetcher;
pub mod playtoearn;
pub mod record;
pub mod sink;

mod data;
mod error;
mod utils;

pub use config::{CrawlConfig, Readiness};
pub use data::Table;
pub use dedup::Deduplicator;
pub use error::CrawlerError;
pub use record::{Field, GameRecord};

/// A listing row before its detail page, if any, has been merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub record: GameRecord,
    pub detail_url: Option<String>,
}

/// Site-specific knowledge: where the listing pages live and how to read them.
pub trait Crawler {
    fn listing_url(&self, page: u32) -> String;
    fn parse_listing(&self, doc: &Html, page_url: &str) -> Vec<ListingRow>;
    fn parse_detail(&self, doc: &Html) -> GameRecord;
}

/// Returns the markup of `url` once `readiness` holds, or a terminal failure.
/// Retries, throttling and robots.txt are the implementor's business.
#[async_trait::async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str, readiness: &Readiness) -> Result<String, CrawlerError>;
}

/// Destination of finalized records.
#[async_trait::async_trait]
pub trait Sink {
    async fn write(&self, record: GameRecord) -> Result<(), CrawlerError>;

    async fn finish(&self) -> Result<(), CrawlerError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_fetched: u32,
    pub pages_failed: u32,
    pub rows_parsed: usize,
    pub detail_failures: usize,
    pub admitted: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Admitted,
    Dropped,
}

impl CrawlStats {
    fn tally(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Admitted => self.admitted += 1,
            RowOutcome::Dropped => self.dropped += 1,
        }
    }
}

/// Crawls listing pages `start_page..=end_page`, following detail links, and
/// writes every record whose name has not been seen before to `sink`.
///
/// Listing pages are fetched one after another while the detail pages of
/// earlier rows are still in flight. A failed listing page only loses its own
/// rows; a failed detail page falls back to the listing data.
pub async fn run_crawler<C, F, S>(
    crawler: C,
    fetcher: F,
    sink: S,
    config: &CrawlConfig,
) -> Result<CrawlStats, CrawlerError>
where
    C: Crawler + Send + Sync + 'static,
    F: Fetcher + Send + Sync + 'static,
    S: Sink + Send + Sync + 'static,
{
    config.validate()?;

    let crawler = Arc::new(crawler);
    let fetcher = Arc::new(fetcher);
    let sink = Arc::new(sink);
    let dedup = Arc::new(Deduplicator::new());
    let detail_readiness = Arc::new(config.detail_readiness.clone());

    let mut stats = CrawlStats::default();
    let mut details = JoinSet::new();

    for page in config.start_page..=config.end_page {
        let url = crawler.listing_url(page);
        let html = match fetcher.fetch(&url, &config.listing_readiness).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Skipping listing page {}: {}", url, e);
                stats.pages_failed += 1;
                continue;
            }
        };
        stats.pages_fetched += 1;

        let rows = {
            let doc = Html::parse_document(&html);
            crawler.parse_listing(&doc, &url)
        };
        info!("Page URL: {}, rows found: {}", url, rows.len());
        stats.rows_parsed += rows.len();

        for ListingRow { record, detail_url } in rows {
            match detail_url {
                Some(detail_url) => {
                    details.spawn(handle(
                        record,
                        detail_url,
                        crawler.clone(),
                        fetcher.clone(),
                        sink.clone(),
                        dedup.clone(),
                        detail_readiness.clone(),
                    ));
                }
                None => {
                    let outcome = emit(record, &dedup, sink.as_ref()).await?;
                    stats.tally(outcome);
                }
            }
        }
    }

    while let Some(result) = details.join_next().await {
        let (outcome, detail_failed) = result??;
        stats.tally(outcome);
        if detail_failed {
            stats.detail_failures += 1;
        }
    }

    sink.finish().await?;

    info!(
        "Crawl finished: {} pages ({} failed), {} rows, {} admitted, {} dropped, {} detail failures",
        stats.pages_fetched,
        stats.pages_failed,
        stats.rows_parsed,
        stats.admitted,
        stats.dropped,
        stats.detail_failures
    );
    Ok(stats)
}

async fn handle<C, F, S>(
    listing: GameRecord,
    url: String,
    crawler: Arc<C>,
    fetcher: Arc<F>,
    sink: Arc<S>,
    dedup: Arc<Deduplicator>,
    readiness: Arc<Readiness>,
) -> Result<(RowOutcome, bool), CrawlerError>
where
    C: Crawler,
    F: Fetcher,
    S: Sink,
{
    let (record, detail_failed) = match fetcher.fetch(&url, &readiness).await {
        Ok(html) => {
            let detail = {
                let doc = Html::parse_document(&html);
                crawler.parse_detail(&doc)
            };
            (listing.merge(detail), false)
        }
        Err(e) => {
            warn!(
                "Detail page {} unavailable ({}), keeping listing data for {:?}",
                url, e, listing.name
            );
            (listing, true)
        }
    };

    let outcome = emit(record, &dedup, sink.as_ref()).await?;
    Ok((outcome, detail_failed))
}

async fn emit<S: Sink + ?Sized>(
    record: GameRecord,
    dedup: &Deduplicator,
    sink: &S,
) -> Result<RowOutcome, CrawlerError> {
    if !dedup.admit(&record.name) {
        debug!("Drop duplicate {:?}", record.name);
        return Ok(RowOutcome::Dropped);
    }

    debug!("Insert Result\n{}", record);
    sink.write(record).await?;
    Ok(RowOutcome::Admitted)
}
