use clap::Parser;
use playtoearn_crawler::fetcher::HttpFetcher;
use playtoearn_crawler::playtoearn::{PlayToEarnCrawler, PlayToEarnData};
use playtoearn_crawler::sink::CsvSink;
use playtoearn_crawler::{run_crawler, CrawlConfig, Field, Sink};
use std::path::PathBuf;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

/// Crawl the playtoearn.com blockchain game catalog into a CSV file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON file with crawl settings; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First listing page
    #[arg(long)]
    start: Option<u32>,

    /// Last listing page (inclusive)
    #[arg(long)]
    end: Option<u32>,

    /// CSV output path
    #[arg(short, long)]
    output: Option<String>,

    /// Also store games in `<NAME>.db`
    #[arg(long, value_name = "NAME")]
    sqlite: Option<String>,

    /// Maximum requests in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Minimum delay between requests in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Retries per request after the first attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Do not consult robots.txt
    #[arg(long)]
    ignore_robots: bool,

    /// Comma separated output columns, e.g. Name,Blockchain,P2E_Score
    #[arg(long, value_delimiter = ',')]
    columns: Vec<Field>,
}

impl Args {
    fn into_config(self) -> Result<CrawlConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => CrawlConfig::from_json_file(path)?,
            None => CrawlConfig::default(),
        };

        if let Some(start) = self.start {
            config.start_page = start;
        }
        if let Some(end) = self.end {
            config.end_page = end;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if self.sqlite.is_some() {
            config.sqlite = self.sqlite;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.delay_ms = delay_ms;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if self.ignore_robots {
            config.obey_robots = false;
        }
        if !self.columns.is_empty() {
            config.columns = self.columns;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "debug,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let config = Args::parse().into_config()?;

    let mut sinks: Vec<Box<dyn Sink + Send + Sync>> = vec![Box::new(CsvSink::create(
        &config.output,
        config.columns.clone(),
    )?)];
    if let Some(name) = &config.sqlite {
        sinks.push(Box::new(PlayToEarnData::new(name).await?));
    }

    let crawler = PlayToEarnCrawler::new(config.base_url.as_str());
    let fetcher = HttpFetcher::new(&config)?;

    let stats = run_crawler(crawler, fetcher, sinks, &config).await?;
    info!("Wrote {} games to {}", stats.admitted, config.output);

    Ok(())
}
