use crate::{
    config::{CrawlConfig, Readiness},
    CrawlerError, Fetcher,
};
use scraper::{Html, Selector};
use std::{collections::HashMap, sync::Arc};
use texting_robots::Robot;
use tokio::{
    sync::{Mutex, Semaphore},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

const RETRY_DELAY_MS: u64 = 500;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Fetches pages over HTTP with a concurrency cap, a minimum delay between
/// requests, retries with exponential backoff and optional robots.txt checks.
pub struct HttpFetcher {
    client: reqwest::Client,
    permits: Semaphore,
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
    retries: u32,
    user_agent: String,
    obey_robots: bool,
    // Parsed robots.txt per origin, `None` when everything is allowed.
    robots: Mutex<HashMap<String, Option<Arc<Robot>>>>,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<HttpFetcher, CrawlerError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(HttpFetcher {
            client,
            permits: Semaphore::new(config.concurrency.max(1)),
            request_delay: config.delay(),
            last_request: Mutex::new(None),
            retries: config.retries,
            user_agent: config.user_agent.clone(),
            obey_robots: config.obey_robots,
            robots: Mutex::new(HashMap::new()),
        })
    }

    async fn throttle(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = last_request.take() {
            let elapsed = Instant::now().duration_since(last);
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
        }
        last_request.replace(Instant::now());
    }

    async fn get(&self, url: &str) -> Result<String, CrawlerError> {
        self.throttle().await;
        debug!("Visit {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn get_ready(&self, url: &str, readiness: &Readiness) -> Result<String, CrawlerError> {
        match readiness {
            Readiness::NetworkIdle => self.get(url).await,
            Readiness::Selector {
                selector,
                timeout_ms,
            } => {
                let parsed = Selector::parse(selector)
                    .map_err(|_| CrawlerError::InvalidSelector(selector.clone()))?;
                let deadline = Instant::now() + Duration::from_millis(*timeout_ms);
                loop {
                    let body = self.get(url).await?;
                    if is_ready(&body, &parsed) {
                        return Ok(body);
                    }
                    if Instant::now() + POLL_INTERVAL > deadline {
                        return Err(CrawlerError::ReadinessTimeout {
                            url: url.to_string(),
                            selector: selector.clone(),
                            timeout_ms: *timeout_ms,
                        });
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn allowed(&self, url: &str) -> bool {
        let parsed = match reqwest::Url::parse(url) {
            Ok(u) => u,
            Err(_) => return true,
        };
        if parsed.host_str().is_none() {
            return true;
        }
        let origin = parsed.origin().ascii_serialization();

        let cached = self.robots.lock().await.get(&origin).cloned();
        let robot = match cached {
            Some(robot) => robot,
            None => {
                let robot = self.load_robots(&parsed).await.map(Arc::new);
                self.robots
                    .lock()
                    .await
                    .entry(origin)
                    .or_insert(robot)
                    .clone()
            }
        };
        robot.map(|r| r.allowed(url)).unwrap_or(true)
    }

    async fn load_robots(&self, page: &reqwest::Url) -> Option<Robot> {
        let robots_url = page.join("/robots.txt").ok()?;
        let _permit = self.permits.acquire().await.ok()?;
        self.throttle().await;

        let txt = match self.client.get(robots_url.as_str()).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            _ => String::new(),
        };
        debug!("Loaded {} ({} bytes)", robots_url, txt.len());
        parse_robots(&txt, &self.user_agent)
    }
}

fn is_ready(body: &str, selector: &Selector) -> bool {
    let doc = Html::parse_document(body);
    let found = doc.select(selector).next().is_some();
    found
}

/// A robots.txt that is missing or cannot be parsed allows everything.
pub(crate) fn parse_robots(robots_txt: &str, user_agent: &str) -> Option<Robot> {
    if robots_txt.trim().is_empty() {
        return None;
    }
    Robot::new(user_agent, robots_txt.as_bytes()).ok()
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, readiness: &Readiness) -> Result<String, CrawlerError> {
        if self.obey_robots && !self.allowed(url).await {
            return Err(CrawlerError::RobotsDisallowed(url.to_string()));
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| CrawlerError::InvalidConfig("fetcher closed".to_string()))?;

        let attempts = self.retries + 1;
        for attempt in 0..attempts {
            match self.get_ready(url, readiness).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    warn!(
                        "Request to {} failed: {}. Retrying (attempt {}/{})",
                        url,
                        e,
                        attempt + 1,
                        attempts
                    );
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "Request to {} failed: {}. Giving up after {} attempts",
                        url, e, attempts
                    );
                }
                Err(e) => return Err(e),
            }

            if attempt + 1 < attempts {
                let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(attempt));
                tokio::time::sleep(delay).await;
            }
        }

        Err(CrawlerError::RetriesExhausted {
            url: url.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;
    use std::sync::Mutex as StdMutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const ROBOTS: &str = "User-agent: *\nDisallow: /admin\n";
    const LOADING: &str = "<html><body><div>loading</div></body></html>";
    const READY: &str =
        "<html><body><table><tbody class=\"__TableItemsSwiper\"><tr><td>x</td></tr></tbody></table></body></html>";

    type Route = (&'static str, Vec<(u16, &'static str)>);

    /// Local HTTP server answering each path with its scripted responses in
    /// turn, repeating the last one. Unknown paths get a 404.
    struct Server {
        addr: SocketAddr,
        hits: Arc<StdMutex<Vec<String>>>,
    }

    impl Server {
        async fn start(routes: Vec<Route>) -> Server {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let routes: Arc<HashMap<&'static str, Vec<(u16, &'static str)>>> =
                Arc::new(routes.into_iter().collect());
            let hits = Arc::new(StdMutex::new(Vec::new()));

            let log = hits.clone();
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let routes = routes.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }
                        let head = String::from_utf8_lossy(&buf).to_string();
                        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                        let nth = {
                            let mut log = log.lock().unwrap();
                            log.push(path.clone());
                            log.iter().filter(|p| **p == path).count() - 1
                        };
                        let (status, body) = routes
                            .get(path.as_str())
                            .map(|r| r[nth.min(r.len() - 1)])
                            .unwrap_or((404, "not found"));
                        let response = format!(
                            "HTTP/1.1 {} Scripted\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            });

            Server { addr, hits }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        fn hits(&self, path: &str) -> usize {
            self.hits.lock().unwrap().iter().filter(|p| *p == path).count()
        }
    }

    fn fetcher(retries: u32, obey_robots: bool) -> HttpFetcher {
        HttpFetcher::new(&CrawlConfig {
            delay_ms: 0,
            retries,
            obey_robots,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_until_exhausted() {
        let server = Server::start(vec![("/busy", vec![(503, "busy")])]).await;

        let res = fetcher(2, false)
            .fetch(&server.url("/busy"), &Readiness::NetworkIdle)
            .await;
        assert!(matches!(
            res,
            Err(CrawlerError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(server.hits("/busy"), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let server =
            Server::start(vec![("/flaky", vec![(500, "oops"), (200, "<p>ok</p>")])]).await;

        let body = fetcher(2, false)
            .fetch(&server.url("/flaky"), &Readiness::NetworkIdle)
            .await
            .unwrap();
        assert_eq!(body, "<p>ok</p>");
        assert_eq!(server.hits("/flaky"), 2);
    }

    #[tokio::test]
    async fn test_not_found_fails_without_retry() {
        let server = Server::start(vec![]).await;

        let res = fetcher(2, false)
            .fetch(&server.url("/missing"), &Readiness::NetworkIdle)
            .await;
        assert!(matches!(
            res,
            Err(CrawlerError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(server.hits("/missing"), 1);
    }

    #[tokio::test]
    async fn test_disallowed_url_is_never_requested() {
        let server = Server::start(vec![
            ("/robots.txt", vec![(200, ROBOTS)]),
            ("/games", vec![(200, READY)]),
        ])
        .await;
        let fetcher = fetcher(2, true);

        let res = fetcher
            .fetch(&server.url("/admin/games"), &Readiness::NetworkIdle)
            .await;
        assert!(matches!(res, Err(CrawlerError::RobotsDisallowed(_))));
        assert_eq!(server.hits("/admin/games"), 0);

        assert!(fetcher
            .fetch(&server.url("/games"), &Readiness::NetworkIdle)
            .await
            .is_ok());
        assert_eq!(server.hits("/games"), 1);
        assert_eq!(server.hits("/robots.txt"), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_everything() {
        let server = Server::start(vec![("/admin", vec![(200, READY)])]).await;

        assert!(fetcher(0, true)
            .fetch(&server.url("/admin"), &Readiness::NetworkIdle)
            .await
            .is_ok());
        assert_eq!(server.hits("/robots.txt"), 1);
    }

    #[tokio::test]
    async fn test_selector_readiness_polls_until_match() {
        let server =
            Server::start(vec![("/slow", vec![(200, LOADING), (200, LOADING), (200, READY)])])
                .await;
        let readiness = Readiness::Selector {
            selector: "tbody.__TableItemsSwiper tr".to_string(),
            timeout_ms: 5000,
        };

        let body = fetcher(0, false)
            .fetch(&server.url("/slow"), &readiness)
            .await
            .unwrap();
        assert_eq!(body, READY);
        assert_eq!(server.hits("/slow"), 3);
    }

    #[tokio::test]
    async fn test_selector_readiness_times_out() {
        let server = Server::start(vec![("/never", vec![(200, LOADING)])]).await;
        let readiness = Readiness::Selector {
            selector: "tbody.__TableItemsSwiper tr".to_string(),
            timeout_ms: 700,
        };
        let fetcher = fetcher(0, false);

        let res = fetcher.get_ready(&server.url("/never"), &readiness).await;
        assert!(matches!(
            res,
            Err(CrawlerError::ReadinessTimeout { timeout_ms: 700, .. })
        ));
        assert_eq!(server.hits("/never"), 2);

        let res = fetcher.fetch(&server.url("/never"), &readiness).await;
        assert!(matches!(
            res,
            Err(CrawlerError::RetriesExhausted { attempts: 1, .. })
        ));
    }

    #[test]
    fn test_parse_robots() {
        let robot = parse_robots(ROBOTS, "playtoearn-crawler").unwrap();
        assert!(robot.allowed("https://playtoearn.com/blockchaingames?p=1"));
        assert!(!robot.allowed("https://playtoearn.com/admin/games"));
        assert!(parse_robots("", "playtoearn-crawler").is_none());
    }

    #[test]
    fn test_is_ready() {
        let selector = Selector::parse("tbody.__TableItemsSwiper tr").unwrap();
        assert!(is_ready(READY, &selector));
        assert!(!is_ready(LOADING, &selector));
    }

    #[test]
    fn test_transient_errors() {
        let status = |status| CrawlerError::HttpStatus {
            url: "https://playtoearn.com".to_string(),
            status,
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!CrawlerError::RobotsDisallowed("x".to_string()).is_transient());
    }
}
