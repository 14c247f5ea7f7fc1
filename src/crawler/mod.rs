//! Small crawling engine: a de-duplicating request queue drained by a
//! bounded set of concurrent tasks, each rendering one page and passing it to
//! a [`RequestHandler`].

pub mod queue;

pub use queue::{Label, Request, RequestQueue};

use crate::scrapers::{PageRenderer, RenderOptions, RenderedPage};
use crate::urls;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Which discovered URLs may be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueStrategy {
    /// Only URLs on the hostname of the (post-redirect) page that found them
    SameHostname,
    All,
}

#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    pub max_concurrency: usize,
    /// Cap on distinct requests started; retries are not counted
    pub max_requests_per_crawl: usize,
    pub max_request_retries: u32,
    /// Covers rendering plus handling
    pub request_handler_timeout: Duration,
    pub enqueue_strategy: EnqueueStrategy,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_requests_per_crawl: 500,
            max_request_retries: 3,
            request_handler_timeout: Duration::from_secs(60),
            enqueue_strategy: EnqueueStrategy::SameHostname,
        }
    }
}

/// Handle given to a request handler for scheduling follow-up requests
#[derive(Debug, Clone)]
pub struct Enqueuer {
    queue: Arc<Mutex<RequestQueue>>,
    origin_host: Option<String>,
    strategy: EnqueueStrategy,
}

impl Enqueuer {
    fn new(queue: Arc<Mutex<RequestQueue>>, origin_url: &str, strategy: EnqueueStrategy) -> Self {
        Self {
            queue,
            origin_host: urls::hostname(origin_url),
            strategy,
        }
    }

    /// Enqueue `urls` under `label`; returns how many were actually added
    pub fn enqueue<I, S>(&self, urls: I, label: Label) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let mut added = 0;

        for url in urls {
            let url = url.as_ref();
            let Some(host) = urls::hostname(url) else {
                debug!(url, "Dropping unparseable URL");
                continue;
            };
            if self.strategy == EnqueueStrategy::SameHostname
                && self.origin_host.as_deref() != Some(host.as_str())
            {
                debug!(url, "Dropping URL on another host");
                continue;
            }
            if queue.add(Request::new(url, label)) {
                added += 1;
            }
        }

        added
    }
}

/// Everything a handler gets for one request
#[derive(Debug)]
pub struct CrawlContext {
    pub request: Request,
    pub page: RenderedPage,
    pub enqueuer: Enqueuer,
}

#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// How the page for `request` must be loaded
    fn render_options(&self, request: &Request) -> RenderOptions;

    /// Process a loaded page
    async fn handle(&self, ctx: CrawlContext) -> Result<()>;

    /// Called once a request has exhausted its retries
    fn failed(&self, request: &Request, error: &anyhow::Error);
}

#[derive(Debug, Clone)]
pub struct CrawlStats {
    pub requests_finished: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlStats {
    fn start() -> Self {
        Self {
            requests_finished: 0,
            requests_failed: 0,
            requests_retried: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

pub struct Crawler<H> {
    renderer: Arc<dyn PageRenderer>,
    handler: Arc<H>,
    options: CrawlerOptions,
}

impl<H: RequestHandler + 'static> Crawler<H> {
    pub fn new(renderer: Arc<dyn PageRenderer>, handler: Arc<H>, options: CrawlerOptions) -> Self {
        Self {
            renderer,
            handler,
            options,
        }
    }

    /// Crawl until the queue drains or the request cap is hit
    pub async fn run(&self, seeds: Vec<Request>) -> CrawlStats {
        let queue = Arc::new(Mutex::new(RequestQueue::new()));
        {
            let mut q = queue.lock().unwrap_or_else(|e| e.into_inner());
            for seed in seeds {
                q.add(seed);
            }
        }

        let mut stats = CrawlStats::start();
        let mut started = 0usize;
        let mut cap_logged = false;
        let mut tasks = JoinSet::new();

        info!(
            renderer = self.renderer.name(),
            max_concurrency = self.options.max_concurrency,
            max_requests = self.options.max_requests_per_crawl,
            "Crawl started"
        );

        loop {
            while tasks.len() < self.options.max_concurrency.max(1) {
                let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop();
                let Some(request) = next else { break };

                if request.retry_count == 0 {
                    if started >= self.options.max_requests_per_crawl {
                        if !cap_logged {
                            warn!(
                                max = self.options.max_requests_per_crawl,
                                "Reached maxRequestsPerCrawl, skipping remaining requests"
                            );
                            cap_logged = true;
                        }
                        continue;
                    }
                    started += 1;
                }

                self.spawn_task(&mut tasks, request, Arc::clone(&queue));
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            match joined {
                Ok((_, Ok(()))) => stats.requests_finished += 1,
                Ok((request, Err(e))) => {
                    if request.retry_count < self.options.max_request_retries {
                        warn!(
                            url = %request.url,
                            attempt = request.retry_count + 1,
                            error = %e,
                            "Request failed, retrying"
                        );
                        stats.requests_retried += 1;
                        queue.lock().unwrap_or_else(|e| e.into_inner()).retry(request);
                    } else {
                        self.handler.failed(&request, &e);
                        stats.requests_failed += 1;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Crawl task panicked");
                    stats.requests_failed += 1;
                }
            }
        }

        stats.finished_at = Some(Utc::now());
        info!(
            finished = stats.requests_finished,
            failed = stats.requests_failed,
            retried = stats.requests_retried,
            "Crawl finished"
        );
        stats
    }

    fn spawn_task(
        &self,
        tasks: &mut JoinSet<(Request, Result<()>)>,
        request: Request,
        queue: Arc<Mutex<RequestQueue>>,
    ) {
        let renderer = Arc::clone(&self.renderer);
        let handler = Arc::clone(&self.handler);
        let strategy = self.options.enqueue_strategy;
        let timeout = self.options.request_handler_timeout;

        // Request work runs in its own task so a panic comes back as an
        // error attributed to this request.
        let work_request = request.clone();
        let mut work = tokio::spawn(async move {
            let mut options = handler.render_options(&work_request);
            options.deadline = Some(Instant::now() + timeout);

            let page = renderer.render(&work_request.url, &options).await?;
            // Links are judged against where the page actually ended up
            let enqueuer = Enqueuer::new(queue, &page.url, strategy);
            handler
                .handle(CrawlContext {
                    request: work_request,
                    page,
                    enqueuer,
                })
                .await
        });

        tasks.spawn(async move {
            let result = match tokio::time::timeout(timeout, &mut work).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(anyhow!("Request task panicked: {e}")),
                Err(_) => {
                    work.abort();
                    Err(anyhow!(
                        "Request handler timed out after {} seconds",
                        timeout.as_secs()
                    ))
                }
            };

            (request, result)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::fixture::StaticRenderer;
    use scraper::{Html, Selector};

    /// Follows every link on a page as another rankings page
    #[derive(Default)]
    struct LinkFollower {
        handled: Mutex<Vec<String>>,
        failed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RequestHandler for LinkFollower {
        fn render_options(&self, _request: &Request) -> RenderOptions {
            RenderOptions::new("body", Duration::ZERO)
        }

        async fn handle(&self, ctx: CrawlContext) -> Result<()> {
            let links: Vec<String> = {
                let document = Html::parse_document(&ctx.page.html);
                let selector = Selector::parse("a").unwrap();
                document
                    .select(&selector)
                    .filter_map(|a| a.value().attr("href"))
                    .filter_map(|href| urls::resolve(&ctx.page.url, href))
                    .collect()
            };
            ctx.enqueuer.enqueue(links, Label::RankingsPage);
            self.handled.lock().unwrap().push(ctx.request.url);
            Ok(())
        }

        fn failed(&self, request: &Request, _error: &anyhow::Error) {
            self.failed.lock().unwrap().push(request.url.clone());
        }
    }

    fn options() -> CrawlerOptions {
        CrawlerOptions {
            max_concurrency: 2,
            ..CrawlerOptions::default()
        }
    }

    #[tokio::test]
    async fn test_follows_links_once_each() {
        let renderer = StaticRenderer::new()
            .page("https://a.test/1", r#"<a href="/2">2</a><a href="/3">3</a>"#)
            .page("https://a.test/2", r#"<a href="/3">3</a><a href="/1#top">1</a>"#)
            .page("https://a.test/3", r#"<a href="https://other.test/x">x</a>"#);
        let handler = Arc::new(LinkFollower::default());

        let crawler = Crawler::new(Arc::new(renderer), Arc::clone(&handler), options());
        let stats = crawler
            .run(vec![Request::new("https://a.test/1", Label::RankingsPage)])
            .await;

        let mut handled = handler.handled.lock().unwrap().clone();
        handled.sort();
        assert_eq!(handled, vec!["https://a.test/1", "https://a.test/2", "https://a.test/3"]);
        assert_eq!(stats.requests_finished, 3);
        assert_eq!(stats.requests_failed, 0);
        assert!(stats.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_all_hosts_strategy_follows_foreign_links() {
        let renderer = StaticRenderer::new()
            .page("https://a.test/1", r#"<a href="https://b.test/1">b</a>"#)
            .page("https://b.test/1", "<p>end</p>");
        let handler = Arc::new(LinkFollower::default());
        let options = CrawlerOptions {
            enqueue_strategy: EnqueueStrategy::All,
            ..options()
        };

        let stats = Crawler::new(Arc::new(renderer), Arc::clone(&handler), options)
            .run(vec![Request::new("https://a.test/1", Label::RankingsPage)])
            .await;

        assert_eq!(stats.requests_finished, 2);
    }

    #[tokio::test]
    async fn test_failed_request_retried_then_reported() {
        let renderer = Arc::new(StaticRenderer::new());
        let handler = Arc::new(LinkFollower::default());

        let crawler = Crawler::new(renderer.clone(), Arc::clone(&handler), options());
        let stats = crawler
            .run(vec![Request::new("https://a.test/missing", Label::TeamDetail)])
            .await;

        assert_eq!(stats.requests_retried, 3);
        assert_eq!(stats.requests_failed, 1);
        assert_eq!(renderer.render_count("https://a.test/missing"), 4);
        assert_eq!(*handler.failed.lock().unwrap(), vec!["https://a.test/missing".to_string()]);
    }

    #[tokio::test]
    async fn test_request_cap() {
        let renderer = StaticRenderer::new()
            .page("https://a.test/1", r#"<a href="/2">2</a><a href="/3">3</a>"#)
            .page("https://a.test/2", "<p>2</p>")
            .page("https://a.test/3", "<p>3</p>");
        let handler = Arc::new(LinkFollower::default());
        let options = CrawlerOptions {
            max_requests_per_crawl: 2,
            ..options()
        };

        let stats = Crawler::new(Arc::new(renderer), Arc::clone(&handler), options)
            .run(vec![Request::new("https://a.test/1", Label::RankingsPage)])
            .await;

        assert_eq!(stats.requests_finished, 2);
        assert_eq!(handler.handled.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_same_host_judged_after_redirect() {
        let renderer = StaticRenderer::new()
            .redirect("https://a.test/1", "https://www.a.test/1")
            .page("https://www.a.test/1", r#"<a href="/2">2</a>"#)
            .page("https://www.a.test/2", "<p>2</p>");
        let handler = Arc::new(LinkFollower::default());

        let stats = Crawler::new(Arc::new(renderer), Arc::clone(&handler), options())
            .run(vec![Request::new("https://a.test/1", Label::RankingsPage)])
            .await;

        assert_eq!(stats.requests_finished, 2);
        assert!(handler
            .handled
            .lock()
            .unwrap()
            .contains(&"https://www.a.test/2".to_string()));
    }

    /// Panics on every page
    #[derive(Default)]
    struct Exploding {
        failed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RequestHandler for Exploding {
        fn render_options(&self, _request: &Request) -> RenderOptions {
            RenderOptions::new("body", Duration::ZERO)
        }

        async fn handle(&self, _ctx: CrawlContext) -> Result<()> {
            panic!("handler bug");
        }

        fn failed(&self, request: &Request, _error: &anyhow::Error) {
            self.failed.lock().unwrap().push(request.url.clone());
        }
    }

    #[tokio::test]
    async fn test_panicking_handler_is_retried_and_reported() {
        let renderer = Arc::new(StaticRenderer::new().page("https://a.test/1", "<p>1</p>"));
        let handler = Arc::new(Exploding::default());

        let stats = Crawler::new(renderer.clone(), Arc::clone(&handler), options())
            .run(vec![Request::new("https://a.test/1", Label::TeamDetail)])
            .await;

        assert_eq!(stats.requests_failed, 1);
        assert_eq!(stats.requests_retried, 3);
        assert_eq!(renderer.render_count("https://a.test/1"), 4);
        assert_eq!(*handler.failed.lock().unwrap(), vec!["https://a.test/1".to_string()]);
    }

    /// Records the deadline each render was given
    #[derive(Default)]
    struct DeadlineRecorder {
        deadlines: Mutex<Vec<Option<Instant>>>,
    }

    #[async_trait]
    impl PageRenderer for DeadlineRecorder {
        async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
            self.deadlines.lock().unwrap().push(options.deadline);
            Ok(RenderedPage {
                url: url.to_string(),
                ..RenderedPage::default()
            })
        }

        fn name(&self) -> &'static str {
            "deadline-recorder"
        }
    }

    #[tokio::test]
    async fn test_render_gets_request_deadline() {
        let renderer = Arc::new(DeadlineRecorder::default());
        let handler = Arc::new(LinkFollower::default());
        let before = Instant::now();

        Crawler::new(renderer.clone(), handler, options())
            .run(vec![Request::new("https://a.test/1", Label::RankingsPage)])
            .await;

        let deadlines = renderer.deadlines.lock().unwrap().clone();
        assert_eq!(deadlines.len(), 1);
        let deadline = deadlines[0].expect("deadline set");
        assert!(deadline > before);
        assert!(deadline <= Instant::now() + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        struct Slow;

        #[async_trait]
        impl PageRenderer for Slow {
            async fn render(&self, _url: &str, _options: &RenderOptions) -> Result<RenderedPage> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(RenderedPage::default())
            }

            fn name(&self) -> &'static str {
                "slow"
            }
        }

        let handler = Arc::new(LinkFollower::default());
        let options = CrawlerOptions {
            max_request_retries: 0,
            request_handler_timeout: Duration::from_millis(50),
            ..options()
        };

        let stats = Crawler::new(Arc::new(Slow), Arc::clone(&handler), options)
            .run(vec![Request::new("https://a.test/1", Label::RankingsPage)])
            .await;

        assert_eq!(stats.requests_failed, 1);
        assert!(handler.handled.lock().unwrap().is_empty());
    }
}
