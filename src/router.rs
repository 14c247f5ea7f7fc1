//! Routes crawl requests to the rankings and team detail processors.

use crate::crawler::{CrawlContext, Label, Request, RequestHandler};
use crate::dataset::Dataset;
use crate::models::TeamRecord;
use crate::scrapers::rankings::{limit_teams, parse_rankings};
use crate::scrapers::team_detail::extract_detail;
use crate::scrapers::{RenderOptions, RenderedPage};
use crate::session::StubStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const RANKINGS_SETTLE: Duration = Duration::from_secs(3);
const DETAIL_SETTLE: Duration = Duration::from_secs(2);
const LOGGED_SAMPLE_CHARS: usize = 200;

/// Called with every rendered team detail page
#[async_trait]
pub trait DiagnosticHook: Send + Sync {
    /// Whether pages handed to the hook need a screenshot
    fn wants_screenshot(&self) -> bool {
        false
    }

    async fn on_detail_page(&self, page: &RenderedPage);
}

/// Writes each detail page's screenshot to one fixed path
pub struct ScreenshotWriter {
    path: PathBuf,
}

impl ScreenshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DiagnosticHook for ScreenshotWriter {
    fn wants_screenshot(&self) -> bool {
        true
    }

    async fn on_detail_page(&self, page: &RenderedPage) {
        let Some(data) = &page.screenshot else {
            return;
        };

        match tokio::fs::write(&self.path, data).await {
            Ok(()) => debug!(path = %self.path.display(), url = %page.url, "Saved screenshot"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to save screenshot"),
        }
    }
}

pub struct TeamRouter {
    stubs: StubStore,
    dataset: Arc<Dataset>,
    max_teams: usize,
    diagnostics: Option<Arc<dyn DiagnosticHook>>,
}

impl TeamRouter {
    pub fn new(stubs: StubStore, dataset: Arc<Dataset>, max_teams: usize) -> Self {
        Self {
            stubs,
            dataset,
            max_teams,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, hook: Arc<dyn DiagnosticHook>) -> Self {
        self.diagnostics = Some(hook);
        self
    }

    async fn process_rankings(&self, ctx: CrawlContext) -> Result<()> {
        info!("Processing rankings page...");

        let parsed = parse_rankings(&ctx.page.html, &ctx.page.url);
        info!("Found {} teams on this page", parsed.stubs.len());

        let teams = limit_teams(parsed.stubs, self.max_teams);
        info!(
            "Processing {} teams (limit: {})",
            teams.len(),
            limit_label(self.max_teams)
        );

        let team_urls: Vec<String> = teams.iter().map(|t| t.team_url.clone()).collect();
        for stub in teams {
            if !self.stubs.insert(stub) {
                debug!("Team already captured from an earlier row");
            }
        }

        let added = ctx.enqueuer.enqueue(&team_urls, Label::TeamDetail);
        debug!(added, total = team_urls.len(), "Enqueued team detail pages");

        if let Some(next) = parsed.next_page {
            let queued = ctx.enqueuer.enqueue([next.as_str()], Label::RankingsPage) > 0;
            info!(next = %next, queued, "Found next rankings page");
        } else if parsed.next_without_link {
            debug!("Next control has no link, not paginating");
        }

        Ok(())
    }

    async fn process_detail(&self, ctx: CrawlContext) -> Result<()> {
        info!("Processing team detail page...");

        if let Some(hook) = &self.diagnostics {
            hook.on_detail_page(&ctx.page).await;
        }

        let extraction = extract_detail(&ctx.page);
        for line in &extraction.debug_info {
            debug!(url = %ctx.request.url, "{}", line);
        }

        let sample: String = extraction
            .page_text_sample
            .chars()
            .take(LOGGED_SAMPLE_CHARS)
            .collect();
        info!(
            url = %ctx.request.url,
            found_location = ?extraction.detail.full_location,
            found_logo = ?extraction.detail.logo_url,
            page_text_sample = %sample,
            "Team page debug info"
        );

        let stub = self.stubs.get(&ctx.request.url);
        let record = TeamRecord::merge(&ctx.request.url, stub.as_ref(), extraction.detail);

        info!(
            "Scraped: {} - {}, {} (logo: {})",
            record.team_name,
            record.city.as_deref().unwrap_or("null"),
            record.state.as_deref().unwrap_or("null"),
            if record.logo_url.is_some() { "found" } else { "not found" }
        );

        self.dataset
            .push(record)
            .await
            .context("Failed to store team record")
    }
}

fn limit_label(max_teams: usize) -> String {
    if max_teams == 0 {
        "none".to_string()
    } else {
        max_teams.to_string()
    }
}

#[async_trait]
impl RequestHandler for TeamRouter {
    fn render_options(&self, request: &Request) -> RenderOptions {
        match request.label {
            Label::RankingsPage => RenderOptions::new("table", RANKINGS_SETTLE),
            Label::TeamDetail => RenderOptions::new("body", DETAIL_SETTLE).with_screenshot(
                self.diagnostics
                    .as_ref()
                    .is_some_and(|hook| hook.wants_screenshot()),
            ),
        }
    }

    async fn handle(&self, ctx: CrawlContext) -> Result<()> {
        info!(url = %ctx.request.url, label = %ctx.request.label, "Processing");

        match ctx.request.label {
            Label::RankingsPage => self.process_rankings(ctx).await,
            Label::TeamDetail => self.process_detail(ctx).await,
        }
    }

    fn failed(&self, request: &Request, error: &anyhow::Error) {
        error!(error = %error, "Request {} failed multiple times", request.url);
    }
}
