use crate::scrapers::traits::PageRenderer;
use crate::scrapers::types::{ImageInfo, RenderOptions, RenderedPage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Collects everything the processors need in one round trip
const SNAPSHOT_SCRIPT: &str = r#"
JSON.stringify({
    url: window.location.href,
    html: document.documentElement.outerHTML,
    bodyText: document.body ? document.body.innerText : '',
    images: Array.from(document.querySelectorAll('img')).map(img => ({
        src: img.src,
        naturalWidth: img.naturalWidth,
        naturalHeight: img.naturalHeight
    }))
})
"#;

const BODY_SIZE_SCRIPT: &str = "document.body ? document.body.innerHTML.length : 0";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    url: String,
    html: String,
    body_text: String,
    images: Vec<ImageInfo>,
}

/// Renderer backed by headless Chrome; one tab per page
pub struct ChromeRenderer {
    browser: Arc<Browser>,
}

impl ChromeRenderer {
    /// Launch Chrome
    pub fn new(headless: bool) -> Result<Self> {
        info!(headless, "Launching Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(headless)
            // The browser shuts itself down after this long without CDP traffic
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    fn render_blocking(browser: &Browser, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
        let tab = browser.new_tab().context("Failed to open tab")?;
        let result = Self::render_in_tab(&tab, url, options);

        if let Err(e) = tab.close(false) {
            warn!(url, error = %e, "Failed to close tab");
        }

        result
    }

    fn render_in_tab(tab: &Tab, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
        // Stop between steps once the request's deadline has passed
        options.remaining()?;
        tab.navigate_to(url)
            .with_context(|| format!("Failed to navigate to {url}"))?;
        tab.wait_until_navigated()
            .with_context(|| format!("Navigation to {url} did not finish"))?;

        tab.wait_for_element_with_custom_timeout(options.wait_for, options.budget(options.wait_timeout)?)
            .with_context(|| format!("'{}' never appeared on {url}", options.wait_for))?;

        wait_for_settle(tab, options.budget(options.settle_max)?);

        options.remaining()?;
        let value = tab
            .evaluate(SNAPSHOT_SCRIPT, false)
            .context("Failed to capture page snapshot")?
            .value
            .context("Snapshot script returned nothing")?;
        let raw = value.as_str().context("Snapshot script did not return a string")?;
        let snapshot: Snapshot = serde_json::from_str(raw).context("Malformed page snapshot")?;

        debug!(
            url = %snapshot.url,
            bytes = snapshot.html.len(),
            images = snapshot.images.len(),
            "Captured page"
        );

        let screenshot = if options.screenshot && options.remaining().is_ok() {
            match tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(url, error = %e, "Screenshot failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(RenderedPage {
            url: snapshot.url,
            html: snapshot.html,
            body_text: snapshot.body_text,
            images: snapshot.images,
            screenshot,
        })
    }
}

/// Poll the body's markup size until two consecutive samples agree or `max` elapses
fn wait_for_settle(tab: &Tab, max: Duration) {
    let started = Instant::now();
    let mut last: Option<u64> = None;

    while started.elapsed() < max {
        thread::sleep(SETTLE_POLL_INTERVAL);

        let size = tab
            .evaluate(BODY_SIZE_SCRIPT, false)
            .ok()
            .and_then(|r| r.value)
            .and_then(|v| v.as_u64());

        match (last, size) {
            (Some(prev), Some(now)) if prev == now => {
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, "DOM settled");
                return;
            }
            _ => last = size,
        }
    }

    debug!(max_ms = max.as_millis() as u64, "DOM still changing at settle cap");
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
        let browser = Arc::clone(&self.browser);
        let url = url.to_string();
        let options = options.clone();

        tokio::task::spawn_blocking(move || Self::render_blocking(&browser, &url, &options))
            .await
            .context("Render task panicked")?
    }

    fn name(&self) -> &'static str {
        "chrome"
    }
}
