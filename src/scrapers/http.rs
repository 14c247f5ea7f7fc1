use crate::scrapers::traits::PageRenderer;
use crate::scrapers::types::{ImageInfo, RenderOptions, RenderedPage};
use crate::urls;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Plain HTTP renderer. Scripts do not run, so pages that build their
/// tables client-side come back without them.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .timeout(options.wait_timeout)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", url, response.status());
            anyhow::bail!("Failed to fetch {}: {}", url, response.status());
        }

        let final_url = response.url().to_string();
        let html = response.text().await.context("Failed to read response body")?;

        debug!("Downloaded {} bytes of HTML", html.len());

        static_page(&final_url, html, options)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Build a page from fetched markup. Fails when `options.wait_for` is absent,
/// which is the static equivalent of the element never appearing.
pub fn static_page(url: &str, html: String, options: &RenderOptions) -> Result<RenderedPage> {
    let document = Html::parse_document(&html);

    let wait_selector = Selector::parse(options.wait_for)
        .map_err(|e| anyhow::anyhow!("Invalid wait selector '{}': {:?}", options.wait_for, e))?;
    if document.select(&wait_selector).next().is_none() {
        anyhow::bail!("'{}' not present on {}", options.wait_for, url);
    }

    let body_selector = Selector::parse("body").unwrap();
    let body_text = document
        .select(&body_selector)
        .next()
        .map(|body| body.text().collect::<String>())
        .unwrap_or_default();

    let img_selector = Selector::parse("img").unwrap();
    let images = document
        .select(&img_selector)
        .map(|img| {
            let el = img.value();
            ImageInfo {
                src: el
                    .attr("src")
                    .and_then(|src| urls::resolve(url, src))
                    .unwrap_or_default(),
                natural_width: el.attr("width").and_then(|w| w.trim().parse().ok()),
                natural_height: el.attr("height").and_then(|h| h.trim().parse().ok()),
            }
        })
        .collect();

    Ok(RenderedPage {
        url: url.to_string(),
        html,
        body_text,
        images,
        screenshot: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_page_requires_wait_selector() {
        let options = RenderOptions::new("table", Duration::ZERO);
        let result = static_page(
            "https://example.com/rank.php",
            "<html><body><p>loading</p></body></html>".to_string(),
            &options,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_static_page_collects_images_and_text() {
        let options = RenderOptions::new("body", Duration::ZERO);
        let html = r#"<html><body>
            <p>Hello rink</p>
            <img src="/a.png" width="120" height="80">
            <img src="b.png" width="auto">
        </body></html>"#;

        let page = static_page("https://example.com/team/1", html.to_string(), &options).unwrap();

        assert!(page.body_text.contains("Hello rink"));
        assert_eq!(page.images.len(), 2);
        assert_eq!(page.images[0].src, "https://example.com/a.png");
        assert_eq!(page.images[0].natural_width, Some(120));
        assert_eq!(page.images[0].natural_height, Some(80));
        assert_eq!(page.images[1].src, "https://example.com/team/b.png");
        assert_eq!(page.images[1].natural_width, None);
        assert!(page.screenshot.is_none());
    }
}
