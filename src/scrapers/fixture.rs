//! In-memory renderer serving fixture markup.

use crate::scrapers::http::static_page;
use crate::scrapers::traits::PageRenderer;
use crate::scrapers::types::{ImageInfo, RenderOptions, RenderedPage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct StaticRenderer {
    pages: HashMap<String, (String, Vec<ImageInfo>)>,
    redirects: HashMap<String, String>,
    renders: Mutex<HashMap<String, usize>>,
}

impl StaticRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.page_with_images(url, html, Vec::new())
    }

    pub fn page_with_images(mut self, url: &str, html: &str, images: Vec<ImageInfo>) -> Self {
        self.pages.insert(url.to_string(), (html.to_string(), images));
        self
    }

    /// Serve `to` whenever `from` is requested, reporting `to` as the final URL
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub fn render_count(&self, url: &str) -> usize {
        self.renders.lock().unwrap().get(url).copied().unwrap_or_default()
    }
}

#[async_trait]
impl PageRenderer for StaticRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
        *self.renders.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let final_url = self.redirects.get(url).map(String::as_str).unwrap_or(url);
        let (html, images) = self
            .pages
            .get(final_url)
            .with_context(|| format!("No fixture for {final_url}"))?;

        let mut page = static_page(final_url, html.clone(), options)?;
        if !images.is_empty() {
            page.images = images.clone();
        }
        if options.screenshot {
            page.screenshot = Some(b"\x89PNG fixture".to_vec());
        }
        Ok(page)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
