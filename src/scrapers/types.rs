use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::time::{Duration, Instant};

/// How a page should be loaded before it is handed to a processor
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// CSS selector that must be present before the page counts as loaded
    pub wait_for: &'static str,
    /// How long to wait for `wait_for` to appear
    pub wait_timeout: Duration,
    /// Upper bound on the DOM settle poll after `wait_for` appeared
    pub settle_max: Duration,
    /// Capture a PNG screenshot of the rendered page
    pub screenshot: bool,
    /// Point after which the request has been given up on; renderers that
    /// block should stop working by then
    pub deadline: Option<Instant>,
}

impl RenderOptions {
    pub fn new(wait_for: &'static str, settle_max: Duration) -> Self {
        Self {
            wait_for,
            wait_timeout: Duration::from_secs(30),
            settle_max,
            screenshot: false,
            deadline: None,
        }
    }

    pub fn with_screenshot(mut self, screenshot: bool) -> Self {
        self.screenshot = screenshot;
        self
    }

    /// Time left before the deadline, or an error once it has passed
    pub fn remaining(&self) -> Result<Option<Duration>> {
        match self.deadline {
            None => Ok(None),
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => Ok(Some(left)),
                _ => anyhow::bail!("Render deadline passed"),
            },
        }
    }

    /// `limit` shortened to what is left before the deadline
    pub fn budget(&self, limit: Duration) -> Result<Duration> {
        Ok(match self.remaining()? {
            Some(left) => limit.min(left),
            None => limit,
        })
    }
}

/// Image as laid out by the renderer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    /// Absolute source URL
    pub src: String,
    pub natural_width: Option<u32>,
    pub natural_height: Option<u32>,
}

/// A page after loading (and script execution, for renderers that run scripts)
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// Final URL after redirects
    pub url: String,
    pub html: String,
    /// Visible text of the body
    pub body_text: String,
    /// Images in document order
    pub images: Vec<ImageInfo>,
    pub screenshot: Option<Vec<u8>>,
}

impl RenderedPage {
    #[cfg(test)]
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            ..Self::default()
        }
    }
}
