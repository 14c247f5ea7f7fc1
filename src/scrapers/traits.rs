use crate::scrapers::types::{RenderOptions, RenderedPage};
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for page loaders.
/// The crawler only needs a loaded page; whether scripts ran is up to the implementation.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Load `url`, wait per `options` and return the resulting page
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage>;

    /// Get the name of the renderer
    fn name(&self) -> &'static str;
}
