pub mod browser;
pub mod http;
pub mod rankings;
pub mod team_detail;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod fixture;

pub use browser::ChromeRenderer;
pub use http::HttpRenderer;
pub use traits::PageRenderer;
pub use types::{RenderOptions, RenderedPage};
