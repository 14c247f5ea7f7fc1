//! Team profile page heuristics: logo and "City, ST" location.

use crate::models::TeamDetail;
use crate::scrapers::types::{ImageInfo, RenderedPage};
use crate::urls;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Tried in order; the first selector matching any element ends the search
pub const LOGO_SELECTORS: &[&str] = &[
    r#"img[class*="logo"]"#,
    r#"img[class*="team"]"#,
    r#"img[alt*="logo"]"#,
    r#"img[alt*="team"]"#,
    ".logo img",
    ".team-logo img",
    ".team-info img",
    r#"meta[property="og:image"]"#,
];

/// Recorded for debugging only; never used for the location value
pub const LOCATION_HINT_SELECTORS: &[&str] = &[
    r#"[class*="location"]"#,
    r#"[class*="address"]"#,
    r#"[class*="city"]"#,
    r#"[class*="team-info"]"#,
    r#"meta[property="og:locality"]"#,
    r#"meta[property="og:region"]"#,
    "h1",
    "h2",
    "h3",
    ".info",
    ".details",
    ".profile",
];

/// "City, ST" then "City, State"
pub const LOCATION_PATTERNS: &[&str] = &[
    r"([A-Z][a-z\s]+),\s*([A-Z]{2})(?-u:\b)",
    r"([A-Z][a-z\s]+),\s*([A-Z][a-z]+)(?-u:\b)",
];

/// Accepted logo dimensions for the size fallback, inclusive
pub const LOGO_SIZE_RANGE: (u32, u32) = (50, 500);

const PAGE_TEXT_SAMPLE_CHARS: usize = 1000;
const HINT_TEXT_CHARS: usize = 100;
const MAX_LOCATION_CANDIDATE_CHARS: usize = 100;

fn location_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        LOCATION_PATTERNS
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect()
    })
}

/// A location found in page text
#[derive(Debug, Clone, PartialEq)]
pub struct LocationMatch {
    pub full: String,
    pub city: String,
    pub state: String,
}

/// Everything extracted from one detail page
#[derive(Debug, Clone, Default)]
pub struct DetailExtraction {
    pub detail: TeamDetail,
    pub debug_info: Vec<String>,
    pub page_text_sample: String,
}

/// Run all detail heuristics over a rendered page
pub fn extract_detail(page: &RenderedPage) -> DetailExtraction {
    let document = Html::parse_document(&page.html);
    let mut debug_info = Vec::new();

    let selected = match first_logo_match(&document, &page.url) {
        Some((selector, Some(url))) => {
            debug_info.push(format!("Found logo at {selector}: {url}"));
            Some(url)
        }
        Some((selector, None)) => {
            debug_info.push(format!("Logo element at {selector} has no URL"));
            None
        }
        None => None,
    };

    let logo_url = match selected {
        Some(url) => Some(url),
        None => logo_from_image_size(&page.images).map(|img| {
            debug_info.push(format!(
                "Found logo by size heuristic: {} ({}x{})",
                img.src,
                img.natural_width.unwrap_or_default(),
                img.natural_height.unwrap_or_default()
            ));
            img.src.clone()
        }),
    };

    debug_info.extend(location_hints(&document));

    let mut detail = TeamDetail {
        logo_url,
        ..TeamDetail::default()
    };
    if let Some((location, text)) = find_location(&document) {
        debug_info.push(format!("Matched pattern in: \"{text}\""));
        detail.full_location = Some(location.full);
        detail.city = Some(location.city);
        detail.state = Some(location.state);
    }

    DetailExtraction {
        detail,
        debug_info,
        page_text_sample: page.body_text.chars().take(PAGE_TEXT_SAMPLE_CHARS).collect(),
    }
}

/// The first of `LOGO_SELECTORS` that matches anything, with the URL its
/// first element carries (`None` when the element has no usable URL)
pub fn first_logo_match(document: &Html, page_url: &str) -> Option<(&'static str, Option<String>)> {
    LOGO_SELECTORS.iter().find_map(|&raw| {
        let selector = Selector::parse(raw).ok()?;
        let element = document.select(&selector).next()?;
        Some((raw, logo_url_of(element, page_url)))
    })
}

fn logo_url_of(element: ElementRef, page_url: &str) -> Option<String> {
    let el = element.value();

    match el.name() {
        "img" => el
            .attr("src")
            .filter(|src| !src.trim().is_empty())
            .and_then(|src| urls::resolve(page_url, src)),
        "meta" => el
            .attr("content")
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// First image whose natural size falls within `LOGO_SIZE_RANGE` on both axes
pub fn logo_from_image_size(images: &[ImageInfo]) -> Option<&ImageInfo> {
    let (min, max) = LOGO_SIZE_RANGE;
    let in_range = |v: Option<u32>| v.is_some_and(|v| (min..=max).contains(&v));

    images
        .iter()
        .find(|img| !img.src.is_empty() && in_range(img.natural_width) && in_range(img.natural_height))
}

/// Breadcrumbs for each location hint selector that matches something
pub fn location_hints(document: &Html) -> Vec<String> {
    LOCATION_HINT_SELECTORS
        .iter()
        .filter_map(|&raw| {
            let selector = Selector::parse(raw).ok()?;
            let element = document.select(&selector).next()?;
            let text = element.text().collect::<String>();
            let text = if text.is_empty() {
                element.value().attr("content").unwrap_or_default().to_string()
            } else {
                text
            };
            let sample: String = text.chars().take(HINT_TEXT_CHARS).collect();
            Some(format!("Found {raw}: {sample}"))
        })
        .collect()
}

/// Test the location patterns, in order, against one string
pub fn match_location(text: &str) -> Option<LocationMatch> {
    location_patterns().iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        Some(LocationMatch {
            full: caps.get(0)?.as_str().to_string(),
            city: caps.get(1)?.as_str().to_string(),
            state: caps.get(2)?.as_str().to_string(),
        })
    })
}

/// First `td`/`div`/`span` in document order whose trimmed text matches a
/// location pattern, returned with the text it matched in. Length limits
/// count UTF-16 code units, as browsers report string length.
pub fn find_location(document: &Html) -> Option<(LocationMatch, String)> {
    let candidate_selector = Selector::parse("td, div, span").unwrap();

    document
        .select(&candidate_selector)
        .map(|el| trimmed_text(&el))
        .filter(|text| {
            let len = text.encode_utf16().count();
            len > 0 && len < MAX_LOCATION_CANDIDATE_CHARS
        })
        .find_map(|text| match_location(&text).map(|m| (m, text)))
}

fn trimmed_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
