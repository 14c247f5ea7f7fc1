//! Rankings table extraction.
//!
//! Pure functions over the rendered markup; scheduling lives in the router.

use crate::models::TeamStub;
use crate::urls;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;

fn rank_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+$").unwrap())
}

fn rating_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+\.[0-9]+$").unwrap())
}

/// What a rankings page yields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingsPage {
    /// Team rows in document order
    pub stubs: Vec<TeamStub>,
    /// Absolute URL of the next rankings page
    pub next_page: Option<String>,
    /// A next-page control exists but carries no link
    pub next_without_link: bool,
}

/// Extract team rows and pagination from a rankings page
pub fn parse_rankings(html: &str, page_url: &str) -> RankingsPage {
    let document = Html::parse_document(html);

    let stubs = extract_stubs(&document, page_url);
    let (next_page, next_without_link) = match find_next_page(&document, page_url) {
        NextControl::Link(url) => (Some(url), false),
        NextControl::Unlinked => (None, true),
        NextControl::Missing => (None, false),
    };

    RankingsPage {
        stubs,
        next_page,
        next_without_link,
    }
}

fn extract_stubs(document: &Html, page_url: &str) -> Vec<TeamStub> {
    let row_selector = Selector::parse("table tr").unwrap();
    let link_selector = Selector::parse(r#"a[href*="team"]"#).unwrap();
    let cell_selector = Selector::parse("td").unwrap();

    let mut stubs = Vec::new();

    for row in document.select(&row_selector) {
        let Some(link) = row.select(&link_selector).next() else {
            continue;
        };

        let href = link.value().attr("href").unwrap_or_default();
        let Some(team_url) = urls::resolve(page_url, href) else {
            debug!(href, "Skipping team link that does not resolve");
            continue;
        };

        let mut rank = None;
        let mut rating = None;
        for (index, cell) in row.select(&cell_selector).enumerate() {
            let text = element_text(&cell);
            if rating_pattern().is_match(&text) {
                rating = Some(text.clone());
            }
            if index == 0 && rank_pattern().is_match(&text) {
                rank = Some(text);
            }
        }

        stubs.push(TeamStub {
            team_name: element_text(&link),
            team_url,
            rating,
            rank,
        });
    }

    stubs
}

/// Keep the first `max_teams` stubs; 0 keeps everything
pub fn limit_teams(mut stubs: Vec<TeamStub>, max_teams: usize) -> Vec<TeamStub> {
    if max_teams > 0 {
        stubs.truncate(max_teams);
    }
    stubs
}

enum NextControl {
    Link(String),
    Unlinked,
    Missing,
}

fn find_next_page(document: &Html, page_url: &str) -> NextControl {
    let control_selector = Selector::parse("a, button").unwrap();
    let mut seen_unlinked = false;

    for control in document.select(&control_selector) {
        let el = control.value();
        let is_anchor = el.name() == "a";
        let says_next = element_text(&control).to_lowercase().contains("next");
        let has_next_class = is_anchor && el.classes().any(|class| class == "next");

        if !says_next && !has_next_class {
            continue;
        }

        match el.attr("href").and_then(|href| urls::resolve(page_url, href)) {
            Some(url) if is_anchor => return NextControl::Link(url),
            _ => seen_unlinked = true,
        }
    }

    if seen_unlinked {
        NextControl::Unlinked
    } else {
        NextControl::Missing
    }
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
