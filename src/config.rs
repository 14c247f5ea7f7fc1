//! Run configuration: command line flags, environment and an optional JSON
//! input file.

use crate::crawler::{CrawlerOptions, EnqueueStrategy};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RANKING_URL: &str = "https://myhockeyrankings.com/rank.php?y=2025&v=123";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererKind {
    /// Headless Chrome, runs page scripts
    Chrome,
    /// Plain HTTP fetch
    Http,
}

/// Scrape hockey team rankings and team profiles
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Rankings page to start from
    #[arg(long, env = "RANKING_URL")]
    pub ranking_url: Option<String>,

    /// Teams to keep per rankings page (0 = all)
    #[arg(long, env = "MAX_TEAMS")]
    pub max_teams: Option<usize>,

    /// JSON input file with `rankingUrl` and `maxTeams`
    #[arg(short, long, env = "ACTOR_INPUT")]
    pub input: Option<PathBuf>,

    /// Directory for the dataset and the combined `teams.json`
    #[arg(short, long, default_value = "storage")]
    pub output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = RendererKind::Chrome)]
    pub renderer: RendererKind,

    #[arg(long, default_value_t = 4)]
    pub max_concurrency: usize,

    #[arg(long, default_value_t = 500)]
    pub max_requests_per_crawl: usize,

    #[arg(long, default_value_t = 3)]
    pub max_request_retries: u32,

    #[arg(long, default_value_t = 60)]
    pub request_handler_timeout_secs: u64,

    /// Follow links to any host instead of only the one they were found on
    #[arg(long)]
    pub all_hosts: bool,

    /// Where the team page debug screenshot goes
    #[arg(long, default_value = "team-page-debug.png")]
    pub screenshot_path: PathBuf,

    /// Skip debug screenshots
    #[arg(long)]
    pub no_screenshot: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

/// Input file shape
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActorInput {
    pub ranking_url: Option<String>,
    pub max_teams: Option<usize>,
}

impl ActorInput {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid input JSON")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read input file {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// Settings for one run, after merging all sources
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub ranking_url: String,
    pub max_teams: usize,
    pub output_dir: PathBuf,
    pub renderer: RendererKind,
    pub headless: bool,
    pub screenshot_path: Option<PathBuf>,
    pub crawler: CrawlerOptions,
}

impl RunConfig {
    /// Flags and environment take precedence over the input file
    pub fn resolve(cli: Cli, input: ActorInput) -> Self {
        let ranking_url = cli
            .ranking_url
            .or(input.ranking_url)
            .unwrap_or_else(|| DEFAULT_RANKING_URL.to_string());
        let max_teams = cli.max_teams.or(input.max_teams).unwrap_or(0);

        Self {
            ranking_url,
            max_teams,
            output_dir: cli.output_dir,
            renderer: cli.renderer,
            headless: !cli.headed,
            screenshot_path: (!cli.no_screenshot).then_some(cli.screenshot_path),
            crawler: CrawlerOptions {
                max_concurrency: cli.max_concurrency,
                max_requests_per_crawl: cli.max_requests_per_crawl,
                max_request_retries: cli.max_request_retries,
                request_handler_timeout: Duration::from_secs(cli.request_handler_timeout_secs),
                enqueue_strategy: if cli.all_hosts {
                    EnqueueStrategy::All
                } else {
                    EnqueueStrategy::SameHostname
                },
            },
        }
    }

    /// Parse flags and read the input file they point at
    pub async fn load() -> Result<Self> {
        let cli = Cli::parse();
        let input = match &cli.input {
            Some(path) => ActorInput::load(path).await?,
            None => ActorInput::default(),
        };
        Ok(Self::resolve(cli, input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["rink-rankings"]);
        let config = RunConfig::resolve(cli, ActorInput::default());

        assert_eq!(config.ranking_url, DEFAULT_RANKING_URL);
        assert_eq!(config.max_teams, 0);
        assert_eq!(config.renderer, RendererKind::Chrome);
        assert!(config.headless);
        assert_eq!(config.screenshot_path, Some(PathBuf::from("team-page-debug.png")));
        assert_eq!(config.crawler.max_requests_per_crawl, 500);
        assert_eq!(config.crawler.request_handler_timeout, Duration::from_secs(60));
        assert_eq!(config.crawler.enqueue_strategy, EnqueueStrategy::SameHostname);
    }

    #[test]
    fn test_input_file_fills_gaps() {
        let input = ActorInput::from_json(r#"{"rankingUrl": "https://example.com/rank.php", "maxTeams": 25}"#).unwrap();
        let cli = Cli::parse_from(["rink-rankings", "--max-teams", "5"]);
        let config = RunConfig::resolve(cli, input);

        assert_eq!(config.ranking_url, "https://example.com/rank.php");
        assert_eq!(config.max_teams, 5);
    }

    #[test]
    fn test_partial_input() {
        let input = ActorInput::from_json("{}").unwrap();
        assert_eq!(input, ActorInput::default());
        assert!(ActorInput::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "rink-rankings",
            "--renderer",
            "http",
            "--all-hosts",
            "--no-screenshot",
            "--headed",
            "-o",
            "/tmp/out",
        ]);
        let config = RunConfig::resolve(cli, ActorInput::default());

        assert_eq!(config.renderer, RendererKind::Http);
        assert_eq!(config.crawler.enqueue_strategy, EnqueueStrategy::All);
        assert!(config.screenshot_path.is_none());
        assert!(!config.headless);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }
}
