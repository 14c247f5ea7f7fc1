mod config;
mod crawler;
mod dataset;
mod models;
mod router;
mod scrapers;
mod session;
mod urls;

use config::{RendererKind, RunConfig};
use crawler::{Crawler, Label, Request};
use dataset::Dataset;
use router::{ScreenshotWriter, TeamRouter};
use scrapers::{ChromeRenderer, HttpRenderer, PageRenderer};
use session::StubStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RunConfig::load().await?;

    info!("🏒 Starting MyHockeyRankings scraper...");
    info!("Target URL: {}", config.ranking_url);
    info!(
        "Max teams to scrape: {}",
        if config.max_teams == 0 {
            "unlimited".to_string()
        } else {
            config.max_teams.to_string()
        }
    );

    let renderer: Arc<dyn PageRenderer> = match config.renderer {
        RendererKind::Chrome => Arc::new(ChromeRenderer::new(config.headless)?),
        RendererKind::Http => Arc::new(HttpRenderer::new()?),
    };

    let dataset = Arc::new(Dataset::open(config.output_dir.join("datasets").join("default")).await?);
    let stubs = StubStore::new();
    let mut router = TeamRouter::new(stubs.clone(), Arc::clone(&dataset), config.max_teams);
    if let Some(path) = &config.screenshot_path {
        router = router.with_diagnostics(Arc::new(ScreenshotWriter::new(path)));
    }

    let crawler = Crawler::new(renderer, Arc::new(router), config.crawler.clone());
    let stats = crawler
        .run(vec![Request::new(&config.ranking_url, Label::RankingsPage)])
        .await;

    let teams = dataset.records();
    info!(
        "\n✅ Scraped {} of {} teams found in the rankings\n",
        dataset.len(),
        stubs.len()
    );

    for (i, team) in teams.iter().enumerate() {
        println!(
            "{}. {} (rank {}, rating {})",
            i + 1,
            team.team_name,
            team.rank.as_deref().unwrap_or("-"),
            team.rating.as_deref().unwrap_or("-")
        );
        if let Some(location) = &team.location {
            println!("   Location: {}", location);
        }
        if let Some(logo) = &team.logo_url {
            println!("   Logo: {}", logo);
        }
        println!("   URL: {}", team.team_url);
        println!();
    }

    // Save the whole dataset in one file
    let json = serde_json::to_string_pretty(&teams)?;
    let combined = config.output_dir.join("teams.json");
    tokio::fs::write(&combined, json).await?;
    info!("💾 Saved all teams to {}", combined.display());

    if let Some(finished_at) = stats.finished_at {
        let elapsed = finished_at - stats.started_at;
        info!(
            "Scraping completed in {}s ({} requests failed)",
            elapsed.num_seconds(),
            stats.requests_failed
        );
    }

    Ok(())
}
