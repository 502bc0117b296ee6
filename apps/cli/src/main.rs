use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::error;
use tracing_subscriber::EnvFilter;

use podscriber_core::{Config, DEFAULT_LEDGER_FILE, Episode, Ledger, fetch_episodes};

use crate::pipeline::process_episode;

mod pipeline;

#[derive(Parser)]
#[command(name = "podscriber")]
#[command(about = "Transcribe podcast episodes and publish brewing insights to Notion")]
struct Cli {
    /// Process a specific episode number only
    #[arg(short, long)]
    episode: Option<u32>,

    /// Start batch from this episode number
    #[arg(long = "from")]
    from_episode: Option<u32>,

    /// Max number of unprocessed episodes to process
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Print what would be processed without calling APIs
    #[arg(long)]
    dry_run: bool,

    /// Override the RSS feed URL from the environment
    #[arg(long)]
    feed_url: Option<String>,

    /// Override the Notion database ID from the environment
    #[arg(long = "database")]
    database_id: Option<String>,
}

/// Batch selection: unprocessed episodes, floored by `from`, capped by `limit`.
fn select_unprocessed(
    episodes: &[Episode],
    ledger: &Ledger,
    from: Option<u32>,
    limit: Option<usize>,
) -> Vec<Episode> {
    let mut targets: Vec<Episode> = episodes
        .iter()
        .filter(|ep| !ledger.is_processed(ep.number))
        .filter(|ep| from.is_none_or(|n| ep.number >= n))
        .cloned()
        .collect();
    if let Some(limit) = limit {
        targets.truncate(limit);
    }
    targets
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("podscriber=info,podscriber_core=info")
        }))
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.feed_url.clone(), cli.database_id.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Configuration error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()?;

    let mut ledger = Ledger::load(DEFAULT_LEDGER_FILE)?;
    let episodes = fetch_episodes(&client, &config.rss_feed_url).await;

    if episodes.is_empty() {
        println!("No episodes found in feed.");
        return Ok(());
    }

    // --episode takes precedence over --from/--limit.
    let targets = if let Some(number) = cli.episode {
        let targets: Vec<Episode> = episodes
            .iter()
            .filter(|ep| ep.number == number)
            .cloned()
            .collect();
        if targets.is_empty() {
            eprintln!(
                "Episode {} not found. Feed has episodes 1-{}.",
                number,
                episodes.len()
            );
            std::process::exit(1);
        }
        targets
    } else {
        select_unprocessed(&episodes, &ledger, cli.from_episode, cli.limit)
    };

    if targets.is_empty() {
        println!(
            "All episodes already processed. ({} total)",
            ledger.count()
        );
        return Ok(());
    }

    println!(
        "\n{}  {}\n",
        style("podscriber").cyan().bold(),
        style("Podcast Insight Extractor").dim()
    );
    println!("Episodes to process: {}", targets.len());
    for ep in &targets {
        println!(
            "  [{}] {} ({})",
            ep.number,
            ep.title,
            style(ep.published.format("%Y-%m-%d")).dim()
        );
    }

    if cli.dry_run {
        println!("\nDry run - no API calls made.");
        return Ok(());
    }

    println!("{}", style("─".repeat(60)).dim());

    for ep in &targets {
        // A failed episode is logged and skipped; the batch keeps going and
        // the episode stays eligible for a future run.
        if let Err(e) = process_episode(&client, &config, ep, &mut ledger).await {
            error!("[Ep. {}] FAILED: {}", ep.number, e);
            eprintln!(
                "{} [Ep. {}] {}",
                style("✗").red().bold(),
                ep.number,
                style(&e).red()
            );
        }
    }

    println!(
        "\nDone. {} episodes processed total.",
        ledger.count()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn episode(number: u32) -> Episode {
        Episode {
            number,
            title: format!("Episode {number}"),
            published: Utc.with_ymd_and_hms(2024, 1, number, 0, 0, 0).unwrap(),
            audio_url: format!("http://x/{number}.mp3"),
            description: String::new(),
            podcast_name: "Brew Banter".to_string(),
        }
    }

    #[test]
    fn from_floor_and_limit_cap_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json")).unwrap();
        // Unprocessed set is {3, 5, 6, 7}.
        for n in [1, 2, 4] {
            ledger.mark_processed(n, "https://notion.so/x", "t").unwrap();
        }
        let episodes: Vec<Episode> = (1..=7).map(episode).collect();

        let targets = select_unprocessed(&episodes, &ledger, Some(5), Some(2));
        let numbers: Vec<u32> = targets.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![5, 6]);
    }

    #[test]
    fn no_filters_selects_every_unprocessed_episode() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json")).unwrap();
        ledger.mark_processed(2, "https://notion.so/2", "t").unwrap();
        let episodes: Vec<Episode> = (1..=3).map(episode).collect();

        let targets = select_unprocessed(&episodes, &ledger, None, None);
        let numbers: Vec<u32> = targets.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn second_run_with_everything_processed_selects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json")).unwrap();
        let episodes: Vec<Episode> = (1..=3).map(episode).collect();
        for ep in &episodes {
            ledger
                .mark_processed(ep.number, "https://notion.so/x", &ep.title)
                .unwrap();
        }

        assert!(select_unprocessed(&episodes, &ledger, None, None).is_empty());
    }
}
