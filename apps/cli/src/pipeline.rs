use std::time::{Duration, Instant};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use podscriber_core::{
    AudioCleanup, Config, Episode, Ledger, Result, RetryPolicy, create_episode_page,
    download_audio, extract_insights, split_audio_if_needed, transcribe,
};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{:.0}m {:.0}s", secs / 60.0, secs % 60.0)
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Drive one episode through download, transcription, extraction and
/// publication, then record it in the ledger.
///
/// The cleanup guard is armed before the first file lands on disk, so the
/// episode's audio is removed on success and on every failure path alike.
/// Returns the published page URL.
pub async fn process_episode(
    client: &reqwest::Client,
    config: &Config,
    episode: &Episode,
    ledger: &mut Ledger,
) -> Result<String> {
    info!("[Ep. {}] Starting: {}", episode.number, episode.title);
    let mut cleanup = AudioCleanup::new();
    let result = run_stages(client, config, episode, ledger, &mut cleanup).await;
    let had_audio = !cleanup.is_empty();
    drop(cleanup);
    if had_audio {
        info!("[Ep. {}] Audio cleaned up", episode.number);
    }
    result
}

async fn run_stages(
    client: &reqwest::Client,
    config: &Config,
    episode: &Episode,
    ledger: &mut Ledger,
    cleanup: &mut AudioCleanup,
) -> Result<String> {
    let step_start = Instant::now();
    let spinner = create_spinner(&format!("[Ep. {}] Downloading audio...", episode.number));
    let raw_path = download_audio(
        client,
        &episode.audio_url,
        &config.temp_dir,
        episode.number,
        RetryPolicy::default(),
    )
    .await?;
    cleanup.track(raw_path.clone());
    let chunks = split_audio_if_needed(&raw_path).await?;
    cleanup.track_all(&chunks);
    spinner.finish_with_message(format!(
        "{} [Ep. {}] Downloaded: {} chunk(s) {}",
        style("✓").green().bold(),
        episode.number,
        chunks.len(),
        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
    ));

    let step_start = Instant::now();
    let spinner = create_spinner(&format!(
        "[Ep. {}] Transcribing ({} chunk(s))...",
        episode.number,
        chunks.len()
    ));
    let transcript = transcribe(client, &chunks, &config.openai_api_key).await?;
    spinner.finish_with_message(format!(
        "{} [Ep. {}] Transcribed: {} characters {}",
        style("✓").green().bold(),
        episode.number,
        transcript.chars().count(),
        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
    ));

    let step_start = Instant::now();
    let spinner = create_spinner(&format!(
        "[Ep. {}] Extracting brewing insights...",
        episode.number
    ));
    let insights =
        extract_insights(client, &transcript, episode, &config.anthropic_api_key).await?;
    spinner.finish_with_message(format!(
        "{} [Ep. {}] Insights extracted {}",
        style("✓").green().bold(),
        episode.number,
        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
    ));

    let step_start = Instant::now();
    let spinner = create_spinner(&format!("[Ep. {}] Creating Notion page...", episode.number));
    let notion_url = create_episode_page(
        client,
        episode,
        &insights,
        &config.notion_database_id,
        &config.notion_api_key,
    )
    .await?;
    spinner.finish_with_message(format!(
        "{} [Ep. {}] Published: {} {}",
        style("✓").green().bold(),
        episode.number,
        style(&notion_url).cyan(),
        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
    ));

    // The ledger entry is the last step: an episode is "done" only once the
    // page exists and the record is flushed.
    ledger.mark_processed(episode.number, &notion_url, &episode.title)?;

    Ok(notion_url)
}
