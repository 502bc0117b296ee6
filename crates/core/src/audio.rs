use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, info};

use crate::error::{PodscriberError, Result};
use crate::retry::RetryPolicy;

/// 24 MiB, leaving margin below the transcription API's 25 MB request limit.
pub const WHISPER_MAX_BYTES: u64 = 24 * 1024 * 1024;

/// Chunk length when an oversized file has to be split.
const CHUNK_SECONDS: u32 = 10 * 60;

/// Destination path for an episode download, deterministic in the episode
/// number so repeated attempts overwrite cleanly.
pub fn download_dest(temp_dir: &Path, url: &str, episode_number: u32) -> PathBuf {
    let path_part = url.split('?').next().unwrap_or(url);
    let ext = Path::new(path_part)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3");
    temp_dir.join(format!("episode_{episode_number}.{ext}"))
}

/// Stream-download the episode audio with bounded retries.
///
/// Any partial file from a previous attempt is removed before each retry so
/// a truncated transfer can never survive into transcription.
pub async fn download_audio(
    client: &reqwest::Client,
    url: &str,
    temp_dir: &Path,
    episode_number: u32,
    policy: RetryPolicy,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(temp_dir).await?;
    let dest = download_dest(temp_dir, url, episode_number);

    let result = policy
        .run("Download", |attempt| {
            let dest = dest.clone();
            async move {
                info!(
                    "Downloading audio to {} (attempt {}/{})",
                    dest.display(),
                    attempt,
                    policy.max_attempts
                );
                let _ = tokio::fs::remove_file(&dest).await;
                try_download(client, url, &dest).await
            }
        })
        .await;

    // The last attempt's partial file must not outlive a failed download.
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&dest).await;
        return Err(e);
    }

    let size = tokio::fs::metadata(&dest).await?.len();
    info!("Downloaded {:.1} MB", size as f64 / (1024.0 * 1024.0));
    Ok(dest)
}

/// Single download attempt with streaming and transfer-length validation.
async fn try_download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    let failed = |reason: String| PodscriberError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(format!("request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(failed(format!("status {}", response.status())));
    }

    let content_length = response.content_length();
    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(dest).await?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| failed(format!("stream error: {e}")))?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;

    if let Some(expected) = content_length {
        if downloaded != expected {
            return Err(failed(format!(
                "truncated transfer: got {downloaded} bytes, expected {expected}"
            )));
        }
    }

    Ok(())
}

/// Return `[path]` if the file fits the transcription limit, otherwise split
/// it into 10-minute re-encoded chunks and delete the original.
///
/// Splitting shells out to ffmpeg; a missing binary surfaces as
/// [`PodscriberError::FfmpegMissing`] so the operator can tell a setup
/// problem from a network one.
pub async fn split_audio_if_needed(audio_path: &Path) -> Result<Vec<PathBuf>> {
    let size = tokio::fs::metadata(audio_path).await?.len();
    if size <= WHISPER_MAX_BYTES {
        return Ok(vec![audio_path.to_path_buf()]);
    }

    info!(
        "File is {:.1} MB, over the 24 MB limit - splitting into chunks",
        size as f64 / (1024.0 * 1024.0)
    );

    let stem = audio_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("episode");
    let parent = audio_path.parent().unwrap_or_else(|| Path::new("."));
    let pattern = parent.join(format!("{stem}_chunk%03d.mp3"));

    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(audio_path)
        .arg("-f")
        .arg("segment")
        .arg("-segment_time")
        .arg(CHUNK_SECONDS.to_string())
        .arg("-vn")
        .arg("-acodec")
        .arg("libmp3lame")
        .arg(&pattern)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PodscriberError::FfmpegMissing
            } else {
                PodscriberError::IoError(e)
            }
        })?;

    if !output.status.success() {
        // ffmpeg may have written some chunks before dying; a stale leftover
        // would otherwise leak, and a later run would sweep it into its own
        // chunk list.
        remove_partial_chunks(parent, &format!("{stem}_chunk"));
        return Err(PodscriberError::SplitFailed {
            path: audio_path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let chunks = collect_chunks(parent, &format!("{stem}_chunk"))?;
    if chunks.is_empty() {
        return Err(PodscriberError::SplitFailed {
            path: audio_path.to_path_buf(),
            reason: "ffmpeg produced no chunk files".to_string(),
        });
    }
    for (i, chunk) in chunks.iter().enumerate() {
        let chunk_size = std::fs::metadata(chunk).map(|m| m.len()).unwrap_or(0);
        info!(
            "  Chunk {}: {} ({:.1} MB)",
            i,
            chunk.display(),
            chunk_size as f64 / (1024.0 * 1024.0)
        );
    }

    // Never keep the oversized original alongside its chunks.
    tokio::fs::remove_file(audio_path).await?;
    Ok(chunks)
}

/// Collect `{prefix}NNN.mp3` files in ordinal order.
fn collect_chunks(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut chunks: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".mp3"))
        })
        .collect();
    chunks.sort();
    Ok(chunks)
}

/// Delete whatever `{prefix}NNN.mp3` files a failed split left behind.
fn remove_partial_chunks(dir: &Path, prefix: &str) {
    if let Ok(partial) = collect_chunks(dir, prefix) {
        cleanup_audio(&partial);
    }
}

/// Delete audio files, tolerating ones that are already gone.
pub fn cleanup_audio(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Scoped cleanup of an episode's downloaded and chunked audio.
///
/// Dropping the guard deletes every tracked file, which makes cleanup hold
/// on success, stage failure, and early return alike without repeating
/// delete calls at each failure site.
#[derive(Debug, Default)]
pub struct AudioCleanup {
    paths: Vec<PathBuf>,
}

impl AudioCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a file for deletion on drop.
    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn track_all(&mut self, paths: &[PathBuf]) {
        self.paths.extend_from_slice(paths);
    }

    /// True while no file has been tracked yet.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for AudioCleanup {
    fn drop(&mut self) {
        cleanup_audio(&self.paths);
    }
}
