use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodscriberError {
    #[error("Missing required environment variables: {vars}")]
    MissingConfig { vars: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error(
        "Audio splitting requires ffmpeg on PATH. Install ffmpeg to process episodes over the transcription size limit."
    )]
    FfmpegMissing,

    #[error("Audio splitting failed for {path}: {reason}")]
    SplitFailed { path: PathBuf, reason: String },

    #[error("Transcription failed for {chunk}: {reason}")]
    TranscriptionFailed { chunk: PathBuf, reason: String },

    #[error("Insight extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("Notion publish failed: {reason}")]
    PublishFailed { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, PodscriberError>;
