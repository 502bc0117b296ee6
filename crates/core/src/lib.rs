pub mod audio;
pub mod config;
pub mod error;
pub mod extractor;
pub mod feed;
pub mod ledger;
pub mod notion;
pub mod retry;
pub mod transcriber;
pub mod types;

pub use audio::{
    AudioCleanup, WHISPER_MAX_BYTES, cleanup_audio, download_audio, split_audio_if_needed,
};
pub use config::Config;
pub use error::{PodscriberError, Result};
pub use extractor::extract_insights;
pub use feed::fetch_episodes;
pub use ledger::{DEFAULT_LEDGER_FILE, Ledger, LedgerEntry};
pub use notion::create_episode_page;
pub use retry::RetryPolicy;
pub use transcriber::transcribe;
pub use types::{Episode, Insights, Recipe};
