use std::path::PathBuf;

use crate::error::{PodscriberError, Result};

const REQUIRED_VARS: [&str; 5] = [
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "NOTION_API_KEY",
    "NOTION_DATABASE_ID",
    "RSS_FEED_URL",
];

/// Runtime configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub notion_api_key: String,
    pub notion_database_id: String,
    pub rss_feed_url: String,
    pub temp_dir: PathBuf,
}

impl Config {
    /// Load and validate config from environment variables.
    ///
    /// All missing required variables are reported in a single error so the
    /// user can fix them in one pass. CLI overrides take precedence over the
    /// environment. The temp directory is created here.
    pub fn load(
        feed_url_override: Option<String>,
        database_id_override: Option<String>,
    ) -> Result<Config> {
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|var| {
                // An override satisfies the corresponding required variable.
                match *var {
                    "RSS_FEED_URL" if feed_url_override.is_some() => false,
                    "NOTION_DATABASE_ID" if database_id_override.is_some() => false,
                    _ => std::env::var(var).map(|v| v.is_empty()).unwrap_or(true),
                }
            })
            .collect();

        if !missing.is_empty() {
            return Err(PodscriberError::MissingConfig {
                vars: missing.join(", "),
            });
        }

        let temp_dir = std::env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("podscriber"));
        std::fs::create_dir_all(&temp_dir)?;

        Ok(Config {
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            notion_api_key: std::env::var("NOTION_API_KEY").unwrap_or_default(),
            notion_database_id: database_id_override
                .or_else(|| std::env::var("NOTION_DATABASE_ID").ok())
                .unwrap_or_default(),
            rss_feed_url: feed_url_override
                .or_else(|| std::env::var("RSS_FEED_URL").ok())
                .unwrap_or_default(),
            temp_dir,
        })
    }
}
