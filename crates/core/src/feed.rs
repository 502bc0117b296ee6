use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};
use regex::Regex;
use tracing::{info, warn};

use crate::types::Episode;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Fetch the RSS/Atom feed and return episodes sorted oldest-first with
/// stable 1..N numbering.
///
/// An unreachable or unparsable feed yields an empty list; the caller treats
/// that as "nothing to do" rather than an error.
pub async fn fetch_episodes(client: &reqwest::Client, url: &str) -> Vec<Episode> {
    info!("Fetching feed: {}", url);

    let body = match fetch_body(client, url).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Feed fetch error: {}", e);
            return Vec::new();
        }
    };

    parse_feed_bytes(&body)
}

async fn fetch_body(client: &reqwest::Client, url: &str) -> reqwest::Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Parse a raw feed document into numbered episodes.
pub fn parse_feed_bytes(bytes: &[u8]) -> Vec<Episode> {
    let feed = match feed_rs::parser::parse(bytes) {
        Ok(feed) => feed,
        Err(e) => {
            warn!("Feed parse error: {}", e);
            return Vec::new();
        }
    };

    episodes_from_feed(feed)
}

fn episodes_from_feed(feed: Feed) -> Vec<Episode> {
    let podcast_name = feed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Unknown Podcast".to_string());
    info!(
        "Podcast: {} - {} entries found",
        podcast_name,
        feed.entries.len()
    );

    let mut entries_with_audio: Vec<(Entry, String)> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let audio_url = extract_audio_url(&entry)?;
            Some((entry, audio_url))
        })
        .collect();

    // Oldest-first so numbering stays stable as new episodes are appended.
    // Entries without a publish time sort before everything else.
    entries_with_audio
        .sort_by_key(|(entry, _)| entry.published.unwrap_or(DateTime::<Utc>::UNIX_EPOCH));

    entries_with_audio
        .into_iter()
        .zip(1u32..)
        .map(|((entry, audio_url), number)| Episode {
            number,
            title: entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string()),
            published: entry.published.unwrap_or_else(Utc::now),
            audio_url,
            description: strip_html(
                &entry.summary.map(|s| s.content).unwrap_or_default(),
            ),
            podcast_name: podcast_name.clone(),
        })
        .collect()
}

/// Resolve the audio locator for a feed entry.
///
/// Prefers an enclosure whose declared media type starts with `audio/`,
/// falls back to a link explicitly marked `rel="enclosure"`. Entries that
/// resolve neither are dropped and consume no episode number.
fn extract_audio_url(entry: &Entry) -> Option<String> {
    for media in &entry.media {
        for content in &media.content {
            let is_audio = content
                .content_type
                .as_ref()
                .is_some_and(|mime| mime.to_string().starts_with("audio/"));
            if is_audio {
                if let Some(url) = &content.url {
                    return Some(url.to_string());
                }
            }
        }
    }

    entry
        .links
        .iter()
        .find(|link| link.rel.as_deref() == Some("enclosure"))
        .map(|link| link.href.clone())
}

fn strip_html(text: &str) -> String {
    HTML_TAG.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rss(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Brew Banter</title>{items}</channel></rss>"#
        )
    }

    fn item(title: &str, pub_date: &str, enclosure: Option<&str>) -> String {
        let enclosure = enclosure
            .map(|url| format!(r#"<enclosure url="{url}" type="audio/mpeg" length="1"/>"#))
            .unwrap_or_default();
        format!(
            "<item><title>{title}</title><pubDate>{pub_date}</pubDate>{enclosure}</item>"
        )
    }

    #[test]
    fn numbers_follow_publish_time_not_feed_order() {
        // Feed lists newest first: C, A, B with timestamps A < B < C.
        let feed = rss(&[
            item("C", "Wed, 03 Jan 2024 10:00:00 GMT", Some("http://x/c.mp3")),
            item("A", "Mon, 01 Jan 2024 10:00:00 GMT", Some("http://x/a.mp3")),
            item("B", "Tue, 02 Jan 2024 10:00:00 GMT", Some("http://x/b.mp3")),
        ]
        .join(""));

        let episodes = parse_feed_bytes(feed.as_bytes());
        let order: Vec<(u32, &str)> = episodes
            .iter()
            .map(|e| (e.number, e.title.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "A"), (2, "B"), (3, "C")]);
        assert_eq!(episodes[0].podcast_name, "Brew Banter");
    }

    #[test]
    fn entries_without_audio_consume_no_number() {
        let feed = rss(&[
            item("Audio 1", "Mon, 01 Jan 2024 10:00:00 GMT", Some("http://x/1.mp3")),
            item("Blog post", "Tue, 02 Jan 2024 10:00:00 GMT", None),
            item("Audio 2", "Wed, 03 Jan 2024 10:00:00 GMT", Some("http://x/2.mp3")),
        ]
        .join(""));

        let episodes = parse_feed_bytes(feed.as_bytes());
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].title, "Audio 1");
        assert_eq!(episodes[1].number, 2);
        assert_eq!(episodes[1].title, "Audio 2");
    }

    #[test]
    fn html_is_stripped_from_descriptions() {
        let feed = rss(
            "<item><title>Ep</title><pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>\
             <description>&lt;p&gt;Hops &amp;amp; &lt;b&gt;malt&lt;/b&gt;&lt;/p&gt;</description>\
             <enclosure url=\"http://x/e.mp3\" type=\"audio/mpeg\" length=\"1\"/></item>",
        );

        let episodes = parse_feed_bytes(feed.as_bytes());
        assert_eq!(episodes[0].description, "Hops &amp; malt");
    }

    #[test]
    fn link_marked_as_enclosure_is_a_fallback_locator() {
        let feed = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Brew Banter</title>
  <id>urn:feed</id>
  <updated>2024-01-01T10:00:00Z</updated>
  <entry>
    <title>A</title>
    <id>urn:a</id>
    <updated>2024-01-01T10:00:00Z</updated>
    <published>2024-01-01T10:00:00Z</published>
    <link rel="enclosure" href="http://x/a.m4a"/>
  </entry>
</feed>"#;

        let episodes = parse_feed_bytes(feed.as_bytes());
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].audio_url, "http://x/a.m4a");
    }

    #[test]
    fn unparsable_feed_yields_empty() {
        assert!(parse_feed_bytes(b"this is not xml").is_empty());
    }
}
