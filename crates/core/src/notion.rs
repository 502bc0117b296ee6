use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{PodscriberError, Result};
use crate::types::{Episode, Insights, Recipe};

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion rich_text content is limited to 2000 characters per block.
const TEXT_LIMIT: usize = 2000;

/// Notion accepts at most 100 blocks per create/append call.
const BLOCK_LIMIT: usize = 100;

static EPISODE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Episode\s+\S+[\s:\-–]+").unwrap());

/// Create a Notion page for the episode and return its URL.
///
/// The database schema is topped up first; if that fails we fall back to
/// writing only the properties confirmed to exist (the mandatory title).
/// Content is submitted in 100-block batches, in order.
pub async fn create_episode_page(
    client: &reqwest::Client,
    episode: &Episode,
    insights: &Insights,
    database_id: &str,
    api_key: &str,
) -> Result<String> {
    let existing_props = ensure_database_properties(client, database_id, api_key).await;

    let properties = build_properties(episode, &existing_props);
    let all_blocks = build_blocks(episode, insights);
    let (first_batch, remaining) = block_batches(all_blocks);

    let response = client
        .post(format!("{NOTION_API}/pages"))
        .bearer_auth(api_key)
        .header("Notion-Version", NOTION_VERSION)
        .json(&json!({
            "parent": {"database_id": database_id},
            "properties": properties,
            "children": first_batch,
        }))
        .send()
        .await?;
    let body = check_notion(response, "page create").await?;

    let page_id = body["id"].as_str().ok_or_else(|| PodscriberError::PublishFailed {
        reason: format!("page create response has no id: {body}"),
    })?;
    let page_url = body["url"].as_str().unwrap_or_default().to_string();

    for batch in remaining {
        let response = client
            .patch(format!("{NOTION_API}/blocks/{page_id}/children"))
            .bearer_auth(api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({"children": batch}))
            .send()
            .await?;
        check_notion(response, "block append").await?;
    }

    Ok(page_url)
}

/// Add the extra properties to the database schema, returning the set of
/// property names that exist afterwards. A schema update failure is
/// downgraded to a warning; publishing proceeds with the title alone.
async fn ensure_database_properties(
    client: &reqwest::Client,
    database_id: &str,
    api_key: &str,
) -> HashSet<String> {
    let result = client
        .patch(format!("{NOTION_API}/databases/{database_id}"))
        .bearer_auth(api_key)
        .header("Notion-Version", NOTION_VERSION)
        .json(&json!({
            "properties": {
                "Episode Number": {"number": {}},
                "Published Date": {"date": {}},
                "Podcast Name": {"rich_text": {}},
                "Audio URL": {"url": {}},
                "Processed At": {"date": {}},
            }
        }))
        .send()
        .await;

    let body = match result {
        Ok(response) => check_notion(response, "schema update").await,
        Err(e) => Err(e.into()),
    };

    match body {
        Ok(body) => {
            let existing: HashSet<String> = body["properties"]
                .as_object()
                .map(|props| props.keys().cloned().collect())
                .unwrap_or_default();
            info!("Database properties: {:?}", {
                let mut sorted: Vec<_> = existing.iter().collect();
                sorted.sort();
                sorted
            });
            existing
        }
        Err(e) => {
            warn!(
                "Could not update database schema: {}. Will skip extra properties.",
                e
            );
            HashSet::new()
        }
    }
}

async fn check_notion(response: reqwest::Response, what: &str) -> Result<Value> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(PodscriberError::PublishFailed {
            reason: format!("{what}: status {status}: {body}"),
        });
    }
    Ok(response.json().await?)
}

/// Strip leading "Episode N:" / "Episode N -" style prefixes from RSS titles.
fn clean_title(title: &str) -> String {
    EPISODE_PREFIX.replace(title, "").trim().to_string()
}

fn build_properties(episode: &Episode, existing_props: &HashSet<String>) -> Value {
    let mut props = serde_json::Map::new();
    props.insert(
        "Name".to_string(),
        json!({"title": [{"text": {"content": truncate(&format!(
            "[Ep. {}] {}",
            episode.number,
            clean_title(&episode.title)
        ))}}]}),
    );

    let optional = [
        ("Episode Number", json!({"number": episode.number})),
        (
            "Published Date",
            json!({"date": {"start": episode.published.date_naive().to_string()}}),
        ),
        (
            "Podcast Name",
            json!({"rich_text": [{"text": {"content": truncate(&episode.podcast_name)}}]}),
        ),
        ("Audio URL", json!({"url": episode.audio_url})),
        (
            "Processed At",
            json!({"date": {"start": Utc::now().date_naive().to_string()}}),
        ),
    ];
    for (key, value) in optional {
        if existing_props.contains(key) {
            props.insert(key.to_string(), value);
        }
    }

    Value::Object(props)
}

fn build_blocks(episode: &Episode, insights: &Insights) -> Vec<Value> {
    let mut blocks = Vec::new();

    blocks.push(callout(&insights.episode_summary, "🍺"));
    blocks.push(divider());

    blocks.push(heading2("Brewing Techniques"));
    blocks.extend(bulleted_list(
        &insights.brewing_techniques,
        "No techniques specifically noted in this episode.",
    ));
    blocks.push(divider());

    blocks.push(heading2("Recipes"));
    if insights.recipes.is_empty() {
        blocks.push(paragraph("No recipes discussed in this episode."));
    } else {
        for recipe in &insights.recipes {
            blocks.extend(recipe_blocks(recipe));
        }
    }
    blocks.push(divider());

    blocks.push(heading2("Ingredients & Products Mentioned"));
    blocks.extend(bulleted_list(
        &insights.ingredients_and_products,
        "No specific ingredients or products mentioned.",
    ));
    blocks.push(divider());

    blocks.push(heading2("Business & Marketing Insights"));
    blocks.extend(bulleted_list(
        &insights.business_and_marketing,
        "No business or marketing insights in this episode.",
    ));
    blocks.push(divider());

    blocks.push(heading2("Key Takeaways"));
    blocks.extend(bulleted_list(
        &insights.key_takeaways,
        "No standout takeaways noted.",
    ));
    blocks.push(divider());

    blocks.push(heading3("Original Episode Description"));
    let desc = if episode.description.is_empty() {
        "No description available."
    } else {
        &episode.description
    };
    blocks.push(paragraph(desc));

    blocks
}

fn recipe_blocks(recipe: &Recipe) -> Vec<Value> {
    let mut blocks = vec![heading3(&recipe.name)];
    let mut details = Vec::new();

    if let Some(style) = &recipe.style {
        details.push(format!("Style: {style}"));
    }
    if let Some(og) = &recipe.og {
        details.push(format!("OG: {og}"));
    }
    if let Some(fg) = &recipe.fg {
        details.push(format!("FG: {fg}"));
    }
    if let Some(yeast) = &recipe.yeast {
        details.push(format!("Yeast: {yeast}"));
    }
    if let Some(grain_bill) = &recipe.grain_bill {
        details.push("Grain Bill:".to_string());
        details.extend(grain_bill.iter().map(|g| format!("  • {g}")));
    }
    if let Some(hop_schedule) = &recipe.hop_schedule {
        details.push("Hop Schedule:".to_string());
        details.extend(hop_schedule.iter().map(|h| format!("  • {h}")));
    }
    if let Some(notes) = &recipe.process_notes {
        details.push(format!("Process: {notes}"));
    }

    blocks.extend(bulleted_list(&details, ""));
    blocks
}

/// Split blocks into the creation batch and ordered follow-up batches.
fn block_batches(blocks: Vec<Value>) -> (Vec<Value>, Vec<Vec<Value>>) {
    let mut iter = blocks.into_iter();
    let first: Vec<Value> = iter.by_ref().take(BLOCK_LIMIT).collect();
    let remaining: Vec<Value> = iter.collect();
    let batches = remaining
        .chunks(BLOCK_LIMIT)
        .map(|chunk| chunk.to_vec())
        .collect();
    (first, batches)
}

/// Char-boundary-safe truncation to the Notion rich_text limit.
fn truncate(text: &str) -> &str {
    match text.char_indices().nth(TEXT_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn heading2(text: &str) -> Value {
    json!({"type": "heading_2", "heading_2": {"rich_text": [{"text": {"content": truncate(text)}}]}})
}

fn heading3(text: &str) -> Value {
    json!({"type": "heading_3", "heading_3": {"rich_text": [{"text": {"content": truncate(text)}}]}})
}

fn paragraph(text: &str) -> Value {
    json!({"type": "paragraph", "paragraph": {"rich_text": [{"text": {"content": truncate(text)}}]}})
}

fn callout(text: &str, emoji: &str) -> Value {
    json!({
        "type": "callout",
        "callout": {
            "icon": {"type": "emoji", "emoji": emoji},
            "rich_text": [{"text": {"content": truncate(text)}}],
        }
    })
}

fn divider() -> Value {
    json!({"type": "divider", "divider": {}})
}

fn bulleted_list(items: &[String], empty_text: &str) -> Vec<Value> {
    if items.is_empty() {
        return if empty_text.is_empty() {
            Vec::new()
        } else {
            vec![paragraph(empty_text)]
        };
    }
    items
        .iter()
        .map(|item| {
            json!({
                "type": "bulleted_list_item",
                "bulleted_list_item": {"rich_text": [{"text": {"content": truncate(item)}}]}
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn episode() -> Episode {
        Episode {
            number: 12,
            title: "Episode 12: Hazy Days".to_string(),
            published: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            audio_url: "http://x/12.mp3".to_string(),
            description: "All about haze.".to_string(),
            podcast_name: "Brew Banter".to_string(),
        }
    }

    #[test]
    fn title_prefix_is_stripped() {
        assert_eq!(clean_title("Episode 12: Hazy Days"), "Hazy Days");
        assert_eq!(clean_title("Episode 7 - Lager Time"), "Lager Time");
        assert_eq!(clean_title("episode 3: lowercase too"), "lowercase too");
        assert_eq!(clean_title("Just a Title"), "Just a Title");
    }

    #[test]
    fn truncation_is_char_boundary_safe() {
        let long = "🍺".repeat(TEXT_LIMIT + 100);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), TEXT_LIMIT);
        // Shorter text passes through untouched.
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn properties_respect_existing_schema() {
        let existing: HashSet<String> =
            ["Episode Number".to_string(), "Audio URL".to_string()].into();
        let props = build_properties(&episode(), &existing);
        let keys: Vec<&String> = props.as_object().unwrap().keys().collect();
        assert!(keys.contains(&&"Name".to_string()));
        assert!(keys.contains(&&"Episode Number".to_string()));
        assert!(!keys.contains(&&"Published Date".to_string()));

        let title = props["Name"]["title"][0]["text"]["content"].as_str().unwrap();
        assert_eq!(title, "[Ep. 12] Hazy Days");
    }

    #[test]
    fn empty_sections_get_placeholder_text() {
        let blocks = build_blocks(&episode(), &Insights::default());
        let paragraphs: Vec<&str> = blocks
            .iter()
            .filter_map(|b| b["paragraph"]["rich_text"][0]["text"]["content"].as_str())
            .collect();
        assert!(paragraphs.contains(&"No recipes discussed in this episode."));
        assert!(paragraphs.contains(&"No business or marketing insights in this episode."));
    }

    #[test]
    fn blocks_over_the_create_limit_split_into_ordered_batches() {
        let blocks: Vec<Value> = (0..250).map(|i| json!({"i": i})).collect();
        let (first, batches) = block_batches(blocks);
        assert_eq!(first.len(), 100);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 50);
        assert_eq!(first[0]["i"], 0);
        assert_eq!(batches[0][0]["i"], 100);
        assert_eq!(batches[1][49]["i"], 249);
    }

    #[test]
    fn under_limit_blocks_need_no_follow_up_batches() {
        let blocks: Vec<Value> = (0..30).map(|i| json!({"i": i})).collect();
        let (first, batches) = block_batches(blocks);
        assert_eq!(first.len(), 30);
        assert!(batches.is_empty());
    }
}
