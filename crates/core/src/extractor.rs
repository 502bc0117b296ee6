use serde_json::json;
use tracing::info;

use crate::error::{PodscriberError, Result};
use crate::types::{Episode, Insights};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-sonnet-4-6";
const MAX_TOKENS: u32 = 4096;

const SYSTEM_PROMPT: &str = "You are an expert homebrewing analyst and podcast content extractor.
Your task is to analyze podcast transcripts focused on brewing, homebrewing, and craft beer,
and extract structured insights that are valuable to homebrewers and craft beer professionals.

Be specific and practical. When extracting recipes, capture as many measurable details as
possible (grain weights, hop additions with timing and amounts, yeast strains, temperatures,
gravities). For techniques, describe the actual process steps, not just the name.

If a category has no relevant content in the episode, return an empty list for that field.
Do not fabricate information not present in the transcript.";

/// Send the transcript to the model and extract structured brewing insights.
///
/// The model is forced onto the `extract_brewing_insights` tool so the reply
/// always carries a JSON object in our schema; fields the model leaves out
/// deserialize to empty rather than failing the episode.
pub async fn extract_insights(
    client: &reqwest::Client,
    transcript: &str,
    episode: &Episode,
    api_key: &str,
) -> Result<Insights> {
    let user_message = format!(
        "Episode Title: {}\n\nEpisode Description:\n{}\n\nTranscript:\n{}\n\n\
         Please extract all brewing insights from this podcast episode using the \
         extract_brewing_insights tool.",
        episode.title, episode.description, transcript
    );

    info!("Sending transcript to the model for extraction");
    let response = client
        .post(MESSAGES_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&json!({
            "model": MODEL,
            "max_tokens": MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "tools": [extraction_tool()],
            "tool_choice": {"type": "tool", "name": "extract_brewing_insights"},
            "messages": [{"role": "user", "content": user_message}],
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(PodscriberError::ExtractionFailed {
            reason: format!("status {status}: {body}"),
        });
    }

    let body: serde_json::Value = response.json().await?;
    parse_tool_response(&body)
}

/// Pull the forced tool call's input out of a messages-API response.
fn parse_tool_response(body: &serde_json::Value) -> Result<Insights> {
    let tool_input = body["content"]
        .as_array()
        .and_then(|blocks| blocks.iter().find(|b| b["type"] == "tool_use"))
        .map(|block| block["input"].clone())
        .ok_or_else(|| PodscriberError::ExtractionFailed {
            reason: format!("no tool_use block in response: {body}"),
        })?;

    Ok(serde_json::from_value(tool_input)?)
}

/// The strict output schema the collaborator must honor.
fn extraction_tool() -> serde_json::Value {
    json!({
        "name": "extract_brewing_insights",
        "description": "Extract structured brewing insights from a podcast transcript",
        "input_schema": {
            "type": "object",
            "properties": {
                "episode_summary": {
                    "type": "string",
                    "description": "2-3 sentence summary of the episode covering the main topics discussed"
                },
                "brewing_techniques": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Specific brewing methods, processes, and tips mentioned. Each item is one technique described in 1-2 sentences."
                },
                "recipes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "style": {"type": "string"},
                            "grain_bill": {"type": "array", "items": {"type": "string"}},
                            "hop_schedule": {"type": "array", "items": {"type": "string"}},
                            "yeast": {"type": "string"},
                            "og": {"type": "string"},
                            "fg": {"type": "string"},
                            "process_notes": {"type": "string"}
                        },
                        "required": ["name"]
                    },
                    "description": "Any beer recipes discussed in the episode"
                },
                "ingredients_and_products": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Specific hops, malts, yeast strains, adjuncts, equipment brands, or products mentioned by name"
                },
                "business_and_marketing": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Insights on taproom strategy, branding, distribution, pricing, or sales"
                },
                "key_takeaways": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "The most important or memorable insights and direct quotes from the episode"
                }
            },
            "required": [
                "episode_summary",
                "brewing_techniques",
                "recipes",
                "ingredients_and_products",
                "business_and_marketing",
                "key_takeaways"
            ]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_use_block_is_found_among_other_content() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Extracting now."},
                {"type": "tool_use", "name": "extract_brewing_insights", "input": {
                    "episode_summary": "Decoction mashing deep dive.",
                    "brewing_techniques": ["Triple decoction for bocks"],
                    "recipes": [],
                    "ingredients_and_products": ["Pilsner malt"],
                    "key_takeaways": ["Decoction adds maltiness"]
                }}
            ]
        });

        let insights = parse_tool_response(&body).unwrap();
        assert_eq!(insights.episode_summary, "Decoction mashing deep dive.");
        assert_eq!(insights.ingredients_and_products, vec!["Pilsner malt"]);
        // Field missing from the model response defaults to empty.
        assert!(insights.business_and_marketing.is_empty());
    }

    #[test]
    fn missing_tool_use_block_is_an_extraction_error() {
        let body = json!({"content": [{"type": "text", "text": "refused"}]});
        let err = parse_tool_response(&body).unwrap_err();
        assert!(err.to_string().contains("no tool_use block"));
    }
}
