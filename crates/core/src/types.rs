use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audio-bearing entry from the podcast feed, numbered 1..N oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub number: u32,
    pub title: String,
    pub published: DateTime<Utc>,
    pub audio_url: String,
    pub description: String,
    pub podcast_name: String,
}

/// Structured output of the extraction step.
///
/// Every field defaults to empty so a partial model response never fails
/// deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub episode_summary: String,
    #[serde(default)]
    pub brewing_techniques: Vec<String>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub ingredients_and_products: Vec<String>,
    #[serde(default)]
    pub business_and_marketing: Vec<String>,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
}

/// A beer recipe mentioned in an episode. Only the name is guaranteed;
/// `None` means the detail was not mentioned, not that it was empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grain_bill: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop_schedule: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yeast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insights_tolerate_missing_fields() {
        let json = r#"{
            "episode_summary": "A chat about hazy IPAs.",
            "brewing_techniques": ["Double dry hop at day 3"],
            "recipes": [{"name": "Haze Craze", "style": "NEIPA"}]
        }"#;
        let insights: Insights = serde_json::from_str(json).unwrap();
        assert_eq!(insights.episode_summary, "A chat about hazy IPAs.");
        assert_eq!(insights.brewing_techniques.len(), 1);
        assert!(insights.business_and_marketing.is_empty());
        assert!(insights.key_takeaways.is_empty());
        assert!(insights.ingredients_and_products.is_empty());
    }

    #[test]
    fn recipe_optional_fields_default_to_none() {
        let recipe: Recipe = serde_json::from_str(r#"{"name": "House Saison"}"#).unwrap();
        assert_eq!(recipe.name, "House Saison");
        assert!(recipe.style.is_none());
        assert!(recipe.grain_bill.is_none());
        assert!(recipe.process_notes.is_none());
    }
}
