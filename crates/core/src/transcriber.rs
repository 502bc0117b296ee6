use std::path::PathBuf;

use tracing::info;

use crate::error::{PodscriberError, Result};

const TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Visible separator between chunk transcripts so chunk boundaries survive
/// into the final text.
const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Transcribe audio chunks in order via the Whisper API and return one
/// concatenated transcript.
///
/// The transcript content is passed through untouched; this adapter only
/// guarantees submission order and concatenation.
pub async fn transcribe(
    client: &reqwest::Client,
    chunks: &[PathBuf],
    api_key: &str,
) -> Result<String> {
    let mut transcripts = Vec::with_capacity(chunks.len());

    for (i, chunk) in chunks.iter().enumerate() {
        info!(
            "  Transcribing chunk {}/{}: {}",
            i + 1,
            chunks.len(),
            chunk.display()
        );
        transcripts.push(transcribe_chunk(client, chunk, api_key).await?);
    }

    Ok(join_transcripts(&transcripts))
}

async fn transcribe_chunk(
    client: &reqwest::Client,
    chunk: &PathBuf,
    api_key: &str,
) -> Result<String> {
    let file_name = chunk
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.mp3".to_string());
    let bytes = tokio::fs::read(chunk).await?;

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("audio/mpeg")?;
    let form = reqwest::multipart::Form::new()
        .text("model", "whisper-1")
        .text("response_format", "text")
        .part("file", part);

    let response = client
        .post(TRANSCRIPTION_URL)
        .bearer_auth(api_key)
        .multipart(form)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(PodscriberError::TranscriptionFailed {
            chunk: chunk.clone(),
            reason: format!("status {status}: {body}"),
        });
    }

    Ok(response.text().await?)
}

fn join_transcripts(transcripts: &[String]) -> String {
    transcripts.join(CHUNK_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_order_is_preserved_with_visible_separators() {
        let parts = vec![
            "first chunk".to_string(),
            "second chunk".to_string(),
            "third chunk".to_string(),
        ];
        assert_eq!(
            join_transcripts(&parts),
            "first chunk\n\n---\n\nsecond chunk\n\n---\n\nthird chunk"
        );
    }

    #[test]
    fn single_chunk_has_no_separator() {
        assert_eq!(join_transcripts(&["only".to_string()]), "only");
    }
}
