//! Groq chat-completion client.
//!
//! Speaks the OpenAI-compatible chat completions API hosted at
//! `api.groq.com`. Transient failures (429 and 5xx) are retried with
//! exponential backoff up to the configured retry count.

use serde_json::{json, Value};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Result, StockRagError};

const CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Run one chat completion and return the assistant's message text.
pub async fn chat_completion(
    config: &LlmConfig,
    api_key: &str,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let payload = json!({
        "model": config.model,
        "temperature": config.temperature,
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": user_prompt },
        ],
    });

    let mut last_err: Option<StockRagError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let response = match client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        };

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            last_err = Some(StockRagError::Llm(format!(
                "Groq returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
            continue;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StockRagError::Llm(format!(
                "Groq returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let value: Value = response.json().await?;
        return parse_chat_response(&value);
    }

    Err(last_err.unwrap_or_else(|| StockRagError::Llm("chat completion failed".to_string())))
}

/// Pull the assistant message out of a chat completions response body.
fn parse_chat_response(value: &Value) -> Result<String> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            StockRagError::Llm(format!(
                "unexpected chat completion response: {}",
                value.to_string().chars().take(200).collect::<String>()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assistant_message() {
        let value = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Revenue grew 12%." } }
            ]
        });
        assert_eq!(parse_chat_response(&value).unwrap(), "Revenue grew 12%.");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let value = serde_json::json!({
            "choices": [{ "message": { "content": "  answer\n" } }]
        });
        assert_eq!(parse_chat_response(&value).unwrap(), "answer");
    }

    #[test]
    fn missing_choices_is_an_error() {
        let value = serde_json::json!({ "error": { "message": "bad key" } });
        let err = parse_chat_response(&value).unwrap_err();
        assert!(matches!(err, StockRagError::Llm(_)));
    }

    #[test]
    fn empty_content_is_an_error() {
        let value = serde_json::json!({
            "choices": [{ "message": { "content": "" } }]
        });
        assert!(parse_chat_response(&value).is_err());
    }
}
