use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::llm::LanguageModel;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub fn generate_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("build model http client")?;
        Ok(Self {
            client,
            endpoint: generate_endpoint(base_url, model),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
        });

        tracing::info!(model = %self.model, prompt_chars = prompt.chars().count(), "generate content");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read model response body")?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("model API error ({status}): {message}");
        }

        let value: serde_json::Value =
            serde_json::from_str(&raw).context("parse model response")?;
        extract_output_text(&value).context("extract output text")
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_output_text(value: &serde_json::Value) -> anyhow::Result<String> {
    let candidates = value
        .get("candidates")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("missing `candidates` array in response"))?;

    let Some(first) = candidates.first() else {
        let reason = value
            .pointer("/promptFeedback/blockReason")
            .and_then(|v| v.as_str())
            .unwrap_or("no candidates");
        anyhow::bail!("model returned no answer: {reason}");
    };

    let mut text = String::new();
    let parts = first
        .pointer("/content/parts")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    for part in parts {
        let Some(part_text) = part.get("text").and_then(|v| v.as_str()) else {
            continue;
        };
        text.push_str(part_text);
    }

    if text.trim().is_empty() {
        anyhow::bail!("model output text is empty");
    }
    Ok(text)
}
