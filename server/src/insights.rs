//! Generative-text client.
//!
//! One request per call, no retry. Callers turn any failure into the
//! "temporarily unavailable" message.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generator is not configured")]
    NotConfigured,
    #[error("generator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generator answered with status {0}")]
    Status(u16),
    #[error("generator response carried no text")]
    EmptyResponse,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

pub struct HttpTextGenerator {
    client: reqwest::Client,
    settings: GeneratorSettings,
}

impl HttpTextGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, settings })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(GenerationError::NotConfigured)?;
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };
        let response = self
            .client
            .post(self.url())
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status(status.as_u16()));
        }
        let payload: Value = response.json().await?;
        let text = response_text(&payload).ok_or(GenerationError::EmptyResponse)?;
        debug!(model = %self.settings.model, chars = text.len(), "text generated");
        Ok(text)
    }
}

/// `candidates[0].content.parts[0].text`, when present and non-blank.
fn response_text(payload: &Value) -> Option<String> {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::Uri};
    use serde_json::json;

    fn settings(endpoint: String, api_key: Option<&str>) -> GeneratorSettings {
        GeneratorSettings {
            endpoint,
            api_key: api_key.map(str::to_string),
            model: "test-model".into(),
        }
    }

    #[test]
    fn reads_first_candidate_text() {
        let payload = json!({
            "candidates": [{"content": {"parts": [{"text": " vip, renewal "}]}}]
        });
        assert_eq!(response_text(&payload).as_deref(), Some("vip, renewal"));
        assert_eq!(response_text(&json!({"candidates": []})), None);
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let generator =
            HttpTextGenerator::new(settings("http://127.0.0.1:9".into(), None)).unwrap();
        let err = generator.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured));
    }

    #[tokio::test]
    async fn posts_the_prompt_to_the_model_endpoint() {
        async fn echo(uri: Uri, Json(body): Json<Value>) -> Json<Value> {
            let prompt = body["contents"][0]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            Json(json!({
                "candidates": [{"content": {"parts": [{"text": format!("{} {}", uri, prompt)}]}}]
            }))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(echo))
                .await
                .unwrap();
        });

        let generator =
            HttpTextGenerator::new(settings(format!("http://{addr}/v1/"), Some("secret")))
                .unwrap();
        let text = generator.generate("hello").await.unwrap();
        assert_eq!(
            text,
            "/v1/models/test-model:generateContent?key=secret hello"
        );
    }
}
