use crate::answer::AnswerModel;
use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/";

// The key travels as a header and must never appear in the request URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
        }
    }

    /// Reads a key that may be unset or blank; blank keys count as unconfigured.
    pub fn from_optional_key(api_key: Option<&str>, model: &str) -> Option<Self> {
        let key = api_key.map(str::trim).filter(|key| !key.is_empty())?;
        Some(Self {
            model: model.to_string(),
            ..Self::new(key)
        })
    }
}

/// Answer model backed by the Gemini `generateContent` REST API.
pub struct GeminiModel {
    client: Client,
    config: GeminiConfig,
}

impl GeminiModel {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn request_url(&self) -> Result<Url, GenerationError> {
        Ok(Url::parse(&self.config.endpoint)?
            .join(&format!("models/{}:generateContent", self.config.model))?)
    }

    fn build_request_body(prompt: &str) -> Value {
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": prompt }],
                }
            ],
        })
    }
}

#[async_trait]
impl AnswerModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self.request_url()?;
        debug!(model = %self.config.model, "gemini request");

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&Self::build_request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        response_text(&payload)
    }
}

/// Concatenates the text parts of the first candidate.
fn response_text(payload: &Value) -> Result<String, GenerationError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            GenerationError::MalformedResponse("missing candidates[0].content.parts".to_string())
        })?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>();

    if text.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "candidate contained no text".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_targets_model_without_key() {
        let model = GeminiModel::new(GeminiConfig::new("secret"));
        let url = model.request_url().expect("url should build");

        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn connection_errors_do_not_reveal_the_api_key() {
        let model = GeminiModel::new(GeminiConfig {
            endpoint: "http://127.0.0.1:1/v1beta/".to_string(),
            ..GeminiConfig::new("SUPERSECRETKEY")
        });

        let error = model.generate("hi").await.expect_err("nothing listens on port 1");

        assert!(matches!(error, GenerationError::Http(_)));
        let rendered = format!("{error} {error:?}");
        assert!(!rendered.contains("SUPERSECRETKEY"));
    }

    #[test]
    fn request_body_wraps_prompt_as_user_content() {
        let body = GeminiModel::build_request_body("hello");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn response_text_joins_parts() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Revenue " }, { "text": "grew." }] }
            }]
        });
        assert_eq!(response_text(&payload).expect("text"), "Revenue grew.");
    }

    #[test]
    fn malformed_responses_are_errors() {
        assert!(matches!(
            response_text(&json!({"candidates": []})),
            Err(GenerationError::MalformedResponse(_))
        ));
        assert!(matches!(
            response_text(&json!({"candidates": [{"content": {"parts": [{}]}}]})),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn blank_keys_are_unconfigured() {
        assert!(GeminiConfig::from_optional_key(None, DEFAULT_GEMINI_MODEL).is_none());
        assert!(GeminiConfig::from_optional_key(Some("  "), DEFAULT_GEMINI_MODEL).is_none());
        let config = GeminiConfig::from_optional_key(Some("k"), "gemini-pro").expect("config");
        assert_eq!(config.model, "gemini-pro");
        assert_eq!(config.api_key, "k");
    }
}
