//! Google Gemini backend for [`AnalysisModel`].
//!
//! One `generateContent` call per analysis: the prompt and the PNG travel
//! together as inline data, and the built-in search tool lets the hosted model
//! look up literature on its own.

use crate::model::{AnalysisModel, AnalysisReply, AnalysisRequest};
use crate::prompt::MARKDOWN_INSTRUCTION;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL_ID: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors raised while talking to the Gemini API.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("request to Gemini failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not decode Gemini response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("prompt was blocked by Gemini: {0}")]
    Blocked(String),

    #[error("Gemini returned no candidates")]
    NoCandidates,
}

/// Immutable settings for the Gemini client, fixed at process start.
#[derive(Clone)]
pub struct GeminiConfig {
    api_key: String,
    model_id: String,
    api_base: String,
    web_search: bool,
    timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            web_search: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn web_search(&self) -> bool {
        self.web_search
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL of the `generateContent` method for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model_id
        )
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("api_base", &self.api_base)
            .field("web_search", &self.web_search)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(alias = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(alias = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Builds the JSON body for one analysis call.
pub fn build_request(config: &GeminiConfig, prompt: &str, png: &[u8]) -> GenerateContentRequest {
    let image = Part {
        text: None,
        inline_data: Some(InlineData {
            mime_type: "image/png".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(png),
        }),
    };
    let text = Part {
        text: Some(prompt.to_string()),
        inline_data: None,
    };

    let tools = if config.web_search {
        vec![Tool {
            google_search: GoogleSearch {},
        }]
    } else {
        Vec::new()
    };

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: Some(MARKDOWN_INSTRUCTION.to_string()),
                inline_data: None,
            }],
        },
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![text, image],
        }],
        tools,
    }
}

/// Joins the text parts of the first candidate.
pub fn extract_text(response: GenerateContentResponse) -> Result<String, GeminiError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason);
        return match reason {
            Some(reason) => Err(GeminiError::Blocked(reason)),
            None => Err(GeminiError::NoCandidates),
        };
    };

    if let Some(reason) = &candidate.finish_reason {
        if reason != "STOP" {
            log::warn!("Gemini finished with reason {reason}");
        }
    }

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    Ok(text)
}

/// Turns a non-success body into the API's own message when it has one.
fn api_error(status: reqwest::StatusCode, body: &str) -> GeminiError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    GeminiError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Blocking Gemini client. Build it outside of any async runtime.
pub struct GeminiModel {
    config: GeminiConfig,
    client: reqwest::blocking::Client,
}

impl GeminiModel {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

impl AnalysisModel for GeminiModel {
    type Error = GeminiError;

    fn run(&mut self, request: AnalysisRequest<'_>) -> Result<AnalysisReply, Self::Error> {
        let png = std::fs::read(request.image_path)?;
        let body = build_request(&self.config, request.prompt, &png);

        log::debug!(
            "Calling {} with a {} byte image",
            self.config.model_id,
            png.len()
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(api_error(status, &text));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        let content = extract_text(parsed)?;
        Ok(AnalysisReply { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn parse(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn endpoint_uses_model_and_base() {
        let config = GeminiConfig::new("key")
            .with_api_base("http://localhost:8080/")
            .with_model("gemini-test");
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn debug_hides_api_key() {
        let config = GeminiConfig::new("super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn request_carries_prompt_image_and_search_tool() {
        let config = GeminiConfig::new("key");
        let body = serde_json::to_value(build_request(&config, "describe", &[1, 2, 3])).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            MARKDOWN_INSTRUCTION
        );
        assert_eq!(body["tools"], json!([{ "google_search": {} }]));
    }

    #[test]
    fn search_tool_can_be_disabled() {
        let config = GeminiConfig::new("key").with_web_search(false);
        let body = serde_json::to_value(build_request(&config, "describe", &[])).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn text_parts_are_joined() {
        let response = parse(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "## Findings\n" }, { "text": "clear" }] },
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_text(response).unwrap(), "## Findings\nclear");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let response = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(matches!(extract_text(response), Err(GeminiError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn missing_candidates_is_an_error() {
        let response = parse(json!({}));
        assert!(matches!(extract_text(response), Err(GeminiError::NoCandidates)));
    }

    #[test]
    fn candidate_without_content_is_empty_text() {
        let response = parse(json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] }));
        assert_eq!(extract_text(response).unwrap(), "");
    }

    #[test]
    fn api_error_prefers_message_field() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let err = api_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), "Gemini returned 400: API key not valid");

        let err = api_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.to_string(), "Gemini returned 502: upstream down");
    }
}
