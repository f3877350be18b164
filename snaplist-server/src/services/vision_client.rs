//! Vision model client
//!
//! Sends an inline image plus a text prompt to a vision-capable
//! text-generation backend and returns the free-form text it produced.
//! [`GeminiClient`] speaks the Gemini `generateContent` API; anything else can
//! plug in through [`VisionBackend`].

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("snaplist/", env!("CARGO_PKG_VERSION"));

/// Vision backend errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Vision request timed out")]
    Timeout,

    #[error("Vision backend rejected the API key")]
    Unauthorized,

    #[error("Vision backend quota exceeded")]
    QuotaExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// Content classification refused the image
    #[error("Content blocked: {0}")]
    Blocked(String),
}

impl RecognitionError {
    /// True when the backend refused the content rather than failing
    pub fn is_content_blocked(&self) -> bool {
        matches!(self, RecognitionError::Blocked(_))
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RecognitionError::Timeout
        } else {
            RecognitionError::NetworkError(err.to_string())
        }
    }
}

/// Vision-capable text generation backend
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Backend identifier for logs
    fn backend_id(&self) -> &'static str;

    /// Generate text for an image and prompt
    async fn generate(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, RecognitionError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Image { inline_data: InlineData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCandidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn build_request<'a>(image: &[u8], mime_type: &'a str, prompt: &'a str) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part::Image {
                    inline_data: InlineData {
                        mime_type,
                        data: general_purpose::STANDARD.encode(image),
                    },
                },
                Part::Text { text: prompt },
            ],
        }],
    }
}

/// Concatenated text of the first candidate
///
/// A block reason in the prompt feedback, or a first candidate stopped for
/// safety, is a content-classification failure. No candidates at all yields
/// empty text.
fn response_text(response: GenerateContentResponse) -> Result<String, RecognitionError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(RecognitionError::Blocked(reason));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(String::new());
    };

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(RecognitionError::Blocked("SAFETY".to_string()));
    }

    Ok(candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, RecognitionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RecognitionError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl VisionBackend for GeminiClient {
    fn backend_id(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, RecognitionError> {
        tracing::debug!(
            model = %self.model,
            mime_type = %mime_type,
            image_bytes = image.len(),
            "Querying vision backend"
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request(image, mime_type, prompt))
            .send()
            .await
            .map_err(RecognitionError::from_reqwest)?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(RecognitionError::Unauthorized);
        }

        if status == 429 {
            return Err(RecognitionError::QuotaExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecognitionError::ApiError(status.as_u16(), error_text));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RecognitionError::Timeout
            } else {
                RecognitionError::ParseError(e.to_string())
            }
        })?;

        let text = response_text(body)?;

        tracing::info!(
            model = %self.model,
            response_chars = text.len(),
            "Vision backend responded"
        );

        Ok(text)
    }
}
