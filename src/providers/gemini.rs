//! Gemini provider implementation using the `generateContent` API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    check_http_response, CompletionRequest, CompletionResponse, LlmProvider, Part, ProviderError,
    Role, UsageStats,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;
const JSON_MIME_TYPE: &str = "application/json";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// `generateContent` request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation contents.
    pub contents: Vec<GeminiContent>,
    /// Optional system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    /// Sampling and output configuration.
    pub generation_config: GeminiGenerationConfig,
}

/// A content entry in Gemini format.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    /// Role: "user" or "model". Absent on system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A content part in Gemini format.
#[doc(hidden)]
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    /// Text payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiInlineData>,
    /// Set on reasoning summaries, which are not part of the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

/// Inline binary data.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    /// MIME type.
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

/// Generation configuration block.
#[doc(hidden)]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum output tokens.
    pub max_output_tokens: u32,
    /// Output MIME type, set to JSON in structured mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// Output schema in structured mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    /// Reasoning budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<GeminiThinkingConfig>,
}

/// Reasoning configuration.
#[doc(hidden)]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiThinkingConfig {
    /// Reasoning token budget.
    pub thinking_budget: u32,
}

/// `generateContent` response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Candidate completions; only the first is used.
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Token usage.
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsage>,
    /// Model version that served the request.
    #[serde(default)]
    pub model_version: Option<String>,
    /// Present when the prompt itself was blocked.
    #[serde(default)]
    pub prompt_feedback: Option<Value>,
}

/// A response candidate.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// Candidate content.
    #[serde(default)]
    pub content: Option<GeminiContent>,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Usage metadata.
#[doc(hidden)]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_token_count: u32,
    /// Candidate tokens.
    #[serde(default)]
    pub candidates_token_count: u32,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Gemini `generateContent` provider.
#[derive(Clone)]
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider against the public Gemini endpoint.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, GEMINI_API_BASE.to_owned())
    }

    /// Create a provider against a custom endpoint (proxies, local fakes).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Endpoint URL for a model.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/{model}:generateContent", self.base_url)
    }
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a Gemini request body from a completion request.
#[doc(hidden)]
pub fn build_request(request: &CompletionRequest) -> GeminiRequest {
    let contents = request
        .contents
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::User => "user",
                Role::Model => "model",
            };
            GeminiContent {
                role: Some(role.to_owned()),
                parts: msg.parts.iter().map(part_to_wire).collect(),
            }
        })
        .collect();

    let system_instruction = request.system.as_ref().map(|system| GeminiContent {
        role: None,
        parts: vec![GeminiPart {
            text: Some(system.clone()),
            ..GeminiPart::default()
        }],
    });

    let config = &request.config;
    let structured = config.structured_output.is_some();

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: GeminiGenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            response_mime_type: structured.then(|| JSON_MIME_TYPE.to_owned()),
            response_schema: config.structured_output.clone(),
            thinking_config: config
                .reasoning_budget
                .map(|thinking_budget| GeminiThinkingConfig { thinking_budget }),
        },
    }
}

/// Parse a Gemini response body into a completion response.
///
/// Reasoning parts flagged with `thought` are dropped; the remaining text
/// parts of the first candidate are concatenated.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body cannot be deserialized or
/// carries no usable candidate.
#[doc(hidden)]
pub fn parse_response(body: &str, requested_model: &str) -> Result<CompletionResponse, ProviderError> {
    let resp: GeminiResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no feedback".to_owned());
        return Err(ProviderError::Parse(format!(
            "response contained no candidates ({reason})"
        )));
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought.unwrap_or(false))
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_owned());
        return Err(ProviderError::Parse(format!(
            "candidate contained no text (finish reason {reason})"
        )));
    }

    let usage = resp.usage_metadata.unwrap_or_default();

    Ok(CompletionResponse {
        text,
        model: resp
            .model_version
            .unwrap_or_else(|| requested_model.to_owned()),
        usage: UsageStats {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        },
    })
}

fn part_to_wire(part: &Part) -> GeminiPart {
    match part {
        Part::Text { text } => GeminiPart {
            text: Some(text.clone()),
            ..GeminiPart::default()
        },
        Part::InlineData { mime_type, data } => GeminiPart {
            inline_data: Some(GeminiInlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
            ..GeminiPart::default()
        },
    }
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Unavailable(
                "Gemini API key is not configured".to_owned(),
            ));
        }

        let api_request = build_request(&request);

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_response(&payload, &request.model)
    }

    fn supports_structured_output(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
