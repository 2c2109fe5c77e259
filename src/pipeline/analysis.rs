//! Parsing of structured document-analysis responses.
//!
//! Malformed output never fails the call: each field falls back to its
//! default on its own, so a garbled response still yields a usable result.

use serde_json::{json, Map, Value};
use tracing::warn;

use super::types::{ArtifactKind, DocumentAnalysisResult};

/// Prompt returned when the analysis response carried no usable prompt.
pub const DOCUMENT_ANALYSIS_FAILED_NOTICE: &str =
    "The document could not be analysed automatically. Describe the indicator or strategy you want to build.";

const DEFAULT_ARTIFACT_KIND: ArtifactKind = ArtifactKind::Indicator;
const DEFAULT_OVERLAY: bool = true;

impl Default for DocumentAnalysisResult {
    fn default() -> Self {
        Self {
            artifact_kind: DEFAULT_ARTIFACT_KIND,
            overlay: DEFAULT_OVERLAY,
            generated_prompt: DOCUMENT_ANALYSIS_FAILED_NOTICE.to_owned(),
        }
    }
}

/// JSON schema requested from the completion service in structured mode.
pub fn document_analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "artifactKind": { "type": "string", "enum": ["strategy", "indicator"] },
            "overlay": { "type": "boolean" },
            "generatedPrompt": { "type": "string" }
        },
        "required": ["artifactKind", "overlay", "generatedPrompt"]
    })
}

/// Parse a document-analysis response, substituting defaults field by field.
pub fn parse_document_analysis(raw: &str) -> DocumentAnalysisResult {
    let object = match serde_json::from_str::<Value>(strip_json_fence(raw)) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = json_kind(&other), "document analysis was not a JSON object");
            return DocumentAnalysisResult::default();
        }
        Err(e) => {
            warn!(error = %e, "document analysis response is not valid JSON");
            return DocumentAnalysisResult::default();
        }
    };

    DocumentAnalysisResult {
        artifact_kind: artifact_kind_field(&object),
        overlay: object
            .get("overlay")
            .and_then(Value::as_bool)
            .unwrap_or(DEFAULT_OVERLAY),
        generated_prompt: object
            .get("generatedPrompt")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map_or_else(|| DOCUMENT_ANALYSIS_FAILED_NOTICE.to_owned(), str::to_owned),
    }
}

fn artifact_kind_field(object: &Map<String, Value>) -> ArtifactKind {
    object
        .get("artifactKind")
        .and_then(Value::as_str)
        .and_then(ArtifactKind::from_keyword)
        .unwrap_or(DEFAULT_ARTIFACT_KIND)
}

/// Strip a markdown fence some models wrap around JSON output.
fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// MIME type for a document, inferred from its file name extension.
pub fn mime_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}
