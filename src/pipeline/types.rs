//! Data model shared by the generation pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of script the pipeline produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Passive visual overlay (`indicator(...)`).
    #[default]
    Indicator,
    /// Backtestable strategy (`strategy(...)`).
    Strategy,
}

impl ArtifactKind {
    /// The Pine Script declaration keyword for this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Indicator => "indicator",
            Self::Strategy => "strategy",
        }
    }

    /// Parse a keyword, case-insensitively. Unknown values yield `None`.
    pub fn from_keyword(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "indicator" => Some(Self::Indicator),
            "strategy" => Some(Self::Strategy),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Capability tier of the selected model.
///
/// Expert tier pulls the trading-domain guidelines into the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityTier {
    /// Standard prompt set.
    #[default]
    Standard,
    /// Adds the mandatory domain fragments.
    Expert,
}

impl CapabilityTier {
    /// Whether expert fragments are included.
    pub fn is_expert(self) -> bool {
        matches!(self, Self::Expert)
    }
}

/// A model selector paired with its explicit capability tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelChoice {
    /// Opaque selector forwarded to the completion service.
    pub selector: String,
    /// Tier the prompt assembler keys on.
    pub tier: CapabilityTier,
}

impl ModelChoice {
    /// Pair a selector with a tier.
    pub fn new(selector: impl Into<String>, tier: CapabilityTier) -> Self {
        Self {
            selector: selector.into(),
            tier,
        }
    }
}

/// One generation request. Borrowed immutably for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Free-text description of the desired script.
    pub description: String,
    /// Indicator or strategy.
    pub artifact_kind: ArtifactKind,
    /// Whether the script draws on the price pane.
    pub overlay: bool,
    /// Target language version tag, e.g. `"v6"`.
    pub target_version: String,
    /// Model selector and tier.
    pub model: ModelChoice,
    /// Extra reference material that overrides domain guidelines on conflict.
    pub supplemental_context: Option<String>,
}

/// Code and explanation produced by one run or refinement turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Normalized script text, or an explicit failure sentinel.
    pub code: String,
    /// Model-authored analysis.
    pub explanation: String,
}

/// Author of a refinement chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The human asking for a change.
    User,
    /// Explanation returned alongside code.
    Explanation,
}

/// A refinement conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote it.
    pub role: ChatRole,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// An explanation message.
    pub fn explanation(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Explanation,
            content: content.into(),
        }
    }
}

/// Result of analysing a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysisResult {
    /// Suggested artifact kind.
    pub artifact_kind: ArtifactKind,
    /// Suggested overlay flag.
    pub overlay: bool,
    /// Description suitable as a generation prompt.
    pub generated_prompt: String,
}

/// Request context a refinement session carries between turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Indicator or strategy.
    pub artifact_kind: ArtifactKind,
    /// Target language version tag.
    pub target_version: String,
    /// Model selector and tier.
    pub model: ModelChoice,
    /// Supplemental context from the original request.
    pub supplemental_context: Option<String>,
}

impl From<&GenerationRequest> for SessionContext {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            artifact_kind: request.artifact_kind,
            target_version: request.target_version.clone(),
            model: request.model.clone(),
            supplemental_context: request.supplemental_context.clone(),
        }
    }
}
