//! Session-facing API over an injected completion provider.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::providers::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, Part, RequestConfig, Role,
};

use super::analysis::{document_analysis_schema, mime_type_for, parse_document_analysis};
use super::extract::extract;
use super::normalize::normalize;
use super::policy::DOCUMENT_ANALYSIS_INSTRUCTION;
use super::prompt::{
    assemble_enhancement, assemble_generation, assemble_refinement, AssembledPrompt,
};
use super::session::RefinementSession;
use super::stage::{PipelineStage, StageOrchestrator};
use super::types::{CapabilityTier, DocumentAnalysisResult, GenerationRequest, GenerationResult};
use super::PipelineError;

/// Sampling settings applied to pipeline calls.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Temperature for generation and refinement.
    pub temperature: f32,
    /// Output token cap for generation and refinement.
    pub max_output_tokens: u32,
    /// Reasoning budget, applied to expert-tier calls only.
    pub reasoning_budget: Option<u32>,
    /// Model used for enhancement and document analysis.
    pub utility_model: String,
    /// Temperature for prompt enhancement.
    pub enhance_temperature: f32,
    /// Temperature for document analysis.
    pub analysis_temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 8192,
            reasoning_budget: None,
            utility_model: "gemini-2.5-flash".to_owned(),
            enhance_temperature: 0.7,
            analysis_temperature: 0.2,
        }
    }
}

/// Generation, refinement, enhancement and document analysis.
#[derive(Clone)]
pub struct PineGenerator {
    provider: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

impl std::fmt::Debug for PineGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineGenerator")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl PineGenerator {
    /// Build a generator over `provider`.
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Run one generation: `Normalizing → Optimizing → Generating →
    /// Validating → Success`, or `Error` on transport failure.
    ///
    /// An unextractable response is not an error; the result code is then
    /// the extraction sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transport`] when the completion call fails and
    /// [`PipelineError::InvalidTransition`] when `stages` has a run in flight.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        stages: &mut StageOrchestrator,
    ) -> Result<GenerationResult, PipelineError> {
        stages.begin_generation()?;
        info!(
            model = %request.model.selector,
            kind = %request.artifact_kind,
            version = %request.target_version,
            "generation started"
        );

        stages.advance(PipelineStage::Optimizing)?;
        let prompt = assemble_generation(request);

        stages.advance(PipelineStage::Generating)?;
        let response = match self
            .call(&request.model.selector, request.model.tier, prompt)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                stages.fail();
                return Err(e);
            }
        };

        stages.advance(PipelineStage::Validating)?;
        let extraction = extract(&response.text);
        let code = if extraction.is_failed() {
            warn!(model = %response.model, "generation response held no code");
            extraction.code
        } else {
            normalize(&extraction.code, &request.target_version)
        };
        let result = GenerationResult {
            code,
            explanation: extraction.explanation,
        };

        stages.advance(PipelineStage::Success)?;
        info!(
            status = ?extraction.status,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "generation finished"
        );
        Ok(result)
    }

    /// Run one refinement turn against `session`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transport`] when the completion call fails;
    /// the session records the failure and keeps its code. Returns
    /// [`PipelineError::InvalidTransition`] when a turn is already in flight.
    pub async fn refine(
        &self,
        session: &mut RefinementSession,
        instruction: &str,
    ) -> Result<GenerationResult, PipelineError> {
        session.begin_turn(instruction)?;
        let prompt = assemble_refinement(session.context(), session.current_code(), instruction);
        let model = session.context().model.clone();

        match self.call(&model.selector, model.tier, prompt).await {
            Ok(response) => session.complete_turn(extract(&response.text)),
            Err(e) => {
                session.reject_turn(&e);
                Err(e)
            }
        }
    }

    /// Rewrite a rough idea into a precise description.
    ///
    /// Best-effort: returns `text` unchanged on any failure or empty reply.
    pub async fn enhance_text(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_owned();
        }

        let AssembledPrompt { system, user } = assemble_enhancement(text);
        let request = CompletionRequest {
            model: self.settings.utility_model.clone(),
            system: Some(system),
            contents: vec![Message::user_text(user)],
            config: RequestConfig {
                temperature: Some(self.settings.enhance_temperature),
                ..RequestConfig::default()
            },
        };

        match self.provider.complete(request).await {
            Ok(response) if !response.text.trim().is_empty() => response.text.trim().to_owned(),
            Ok(_) => {
                debug!("enhancement returned empty text, keeping input");
                text.to_owned()
            }
            Err(e) => {
                warn!(error = %e, "enhancement failed, keeping input");
                text.to_owned()
            }
        }
    }

    /// Analyse a source document into suggested generation settings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transport`] when the completion call fails.
    /// Malformed output is not an error; it degrades to field defaults.
    pub async fn analyze_document(
        &self,
        bytes: &[u8],
        name: &str,
    ) -> Result<DocumentAnalysisResult, PipelineError> {
        let mime_type = mime_type_for(name);
        info!(name = %name, mime_type, size = bytes.len(), "document analysis started");

        let structured_output = self
            .provider
            .supports_structured_output()
            .then(document_analysis_schema);
        let request = CompletionRequest {
            model: self.settings.utility_model.clone(),
            system: None,
            contents: vec![Message {
                role: Role::User,
                parts: vec![
                    Part::inline_bytes(mime_type, bytes),
                    Part::text(DOCUMENT_ANALYSIS_INSTRUCTION),
                ],
            }],
            config: RequestConfig {
                temperature: Some(self.settings.analysis_temperature),
                structured_output,
                ..RequestConfig::default()
            },
        };

        let response = self.provider.complete(request).await?;
        Ok(parse_document_analysis(&response.text))
    }

    async fn call(
        &self,
        model: &str,
        tier: CapabilityTier,
        prompt: AssembledPrompt,
    ) -> Result<CompletionResponse, PipelineError> {
        let request = CompletionRequest {
            model: model.to_owned(),
            system: Some(prompt.system),
            contents: vec![Message::user_text(prompt.user)],
            config: RequestConfig {
                temperature: Some(self.settings.temperature),
                max_output_tokens: Some(self.settings.max_output_tokens),
                structured_output: None,
                reasoning_budget: if tier.is_expert() {
                    self.settings.reasoning_budget
                } else {
                    None
                },
            },
        };
        debug!(provider = self.provider.name(), model, "calling completion service");
        Ok(self.provider.complete(request).await?)
    }
}
