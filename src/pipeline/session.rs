//! Refinement session state.
//!
//! A session holds the evolving script and the chat history of one
//! refinement conversation. It is only mutated at turn boundaries: the
//! user message when a turn starts, then code and explanation together when
//! the turn completes or is rejected.

use tracing::{info, warn};
use uuid::Uuid;

use super::extract::Extraction;
use super::normalize::normalize;
use super::stage::{PipelineStage, StageOrchestrator};
use super::types::{ChatMessage, ChatRole, GenerationResult, SessionContext};
use super::PipelineError;

/// Line appended below the previous code when a refinement response held no code.
pub const REFINEMENT_FAILED_MARKER: &str =
    "// REFINEMENT FAILED: the model response contained no code. The code above is unchanged.";

/// Explanation recorded when a refinement response held no code.
pub const REFINEMENT_FAILED_EXPLANATION: &str =
    "Refinement failed: no code could be extracted from the response, so the previous code was kept and marked.";

/// Evolving code plus the refinement conversation.
#[derive(Debug)]
pub struct RefinementSession {
    id: Uuid,
    context: SessionContext,
    current_code: String,
    history: Vec<ChatMessage>,
    stages: StageOrchestrator,
}

impl RefinementSession {
    /// Start a session from a finished generation run.
    ///
    /// The run's explanation becomes the initial analysis. `stages` is the
    /// orchestrator the run used; it must be at rest.
    pub fn start(
        context: SessionContext,
        result: GenerationResult,
        stages: StageOrchestrator,
    ) -> Self {
        let mut session = Self::from_code(context, result.code, stages);
        if !result.explanation.trim().is_empty() {
            session
                .history
                .push(ChatMessage::explanation(result.explanation));
        }
        session
    }

    /// Start a session from existing code, e.g. a script loaded from disk.
    pub fn from_code(context: SessionContext, code: String, mut stages: StageOrchestrator) -> Self {
        // Seeded code counts as a finished run so refinement can begin.
        stages.seed();
        let id = Uuid::new_v4();
        info!(session_id = %id, "refinement session started");
        Self {
            id,
            context,
            current_code: code,
            history: Vec::new(),
            stages,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request context carried between turns.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The latest code.
    pub fn current_code(&self) -> &str {
        &self.current_code
    }

    /// Full chat history, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// The first explanation message, if any.
    pub fn initial_analysis(&self) -> Option<&ChatMessage> {
        self.history
            .iter()
            .find(|m| m.role == ChatRole::Explanation)
    }

    /// Number of user turns submitted so far.
    pub fn turns(&self) -> usize {
        self.history
            .iter()
            .filter(|m| m.role == ChatRole::User)
            .count()
    }

    /// Current pipeline stage.
    pub fn stage(&self) -> PipelineStage {
        self.stages.current()
    }

    /// Whether a turn is in flight.
    pub fn is_busy(&self) -> bool {
        self.stages.is_busy()
    }

    /// Mutable access to the orchestrator, e.g. to install a listener.
    pub fn stages_mut(&mut self) -> &mut StageOrchestrator {
        &mut self.stages
    }

    /// Discard the whole chat history. The code is kept.
    pub fn clear(&mut self) {
        info!(session_id = %self.id, dropped = self.history.len(), "session history cleared");
        self.history = Vec::new();
    }

    /// Open a turn: enter `Refining` and record the user message.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] if a turn is already in flight.
    pub fn begin_turn(&mut self, instruction: &str) -> Result<(), PipelineError> {
        self.stages.begin_refinement()?;
        self.history.push(ChatMessage::user(instruction));
        Ok(())
    }

    /// Close a turn with an extraction result.
    ///
    /// A failed extraction never replaces the code silently: the previous
    /// code is kept, followed by [`REFINEMENT_FAILED_MARKER`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] if no turn is open.
    pub fn complete_turn(&mut self, extraction: Extraction) -> Result<GenerationResult, PipelineError> {
        if self.stages.current() != PipelineStage::Refining {
            return Err(PipelineError::InvalidTransition {
                from: self.stages.current(),
                to: PipelineStage::Success,
            });
        }

        let result = if extraction.is_failed() {
            warn!(session_id = %self.id, "refinement response held no code, keeping previous code");
            GenerationResult {
                code: format!("{}\n\n{REFINEMENT_FAILED_MARKER}", self.current_code),
                explanation: REFINEMENT_FAILED_EXPLANATION.to_owned(),
            }
        } else {
            GenerationResult {
                code: normalize(&extraction.code, &self.context.target_version),
                explanation: extraction.explanation,
            }
        };

        self.current_code = result.code.clone();
        self.history
            .push(ChatMessage::explanation(result.explanation.clone()));
        self.stages.advance(PipelineStage::Success)?;
        info!(session_id = %self.id, turns = self.turns(), "refinement turn completed");
        Ok(result)
    }

    /// Close a turn after a transport failure. The code is left unchanged.
    pub fn reject_turn(&mut self, error: &PipelineError) {
        warn!(session_id = %self.id, error = %error, "refinement turn rejected");
        self.history.push(ChatMessage::explanation(format!(
            "Refinement failed: {error}. The code was not changed; try again."
        )));
        self.stages.fail();
    }
}
