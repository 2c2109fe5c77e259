//! Script generation pipeline.
//!
//! Leaf modules first: [`policy`] fragments feed the [`prompt`] assembler;
//! responses pass through [`extract`] and [`normalize`]; [`stage`] tracks
//! progress; [`session`] holds refinement state; [`analysis`] parses
//! document-analysis output. [`service::PineGenerator`] wires them to an
//! injected [`crate::providers::LlmProvider`].

pub mod analysis;
pub mod extract;
pub mod normalize;
pub mod policy;
pub mod prompt;
pub mod service;
pub mod session;
pub mod stage;
pub mod types;

pub use service::{GenerationSettings, PineGenerator};
pub use session::RefinementSession;
pub use stage::{PipelineStage, StageListener, StageOrchestrator};
pub use types::{
    ArtifactKind, CapabilityTier, ChatMessage, ChatRole, DocumentAnalysisResult,
    GenerationRequest, GenerationResult, ModelChoice, SessionContext,
};

use crate::providers::ProviderError;

/// Errors surfaced by pipeline runs.
///
/// Extraction and structured-parse failures are not errors; they degrade to
/// sentinel or default values inside the result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The completion service was unreachable or returned an error.
    #[error("completion service failed: {0}")]
    Transport(#[from] ProviderError),
    /// A run was started or advanced out of order.
    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition {
        /// Stage at the time of the attempt.
        from: PipelineStage,
        /// Requested stage.
        to: PipelineStage,
    },
}
