//! Progress state machine for generation and refinement runs.
//!
//! The orchestrator owns the current [`PipelineStage`] and reports every
//! transition to an optional listener. Listener failures are logged and
//! never abort the run.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::PipelineError;

/// Named step of a pipeline run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// No run has started.
    #[default]
    Idle,
    /// Request accepted, input being prepared.
    Normalizing,
    /// Prompt being assembled.
    Optimizing,
    /// Completion call in flight.
    Generating,
    /// Response being extracted and normalized.
    Validating,
    /// Refinement turn in flight.
    Refining,
    /// Last run succeeded.
    Success,
    /// Last run failed.
    Error,
}

impl PipelineStage {
    /// Whether the stage is a rest state (no run in flight).
    pub fn is_rest(self) -> bool {
        matches!(self, Self::Idle | Self::Success | Self::Error)
    }

    /// Lowercase label for logs and progress output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Normalizing => "normalizing",
            Self::Optimizing => "optimizing",
            Self::Generating => "generating",
            Self::Validating => "validating",
            Self::Refining => "refining",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives stage changes. Runs synchronously and must not block.
pub trait StageListener: Send {
    /// Called after each transition.
    ///
    /// # Errors
    ///
    /// Any error is logged by the orchestrator and otherwise ignored.
    fn on_stage(&mut self, stage: PipelineStage) -> anyhow::Result<()>;
}

impl<F> StageListener for F
where
    F: FnMut(PipelineStage) -> anyhow::Result<()> + Send,
{
    fn on_stage(&mut self, stage: PipelineStage) -> anyhow::Result<()> {
        self(stage)
    }
}

fn allowed(from: PipelineStage, to: PipelineStage) -> bool {
    use PipelineStage::{
        Error, Generating, Idle, Normalizing, Optimizing, Refining, Success, Validating,
    };

    matches!(
        (from, to),
        (Idle | Success | Error, Normalizing)
            | (Normalizing, Optimizing)
            | (Optimizing, Generating)
            | (Generating, Validating)
            | (Validating, Success)
            | (Success | Error, Refining)
            | (Refining, Success)
            | (Normalizing | Optimizing | Generating | Validating | Refining, Error)
    )
}

/// Drives the stage sequence of one session.
#[derive(Default)]
pub struct StageOrchestrator {
    current: PipelineStage,
    listener: Option<Box<dyn StageListener>>,
}

impl fmt::Debug for StageOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageOrchestrator")
            .field("current", &self.current)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl StageOrchestrator {
    /// An idle orchestrator without a listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// An idle orchestrator reporting to `listener`.
    pub fn with_listener(listener: impl StageListener + 'static) -> Self {
        Self {
            current: PipelineStage::Idle,
            listener: Some(Box::new(listener)),
        }
    }

    /// Replace (or install) the listener.
    pub fn set_listener(&mut self, listener: impl StageListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// The active stage.
    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Whether a run is in flight. Callers disable triggers while this holds.
    pub fn is_busy(&self) -> bool {
        !self.current.is_rest()
    }

    /// Start a generation run from a rest state.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] if a run is already in flight.
    pub fn begin_generation(&mut self) -> Result<(), PipelineError> {
        self.advance(PipelineStage::Normalizing)
    }

    /// Start a refinement turn after a finished run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] unless the last run ended
    /// in `Success` or `Error`.
    pub fn begin_refinement(&mut self) -> Result<(), PipelineError> {
        self.advance(PipelineStage::Refining)
    }

    /// Move to `to` if the transition is allowed, then notify the listener.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] and leaves the stage
    /// unchanged when `to` does not follow the current stage.
    pub fn advance(&mut self, to: PipelineStage) -> Result<(), PipelineError> {
        let from = self.current;
        if !allowed(from, to) {
            return Err(PipelineError::InvalidTransition { from, to });
        }
        self.current = to;
        debug!(from = %from, to = %to, "pipeline stage changed");
        self.notify(to);
        Ok(())
    }

    /// Treat an idle orchestrator as having finished a run, without notifying.
    pub(crate) fn seed(&mut self) {
        if self.current == PipelineStage::Idle {
            self.current = PipelineStage::Success;
        }
    }

    /// Mark the in-flight run as failed. No-op from a rest state.
    pub fn fail(&mut self) {
        if self.current.is_rest() {
            debug!(stage = %self.current, "ignoring failure outside an active run");
            return;
        }
        let from = self.current;
        self.current = PipelineStage::Error;
        debug!(from = %from, to = %PipelineStage::Error, "pipeline stage changed");
        self.notify(PipelineStage::Error);
    }

    fn notify(&mut self, stage: PipelineStage) {
        if let Some(listener) = self.listener.as_mut() {
            if let Err(e) = listener.on_stage(stage) {
                warn!(stage = %stage, error = %e, "stage listener failed");
            }
        }
    }
}
