//! Refinement session tests that drive turns directly.

use pinewright::pipeline::extract::extract;
use pinewright::pipeline::session::{REFINEMENT_FAILED_EXPLANATION, REFINEMENT_FAILED_MARKER};
use pinewright::pipeline::{
    CapabilityTier, ChatRole, GenerationResult, PipelineError, PipelineStage, RefinementSession,
    SessionContext, StageOrchestrator,
};
use pinewright::providers::ProviderError;

use super::support::{fenced_response, recording_listener, request, seen};

const PRIOR: &str = "//@version=6\nindicator(\"RSI\")\nplot(ta.rsi(close, 14))";

fn started() -> RefinementSession {
    let context = SessionContext::from(&request(CapabilityTier::Standard));
    let result = GenerationResult {
        code: PRIOR.to_owned(),
        explanation: "Plots a 14 period RSI.".to_owned(),
    };
    RefinementSession::start(context, result, StageOrchestrator::new())
}

#[test]
fn start_records_initial_analysis() {
    let session = started();
    assert_eq!(session.current_code(), PRIOR);
    assert_eq!(session.stage(), PipelineStage::Success);
    assert_eq!(session.turns(), 0);
    let analysis = session.initial_analysis().expect("initial analysis");
    assert_eq!(analysis.content, "Plots a 14 period RSI.");
}

#[test]
fn blank_explanation_is_not_recorded() {
    let context = SessionContext::from(&request(CapabilityTier::Standard));
    let result = GenerationResult {
        code: PRIOR.to_owned(),
        explanation: "  ".to_owned(),
    };
    let session = RefinementSession::start(context, result, StageOrchestrator::new());
    assert!(session.history().is_empty());
}

#[test]
fn from_code_is_ready_for_refinement() {
    let context = SessionContext::from(&request(CapabilityTier::Standard));
    let mut session =
        RefinementSession::from_code(context, PRIOR.to_owned(), StageOrchestrator::new());
    assert!(session.initial_analysis().is_none());
    session.begin_turn("add a signal line").expect("seeded session accepts a turn");
    assert_eq!(session.stage(), PipelineStage::Refining);
}

#[test]
fn successful_turn_replaces_code() {
    let mut session = started();
    session.begin_turn("add a 50 SMA").expect("turn opens");
    assert!(session.is_busy());

    let result = session
        .complete_turn(extract(&fenced_response(
            "indicator(\"RSI\")\nplot(ta.sma(close, 50))",
        )))
        .expect("turn completes");

    assert_eq!(
        result.code,
        "//@version=6\nindicator(\"RSI\")\nplot(ta.sma(close, 50))"
    );
    assert_eq!(session.current_code(), result.code);
    assert_eq!(session.stage(), PipelineStage::Success);
    assert_eq!(session.turns(), 1);

    let roles: Vec<ChatRole> = session.history().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::Explanation, ChatRole::User, ChatRole::Explanation]
    );
    assert_eq!(session.history()[1].content, "add a 50 SMA");
}

#[test]
fn failed_extraction_keeps_prior_code_and_marks_it() {
    let mut session = started();
    session.begin_turn("make it better").expect("turn opens");
    let result = session
        .complete_turn(extract("Sorry, I could not do that."))
        .expect("turn completes");

    assert!(result.code.starts_with(PRIOR));
    assert!(result.code.ends_with(REFINEMENT_FAILED_MARKER));
    assert_eq!(result.explanation, REFINEMENT_FAILED_EXPLANATION);
    assert_eq!(session.current_code(), result.code);
    assert_eq!(session.stage(), PipelineStage::Success);
}

#[test]
fn rejected_turn_leaves_code_and_allows_retry() {
    let mut session = started();
    session.begin_turn("add alerts").expect("turn opens");
    let error = PipelineError::from(ProviderError::Unavailable("offline".to_owned()));
    session.reject_turn(&error);

    assert_eq!(session.current_code(), PRIOR);
    assert_eq!(session.stage(), PipelineStage::Error);
    let last = session.history().last().expect("failure message");
    assert_eq!(last.role, ChatRole::Explanation);
    assert!(last.content.contains("offline"));

    session.begin_turn("add alerts").expect("retry after error");
    assert_eq!(session.turns(), 2);
}

#[test]
fn overlapping_turn_is_rejected() {
    let mut session = started();
    session.begin_turn("first").expect("turn opens");
    let err = session.begin_turn("second").expect_err("turn already open");
    assert!(matches!(
        err,
        PipelineError::InvalidTransition {
            from: PipelineStage::Refining,
            to: PipelineStage::Refining,
        }
    ));
    assert_eq!(session.turns(), 1);
}

#[test]
fn completing_without_open_turn_is_rejected() {
    let mut session = started();
    assert!(session
        .complete_turn(extract(&fenced_response("plot(close)")))
        .is_err());
    assert_eq!(session.current_code(), PRIOR);
}

#[test]
fn clear_drops_history_but_keeps_code() {
    let mut session = started();
    session.begin_turn("x").expect("turn opens");
    session
        .complete_turn(extract(&fenced_response("plot(open)")))
        .expect("turn completes");
    session.clear();
    assert!(session.history().is_empty());
    assert_eq!(session.current_code(), "//@version=6\nplot(open)");
    assert_eq!(session.turns(), 0);
}

#[test]
fn listener_installed_on_loaded_session_sees_turns() {
    let context = SessionContext::from(&request(CapabilityTier::Standard));
    let mut session =
        RefinementSession::from_code(context, PRIOR.to_owned(), StageOrchestrator::new());
    let (listener, log) = recording_listener();
    session.stages_mut().set_listener(listener);

    session.begin_turn("add a 50 SMA").expect("turn opens");
    session
        .complete_turn(extract(&fenced_response("plot(ta.sma(close, 50))")))
        .expect("turn completes");
    assert_eq!(
        seen(&log),
        vec![PipelineStage::Refining, PipelineStage::Success]
    );
}
