//! End-to-end pipeline tests against a scripted provider.

use base64::Engine;

use pinewright::pipeline::analysis::DOCUMENT_ANALYSIS_FAILED_NOTICE;
use pinewright::pipeline::extract::EXTRACTION_FAILED_SENTINEL;
use pinewright::pipeline::policy::DOMAIN_GUIDELINES;
use pinewright::pipeline::session::REFINEMENT_FAILED_MARKER;
use pinewright::pipeline::{
    ArtifactKind, CapabilityTier, PipelineError, PipelineStage, RefinementSession,
    SessionContext, StageOrchestrator,
};
use pinewright::providers::{Part, ProviderError};

use super::support::{fenced_response, generator, recording_stages, request, seen, ScriptedProvider};

const RSI_BODY: &str = "indicator(\"RSI\")\nplot(ta.rsi(close, 14))";

#[tokio::test]
async fn generate_reports_stages_and_normalizes_code() {
    let provider = ScriptedProvider::new(vec![Ok(fenced_response(RSI_BODY))]);
    let (mut stages, log) = recording_stages();

    let result = generator(&provider)
        .generate(&request(CapabilityTier::Standard), &mut stages)
        .await
        .expect("generation succeeds");

    assert_eq!(
        result.code,
        "//@version=6\nindicator(\"RSI\")\nplot(ta.rsi(close, 14))"
    );
    assert_eq!(result.explanation, "Computes RSI and marks crossovers.");
    assert_eq!(
        seen(&log),
        vec![
            PipelineStage::Normalizing,
            PipelineStage::Optimizing,
            PipelineStage::Generating,
            PipelineStage::Validating,
            PipelineStage::Success,
        ]
    );

    let sent = provider.last_request();
    assert_eq!(sent.model, "test-model");
    assert_eq!(sent.contents.len(), 1);
    assert_eq!(
        sent.contents[0].text(),
        "RSI crossover with a 14 period lookback"
    );
    assert_eq!(sent.config.temperature, Some(0.4));
    assert_eq!(sent.config.max_output_tokens, Some(8192));
}

#[tokio::test]
async fn reasoning_budget_applies_to_expert_tier_only() {
    let provider = ScriptedProvider::new(vec![
        Ok(fenced_response(RSI_BODY)),
        Ok(fenced_response(RSI_BODY)),
    ]);
    let generator = generator(&provider);

    generator
        .generate(&request(CapabilityTier::Standard), &mut StageOrchestrator::new())
        .await
        .expect("standard run");
    generator
        .generate(&request(CapabilityTier::Expert), &mut StageOrchestrator::new())
        .await
        .expect("expert run");

    let requests = provider.requests();
    assert_eq!(requests[0].config.reasoning_budget, None);
    assert_eq!(requests[1].config.reasoning_budget, Some(2048));

    let standard_system = requests[0].system.clone().unwrap_or_default();
    let expert_system = requests[1].system.clone().unwrap_or_default();
    assert!(!standard_system.contains(DOMAIN_GUIDELINES));
    assert!(expert_system.contains(DOMAIN_GUIDELINES));
}

#[tokio::test]
async fn unextractable_response_yields_sentinel() {
    let provider = ScriptedProvider::new(vec![Ok("I am not sure what you mean.".to_owned())]);
    let (mut stages, log) = recording_stages();

    let result = generator(&provider)
        .generate(&request(CapabilityTier::Standard), &mut stages)
        .await
        .expect("extraction failure is not an error");

    assert_eq!(result.code, EXTRACTION_FAILED_SENTINEL);
    assert_eq!(result.explanation, "I am not sure what you mean.");
    assert_eq!(seen(&log).last(), Some(&PipelineStage::Success));
}

#[tokio::test]
async fn transport_failure_ends_in_error() {
    let provider = ScriptedProvider::new(vec![Err(503)]);
    let (mut stages, log) = recording_stages();

    let err = generator(&provider)
        .generate(&request(CapabilityTier::Standard), &mut stages)
        .await
        .expect_err("transport failure surfaces");

    assert!(matches!(
        err,
        PipelineError::Transport(ProviderError::HttpStatus { status: 503, .. })
    ));
    assert_eq!(
        seen(&log),
        vec![
            PipelineStage::Normalizing,
            PipelineStage::Optimizing,
            PipelineStage::Generating,
            PipelineStage::Error,
        ]
    );
    assert_eq!(stages.current(), PipelineStage::Error);
}

#[tokio::test]
async fn generation_rejected_while_busy() {
    let provider = ScriptedProvider::new(vec![Ok(fenced_response(RSI_BODY))]);
    let mut stages = StageOrchestrator::new();
    stages.begin_generation().expect("occupy the orchestrator");

    let err = generator(&provider)
        .generate(&request(CapabilityTier::Standard), &mut stages)
        .await
        .expect_err("second run rejected");
    assert!(matches!(err, PipelineError::InvalidTransition { .. }));
    assert!(provider.requests().is_empty());
}

async fn session_after_generation(provider: &std::sync::Arc<ScriptedProvider>) -> RefinementSession {
    let mut req = request(CapabilityTier::Expert);
    req.supplemental_context = Some("Only long entries.".to_owned());
    let (mut stages, _log) = recording_stages();
    let result = generator(provider)
        .generate(&req, &mut stages)
        .await
        .expect("initial generation");
    RefinementSession::start(SessionContext::from(&req), result, stages)
}

#[tokio::test]
async fn refine_updates_session() {
    let provider = ScriptedProvider::new(vec![
        Ok(fenced_response(RSI_BODY)),
        Ok(fenced_response("indicator(\"RSI\")\nplot(ta.rsi(close, 21))")),
    ]);
    let mut session = session_after_generation(&provider).await;

    let result = generator(&provider)
        .refine(&mut session, "use a 21 period lookback")
        .await
        .expect("refinement succeeds");

    assert_eq!(
        result.code,
        "//@version=6\nindicator(\"RSI\")\nplot(ta.rsi(close, 21))"
    );
    assert_eq!(session.current_code(), result.code);
    assert_eq!(session.stage(), PipelineStage::Success);
    assert_eq!(session.turns(), 1);

    let sent = provider.last_request();
    let user = sent.contents[0].text();
    assert!(user.contains("plot(ta.rsi(close, 14))"));
    assert!(user.contains("use a 21 period lookback"));
    assert!(user.contains("Only long entries."));
    assert_eq!(sent.config.reasoning_budget, Some(2048));
}

#[tokio::test]
async fn refine_without_code_marks_previous_code() {
    let provider = ScriptedProvider::new(vec![
        Ok(fenced_response(RSI_BODY)),
        Ok("Here are some thoughts but no code.".to_owned()),
    ]);
    let mut session = session_after_generation(&provider).await;
    let before = session.current_code().to_owned();

    let result = generator(&provider)
        .refine(&mut session, "add alerts")
        .await
        .expect("failed extraction is not an error");

    assert!(result.code.starts_with(&before));
    assert!(result.code.ends_with(REFINEMENT_FAILED_MARKER));
    assert_eq!(session.stage(), PipelineStage::Success);
}

#[tokio::test]
async fn refine_transport_failure_keeps_code() {
    let provider = ScriptedProvider::new(vec![Ok(fenced_response(RSI_BODY)), Err(500)]);
    let mut session = session_after_generation(&provider).await;
    let before = session.current_code().to_owned();

    let err = generator(&provider)
        .refine(&mut session, "add alerts")
        .await
        .expect_err("transport failure surfaces");

    assert!(matches!(err, PipelineError::Transport(_)));
    assert_eq!(session.current_code(), before);
    assert_eq!(session.stage(), PipelineStage::Error);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn enhance_returns_trimmed_reply() {
    let provider = ScriptedProvider::new(vec![Ok(
        "  Plot a 14 period RSI with 70/30 bands.\n".to_owned()
    )]);
    let enhanced = generator(&provider).enhance_text("rsi with bands").await;
    assert_eq!(enhanced, "Plot a 14 period RSI with 70/30 bands.");

    let sent = provider.last_request();
    assert_eq!(sent.model, "gemini-2.5-flash");
    assert_eq!(sent.config.temperature, Some(0.7));
}

#[tokio::test]
async fn enhance_falls_back_to_input() {
    let provider = ScriptedProvider::new(vec![Err(429), Ok("   ".to_owned())]);
    let generator = generator(&provider);
    assert_eq!(generator.enhance_text("rsi").await, "rsi");
    assert_eq!(generator.enhance_text("rsi").await, "rsi");
    assert_eq!(generator.enhance_text("  ").await, "  ");
    assert_eq!(provider.requests().len(), 2);
}

#[tokio::test]
async fn analyze_document_sends_inline_data() {
    let provider = ScriptedProvider::new(vec![Ok(
        r#"{"artifactKind":"strategy","overlay":true,"generatedPrompt":"Trade the opening range breakout."}"#
            .to_owned(),
    )]);
    let bytes = b"%PDF-1.7 opening range";

    let analysis = generator(&provider)
        .analyze_document(bytes, "orb.pdf")
        .await
        .expect("analysis succeeds");
    assert_eq!(analysis.artifact_kind, ArtifactKind::Strategy);
    assert_eq!(analysis.generated_prompt, "Trade the opening range breakout.");

    let sent = provider.last_request();
    assert!(sent.config.structured_output.is_some());
    assert_eq!(sent.config.temperature, Some(0.2));
    let expected = base64::engine::general_purpose::STANDARD.encode(bytes);
    assert!(matches!(
        &sent.contents[0].parts[0],
        Part::InlineData { mime_type, data } if mime_type == "application/pdf" && *data == expected
    ));
}

#[tokio::test]
async fn analyze_document_degrades_on_garbage() {
    let provider = ScriptedProvider::new(vec![Ok("definitely not json".to_owned())]);
    let analysis = generator(&provider)
        .analyze_document(b"hello", "notes.txt")
        .await
        .expect("garbage output is not an error");
    assert_eq!(analysis.artifact_kind, ArtifactKind::Indicator);
    assert!(analysis.overlay);
    assert_eq!(analysis.generated_prompt, DOCUMENT_ANALYSIS_FAILED_NOTICE);
}

#[tokio::test]
async fn analyze_document_transport_failure() {
    let provider = ScriptedProvider::new(vec![Err(500)]);
    let err = generator(&provider)
        .analyze_document(b"hello", "notes.txt")
        .await
        .expect_err("transport failure surfaces");
    assert!(matches!(err, PipelineError::Transport(_)));
}
