//! Response extraction tests.

use pinewright::pipeline::extract::{
    extract, scan, Anchor, ExtractionStatus, EXTRACTION_FAILED_SENTINEL,
};
use pinewright::pipeline::normalize::normalize;

#[test]
fn worked_example_extracts_then_normalizes() {
    let raw = "blah ```pine\n//@version=5\nindicator(\"X\")\n```";
    let extraction = extract(raw);
    assert_eq!(extraction.status, ExtractionStatus::Fenced);
    assert_eq!(extraction.code, "//@version=5\nindicator(\"X\")");
    assert_eq!(extraction.explanation, "blah");
    assert_eq!(
        normalize(&extraction.code, "v6"),
        "//@version=6\nindicator(\"X\")"
    );
}

#[test]
fn fenced_block_round_trip() {
    let before = "Intro text. ";
    let code = "plot(close)";
    let after = " Trailing notes.";
    let raw = format!("{before}```\n{code}\n```{after}");

    let extraction = extract(&raw);
    assert_eq!(extraction.code, code);
    assert_eq!(
        extraction.explanation,
        format!("{before}{after}").trim().to_owned()
    );
}

#[test]
fn section_markers_are_stripped_from_explanation() {
    let raw = "[ANALYSIS]\nUses RSI.\n[CODE]\n```pine\n//@version=6\nindicator(\"RSI\")\n```\nDone.";
    let extraction = extract(raw);
    assert_eq!(extraction.code, "//@version=6\nindicator(\"RSI\")");
    assert_eq!(extraction.explanation, "Uses RSI.\n\n\nDone.");
    assert!(!extraction.explanation.contains("[ANALYSIS]"));
    assert!(!extraction.explanation.contains("[CODE]"));
}

#[test]
fn fence_hint_is_case_insensitive() {
    let raw = "```PineScript\nplot(close)\n```";
    let extraction = extract(raw);
    assert_eq!(extraction.status, ExtractionStatus::Fenced);
    assert_eq!(extraction.code, "plot(close)");
}

#[test]
fn block_with_foreign_hint_is_skipped() {
    let raw = "```python\nprint(1)\n```\n```pine\nplot(close)\n```";
    let extraction = extract(raw);
    assert_eq!(extraction.code, "plot(close)");
    assert!(extraction.explanation.contains("print(1)"));
}

#[test]
fn word_glued_to_fence_is_content_not_hint() {
    let extraction = extract("```indicator(\"X\")```");
    assert_eq!(extraction.status, ExtractionStatus::Fenced);
    assert_eq!(extraction.code, "indicator(\"X\")");
}

#[test]
fn version_marker_fallback_takes_rest_of_text() {
    let raw = "Here is your script:\n//@version=5\nindicator(\"A\")\nplot(close)\n";
    let k = raw.find("//@version=").expect("marker present");

    let extraction = extract(raw);
    assert_eq!(extraction.status, ExtractionStatus::VersionMarker);
    assert_eq!(extraction.code, &raw[k..]);
    assert_eq!(extraction.explanation, "Here is your script:");
}

#[test]
fn unterminated_fence_falls_back_to_version_marker() {
    let raw = "```pine\n//@version=6\nindicator(\"A\")";
    let k = raw.find("//@version=").expect("marker present");

    let extraction = extract(raw);
    assert_eq!(extraction.status, ExtractionStatus::VersionMarker);
    assert_eq!(extraction.code, &raw[k..]);
}

#[test]
fn marker_mentioned_in_prose_is_not_code() {
    let raw = "I targeted Pine v6 (the //@version=6 header) and kept it simple.\n\
               //@version=6\nindicator(\"A\")\nplot(close)";
    let extraction = extract(raw);
    assert_eq!(extraction.status, ExtractionStatus::VersionMarker);
    assert_eq!(extraction.code, "//@version=6\nindicator(\"A\")\nplot(close)");
    assert_eq!(
        extraction.explanation,
        "I targeted Pine v6 (the //@version=6 header) and kept it simple."
    );
}

#[test]
fn prose_only_marker_yields_sentinel() {
    let extraction = extract("Remember to start with //@version=6 next time.");
    assert!(extraction.is_failed());
}

#[test]
fn indented_marker_still_counts() {
    let raw = "Script:\n  //@version=5\nplot(close)";
    let extraction = extract(raw);
    assert_eq!(extraction.status, ExtractionStatus::VersionMarker);
    assert_eq!(extraction.code, "//@version=5\nplot(close)");
}

#[test]
fn multi_word_hint_is_discarded() {
    let raw = "```Pine Script\n//@version=5\nindicator(\"A\")\n```";
    let extraction = extract(raw);
    assert_eq!(extraction.status, ExtractionStatus::Fenced);
    assert_eq!(extraction.code, "//@version=5\nindicator(\"A\")");
    assert_eq!(normalize(&extraction.code, "v6"), "//@version=6\nindicator(\"A\")");
}

#[test]
fn multi_word_foreign_hint_is_skipped() {
    let raw = "```plain text\nnotes here\n```\n```pine\nplot(close)\n```";
    assert_eq!(extract(raw).code, "plot(close)");
}

#[test]
fn marker_inside_foreign_block_stops_at_closing_fence() {
    let raw = "```text\n//@version=6\nindicator(\"A\")\n```\nthat's it";
    let extraction = extract(raw);
    assert_eq!(extraction.status, ExtractionStatus::VersionMarker);
    assert_eq!(extraction.code, "//@version=6\nindicator(\"A\")");
    assert_eq!(extraction.explanation, "that's it");
}

#[test]
fn no_anchor_yields_sentinel() {
    let raw = "I am unable to produce a script for that request.";
    let extraction = extract(raw);
    assert!(extraction.is_failed());
    assert_eq!(extraction.code, EXTRACTION_FAILED_SENTINEL);
    assert!(!extraction.code.is_empty());
    assert_eq!(extraction.explanation, raw);
}

#[test]
fn empty_response_yields_sentinel() {
    let extraction = extract("");
    assert!(extraction.is_failed());
    assert_eq!(extraction.code, EXTRACTION_FAILED_SENTINEL);
}

#[test]
fn scan_reports_anchors_in_order() {
    let anchors = scan("a ```pine\n//@version=6\n```");
    assert_eq!(
        anchors,
        vec![
            Anchor::FenceOpen {
                at: 2,
                hint: "pine".to_owned(),
                body_start: 9,
            },
            Anchor::VersionMarker { at: 10 },
            Anchor::FenceClose { at: 23 },
        ]
    );
}

#[test]
fn scan_ignores_mid_line_markers() {
    let anchors = scan("see //@version=6\n//@version=6");
    assert_eq!(anchors, vec![Anchor::VersionMarker { at: 17 }]);
}

#[test]
fn scan_reads_whole_label_line_as_hint() {
    let anchors = scan("```Pine Script\nplot(close)\n```");
    assert_eq!(
        anchors[0],
        Anchor::FenceOpen {
            at: 0,
            hint: "Pine Script".to_owned(),
            body_start: 14,
        }
    );
}
