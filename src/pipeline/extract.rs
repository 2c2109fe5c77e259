//! Extraction of code and explanation from a loosely structured response.
//!
//! The response is scanned once into a list of [`Anchor`]s (fence delimiters
//! and version markers). Extraction then works on anchors only, so each
//! failure mode maps to a missing or unpaired anchor.

use super::normalize::VERSION_PREFIX;
use super::policy::{ANALYSIS_MARKER, CODE_MARKER};

/// Code returned when neither a fenced block nor a version marker was found.
pub const EXTRACTION_FAILED_SENTINEL: &str =
    "// ERROR: no code block was found in the model response. See the explanation for the raw output.";

/// Fence hints accepted as Pine Script (compared on lowercase alphanumerics).
pub const PINE_FENCE_HINTS: &[&str] = &["pine", "pinescript", "pine-script"];

const FENCE: &str = "```";

/// Which rule produced an [`Extraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// A fenced block with an accepted hint.
    Fenced,
    /// Unfenced text starting at a version marker.
    VersionMarker,
    /// Nothing usable; `code` holds the sentinel.
    Failed,
}

/// Code and explanation pulled out of a raw response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Extracted code, or [`EXTRACTION_FAILED_SENTINEL`].
    pub code: String,
    /// Remaining prose.
    pub explanation: String,
    /// Rule that matched.
    pub status: ExtractionStatus,
}

impl Extraction {
    /// Whether extraction fell through to the sentinel.
    pub fn is_failed(&self) -> bool {
        self.status == ExtractionStatus::Failed
    }
}

/// A structural anchor found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Opening fence. `body_start` is the first byte after the fence and hint.
    FenceOpen {
        /// Byte offset of the backticks.
        at: usize,
        /// Language hint, possibly empty.
        hint: String,
        /// Byte offset where the block interior starts.
        body_start: usize,
    },
    /// Closing fence.
    FenceClose {
        /// Byte offset of the backticks.
        at: usize,
    },
    /// Literal version-declaration prefix.
    VersionMarker {
        /// Byte offset of the marker.
        at: usize,
    },
}

impl Anchor {
    fn offset(&self) -> usize {
        match self {
            Self::FenceOpen { at, .. } | Self::FenceClose { at } | Self::VersionMarker { at } => {
                *at
            }
        }
    }
}

/// Scan `text` into anchors ordered by offset.
///
/// Fences alternate open/close in order of appearance. Version markers are
/// reported only at the start of a line (after optional spaces or tabs),
/// including inside fenced blocks.
pub fn scan(text: &str) -> Vec<Anchor> {
    let mut anchors = Vec::new();

    let mut open = false;
    for (at, _) in text.match_indices(FENCE) {
        if open {
            anchors.push(Anchor::FenceClose { at });
        } else {
            let after = at.saturating_add(FENCE.len());
            let (hint, body_start) = read_hint(text, after);
            anchors.push(Anchor::FenceOpen {
                at,
                hint,
                body_start,
            });
        }
        open = !open;
    }

    anchors.extend(
        text.match_indices(VERSION_PREFIX)
            .filter(|(at, _)| starts_line(text, *at))
            .map(|(at, _)| Anchor::VersionMarker { at }),
    );
    anchors.sort_by_key(Anchor::offset);
    anchors
}

/// Whether only spaces or tabs separate `at` from the start of its line.
fn starts_line(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .rev()
        .take_while(|c| *c != '\n')
        .all(|c| matches!(c, ' ' | '\t'))
}

/// Read a language hint starting at `from`.
///
/// The rest of the fence line is the hint when it holds only words (e.g.
/// `Pine Script`). Otherwise a single word directly after the fence counts
/// when whitespace or the end of the text follows it. Anything else is
/// block content.
fn read_hint(text: &str, from: usize) -> (String, usize) {
    let rest = &text[from..];
    let line_len = rest.find('\n').unwrap_or(rest.len());
    let line = &rest[..line_len];
    if line.chars().all(is_label_char) {
        return (line.trim().to_owned(), from.saturating_add(line_len));
    }

    let hint_len = rest
        .find(|c: char| !is_word_char(c))
        .unwrap_or(rest.len());
    if hint_len == 0 {
        return (String::new(), from);
    }
    let terminated = rest[hint_len..]
        .chars()
        .next()
        .map_or(true, char::is_whitespace);
    if terminated {
        (rest[..hint_len].to_owned(), from.saturating_add(hint_len))
    } else {
        (String::new(), from)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')
}

fn is_label_char(c: char) -> bool {
    is_word_char(c) || matches!(c, ' ' | '\t' | '\r' | '.' | '#')
}

/// Hints compare on lowercase alphanumerics, so `Pine Script`,
/// `pine-script` and `pinescript` are the same label.
fn canonical_hint(hint: &str) -> String {
    hint.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn hint_accepted(hint: &str, accepted: &[&str]) -> bool {
    let hint = canonical_hint(hint);
    hint.is_empty() || accepted.iter().any(|h| canonical_hint(h) == hint)
}

/// Remove section markers and surrounding whitespace from prose.
pub fn clean_explanation(text: &str) -> String {
    text.replace(ANALYSIS_MARKER, "")
        .replace(CODE_MARKER, "")
        .trim()
        .to_owned()
}

/// Extract Pine Script code and explanation from a raw response.
pub fn extract(raw: &str) -> Extraction {
    extract_with_hints(raw, PINE_FENCE_HINTS)
}

/// Extract code and explanation, accepting fenced blocks tagged with any of
/// `hints` (or untagged).
///
/// Rules, first match wins:
/// 1. fenced block: trimmed interior is the code, the rest is the explanation;
/// 2. version marker at a line start: code runs from the marker to the end
///    of the text, or to the closing fence when the marker sits inside a
///    block whose hint was rejected;
/// 3. otherwise the sentinel, with the whole response as explanation.
pub fn extract_with_hints(raw: &str, hints: &[&str]) -> Extraction {
    let anchors = scan(raw);

    if let Some((open_at, body_start, close_at)) = first_fenced_block(&anchors, hints) {
        let block_end = close_at.saturating_add(FENCE.len());
        let code = raw[body_start..close_at].trim().to_owned();
        let remaining = format!("{}{}", &raw[..open_at], &raw[block_end..]);
        return Extraction {
            code,
            explanation: clean_explanation(&remaining),
            status: ExtractionStatus::Fenced,
        };
    }

    let marker = anchors.iter().find_map(|a| match a {
        Anchor::VersionMarker { at } => Some(*at),
        _ => None,
    });
    if let Some(at) = marker {
        if let Some((open_at, body_start, close_at)) = enclosing_block(&anchors, at) {
            let block_end = close_at.saturating_add(FENCE.len());
            let remaining = format!(
                "{}{}{}",
                &raw[..open_at],
                &raw[body_start..at],
                &raw[block_end..]
            );
            return Extraction {
                code: raw[at..close_at].trim_end().to_owned(),
                explanation: clean_explanation(&remaining),
                status: ExtractionStatus::VersionMarker,
            };
        }
        return Extraction {
            code: raw[at..].to_owned(),
            explanation: clean_explanation(&raw[..at]),
            status: ExtractionStatus::VersionMarker,
        };
    }

    Extraction {
        code: EXTRACTION_FAILED_SENTINEL.to_owned(),
        explanation: raw.to_owned(),
        status: ExtractionStatus::Failed,
    }
}

/// First closed fence whose hint is accepted: `(open_at, body_start, close_at)`.
fn first_fenced_block(anchors: &[Anchor], hints: &[&str]) -> Option<(usize, usize, usize)> {
    let mut pending: Option<(usize, usize, bool)> = None;
    for anchor in anchors {
        match anchor {
            Anchor::FenceOpen {
                at,
                hint,
                body_start,
            } => pending = Some((*at, *body_start, hint_accepted(hint, hints))),
            Anchor::FenceClose { at } => {
                if let Some((open_at, body_start, true)) = pending.take() {
                    return Some((open_at, body_start, *at));
                }
            }
            Anchor::VersionMarker { .. } => {}
        }
    }
    None
}

/// The closed block around offset `at`: `(open_at, body_start, close_at)`.
fn enclosing_block(anchors: &[Anchor], at: usize) -> Option<(usize, usize, usize)> {
    let mut open: Option<(usize, usize)> = None;
    for anchor in anchors {
        match anchor {
            Anchor::FenceOpen {
                at: open_at,
                body_start,
                ..
            } if *open_at < at => open = Some((*open_at, *body_start)),
            Anchor::FenceClose { at: close_at } if *close_at < at => open = None,
            Anchor::FenceClose { at: close_at } => {
                return open.map(|(open_at, body_start)| (open_at, body_start, *close_at));
            }
            Anchor::FenceOpen { .. } => return None,
            Anchor::VersionMarker { .. } => {}
        }
    }
    None
}
