//! Deterministic clean-up of extracted script text.
//!
//! [`normalize`] is idempotent: feeding its output back in with the same
//! target version returns the same text.

/// Prefix of a Pine Script version declaration line.
pub const VERSION_PREFIX: &str = "//@version=";

/// Version number used when the target tag carries no digits.
pub const DEFAULT_VERSION_NUMBER: &str = "6";

/// Maximum consecutive blank lines kept in normalized output.
const MAX_BLANK_RUN: usize = 2;

/// First run of ASCII digits in a version tag (`"v6"` → `"6"`).
pub fn version_number(target_version: &str) -> &str {
    let Some(start) = target_version.find(|c: char| c.is_ascii_digit()) else {
        return DEFAULT_VERSION_NUMBER;
    };
    let rest = &target_version[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    &rest[..end]
}

/// The declaration line for a target version tag (`"v6"` → `//@version=6`).
pub fn version_declaration(target_version: &str) -> String {
    format!("{VERSION_PREFIX}{}", version_number(target_version))
}

/// Whether a line is a version declaration.
pub fn is_version_line(line: &str) -> bool {
    line.trim_start().starts_with(VERSION_PREFIX)
}

/// Normalize extracted code for a target version.
///
/// 1. Every version declaration line is removed.
/// 2. A single declaration for `target_version` becomes the first line.
/// 3. Runs of three or more blank lines collapse to two.
///
/// Line endings become `\n` and trailing whitespace at the end is dropped.
pub fn normalize(code: &str, target_version: &str) -> String {
    let unified = code.replace("\r\n", "\n");

    let mut body: Vec<&str> = Vec::new();
    let mut blank_run: usize = 0;
    for line in unified.lines().filter(|line| !is_version_line(line)) {
        if line.trim().is_empty() {
            if body.is_empty() {
                continue;
            }
            blank_run = blank_run.saturating_add(1);
            if blank_run <= MAX_BLANK_RUN {
                body.push("");
            }
        } else {
            blank_run = 0;
            body.push(line);
        }
    }

    let body = body.join("\n");
    let body = body.trim_end();

    let declaration = version_declaration(target_version);
    if body.is_empty() {
        declaration
    } else {
        format!("{declaration}\n{body}")
    }
}
