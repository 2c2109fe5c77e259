//! Instruction assembly from policy fragments.
//!
//! Everything here is a pure function of its inputs. Empty or odd free text
//! is passed through verbatim.

use super::normalize::version_declaration;
use super::policy::{
    ANALYSIS_MARKER, ARCHITECTURE_RULES, CODE_MARKER, COMPLIANCE_DIRECTIVE, DOMAIN_GUIDELINES,
    ENHANCE_INSTRUCTION, PERSONA, QUALITY_CHECKLIST, SUPPLEMENTAL_CONTEXT_HEADER,
    SYNTAX_SAFETY_RULES,
};
use super::types::{ArtifactKind, CapabilityTier, GenerationRequest, SessionContext};

/// System instruction plus user content for one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    /// Composite system instruction.
    pub system: String,
    /// User-turn content.
    pub user: String,
}

/// Assemble the prompt for a fresh generation run.
///
/// Sections, in order:
/// 1. Persona and target (version marker, declaration keyword, overlay)
/// 2. Trading domain guidelines (expert tier only)
/// 3. Quality checklist, syntax-safety rules, architecture rules
/// 4. Supplemental context (if present), marked as overriding section 2
/// 5. Output format contract
pub fn assemble_generation(request: &GenerationRequest) -> AssembledPrompt {
    let mut sections = base_sections(
        request.artifact_kind,
        Some(request.overlay),
        &request.target_version,
        request.model.tier,
    );

    if let Some(context) = non_blank(request.supplemental_context.as_deref()) {
        sections.push(format!("{SUPPLEMENTAL_CONTEXT_HEADER}\n{context}"));
    }

    sections.push(output_contract(request.artifact_kind, &request.target_version));

    AssembledPrompt {
        system: sections.join("\n\n"),
        user: request.description.clone(),
    }
}

/// Assemble the prompt for one refinement turn.
///
/// The current code travels in the user content together with the
/// instruction. Supplemental context from the original request follows
/// under a compliance directive.
pub fn assemble_refinement(
    context: &SessionContext,
    current_code: &str,
    instruction: &str,
) -> AssembledPrompt {
    let mut sections = base_sections(
        context.artifact_kind,
        None,
        &context.target_version,
        context.model.tier,
    );
    sections.push(
        "## Task\nApply the requested change to the current code. Keep everything that the \
         change does not touch, and return the complete updated script."
            .to_owned(),
    );
    sections.push(output_contract(context.artifact_kind, &context.target_version));

    let mut user = format!(
        "## Current Code\n```pine\n{current_code}\n```\n\n## Requested Change\n{instruction}"
    );
    if let Some(extra) = non_blank(context.supplemental_context.as_deref()) {
        user.push_str(&format!("\n\n{COMPLIANCE_DIRECTIVE}\n{extra}"));
    }

    AssembledPrompt {
        system: sections.join("\n\n"),
        user,
    }
}

/// Assemble the prompt-enhancement call.
pub fn assemble_enhancement(text: &str) -> AssembledPrompt {
    AssembledPrompt {
        system: ENHANCE_INSTRUCTION.to_owned(),
        user: text.to_owned(),
    }
}

fn base_sections(
    kind: ArtifactKind,
    overlay: Option<bool>,
    target_version: &str,
    tier: CapabilityTier,
) -> Vec<String> {
    let declaration = version_declaration(target_version);
    let keyword = kind.keyword();

    let mut target = format!(
        "## Target\nThe first line of the script must be `{declaration}`.\n\
         The script declares exactly one `{keyword}(...)`."
    );
    if let Some(overlay) = overlay {
        target.push_str(&format!(" Pass `overlay={overlay}` to the declaration."));
    }

    let mut sections = vec![PERSONA.to_owned(), target];
    if tier.is_expert() {
        sections.push(DOMAIN_GUIDELINES.to_owned());
    }
    sections.push(QUALITY_CHECKLIST.to_owned());
    sections.push(SYNTAX_SAFETY_RULES.to_owned());
    sections.push(ARCHITECTURE_RULES.to_owned());
    sections
}

fn output_contract(kind: ArtifactKind, target_version: &str) -> String {
    let declaration = version_declaration(target_version);
    let keyword = kind.keyword();
    format!(
        "## Output Format\nRespond with exactly two sections.\n\
         {ANALYSIS_MARKER}\nA short explanation of the logic, inputs and signals.\n\
         {CODE_MARKER}\nA single fenced block:\n```pine\n{declaration}\n{keyword}(...)\n...\n```"
    )
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}
