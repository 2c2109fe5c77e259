//! Reusable instruction fragments.
//!
//! Pure data. The prompt assembler decides which fragments to include and
//! in what order; nothing here is formatted per request.

/// Trading-domain guidelines, included only for expert-tier models.
pub const DOMAIN_GUIDELINES: &str = "\
## Trading Domain Guidelines (mandatory)
- Risk management: every entry must have a defined exit. Expose stop-loss and \
take-profit as inputs (percent or ATR multiple) and apply them with \
`strategy.exit` or plotted levels.
- Position sizing: prefer `strategy.percent_of_equity` sizing and expose the \
percentage as an input. Never size positions with magic numbers.
- Avoid repainting: confirm signals on closed bars (`barstate.isconfirmed`) and \
never request future data; `request.security` calls must use \
`lookahead = barmerge.lookahead_off`.
- Dashboard: render a compact `table` in a chart corner summarising the current \
signal state and key parameter values. Update it only on `barstate.islast`.
- Alerts: provide `alertcondition` calls for every entry and exit signal.";

/// Quality checklist, always included.
pub const QUALITY_CHECKLIST: &str = "\
## Quality Checklist
- Exactly one top-level declaration statement.
- The declaration `shorttitle` is at most 10 characters.
- Every user-tunable value is an `input.*` with a title, a sane default and, \
where meaningful, `minval`/`maxval`.
- Plots have titles and explicit colors.
- No unused variables, inputs or functions.";

/// Syntax-safety rules, always included.
pub const SYNTAX_SAFETY_RULES: &str = "\
## Syntax Safety Rules
- Parentheses, brackets and quotes must balance on every line.
- Multi-line expressions continue with an indent that is not a multiple of four.
- Do not call functions that modify history (`ta.*`) inside conditional blocks; \
compute them at top level and reference the result.
- Use `na()` to test for missing values; never compare with `== na`.
- Declare mutable state with `var` or `varip` only when persistence across bars \
is required.";

/// Architecture rules, always included.
pub const ARCHITECTURE_RULES: &str = "\
## Architecture Rules
- Order sections as: declaration, inputs, calculations, signals, plots, \
alerts, dashboard.
- Wrap reusable logic in user-defined functions declared before use.
- Keep the script self-contained: no library imports.";

/// Heading of the supplemental-context block.
pub const SUPPLEMENTAL_CONTEXT_HEADER: &str = "\
## Supplemental Context (takes precedence over the Trading Domain Guidelines on conflict)";

/// Directive carried with supplemental context during refinement.
pub const COMPLIANCE_DIRECTIVE: &str = "\
Maintain compliance with the supplemental context below while applying the change.";

/// Section marker that opens the explanation part of a response.
pub const ANALYSIS_MARKER: &str = "[ANALYSIS]";

/// Section marker that opens the code part of a response.
pub const CODE_MARKER: &str = "[CODE]";

/// Persona line that opens every generation and refinement instruction.
pub const PERSONA: &str = "You are an expert Pine Script developer writing production-grade TradingView scripts.";

/// System instruction for the prompt-enhancement call.
pub const ENHANCE_INSTRUCTION: &str = "\
You rewrite rough trading-script ideas into precise specifications. Keep the \
user's intent, make entry and exit conditions, inputs and visual outputs \
explicit, and reply with the rewritten specification only, without preamble.";

/// Instruction for the document-analysis call.
pub const DOCUMENT_ANALYSIS_INSTRUCTION: &str = "\
Analyse the attached document describing a trading method. Decide whether it \
describes a backtestable strategy (\"strategy\") or a visual indicator \
(\"indicator\"), whether it should draw over price (overlay), and write a \
detailed prompt that a Pine Script developer could implement directly. \
Respond with a JSON object with the fields artifactKind, overlay and generatedPrompt.";
