// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Instruction appended to every prompt that returns markup.
pub const MARKUP_ONLY_INSTRUCTION: &str = "\
    Return ONLY the final text. Do NOT wrap it in markdown code fences. \
    Do NOT add explanations, headings, or commentary before or after it.";

/// Instruction that keeps LaTeX structure intact when rewriting a fragment.
pub const LATEX_PRESERVATION_INSTRUCTION: &str = "\
    CRITICAL: If the input contains LaTeX, keep every command, environment and brace \
    balanced exactly as in the input structure. Every \\begin{...} must have its \\end{...}. \
    Never add \\section commands, a preamble, or \\begin{document}.";

/// Fills `{placeholder}` slots in one left-to-right pass, so text substituted
/// for one slot is never re-scanned for another (a job description containing
/// the literal `{section_content}` stays as written). Unknown slots are kept.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let slot = after
            .find('}')
            .map(|close| &after[..close])
            .and_then(|key| values.iter().find(|(k, _)| *k == key));

        match slot {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
