//! Prompt Construction
//!
//! Template loading and rendering, prompt variants for candidate generation,
//! and the fixed corrective prompt used by the repair step.

mod library;

pub use library::TemplateLibrary;

use crate::constants::ranking;
use crate::types::TaskFamily;

/// Directives appended to the base prompt, one per extra variant
const VARIANT_DIRECTIVES: [&str; ranking::MAX_CANDIDATES - 1] = [
    "Constraint: be concise yet complete.",
    "Constraint: respond with a single JSON object and nothing else.",
    "Constraint: double-check that every required field is present.",
];

/// Up to `n` prompt variants: the base prompt first, then the base prompt
/// with one directive appended each. Never more than
/// [`MAX_CANDIDATES`](ranking::MAX_CANDIDATES).
pub fn prompt_variants(base: &str, n: usize) -> Vec<String> {
    std::iter::once(base.to_string())
        .chain(
            VARIANT_DIRECTIVES
                .iter()
                .map(|directive| format!("{}\n{}", base, directive)),
        )
        .take(n.clamp(1, ranking::MAX_CANDIDATES))
        .collect()
}

/// Corrective re-prompt embedding the failing output verbatim
pub fn repair_prompt(family: &TaskFamily, bad_output: &str) -> String {
    format!(
        "You output invalid or non-conforming JSON for task '{family}'.\n\
         Fix ONLY the JSON structure to conform to the expected schema.\n\
         Do not add commentary or fences. Here is your previous output:\n\
         ---\n\
         {bad_output}\n\
         ---\n\
         Return corrected JSON only.\n"
    )
}
