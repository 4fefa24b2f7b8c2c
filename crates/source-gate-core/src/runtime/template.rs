// crates/source-gate-core/src/runtime/template.rs
// ============================================================================
// Module: Source Gate Destination Templates
// Description: Capture substitution into destination identifiers.
// Purpose: Keep substitution a pure string transform ahead of validation.
// Dependencies: crate::runtime::matcher, regex
// ============================================================================

//! ## Overview
//! Destination identifiers may reference selector captures with `$1`, `${1}`,
//! `$name`, or `${name}`; `$$` is a literal dollar sign. References to groups
//! that did not participate expand to the empty string, so braces are
//! recommended when a reference is followed by identifier characters.
//! Exact selectors produce no captures and their destinations are used
//! verbatim. Validation of the expanded result happens in the evaluator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::runtime::matcher::SelectorMatch;

// ============================================================================
// SECTION: Expansion
// ============================================================================

/// Expands capture references in `template`.
#[must_use]
pub fn expand_template(template: &str, matched: &SelectorMatch<'_>) -> String {
    match matched.captures() {
        Some(captures) => {
            let mut expanded = String::with_capacity(template.len());
            captures.expand(template, &mut expanded);
            expanded
        }
        None => template.to_string(),
    }
}

/// Resolves the destination identifier for a source.
///
/// An empty template keeps the source identifier unchanged.
#[must_use]
pub fn resolve_identifier(template: &str, source: &str, matched: &SelectorMatch<'_>) -> String {
    if template.is_empty() { source.to_string() } else { expand_template(template, matched) }
}
