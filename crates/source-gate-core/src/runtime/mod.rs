// crates/source-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Source Gate Runtime
// Description: Selector matching, rule evaluation, mutation, and enforcement.
// Purpose: Apply a frozen source policy to source operations.
// Dependencies: crate::{audit, core, interfaces}, regex, tracing
// ============================================================================

//! ## Overview
//! Runtime modules compile rule specifications into a frozen [`RuleSet`],
//! evaluate it first-match-wins, and rewrite matched sources. Matching,
//! template expansion, and destination validation are separate stages so each
//! can be tested on its own.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod engine;
pub mod evaluator;
pub mod matcher;
pub mod mutation;
pub mod rule_set;
pub mod template;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::Enforcement;
pub use engine::PolicyViolation;
pub use engine::SourcePolicyEngine;
pub use engine::SourcePolicyError;
pub use evaluator::EvaluateError;
pub use evaluator::evaluate;
pub use matcher::Selector;
pub use matcher::SelectorError;
pub use matcher::SelectorMatch;
pub use matcher::matches;
pub use mutation::MutationError;
pub use mutation::MutationStrategy;
pub use mutation::mutate;
pub use rule_set::MAX_RULES;
pub use rule_set::Rule;
pub use rule_set::RuleSet;
pub use rule_set::RuleSetError;
pub use template::expand_template;
