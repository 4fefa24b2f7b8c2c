// crates/source-gate-core/src/runtime/evaluator.rs
// ============================================================================
// Module: Source Gate Policy Evaluator
// Description: First-match-wins evaluation of a rule set against one source.
// Purpose: Produce allow, deny, or convert decisions deterministically.
// Dependencies: crate::{core, interfaces}, crate::runtime::{rule_set, template}
// ============================================================================

//! ## Overview
//! Evaluation walks the rule set in declaration order and stops at the first
//! matching rule. Convert destinations are expanded and then validated in
//! separate stages: the expanded identifier must parse and must stay within
//! the source's scheme family. Misconfigured destinations are reported as
//! [`EvaluateError`], never downgraded to "no match".
//!
//! Evaluation holds no state; the decision is a pure function of the rule set
//! and the operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::DefaultDecision;
use crate::core::DenyReason;
use crate::core::IdentifierError;
use crate::core::PolicyDecision;
use crate::core::ResolvedDestination;
use crate::core::RuleAction;
use crate::core::RuleRef;
use crate::core::SchemeFamily;
use crate::core::SourceIdentifier;
use crate::core::SourceOperation;
use crate::interfaces::SourcePolicy;
use crate::runtime::rule_set::RuleSet;
use crate::runtime::template::resolve_identifier;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Evaluation-time configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluateError {
    /// Source identifier cannot be parsed for conversion.
    #[error("{rule} cannot convert source {identifier:?}: {source}")]
    InvalidSource {
        /// Source identifier.
        identifier: String,
        /// Matched rule.
        rule: RuleRef,
        /// Parse failure.
        source: IdentifierError,
    },
    /// Expanded destination identifier does not parse.
    #[error("{rule} produced invalid destination {destination:?} for source {identifier:?}: {source}")]
    InvalidDestination {
        /// Source identifier.
        identifier: String,
        /// Expanded destination identifier.
        destination: String,
        /// Matched rule.
        rule: RuleRef,
        /// Parse failure.
        source: IdentifierError,
    },
    /// Destination belongs to a different scheme family.
    #[error(
        "{rule} converts {identifier:?} ({source_family}) into {destination:?} \
         ({destination_family}); cross-scheme conversion is not allowed"
    )]
    CrossScheme {
        /// Source identifier.
        identifier: String,
        /// Expanded destination identifier.
        destination: String,
        /// Matched rule.
        rule: RuleRef,
        /// Family of the source.
        source_family: SchemeFamily,
        /// Family of the destination.
        destination_family: SchemeFamily,
    },
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates `op` against `rules`.
///
/// # Errors
///
/// Returns [`EvaluateError`] when the matching convert rule resolves to an
/// invalid or cross-scheme destination.
pub fn evaluate(rules: &RuleSet, op: &SourceOperation) -> Result<PolicyDecision, EvaluateError> {
    let Some((rule, matched)) = rules.first_match(&op.identifier, &op.attrs) else {
        return Ok(match rules.default_decision() {
            DefaultDecision::Allow => PolicyDecision::Allow {
                matched_rule: None,
            },
            DefaultDecision::Deny => PolicyDecision::Deny {
                matched_rule: None,
                reason: DenyReason::NoMatchingRule,
            },
        });
    };
    let matched_rule = rule.reference().clone();
    match (rule.action(), rule.destination()) {
        (RuleAction::Allow, _) => Ok(PolicyDecision::Allow {
            matched_rule: Some(matched_rule),
        }),
        (RuleAction::Deny, _) => Ok(PolicyDecision::Deny {
            matched_rule: Some(matched_rule),
            reason: DenyReason::RuleMatched,
        }),
        (RuleAction::Convert, destination) => {
            let destination = destination.cloned().unwrap_or_default();
            let identifier = resolve_identifier(&destination.identifier, &op.identifier, &matched);
            validate_destination(&op.identifier, &identifier, &matched_rule)?;
            Ok(PolicyDecision::Convert {
                matched_rule,
                destination: ResolvedDestination {
                    identifier,
                    attrs: destination.attrs,
                },
            })
        }
    }
}

/// Validates an expanded destination against the source scheme family.
fn validate_destination(
    source: &str,
    destination: &str,
    rule: &RuleRef,
) -> Result<(), EvaluateError> {
    let source_id =
        SourceIdentifier::parse(source).map_err(|err| EvaluateError::InvalidSource {
            identifier: source.to_string(),
            rule: rule.clone(),
            source: err,
        })?;
    let destination_id =
        SourceIdentifier::parse(destination).map_err(|err| EvaluateError::InvalidDestination {
            identifier: source.to_string(),
            destination: destination.to_string(),
            rule: rule.clone(),
            source: err,
        })?;
    if source_id.family() != destination_id.family() {
        return Err(EvaluateError::CrossScheme {
            identifier: source.to_string(),
            destination: destination.to_string(),
            rule: rule.clone(),
            source_family: source_id.family(),
            destination_family: destination_id.family(),
        });
    }
    Ok(())
}

impl SourcePolicy for RuleSet {
    fn decide(&self, op: &SourceOperation) -> Result<PolicyDecision, EvaluateError> {
        evaluate(self, op)
    }
}
