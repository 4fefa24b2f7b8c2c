// crates/source-gate-core/src/core/decision.rs
// ============================================================================
// Module: Source Gate Policy Decisions
// Description: Transient outcome of evaluating one source operation.
// Purpose: Carry the outcome, matched rule, and resolved destination.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`PolicyDecision`] is produced per source operation per evaluation and is
//! never persisted. Convert decisions carry a destination whose identifier has
//! already been expanded and validated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::rules::RuleRef;
use crate::core::source::SourceAttrs;

// ============================================================================
// SECTION: Decision Types
// ============================================================================

/// Decision outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Source passes through unchanged.
    Allow,
    /// Source is rejected.
    Deny,
    /// Source is rewritten.
    Convert,
}

impl DecisionOutcome {
    /// Returns the outcome label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Convert => "convert",
        }
    }
}

/// Why a source was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// A deny rule matched.
    RuleMatched,
    /// No rule matched and the rule set defaults to deny.
    NoMatchingRule,
    /// The policy denies every source.
    PolicyDeniesAll,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RuleMatched => "denied by policy rule",
            Self::NoMatchingRule => "no matching rule",
            Self::PolicyDeniesAll => "policy denies all sources",
        })
    }
}

/// Destination resolved from a convert rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDestination {
    /// Expanded destination identifier.
    pub identifier: String,
    /// Attributes to set or overwrite.
    pub attrs: SourceAttrs,
}

/// Result of evaluating one source operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Pass through unchanged.
    Allow {
        /// Allow rule that matched, or `None` for the default decision.
        matched_rule: Option<RuleRef>,
    },
    /// Reject the source.
    Deny {
        /// Deny rule that matched, or `None` for the default decision.
        matched_rule: Option<RuleRef>,
        /// Denial reason.
        reason: DenyReason,
    },
    /// Rewrite the source.
    Convert {
        /// Convert rule that matched.
        matched_rule: RuleRef,
        /// Resolved destination.
        destination: ResolvedDestination,
    },
}

impl PolicyDecision {
    /// Returns the outcome label.
    #[must_use]
    pub const fn outcome(&self) -> DecisionOutcome {
        match self {
            Self::Allow { .. } => DecisionOutcome::Allow,
            Self::Deny { .. } => DecisionOutcome::Deny,
            Self::Convert { .. } => DecisionOutcome::Convert,
        }
    }

    /// Returns the matched rule, if any.
    #[must_use]
    pub const fn matched_rule(&self) -> Option<&RuleRef> {
        match self {
            Self::Allow {
                matched_rule,
            }
            | Self::Deny {
                matched_rule, ..
            } => matched_rule.as_ref(),
            Self::Convert {
                matched_rule, ..
            } => Some(matched_rule),
        }
    }

    /// Returns the resolved destination for convert decisions.
    #[must_use]
    pub const fn destination(&self) -> Option<&ResolvedDestination> {
        match self {
            Self::Convert {
                destination, ..
            } => Some(destination),
            Self::Allow { .. } | Self::Deny { .. } => None,
        }
    }
}
