// crates/source-gate-config/src/policy.rs
// ============================================================================
// Module: Source Policy Adapters
// Description: Configured policy engines for source enforcement.
// Purpose: Provide swappable, fail-closed policy evaluation for sources.
// Dependencies: source-gate-core, serde
// ============================================================================

//! ## Overview
//! The configured policy is one of three engines: permit every source, deny
//! every source, or evaluate a frozen rule set. All three implement
//! [`SourcePolicy`] so the enforcement engine is agnostic to the choice.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use source_gate_core::DenyReason;
use source_gate_core::EvaluateError;
use source_gate_core::PolicyDecision;
use source_gate_core::RuleSet;
use source_gate_core::SourceOperation;
use source_gate_core::SourcePolicy;
use source_gate_core::evaluate;

// ============================================================================
// SECTION: Policy Model
// ============================================================================

/// Policy engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEngine {
    /// Permit every source unchanged.
    PermitAll,
    /// Deny every source.
    DenyAll,
    /// Evaluate ordered rules.
    #[default]
    Rules,
}

/// Runtime policy built from configuration.
#[derive(Debug, Clone)]
pub enum SourcePolicyMode {
    /// Permit every source unchanged.
    PermitAll,
    /// Deny every source.
    DenyAll,
    /// Frozen rule set evaluation.
    Rules(RuleSet),
}

impl SourcePolicy for SourcePolicyMode {
    fn decide(&self, op: &SourceOperation) -> Result<PolicyDecision, EvaluateError> {
        match self {
            Self::PermitAll => Ok(PolicyDecision::Allow {
                matched_rule: None,
            }),
            Self::DenyAll => Ok(PolicyDecision::Deny {
                matched_rule: None,
                reason: DenyReason::PolicyDeniesAll,
            }),
            Self::Rules(rules) => evaluate(rules, op),
        }
    }
}
