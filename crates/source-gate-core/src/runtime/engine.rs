// crates/source-gate-core/src/runtime/engine.rs
// ============================================================================
// Module: Source Gate Enforcement Engine
// Description: Orchestrator-facing evaluate-then-mutate facade.
// Purpose: Enforce a frozen policy on each source operation with auditing.
// Dependencies: crate::{audit, core, interfaces}, crate::runtime::mutation
// ============================================================================

//! ## Overview
//! The enforcement engine performs the per-operation control flow: evaluate
//! the policy, abort on deny, hand convert decisions to the mutation engine,
//! and pass everything else through untouched. Every enforced operation emits
//! exactly one audit event.
//!
//! The engine holds only the frozen policy and a shared audit sink, so a
//! single instance may enforce independent operations from many threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::audit::NoopAuditSink;
use crate::audit::PolicyAuditEvent;
use crate::audit::PolicyAuditEventParams;
use crate::audit::PolicyAuditSink;
use crate::core::DenyReason;
use crate::core::PolicyDecision;
use crate::core::RuleRef;
use crate::core::SourceOperation;
use crate::interfaces::SourcePolicy;
use crate::runtime::evaluator::EvaluateError;
use crate::runtime::mutation::MutationError;
use crate::runtime::mutation::mutate;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Deny decision surfaced as a build-aborting error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    /// Denied source identifier.
    pub identifier: String,
    /// Rule that denied the source, if one matched.
    pub rule: Option<RuleRef>,
    /// Denial reason.
    pub reason: DenyReason,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "source {:?} denied by {rule}", self.identifier),
            None => write!(f, "source {:?} denied: {}", self.identifier, self.reason),
        }
    }
}

impl std::error::Error for PolicyViolation {}

/// Source policy enforcement errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourcePolicyError {
    /// Policy denied the source.
    #[error("source policy violation: {0}")]
    Denied(#[from] PolicyViolation),
    /// Matched rule is misconfigured for the source.
    #[error("source policy configuration error: {0}")]
    Configuration(#[from] EvaluateError),
    /// Destination could not be applied.
    #[error("source policy mutation error: {0}")]
    Mutation(#[from] MutationError),
}

impl SourcePolicyError {
    /// Returns a stable error kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Denied(_) => "policy_violation",
            Self::Configuration(_) => "configuration",
            Self::Mutation(_) => "mutation",
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Result of enforcing policy on one source operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforcement {
    /// Policy decision that was enforced.
    pub decision: PolicyDecision,
    /// Whether a policy mutation was applied.
    pub mutated: bool,
}

/// Enforces a frozen source policy.
pub struct SourcePolicyEngine<P> {
    /// Frozen policy.
    policy: P,
    /// Audit sink for enforcement events.
    audit: Arc<dyn PolicyAuditSink>,
}

impl<P: SourcePolicy> SourcePolicyEngine<P> {
    /// Creates an engine without audit output.
    #[must_use]
    pub fn new(policy: P) -> Self {
        Self::with_audit(policy, Arc::new(NoopAuditSink))
    }

    /// Creates an engine that records audit events to `audit`.
    #[must_use]
    pub fn with_audit(policy: P, audit: Arc<dyn PolicyAuditSink>) -> Self {
        Self {
            policy,
            audit,
        }
    }

    /// Returns the enforced policy.
    #[must_use]
    pub const fn policy(&self) -> &P {
        &self.policy
    }

    /// Enforces policy on `op`, rewriting it in place on convert decisions.
    ///
    /// # Errors
    ///
    /// Returns [`SourcePolicyError::Denied`] for deny decisions,
    /// [`SourcePolicyError::Configuration`] for misconfigured rules, and
    /// [`SourcePolicyError::Mutation`] when the destination cannot be applied.
    /// `op` is unchanged whenever an error is returned.
    pub fn enforce(&self, op: &mut SourceOperation) -> Result<Enforcement, SourcePolicyError> {
        let original = op.identifier.clone();
        let decision = match self.policy.decide(op) {
            Ok(decision) => decision,
            Err(err) => {
                let err = SourcePolicyError::from(err);
                self.record(&original, None, false, None, Some(err.kind()));
                return Err(err);
            }
        };
        let mutated = match &decision {
            PolicyDecision::Allow { .. } => false,
            PolicyDecision::Deny {
                matched_rule,
                reason,
            } => {
                let err = SourcePolicyError::from(PolicyViolation {
                    identifier: original.clone(),
                    rule: matched_rule.clone(),
                    reason: *reason,
                });
                self.record(&original, Some(&decision), false, None, Some(err.kind()));
                return Err(err);
            }
            PolicyDecision::Convert {
                destination, ..
            } => match mutate(op, &destination.identifier, &destination.attrs) {
                Ok(mutated) => mutated,
                Err(err) => {
                    let err = SourcePolicyError::from(err);
                    self.record(&original, Some(&decision), false, None, Some(err.kind()));
                    return Err(err);
                }
            },
        };
        let result_identifier = (op.identifier != original).then(|| op.identifier.clone());
        self.record(&original, Some(&decision), mutated, result_identifier, None);
        Ok(Enforcement {
            decision,
            mutated,
        })
    }

    /// Enforces policy on every operation in order and returns how many were
    /// mutated. Stops at the first error; earlier operations keep their
    /// rewrites.
    ///
    /// # Errors
    ///
    /// Returns the first [`SourcePolicyError`] encountered.
    pub fn enforce_all(&self, ops: &mut [SourceOperation]) -> Result<usize, SourcePolicyError> {
        let mut mutated = 0;
        for op in ops {
            if self.enforce(op)?.mutated {
                mutated += 1;
            }
        }
        Ok(mutated)
    }

    /// Records one audit event.
    fn record(
        &self,
        identifier: &str,
        decision: Option<&PolicyDecision>,
        mutated: bool,
        result_identifier: Option<String>,
        error_kind: Option<&'static str>,
    ) {
        let rule = decision.and_then(PolicyDecision::matched_rule);
        let deny_reason = match decision {
            Some(PolicyDecision::Deny {
                reason, ..
            }) => Some(*reason),
            _ => None,
        };
        self.audit.record(&PolicyAuditEvent::new(PolicyAuditEventParams {
            identifier: identifier.to_string(),
            outcome: decision.map(PolicyDecision::outcome),
            deny_reason,
            rule_index: rule.map(|rule| rule.index),
            rule_name: rule.and_then(|rule| rule.name.clone()),
            mutated,
            result_identifier,
            error_kind,
        }));
    }
}
