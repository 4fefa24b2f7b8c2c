// crates/source-gate-core/src/lib.rs
// ============================================================================
// Module: Source Gate Core Library
// Description: Public API surface for the Source Gate policy engine.
// Purpose: Expose core types, interfaces, runtime helpers, and audit sinks.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Source Gate checks every external build input (images, downloads, git
//! repositories, local contexts) against an ordered set of administrator
//! rules before a build graph executes, and rewrites matched inputs into a
//! pinned or otherwise compliant form. Evaluation and mutation are pure and
//! deterministic; invalid policy fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::PolicyAuditEvent;
pub use audit::PolicyAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::SeedError;
pub use interfaces::SeedProvider;
pub use interfaces::SourcePolicy;
pub use runtime::Enforcement;
pub use runtime::EvaluateError;
pub use runtime::MutationError;
pub use runtime::PolicyViolation;
pub use runtime::RuleSet;
pub use runtime::RuleSetError;
pub use runtime::SourcePolicyEngine;
pub use runtime::SourcePolicyError;
pub use runtime::evaluate;
pub use runtime::matches;
pub use runtime::mutate;
