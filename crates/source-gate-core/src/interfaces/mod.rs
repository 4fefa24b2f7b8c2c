// crates/source-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Source Gate Interfaces
// Description: Backend-agnostic seams for policy decisions and session seeds.
// Purpose: Define the contract surfaces used by the enforcement engine.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Interfaces describe how Source Gate integrates with its callers and
//! collaborators without embedding their details. Implementations must be
//! deterministic and fail closed on invalid policy input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::PolicyDecision;
use crate::core::SourceOperation;
use crate::runtime::evaluator::EvaluateError;

// ============================================================================
// SECTION: Source Policy
// ============================================================================

/// Decides how a source operation is treated.
///
/// Implementations must be pure functions of their frozen state and the
/// operation: the same input always yields the same decision.
pub trait SourcePolicy: Send + Sync {
    /// Evaluates a source operation.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluateError`] when a matched rule is misconfigured for the
    /// operation (invalid or cross-scheme destination).
    fn decide(&self, op: &SourceOperation) -> Result<PolicyDecision, EvaluateError>;
}

// ============================================================================
// SECTION: Session Seeds
// ============================================================================

/// Seed provider errors.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Host name is empty or malformed.
    #[error("invalid seed host: {0}")]
    InvalidHost(String),
    /// Seed state could not be read or written.
    #[error("seed store io error: {0}")]
    Io(String),
    /// Seed state could not be encoded.
    #[error("seed store encoding error: {0}")]
    Encoding(String),
}

/// Provides stable, host-scoped random seeds used to derive session keys.
pub trait SeedProvider: Send + Sync {
    /// Returns the seed for `host`, creating and persisting one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError`] when the seed cannot be produced. Missing or
    /// corrupt prior state and unavailable locking are not errors.
    fn seed(&self, host: &str) -> Result<Vec<u8>, SeedError>;
}
