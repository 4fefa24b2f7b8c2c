// crates/source-gate-session/src/lib.rs
// ============================================================================
// Module: Source Gate Session Library
// Description: Session credential collaborators for Source Gate.
// Purpose: Provide the file-backed host-scoped token seed store.
// Dependencies: source-gate-core
// ============================================================================

//! ## Overview
//! Session helpers used alongside source policy enforcement. The token seed
//! store implements [`source_gate_core::SeedProvider`] on top of a seed
//! directory shared by every process of the same user.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod token_seed;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use token_seed::LOCK_FILE_NAME;
pub use token_seed::LOCK_RETRY_ATTEMPTS;
pub use token_seed::LOCK_RETRY_DELAY;
pub use token_seed::SEED_FILE_NAME;
pub use token_seed::SEED_LEN;
pub use token_seed::TokenSeedStore;
