// crates/source-gate-config/src/lib.rs
// ============================================================================
// Module: Source Gate Config Library
// Description: Canonical config model, policy documents, and validation.
// Purpose: Single source of truth for source-gate.toml semantics.
// Dependencies: source-gate-core, source-gate-session, serde, toml
// ============================================================================

//! ## Overview
//! `source-gate-config` defines the configuration model for Source Gate and
//! the policy document format. Validation is strict and fail-closed; builders
//! turn a validated config into the runtime policy, audit sink, seed store,
//! and enforcement engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod document;
pub mod policy;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use document::*;
pub use policy::*;
