// crates/source-gate-core/src/core/mod.rs
// ============================================================================
// Module: Source Gate Core Types
// Description: Canonical identifier, source operation, rule, and decision types.
// Purpose: Provide stable, serializable types shared by the runtime and config.
// Dependencies: regex, serde, url
// ============================================================================

//! ## Overview
//! Core types define source identifiers, source operations, declarative rule
//! specifications, and policy decisions. Runtime modules compile and evaluate
//! these types; they hold no behavior that depends on loaded policy.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod decision;
pub mod identifiers;
pub mod rules;
pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use decision::DecisionOutcome;
pub use decision::DenyReason;
pub use decision::PolicyDecision;
pub use decision::ResolvedDestination;
pub use identifiers::Digest;
pub use identifiers::IdentifierError;
pub use identifiers::ImageReference;
pub use identifiers::SchemeFamily;
pub use identifiers::SourceIdentifier;
pub use identifiers::SourceLocator;
pub use identifiers::SourceScheme;
pub use rules::AttrConstraintSpec;
pub use rules::ConstraintCondition;
pub use rules::DefaultDecision;
pub use rules::DestinationSpec;
pub use rules::MatchType;
pub use rules::RuleAction;
pub use rules::RuleRef;
pub use rules::RuleSpec;
pub use rules::SelectorSpec;
pub use source::ATTR_GIT_FULL_URL;
pub use source::ATTR_HTTP_CHECKSUM;
pub use source::ATTR_HTTP_FILENAME;
pub use source::ATTR_IMAGE_RESOLVE_MODE;
pub use source::SourceAttrs;
pub use source::SourceOperation;
