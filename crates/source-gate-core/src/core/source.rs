// crates/source-gate-core/src/core/source.rs
// ============================================================================
// Module: Source Gate Source Operations
// Description: Build-graph source operations inspected by the policy engine.
// Purpose: Carry the identifier and attributes of one external input.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`SourceOperation`] references one external build input. The graph
//! builder creates it, the policy engine may rewrite it once per evaluation
//! pass, and the solver consumes it read-only afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::IdentifierError;
use crate::core::identifiers::SourceIdentifier;

// ============================================================================
// SECTION: Attribute Keys
// ============================================================================

/// Expected checksum of an HTTP download (`algorithm:hex`).
pub const ATTR_HTTP_CHECKSUM: &str = "http.checksum";
/// File name to use for an HTTP download.
pub const ATTR_HTTP_FILENAME: &str = "http.filename";
/// Image resolve mode (`default`, `pull`, `local`).
pub const ATTR_IMAGE_RESOLVE_MODE: &str = "image.resolvemode";
/// Full URL of a git remote.
pub const ATTR_GIT_FULL_URL: &str = "git.fullurl";

// ============================================================================
// SECTION: Source Operation
// ============================================================================

/// Source attribute map keyed by attribute name.
pub type SourceAttrs = BTreeMap<String, String>;

/// One external input reference in the build graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOperation {
    /// Scheme-qualified identifier.
    pub identifier: String,
    /// Source attributes.
    #[serde(default)]
    pub attrs: SourceAttrs,
}

impl SourceOperation {
    /// Creates a source operation without attributes.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            attrs: SourceAttrs::new(),
        }
    }

    /// Adds an attribute, replacing any existing value.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Parses the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the identifier does not parse.
    pub fn parse_identifier(&self) -> Result<SourceIdentifier, IdentifierError> {
        SourceIdentifier::parse(&self.identifier)
    }
}
