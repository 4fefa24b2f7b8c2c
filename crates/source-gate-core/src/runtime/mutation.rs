// crates/source-gate-core/src/runtime/mutation.rs
// ============================================================================
// Module: Source Gate Mutation Engine
// Description: Applies convert destinations to source operations.
// Purpose: Rewrite identifiers and merge attributes per scheme, atomically.
// Dependencies: crate::core, tracing
// ============================================================================

//! ## Overview
//! Mutation behavior is dispatched on the source scheme through the closed
//! [`MutationStrategy`] set:
//! - reference schemes (`docker-image`, `oci-layout`) identify content by the
//!   full reference, so a differing destination wholly replaces the source,
//!   including any digest resolved earlier;
//! - location schemes (`http`, `https`, `git`, `local`) keep the identifier
//!   when it already equals the destination, never accept digest pins in the
//!   identifier, and merge attributes.
//!
//! The returned flag reports that a policy destination was applied, not that
//! bytes changed: a non-empty destination always yields `true`. All checks
//! run before the operation is written, so a failed mutation leaves it intact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use tracing::debug;

use crate::core::ATTR_HTTP_CHECKSUM;
use crate::core::Digest;
use crate::core::IdentifierError;
use crate::core::SchemeFamily;
use crate::core::SourceAttrs;
use crate::core::SourceIdentifier;
use crate::core::SourceOperation;
use crate::core::SourceScheme;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Mutation errors. The operation is left unmodified when any is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// Source identifier does not parse.
    #[error("source {identifier:?} cannot be mutated: {source}")]
    InvalidSource {
        /// Source identifier.
        identifier: String,
        /// Parse failure.
        source: IdentifierError,
    },
    /// Destination is malformed or belongs to another scheme family.
    #[error("invalid policy destination {destination:?} for source {identifier:?}: {reason}")]
    InvalidDestination {
        /// Source identifier.
        identifier: String,
        /// Destination identifier (or attribute assignment).
        destination: String,
        /// Failure detail.
        reason: String,
    },
    /// Destination asks for behavior the source scheme does not support.
    #[error("source {identifier:?} ({scheme}) does not support {reason}")]
    Unsupported {
        /// Source identifier.
        identifier: String,
        /// Source scheme.
        scheme: SourceScheme,
        /// Unsupported behavior.
        reason: String,
    },
}

// ============================================================================
// SECTION: Strategies
// ============================================================================

/// Scheme-specific mutation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStrategy {
    /// Identity is the full reference; the destination replaces it wholesale.
    ReplaceReference,
    /// Identity is a location; a differing destination relocates it.
    RewriteLocation,
}

impl MutationStrategy {
    /// Returns the strategy for a scheme.
    #[must_use]
    pub const fn for_scheme(scheme: SourceScheme) -> Self {
        match scheme {
            SourceScheme::DockerImage | SourceScheme::OciLayout => Self::ReplaceReference,
            SourceScheme::Git | SourceScheme::Http | SourceScheme::Https | SourceScheme::Local => {
                Self::RewriteLocation
            }
        }
    }

    /// Returns the replacement identifier, or `None` when it is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Unsupported`] when the destination needs digest
    /// semantics the scheme does not support.
    pub fn replacement(
        self,
        source: &SourceIdentifier,
        destination: &SourceIdentifier,
    ) -> Result<Option<String>, MutationError> {
        match self {
            Self::ReplaceReference => Ok(
                (destination.as_str() != source.as_str()).then(|| destination.as_str().to_string())
            ),
            Self::RewriteLocation => {
                if let Some(digest) = destination.digest_pin() {
                    let reason = if source.family() == SchemeFamily::Http {
                        format!("digest pin {digest} in the identifier; set {ATTR_HTTP_CHECKSUM}")
                    } else {
                        format!("digest pin {digest}; the scheme has no digest concept")
                    };
                    return Err(unsupported(source, reason));
                }
                Ok((destination.as_str() != source.as_str())
                    .then(|| destination.as_str().to_string()))
            }
        }
    }

    /// Returns `current` with the destination attributes merged in.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] when a key is empty, a key is namespaced for
    /// another scheme family, or a checksum is malformed.
    pub fn merge_attrs(
        self,
        source: &SourceIdentifier,
        current: &SourceAttrs,
        destination: &SourceAttrs,
    ) -> Result<SourceAttrs, MutationError> {
        let family = source.family();
        for (key, value) in destination {
            if key.is_empty() {
                return Err(invalid_destination(source, format!("={value}"), "empty attribute key"));
            }
            if foreign_attribute(family, key) {
                return Err(unsupported(source, format!("attribute {key:?}")));
            }
            if key == ATTR_HTTP_CHECKSUM
                && let Err(err) = Digest::parse(value)
            {
                return Err(invalid_destination(source, format!("{key}={value}"), &err.to_string()));
            }
        }
        let mut merged = current.clone();
        for (key, value) in destination {
            if merged.get(key) != Some(value) {
                debug!(identifier = source.as_str(), key = key.as_str(), "setting source attribute");
            }
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged)
    }
}

// ============================================================================
// SECTION: Mutation
// ============================================================================

/// Applies a destination to `op`.
///
/// Returns `true` when a non-empty destination was applied, even if the final
/// state equals the original, and `false` for an empty destination.
///
/// # Errors
///
/// Returns [`MutationError`] when the source or destination is invalid or the
/// scheme cannot express the destination; `op` is unchanged in that case.
pub fn mutate(
    op: &mut SourceOperation,
    destination_identifier: &str,
    destination_attrs: &SourceAttrs,
) -> Result<bool, MutationError> {
    if destination_identifier.is_empty() && destination_attrs.is_empty() {
        return Ok(false);
    }
    let source = op.parse_identifier().map_err(|err| MutationError::InvalidSource {
        identifier: op.identifier.clone(),
        source: err,
    })?;
    let strategy = MutationStrategy::for_scheme(source.scheme());
    let identifier = if destination_identifier.is_empty() {
        None
    } else {
        let destination = SourceIdentifier::parse(destination_identifier).map_err(|err| {
            invalid_destination(&source, destination_identifier.to_string(), &err.to_string())
        })?;
        if destination.family() != source.family() {
            return Err(invalid_destination(
                &source,
                destination_identifier.to_string(),
                &format!(
                    "scheme {} cannot replace scheme {}",
                    destination.scheme(),
                    source.scheme()
                ),
            ));
        }
        strategy.replacement(&source, &destination)?
    };
    let attrs = strategy.merge_attrs(&source, &op.attrs, destination_attrs)?;

    if let Some(identifier) = identifier {
        debug!(
            identifier = source.as_str(),
            destination = identifier.as_str(),
            "replacing source identifier"
        );
        op.identifier = identifier;
    }
    op.attrs = attrs;
    Ok(true)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when `key` is namespaced for a family other than `family`.
fn foreign_attribute(family: SchemeFamily, key: &str) -> bool {
    let owned = family.attr_prefixes().iter().any(|prefix| key.starts_with(prefix));
    !owned
        && SchemeFamily::ALL
            .iter()
            .flat_map(|other| other.attr_prefixes())
            .any(|prefix| key.starts_with(prefix))
}

/// Builds an unsupported-mutation error.
fn unsupported(source: &SourceIdentifier, reason: String) -> MutationError {
    MutationError::Unsupported {
        identifier: source.as_str().to_string(),
        scheme: source.scheme(),
        reason,
    }
}

/// Builds an invalid-destination error.
fn invalid_destination(
    source: &SourceIdentifier,
    destination: String,
    reason: &str,
) -> MutationError {
    MutationError::InvalidDestination {
        identifier: source.as_str().to_string(),
        destination,
        reason: reason.to_string(),
    }
}
