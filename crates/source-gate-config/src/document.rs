// crates/source-gate-config/src/document.rs
// ============================================================================
// Module: Source Policy Documents
// Description: Versioned rule documents loaded from TOML or JSON files.
// Purpose: Parse, bound, and compile administrator policy into a rule set.
// Dependencies: source-gate-core, serde, serde_json, toml
// ============================================================================

//! ## Overview
//! A policy document is a versioned, ordered list of rules plus the decision
//! for unmatched sources. The format is chosen by file extension (`.toml` or
//! `.json`). Documents are size-bounded and must be UTF-8; unknown fields are
//! rejected. Compiling a document validates every rule at once, so a single
//! invalid rule rejects the document.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use source_gate_core::DefaultDecision;
use source_gate_core::RuleSet;
use source_gate_core::RuleSetError;
use source_gate_core::RuleSpec;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Supported policy document version.
pub const POLICY_DOCUMENT_VERSION: u32 = 1;
/// Maximum policy document size in bytes.
pub const MAX_POLICY_DOCUMENT_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy document errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// I/O failure while reading the document.
    #[error("policy document io error: {0}")]
    Io(String),
    /// Document could not be parsed.
    #[error("policy document parse error: {0}")]
    Parse(String),
    /// Document violates format limits.
    #[error("invalid policy document: {0}")]
    Invalid(String),
    /// Document rules failed to compile.
    #[error("invalid policy rules: {0}")]
    Rules(#[from] RuleSetError),
}

// ============================================================================
// SECTION: Document Model
// ============================================================================

/// Serialization format of a policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// TOML document.
    Toml,
    /// JSON document.
    Json,
}

impl DocumentFormat {
    /// Selects the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Invalid`] for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            _ => Err(DocumentError::Invalid(format!(
                "policy document {} must have a .toml or .json extension",
                path.display()
            ))),
        }
    }
}

/// Versioned source policy document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    /// Document format version.
    pub version: u32,
    /// Decision for sources no rule matches.
    #[serde(default)]
    pub default: DefaultDecision,
    /// Rules in precedence order.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl PolicyDocument {
    /// Loads and validates a document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the file cannot be read, is too large,
    /// is not UTF-8, or does not parse.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let format = DocumentFormat::from_path(path)?;
        let bytes = fs::read(path)
            .map_err(|err| DocumentError::Io(format!("{}: {err}", path.display())))?;
        if bytes.len() > MAX_POLICY_DOCUMENT_SIZE {
            return Err(DocumentError::Invalid("policy document exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| DocumentError::Invalid("policy document must be utf-8".to_string()))?;
        Self::parse(content, format)
    }

    /// Parses and validates a document in the given format.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the content does not parse or declares
    /// an unsupported version.
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self, DocumentError> {
        match format {
            DocumentFormat::Toml => Self::from_toml_str(content),
            DocumentFormat::Json => Self::from_json_str(content),
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the content is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self, DocumentError> {
        let document: Self =
            toml::from_str(content).map_err(|err| DocumentError::Parse(err.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the content is invalid.
    pub fn from_json_str(content: &str) -> Result<Self, DocumentError> {
        let document: Self =
            serde_json::from_str(content).map_err(|err| DocumentError::Parse(err.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    /// Checks the document version.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Invalid`] for unsupported versions.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.version != POLICY_DOCUMENT_VERSION {
            return Err(DocumentError::Invalid(format!(
                "unsupported policy document version {}; expected {POLICY_DOCUMENT_VERSION}",
                self.version
            )));
        }
        Ok(())
    }

    /// Compiles the document into a frozen rule set.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Rules`] when any rule is invalid.
    pub fn compile(self) -> Result<RuleSet, DocumentError> {
        Ok(RuleSet::with_default(self.rules, self.default)?)
    }
}
