// crates/source-gate-config/src/config.rs
// ============================================================================
// Module: Source Gate Configuration
// Description: Configuration loading and validation for Source Gate.
// Purpose: Provide strict, fail-closed config parsing and runtime builders.
// Dependencies: source-gate-core, source-gate-session, serde, toml
// ============================================================================

//! ## Overview
//! This module loads `source-gate.toml`, applies size and path limits, and
//! validates every section before anything is built. The loaded config then
//! builds the configured policy, audit sink, seed store, and enforcement
//! engine.
//!
//! Config inputs are untrusted: inline rules are compiled during validation
//! so a bad rule fails the load, not the first build.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use source_gate_core::DefaultDecision;
use source_gate_core::FileAuditSink;
use source_gate_core::NoopAuditSink;
use source_gate_core::PolicyAuditSink;
use source_gate_core::RuleSet;
use source_gate_core::RuleSpec;
use source_gate_core::SourcePolicyEngine;
use source_gate_core::StderrAuditSink;
use source_gate_session::TokenSeedStore;
use thiserror::Error;

use crate::document::DocumentError;
use crate::document::PolicyDocument;
use crate::policy::PolicyEngine;
use crate::policy::SourcePolicyMode;

// ============================================================================
// SECTION: Limits and Defaults
// ============================================================================

/// Default config file name.
const DEFAULT_CONFIG_NAME: &str = "source-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SOURCE_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Seed directory name under the home directory.
const DEFAULT_SEED_DIR_NAME: &str = ".source-gate";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Source Gate configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceGateConfig {
    /// Source policy configuration.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Audit output configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Session collaborator configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

impl SourceGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is the explicit argument, else [`CONFIG_ENV_VAR`], else
    /// `source-gate.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        self.audit.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Builds the enforcement engine with the configured policy and audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the policy or audit sink cannot be built.
    pub fn build_engine(&self) -> Result<SourcePolicyEngine<SourcePolicyMode>, ConfigError> {
        let policy = self.policy.build_policy()?;
        let audit = self.audit.build_sink()?;
        Ok(SourcePolicyEngine::with_audit(policy, audit))
    }
}

/// Source policy configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Policy engine selection.
    #[serde(default)]
    pub engine: PolicyEngine,
    /// Decision for unmatched sources (inline rules only).
    #[serde(default)]
    pub default: Option<DefaultDecision>,
    /// Path to a policy document.
    #[serde(default)]
    pub document: Option<String>,
    /// Inline rules in precedence order.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl PolicyConfig {
    /// Validates policy configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when policy settings are invalid.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.engine {
            PolicyEngine::Rules => {
                if let Some(document) = &self.document {
                    validate_path_string("policy.document", document)?;
                    if !self.rules.is_empty() {
                        return Err(ConfigError::Invalid(
                            "policy.document and policy.rules are mutually exclusive".to_string(),
                        ));
                    }
                    if self.default.is_some() {
                        return Err(ConfigError::Invalid(
                            "policy.default is set by the policy document".to_string(),
                        ));
                    }
                } else {
                    self.inline_rule_set()?;
                }
            }
            PolicyEngine::PermitAll | PolicyEngine::DenyAll => {
                if self.document.is_some() || !self.rules.is_empty() || self.default.is_some() {
                    return Err(ConfigError::Invalid(
                        "policy.document, policy.rules, and policy.default require engine=rules"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Builds the runtime source policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Policy`] when the document or rules are invalid.
    pub fn build_policy(&self) -> Result<SourcePolicyMode, ConfigError> {
        match self.engine {
            PolicyEngine::PermitAll => Ok(SourcePolicyMode::PermitAll),
            PolicyEngine::DenyAll => Ok(SourcePolicyMode::DenyAll),
            PolicyEngine::Rules => {
                let rules = match &self.document {
                    Some(path) => PolicyDocument::load(Path::new(path.trim()))?.compile()?,
                    None => self.inline_rule_set()?,
                };
                Ok(SourcePolicyMode::Rules(rules))
            }
        }
    }

    /// Compiles the inline rules.
    fn inline_rule_set(&self) -> Result<RuleSet, ConfigError> {
        RuleSet::with_default(self.rules.clone(), self.default.unwrap_or_default())
            .map_err(|err| ConfigError::Policy(DocumentError::Rules(err)))
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Audit disabled.
    #[default]
    None,
}

/// Audit output configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path (file sink only).
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.sink=file requires audit.path".to_string()))
            }
            (AuditSinkKind::Stderr | AuditSinkKind::None, Some(_)) => {
                Err(ConfigError::Invalid("audit.path only allowed when sink=file".to_string()))
            }
            (AuditSinkKind::Stderr | AuditSinkKind::None, None) => Ok(()),
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the audit file cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn PolicyAuditSink>, ConfigError> {
        match self.sink {
            AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkKind::File => {
                let path = self.path.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("audit.sink=file requires audit.path".to_string())
                })?;
                let sink = FileAuditSink::new(Path::new(path))
                    .map_err(|err| ConfigError::Io(format!("audit log {path}: {err}")))?;
                Ok(Arc::new(sink))
            }
        }
    }
}

/// Session collaborator configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Token seed directory; defaults to `$HOME/.source-gate`.
    #[serde(default)]
    pub seed_dir: Option<String>,
}

impl SessionConfig {
    /// Validates session configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(seed_dir) = &self.seed_dir {
            validate_path_string("session.seed_dir", seed_dir)?;
        }
        Ok(())
    }

    /// Returns the effective seed directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no directory is configured and
    /// `HOME` is unset.
    pub fn seed_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(seed_dir) = &self.seed_dir {
            return Ok(PathBuf::from(seed_dir.trim()));
        }
        match env::var_os("HOME") {
            Some(home) if !home.is_empty() => Ok(PathBuf::from(home).join(DEFAULT_SEED_DIR_NAME)),
            _ => Err(ConfigError::Invalid(
                "session.seed_dir is required when HOME is unset".to_string(),
            )),
        }
    }

    /// Builds the token seed store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the seed directory cannot be determined.
    pub fn build_seed_store(&self) -> Result<TokenSeedStore, ConfigError> {
        Ok(TokenSeedStore::new(self.seed_dir()?))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Policy document or rules are invalid.
    #[error(transparent)]
    Policy(#[from] DocumentError),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
