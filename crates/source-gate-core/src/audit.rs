// crates/source-gate-core/src/audit.rs
// ============================================================================
// Module: Source Gate Audit Logging
// Description: Structured audit events for source policy enforcement.
// Purpose: Emit one JSON line per enforced source without hard dependencies.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! This module defines the enforcement audit event and its sinks. It is
//! intentionally lightweight so deployments can route events to their
//! preferred logging pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::DecisionOutcome;
use crate::core::DenyReason;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Source policy audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Source identifier before enforcement.
    pub identifier: String,
    /// Decision outcome when evaluation succeeded.
    pub outcome: Option<DecisionOutcome>,
    /// Denial reason for deny outcomes.
    pub deny_reason: Option<DenyReason>,
    /// Index of the matched rule.
    pub rule_index: Option<usize>,
    /// Name of the matched rule.
    pub rule_name: Option<String>,
    /// Whether a policy mutation was applied.
    pub mutated: bool,
    /// Source identifier after enforcement when it changed.
    pub result_identifier: Option<String>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

/// Inputs required to construct an audit event.
pub struct PolicyAuditEventParams {
    /// Source identifier before enforcement.
    pub identifier: String,
    /// Decision outcome when evaluation succeeded.
    pub outcome: Option<DecisionOutcome>,
    /// Denial reason for deny outcomes.
    pub deny_reason: Option<DenyReason>,
    /// Index of the matched rule.
    pub rule_index: Option<usize>,
    /// Name of the matched rule.
    pub rule_name: Option<String>,
    /// Whether a policy mutation was applied.
    pub mutated: bool,
    /// Source identifier after enforcement when it changed.
    pub result_identifier: Option<String>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

impl PolicyAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: PolicyAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "source_policy",
            timestamp_ms,
            identifier: params.identifier,
            outcome: params.outcome,
            deny_reason: params.deny_reason,
            rule_index: params.rule_index,
            rule_name: params.rule_name,
            mutated: params.mutated,
            result_identifier: params.result_identifier,
            error_kind: params.error_kind,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for source policy events.
pub trait PolicyAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &PolicyAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl PolicyAuditSink for StderrAuditSink {
    fn record(&self, event: &PolicyAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl PolicyAuditSink for FileAuditSink {
    fn record(&self, event: &PolicyAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl PolicyAuditSink for NoopAuditSink {
    fn record(&self, _event: &PolicyAuditEvent) {}
}
