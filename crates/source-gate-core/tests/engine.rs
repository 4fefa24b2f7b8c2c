// crates/source-gate-core/tests/engine.rs
// ============================================================================
// Module: Enforcement Engine Tests
// Description: Evaluate-then-mutate control flow, auditing, and concurrency.
// Purpose: Ensure the engine aborts on deny and rewrites on convert.
// Dependencies: source-gate-core, tempfile
// ============================================================================

//! Enforcement engine tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use source_gate_core::ATTR_HTTP_CHECKSUM;
use source_gate_core::DecisionOutcome;
use source_gate_core::DenyReason;
use source_gate_core::DestinationSpec;
use source_gate_core::FileAuditSink;
use source_gate_core::PolicyAuditEvent;
use source_gate_core::PolicyAuditSink;
use source_gate_core::PolicyDecision;
use source_gate_core::RuleSet;
use source_gate_core::RuleSpec;
use source_gate_core::SelectorSpec;
use source_gate_core::SourceOperation;
use source_gate_core::SourcePolicyEngine;
use source_gate_core::SourcePolicyError;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const PINNED: &str = "sha256:3614ca5eacf0a3a1bcc361c939202a974b4902b9334ff36eb29ffe9011aaad83";
const README: &str = "https://raw.githubusercontent.com/moby/buildkit/v0.10.1/README.md";
const README_CHECKSUM: &str =
    "sha256:6e4b94fc270e708e1068be28bd3551dc6917a4fc5a61293d51bb36e6b75c4b53";

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<PolicyAuditEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<PolicyAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl PolicyAuditSink for RecordingSink {
    fn record(&self, event: &PolicyAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn sample_rules() -> RuleSet {
    RuleSet::new([
        RuleSpec::deny(SelectorSpec::wildcard("docker-image://docker.io/evil/**")).named("no-evil"),
        RuleSpec::convert(
            SelectorSpec::wildcard("docker-image://docker.io/library/busybox:*"),
            DestinationSpec::identifier(format!("docker-image://docker.io/library/busybox:${{1}}@{PINNED}")),
        )
        .named("pin-busybox"),
        RuleSpec::convert(
            SelectorSpec::exact(README),
            DestinationSpec::default().with_attr(ATTR_HTTP_CHECKSUM, README_CHECKSUM),
        ),
        RuleSpec::convert(
            SelectorSpec::wildcard("docker-image://docker.io/broken/*"),
            DestinationSpec::identifier("git://github.com/broken/${1}"),
        ),
    ])
    .unwrap()
}

// ============================================================================
// SECTION: Control Flow
// ============================================================================

#[test]
fn convert_rewrites_operation_in_place() {
    let engine = SourcePolicyEngine::new(sample_rules());
    let mut op = SourceOperation::new("docker-image://docker.io/library/busybox:1.34.1-uclibc");
    let enforcement = engine.enforce(&mut op).unwrap();
    assert!(enforcement.mutated);
    assert_eq!(enforcement.decision.outcome(), DecisionOutcome::Convert);
    assert_eq!(op.identifier, format!("docker-image://docker.io/library/busybox:1.34.1-uclibc@{PINNED}"));
}

#[test]
fn unmatched_sources_pass_through_untouched() {
    let engine = SourcePolicyEngine::new(sample_rules());
    let mut op = SourceOperation::new("git://github.com/moby/buildkit#v0.10.1");
    let before = op.clone();
    let enforcement = engine.enforce(&mut op).unwrap();
    assert!(!enforcement.mutated);
    assert_eq!(enforcement.decision, PolicyDecision::Allow { matched_rule: None });
    assert_eq!(op, before);
}

#[test]
fn deny_surfaces_policy_violation() {
    let engine = SourcePolicyEngine::new(sample_rules());
    let mut op = SourceOperation::new("docker-image://docker.io/evil/miner:latest");
    let err = engine.enforce(&mut op).unwrap_err();
    let SourcePolicyError::Denied(violation) = &err else {
        panic!("expected policy violation, got {err:?}");
    };
    assert_eq!(violation.identifier, "docker-image://docker.io/evil/miner:latest");
    assert_eq!(violation.reason, DenyReason::RuleMatched);
    assert_eq!(violation.rule.as_ref().and_then(|rule| rule.name.as_deref()), Some("no-evil"));
    assert!(err.to_string().contains("rules[0] (no-evil)"));
    assert_eq!(err.kind(), "policy_violation");
}

#[test]
fn misconfigured_rule_is_a_configuration_error() {
    let engine = SourcePolicyEngine::new(sample_rules());
    let mut op = SourceOperation::new("docker-image://docker.io/broken/app");
    let before = op.clone();
    let err = engine.enforce(&mut op).unwrap_err();
    assert!(matches!(err, SourcePolicyError::Configuration(_)), "{err:?}");
    assert_eq!(op, before);
}

#[test]
fn enforce_all_counts_mutations_and_stops_on_error() {
    let engine = SourcePolicyEngine::new(sample_rules());
    let mut ops = vec![
        SourceOperation::new("docker-image://docker.io/library/busybox:latest"),
        SourceOperation::new(README),
        SourceOperation::new("local://context"),
    ];
    assert_eq!(engine.enforce_all(&mut ops).unwrap(), 2);
    assert_eq!(ops[1].attrs.get(ATTR_HTTP_CHECKSUM).map(String::as_str), Some(README_CHECKSUM));

    let mut ops = vec![
        SourceOperation::new("docker-image://docker.io/library/busybox:latest"),
        SourceOperation::new("docker-image://docker.io/evil/miner"),
        SourceOperation::new(README),
    ];
    assert!(matches!(engine.enforce_all(&mut ops), Err(SourcePolicyError::Denied(_))));
    assert!(ops[0].identifier.contains(PINNED));
    assert!(ops[2].attrs.is_empty());
}

// ============================================================================
// SECTION: Auditing
// ============================================================================

#[test]
fn every_enforcement_emits_one_audit_event() {
    let sink = Arc::new(RecordingSink::default());
    let engine = SourcePolicyEngine::with_audit(sample_rules(), sink.clone());
    let mut converted = SourceOperation::new("docker-image://docker.io/library/busybox:latest");
    let mut denied = SourceOperation::new("docker-image://docker.io/evil/miner");
    let mut passed = SourceOperation::new("local://context");
    engine.enforce(&mut converted).unwrap();
    engine.enforce(&mut denied).unwrap_err();
    engine.enforce(&mut passed).unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].outcome, Some(DecisionOutcome::Convert));
    assert_eq!(events[0].rule_name.as_deref(), Some("pin-busybox"));
    assert!(events[0].mutated);
    assert_eq!(events[0].result_identifier.as_deref(), Some(converted.identifier.as_str()));
    assert_eq!(events[1].deny_reason, Some(DenyReason::RuleMatched));
    assert_eq!(events[1].error_kind, Some("policy_violation"));
    assert_eq!(events[2].outcome, Some(DecisionOutcome::Allow));
    assert_eq!(events[2].rule_index, None);
    assert!(!events[2].mutated);
}

#[test]
fn file_audit_sink_appends_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    let sink = Arc::new(FileAuditSink::new(&path).unwrap());
    let engine = SourcePolicyEngine::with_audit(sample_rules(), sink);
    let mut op = SourceOperation::new(README);
    engine.enforce(&mut op).unwrap();
    let mut op = SourceOperation::new("docker-image://docker.io/evil/miner");
    engine.enforce(&mut op).unwrap_err();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "source_policy");
    assert_eq!(lines[0]["outcome"], "convert");
    assert_eq!(lines[0]["identifier"], README);
    assert_eq!(lines[1]["outcome"], "deny");
    assert_eq!(lines[1]["deny_reason"], "rule_matched");
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn engine_is_shared_across_threads() {
    let sink = Arc::new(RecordingSink::default());
    let engine = SourcePolicyEngine::with_audit(sample_rules(), sink.clone());
    let tags = ["1.36", "1.35", "latest", "musl", "glibc", "uclibc", "stable", "edge"];
    std::thread::scope(|scope| {
        for tag in tags {
            let engine = &engine;
            scope.spawn(move || {
                let mut op = SourceOperation::new(format!("docker-image://docker.io/library/busybox:{tag}"));
                assert!(engine.enforce(&mut op).unwrap().mutated);
                assert_eq!(
                    op.identifier,
                    format!("docker-image://docker.io/library/busybox:{tag}@{PINNED}")
                );
            });
        }
    });
    assert_eq!(sink.events().len(), tags.len());
}
