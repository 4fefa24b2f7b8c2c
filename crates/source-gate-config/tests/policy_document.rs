// crates/source-gate-config/tests/policy_document.rs
// ============================================================================
// Module: Policy Document Tests
// Description: TOML/JSON policy documents, versioning, and compilation.
// Purpose: Ensure documents load by extension and compile fail-closed.
// Dependencies: source-gate-config, source-gate-core, tempfile
// ============================================================================

//! Policy document tests.

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

use source_gate_config::DocumentError;
use source_gate_config::DocumentFormat;
use source_gate_config::MAX_POLICY_DOCUMENT_SIZE;
use source_gate_config::PolicyDocument;
use source_gate_core::ATTR_HTTP_CHECKSUM;
use source_gate_core::DefaultDecision;
use source_gate_core::MatchType;
use source_gate_core::PolicyDecision;
use source_gate_core::RuleAction;
use source_gate_core::RuleSetError;
use source_gate_core::SourceOperation;
use source_gate_core::evaluate;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const TOML_DOCUMENT: &str = r#"
version = 1
default = "deny"

[[rules]]
name = "pin-busybox"
action = "convert"
selector = { identifier = "docker-image://docker.io/library/busybox:*", match_type = "wildcard" }
destination = { identifier = "docker-image://docker.io/library/busybox:${1}@sha256:3614ca5eacf0a3a1bcc361c939202a974b4902b9334ff36eb29ffe9011aaad83" }

[[rules]]
name = "readme-checksum"
action = "convert"
selector = { identifier = "https://raw.githubusercontent.com/moby/buildkit/v0.10.1/README.md" }
destination = { attrs = { "http.checksum" = "sha256:6e4b94fc270e708e1068be28bd3551dc6917a4fc5a61293d51bb36e6b75c4b53" } }

[[rules]]
action = "allow"
selector = { identifier = 'git://github\.com/moby/.*', match_type = "regex" }
"#;

const JSON_DOCUMENT: &str = r#"{
  "version": 1,
  "rules": [
    {
      "action": "deny",
      "selector": {
        "identifier": "https://**",
        "match_type": "wildcard",
        "constraints": [{ "key": "http.filename", "value": "setup.exe" }]
      }
    }
  ]
}"#;

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn toml_document_parses_in_declaration_order() {
    let document = PolicyDocument::from_toml_str(TOML_DOCUMENT).unwrap();
    assert_eq!(document.default, DefaultDecision::Deny);
    assert_eq!(document.rules.len(), 3);
    assert_eq!(document.rules[0].selector.match_type, MatchType::Wildcard);
    assert_eq!(document.rules[1].selector.match_type, MatchType::Exact);
    assert_eq!(document.rules[2].action, RuleAction::Allow);
    let attrs = &document.rules[1].destination.as_ref().unwrap().attrs;
    assert!(attrs.contains_key(ATTR_HTTP_CHECKSUM));
}

#[test]
fn json_document_defaults_to_allow() {
    let document = PolicyDocument::from_json_str(JSON_DOCUMENT).unwrap();
    assert_eq!(document.default, DefaultDecision::Allow);
    assert_eq!(document.rules[0].selector.constraints.len(), 1);
}

#[test]
fn unsupported_version_is_rejected() {
    let err = PolicyDocument::from_toml_str("version = 2\n").unwrap_err();
    assert!(matches!(err, DocumentError::Invalid(message) if message.contains("version 2")));
}

#[test]
fn missing_version_fails_to_parse() {
    let err = PolicyDocument::from_json_str(r#"{"rules": []}"#).unwrap_err();
    assert!(matches!(err, DocumentError::Parse(_)));
}

#[test]
fn unknown_rule_fields_fail_to_parse() {
    let err = PolicyDocument::from_toml_str(
        "version = 1\n[[rules]]\naction = \"deny\"\npriority = 10\nselector = { identifier = \"local://x\" }\n",
    )
    .unwrap_err();
    assert!(matches!(err, DocumentError::Parse(_)));
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn format_follows_extension() {
    let dir = TempDir::new().unwrap();
    let toml_path = dir.path().join("policy.toml");
    let json_path = dir.path().join("policy.JSON");
    std::fs::write(&toml_path, TOML_DOCUMENT).unwrap();
    std::fs::write(&json_path, JSON_DOCUMENT).unwrap();
    assert_eq!(PolicyDocument::load(&toml_path).unwrap().rules.len(), 3);
    assert_eq!(PolicyDocument::load(&json_path).unwrap().rules.len(), 1);

    let yaml_path = dir.path().join("policy.yaml");
    assert!(matches!(DocumentFormat::from_path(&yaml_path), Err(DocumentError::Invalid(_))));
}

#[test]
fn oversized_document_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policy.toml");
    let mut content = b"version = 1\n".to_vec();
    content.resize(MAX_POLICY_DOCUMENT_SIZE + 1, b'\n');
    std::fs::write(&path, content).unwrap();
    let err = PolicyDocument::load(&path).unwrap_err();
    assert!(matches!(err, DocumentError::Invalid(message) if message.contains("size limit")));
}

#[test]
fn missing_document_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = PolicyDocument::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, DocumentError::Io(_)));
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

#[test]
fn compiled_document_evaluates_with_its_default() {
    let rules = PolicyDocument::from_toml_str(TOML_DOCUMENT).unwrap().compile().unwrap();
    let converted =
        evaluate(&rules, &SourceOperation::new("docker-image://docker.io/library/busybox:1.36"))
            .unwrap();
    assert_eq!(converted.matched_rule().and_then(|rule| rule.name.as_deref()), Some("pin-busybox"));
    let allowed = evaluate(&rules, &SourceOperation::new("git://github.com/moby/buildkit")).unwrap();
    assert!(matches!(allowed, PolicyDecision::Allow { matched_rule: Some(_) }));
    let denied = evaluate(&rules, &SourceOperation::new("local://context")).unwrap();
    assert!(matches!(denied, PolicyDecision::Deny { matched_rule: None, .. }));
}

#[test]
fn one_bad_rule_rejects_the_document() {
    let document = PolicyDocument::from_toml_str(
        "version = 1\n[[rules]]\naction = \"convert\"\nselector = { identifier = \"local://x\" }\n",
    )
    .unwrap();
    let err = document.compile().unwrap_err();
    assert!(matches!(err, DocumentError::Rules(RuleSetError::MissingDestination { .. })));
}
