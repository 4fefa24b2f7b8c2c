// crates/source-gate-core/tests/evaluation.rs
// ============================================================================
// Module: Policy Evaluation Tests
// Description: Rule ordering, defaults, templates, and load-time validation.
// Purpose: Ensure evaluation is first-match-wins and fails closed on bad rules.
// Dependencies: source-gate-core
// ============================================================================

//! Policy evaluation tests.

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

use source_gate_core::ATTR_HTTP_CHECKSUM;
use source_gate_core::ConstraintCondition;
use source_gate_core::DefaultDecision;
use source_gate_core::DenyReason;
use source_gate_core::DestinationSpec;
use source_gate_core::EvaluateError;
use source_gate_core::PolicyDecision;
use source_gate_core::RuleRef;
use source_gate_core::RuleSet;
use source_gate_core::RuleSetError;
use source_gate_core::RuleSpec;
use source_gate_core::SchemeFamily;
use source_gate_core::SelectorSpec;
use source_gate_core::SourceOperation;
use source_gate_core::evaluate;
use source_gate_core::runtime::MAX_RULES;

// ============================================================================
// SECTION: Helpers
// ============================================================================

type TestResult = Result<(), String>;

const PINNED: &str = "sha256:3614ca5eacf0a3a1bcc361c939202a974b4902b9334ff36eb29ffe9011aaad83";

fn decide(rules: &RuleSet, identifier: &str) -> Result<PolicyDecision, EvaluateError> {
    evaluate(rules, &SourceOperation::new(identifier))
}

fn rule_ref(index: usize) -> RuleRef {
    RuleRef {
        index,
        name: None,
    }
}

// ============================================================================
// SECTION: Ordering
// ============================================================================

#[test]
fn first_matching_rule_wins() -> TestResult {
    let rules = RuleSet::new([
        RuleSpec::allow(SelectorSpec::exact("docker-image://docker.io/library/busybox:latest")),
        RuleSpec::deny(SelectorSpec::wildcard("docker-image://docker.io/library/*")),
    ])
    .map_err(|err| err.to_string())?;

    let allowed = decide(&rules, "docker-image://docker.io/library/busybox:latest")
        .map_err(|err| err.to_string())?;
    if allowed != (PolicyDecision::Allow { matched_rule: Some(rule_ref(0)) }) {
        return Err(format!("expected allow by rules[0], got {allowed:?}"));
    }
    let denied = decide(&rules, "docker-image://docker.io/library/alpine:3.20")
        .map_err(|err| err.to_string())?;
    if denied
        != (PolicyDecision::Deny {
            matched_rule: Some(rule_ref(1)),
            reason: DenyReason::RuleMatched,
        })
    {
        return Err(format!("expected deny by rules[1], got {denied:?}"));
    }
    Ok(())
}

#[test]
fn broader_rule_declared_first_shadows_narrower_rule() {
    let rules = RuleSet::new([
        RuleSpec::deny(SelectorSpec::wildcard("docker-image://**")),
        RuleSpec::allow(SelectorSpec::exact("docker-image://docker.io/library/busybox:latest")),
    ])
    .unwrap();
    let decision = decide(&rules, "docker-image://docker.io/library/busybox:latest").unwrap();
    assert_eq!(decision.matched_rule(), Some(&rule_ref(0)));
}

#[test]
fn no_match_uses_default_decision() {
    let specs = || [RuleSpec::deny(SelectorSpec::exact("git://github.com/evil/repo"))];
    let permissive = RuleSet::new(specs()).unwrap();
    assert_eq!(
        decide(&permissive, "git://github.com/good/repo").unwrap(),
        PolicyDecision::Allow { matched_rule: None }
    );
    let strict = RuleSet::with_default(specs(), DefaultDecision::Deny).unwrap();
    assert_eq!(
        decide(&strict, "git://github.com/good/repo").unwrap(),
        PolicyDecision::Deny {
            matched_rule: None,
            reason: DenyReason::NoMatchingRule,
        }
    );
}

#[test]
fn empty_rule_set_allows_everything() {
    let rules = RuleSet::new(Vec::<RuleSpec>::new()).unwrap();
    assert!(rules.is_empty());
    let decision = decide(&rules, "local://context").unwrap();
    assert_eq!(decision, PolicyDecision::Allow { matched_rule: None });
}

#[test]
fn attribute_constraints_narrow_matches() {
    let rules = RuleSet::new([RuleSpec::deny(
        SelectorSpec::wildcard("https://example.com/**").with_constraint(
            "http.filename",
            r".*\.exe",
            ConstraintCondition::Matches,
        ),
    )])
    .unwrap();
    let installer = SourceOperation::new("https://example.com/dl/setup")
        .with_attr("http.filename", "setup.exe");
    let tarball = SourceOperation::new("https://example.com/dl/src")
        .with_attr("http.filename", "src.tar.gz");
    let unnamed = SourceOperation::new("https://example.com/dl/raw");
    assert!(matches!(evaluate(&rules, &installer).unwrap(), PolicyDecision::Deny { .. }));
    assert!(matches!(evaluate(&rules, &tarball).unwrap(), PolicyDecision::Allow { .. }));
    assert!(matches!(evaluate(&rules, &unnamed).unwrap(), PolicyDecision::Allow { .. }));
}

// ============================================================================
// SECTION: Convert Decisions
// ============================================================================

#[test]
fn convert_returns_resolved_destination() {
    let destination = format!("docker-image://docker.io/library/busybox:1.34.1-uclibc@{PINNED}");
    let rules = RuleSet::new([RuleSpec::convert(
        SelectorSpec::exact("docker-image://docker.io/library/busybox:1.34.1-uclibc"),
        DestinationSpec::identifier(destination.clone()),
    )
    .named("pin-busybox")])
    .unwrap();
    let decision = decide(&rules, "docker-image://docker.io/library/busybox:1.34.1-uclibc").unwrap();
    let PolicyDecision::Convert { matched_rule, destination: resolved } = decision else {
        panic!("expected convert decision");
    };
    assert_eq!(matched_rule.to_string(), "rules[0] (pin-busybox)");
    assert_eq!(resolved.identifier, destination);
    assert!(resolved.attrs.is_empty());
}

#[test]
fn wildcard_captures_substitute_into_destination() {
    let rules = RuleSet::new([RuleSpec::convert(
        SelectorSpec::wildcard("docker-image://docker.io/library/*"),
        DestinationSpec::identifier("docker-image://mirror.example.com/library/${1}"),
    )])
    .unwrap();
    let decision = decide(&rules, "docker-image://docker.io/library/alpine:3.20").unwrap();
    assert_eq!(
        decision.destination().map(|destination| destination.identifier.as_str()),
        Some("docker-image://mirror.example.com/library/alpine:3.20")
    );
}

#[test]
fn attribute_only_destination_keeps_source_identifier() {
    let readme = "https://raw.githubusercontent.com/moby/buildkit/v0.10.1/README.md";
    let checksum = "sha256:6e4b94fc270e708e1068be28bd3551dc6917a4fc5a61293d51bb36e6b75c4b53";
    let rules = RuleSet::new([RuleSpec::convert(
        SelectorSpec::exact(readme),
        DestinationSpec::default().with_attr(ATTR_HTTP_CHECKSUM, checksum),
    )])
    .unwrap();
    let decision = decide(&rules, readme).unwrap();
    let resolved = decision.destination().unwrap();
    assert_eq!(resolved.identifier, readme);
    assert_eq!(resolved.attrs.get(ATTR_HTTP_CHECKSUM).map(String::as_str), Some(checksum));
}

#[test]
fn cross_scheme_destination_is_a_configuration_error() {
    let rules = RuleSet::new([RuleSpec::convert(
        SelectorSpec::wildcard("docker-image://**"),
        DestinationSpec::identifier("https://mirror.example.com/image.tar"),
    )])
    .unwrap();
    let err = decide(&rules, "docker-image://docker.io/library/busybox").unwrap_err();
    assert!(matches!(
        err,
        EvaluateError::CrossScheme {
            source_family: SchemeFamily::Image,
            destination_family: SchemeFamily::Http,
            ..
        }
    ));
    assert!(err.to_string().contains("rules[0]"));
}

#[test]
fn http_and_https_share_a_family() {
    let rules = RuleSet::new([RuleSpec::convert(
        SelectorSpec::wildcard("http://example.com/**"),
        DestinationSpec::identifier("https://example.com/${1}"),
    )])
    .unwrap();
    let decision = decide(&rules, "http://example.com/pkg/file.tgz").unwrap();
    assert_eq!(
        decision.destination().map(|destination| destination.identifier.as_str()),
        Some("https://example.com/pkg/file.tgz")
    );
}

#[test]
fn malformed_expanded_destination_is_reported() {
    let rules = RuleSet::new([RuleSpec::convert(
        SelectorSpec::wildcard("docker-image://docker.io/library/*"),
        DestinationSpec::identifier("docker-image://${1}@sha256:tooshort"),
    )])
    .unwrap();
    let err = decide(&rules, "docker-image://docker.io/library/busybox").unwrap_err();
    assert!(matches!(err, EvaluateError::InvalidDestination { .. }), "{err}");
}

// ============================================================================
// SECTION: Load-Time Validation
// ============================================================================

#[test]
fn invalid_regex_rejects_the_whole_set() {
    let err = RuleSet::new([
        RuleSpec::allow(SelectorSpec::exact("local://context")),
        RuleSpec::deny(SelectorSpec::regex("docker-image://(unclosed")),
    ])
    .unwrap_err();
    let RuleSetError::Selector { rule, .. } = &err else {
        panic!("expected selector error, got {err:?}");
    };
    assert_eq!(rule.index, 1);
}

#[test]
fn wildcard_without_literal_scheme_is_rejected() {
    for pattern in ["*://example.com/file", "example.com/**"] {
        let err = RuleSet::new([RuleSpec::deny(SelectorSpec::wildcard(pattern))]).unwrap_err();
        assert!(matches!(err, RuleSetError::Selector { .. }), "{pattern}: {err:?}");
    }
}

#[test]
fn convert_rules_need_a_destination() {
    let mut spec = RuleSpec::convert(
        SelectorSpec::exact("local://context"),
        DestinationSpec::identifier("local://context"),
    );
    spec.destination = None;
    assert!(matches!(
        RuleSet::new([spec]).unwrap_err(),
        RuleSetError::MissingDestination { .. }
    ));
    let empty = RuleSpec::convert(SelectorSpec::exact("local://context"), DestinationSpec::default());
    assert!(matches!(RuleSet::new([empty]).unwrap_err(), RuleSetError::EmptyDestination { .. }));
}

#[test]
fn destinations_on_deny_rules_are_rejected() {
    let mut spec = RuleSpec::deny(SelectorSpec::exact("local://context"));
    spec.destination = Some(DestinationSpec::identifier("local://other"));
    let err = RuleSet::new([spec]).unwrap_err();
    assert!(matches!(err, RuleSetError::UnexpectedDestination { action: "deny", .. }));
}

#[test]
fn rule_count_is_bounded() {
    let specs = (0..=MAX_RULES)
        .map(|index| RuleSpec::deny(SelectorSpec::exact(format!("local://ctx{index}"))));
    assert_eq!(RuleSet::new(specs).unwrap_err(), RuleSetError::TooManyRules(MAX_RULES + 1));
}
