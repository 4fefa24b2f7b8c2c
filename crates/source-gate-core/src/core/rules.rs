// crates/source-gate-core/src/core/rules.rs
// ============================================================================
// Module: Source Gate Rule Specifications
// Description: Declarative policy rule shapes as written in policy documents.
// Purpose: Provide the serializable input compiled into a frozen rule set.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Rule specifications are the parsed, uncompiled shape of a policy document:
//! an ordered list of rules, each with an action, a selector, and (for convert
//! rules) a destination. They are compiled and validated once by
//! [`crate::runtime::RuleSet::new`]; evaluation never touches these types.
//!
//! Unknown fields are rejected so that a misspelled key cannot silently widen
//! a selector.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::source::SourceAttrs;

// ============================================================================
// SECTION: Selectors
// ============================================================================

/// Identifier matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Case-sensitive full-string equality.
    #[default]
    Exact,
    /// Glob with `*` (one segment) and `**` (across segments).
    Wildcard,
    /// Implicitly anchored regular expression.
    Regex,
}

/// Comparison applied by an attribute constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintCondition {
    /// Attribute value equals the constraint value.
    #[default]
    Equal,
    /// Attribute value differs from the constraint value.
    NotEqual,
    /// Attribute value matches the constraint value as an anchored regex.
    Matches,
}

/// Attribute constraint attached to a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttrConstraintSpec {
    /// Attribute name that must be present.
    pub key: String,
    /// Value compared according to `condition`.
    pub value: String,
    /// Comparison to apply.
    #[serde(default)]
    pub condition: ConstraintCondition,
}

/// Rule match pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorSpec {
    /// Identifier pattern.
    pub identifier: String,
    /// Matching strategy for `identifier`.
    #[serde(default)]
    pub match_type: MatchType,
    /// Attribute constraints that must all hold.
    #[serde(default)]
    pub constraints: Vec<AttrConstraintSpec>,
}

impl SelectorSpec {
    /// Creates an exact-match selector.
    #[must_use]
    pub fn exact(identifier: impl Into<String>) -> Self {
        Self::with_match_type(identifier, MatchType::Exact)
    }

    /// Creates a wildcard selector.
    #[must_use]
    pub fn wildcard(identifier: impl Into<String>) -> Self {
        Self::with_match_type(identifier, MatchType::Wildcard)
    }

    /// Creates a regex selector.
    #[must_use]
    pub fn regex(identifier: impl Into<String>) -> Self {
        Self::with_match_type(identifier, MatchType::Regex)
    }

    /// Adds an attribute constraint.
    #[must_use]
    pub fn with_constraint(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        condition: ConstraintCondition,
    ) -> Self {
        self.constraints.push(AttrConstraintSpec {
            key: key.into(),
            value: value.into(),
            condition,
        });
        self
    }

    /// Builds a selector without constraints.
    fn with_match_type(identifier: impl Into<String>, match_type: MatchType) -> Self {
        Self {
            identifier: identifier.into(),
            match_type,
            constraints: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Destinations
// ============================================================================

/// Target state asserted by a convert rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationSpec {
    /// Replacement identifier or template; empty keeps the source identifier.
    #[serde(default)]
    pub identifier: String,
    /// Attributes to set or overwrite.
    #[serde(default)]
    pub attrs: SourceAttrs,
}

impl DestinationSpec {
    /// Creates a destination with an identifier template.
    #[must_use]
    pub fn identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            attrs: SourceAttrs::new(),
        }
    }

    /// Adds a destination attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Returns true when neither an identifier nor attributes are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identifier.is_empty() && self.attrs.is_empty()
    }
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Action taken when a rule's selector matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Pass the source through unchanged and stop evaluation.
    Allow,
    /// Reject the source.
    Deny,
    /// Rewrite the source to the rule's destination.
    Convert,
}

impl RuleAction {
    /// Returns the action label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Convert => "convert",
        }
    }
}

/// Declarative policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Optional rule name used in diagnostics.
    #[serde(default)]
    pub name: Option<String>,
    /// Action taken on match.
    pub action: RuleAction,
    /// Match pattern.
    pub selector: SelectorSpec,
    /// Destination (convert rules only).
    #[serde(default)]
    pub destination: Option<DestinationSpec>,
}

impl RuleSpec {
    /// Creates an allow rule.
    #[must_use]
    pub const fn allow(selector: SelectorSpec) -> Self {
        Self {
            name: None,
            action: RuleAction::Allow,
            selector,
            destination: None,
        }
    }

    /// Creates a deny rule.
    #[must_use]
    pub const fn deny(selector: SelectorSpec) -> Self {
        Self {
            name: None,
            action: RuleAction::Deny,
            selector,
            destination: None,
        }
    }

    /// Creates a convert rule.
    #[must_use]
    pub const fn convert(selector: SelectorSpec, destination: DestinationSpec) -> Self {
        Self {
            name: None,
            action: RuleAction::Convert,
            selector,
            destination: Some(destination),
        }
    }

    /// Sets the rule name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Decision applied when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultDecision {
    /// Unmatched sources pass through.
    #[default]
    Allow,
    /// Unmatched sources are denied.
    Deny,
}

/// Identity of a matched rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleRef {
    /// Zero-based position in declaration order.
    pub index: usize,
    /// Rule name when declared.
    pub name: Option<String>,
}

impl fmt::Display for RuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "rules[{}] ({name})", self.index),
            None => write!(f, "rules[{}]", self.index),
        }
    }
}
