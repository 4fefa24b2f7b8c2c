// crates/source-gate-core/src/runtime/rule_set.rs
// ============================================================================
// Module: Source Gate Rule Set
// Description: Ordered, compiled, immutable collection of policy rules.
// Purpose: Validate a policy document once and freeze it for evaluation.
// Dependencies: crate::core, crate::runtime::matcher
// ============================================================================

//! ## Overview
//! A [`RuleSet`] is built from rule specifications in declaration order.
//! Every selector is compiled and every rule validated up front; a single
//! invalid rule rejects the whole set (fail-closed). Once built the set
//! exposes no mutating API, so it can be shared across threads while
//! evaluations are in flight.
//!
//! Declaration order is the only precedence: the first matching rule wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::DefaultDecision;
use crate::core::DestinationSpec;
use crate::core::RuleAction;
use crate::core::RuleRef;
use crate::core::RuleSpec;
use crate::core::SourceAttrs;
use crate::runtime::matcher::Selector;
use crate::runtime::matcher::SelectorError;
use crate::runtime::matcher::SelectorMatch;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum number of rules in one rule set.
pub const MAX_RULES: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Rule set load-time configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetError {
    /// Rule count exceeds [`MAX_RULES`].
    #[error("policy declares {0} rules; at most {MAX_RULES} are allowed")]
    TooManyRules(usize),
    /// Selector failed to compile.
    #[error("{rule}: invalid selector: {source}")]
    Selector {
        /// Offending rule.
        rule: RuleRef,
        /// Compilation failure.
        source: SelectorError,
    },
    /// Convert rule without a destination.
    #[error("{rule}: convert rules require a destination")]
    MissingDestination {
        /// Offending rule.
        rule: RuleRef,
    },
    /// Convert destination sets nothing.
    #[error("{rule}: convert destination must set an identifier or attributes")]
    EmptyDestination {
        /// Offending rule.
        rule: RuleRef,
    },
    /// Destination declared on a non-convert rule.
    #[error("{rule}: destination is only valid for convert rules, not {action}")]
    UnexpectedDestination {
        /// Offending rule.
        rule: RuleRef,
        /// Declared action.
        action: &'static str,
    },
    /// Destination attribute with an empty key.
    #[error("{rule}: destination attribute keys must not be empty")]
    EmptyAttrKey {
        /// Offending rule.
        rule: RuleRef,
    },
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Compiled policy rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule identity.
    reference: RuleRef,
    /// Action on match.
    action: RuleAction,
    /// Compiled selector.
    selector: Selector,
    /// Destination for convert rules.
    destination: Option<DestinationSpec>,
}

impl Rule {
    /// Compiles and validates one rule specification.
    fn compile(index: usize, spec: RuleSpec) -> Result<Self, RuleSetError> {
        let reference = RuleRef {
            index,
            name: spec.name,
        };
        let selector = Selector::compile(&spec.selector).map_err(|source| RuleSetError::Selector {
            rule: reference.clone(),
            source,
        })?;
        match (spec.action, &spec.destination) {
            (RuleAction::Convert, None) => {
                return Err(RuleSetError::MissingDestination {
                    rule: reference,
                });
            }
            (RuleAction::Convert, Some(destination)) => {
                if destination.is_empty() {
                    return Err(RuleSetError::EmptyDestination {
                        rule: reference,
                    });
                }
                if destination.attrs.keys().any(String::is_empty) {
                    return Err(RuleSetError::EmptyAttrKey {
                        rule: reference,
                    });
                }
            }
            (action @ (RuleAction::Allow | RuleAction::Deny), Some(_)) => {
                return Err(RuleSetError::UnexpectedDestination {
                    rule: reference,
                    action: action.as_str(),
                });
            }
            (RuleAction::Allow | RuleAction::Deny, None) => {}
        }
        Ok(Self {
            reference,
            action: spec.action,
            selector,
            destination: spec.destination,
        })
    }

    /// Returns the rule identity.
    #[must_use]
    pub const fn reference(&self) -> &RuleRef {
        &self.reference
    }

    /// Returns the rule action.
    #[must_use]
    pub const fn action(&self) -> RuleAction {
        self.action
    }

    /// Returns the compiled selector.
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Returns the destination for convert rules.
    #[must_use]
    pub const fn destination(&self) -> Option<&DestinationSpec> {
        self.destination.as_ref()
    }
}

// ============================================================================
// SECTION: Rule Set
// ============================================================================

/// Ordered, frozen set of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Rules in declaration order.
    rules: Vec<Rule>,
    /// Decision when no rule matches.
    default: DefaultDecision,
}

impl RuleSet {
    /// Builds a default-allow rule set.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError`] when any rule is invalid.
    pub fn new(specs: impl IntoIterator<Item = RuleSpec>) -> Result<Self, RuleSetError> {
        Self::with_default(specs, DefaultDecision::Allow)
    }

    /// Builds a rule set with an explicit default decision.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError`] when any rule is invalid.
    pub fn with_default(
        specs: impl IntoIterator<Item = RuleSpec>,
        default: DefaultDecision,
    ) -> Result<Self, RuleSetError> {
        let specs: Vec<RuleSpec> = specs.into_iter().collect();
        if specs.len() > MAX_RULES {
            return Err(RuleSetError::TooManyRules(specs.len()));
        }
        let rules = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Rule::compile(index, spec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules,
            default,
        })
    }

    /// Returns the rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns the number of rules.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when the set has no rules.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the decision applied when no rule matches.
    #[must_use]
    pub const fn default_decision(&self) -> DefaultDecision {
        self.default
    }

    /// Returns the first rule matching the identifier and attributes.
    #[must_use]
    pub fn first_match<'h>(
        &self,
        identifier: &'h str,
        attrs: &SourceAttrs,
    ) -> Option<(&Rule, SelectorMatch<'h>)> {
        self.rules
            .iter()
            .find_map(|rule| rule.selector.captures(identifier, attrs).map(|matched| (rule, matched)))
    }
}
