// crates/source-gate-core/src/runtime/matcher.rs
// ============================================================================
// Module: Source Gate Selector Matcher
// Description: Compiled selectors for exact, wildcard, and regex matching.
// Purpose: Decide whether a rule applies to a source identifier and attributes.
// Dependencies: crate::core, regex
// ============================================================================

//! ## Overview
//! Selectors are compiled once when a rule set is built. Wildcard patterns
//! are translated into anchored regular expressions so that both strategies
//! share one matching path and expose positional captures for destination
//! templating. Matching is pure and has no side effects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Captures;
use regex::Regex;
use regex::RegexBuilder;
use thiserror::Error;

use crate::core::AttrConstraintSpec;
use crate::core::ConstraintCondition;
use crate::core::MatchType;
use crate::core::SelectorSpec;
use crate::core::SourceAttrs;
use crate::core::identifiers::SCHEME_SEPARATOR;
use crate::core::identifiers::split_scheme;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum compiled size of a single selector or constraint regex.
pub const MAX_REGEX_SIZE: usize = 1024 * 1024;
/// Maximum length of a selector pattern.
pub const MAX_PATTERN_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Selector compilation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// Selector identifier is empty.
    #[error("selector identifier must not be empty")]
    EmptyIdentifier,
    /// Selector pattern exceeds the length limit.
    #[error("selector pattern exceeds {MAX_PATTERN_LENGTH} bytes")]
    PatternTooLong,
    /// Regex failed to compile.
    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex {
        /// Offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
    /// Wildcard pattern is malformed.
    #[error("invalid wildcard {pattern:?}: {reason}")]
    InvalidWildcard {
        /// Offending pattern.
        pattern: String,
        /// Failure detail.
        reason: String,
    },
    /// Constraint key is empty.
    #[error("constraint key must not be empty")]
    EmptyConstraintKey,
}

// ============================================================================
// SECTION: Compiled Selector
// ============================================================================

/// Compiled attribute constraint.
#[derive(Debug, Clone)]
pub struct AttrConstraint {
    /// Attribute name.
    key: String,
    /// Comparison value.
    value: String,
    /// Comparison to apply.
    condition: ConstraintCondition,
    /// Compiled value pattern for `matches` constraints.
    pattern: Option<Regex>,
}

impl AttrConstraint {
    /// Compiles a constraint specification.
    fn compile(spec: &AttrConstraintSpec) -> Result<Self, SelectorError> {
        if spec.key.is_empty() {
            return Err(SelectorError::EmptyConstraintKey);
        }
        let pattern = match spec.condition {
            ConstraintCondition::Matches => Some(compile_anchored(&spec.value)?),
            ConstraintCondition::Equal | ConstraintCondition::NotEqual => None,
        };
        Ok(Self {
            key: spec.key.clone(),
            value: spec.value.clone(),
            condition: spec.condition,
            pattern,
        })
    }

    /// Returns true when the constraint holds. A missing key never holds.
    fn holds(&self, attrs: &SourceAttrs) -> bool {
        let Some(actual) = attrs.get(&self.key) else {
            return false;
        };
        match self.condition {
            ConstraintCondition::Equal => actual == &self.value,
            ConstraintCondition::NotEqual => actual != &self.value,
            ConstraintCondition::Matches => {
                self.pattern.as_ref().is_some_and(|pattern| pattern.is_match(actual))
            }
        }
    }
}

/// Compiled rule selector.
#[derive(Debug, Clone)]
pub struct Selector {
    /// Pattern as declared.
    identifier: String,
    /// Matching strategy.
    match_type: MatchType,
    /// Anchored pattern for wildcard and regex selectors.
    pattern: Option<Regex>,
    /// Attribute constraints.
    constraints: Vec<AttrConstraint>,
}

impl Selector {
    /// Compiles a selector specification.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] when the pattern or a constraint is invalid.
    pub fn compile(spec: &SelectorSpec) -> Result<Self, SelectorError> {
        if spec.identifier.is_empty() {
            return Err(SelectorError::EmptyIdentifier);
        }
        if spec.identifier.len() > MAX_PATTERN_LENGTH {
            return Err(SelectorError::PatternTooLong);
        }
        let pattern = match spec.match_type {
            MatchType::Exact => None,
            MatchType::Wildcard => Some(compile_wildcard(&spec.identifier)?),
            MatchType::Regex => Some(compile_anchored(&spec.identifier)?),
        };
        let constraints =
            spec.constraints.iter().map(AttrConstraint::compile).collect::<Result<_, _>>()?;
        Ok(Self {
            identifier: spec.identifier.clone(),
            match_type: spec.match_type,
            pattern,
            constraints,
        })
    }

    /// Returns the declared pattern.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the matching strategy.
    #[must_use]
    pub const fn match_type(&self) -> MatchType {
        self.match_type
    }

    /// Matches the selector and returns captures for destination templating.
    #[must_use]
    pub fn captures<'h>(&self, identifier: &'h str, attrs: &SourceAttrs) -> Option<SelectorMatch<'h>> {
        let captures = match &self.pattern {
            None => {
                if identifier != self.identifier {
                    return None;
                }
                None
            }
            Some(pattern) => Some(pattern.captures(identifier)?),
        };
        if !self.constraints.iter().all(|constraint| constraint.holds(attrs)) {
            return None;
        }
        Some(SelectorMatch {
            captures,
        })
    }

    /// Returns true when the selector matches.
    #[must_use]
    pub fn is_match(&self, identifier: &str, attrs: &SourceAttrs) -> bool {
        self.captures(identifier, attrs).is_some()
    }
}

/// Successful selector match.
#[derive(Debug)]
pub struct SelectorMatch<'h> {
    /// Regex captures; `None` for exact selectors.
    captures: Option<Captures<'h>>,
}

impl<'h> SelectorMatch<'h> {
    /// Returns the regex captures, if the selector produced any.
    #[must_use]
    pub const fn captures(&self) -> Option<&Captures<'h>> {
        self.captures.as_ref()
    }
}

/// Returns true when `selector` matches the identifier and attributes.
#[must_use]
pub fn matches(selector: &Selector, identifier: &str, attrs: &SourceAttrs) -> bool {
    selector.is_match(identifier, attrs)
}

// ============================================================================
// SECTION: Pattern Compilation
// ============================================================================

/// Compiles an implicitly anchored regex with the size limit applied.
fn compile_anchored(pattern: &str) -> Result<Regex, SelectorError> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .size_limit(MAX_REGEX_SIZE)
        .build()
        .map_err(|err| SelectorError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
}

/// Translates a wildcard pattern into an anchored regex.
///
/// The scheme must be literal. `**` becomes `(.*)` and `*` becomes `([^/]*)`;
/// each is a positional capture group.
fn compile_wildcard(pattern: &str) -> Result<Regex, SelectorError> {
    let invalid = |reason: &str| SelectorError::InvalidWildcard {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };
    let (scheme, rest) =
        split_scheme(pattern).ok_or_else(|| invalid("pattern must start with a literal scheme"))?;
    if scheme.is_empty() || scheme.contains('*') {
        return Err(invalid("scheme must be literal"));
    }
    let mut translated = String::with_capacity(pattern.len() * 2);
    translated.push('^');
    translated.push_str(&regex::escape(scheme));
    translated.push_str(&regex::escape(SCHEME_SEPARATOR));
    let mut literal = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '*' {
            literal.push(ch);
            continue;
        }
        translated.push_str(&regex::escape(&literal));
        literal.clear();
        if chars.peek() == Some(&'*') {
            chars.next();
            translated.push_str("(.*)");
        } else {
            translated.push_str("([^/]*)");
        }
    }
    translated.push_str(&regex::escape(&literal));
    translated.push('$');
    RegexBuilder::new(&translated).size_limit(MAX_REGEX_SIZE).build().map_err(|err| {
        SelectorError::InvalidWildcard {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    })
}
