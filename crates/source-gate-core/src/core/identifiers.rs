// crates/source-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Source Gate Identifiers
// Description: Scheme-qualified source identifiers and their per-scheme grammar.
// Purpose: Parse and classify identifiers before matching and mutation.
// Dependencies: regex, serde, url
// ============================================================================

//! ## Overview
//! Source identifiers are scheme-qualified strings such as
//! `docker-image://docker.io/library/busybox:latest@sha256:...` or
//! `https://example.com/archive.tar.gz`. Each scheme has its own grammar:
//! image references combine repository, tag, and digest into one addressable
//! string, while URLs, git remotes, and local names are locations.
//!
//! Parsing is strict and fail-closed; an identifier that does not parse is
//! never silently accepted by the mutation engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between the scheme and the scheme-specific part.
pub const SCHEME_SEPARATOR: &str = "://";
/// Maximum length of an image repository name.
const MAX_IMAGE_NAME_LENGTH: usize = 255;
/// Minimum hex length accepted for digest algorithms without a fixed size.
const MIN_DIGEST_HEX_LENGTH: usize = 32;

/// Image repository name grammar: optional registry domain plus path components.
static IMAGE_NAME_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])",
        r"(?:\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*(?::[0-9]+)?/)?",
        r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*",
        r"(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*$",
    ))
});

/// Image tag grammar.
static IMAGE_TAG_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$"));

/// Digest algorithm grammar.
static DIGEST_ALGORITHM_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:[.+_-][a-z0-9]+)*$"));

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier has no `scheme://` prefix.
    #[error("identifier {0:?} is missing a scheme")]
    MissingScheme(String),
    /// Identifier scheme is not recognized.
    #[error("identifier {identifier:?} uses unknown scheme {scheme:?}")]
    UnknownScheme {
        /// Full identifier.
        identifier: String,
        /// Unrecognized scheme.
        scheme: String,
    },
    /// Scheme-specific part is empty.
    #[error("identifier {0:?} has an empty locator")]
    EmptyLocator(String),
    /// Image reference is malformed.
    #[error("invalid image reference {reference:?}: {reason}")]
    InvalidImageReference {
        /// Offending reference.
        reference: String,
        /// Failure detail.
        reason: String,
    },
    /// Digest is malformed.
    #[error("invalid digest {digest:?}: {reason}")]
    InvalidDigest {
        /// Offending digest.
        digest: String,
        /// Failure detail.
        reason: String,
    },
    /// URL is malformed.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Failure detail.
        reason: String,
    },
    /// Git remote or local name is malformed.
    #[error("invalid {scheme} locator {locator:?}: {reason}")]
    InvalidLocator {
        /// Scheme label.
        scheme: &'static str,
        /// Offending locator.
        locator: String,
        /// Failure detail.
        reason: String,
    },
    /// Built-in grammar failed to compile.
    #[error("identifier grammar unavailable: {0}")]
    Grammar(String),
}

// ============================================================================
// SECTION: Schemes
// ============================================================================

/// Source identifier schemes understood by the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceScheme {
    /// Container image from a registry.
    DockerImage,
    /// Image from a local OCI layout store.
    OciLayout,
    /// Version-controlled git repository.
    Git,
    /// Plain HTTP download.
    Http,
    /// HTTPS download.
    Https,
    /// Local build context.
    Local,
}

impl SourceScheme {
    /// All supported schemes.
    pub const ALL: [Self; 6] =
        [Self::DockerImage, Self::OciLayout, Self::Git, Self::Http, Self::Https, Self::Local];

    /// Returns the wire label of the scheme.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DockerImage => "docker-image",
            Self::OciLayout => "oci-layout",
            Self::Git => "git",
            Self::Http => "http",
            Self::Https => "https",
            Self::Local => "local",
        }
    }

    /// Resolves a scheme label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scheme| scheme.as_str() == label)
    }

    /// Returns the family used for cross-scheme checks.
    #[must_use]
    pub const fn family(self) -> SchemeFamily {
        match self {
            Self::DockerImage => SchemeFamily::Image,
            Self::OciLayout => SchemeFamily::OciLayout,
            Self::Git => SchemeFamily::Git,
            Self::Http | Self::Https => SchemeFamily::Http,
            Self::Local => SchemeFamily::Local,
        }
    }
}

impl fmt::Display for SourceScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Groups of schemes that may be converted into each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeFamily {
    /// Registry images.
    Image,
    /// OCI layout store images.
    OciLayout,
    /// Git repositories.
    Git,
    /// HTTP and HTTPS downloads.
    Http,
    /// Local contexts.
    Local,
}

impl SchemeFamily {
    /// All scheme families.
    pub const ALL: [Self; 5] = [Self::Image, Self::OciLayout, Self::Git, Self::Http, Self::Local];

    /// Attribute key prefixes owned by this family.
    #[must_use]
    pub const fn attr_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Image => &["image."],
            Self::OciLayout => &["oci.", "image."],
            Self::Git => &["git."],
            Self::Http => &["http."],
            Self::Local => &["local."],
        }
    }

    /// Returns the family label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::OciLayout => "oci_layout",
            Self::Git => "git",
            Self::Http => "http",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for SchemeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits an identifier into its scheme label and locator.
#[must_use]
pub fn split_scheme(identifier: &str) -> Option<(&str, &str)> {
    identifier.split_once(SCHEME_SEPARATOR)
}

// ============================================================================
// SECTION: Digest
// ============================================================================

/// Content digest in `algorithm:hex` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    /// Digest algorithm label (e.g. `sha256`).
    algorithm: String,
    /// Lowercase hex encoding.
    hex: String,
}

impl Digest {
    /// Parses a digest in `algorithm:hex` form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidDigest`] when the algorithm or hex
    /// encoding is malformed or has the wrong length.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let invalid = |reason: &str| IdentifierError::InvalidDigest {
            digest: raw.to_string(),
            reason: reason.to_string(),
        };
        let (algorithm, hex) = raw.split_once(':').ok_or_else(|| invalid("missing ':'"))?;
        if !grammar(&DIGEST_ALGORITHM_PATTERN)?.is_match(algorithm) {
            return Err(invalid("invalid algorithm"));
        }
        if !hex.bytes().all(|byte| matches!(byte, b'0' ..= b'9' | b'a' ..= b'f')) {
            return Err(invalid("encoding must be lowercase hex"));
        }
        let length_ok = match algorithm {
            "sha256" => hex.len() == 64,
            "sha384" => hex.len() == 96,
            "sha512" => hex.len() == 128,
            _ => hex.len() >= MIN_DIGEST_HEX_LENGTH,
        };
        if !length_ok {
            return Err(invalid("unexpected encoding length"));
        }
        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    /// Returns the digest algorithm.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the hex encoding.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

// ============================================================================
// SECTION: Image References
// ============================================================================

/// Image reference in `name[:tag][@digest]` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Repository name including an optional registry domain.
    name: String,
    /// Optional tag.
    tag: Option<String>,
    /// Optional content digest.
    digest: Option<Digest>,
}

impl ImageReference {
    /// Parses an image reference.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the name, tag, or digest is malformed.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let invalid = |reason: &str| IdentifierError::InvalidImageReference {
            reference: raw.to_string(),
            reason: reason.to_string(),
        };
        if raw.is_empty() {
            return Err(invalid("empty reference"));
        }
        let (remainder, digest) = match raw.split_once('@') {
            Some((remainder, digest)) => (remainder, Some(Digest::parse(digest)?)),
            None => (raw, None),
        };
        let (name, tag) = match remainder.rfind(':') {
            Some(idx) if !remainder[idx ..].contains('/') => {
                (&remainder[.. idx], Some(&remainder[idx + 1 ..]))
            }
            _ => (remainder, None),
        };
        if name.len() > MAX_IMAGE_NAME_LENGTH {
            return Err(invalid("repository name too long"));
        }
        if !grammar(&IMAGE_NAME_PATTERN)?.is_match(name) {
            return Err(invalid("invalid repository name"));
        }
        if let Some(tag) = tag
            && !grammar(&IMAGE_TAG_PATTERN)?.is_match(tag)
        {
            return Err(invalid("invalid tag"));
        }
        Ok(Self {
            name: name.to_string(),
            tag: tag.map(str::to_string),
            digest,
        })
    }

    /// Returns the repository name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tag, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns the digest, if any.
    #[must_use]
    pub const fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Source Identifiers
// ============================================================================

/// Scheme-specific part of a parsed identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// Image reference (`docker-image`, `oci-layout`).
    Image(ImageReference),
    /// Absolute URL (`http`, `https`).
    Url(Url),
    /// Git remote with optional ref fragment.
    Git {
        /// Remote location.
        remote: String,
        /// Optional ref after `#`.
        reference: Option<String>,
    },
    /// Local context name.
    Local(String),
}

/// Parsed, scheme-qualified source identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentifier {
    /// Identifier exactly as supplied.
    raw: String,
    /// Parsed scheme.
    scheme: SourceScheme,
    /// Parsed scheme-specific part.
    locator: SourceLocator,
}

impl SourceIdentifier {
    /// Parses a scheme-qualified identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the scheme is missing or unknown, or
    /// the locator violates the scheme grammar.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let (label, rest) =
            split_scheme(raw).ok_or_else(|| IdentifierError::MissingScheme(raw.to_string()))?;
        let scheme = SourceScheme::from_label(label).ok_or_else(|| {
            IdentifierError::UnknownScheme {
                identifier: raw.to_string(),
                scheme: label.to_string(),
            }
        })?;
        if rest.is_empty() {
            return Err(IdentifierError::EmptyLocator(raw.to_string()));
        }
        let locator = match scheme {
            SourceScheme::DockerImage | SourceScheme::OciLayout => {
                SourceLocator::Image(ImageReference::parse(rest)?)
            }
            SourceScheme::Http | SourceScheme::Https => SourceLocator::Url(parse_url(raw)?),
            SourceScheme::Git => parse_git(rest)?,
            SourceScheme::Local => parse_local(rest)?,
        };
        Ok(Self {
            raw: raw.to_string(),
            scheme,
            locator,
        })
    }

    /// Returns the identifier as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the scheme.
    #[must_use]
    pub const fn scheme(&self) -> SourceScheme {
        self.scheme
    }

    /// Returns the scheme family.
    #[must_use]
    pub const fn family(&self) -> SchemeFamily {
        self.scheme.family()
    }

    /// Returns the parsed locator.
    #[must_use]
    pub const fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    /// Returns the image reference for image schemes.
    #[must_use]
    pub const fn image(&self) -> Option<&ImageReference> {
        match &self.locator {
            SourceLocator::Image(reference) => Some(reference),
            _ => None,
        }
    }

    /// Returns the digest pinned on this identifier, if any.
    ///
    /// Image references carry their digest structurally. For location schemes a
    /// trailing `@algorithm:hex` suffix (before any query or fragment) is reported so that
    /// callers can reject digest semantics those schemes do not support.
    #[must_use]
    pub fn digest_pin(&self) -> Option<Digest> {
        if let Some(reference) = self.image() {
            return reference.digest().cloned();
        }
        let location = self.raw.split(['?', '#']).next().unwrap_or_default();
        let (_, suffix) = location.rsplit_once('@')?;
        Digest::parse(suffix).ok()
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for SourceIdentifier {
    type Err = IdentifierError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a compiled built-in grammar.
fn grammar(
    pattern: &'static LazyLock<Result<Regex, regex::Error>>,
) -> Result<&'static Regex, IdentifierError> {
    pattern.as_ref().map_err(|err| IdentifierError::Grammar(err.to_string()))
}

/// Parses an HTTP(S) identifier as an absolute URL with a host.
fn parse_url(raw: &str) -> Result<Url, IdentifierError> {
    let url = Url::parse(raw).map_err(|err| IdentifierError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(IdentifierError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Parses a git remote with an optional `#ref` fragment.
fn parse_git(rest: &str) -> Result<SourceLocator, IdentifierError> {
    let invalid = |reason: &str| IdentifierError::InvalidLocator {
        scheme: SourceScheme::Git.as_str(),
        locator: rest.to_string(),
        reason: reason.to_string(),
    };
    if rest.chars().any(char::is_whitespace) {
        return Err(invalid("whitespace is not allowed"));
    }
    let (remote, reference) = match rest.split_once('#') {
        Some((remote, reference)) => (remote, Some(reference)),
        None => (rest, None),
    };
    if remote.is_empty() {
        return Err(invalid("empty remote"));
    }
    if reference.is_some_and(str::is_empty) {
        return Err(invalid("empty ref fragment"));
    }
    Ok(SourceLocator::Git {
        remote: remote.to_string(),
        reference: reference.map(str::to_string),
    })
}

/// Parses a local context name.
fn parse_local(rest: &str) -> Result<SourceLocator, IdentifierError> {
    if rest.contains('/') || rest.chars().any(char::is_whitespace) {
        return Err(IdentifierError::InvalidLocator {
            scheme: SourceScheme::Local.as_str(),
            locator: rest.to_string(),
            reason: "name must not contain '/' or whitespace".to_string(),
        });
    }
    Ok(SourceLocator::Local(rest.to_string()))
}
