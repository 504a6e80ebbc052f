//! Resource and action patterns
//!
//! A rule's resource and action are either a literal value or the wildcard
//! marker. Matching is case-sensitive and exact; there is no prefix or
//! glob matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The reserved wildcard marker.
pub const WILDCARD: &str = "*";

/// A rule-side match pattern.
///
/// # Example
///
/// ```
/// use platform_rbac::Pattern;
///
/// let any = Pattern::parse("*");
/// assert!(any.matches("doc"));
///
/// let doc = Pattern::parse("doc");
/// assert!(doc.matches("doc"));
/// assert!(!doc.matches("Doc"));
/// assert!(!doc.matches("document"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Pattern {
    /// Matches any value
    Any,
    /// Matches exactly this value
    Literal(String),
}

impl Pattern {
    /// Parse a pattern; the wildcard marker becomes [`Pattern::Any`].
    pub fn parse(s: &str) -> Self {
        if s == WILDCARD {
            Pattern::Any
        } else {
            Pattern::Literal(s.to_string())
        }
    }

    /// Check whether a concrete requested value matches this pattern.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Literal(literal) => literal == value,
        }
    }

    /// Check if this is the wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Pattern::Any)
    }

    /// Get the string form of the pattern.
    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Any => WILDCARD,
            Pattern::Literal(s) => s,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        if s == WILDCARD {
            Pattern::Any
        } else {
            Pattern::Literal(s)
        }
    }
}

impl From<Pattern> for String {
    fn from(p: Pattern) -> Self {
        match p {
            Pattern::Any => WILDCARD.to_string(),
            Pattern::Literal(s) => s,
        }
    }
}
