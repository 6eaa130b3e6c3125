//! Route matching logic.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Prefix matching mirrors "match at start of path" semantics
//! - Wildcard always matches and is only used for the default route

use std::fmt;

/// How a route decides whether it serves a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// The whole path must equal this string.
    Exact(String),
    /// The path must start with this string.
    Prefix(String),
    /// Matches every path.
    Wildcard,
}

/// What a successful match found, handed to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Exact,
    /// Prefix matched; `rest` is the remainder of the path.
    Prefix { rest: String },
    /// No explicit route matched; the default handler is serving.
    Default,
}

impl Matcher {
    pub fn exact(path: impl Into<String>) -> Self {
        Matcher::Exact(path.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Matcher::Prefix(prefix.into())
    }

    /// Test `path` against this matcher.
    pub fn matches(&self, path: &str) -> Option<MatchOutcome> {
        match self {
            Matcher::Exact(expected) => (path == expected).then_some(MatchOutcome::Exact),
            Matcher::Prefix(prefix) => path.strip_prefix(prefix.as_str()).map(|rest| MatchOutcome::Prefix {
                rest: rest.to_string(),
            }),
            Matcher::Wildcard => Some(MatchOutcome::Default),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Matcher::Wildcard)
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(path) => write!(f, "{path}"),
            Matcher::Prefix(prefix) => write!(f, "{prefix}*"),
            Matcher::Wildcard => write!(f, "default"),
        }
    }
}
