//! Canonical variable identifiers.
//!
//! Every name that enters a graph goes through [`canonicalize`]: surrounding
//! whitespace is trimmed, trailing periods are stripped and internal
//! whitespace runs collapse to a single underscore. Nothing else happens:
//! no lower-casing, stemming or synonym merging, so `"Physical Activity"`
//! and `"physical activity level"` stay distinct variables.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Apply the canonicalization rule to a raw name.
///
/// ```
/// use causalq_core::variable::canonicalize;
///
/// assert_eq!(canonicalize(" Physical Activity. "), "Physical_Activity");
/// assert_eq!(canonicalize("Physical_Activity"), "Physical_Activity");
/// ```
pub fn canonicalize(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// A canonical variable identifier, used as the node key of a causal graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    /// Create a variable from a raw name, canonicalizing it.
    pub fn new(raw: &str) -> Self {
        Self(canonicalize(raw))
    }

    /// The canonical name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if canonicalization left nothing behind.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Variable {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Variable {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Variable {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Variable {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}
