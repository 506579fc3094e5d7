//! Storage namespace identifiers.
//!
//! # Invariants
//! - Exactly two namespaces exist for the process lifetime.
//! - Parsing is total: any raw value other than `"sync"` selects `Local`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Wire value for the synchronized namespace.
pub const NAMESPACE_SYNC: &str = "sync";
/// Wire value for the local namespace.
pub const NAMESPACE_LOCAL: &str = "local";

/// Isolated key/value scope targeted by a storage message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Sync,
    Local,
}

impl Namespace {
    /// Both namespaces, in registry order.
    pub const ALL: [Namespace; 2] = [Namespace::Sync, Namespace::Local];

    /// Resolves a raw namespace string.
    ///
    /// Matching is exact (no trimming or case folding). Unmatched input falls
    /// back to `Local`; callers rely on this never failing.
    pub fn parse(raw: &str) -> Self {
        match raw {
            NAMESPACE_SYNC => Self::Sync,
            _ => Self::Local,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => NAMESPACE_SYNC,
            Self::Local => NAMESPACE_LOCAL,
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
