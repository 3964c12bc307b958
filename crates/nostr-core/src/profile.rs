//! Kind 0 profile metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile metadata from a kind 0 event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileMetadata {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub picture: Option<String>,
    pub nip05: Option<String>,
    pub lud16: Option<String>,
    /// `created_at` of the kind 0 event this was read from.
    pub created_at: u64,
}

impl ProfileMetadata {
    /// Parse kind 0 content. Non-object JSON yields `None`; fields with
    /// the wrong type are treated as absent.
    pub fn from_json(content: &str, created_at: u64) -> Option<Self> {
        let meta: Value = serde_json::from_str(content).ok()?;
        if !meta.is_object() {
            return None;
        }
        let field = |key: &str| {
            meta.get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        Some(Self {
            name: field("name"),
            display_name: field("display_name").or_else(|| field("displayName")),
            about: field("about"),
            picture: field("picture"),
            nip05: field("nip05"),
            lud16: field("lud16"),
            created_at,
        })
    }

    /// Display name, else name.
    pub fn best_name(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.name.as_deref())
    }

    /// Keep whichever of two profiles is newer.
    pub fn newest(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if b.created_at > a.created_at { b } else { a }),
            (a, b) => a.or(b),
        }
    }
}
