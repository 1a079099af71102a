use serde::{Deserialize, Serialize};

/// One task on the board tracker, as fetched for a single reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecordA {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl ExternalRecordA {
    /// The tag used for subsystem mapping: the first non-blank tag in
    /// declaration order.
    pub fn primary_tag(&self) -> Option<&str> {
        self.tags
            .iter()
            .map(|tag| tag.trim())
            .find(|tag| !tag.is_empty())
    }
}

/// One issue on the secondary tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecordB {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystem: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl ExternalRecordB {
    /// True when `identifier` names this issue by internal id or by its
    /// human-readable key.
    pub fn answers_to(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return false;
        }
        self.id.trim() == identifier
            || self
                .key
                .as_deref()
                .map(str::trim)
                .is_some_and(|key| key.eq_ignore_ascii_case(identifier))
    }

    pub fn has_blank_id(&self) -> bool {
        self.id.trim().is_empty()
    }

    pub fn display_key(&self) -> &str {
        self.key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .unwrap_or(self.id.as_str())
    }
}

/// Persisted, authoritative pairing written by an earlier create or sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExplicitMapping {
    pub a_id: String,
    pub b_id: String,
}

impl ExplicitMapping {
    pub fn new(a_id: impl Into<String>, b_id: impl Into<String>) -> Self {
        Self {
            a_id: a_id.into(),
            b_id: b_id.into(),
        }
    }
}
