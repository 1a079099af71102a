use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle stage shared by both trackers. Raw section and state labels are
/// folded into this once at the boundary; all later comparison works on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalStage {
    Backlog,
    InProgress,
    Dev,
    Stage,
    Blocked,
    ReadyForStage,
    Findings,
    Closed,
    Unmapped(String),
}

impl CanonicalStage {
    pub fn label(&self) -> &str {
        match self {
            Self::Backlog => "Backlog",
            Self::InProgress => "In Progress",
            Self::Dev => "Dev",
            Self::Stage => "Stage",
            Self::Blocked => "Blocked",
            Self::ReadyForStage => "Ready for Stage",
            Self::Findings => "Findings",
            Self::Closed => "Closed",
            Self::Unmapped(raw) => raw.as_str(),
        }
    }

    /// Work that has not been closed out on the tracker holding it.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Backlog | Self::InProgress | Self::Dev | Self::Stage | Self::Blocked
        )
    }

    /// Case and separator insensitive equality. Unmapped labels compare by
    /// their folded text.
    pub fn matches(&self, other: &CanonicalStage) -> bool {
        match (self, other) {
            (Self::Unmapped(left), Self::Unmapped(right)) => {
                let left = fold_label(left);
                !left.is_empty() && left == fold_label(right)
            }
            (left, right) => left == right,
        }
    }

    /// Precedence used when one section label satisfies several buckets.
    pub(crate) fn bucket_precedence(&self) -> u8 {
        match self {
            Self::ReadyForStage => 0,
            Self::Blocked => 1,
            Self::Findings => 2,
            Self::Backlog => 3,
            Self::InProgress => 4,
            Self::Dev => 5,
            Self::Stage => 6,
            Self::Closed => 7,
            Self::Unmapped(_) => 8,
        }
    }
}

impl fmt::Display for CanonicalStage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

/// Maps a raw status, state or column label onto a canonical stage.
pub fn normalize_status(raw_label: &str) -> CanonicalStage {
    stage_for_synonym(fold_label(raw_label).as_str())
        .unwrap_or_else(|| CanonicalStage::Unmapped(raw_label.trim().to_owned()))
}

fn stage_for_synonym(folded: &str) -> Option<CanonicalStage> {
    let stage = match folded {
        "backlog" | "open" | "to do" | "todo" | "new" => CanonicalStage::Backlog,
        "in progress" | "inprogress" | "doing" | "wip" => CanonicalStage::InProgress,
        "dev" | "development" | "in dev" | "in development" => CanonicalStage::Dev,
        "stage" | "staging" | "in stage" | "in staging" => CanonicalStage::Stage,
        "blocked" | "on hold" => CanonicalStage::Blocked,
        "ready for stage" | "ready for staging" => CanonicalStage::ReadyForStage,
        "findings" => CanonicalStage::Findings,
        "closed" | "done" | "resolved" | "complete" | "completed" | "fixed" | "archived" => {
            CanonicalStage::Closed
        }
        _ => return None,
    };
    Some(stage)
}

/// Lower-cases, turns every non-alphanumeric character into a separator and
/// collapses separator runs into single spaces.
pub fn fold_label(raw: &str) -> String {
    let spaced = raw
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
