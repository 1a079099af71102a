use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::records::{ExternalRecordA, ExternalRecordB};
use crate::status::CanonicalStage;

/// Resolver strategy that produced a pairing, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverTier {
    ExplicitMapping,
    EmbeddedReference,
    NormalizedTitle,
}

impl ResolverTier {
    pub const ALL: [ResolverTier; 3] = [
        ResolverTier::ExplicitMapping,
        ResolverTier::EmbeddedReference,
        ResolverTier::NormalizedTitle,
    ];

    pub const fn as_key(self) -> &'static str {
        match self {
            Self::ExplicitMapping => "explicit_mapping",
            Self::EmbeddedReference => "embedded_reference",
            Self::NormalizedTitle => "normalized_title",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "explicit_mapping" => Some(Self::ExplicitMapping),
            "embedded_reference" => Some(Self::EmbeddedReference),
            "normalized_title" => Some(Self::NormalizedTitle),
            _ => None,
        }
    }
}

/// A resolved pair with both sides folded onto canonical stages. `a_status`
/// is the stage the board record expects its counterpart to be in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusComparison {
    pub a_record: ExternalRecordA,
    pub b_record: ExternalRecordB,
    pub bucket: String,
    pub a_status: CanonicalStage,
    pub b_status: CanonicalStage,
    pub matched_by: ResolverTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRecord {
    pub a_record: ExternalRecordA,
    pub bucket: String,
    pub expected_status: CanonicalStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOnlyRecord {
    pub a_record: ExternalRecordA,
    pub bucket: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    /// The referenced board record is not in the fetched snapshot.
    ReferencedRecordMissing,
    /// No board record could be attributed to the issue at all.
    NoReference,
    /// The board record exists but sits in a syncable bucket outside this
    /// run's selection.
    ReferencedRecordOutOfScope,
    /// The board record is in scope but resolved to a different issue, or
    /// to none because the tier that would have linked them is disabled.
    DuplicateCounterpart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedRecord {
    pub b_record: ExternalRecordB,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_a_id: Option<String>,
    pub reason: OrphanReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsRecord {
    pub a_record: ExternalRecordA,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<ExternalRecordB>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b_status: Option<CanonicalStage>,
}

/// A findings-bucket record whose counterpart is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsAlert {
    pub a_id: String,
    pub a_title: String,
    pub b_id: String,
    pub b_key: String,
    pub b_status: CanonicalStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    BlankCounterpartId {
        a_id: String,
    },
    DuplicateRecordId {
        tracker: String,
        id: String,
    },
    DuplicateMappingForA {
        a_id: String,
        kept_b_id: String,
        dropped_b_id: String,
    },
    DuplicateMappingForB {
        b_id: String,
        kept_a_id: String,
        dropped_a_id: String,
    },
    StaleMapping {
        a_id: String,
        b_id: String,
    },
    ContestedReference {
        a_id: String,
        kept_b_id: String,
        dropped_b_id: String,
    },
    UnmappedSection {
        a_id: String,
        section: String,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankCounterpartId { a_id } => {
                write!(formatter, "record {a_id} resolved to an issue with a blank id")
            }
            Self::DuplicateRecordId { tracker, id } => {
                write!(formatter, "{tracker} snapshot contains id {id} more than once")
            }
            Self::DuplicateMappingForA {
                a_id,
                kept_b_id,
                dropped_b_id,
            } => write!(
                formatter,
                "record {a_id} has several explicit mappings; kept {kept_b_id}, dropped {dropped_b_id}"
            ),
            Self::DuplicateMappingForB {
                b_id,
                kept_a_id,
                dropped_a_id,
            } => write!(
                formatter,
                "issue {b_id} is mapped by several records; kept {kept_a_id}, dropped {dropped_a_id}"
            ),
            Self::StaleMapping { a_id, b_id } => write!(
                formatter,
                "explicit mapping {a_id} -> {b_id} points at an issue missing from the snapshot"
            ),
            Self::ContestedReference {
                a_id,
                kept_b_id,
                dropped_b_id,
            } => write!(
                formatter,
                "several issues reference record {a_id}; kept {kept_b_id}, dropped {dropped_b_id}"
            ),
            Self::UnmappedSection { a_id, section } => write!(
                formatter,
                "record {a_id} sits in section '{section}' which matches no configured bucket"
            ),
        }
    }
}

/// Partitioned outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TicketAnalysisResult {
    pub matched: Vec<StatusComparison>,
    pub mismatched: Vec<StatusComparison>,
    pub missing_in_b: Vec<MissingRecord>,
    pub orphaned_in_b: Vec<OrphanedRecord>,
    pub blocked: Vec<StatusComparison>,
    pub ready_for_stage: Vec<ExternalRecordA>,
    pub findings: Vec<FindingsRecord>,
    pub findings_alerts: Vec<FindingsAlert>,
    pub display_only: Vec<DisplayOnlyRecord>,
    pub ignored: BTreeSet<String>,
    pub unmapped_sections: BTreeMap<String, usize>,
    pub excluded_by_selection: usize,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisCounts {
    pub matched: usize,
    pub mismatched: usize,
    pub missing_in_b: usize,
    pub orphaned_in_b: usize,
    pub blocked: usize,
    pub ready_for_stage: usize,
    pub findings: usize,
    pub findings_alerts: usize,
    pub display_only: usize,
    pub ignored: usize,
    pub unmapped: usize,
    pub warnings: usize,
}

impl TicketAnalysisResult {
    pub fn counts(&self) -> AnalysisCounts {
        AnalysisCounts {
            matched: self.matched.len(),
            mismatched: self.mismatched.len(),
            missing_in_b: self.missing_in_b.len(),
            orphaned_in_b: self.orphaned_in_b.len(),
            blocked: self.blocked.len(),
            ready_for_stage: self.ready_for_stage.len(),
            findings: self.findings.len(),
            findings_alerts: self.findings_alerts.len(),
            display_only: self.display_only.len(),
            ignored: self.ignored.len(),
            unmapped: self.unmapped_sections.values().sum(),
            warnings: self.warnings.len(),
        }
    }

    /// Nothing to create, update or surface.
    pub fn is_in_sync(&self) -> bool {
        self.mismatched.is_empty()
            && self.missing_in_b.is_empty()
            && self.orphaned_in_b.is_empty()
            && self.findings_alerts.is_empty()
    }
}
