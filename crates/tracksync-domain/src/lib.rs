//! Data model and label normalization shared by the reconciliation engine
//! and its collaborators.

pub mod analysis;
pub mod error;
pub mod identifiers;
pub mod ignore;
pub mod records;
pub mod section;
pub mod status;
pub mod tags;

pub use analysis::{
    AnalysisCounts, DataQualityWarning, DisplayOnlyRecord, FindingsAlert, FindingsRecord,
    MissingRecord, OrphanReason, OrphanedRecord, ResolverTier, StatusComparison,
    TicketAnalysisResult,
};
pub use error::CoreError;
pub use identifiers::TenantId;
pub use ignore::{IgnoreFilter, NoIgnores};
pub use records::{ExplicitMapping, ExternalRecordA, ExternalRecordB};
pub use section::{bucket_for, classify_section, section_matches_bucket, SectionBucket};
pub use status::{fold_label, normalize_status, CanonicalStage};
pub use tags::map_tag_to_label;
