use std::collections::BTreeSet;

use tracksync_domain::{
    bucket_for, normalize_status, CanonicalStage, DataQualityWarning, DisplayOnlyRecord, ExplicitMapping,
    ExternalRecordA, ExternalRecordB, FindingsAlert, FindingsRecord, IgnoreFilter, MissingRecord,
    OrphanReason, OrphanedRecord, SectionBucket, StatusComparison, TicketAnalysisResult,
};

use crate::options::ReconcileOptions;
use crate::reference::{extract_reference, normalize_title};
use crate::resolver::{ResolvedPair, Resolution};
use crate::scope::{Placement, ScopedSnapshot};

/// Stage a ready-for-stage record's counterpart is expected to still show.
pub const READY_FOR_STAGE_EXPECTED: CanonicalStage = CanonicalStage::Dev;

/// Everything the classifier reads besides the resolution itself.
pub struct ClassifyContext<'a> {
    /// The unfiltered board snapshot, used to attribute unmatched issues.
    pub full_snapshot: &'a [ExternalRecordA],
    pub scope: &'a ScopedSnapshot,
    pub mappings: &'a [ExplicitMapping],
    pub options: &'a ReconcileOptions,
    pub ignore: &'a dyn IgnoreFilter,
}

/// Issues whose id or key is ignored, split off before resolution so they
/// can neither claim a board record nor surface as orphans. Returns the
/// remaining issues and the ignored identifiers.
pub fn exclude_ignored_issues(
    issues: &[ExternalRecordB],
    ignore: &dyn IgnoreFilter,
) -> (Vec<ExternalRecordB>, BTreeSet<String>) {
    let mut kept = Vec::with_capacity(issues.len());
    let mut ignored = BTreeSet::new();
    for issue in issues {
        match ignored_identifier(issue, ignore) {
            Some(identifier) => {
                ignored.insert(identifier);
            }
            None => kept.push(issue.clone()),
        }
    }
    (kept, ignored)
}

/// Partitions resolved and unresolved records into the analysis result.
/// Expects a resolution built from `exclude_ignored_issues` output. Never
/// fails; anomalies degrade to a conservative bucket plus a warning.
pub fn classify(resolution: &Resolution, context: &ClassifyContext<'_>) -> TicketAnalysisResult {
    let mut result = TicketAnalysisResult::default();

    for (record, pair) in resolution.entries() {
        if context.ignore.is_ignored(&record.id) {
            result.ignored.insert(record.id.trim().to_owned());
            continue;
        }

        let Some(bucket) = bucket_for(&record.section, &context.options.selected_buckets) else {
            result.warnings.push(DataQualityWarning::UnmappedSection {
                a_id: record.id.clone(),
                section: record.section.trim().to_owned(),
            });
            continue;
        };

        let pair = match pair {
            Some(pair) if pair.b_record.has_blank_id() => {
                result.warnings.push(DataQualityWarning::BlankCounterpartId {
                    a_id: record.id.clone(),
                });
                None
            }
            other => other,
        };

        classify_record(record, &bucket, pair, context.options, &mut result);
    }

    for issue in &resolution.unmatched_b {
        classify_unmatched_issue(issue, context, &mut result);
    }

    result
}

fn ignored_identifier(issue: &ExternalRecordB, ignore: &dyn IgnoreFilter) -> Option<String> {
    let id = issue.id.trim();
    if !id.is_empty() && ignore.is_ignored(id) {
        return Some(id.to_owned());
    }
    issue
        .key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty() && ignore.is_ignored(key))
        .map(str::to_owned)
}

fn classify_record(
    record: &ExternalRecordA,
    bucket: &SectionBucket,
    pair: Option<&ResolvedPair>,
    options: &ReconcileOptions,
    result: &mut TicketAnalysisResult,
) {
    match &bucket.stage {
        CanonicalStage::Findings => {
            let b_status = pair.map(|pair| normalize_status(&pair.b_record.state));
            if let (Some(pair), Some(status)) = (pair, b_status.as_ref()) {
                if status.is_active() {
                    result.findings_alerts.push(FindingsAlert {
                        a_id: record.id.clone(),
                        a_title: record.title.clone(),
                        b_id: pair.b_record.id.clone(),
                        b_key: pair.b_record.display_key().to_owned(),
                        b_status: status.clone(),
                    });
                }
            }
            result.findings.push(FindingsRecord {
                a_record: record.clone(),
                counterpart: pair.map(|pair| pair.b_record.clone()),
                b_status,
            });
        }
        CanonicalStage::ReadyForStage => {
            result.ready_for_stage.push(record.clone());
            match pair {
                Some(pair) => push_comparison(
                    compare(record, bucket, pair, READY_FOR_STAGE_EXPECTED),
                    result,
                ),
                None => result.missing_in_b.push(MissingRecord {
                    a_record: record.clone(),
                    bucket: bucket.name.clone(),
                    expected_status: READY_FOR_STAGE_EXPECTED,
                }),
            }
        }
        stage => match pair {
            None if options.is_syncable(bucket) => result.missing_in_b.push(MissingRecord {
                a_record: record.clone(),
                bucket: bucket.name.clone(),
                expected_status: stage.clone(),
            }),
            None => result.display_only.push(DisplayOnlyRecord {
                a_record: record.clone(),
                bucket: bucket.name.clone(),
            }),
            Some(pair) if *stage == CanonicalStage::Blocked => result
                .blocked
                .push(compare(record, bucket, pair, CanonicalStage::Blocked)),
            Some(pair) => push_comparison(compare(record, bucket, pair, stage.clone()), result),
        },
    }
}

fn compare(
    record: &ExternalRecordA,
    bucket: &SectionBucket,
    pair: &ResolvedPair,
    expected: CanonicalStage,
) -> StatusComparison {
    StatusComparison {
        a_record: record.clone(),
        b_record: pair.b_record.clone(),
        bucket: bucket.name.clone(),
        a_status: expected,
        b_status: normalize_status(&pair.b_record.state),
        matched_by: pair.tier,
    }
}

fn push_comparison(comparison: StatusComparison, result: &mut TicketAnalysisResult) {
    if comparison.a_status.matches(&comparison.b_status) {
        result.matched.push(comparison);
    } else {
        result.mismatched.push(comparison);
    }
}

/// An issue nobody claimed is an orphan unless the board record it points
/// at is ignored, or parked in a bucket that never syncs.
fn classify_unmatched_issue(
    issue: &ExternalRecordB,
    context: &ClassifyContext<'_>,
    result: &mut TicketAnalysisResult,
) {
    let Some(a_id) = referenced_record(issue, context) else {
        result.orphaned_in_b.push(OrphanedRecord {
            b_record: issue.clone(),
            referenced_a_id: None,
            reason: OrphanReason::NoReference,
        });
        return;
    };

    if context.ignore.is_ignored(&a_id) {
        result.ignored.insert(a_id);
        return;
    }

    let reason = match context.scope.placement(&a_id) {
        None => OrphanReason::ReferencedRecordMissing,
        Some(Placement::Selected(_)) => OrphanReason::DuplicateCounterpart,
        Some(Placement::Excluded(bucket)) if context.options.is_syncable(bucket) => {
            OrphanReason::ReferencedRecordOutOfScope
        }
        Some(Placement::Excluded(_) | Placement::Unmapped) => return,
    };
    result.orphaned_in_b.push(OrphanedRecord {
        b_record: issue.clone(),
        referenced_a_id: Some(a_id),
        reason,
    });
}

/// Board id an issue points at: explicit mapping first, then an embedded
/// back-reference, then a title hit anywhere in the full snapshot. All
/// probes run here even when the matching resolver tier is disabled.
fn referenced_record(issue: &ExternalRecordB, context: &ClassifyContext<'_>) -> Option<String> {
    let mut mapped = context
        .mappings
        .iter()
        .filter(|mapping| !mapping.a_id.trim().is_empty() && issue.answers_to(&mapping.b_id))
        .map(|mapping| mapping.a_id.trim().to_owned())
        .collect::<Vec<_>>();
    mapped.sort();
    if let Some(a_id) = mapped.into_iter().next() {
        return Some(a_id);
    }

    let labels = &context.options.resolver.reference_labels;
    if let Some(a_id) = extract_reference(&issue.description, labels) {
        return Some(a_id);
    }

    let key = normalize_title(&issue.summary);
    if key.is_empty() {
        return None;
    }
    context
        .full_snapshot
        .iter()
        .filter(|record| !record.id.trim().is_empty() && normalize_title(&record.title) == key)
        .map(|record| record.id.trim().to_owned())
        .min()
}
