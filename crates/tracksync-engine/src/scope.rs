use std::collections::BTreeMap;

use tracksync_domain::{bucket_for, DataQualityWarning, ExternalRecordA, SectionBucket};

use crate::options::ReconcileOptions;
use crate::resolver::{dedupe_by_id, TRACKER_A};

/// Where a board record landed when its section was matched against the
/// configured buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Selected(SectionBucket),
    /// Known bucket that this run did not ask for.
    Excluded(SectionBucket),
    /// Section matches no configured bucket at all.
    Unmapped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopedSnapshot {
    /// Sorted by id, one record per non-blank id.
    pub selected: Vec<ExternalRecordA>,
    /// Placement for every non-blank id in the deduplicated snapshot.
    pub placements: BTreeMap<String, Placement>,
    pub unmapped_sections: BTreeMap<String, usize>,
    pub excluded_by_selection: usize,
    pub warnings: Vec<DataQualityWarning>,
}

impl ScopedSnapshot {
    pub fn placement(&self, a_id: &str) -> Option<&Placement> {
        self.placements.get(a_id.trim())
    }
}

/// Splits the full board snapshot into the records this run reconciles and
/// the ones it only needs for orphan attribution. Duplicate ids are dropped
/// here, before any bucket is looked at, so a record can never be shadowed
/// by a same-id record sitting in another section.
pub fn select_scope(records: &[ExternalRecordA], options: &ReconcileOptions) -> ScopedSnapshot {
    let known = options.known_buckets();
    let mut scoped = ScopedSnapshot::default();
    let records = dedupe_by_id(records, |record| &record.id, TRACKER_A, &mut scoped.warnings);

    for record in records {
        let placement = if let Some(bucket) = bucket_for(&record.section, &options.selected_buckets)
        {
            scoped.selected.push(record.clone());
            Placement::Selected(bucket)
        } else if let Some(bucket) = bucket_for(&record.section, &known) {
            scoped.excluded_by_selection += 1;
            Placement::Excluded(bucket)
        } else {
            let section = record.section.trim().to_owned();
            *scoped.unmapped_sections.entry(section.clone()).or_default() += 1;
            scoped.warnings.push(DataQualityWarning::UnmappedSection {
                a_id: record.id.clone(),
                section,
            });
            Placement::Unmapped
        };

        let id = record.id.trim();
        if !id.is_empty() {
            scoped.placements.insert(id.to_owned(), placement);
        }
    }
    scoped
}

#[cfg(test)]
mod tests {
    use super::{select_scope, Placement};
    use crate::options::ReconcileOptions;
    use tracksync_domain::{CanonicalStage, DataQualityWarning, ExternalRecordA};

    fn task(id: &str, section: &str) -> ExternalRecordA {
        ExternalRecordA {
            id: id.to_owned(),
            title: format!("Task {id}"),
            body: String::new(),
            section: section.to_owned(),
            tags: Vec::new(),
            assignee: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn records_split_into_selected_excluded_and_unmapped() {
        let options = ReconcileOptions::default().with_selected_buckets(&["Dev"]);
        let records = vec![
            task("1", "🚧 Dev"),
            task("2", "Stage"),
            task("3", "Icebox"),
            task("4", "Icebox"),
        ];

        let scoped = select_scope(&records, &options);

        assert_eq!(scoped.selected.len(), 1);
        assert!(matches!(
            scoped.placement("1"),
            Some(Placement::Selected(bucket)) if bucket.stage == CanonicalStage::Dev
        ));
        assert!(matches!(scoped.placement("2"), Some(Placement::Excluded(_))));
        assert_eq!(scoped.placement("3"), Some(&Placement::Unmapped));
        assert_eq!(scoped.excluded_by_selection, 1);
        assert_eq!(scoped.unmapped_sections.get("Icebox"), Some(&2));
        assert_eq!(scoped.warnings.len(), 2);
    }

    #[test]
    fn duplicate_ids_keep_the_first_record_before_buckets_are_checked() {
        let options = ReconcileOptions::default();
        let records = vec![task("1", "Icebox"), task("1", "Dev")];

        let scoped = select_scope(&records, &options);

        assert_eq!(scoped.placement("1"), Some(&Placement::Unmapped));
        assert!(scoped.selected.is_empty());
        assert_eq!(
            scoped.warnings,
            vec![
                DataQualityWarning::DuplicateRecordId {
                    tracker: "tracker_a".to_owned(),
                    id: "1".to_owned(),
                },
                DataQualityWarning::UnmappedSection {
                    a_id: "1".to_owned(),
                    section: "Icebox".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn blank_ids_are_selected_without_a_placement() {
        let records = vec![task(" ", "Icebox"), task("", "Dev")];

        let scoped = select_scope(&records, &ReconcileOptions::default());

        assert_eq!(scoped.selected.len(), 1);
        assert!(scoped.placements.is_empty());
    }

    #[test]
    fn display_only_buckets_are_known_even_when_unselected() {
        let scoped = select_scope(&[task("9", "Done")], &ReconcileOptions::default());
        assert!(scoped.selected.is_empty());
        assert_eq!(scoped.excluded_by_selection, 1);
        assert!(scoped.unmapped_sections.is_empty());
    }
}
