use serde::{Deserialize, Serialize};

use crate::status::{fold_label, normalize_status, CanonicalStage};

/// A configured column grouping, paired with the stage it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBucket {
    pub name: String,
    pub stage: CanonicalStage,
}

impl SectionBucket {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into().trim().to_owned();
        let stage = normalize_status(&name);
        Self { name, stage }
    }

    /// Case and separator insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        let folded = fold_label(name);
        !folded.is_empty() && fold_label(&self.name) == folded
    }
}

/// Whether a free-text section label belongs to `bucket`.
///
/// Section names are authored by people, so matching is substring based on
/// folded text, with exclusions where bucket names overlap:
///
/// * `Backlog` needs "backlog" and none of "dev", "stage", "blocked", "progress".
/// * `Dev` and `Stage` reject labels that also say "ready", so "Ready for
///   Stage" never lands in `Stage`.
/// * `Ready for Stage` needs both "ready" and "stage".
/// * Anything else is a plain substring test against the bucket name.
pub fn section_matches_bucket(section: &str, bucket: &str) -> bool {
    let section = fold_label(section);
    let bucket = fold_label(bucket);
    if section.is_empty() || bucket.is_empty() {
        return false;
    }

    match bucket.as_str() {
        "backlog" => {
            section.contains("backlog")
                && !["dev", "stage", "blocked", "progress"]
                    .iter()
                    .any(|keyword| section.contains(keyword))
        }
        "dev" | "stage" => section.contains(bucket.as_str()) && !section.contains("ready"),
        _ if bucket.contains("ready") && bucket.contains("stage") => {
            section.contains("ready") && section.contains("stage")
        }
        _ => section.contains(bucket.as_str()),
    }
}

/// Membership test against a set of candidate bucket names.
pub fn classify_section<S: AsRef<str>>(section: &str, candidate_buckets: &[S]) -> bool {
    candidate_buckets
        .iter()
        .any(|bucket| section_matches_bucket(section, bucket.as_ref()))
}

/// Resolves a section label to exactly one bucket. An exact (folded) name
/// match wins; otherwise buckets are tried in stage precedence order, ties
/// keeping their configured order.
pub fn bucket_for<S: AsRef<str>>(section: &str, candidate_buckets: &[S]) -> Option<SectionBucket> {
    let buckets = candidate_buckets
        .iter()
        .map(|bucket| SectionBucket::new(bucket.as_ref()))
        .filter(|bucket| !bucket.name.is_empty())
        .collect::<Vec<_>>();

    if let Some(exact) = buckets.iter().find(|bucket| bucket.is_named(section)) {
        return Some(exact.clone());
    }

    let mut ordered = buckets;
    ordered.sort_by_key(|bucket| bucket.stage.bucket_precedence());
    ordered
        .into_iter()
        .find(|bucket| section_matches_bucket(section, &bucket.name))
}

#[cfg(test)]
mod tests {
    use super::{bucket_for, classify_section, section_matches_bucket, SectionBucket};
    use crate::status::CanonicalStage;

    const BUCKETS: [&str; 7] = [
        "Backlog",
        "In Progress",
        "Dev",
        "Stage",
        "Blocked",
        "Ready for Stage",
        "Findings",
    ];

    #[test]
    fn backlog_excludes_labels_naming_other_stages() {
        assert!(section_matches_bucket("Product Backlog", "Backlog"));
        assert!(!section_matches_bucket("Backlog (Dev)", "Backlog"));
        assert!(!section_matches_bucket("Blocked backlog", "Backlog"));
        assert!(!section_matches_bucket("Backlog in progress", "Backlog"));
    }

    #[test]
    fn ready_for_stage_is_never_stage_or_dev() {
        assert!(!section_matches_bucket("Ready for Stage", "Stage"));
        assert!(!section_matches_bucket("Ready for Dev", "Dev"));
        assert!(section_matches_bucket("✅ Ready for Stage", "Ready for Stage"));
        assert!(section_matches_bucket("Stage ready", "Ready for Stage"));
        assert!(!section_matches_bucket("Ready for QA", "Ready for Stage"));
    }

    #[test]
    fn other_buckets_use_folded_substring_match() {
        assert!(section_matches_bucket("🚧 In-Progress", "In Progress"));
        assert!(section_matches_bucket("in_progress", "In Progress"));
        assert!(section_matches_bucket("Findings 2024", "Findings"));
        assert!(!section_matches_bucket("", "Findings"));
        assert!(!section_matches_bucket("Findings", "  "));
    }

    #[test]
    fn classify_section_reports_membership() {
        assert!(classify_section("DEV", &BUCKETS));
        assert!(!classify_section("Icebox", &BUCKETS));
        assert!(!classify_section("Ready for Dev", &BUCKETS));
    }

    #[test]
    fn bucket_for_prefers_exact_then_precedence() {
        let bucket = bucket_for("Ready for Stage", &BUCKETS).expect("bucket");
        assert_eq!(bucket.name, "Ready for Stage");
        assert_eq!(bucket.stage, CanonicalStage::ReadyForStage);

        let bucket = bucket_for("Blocked in Dev", &BUCKETS).expect("bucket");
        assert_eq!(bucket.stage, CanonicalStage::Blocked);

        let bucket = bucket_for("dev", &BUCKETS).expect("bucket");
        assert_eq!(bucket.name, "Dev");

        assert_eq!(bucket_for("Icebox", &BUCKETS), None);
    }

    #[test]
    fn custom_buckets_carry_unmapped_stage() {
        let bucket = bucket_for("QA review", &["QA"]).expect("bucket");
        assert_eq!(bucket, SectionBucket::new("QA"));
        assert_eq!(bucket.stage, CanonicalStage::Unmapped("QA".to_owned()));
    }
}
