use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tracksync_domain::{
    ExplicitMapping, ExternalRecordA, ExternalRecordB, IgnoreFilter, TicketAnalysisResult,
};

use crate::classifier::{classify, exclude_ignored_issues, ClassifyContext};
use crate::options::ReconcileOptions;
use crate::resolver::resolve;
use crate::scope::select_scope;

/// The three snapshots one run works from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileInput {
    #[serde(default)]
    pub a_records: Vec<ExternalRecordA>,
    #[serde(default)]
    pub b_records: Vec<ExternalRecordB>,
    #[serde(default)]
    pub mappings: Vec<ExplicitMapping>,
}

/// Scope selection, ignore filtering, identity resolution and
/// classification over one snapshot. Pure: the same input always yields the
/// same result, and nothing outside the returned value is touched.
pub fn reconcile(
    input: &ReconcileInput,
    options: &ReconcileOptions,
    ignore: &dyn IgnoreFilter,
) -> TicketAnalysisResult {
    let scope = select_scope(&input.a_records, options);
    let (b_records, ignored_issues) = exclude_ignored_issues(&input.b_records, ignore);
    let resolution = resolve(
        &scope.selected,
        &b_records,
        &input.mappings,
        &options.resolver,
    );
    debug!(
        selected = scope.selected.len(),
        pairs = resolution.pairs.len(),
        unmatched_a = resolution.unmatched_a.len(),
        unmatched_b = resolution.unmatched_b.len(),
        "resolved board records against issues"
    );

    let mut result = classify(
        &resolution,
        &ClassifyContext {
            full_snapshot: &input.a_records,
            scope: &scope,
            mappings: &input.mappings,
            options,
            ignore,
        },
    );
    result.ignored.extend(ignored_issues);
    result.unmapped_sections = scope.unmapped_sections.clone();
    result.excluded_by_selection = scope.excluded_by_selection;

    let mut warnings = scope.warnings.clone();
    warnings.extend(resolution.warnings.iter().cloned());
    warnings.append(&mut result.warnings);
    for warning in &warnings {
        warn!(warning = %warning, "data quality issue during reconciliation");
    }
    result.warnings = warnings;
    result
}

#[cfg(test)]
mod tests {
    use super::{reconcile, ReconcileInput};
    use crate::options::ReconcileOptions;
    use tracksync_domain::{DataQualityWarning, NoIgnores};

    #[test]
    fn input_decodes_with_missing_collections() {
        let input: ReconcileInput = serde_json::from_value(serde_json::json!({
            "a_records": [{ "id": "1", "title": "Fix bug", "section": "Icebox" }]
        }))
        .expect("decode input");

        let result = reconcile(&input, &ReconcileOptions::default(), &NoIgnores);

        assert_eq!(result.unmapped_sections.get("Icebox"), Some(&1));
        assert_eq!(result.counts().unmapped, 1);
        assert_eq!(
            result.warnings,
            vec![DataQualityWarning::UnmappedSection {
                a_id: "1".to_owned(),
                section: "Icebox".to_owned(),
            }]
        );
        assert!(result.is_in_sync());
    }
}
