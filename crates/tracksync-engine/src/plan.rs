//! Turns an analysis result into write-back actions for the issue tracker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use tracksync_domain::{map_tag_to_label, CanonicalStage, ExternalRecordA, TicketAnalysisResult};

use crate::options::DEFAULT_REFERENCE_LABELS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlanOptions {
    /// Issue-tracker state written for each canonical stage.
    pub state_map: Vec<(CanonicalStage, String)>,
    /// Board tag to issue subsystem.
    pub tag_map: BTreeMap<String, String>,
    /// Label of the back-reference line appended to created issues.
    pub reference_label: String,
    pub default_subsystem: Option<String>,
}

impl Default for SyncPlanOptions {
    fn default() -> Self {
        Self {
            state_map: default_state_map(),
            tag_map: BTreeMap::new(),
            reference_label: DEFAULT_REFERENCE_LABELS[0].to_owned(),
            default_subsystem: None,
        }
    }
}

impl SyncPlanOptions {
    pub fn state_for(&self, stage: &CanonicalStage) -> Option<&str> {
        self.state_map
            .iter()
            .find(|(mapped, state)| mapped.matches(stage) && !state.trim().is_empty())
            .map(|(_, state)| state.trim())
    }

    fn subsystem_for(&self, record: &ExternalRecordA) -> Option<String> {
        record
            .primary_tag()
            .map(|tag| map_tag_to_label(tag, &self.tag_map))
            .filter(|label| !label.is_empty())
            .or_else(|| self.default_subsystem.clone())
    }

    fn description_for(&self, record: &ExternalRecordA) -> String {
        let label = match self.reference_label.trim() {
            "" => DEFAULT_REFERENCE_LABELS[0],
            label => label,
        };
        let reference = format!("{label}: {}", record.id.trim());
        match record.body.trim() {
            "" => reference,
            body => format!("{body}\n\n{reference}"),
        }
    }
}

pub fn default_state_map() -> Vec<(CanonicalStage, String)> {
    [
        (CanonicalStage::Backlog, "Backlog"),
        (CanonicalStage::InProgress, "In Progress"),
        (CanonicalStage::Dev, "Dev"),
        (CanonicalStage::Stage, "Stage"),
        (CanonicalStage::Blocked, "Blocked"),
        (CanonicalStage::Closed, "Closed"),
    ]
    .into_iter()
    .map(|(stage, state)| (stage, state.to_owned()))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIssuePlan {
    pub a_id: String,
    pub summary: String,
    pub description: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystem: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIssueStatePlan {
    pub a_id: String,
    pub b_id: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    CreateIssue(CreateIssuePlan),
    UpdateIssueState(UpdateIssueStatePlan),
}

impl SyncAction {
    pub fn a_id(&self) -> &str {
        match self {
            Self::CreateIssue(plan) => plan.a_id.as_str(),
            Self::UpdateIssueState(plan) => plan.a_id.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAction {
    pub a_id: String,
    pub stage: CanonicalStage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Sorted by board record id.
    pub actions: Vec<SyncAction>,
    /// Records whose stage has no configured issue state.
    pub skipped: Vec<SkippedAction>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Creates for records missing on the issue tracker, state updates for
/// mismatched pairs. Blocked and findings records are left alone.
pub fn plan_sync_actions(result: &TicketAnalysisResult, options: &SyncPlanOptions) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for missing in &result.missing_in_b {
        let Some(state) = options.state_for(&missing.expected_status) else {
            skip(&mut plan, &missing.a_record.id, &missing.expected_status);
            continue;
        };
        plan.actions.push(SyncAction::CreateIssue(CreateIssuePlan {
            a_id: missing.a_record.id.clone(),
            summary: missing.a_record.title.trim().to_owned(),
            description: options.description_for(&missing.a_record),
            state: state.to_owned(),
            subsystem: options.subsystem_for(&missing.a_record),
        }));
    }

    for comparison in &result.mismatched {
        let Some(state) = options.state_for(&comparison.a_status) else {
            skip(&mut plan, &comparison.a_record.id, &comparison.a_status);
            continue;
        };
        plan.actions
            .push(SyncAction::UpdateIssueState(UpdateIssueStatePlan {
                a_id: comparison.a_record.id.clone(),
                b_id: comparison.b_record.id.clone(),
                from: comparison.b_record.state.clone(),
                to: state.to_owned(),
            }));
    }

    plan.actions
        .sort_by(|left, right| left.a_id().cmp(right.a_id()));
    plan
}

fn skip(plan: &mut SyncPlan, a_id: &str, stage: &CanonicalStage) {
    warn!(a_id = %a_id, stage = %stage, "no issue state configured for stage; skipping");
    plan.skipped.push(SkippedAction {
        a_id: a_id.to_owned(),
        stage: stage.clone(),
    });
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{plan_sync_actions, SyncAction, SyncPlanOptions};
    use tracksync_domain::{
        CanonicalStage, ExternalRecordA, ExternalRecordB, MissingRecord, ResolverTier,
        StatusComparison, TicketAnalysisResult,
    };

    fn task(id: &str, tags: &[&str], body: &str) -> ExternalRecordA {
        ExternalRecordA {
            id: id.to_owned(),
            title: format!(" Task {id} "),
            body: body.to_owned(),
            section: String::new(),
            tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
            assignee: None,
            created_at: String::new(),
        }
    }

    fn missing(record: ExternalRecordA, stage: CanonicalStage) -> MissingRecord {
        MissingRecord {
            a_record: record,
            bucket: stage.label().to_owned(),
            expected_status: stage,
        }
    }

    #[test]
    fn missing_records_become_creates_with_back_reference() {
        let mut result = TicketAnalysisResult::default();
        result
            .missing_in_b
            .push(missing(task("1201", &["Payments"], "Repro steps"), CanonicalStage::Dev));
        let options = SyncPlanOptions {
            tag_map: BTreeMap::from([("payments".to_owned(), "billing".to_owned())]),
            ..SyncPlanOptions::default()
        };

        let plan = plan_sync_actions(&result, &options);

        let SyncAction::CreateIssue(create) = &plan.actions[0] else {
            panic!("expected create action");
        };
        assert_eq!(create.summary, "Task 1201");
        assert_eq!(create.state, "Dev");
        assert_eq!(create.subsystem.as_deref(), Some("billing"));
        assert_eq!(create.description, "Repro steps\n\nAsana Task ID: 1201");
    }

    #[test]
    fn mismatches_become_state_updates_sorted_by_record() {
        let mut result = TicketAnalysisResult::default();
        result
            .missing_in_b
            .push(missing(task("9", &[], ""), CanonicalStage::Backlog));
        result.mismatched.push(StatusComparison {
            a_record: task("3", &[], ""),
            b_record: ExternalRecordB {
                id: "b3".to_owned(),
                key: None,
                summary: "Task 3".to_owned(),
                description: String::new(),
                state: "STAGE".to_owned(),
                subsystem: None,
                created_at: String::new(),
                updated_at: String::new(),
            },
            bucket: "Dev".to_owned(),
            a_status: CanonicalStage::Dev,
            b_status: CanonicalStage::Stage,
            matched_by: ResolverTier::ExplicitMapping,
        });

        let plan = plan_sync_actions(&result, &SyncPlanOptions::default());

        let ids = plan.actions.iter().map(SyncAction::a_id).collect::<Vec<_>>();
        assert_eq!(ids, vec!["3", "9"]);
        let SyncAction::UpdateIssueState(update) = &plan.actions[0] else {
            panic!("expected update action");
        };
        assert_eq!(update.from, "STAGE");
        assert_eq!(update.to, "Dev");
    }

    #[test]
    fn stages_without_a_state_are_skipped() {
        let mut result = TicketAnalysisResult::default();
        result.missing_in_b.push(missing(
            task("7", &[], ""),
            CanonicalStage::Unmapped("QA".to_owned()),
        ));

        let plan = plan_sync_actions(&result, &SyncPlanOptions::default());

        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].a_id, "7");
    }

    #[test]
    fn actions_serialize_with_action_tag() {
        let mut result = TicketAnalysisResult::default();
        result
            .missing_in_b
            .push(missing(task("1", &[], ""), CanonicalStage::Backlog));

        let plan = plan_sync_actions(&result, &SyncPlanOptions::default());
        let value = serde_json::to_value(&plan.actions[0]).expect("serialize action");

        assert_eq!(value["action"], "create_issue");
        assert_eq!(value["description"], "Asana Task ID: 1");
        assert!(value.get("subsystem").is_none());
    }
}
