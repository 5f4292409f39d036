//! Derived workflow status.

use super::state::{WorkflowMode, WorkflowSession};
use crate::models::Stage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Externally visible status of a session.
///
/// Serialized as a flat string such as `"prd_published"` or `"prd_failed"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum WorkflowStatus {
    WaitingForInput,
    ReadyForNext,
    IdeaRefined,
    StoriesGenerated,
    ReadyForWireframes,
    PrdPublished,
    SprintsPlanned,
    VisualsCreated,
    /// Visual board produced and ready; nothing left to run
    Completed,
    IterationCycle,
    SuspendedForApproval,
    StageFailed(Stage),
}

impl WorkflowStatus {
    /// Completion alias for the most downstream valid stage.
    pub fn completed(stage: Stage, published: bool) -> Self {
        match stage {
            Stage::Idea => WorkflowStatus::IdeaRefined,
            Stage::UserStories => WorkflowStatus::StoriesGenerated,
            Stage::Prd if published => WorkflowStatus::PrdPublished,
            Stage::Prd => WorkflowStatus::ReadyForWireframes,
            Stage::SprintPlan => WorkflowStatus::SprintsPlanned,
            Stage::VisualDesign => WorkflowStatus::VisualsCreated,
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, WorkflowStatus::StageFailed(_))
    }

    pub fn is_suspended(self) -> bool {
        self == WorkflowStatus::SuspendedForApproval
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::WaitingForInput => write!(f, "waiting_for_input"),
            WorkflowStatus::ReadyForNext => write!(f, "ready_for_next"),
            WorkflowStatus::IdeaRefined => write!(f, "idea_refined"),
            WorkflowStatus::StoriesGenerated => write!(f, "stories_generated"),
            WorkflowStatus::ReadyForWireframes => write!(f, "ready_for_wireframes"),
            WorkflowStatus::PrdPublished => write!(f, "prd_published"),
            WorkflowStatus::SprintsPlanned => write!(f, "sprints_planned"),
            WorkflowStatus::VisualsCreated => write!(f, "visuals_created"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::IterationCycle => write!(f, "iteration_cycle"),
            WorkflowStatus::SuspendedForApproval => write!(f, "suspended_for_approval"),
            WorkflowStatus::StageFailed(stage) => write!(f, "{}_failed", stage),
        }
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "waiting_for_input" => WorkflowStatus::WaitingForInput,
            "ready_for_next" => WorkflowStatus::ReadyForNext,
            "idea_refined" => WorkflowStatus::IdeaRefined,
            "stories_generated" => WorkflowStatus::StoriesGenerated,
            "ready_for_wireframes" => WorkflowStatus::ReadyForWireframes,
            "prd_published" => WorkflowStatus::PrdPublished,
            "sprints_planned" => WorkflowStatus::SprintsPlanned,
            "visuals_created" => WorkflowStatus::VisualsCreated,
            "completed" => WorkflowStatus::Completed,
            "iteration_cycle" => WorkflowStatus::IterationCycle,
            "suspended_for_approval" => WorkflowStatus::SuspendedForApproval,
            other => {
                let stage = other
                    .strip_suffix("_failed")
                    .and_then(|name| Stage::ALL.into_iter().find(|s| s.as_str() == name))
                    .ok_or_else(|| format!("Unknown workflow status '{}'", other))?;
                WorkflowStatus::StageFailed(stage)
            }
        };
        Ok(status)
    }
}

impl From<WorkflowStatus> for String {
    fn from(status: WorkflowStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for WorkflowStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Derive the status of a session.
///
/// Precedence: suspended_for_approval, then the most downstream stage
/// failure, then iteration_cycle while a feedback iteration has unresolved
/// dirty stages, then the completion alias of the most downstream valid
/// stage, then waiting_for_input.
pub fn compute_status(session: &WorkflowSession) -> WorkflowStatus {
    if session.pending_approval.is_some() {
        return WorkflowStatus::SuspendedForApproval;
    }

    if let Some(stage) = session.latest_failure() {
        return WorkflowStatus::StageFailed(stage);
    }

    if session.mode == WorkflowMode::FeedbackIteration && !session.dirty_stages().is_empty() {
        return WorkflowStatus::IterationCycle;
    }

    let Some(last) = session.last_valid_stage() else {
        return WorkflowStatus::WaitingForInput;
    };
    let Some(artifact) = session.artifact(last) else {
        return WorkflowStatus::WaitingForInput;
    };

    if !artifact.ready_for_next_step {
        // Board exists but some persona journeys are missing.
        if last == Stage::VisualDesign {
            return WorkflowStatus::VisualsCreated;
        }
        return WorkflowStatus::WaitingForInput;
    }

    match session.next_enabled(last) {
        Some(_) => WorkflowStatus::ReadyForNext,
        None if last == Stage::VisualDesign => WorkflowStatus::Completed,
        None => WorkflowStatus::completed(last, artifact.is_published()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artifact, PublishReport, RefinedIdea, StageOutput, UserStoryList};
    use crate::workflow::state::{PendingApproval, WorkflowSettings};

    fn output(stage: Stage, ready: bool) -> StageOutput {
        let artifact = match stage {
            Stage::Idea => Artifact::Idea(RefinedIdea::new("Idea", "Problem")),
            _ => Artifact::UserStories(UserStoryList::default()),
        };
        StageOutput::new(artifact, ready)
    }

    fn session(sprints: bool, visuals: bool) -> WorkflowSession {
        let mut settings = WorkflowSettings::new("A habit tracker for busy professionals");
        settings.enable_sprint_planning = sprints;
        settings.enable_visual_design = visuals;
        WorkflowSession::new(settings)
    }

    #[test]
    fn test_status_string_form() {
        assert_eq!(WorkflowStatus::StageFailed(Stage::Prd).to_string(), "prd_failed");
        assert_eq!(
            "user_stories_failed".parse::<WorkflowStatus>().unwrap(),
            WorkflowStatus::StageFailed(Stage::UserStories)
        );
        let json = serde_json::to_string(&WorkflowStatus::ReadyForWireframes).unwrap();
        assert_eq!(json, "\"ready_for_wireframes\"");
        assert!("exploded".parse::<WorkflowStatus>().is_err());
    }

    #[test]
    fn test_fresh_session_waits_for_input() {
        assert_eq!(compute_status(&session(false, false)), WorkflowStatus::WaitingForInput);
    }

    #[test]
    fn test_completion_aliases() {
        let mut s = session(false, false);
        s.record_success(Stage::Idea, output(Stage::Idea, true), 3);
        s.record_success(Stage::UserStories, output(Stage::UserStories, true), 3);
        s.record_success(Stage::Prd, output(Stage::Prd, true), 3);
        assert_eq!(compute_status(&s), WorkflowStatus::ReadyForWireframes);

        s.record_success(
            Stage::Prd,
            output(Stage::Prd, true).with_publish(PublishReport {
                target: "document_store".to_string(),
                artifact_generated: true,
                published: true,
                attempts: 1,
                external_url: None,
                external_id: None,
                error_message: None,
            }),
            3,
        );
        assert_eq!(compute_status(&s), WorkflowStatus::PrdPublished);
    }

    #[test]
    fn test_ready_for_next_and_waiting() {
        let mut s = session(true, false);
        s.record_success(Stage::Idea, output(Stage::Idea, true), 3);
        assert_eq!(compute_status(&s), WorkflowStatus::ReadyForNext);

        s.record_success(Stage::Idea, output(Stage::Idea, false), 3);
        assert_eq!(compute_status(&s), WorkflowStatus::WaitingForInput);
    }

    #[test]
    fn test_precedence() {
        let mut s = session(true, true);
        for stage in Stage::ALL {
            s.record_success(stage, output(stage, true), 3);
        }
        assert_eq!(compute_status(&s), WorkflowStatus::Completed);

        s.record_success(Stage::VisualDesign, output(Stage::VisualDesign, false), 3);
        assert_eq!(compute_status(&s), WorkflowStatus::VisualsCreated);

        s.mode = WorkflowMode::FeedbackIteration;
        s.invalidate_from(Stage::SprintPlan);
        assert_eq!(compute_status(&s), WorkflowStatus::IterationCycle);

        s.record_failure(Stage::SprintPlan, "capacity is zero");
        assert_eq!(compute_status(&s), WorkflowStatus::StageFailed(Stage::SprintPlan));

        s.pending_approval = Some(PendingApproval {
            decisions: Vec::new(),
            feedback: Vec::new(),
            recommended_actions: Vec::new(),
            affected_stages: Vec::new(),
            requested_at: chrono::Utc::now(),
        });
        assert_eq!(compute_status(&s), WorkflowStatus::SuspendedForApproval);
    }

    #[test]
    fn test_step_refinement_reports_completion_not_iteration() {
        let mut s = session(false, false);
        for stage in [Stage::Idea, Stage::UserStories, Stage::Prd] {
            s.record_success(stage, output(stage, true), 3);
        }
        s.mode = WorkflowMode::StepRefinement;
        s.invalidate_from(Stage::Prd);
        assert_eq!(compute_status(&s), WorkflowStatus::ReadyForNext);
    }
}
