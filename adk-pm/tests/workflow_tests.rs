//! End-to-end tests for the workflow orchestrator.

use adk_pm::publish::{DOCUMENT_STORE, ISSUE_TRACKER, WHITEBOARD};
use adk_pm::{
    Approval, Artifact, Feedback, FeedbackType, PmConfig, PmError, Priority, PublishConfig,
    Publishers, RecordingPublisher, RefinedIdea, Result, SprintLength, SprintPlan, Stage, StageExecutor,
    StageInputs, StageOutput, StageResultStatus, TargetAgent, WorkflowInput, WorkflowMode,
    WorkflowOrchestrator, WorkflowStatus,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

const IDEA: &str = "A habit tracker app for busy professionals with streaks, reminders and weekly reports";

fn no_retry_config() -> PmConfig {
    PmConfig::builder()
        .publish(PublishConfig {
            max_retries: 0,
            ..PublishConfig::default()
        })
        .build_unchecked()
}

fn orchestrator() -> WorkflowOrchestrator {
    WorkflowOrchestrator::builder()
        .config(no_retry_config())
        .build()
        .unwrap()
}

fn full_input() -> WorkflowInput {
    WorkflowInput::new(IDEA)
        .with_sprint_planning(3, SprintLength::TwoWeeks, 3)
        .with_visual_design()
}

/// Fails every run.
struct FailingExecutor(Stage);

#[async_trait]
impl StageExecutor for FailingExecutor {
    fn stage(&self) -> Stage {
        self.0
    }

    async fn run(&self, _inputs: StageInputs) -> Result<StageOutput> {
        Err(PmError::stage(self.0, "model backend unavailable"))
    }
}

/// Produces an idea that never meets the readiness bar.
struct UnreadyIdeaExecutor;

#[async_trait]
impl StageExecutor for UnreadyIdeaExecutor {
    fn stage(&self) -> Stage {
        Stage::Idea
    }

    async fn run(&self, _inputs: StageInputs) -> Result<StageOutput> {
        let idea = RefinedIdea::new("Habit tracker", "Busy people lose track of habits");
        Ok(StageOutput::new(Artifact::Idea(idea), false))
    }
}

/// Counts its runs and returns an empty sprint plan.
struct CountingSprintExecutor(Arc<AtomicU32>);

#[async_trait]
impl StageExecutor for CountingSprintExecutor {
    fn stage(&self) -> Stage {
        Stage::SprintPlan
    }

    async fn run(&self, inputs: StageInputs) -> Result<StageOutput> {
        self.0.fetch_add(1, Ordering::SeqCst);
        let plan = SprintPlan {
            sprint_length: inputs.settings.sprint_length,
            team_size: inputs.settings.team_size,
            velocity_per_sprint: 0,
            sprints: Vec::new(),
            unscheduled: Vec::new(),
        };
        Ok(StageOutput::new(Artifact::SprintPlan(plan), true))
    }
}

#[tokio::test]
async fn test_short_idea_runs_first_three_stages_only() {
    let orchestrator = orchestrator();
    let result = orchestrator
        .run_workflow(WorkflowInput::new("habit tracker"))
        .await
        .unwrap();

    assert_eq!(result.workflow_mode, WorkflowMode::InitialRun);
    assert!(matches!(
        result.status,
        WorkflowStatus::ReadyForWireframes
            | WorkflowStatus::PrdPublished
            | WorkflowStatus::StageFailed(Stage::Prd)
            | WorkflowStatus::WaitingForInput
    ));
    assert!(
        result
            .executed_stages
            .iter()
            .all(|s| matches!(s, Stage::Idea | Stage::UserStories | Stage::Prd))
    );
    assert_eq!(result.stage(Stage::SprintPlan).unwrap().status, StageResultStatus::Skipped);
    assert_eq!(result.stage(Stage::VisualDesign).unwrap().status, StageResultStatus::Skipped);
    // two words leave the idea with clarifying questions
    assert!(result.recommendations.iter().any(|r| r.starts_with("Answer:")));
}

#[tokio::test]
async fn test_detailed_idea_reaches_prd() {
    let result = orchestrator().run_workflow(WorkflowInput::new(IDEA)).await.unwrap();

    assert_eq!(result.executed_stages, vec![Stage::Idea, Stage::UserStories, Stage::Prd]);
    assert_eq!(result.status, WorkflowStatus::ReadyForWireframes);
    assert_eq!(result.current_step, Some(Stage::Prd));
    assert_eq!(result.quality_metrics.completion_percentage, 100);
}

#[tokio::test]
async fn test_iteration_feedback_invalidates_everything_downstream() {
    let orchestrator = orchestrator();
    let first = orchestrator.run_workflow(full_input()).await.unwrap();
    assert_eq!(first.status, WorkflowStatus::Completed);
    assert_eq!(first.executed_stages, Stage::ALL.to_vec());

    let second = orchestrator
        .run_workflow(
            WorkflowInput::for_session(&first.session_id)
                .with_feedback(
                    Feedback::new(FeedbackType::IdeaRefinement, "add social sharing")
                        .with_priority(Priority::High),
                )
                .with_iteration_mode(),
        )
        .await
        .unwrap();

    assert_eq!(second.routing_decisions.len(), 1);
    assert_eq!(second.routing_decisions[0].target_agent, TargetAgent::IdeaGeneration);
    assert!(!second.routing_decisions[0].should_suspend_workflow);
    assert_eq!(second.invalidated_stages, Stage::ALL.to_vec());
    assert_eq!(second.transitions.first(), Some(&WorkflowStatus::IterationCycle));
    assert_eq!(second.executed_stages, Stage::ALL.to_vec());
    assert_eq!(second.workflow_mode, WorkflowMode::FeedbackIteration);
    assert_eq!(second.status, WorkflowStatus::Completed);

    let idea = second.stage(Stage::Idea).unwrap();
    assert_eq!(idea.run_count, 2);
    let refined = idea.artifact.as_ref().and_then(Artifact::as_idea).unwrap();
    assert!(refined.core_features.iter().any(|f| f.to_lowercase() == "social sharing"));
}

#[tokio::test]
async fn test_urgent_direction_suspends_until_approved() {
    let orchestrator = orchestrator();
    let first = orchestrator.run_workflow(WorkflowInput::new(IDEA)).await.unwrap();

    let suspended = orchestrator
        .run_workflow(WorkflowInput::for_session(&first.session_id).with_feedback(
            Feedback::new(FeedbackType::WorkflowDirection, "skip sprint planning")
                .with_priority(Priority::Urgent),
        ))
        .await
        .unwrap();

    assert!(suspended.routing_decisions[0].should_suspend_workflow);
    assert_eq!(suspended.status, WorkflowStatus::SuspendedForApproval);
    assert_eq!(suspended.pending_decisions.len(), 1);
    assert!(suspended.executed_stages.is_empty());

    // still suspended when read back
    let status = orchestrator.status(&first.session_id).await.unwrap();
    assert_eq!(status.status, WorkflowStatus::SuspendedForApproval);

    let resumed = orchestrator
        .resume(&first.session_id, Approval::approve())
        .await
        .unwrap();
    assert!(resumed.pending_decisions.is_empty());
    assert_ne!(resumed.status, WorkflowStatus::SuspendedForApproval);

    // a second resume changes nothing
    let again = orchestrator
        .resume(&first.session_id, Approval::approve())
        .await
        .unwrap();
    assert_eq!(again.status, resumed.status);
    assert!(again.executed_stages.is_empty());
}

#[tokio::test]
async fn test_rejection_discards_pending_feedback() {
    let orchestrator = orchestrator();
    let first = orchestrator.run_workflow(WorkflowInput::new(IDEA)).await.unwrap();

    orchestrator
        .run_workflow(WorkflowInput::for_session(&first.session_id).with_feedback(
            Feedback::new(FeedbackType::UserStoryModification, "scrap the stories and start over"),
        ))
        .await
        .unwrap();

    let rejected = orchestrator
        .resume(&first.session_id, Approval::reject().with_note("keep them"))
        .await
        .unwrap();

    assert!(rejected.executed_stages.is_empty());
    assert!(rejected.invalidated_stages.is_empty());
    assert!(rejected.pending_decisions.is_empty());
    assert_eq!(rejected.status, WorkflowStatus::ReadyForWireframes);
    assert_eq!(rejected.stage(Stage::UserStories).unwrap().run_count, 1);
}

#[tokio::test]
async fn test_failed_stage_never_runs_dependents() {
    let sprint_runs = Arc::new(AtomicU32::new(0));
    let orchestrator = WorkflowOrchestrator::builder()
        .config(no_retry_config())
        .executor(Arc::new(FailingExecutor(Stage::Prd)))
        .executor(Arc::new(CountingSprintExecutor(sprint_runs.clone())))
        .build()
        .unwrap();

    let result = orchestrator.run_workflow(full_input()).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::StageFailed(Stage::Prd));
    assert_eq!(result.current_step, Some(Stage::Prd));
    assert_eq!(result.executed_stages, vec![Stage::Idea, Stage::UserStories, Stage::Prd]);
    assert_eq!(sprint_runs.load(Ordering::SeqCst), 0);

    let prd = result.stage(Stage::Prd).unwrap();
    assert_eq!(prd.status, StageResultStatus::Failed);
    assert!(prd.error.as_deref().unwrap().contains("model backend unavailable"));
    assert_eq!(result.stage(Stage::UserStories).unwrap().status, StageResultStatus::Completed);

    let retried = orchestrator.retry_stage(&result.session_id, Stage::Prd).await.unwrap();
    assert_eq!(retried.status, WorkflowStatus::StageFailed(Stage::Prd));
    assert_eq!(retried.stage(Stage::Prd).unwrap().run_count, 2);
    assert_eq!(sprint_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_publish_failure_keeps_artifact() {
    let document_store = Arc::new(RecordingPublisher::failing(DOCUMENT_STORE, "HTTP 500"));
    let publishers = Publishers {
        document_store: document_store.clone(),
        issue_tracker: Arc::new(RecordingPublisher::new(ISSUE_TRACKER)),
        whiteboard: Arc::new(RecordingPublisher::new(WHITEBOARD)),
    };
    let orchestrator = WorkflowOrchestrator::builder()
        .config(no_retry_config())
        .publishers(publishers)
        .build()
        .unwrap();

    let result = orchestrator.run_workflow(full_input()).await.unwrap();

    let prd = result.stage(Stage::Prd).unwrap();
    assert_eq!(prd.status, StageResultStatus::Completed);
    assert!(prd.artifact_generated);
    assert!(!prd.published);
    assert_eq!(document_store.requests().len(), 1);

    // downstream stages still ran and published
    assert!(result.stage(Stage::SprintPlan).unwrap().published);
    assert!(result.stage(Stage::VisualDesign).unwrap().published);
    assert!(result.recommendations.iter().any(|r| r.contains(DOCUMENT_STORE)));
    assert!(
        !result
            .quality_metrics
            .integrations_used
            .contains(&DOCUMENT_STORE.to_string())
    );
}

#[tokio::test]
async fn test_prd_feedback_cascades_only_downstream() {
    let orchestrator = orchestrator();
    let first = orchestrator.run_workflow(full_input()).await.unwrap();

    let result = orchestrator
        .run_workflow(
            WorkflowInput::for_session(&first.session_id)
                .with_feedback(Feedback::new(FeedbackType::PrdRevision, "Mention offline mode")),
        )
        .await
        .unwrap();

    assert_eq!(result.workflow_mode, WorkflowMode::StepRefinement);
    assert_eq!(
        result.invalidated_stages,
        vec![Stage::Prd, Stage::SprintPlan, Stage::VisualDesign]
    );
    assert_eq!(
        result.executed_stages,
        vec![Stage::Prd, Stage::SprintPlan, Stage::VisualDesign]
    );
    assert_eq!(result.stage(Stage::Idea).unwrap().run_count, 1);
    assert_eq!(result.stage(Stage::UserStories).unwrap().run_count, 1);
}

#[tokio::test]
async fn test_retry_without_dependencies_waits_for_input() {
    let orchestrator = WorkflowOrchestrator::builder()
        .config(no_retry_config())
        .executor(Arc::new(UnreadyIdeaExecutor))
        .build()
        .unwrap();

    let first = orchestrator.run_workflow(WorkflowInput::new(IDEA)).await.unwrap();
    assert_eq!(first.executed_stages, vec![Stage::Idea]);
    assert_eq!(first.status, WorkflowStatus::WaitingForInput);

    let result = orchestrator
        .retry_stage(&first.session_id, Stage::Prd)
        .await
        .unwrap();
    assert_eq!(result.status, WorkflowStatus::WaitingForInput);
    assert!(result.executed_stages.is_empty());
    assert!(result.message.contains("user_stories"));
}

#[tokio::test]
async fn test_retry_behind_failed_stage_reports_failure() {
    let orchestrator = WorkflowOrchestrator::builder()
        .config(no_retry_config())
        .executor(Arc::new(FailingExecutor(Stage::Prd)))
        .build()
        .unwrap();

    let first = orchestrator.run_workflow(full_input()).await.unwrap();
    assert_eq!(first.status, WorkflowStatus::StageFailed(Stage::Prd));

    let retried = orchestrator
        .retry_stage(&first.session_id, Stage::SprintPlan)
        .await
        .unwrap();
    assert!(retried.executed_stages.is_empty());
    assert_eq!(retried.status, WorkflowStatus::StageFailed(Stage::Prd));
    assert!(retried.recommendations[0].contains("prd"));

    let status = orchestrator.status(&first.session_id).await.unwrap();
    assert_eq!(retried.status, status.status);
}

#[tokio::test]
async fn test_feedback_while_suspended_joins_pending_batch() {
    let orchestrator = orchestrator();
    let first = orchestrator.run_workflow(full_input()).await.unwrap();

    let suspended = orchestrator
        .run_workflow(WorkflowInput::for_session(&first.session_id).with_feedback(
            Feedback::new(FeedbackType::WorkflowDirection, "rethink the rollout")
                .with_priority(Priority::Urgent),
        ))
        .await
        .unwrap();
    assert_eq!(suspended.status, WorkflowStatus::SuspendedForApproval);

    let joined = orchestrator
        .run_workflow(
            WorkflowInput::for_session(&first.session_id)
                .with_feedback(Feedback::new(FeedbackType::PrdRevision, "Mention offline mode")),
        )
        .await
        .unwrap();

    assert!(!joined.routing_decisions[0].should_suspend_workflow);
    assert_eq!(joined.status, WorkflowStatus::SuspendedForApproval);
    assert_eq!(joined.pending_decisions.len(), 2);
    assert!(joined.executed_stages.is_empty());
    assert!(joined.invalidated_stages.is_empty());
    assert_eq!(joined.stage(Stage::Prd).unwrap().run_count, 1);
}

#[tokio::test]
async fn test_retry_rejects_suspended_session() {
    let orchestrator = orchestrator();
    let first = orchestrator.run_workflow(WorkflowInput::new(IDEA)).await.unwrap();

    orchestrator
        .run_workflow(WorkflowInput::for_session(&first.session_id).with_feedback(
            Feedback::new(FeedbackType::UserStoryModification, "start over with the stories"),
        ))
        .await
        .unwrap();

    let err = orchestrator
        .retry_stage(&first.session_id, Stage::Prd)
        .await
        .unwrap_err();
    assert!(matches!(err, PmError::InvalidInput(_)));

    let status = orchestrator.status(&first.session_id).await.unwrap();
    assert_eq!(status.status, WorkflowStatus::SuspendedForApproval);
    assert_eq!(status.pending_decisions.len(), 1);
}

#[tokio::test]
async fn test_retry_rejects_disabled_stage() {
    let orchestrator = orchestrator();
    let first = orchestrator.run_workflow(WorkflowInput::new(IDEA)).await.unwrap();

    let err = orchestrator
        .retry_stage(&first.session_id, Stage::VisualDesign)
        .await
        .unwrap_err();
    assert!(matches!(err, PmError::InvalidInput(_)));
}
