//! Workflow entry-point inputs and results.

use super::state::{StageState, WorkflowMode, WorkflowSession, WorkflowSettings};
use super::status::{WorkflowStatus, compute_status};
use crate::error::{PmError, Result};
use crate::models::config::{MAX_TEAM_SIZE, MAX_TOTAL_SPRINTS};
use crate::models::{
    Artifact, Feedback, FeedbackType, PublishReport, RoutingDecision, SprintLength, Stage,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input to `run_workflow`.
///
/// Settings (`raw_idea`, optional stages, team shape) are read only when a
/// new session is created; later calls on the same session carry feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    #[serde(default)]
    pub raw_idea: String,
    #[serde(default)]
    pub additional_context: Option<String>,
    #[serde(default)]
    pub enable_sprint_planning: bool,
    #[serde(default)]
    pub enable_visual_design: bool,
    #[serde(default = "default_team_size")]
    pub team_size: u32,
    #[serde(default)]
    pub sprint_length: SprintLength,
    #[serde(default = "default_total_sprints")]
    pub total_sprints: u32,
    #[serde(default)]
    pub user_feedback: Vec<Feedback>,
    #[serde(default)]
    pub iteration_mode: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_team_size() -> u32 {
    3
}

fn default_total_sprints() -> u32 {
    3
}

impl Default for WorkflowInput {
    fn default() -> Self {
        Self {
            raw_idea: String::new(),
            additional_context: None,
            enable_sprint_planning: false,
            enable_visual_design: false,
            team_size: default_team_size(),
            sprint_length: SprintLength::default(),
            total_sprints: default_total_sprints(),
            user_feedback: Vec::new(),
            iteration_mode: false,
            session_id: None,
        }
    }
}

impl WorkflowInput {
    /// Input for a brand-new session.
    pub fn new(raw_idea: impl Into<String>) -> Self {
        Self {
            raw_idea: raw_idea.into(),
            ..Default::default()
        }
    }

    /// Input continuing an existing session.
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }

    pub fn with_sprint_planning(mut self, team_size: u32, length: SprintLength, total: u32) -> Self {
        self.enable_sprint_planning = true;
        self.team_size = team_size;
        self.sprint_length = length;
        self.total_sprints = total;
        self
    }

    pub fn with_visual_design(mut self) -> Self {
        self.enable_visual_design = true;
        self
    }

    pub fn with_feedback(mut self, feedback: Feedback) -> Self {
        self.user_feedback.push(feedback);
        self
    }

    pub fn with_iteration_mode(mut self) -> Self {
        self.iteration_mode = true;
        self
    }

    /// Session settings described by this input.
    pub fn settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            raw_idea: self.raw_idea.trim().to_string(),
            additional_context: self
                .additional_context
                .as_ref()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            enable_sprint_planning: self.enable_sprint_planning,
            enable_visual_design: self.enable_visual_design,
            team_size: self.team_size,
            sprint_length: self.sprint_length,
            total_sprints: self.total_sprints,
        }
    }

    /// Check the fields used to create a session.
    pub fn validate_new_session(&self) -> Result<()> {
        if self.raw_idea.trim().is_empty() {
            return Err(PmError::InvalidInput(
                "raw_idea is required to start a new session".to_string(),
            ));
        }
        if self.enable_sprint_planning {
            if self.team_size == 0 || self.team_size > MAX_TEAM_SIZE {
                return Err(PmError::InvalidInput(format!(
                    "team_size must be between 1 and {}, got {}",
                    MAX_TEAM_SIZE, self.team_size
                )));
            }
            if self.total_sprints == 0 || self.total_sprints > MAX_TOTAL_SPRINTS {
                return Err(PmError::InvalidInput(format!(
                    "total_sprints must be between 1 and {}, got {}",
                    MAX_TOTAL_SPRINTS, self.total_sprints
                )));
            }
        }
        Ok(())
    }
}

/// Human answer to a suspension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approved: bool,
    #[serde(default)]
    pub note: Option<String>,
}

impl Approval {
    pub fn approve() -> Self {
        Self { approved: true, note: None }
    }

    pub fn reject() -> Self {
        Self { approved: false, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Per-stage line of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageResultStatus {
    /// Not generated yet
    Pending,
    /// Valid artifact
    Completed,
    /// Artifact exists but an upstream change or feedback invalidated it
    Stale,
    Failed,
    /// Disabled for this session
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub status: StageResultStatus,
    pub ready_for_next_step: bool,
    pub artifact_generated: bool,
    pub published: bool,
    pub run_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
}

/// Hints for a conversational front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConversationalContext {
    pub available_actions: Vec<String>,
    pub suggested_feedback_types: Vec<FeedbackType>,
    pub next_step_suggestions: Vec<String>,
    pub can_iterate_on: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QualityMetrics {
    /// Share of enabled stages holding a valid artifact, 0-100
    pub completion_percentage: u8,
    pub artifacts_generated: usize,
    /// Publish targets that accepted an artifact
    pub integrations_used: Vec<String>,
    pub time_elapsed_ms: u64,
}

/// What every entry point returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub session_id: String,
    pub current_step: Option<Stage>,
    pub workflow_mode: WorkflowMode,
    pub status: WorkflowStatus,
    pub message: String,
    pub recommendations: Vec<String>,
    pub stage_results: BTreeMap<Stage, StageResult>,
    /// Decisions waiting for approval
    pub pending_decisions: Vec<RoutingDecision>,
    /// Decisions produced by this call
    pub routing_decisions: Vec<RoutingDecision>,
    /// Stages invalidated by this call
    pub invalidated_stages: Vec<Stage>,
    /// Stages executed by this call, in order
    pub executed_stages: Vec<Stage>,
    /// Status at each settle point of this call; the last entry equals `status`
    pub transitions: Vec<WorkflowStatus>,
    pub conversational_context: ConversationalContext,
    pub quality_metrics: QualityMetrics,
}

/// What happened during one entry-point call.
#[derive(Debug, Clone, Default)]
pub struct CallTrace {
    pub routing_decisions: Vec<RoutingDecision>,
    pub invalidated_stages: Vec<Stage>,
    pub executed_stages: Vec<Stage>,
    pub transitions: Vec<WorkflowStatus>,
    /// A sequencing problem reported to the caller instead of an error
    pub blocked: Option<String>,
}

impl CallTrace {
    /// Record the status at a settle point.
    pub fn settle(&mut self, session: &WorkflowSession) -> WorkflowStatus {
        let status = compute_status(session);
        if self.transitions.last() != Some(&status) {
            self.transitions.push(status);
        }
        status
    }
}

impl WorkflowResult {
    /// Build the result for a session after a call.
    pub fn from_session(session: &WorkflowSession, mut trace: CallTrace, elapsed_ms: u64) -> Self {
        let mut status = trace.settle(session);
        // A refused dependency gate is reported as waiting for input, below
        // suspension and stage failures.
        if trace.blocked.is_some() && !status.is_suspended() && !status.is_failure() {
            status = WorkflowStatus::WaitingForInput;
            if trace.transitions.last() != Some(&status) {
                trace.transitions.push(status);
            }
        }
        let stage_results = stage_results(session);
        let mut recommendations = recommendations(session, status, &stage_results);
        if let Some(blocked) = trace.blocked.as_deref() {
            if status != WorkflowStatus::WaitingForInput {
                recommendations.insert(0, blocked.to_string());
            }
        }

        Self {
            session_id: session.session_id.clone(),
            current_step: current_step(session),
            workflow_mode: session.mode,
            status,
            message: message(session, status, trace.blocked.as_deref()),
            recommendations,
            pending_decisions: session
                .pending_approval
                .as_ref()
                .map(|p| p.decisions.clone())
                .unwrap_or_default(),
            routing_decisions: trace.routing_decisions,
            invalidated_stages: trace.invalidated_stages,
            executed_stages: trace.executed_stages,
            transitions: trace.transitions,
            conversational_context: conversational_context(session, status),
            quality_metrics: quality_metrics(session, &stage_results, elapsed_ms),
            stage_results,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stage_results.get(&stage)
    }
}

fn stage_results(session: &WorkflowSession) -> BTreeMap<Stage, StageResult> {
    let valid = session.valid_stages();
    Stage::ALL
        .into_iter()
        .map(|stage| {
            let record = session.record(stage);
            let artifact = session.artifact(stage);
            let status = if !session.settings.is_enabled(stage) {
                StageResultStatus::Skipped
            } else if record.state == StageState::Failed {
                StageResultStatus::Failed
            } else if valid.contains(&stage) {
                StageResultStatus::Completed
            } else if artifact.is_some() {
                StageResultStatus::Stale
            } else {
                StageResultStatus::Pending
            };

            let result = StageResult {
                status,
                ready_for_next_step: artifact.is_some_and(|a| a.ready_for_next_step),
                artifact_generated: artifact.is_some(),
                published: artifact.is_some_and(|a| a.is_published()),
                run_count: record.run_count,
                summary: artifact.map(|a| a.artifact.summary()),
                error: record.last_error.clone(),
                publish: artifact.and_then(|a| a.publish.clone()),
                artifact: artifact.map(|a| a.artifact.clone()),
            };
            (stage, result)
        })
        .collect()
}

fn current_step(session: &WorkflowSession) -> Option<Stage> {
    if let Some(failed) = session.latest_failure() {
        return Some(failed);
    }
    if let Some(pending) = &session.pending_approval {
        if let Some(first) = pending.affected_stages.first() {
            return Some(*first);
        }
    }
    let valid = session.valid_stages();
    let enabled = session.settings.enabled_stages();
    enabled
        .iter()
        .copied()
        .find(|s| !valid.contains(s))
        .or_else(|| enabled.last().copied())
}

fn open_questions(session: &WorkflowSession) -> Vec<String> {
    session
        .payload(Stage::Idea)
        .and_then(|a| a.as_idea())
        .map(|idea| idea.clarifying_questions.clone())
        .unwrap_or_default()
}

fn message(session: &WorkflowSession, status: WorkflowStatus, blocked: Option<&str>) -> String {
    match status {
        WorkflowStatus::SuspendedForApproval => {
            let count = session
                .pending_approval
                .as_ref()
                .map(|p| p.decisions.len())
                .unwrap_or(0);
            format!(
                "Waiting for approval before applying {} routing decision(s)",
                count
            )
        }
        WorkflowStatus::StageFailed(stage) => {
            let error = session
                .record(stage)
                .last_error
                .unwrap_or_else(|| "unknown error".to_string());
            format!("{} failed: {}", stage.label(), error)
        }
        WorkflowStatus::IterationCycle => format!(
            "Feedback applied; {} stage(s) still need to be regenerated",
            session.dirty_stages().len()
        ),
        WorkflowStatus::WaitingForInput => {
            if let Some(blocked) = blocked {
                return blocked.to_string();
            }
            let questions = open_questions(session);
            if !questions.is_empty() {
                return format!(
                    "The idea needs more detail: {} open question(s)",
                    questions.len()
                );
            }
            match session.last_valid_stage() {
                Some(stage) => format!(
                    "{} does not meet its readiness bar yet; feedback is needed",
                    stage.label()
                ),
                None => "Waiting for a product idea".to_string(),
            }
        }
        WorkflowStatus::ReadyForNext => {
            let last = session.last_valid_stage();
            let next = last.and_then(|s| session.next_enabled(s));
            match (last, next) {
                (Some(last), Some(next)) => {
                    format!("{} is ready; next step is {}", last.label(), next.label())
                }
                _ => "Ready for the next step".to_string(),
            }
        }
        WorkflowStatus::Completed => "All stages are complete".to_string(),
        other => {
            let summary = session
                .last_valid_stage()
                .and_then(|s| session.payload(s))
                .map(|a| a.summary())
                .unwrap_or_default();
            format!("{}: {}", completion_label(other), summary)
        }
    }
}

fn completion_label(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::IdeaRefined => "Idea refined",
        WorkflowStatus::StoriesGenerated => "User stories generated",
        WorkflowStatus::ReadyForWireframes => "PRD ready for wireframes",
        WorkflowStatus::PrdPublished => "PRD published",
        WorkflowStatus::SprintsPlanned => "Sprints planned",
        WorkflowStatus::VisualsCreated => "Visual board created",
        _ => "Done",
    }
}

fn recommendations(
    session: &WorkflowSession,
    status: WorkflowStatus,
    stage_results: &BTreeMap<Stage, StageResult>,
) -> Vec<String> {
    let mut recs = Vec::new();

    match status {
        WorkflowStatus::SuspendedForApproval => {
            if let Some(pending) = &session.pending_approval {
                recs.extend(pending.recommended_actions.iter().cloned());
            }
            recs.push("Approve to apply the feedback or reject to discard it".to_string());
        }
        WorkflowStatus::StageFailed(stage) => {
            recs.push(format!("Retry the {} stage once the cause is fixed", stage));
            if stage != Stage::Idea {
                recs.push("Give feedback on an earlier stage if its output caused the failure".to_string());
            }
        }
        WorkflowStatus::WaitingForInput => {
            for question in open_questions(session) {
                recs.push(format!("Answer: {}", question));
            }
            if recs.is_empty() {
                if let Some(stage) = session.last_valid_stage() {
                    recs.push(format!(
                        "Send {} feedback to fill the gaps in the {}",
                        FeedbackType::for_stage(stage),
                        stage.label().to_lowercase()
                    ));
                }
            }
        }
        WorkflowStatus::IterationCycle => {
            recs.push("Continue the workflow to regenerate the invalidated stages".to_string());
        }
        _ => {
            if let Some(stage) = session.last_valid_stage() {
                recs.push(format!(
                    "Review the {} and send feedback to refine it",
                    stage.label().to_lowercase()
                ));
            }
        }
    }

    if !session.settings.enable_sprint_planning && session.is_valid(Stage::Prd) {
        recs.push("Enable sprint planning to turn the stories into sprints".to_string());
    }
    if !session.settings.enable_visual_design && session.is_valid(Stage::Prd) {
        recs.push("Enable visual design to get a journey board".to_string());
    }

    for (stage, result) in stage_results {
        if let Some(report) = &result.publish {
            if !report.published {
                recs.push(format!(
                    "The {} was generated but not published to {}: {}",
                    stage.label().to_lowercase(),
                    report.target,
                    report.error_message.as_deref().unwrap_or("unknown error")
                ));
            }
        }
    }

    recs
}

fn conversational_context(session: &WorkflowSession, status: WorkflowStatus) -> ConversationalContext {
    let can_iterate_on: Vec<Stage> = Stage::ALL
        .into_iter()
        .filter(|s| session.settings.is_enabled(*s) && session.artifact(*s).is_some())
        .collect();

    let mut available_actions = Vec::new();
    match status {
        WorkflowStatus::SuspendedForApproval => {
            available_actions.push("approve".to_string());
            available_actions.push("reject".to_string());
        }
        WorkflowStatus::StageFailed(_) => {
            available_actions.push("retry_stage".to_string());
            available_actions.push("give_feedback".to_string());
        }
        WorkflowStatus::ReadyForNext | WorkflowStatus::IterationCycle => {
            available_actions.push("continue".to_string());
            available_actions.push("give_feedback".to_string());
        }
        _ => available_actions.push("give_feedback".to_string()),
    }
    if !status.is_suspended() {
        available_actions.push("iterate".to_string());
    }

    let mut suggested_feedback_types: Vec<FeedbackType> = can_iterate_on
        .iter()
        .map(|s| FeedbackType::for_stage(*s))
        .collect();
    if !open_questions(session).is_empty() || can_iterate_on.is_empty() {
        suggested_feedback_types.insert(0, FeedbackType::GeneralClarification);
    }

    let mut next_step_suggestions = Vec::new();
    if let Some(last) = session.last_valid_stage() {
        match session.next_enabled(last) {
            Some(next) => next_step_suggestions.push(format!("Generate the {}", next.label().to_lowercase())),
            None => {
                if let Some(optional) = last
                    .downstream()
                    .iter()
                    .find(|s| s.is_optional() && !session.settings.is_enabled(**s))
                {
                    next_step_suggestions.push(format!(
                        "Enable {} to continue past the {}",
                        optional.label().to_lowercase(),
                        last.label().to_lowercase()
                    ));
                }
            }
        }
    } else {
        next_step_suggestions.push("Describe the product idea in a sentence or two".to_string());
    }

    ConversationalContext {
        available_actions,
        suggested_feedback_types,
        next_step_suggestions,
        can_iterate_on,
    }
}

fn quality_metrics(
    session: &WorkflowSession,
    stage_results: &BTreeMap<Stage, StageResult>,
    elapsed_ms: u64,
) -> QualityMetrics {
    let enabled = session.settings.enabled_stages();
    let completed = enabled
        .iter()
        .filter(|s| {
            stage_results
                .get(*s)
                .is_some_and(|r| r.status == StageResultStatus::Completed)
        })
        .count();
    let completion_percentage = if enabled.is_empty() {
        0
    } else {
        ((completed * 100) as f64 / enabled.len() as f64).round() as u8
    };

    let mut integrations_used: Vec<String> = stage_results
        .values()
        .filter_map(|r| r.publish.as_ref())
        .filter(|p| p.published)
        .map(|p| p.target.clone())
        .collect();
    integrations_used.sort();
    integrations_used.dedup();

    QualityMetrics {
        completion_percentage,
        artifacts_generated: stage_results.values().filter(|r| r.artifact_generated).count(),
        integrations_used,
        time_elapsed_ms: elapsed_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RefinedIdea, StageOutput, UserStoryList};

    fn output(stage: Stage) -> StageOutput {
        let artifact = match stage {
            Stage::Idea => Artifact::Idea(RefinedIdea::new("Idea", "Problem")),
            _ => Artifact::UserStories(UserStoryList::default()),
        };
        StageOutput::new(artifact, true)
    }

    #[test]
    fn test_new_session_requires_idea() {
        assert!(WorkflowInput::default().validate_new_session().is_err());
        assert!(WorkflowInput::new("A habit tracker").validate_new_session().is_ok());
    }

    #[test]
    fn test_team_size_bounds() {
        let input = WorkflowInput::new("idea").with_sprint_planning(0, SprintLength::TwoWeeks, 3);
        assert!(input.validate_new_session().is_err());

        let input = WorkflowInput::new("idea").with_sprint_planning(
            MAX_TEAM_SIZE + 1,
            SprintLength::TwoWeeks,
            3,
        );
        assert!(input.validate_new_session().is_err());
    }

    #[test]
    fn test_input_json_defaults() {
        let input: WorkflowInput = serde_json::from_str(r#"{"raw_idea":"habit tracker"}"#).unwrap();
        assert_eq!(input.team_size, 3);
        assert_eq!(input.sprint_length, SprintLength::TwoWeeks);
        assert!(!input.iteration_mode);
    }

    #[test]
    fn test_result_reports_skipped_and_completion() {
        let mut session = WorkflowSession::new(WorkflowSettings::new("idea"));
        session.record_success(Stage::Idea, output(Stage::Idea), 3);

        let result = WorkflowResult::from_session(&session, CallTrace::default(), 12);
        assert_eq!(result.stage(Stage::SprintPlan).unwrap().status, StageResultStatus::Skipped);
        assert_eq!(result.stage(Stage::Idea).unwrap().status, StageResultStatus::Completed);
        assert_eq!(result.quality_metrics.completion_percentage, 33);
        assert_eq!(result.quality_metrics.artifacts_generated, 1);
        assert_eq!(result.current_step, Some(Stage::UserStories));
        assert_eq!(result.transitions, vec![result.status]);
        assert!(result.conversational_context.can_iterate_on.contains(&Stage::Idea));
    }

    #[test]
    fn test_blocked_message_surfaces() {
        let session = WorkflowSession::new(WorkflowSettings::new("idea"));
        let trace = CallTrace {
            blocked: Some("Stage 'prd' is missing upstream artifacts: idea".to_string()),
            ..Default::default()
        };
        let result = WorkflowResult::from_session(&session, trace, 0);
        assert_eq!(result.status, WorkflowStatus::WaitingForInput);
        assert!(result.message.contains("missing upstream"));
    }

    #[test]
    fn test_blocked_does_not_mask_failure() {
        let mut session = WorkflowSession::new(WorkflowSettings::new("idea"));
        session.record_success(Stage::Idea, output(Stage::Idea), 3);
        session.record_failure(Stage::UserStories, "model unavailable");
        let trace = CallTrace {
            blocked: Some("Stage 'prd' is missing upstream artifacts: user_stories".to_string()),
            ..Default::default()
        };
        let result = WorkflowResult::from_session(&session, trace, 0);
        assert_eq!(result.status, WorkflowStatus::StageFailed(Stage::UserStories));
        assert_eq!(result.status, compute_status(&session));
        assert_eq!(result.transitions.last(), Some(&result.status));
        assert!(result.recommendations[0].contains("missing upstream"));
    }
}
