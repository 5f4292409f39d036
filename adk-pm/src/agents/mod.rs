//! Stage agents for the product pipeline.
//!
//! Each stage of the pipeline is produced by one [`StageExecutor`]:
//! - [`IdeaAgent`] - Refines the raw idea and asks clarifying questions
//! - [`UserStoryAgent`] - Derives personas and user stories from the idea
//! - [`PrdAgent`] - Compiles the PRD and publishes it to the document store
//! - [`SprintPlannerAgent`] - Schedules stories into sprints and pushes them to the issue tracker
//! - [`VisualDesignAgent`] - Lays out journeys and a story map on the whiteboard
//!
//! Executors never see a session. They get a [`StageInputs`] built by
//! [`prepare_inputs`], which refuses to build one when a required upstream
//! stage has no valid artifact.

pub mod idea_agent;
pub mod prd_agent;
pub mod sprint_agent;
pub mod story_agent;
pub mod visual_agent;

pub use idea_agent::IdeaAgent;
pub use prd_agent::PrdAgent;
pub use sprint_agent::SprintPlannerAgent;
pub use story_agent::UserStoryAgent;
pub use visual_agent::VisualDesignAgent;

use crate::error::{PmError, Result};
use crate::models::{
    Artifact, PrdDocument, ReadinessThresholds, RefinedIdea, SprintPlan, Stage, StageOutput,
    UserStoryList,
};
use crate::publish::Publishers;
use crate::retry::RetryPolicy;
use crate::workflow::{WorkflowSession, WorkflowSettings};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Produces the artifact of one stage.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// The stage this executor produces.
    fn stage(&self) -> Stage;

    /// Upstream stages that must hold a valid artifact before `run` is called.
    /// Disabled stages are ignored.
    fn requires(&self) -> &'static [Stage] {
        self.stage().upstream()
    }

    async fn run(&self, inputs: StageInputs) -> Result<StageOutput>;
}

/// Everything a stage may read.
#[derive(Debug, Clone)]
pub struct StageInputs {
    pub session_id: String,
    pub stage: Stage,
    pub settings: WorkflowSettings,
    pub thresholds: ReadinessThresholds,
    /// Valid artifacts of enabled upstream stages
    pub upstream: BTreeMap<Stage, Artifact>,
    /// Feedback applied to this stage, oldest first
    pub notes: Vec<String>,
    /// Artifact from the previous run, if any
    pub previous: Option<Artifact>,
}

impl StageInputs {
    fn missing(&self, needed: Stage) -> PmError {
        PmError::missing_dependency(self.stage, vec![needed])
    }

    pub fn require_idea(&self) -> Result<&RefinedIdea> {
        self.upstream
            .get(&Stage::Idea)
            .and_then(Artifact::as_idea)
            .ok_or_else(|| self.missing(Stage::Idea))
    }

    pub fn require_stories(&self) -> Result<&UserStoryList> {
        self.upstream
            .get(&Stage::UserStories)
            .and_then(Artifact::as_stories)
            .ok_or_else(|| self.missing(Stage::UserStories))
    }

    pub fn require_prd(&self) -> Result<&PrdDocument> {
        self.upstream
            .get(&Stage::Prd)
            .and_then(Artifact::as_prd)
            .ok_or_else(|| self.missing(Stage::Prd))
    }

    /// Sprint plan when sprint planning is enabled and valid.
    pub fn sprint_plan(&self) -> Option<&SprintPlan> {
        self.upstream
            .get(&Stage::SprintPlan)
            .and_then(Artifact::as_sprint_plan)
    }
}

/// Build the inputs for `executor`, or fail with `MissingDependency` when a
/// required stage lacks a valid artifact.
pub fn prepare_inputs(
    session: &WorkflowSession,
    executor: &dyn StageExecutor,
    thresholds: &ReadinessThresholds,
) -> Result<StageInputs> {
    let stage = executor.stage();
    let missing = session.missing_dependencies(executor.requires());
    if !missing.is_empty() {
        return Err(PmError::missing_dependency(stage, missing));
    }

    let valid = session.valid_stages();
    let upstream = stage
        .upstream()
        .iter()
        .filter(|s| valid.contains(*s))
        .filter_map(|s| session.payload(*s).map(|a| (*s, a.clone())))
        .collect();

    Ok(StageInputs {
        session_id: session.session_id.clone(),
        stage,
        settings: session.settings.clone(),
        thresholds: thresholds.clone(),
        upstream,
        notes: session.notes(stage).to_vec(),
        previous: session.payload(stage).cloned(),
    })
}

/// Run an executor behind the dependency gate.
pub async fn execute_stage(
    session: &WorkflowSession,
    executor: &dyn StageExecutor,
    thresholds: &ReadinessThresholds,
) -> Result<StageOutput> {
    let inputs = prepare_inputs(session, executor, thresholds)?;
    let stage = executor.stage();
    let output = executor.run(inputs).await?;
    if output.artifact.stage() != stage {
        return Err(PmError::stage(
            stage,
            format!("executor produced a {} artifact", output.artifact.stage()),
        ));
    }
    Ok(output)
}

/// The five built-in agents.
pub fn default_executors(
    publishers: &Publishers,
    policy: &RetryPolicy,
) -> BTreeMap<Stage, Arc<dyn StageExecutor>> {
    let executors: [Arc<dyn StageExecutor>; 5] = [
        Arc::new(IdeaAgent::new()),
        Arc::new(UserStoryAgent::new()),
        Arc::new(PrdAgent::new(publishers.document_store.clone(), policy.clone())),
        Arc::new(SprintPlannerAgent::new(publishers.issue_tracker.clone(), policy.clone())),
        Arc::new(VisualDesignAgent::new(publishers.whiteboard.clone(), policy.clone())),
    ];
    executors.into_iter().map(|e| (e.stage(), e)).collect()
}

/// Lower-case words of a text, punctuation stripped.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// The thing a note asks to add, e.g. "add social sharing" -> "social sharing".
pub(crate) fn requested_addition(note: &str) -> Option<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)^\s*(?:please\s+)?(?:add|include|support)\s+(.+?)\s*[.!]?\s*$")?
        .captures(note)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Compile a pattern once per cell.
pub(crate) fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Uppercase the first character.
pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
