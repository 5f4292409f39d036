//! Session state and stage bookkeeping.
//!
//! A `WorkflowSession` is the only persisted mutable state. It never stores a
//! status; `status::compute_status` derives one from the fields here.

use crate::models::{
    Artifact, ArtifactRevision, Feedback, RoutingDecision, SprintLength, Stage, StageArtifact,
    StageOutput,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How the session is currently being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    /// First pass through the pipeline
    #[default]
    InitialRun,
    /// Caller is iterating on the whole product
    FeedbackIteration,
    /// Caller is refining a single step
    StepRefinement,
}

impl std::fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowMode::InitialRun => write!(f, "initial_run"),
            WorkflowMode::FeedbackIteration => write!(f, "feedback_iteration"),
            WorkflowMode::StepRefinement => write!(f, "step_refinement"),
        }
    }
}

/// Outcome of the most recent execution of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// Per-stage bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StageRecord {
    #[serde(default)]
    pub state: StageState,
    /// Set when a routing decision (or cascade) invalidated the artifact
    #[serde(default)]
    pub dirty: bool,
    #[serde(default)]
    pub run_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Settings fixed when the session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub raw_idea: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
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
}

fn default_team_size() -> u32 {
    3
}

fn default_total_sprints() -> u32 {
    3
}

impl WorkflowSettings {
    pub fn new(raw_idea: impl Into<String>) -> Self {
        Self {
            raw_idea: raw_idea.into(),
            additional_context: None,
            enable_sprint_planning: false,
            enable_visual_design: false,
            team_size: default_team_size(),
            sprint_length: SprintLength::default(),
            total_sprints: default_total_sprints(),
        }
    }

    /// Whether a stage takes part in this session. Disabled stages count as
    /// skipped.
    pub fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::SprintPlan => self.enable_sprint_planning,
            Stage::VisualDesign => self.enable_visual_design,
            _ => true,
        }
    }

    /// Enabled stages in dependency order.
    pub fn enabled_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| self.is_enabled(*s))
            .collect()
    }
}

/// Decisions held back until a human approves or rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub decisions: Vec<RoutingDecision>,
    /// Feedback content paired with each decision, in the same order
    pub feedback: Vec<Feedback>,
    pub recommended_actions: Vec<String>,
    /// Stages an approval would invalidate
    pub affected_stages: Vec<Stage>,
    pub requested_at: DateTime<Utc>,
}

/// Accumulated state of one product session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settings: WorkflowSettings,
    #[serde(default)]
    pub mode: WorkflowMode,
    #[serde(default)]
    pub stage_artifacts: BTreeMap<Stage, StageArtifact>,
    #[serde(default)]
    pub stage_records: BTreeMap<Stage, StageRecord>,
    /// Overwritten artifacts, oldest first
    #[serde(default)]
    pub revisions: BTreeMap<Stage, Vec<ArtifactRevision>>,
    /// Append-only
    #[serde(default)]
    pub feedback_history: Vec<Feedback>,
    /// Append-only, one entry per feedback item
    #[serde(default)]
    pub routing_history: Vec<RoutingDecision>,
    /// Applied feedback per stage, handed to the stage on every run
    #[serde(default)]
    pub stage_notes: BTreeMap<Stage, Vec<String>>,
    /// Decisions produced by the most recent call
    #[serde(default)]
    pub latest_decisions: Vec<RoutingDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_approval: Option<PendingApproval>,
    /// Monotonic execution counter
    #[serde(default)]
    pub sequence: u64,
}

impl WorkflowSession {
    /// Create a fresh session with a new v4 id.
    pub fn new(settings: WorkflowSettings) -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            settings,
            mode: WorkflowMode::InitialRun,
            stage_artifacts: BTreeMap::new(),
            stage_records: BTreeMap::new(),
            revisions: BTreeMap::new(),
            feedback_history: Vec::new(),
            routing_history: Vec::new(),
            stage_notes: BTreeMap::new(),
            latest_decisions: Vec::new(),
            pending_approval: None,
            sequence: 0,
        }
    }

    /// Update the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn record(&self, stage: Stage) -> StageRecord {
        self.stage_records.get(&stage).cloned().unwrap_or_default()
    }

    fn record_mut(&mut self, stage: Stage) -> &mut StageRecord {
        self.stage_records.entry(stage).or_default()
    }

    pub fn artifact(&self, stage: Stage) -> Option<&StageArtifact> {
        self.stage_artifacts.get(&stage)
    }

    pub fn is_dirty(&self, stage: Stage) -> bool {
        self.stage_records.get(&stage).is_some_and(|r| r.dirty)
    }

    /// Enabled stages currently marked dirty.
    pub fn dirty_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| self.settings.is_enabled(*s) && self.is_dirty(*s))
            .collect()
    }

    /// Stages whose artifact can be trusted.
    ///
    /// A stage is valid when its artifact exists, it is not dirty and every
    /// enabled upstream stage is valid and was produced before it.
    pub fn valid_stages(&self) -> BTreeSet<Stage> {
        let mut valid = BTreeSet::new();
        for stage in Stage::ALL {
            if !self.settings.is_enabled(stage) {
                continue;
            }
            let Some(artifact) = self.stage_artifacts.get(&stage) else {
                continue;
            };
            if self.is_dirty(stage) {
                continue;
            }
            let upstream_ok = stage
                .upstream()
                .iter()
                .filter(|up| self.settings.is_enabled(**up))
                .all(|up| {
                    valid.contains(up)
                        && self
                            .stage_artifacts
                            .get(up)
                            .is_some_and(|a| a.sequence < artifact.sequence)
                });
            if upstream_ok {
                valid.insert(stage);
            }
        }
        valid
    }

    pub fn is_valid(&self, stage: Stage) -> bool {
        self.valid_stages().contains(&stage)
    }

    /// Enabled stages among `required` that lack a valid artifact.
    pub fn missing_dependencies(&self, required: &[Stage]) -> Vec<Stage> {
        let valid = self.valid_stages();
        required
            .iter()
            .copied()
            .filter(|s| self.settings.is_enabled(*s) && !valid.contains(s))
            .collect()
    }

    /// Mark a stage and everything downstream of it dirty.
    ///
    /// Returns the stages that were touched.
    pub fn invalidate_from(&mut self, stage: Stage) -> Vec<Stage> {
        let mut touched = Vec::new();
        for s in stage.with_downstream() {
            if !self.settings.is_enabled(*s) {
                continue;
            }
            self.record_mut(*s).dirty = true;
            touched.push(*s);
        }
        touched
    }

    /// Store a successful stage output, keeping the previous artifact as a
    /// revision.
    pub fn record_success(&mut self, stage: Stage, output: StageOutput, max_revisions: usize) {
        self.sequence += 1;
        let stored = StageArtifact::from_output(output, self.sequence);
        if let Some(previous) = self.stage_artifacts.insert(stage, stored) {
            if max_revisions > 0 {
                let history = self.revisions.entry(stage).or_default();
                history.push(ArtifactRevision {
                    previous,
                    replaced_at: Utc::now(),
                });
                if history.len() > max_revisions {
                    let excess = history.len() - max_revisions;
                    history.drain(..excess);
                }
            }
        }

        let record = self.record_mut(stage);
        record.state = StageState::Completed;
        record.dirty = false;
        record.run_count += 1;
        record.last_error = None;
        record.last_run_at = Some(Utc::now());
        self.touch();
    }

    /// Mark a stage failed. The artifact map is left untouched; downstream
    /// failures are cleared since they can no longer be the latest cause.
    pub fn record_failure(&mut self, stage: Stage, error: impl Into<String>) {
        let record = self.record_mut(stage);
        record.state = StageState::Failed;
        record.run_count += 1;
        record.last_error = Some(error.into());
        record.last_run_at = Some(Utc::now());

        for down in stage.downstream() {
            if let Some(record) = self.stage_records.get_mut(down) {
                if record.state == StageState::Failed {
                    record.state = StageState::Pending;
                }
            }
        }
        self.touch();
    }

    /// Most downstream failed stage.
    pub fn latest_failure(&self) -> Option<Stage> {
        Stage::ALL.into_iter().rev().find(|s| {
            self.settings.is_enabled(*s)
                && self
                    .stage_records
                    .get(s)
                    .is_some_and(|r| r.state == StageState::Failed)
        })
    }

    /// Last stage of the contiguous valid prefix of enabled stages.
    pub fn last_valid_stage(&self) -> Option<Stage> {
        let valid = self.valid_stages();
        let mut last = None;
        for stage in self.settings.enabled_stages() {
            if valid.contains(&stage) {
                last = Some(stage);
            } else {
                break;
            }
        }
        last
    }

    /// Next enabled stage after `stage`.
    pub fn next_enabled(&self, stage: Stage) -> Option<Stage> {
        stage
            .downstream()
            .iter()
            .copied()
            .find(|s| self.settings.is_enabled(*s))
    }

    /// Append applied feedback to the notes of a stage.
    pub fn add_note(&mut self, stage: Stage, note: impl Into<String>) {
        self.stage_notes.entry(stage).or_default().push(note.into());
    }

    pub fn notes(&self, stage: Stage) -> &[String] {
        self.stage_notes
            .get(&stage)
            .map(|n| n.as_slice())
            .unwrap_or(&[])
    }

    /// Typed artifact of a stage, valid or not.
    pub fn payload(&self, stage: Stage) -> Option<&Artifact> {
        self.stage_artifacts.get(&stage).map(|a| &a.artifact)
    }

    /// Read-only view for the classifier.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        let valid = self.valid_stages();
        WorkflowSnapshot {
            session_id: self.session_id.clone(),
            mode: self.mode,
            completed_stages: valid.iter().copied().collect(),
            generated_stages: self.stage_artifacts.keys().copied().collect(),
            enabled_stages: self.settings.enabled_stages(),
            current_step: self.last_valid_stage(),
            has_pending_approval: self.pending_approval.is_some(),
        }
    }
}

/// What the classifier is allowed to see of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkflowSnapshot {
    pub session_id: String,
    pub mode: WorkflowMode,
    /// Stages with a valid artifact
    pub completed_stages: Vec<Stage>,
    /// Stages with any artifact, valid or stale
    pub generated_stages: Vec<Stage>,
    pub enabled_stages: Vec<Stage>,
    pub current_step: Option<Stage>,
    pub has_pending_approval: bool,
}

impl WorkflowSnapshot {
    pub fn has_artifact(&self, stage: Stage) -> bool {
        self.generated_stages.contains(&stage)
    }
}
