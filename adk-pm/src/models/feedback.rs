//! User feedback and the routing decisions derived from it.

use super::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Declared kind of a feedback item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    IdeaRefinement,
    UserStoryModification,
    PrdRevision,
    SprintAdjustment,
    VisualDesignChange,
    GeneralClarification,
    WorkflowDirection,
}

impl FeedbackType {
    /// All feedback types.
    pub const ALL: [FeedbackType; 7] = [
        FeedbackType::IdeaRefinement,
        FeedbackType::UserStoryModification,
        FeedbackType::PrdRevision,
        FeedbackType::SprintAdjustment,
        FeedbackType::VisualDesignChange,
        FeedbackType::GeneralClarification,
        FeedbackType::WorkflowDirection,
    ];

    /// Agent a typed feedback item routes to, or `None` when the type needs
    /// content inspection.
    pub fn direct_target(self) -> Option<TargetAgent> {
        match self {
            FeedbackType::IdeaRefinement => Some(TargetAgent::IdeaGeneration),
            FeedbackType::UserStoryModification => Some(TargetAgent::UserStoryGenerator),
            FeedbackType::PrdRevision => Some(TargetAgent::PrdAgent),
            FeedbackType::SprintAdjustment => Some(TargetAgent::SprintPlanner),
            FeedbackType::VisualDesignChange => Some(TargetAgent::VisualDesign),
            FeedbackType::GeneralClarification | FeedbackType::WorkflowDirection => None,
        }
    }

    /// Whether routing depends on the free-text content.
    pub fn is_open_ended(self) -> bool {
        self.direct_target().is_none()
    }

    /// The feedback type a caller would use to revise a stage.
    pub fn for_stage(stage: Stage) -> FeedbackType {
        match stage {
            Stage::Idea => FeedbackType::IdeaRefinement,
            Stage::UserStories => FeedbackType::UserStoryModification,
            Stage::Prd => FeedbackType::PrdRevision,
            Stage::SprintPlan => FeedbackType::SprintAdjustment,
            Stage::VisualDesign => FeedbackType::VisualDesignChange,
        }
    }

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::IdeaRefinement => "idea_refinement",
            FeedbackType::UserStoryModification => "user_story_modification",
            FeedbackType::PrdRevision => "prd_revision",
            FeedbackType::SprintAdjustment => "sprint_adjustment",
            FeedbackType::VisualDesignChange => "visual_design_change",
            FeedbackType::GeneralClarification => "general_clarification",
            FeedbackType::WorkflowDirection => "workflow_direction",
        }
    }
}

impl std::fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        FeedbackType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown feedback type '{}'", s))
    }
}

/// Priority attached to a feedback item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("Unknown priority '{}'", other)),
        }
    }
}

/// A single piece of user feedback.
///
/// Feedback is immutable once created; sessions only ever append it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Declared feedback type
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    /// Free-text content
    pub content: String,
    /// Priority (defaults to medium)
    #[serde(default)]
    pub priority: Priority,
    /// Optional hint naming the step the feedback is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_step: Option<String>,
    /// Optional structured context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// When the feedback was given
    pub timestamp: DateTime<Utc>,
}

impl Feedback {
    /// Create a medium-priority feedback item timestamped now.
    pub fn new(feedback_type: FeedbackType, content: impl Into<String>) -> Self {
        Self {
            feedback_type,
            content: content.into(),
            priority: Priority::default(),
            target_step: None,
            context: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the target step hint.
    pub fn with_target_step(mut self, step: impl Into<String>) -> Self {
        self.target_step = Some(step.into());
        self
    }

    /// Attach structured context.
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    /// Set an explicit timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Agent a routing decision hands work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAgent {
    IdeaGeneration,
    UserStoryGenerator,
    PrdAgent,
    SprintPlanner,
    VisualDesign,
    /// No concrete stage; the orchestrator (and the human) decide.
    WorkflowOrchestrator,
}

impl TargetAgent {
    /// Stage re-run by this agent, `None` for the orchestrator.
    pub fn stage(self) -> Option<Stage> {
        match self {
            TargetAgent::IdeaGeneration => Some(Stage::Idea),
            TargetAgent::UserStoryGenerator => Some(Stage::UserStories),
            TargetAgent::PrdAgent => Some(Stage::Prd),
            TargetAgent::SprintPlanner => Some(Stage::SprintPlan),
            TargetAgent::VisualDesign => Some(Stage::VisualDesign),
            TargetAgent::WorkflowOrchestrator => None,
        }
    }

    /// Agent responsible for a stage.
    pub fn for_stage(stage: Stage) -> TargetAgent {
        match stage {
            Stage::Idea => TargetAgent::IdeaGeneration,
            Stage::UserStories => TargetAgent::UserStoryGenerator,
            Stage::Prd => TargetAgent::PrdAgent,
            Stage::SprintPlan => TargetAgent::SprintPlanner,
            Stage::VisualDesign => TargetAgent::VisualDesign,
        }
    }

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetAgent::IdeaGeneration => "idea_generation",
            TargetAgent::UserStoryGenerator => "user_story_generator",
            TargetAgent::PrdAgent => "prd_agent",
            TargetAgent::SprintPlanner => "sprint_planner",
            TargetAgent::VisualDesign => "visual_design",
            TargetAgent::WorkflowOrchestrator => "workflow_orchestrator",
        }
    }
}

impl std::fmt::Display for TargetAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single feedback item should go and what should happen there.
///
/// Exactly one decision is produced per feedback item; decisions are never
/// merged, even when several target the same agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Agent that should act
    pub target_agent: TargetAgent,
    /// Why this agent was chosen
    pub reasoning: String,
    /// What the agent is expected to do
    pub action_required: String,
    /// Context handed to the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_to_pass: Option<Map<String, Value>>,
    /// Whether the workflow must pause for human confirmation
    #[serde(default)]
    pub should_suspend_workflow: bool,
}

impl RoutingDecision {
    /// Stage this decision invalidates, if any.
    pub fn target_stage(&self) -> Option<Stage> {
        self.target_agent.stage()
    }
}
