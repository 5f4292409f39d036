//! Feedback classification and routing.
//!
//! A classifier turns one feedback item plus a read-only snapshot of the
//! session into exactly one [`RoutingDecision`]. Classification is pure: the
//! same inputs always give the same decision, and nothing is written to the
//! session here.
//!
//! ## Rules
//!
//! 1. Typed feedback (`idea_refinement`, `prd_revision`, ...) routes straight
//!    to the stage named by its type; content is not inspected.
//! 2. `general_clarification` and `workflow_direction` route by the
//!    `target_step` hint when it names a stage, otherwise by the first
//!    matching keyword group in pipeline order.
//! 3. Anything left over goes to `workflow_orchestrator` with suspension
//!    forced.
//!
//! The workflow suspends for urgent feedback, for open-ended feedback types
//! and whenever the content contains a destructive signal such as
//! "start over" or "skip".

use crate::models::{Feedback, Priority, RoutingDecision, Stage, TargetAgent};
use crate::workflow::WorkflowSnapshot;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::OnceLock;

/// Turns feedback into routing decisions.
///
/// Implementations must be deterministic and side-effect free.
pub trait FeedbackClassifier: Send + Sync {
    /// Classifier name for logging.
    fn name(&self) -> &str;

    /// Classify a single feedback item.
    fn classify(&self, feedback: &Feedback, snapshot: &WorkflowSnapshot) -> RoutingDecision;
}

struct KeywordRule {
    target: TargetAgent,
    pattern: Regex,
}

fn keyword_rules() -> &'static [KeywordRule] {
    static RULES: OnceLock<Vec<KeywordRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (TargetAgent::IdeaGeneration, r"(?i)\b(features?|ideas?)\b"),
            (TargetAgent::UserStoryGenerator, r"(?i)\b(stor(y|ies)|users?)\b"),
            (TargetAgent::PrdAgent, r"(?i)\b(prds?|requirements?|documents?)\b"),
            (TargetAgent::SprintPlanner, r"(?i)\b(sprints?|backlogs?|estimates?)\b"),
            (TargetAgent::VisualDesign, r"(?i)\b(visuals?|designs?|wireframes?|boards?)\b"),
        ]
        .into_iter()
        .filter_map(|(target, pattern)| {
            Regex::new(pattern)
                .ok()
                .map(|pattern| KeywordRule { target, pattern })
        })
        .collect()
    })
}

fn destructive_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(start(ing)?\s+over|completely\s+different|skip(ping|ped)?|scrap|from\s+scratch|throw\s+(it\s+)?away)\b",
            )
            .ok()
        })
        .as_ref()
}

/// Whether the content asks to discard or bypass work.
pub fn has_destructive_signal(content: &str) -> bool {
    destructive_pattern().is_some_and(|p| p.is_match(content))
}

/// First keyword group matching the content, in pipeline order.
pub fn keyword_target(content: &str) -> Option<TargetAgent> {
    keyword_rules()
        .iter()
        .find(|rule| rule.pattern.is_match(content))
        .map(|rule| rule.target)
}

fn action_for(target: TargetAgent) -> &'static str {
    match target {
        TargetAgent::IdeaGeneration => "Refine the product idea with the feedback",
        TargetAgent::UserStoryGenerator => "Regenerate the user stories with the feedback",
        TargetAgent::PrdAgent => "Revise the PRD with the feedback",
        TargetAgent::SprintPlanner => "Re-plan the sprints with the feedback",
        TargetAgent::VisualDesign => "Rework the visual board with the feedback",
        TargetAgent::WorkflowOrchestrator => {
            "Confirm with the user which step the feedback applies to"
        }
    }
}

/// Deterministic keyword-and-type classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    fn route(&self, feedback: &Feedback) -> (TargetAgent, String) {
        if let Some(target) = feedback.feedback_type.direct_target() {
            return (
                target,
                format!("Feedback type '{}' maps to {}", feedback.feedback_type, target),
            );
        }

        if let Some(stage) = feedback
            .target_step
            .as_deref()
            .and_then(|step| step.parse::<Stage>().ok())
        {
            let target = TargetAgent::for_stage(stage);
            return (
                target,
                format!("Feedback names step '{}' explicitly", stage),
            );
        }

        if let Some(target) = keyword_target(&feedback.content) {
            return (
                target,
                format!("Feedback content mentions {} topics", target),
            );
        }

        (
            TargetAgent::WorkflowOrchestrator,
            "Feedback does not clearly relate to any step".to_string(),
        )
    }

    fn context(
        &self,
        feedback: &Feedback,
        target: TargetAgent,
        destructive: bool,
        snapshot: &WorkflowSnapshot,
    ) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("feedback".into(), json!(feedback.content));
        context.insert("feedback_type".into(), json!(feedback.feedback_type));
        context.insert("priority".into(), json!(feedback.priority));
        context.insert("destructive".into(), json!(destructive));
        context.insert("workflow_mode".into(), json!(snapshot.mode));
        if let Some(stage) = target.stage() {
            context.insert("stage".into(), json!(stage));
            context.insert(
                "has_existing_artifact".into(),
                json!(snapshot.has_artifact(stage)),
            );
            context.insert(
                "stage_enabled".into(),
                json!(snapshot.enabled_stages.contains(&stage)),
            );
        }
        if let Some(step) = &feedback.target_step {
            context.insert("target_step".into(), json!(step));
        }
        if let Some(user_context) = &feedback.context {
            context.insert("user_context".into(), Value::Object(user_context.clone()));
        }
        context
    }
}

impl FeedbackClassifier for RuleBasedClassifier {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn classify(&self, feedback: &Feedback, snapshot: &WorkflowSnapshot) -> RoutingDecision {
        let (target_agent, mut reasoning) = self.route(feedback);
        let destructive = has_destructive_signal(&feedback.content);

        let mut suspend_reasons = Vec::new();
        if feedback.priority == Priority::Urgent {
            suspend_reasons.push("urgent priority");
        }
        if feedback.feedback_type.is_open_ended() {
            suspend_reasons.push("open-ended feedback type");
        }
        if destructive {
            suspend_reasons.push("destructive request");
        }
        if target_agent == TargetAgent::WorkflowOrchestrator {
            suspend_reasons.push("ambiguous target");
        }
        let should_suspend_workflow = !suspend_reasons.is_empty();
        if should_suspend_workflow {
            reasoning.push_str(&format!("; approval needed ({})", suspend_reasons.join(", ")));
        }

        let context = self.context(feedback, target_agent, destructive, snapshot);

        let mut action_required = action_for(target_agent).to_string();
        if destructive {
            if let Some(stage) = target_agent.stage() {
                action_required.push_str(&format!(
                    "; approving re-runs {} and every later stage, rejecting keeps the current artifacts",
                    stage
                ));
            }
        }

        RoutingDecision {
            target_agent,
            reasoning,
            action_required,
            context_to_pass: Some(context),
            should_suspend_workflow,
        }
    }
}
