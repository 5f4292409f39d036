//! Property tests for feedback classification and invalidation.

use adk_pm::workflow::WorkflowSnapshot;
use adk_pm::{
    Feedback, FeedbackClassifier, FeedbackType, Priority, RuleBasedClassifier, Stage,
    TargetAgent, WorkflowMode, WorkflowSession, WorkflowSettings,
};
use proptest::prelude::*;

fn arb_feedback_type() -> impl Strategy<Value = FeedbackType> {
    prop::sample::select(FeedbackType::ALL.to_vec())
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
        Just(Priority::Urgent),
    ]
}

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop::sample::select(Stage::ALL.to_vec())
}

/// Free text mixing stage keywords, destructive phrases and noise.
fn arb_content() -> impl Strategy<Value = String> {
    let fragments = prop::sample::select(vec![
        "add social sharing",
        "the sprint is too long",
        "more user stories please",
        "update the PRD",
        "wireframe looks off",
        "let's start over",
        "skip the visuals",
        "feature list is short",
        "looks good",
        "hmm",
    ]);
    prop::collection::vec(fragments, 0..4).prop_map(|parts| parts.join(" and "))
}

fn arb_feedback() -> impl Strategy<Value = Feedback> {
    (
        arb_feedback_type(),
        arb_content(),
        arb_priority(),
        prop::option::of(arb_stage()),
    )
        .prop_map(|(feedback_type, content, priority, step)| {
            let mut feedback = Feedback::new(feedback_type, content).with_priority(priority);
            if let Some(step) = step {
                feedback = feedback.with_target_step(step.as_str());
            }
            feedback
        })
}

fn arb_settings() -> impl Strategy<Value = WorkflowSettings> {
    (any::<bool>(), any::<bool>()).prop_map(|(sprints, visuals)| {
        let mut settings = WorkflowSettings::new("A habit tracker app for busy professionals");
        settings.enable_sprint_planning = sprints;
        settings.enable_visual_design = visuals;
        settings
    })
}

fn arb_stage_set() -> impl Strategy<Value = Vec<Stage>> {
    prop::sample::subsequence(Stage::ALL.to_vec(), 0..=Stage::ALL.len())
}

/// Snapshots with any mode and any mix of generated, completed and enabled stages.
fn arb_snapshot() -> impl Strategy<Value = WorkflowSnapshot> {
    (
        prop_oneof![
            Just(WorkflowMode::InitialRun),
            Just(WorkflowMode::StepRefinement),
            Just(WorkflowMode::FeedbackIteration),
        ],
        arb_stage_set(),
        arb_stage_set(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(mode, generated, completed, sprints, visuals, pending)| {
            let enabled: Vec<Stage> = Stage::ALL
                .into_iter()
                .filter(|s| match s {
                    Stage::SprintPlan => sprints,
                    Stage::VisualDesign => visuals,
                    _ => true,
                })
                .collect();
            let completed: Vec<Stage> = completed
                .into_iter()
                .filter(|s| generated.contains(s))
                .collect();
            WorkflowSnapshot {
                session_id: "session-under-test".to_string(),
                mode,
                current_step: completed.last().copied(),
                completed_stages: completed,
                generated_stages: generated,
                enabled_stages: enabled,
                has_pending_approval: pending,
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The same feedback against the same snapshot always yields the same decision.
    #[test]
    fn prop_classification_is_deterministic(feedback in arb_feedback(), snapshot in arb_snapshot()) {
        let classifier = RuleBasedClassifier::new();

        let first = classifier.classify(&feedback, &snapshot);
        let second = classifier.classify(&feedback, &snapshot.clone());
        prop_assert_eq!(first, second);
    }

    /// Every decision has a target, a reason and an action.
    #[test]
    fn prop_classification_is_total(feedback in arb_feedback(), snapshot in arb_snapshot()) {
        let decision = RuleBasedClassifier::new().classify(&feedback, &snapshot);

        prop_assert!(!decision.reasoning.is_empty());
        prop_assert!(!decision.action_required.is_empty());
        let context = decision.context_to_pass.as_ref().unwrap();
        prop_assert_eq!(&context["workflow_mode"], &serde_json::json!(snapshot.mode));
        if let Some(stage) = decision.target_agent.stage() {
            prop_assert_eq!(
                &context["has_existing_artifact"],
                &serde_json::json!(snapshot.generated_stages.contains(&stage))
            );
            prop_assert_eq!(
                &context["stage_enabled"],
                &serde_json::json!(snapshot.enabled_stages.contains(&stage))
            );
        }
    }

    /// The snapshot never changes where feedback goes.
    #[test]
    fn prop_routing_ignores_snapshot(feedback in arb_feedback(), snapshot in arb_snapshot()) {
        let classifier = RuleBasedClassifier::new();
        let with_snapshot = classifier.classify(&feedback, &snapshot);
        let bare = classifier.classify(&feedback, &WorkflowSnapshot::default());

        prop_assert_eq!(with_snapshot.target_agent, bare.target_agent);
        prop_assert_eq!(with_snapshot.should_suspend_workflow, bare.should_suspend_workflow);
    }

    /// Typed feedback goes to the agent its type names, whatever the content says.
    #[test]
    fn prop_typed_feedback_routes_by_type(feedback in arb_feedback()) {
        let decision = RuleBasedClassifier::new().classify(&feedback, &WorkflowSnapshot::default());

        if let Some(target) = feedback.feedback_type.direct_target() {
            prop_assert_eq!(decision.target_agent, target);
        }
    }

    /// Urgent, open-ended and orchestrator-bound feedback always needs approval.
    #[test]
    fn prop_suspension_triggers(feedback in arb_feedback()) {
        let decision = RuleBasedClassifier::new().classify(&feedback, &WorkflowSnapshot::default());

        if feedback.priority == Priority::Urgent || feedback.feedback_type.is_open_ended() {
            prop_assert!(decision.should_suspend_workflow);
        }
        if decision.target_agent == TargetAgent::WorkflowOrchestrator {
            prop_assert!(decision.should_suspend_workflow);
        }
    }

    /// Invalidating a stage touches exactly the enabled stages at or after it.
    #[test]
    fn prop_invalidation_cascades_downstream(settings in arb_settings(), stage in arb_stage()) {
        let mut session = WorkflowSession::new(settings.clone());
        let touched = session.invalidate_from(stage);

        let expected: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(|s| *s >= stage && settings.is_enabled(*s))
            .collect();
        prop_assert_eq!(&touched, &expected);

        for s in Stage::ALL {
            prop_assert_eq!(session.is_dirty(s), expected.contains(&s));
        }
    }
}
