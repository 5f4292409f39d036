//! Visual design board.

use super::{StageExecutor, StageInputs};
use crate::error::Result;
use crate::models::{
    Artifact, Frame, FrameKind, SprintPlan, Stage, StageOutput, UserStoryList, VisualDesign,
};
use crate::publish::{PublishRequest, Publisher, publish_with_retry};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Builds the whiteboard: one journey per persona, a story map and, when
/// sprints were planned, a timeline.
pub struct VisualDesignAgent {
    publisher: Arc<dyn Publisher>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for VisualDesignAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualDesignAgent")
            .field("publisher", &self.publisher.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl VisualDesignAgent {
    pub fn new(publisher: Arc<dyn Publisher>, policy: RetryPolicy) -> Self {
        Self { publisher, policy }
    }

    pub fn design(
        &self,
        title: &str,
        stories: &UserStoryList,
        plan: Option<&SprintPlan>,
        notes: &[String],
    ) -> VisualDesign {
        let mut frames: Vec<Frame> = stories
            .personas
            .iter()
            .map(|persona| Frame {
                kind: FrameKind::UserJourney,
                title: format!("{} journey", persona.name),
                persona: Some(persona.name.clone()),
                notes: stories
                    .stories
                    .iter()
                    .filter(|s| s.persona == persona.name)
                    .enumerate()
                    .map(|(i, s)| format!("{}. {}", i + 1, s.title))
                    .collect(),
            })
            .collect();

        let mut map_notes: Vec<String> = stories
            .stories
            .iter()
            .map(|s| {
                let lane = if s.mvp { "MVP" } else { "Later" };
                format!("{}: {} ({})", lane, s.title, s.id)
            })
            .collect();
        map_notes.extend(notes.iter().map(|n| format!("Feedback: {}", n.trim())));
        frames.push(Frame {
            kind: FrameKind::StoryMap,
            title: "Story map".to_string(),
            persona: None,
            notes: map_notes,
        });

        if let Some(plan) = plan {
            frames.push(Frame {
                kind: FrameKind::SprintTimeline,
                title: format!("{} x {} sprints", plan.sprints.len(), plan.sprint_length),
                persona: None,
                notes: plan
                    .sprints
                    .iter()
                    .map(|s| format!("Sprint {}: {} ({} pts)", s.number, s.goal, s.committed_points))
                    .collect(),
            });
        }

        VisualDesign {
            board_title: format!("{} board", title),
            frames,
        }
    }
}

#[async_trait]
impl StageExecutor for VisualDesignAgent {
    fn stage(&self) -> Stage {
        Stage::VisualDesign
    }

    async fn run(&self, inputs: StageInputs) -> Result<StageOutput> {
        let idea = inputs.require_idea()?;
        let stories = inputs.require_stories()?;

        let design = self.design(&idea.title, stories, inputs.sprint_plan(), &inputs.notes);
        let ready = design.is_ready(stories);

        let request = PublishRequest {
            session_id: inputs.session_id.clone(),
            stage: Stage::VisualDesign,
            title: design.board_title.clone(),
            content_type: "application/json".to_string(),
            body: serde_json::to_string_pretty(&design)?,
            payload: serde_json::to_value(&design)?,
        };
        let report = publish_with_retry(self.publisher.as_ref(), &request, &self.policy).await;

        Ok(StageOutput::new(Artifact::VisualDesign(design), ready).with_publish(report))
    }
}
