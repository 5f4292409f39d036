//! PRD Agent for compiling the product requirements document.
//!
//! The PRD Agent is the third phase of the pipeline:
//! 1. Idea Agent → refined idea
//! 2. User Story Agent → personas and stories
//! 3. **PRD Agent** → requirements document, published to the document store
//!
//! Every story is traced by exactly one functional requirement, so the
//! document is ready as soon as it has a success metric.

use super::{StageExecutor, StageInputs};
use crate::error::Result;
use crate::models::{
    Artifact, PrdDocument, RefinedIdea, Requirement, Stage, StageOutput, UserStoryList,
};
use crate::publish::{PublishRequest, Publisher, publish_with_retry};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Priority from which stories are deferred past the first release.
const DEFERRED_PRIORITY: u32 = 4;

pub struct PrdAgent {
    publisher: Arc<dyn Publisher>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for PrdAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrdAgent")
            .field("publisher", &self.publisher.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl PrdAgent {
    pub fn new(publisher: Arc<dyn Publisher>, policy: RetryPolicy) -> Self {
        Self { publisher, policy }
    }

    /// Compile the document from the idea and its stories.
    pub fn compile(&self, idea: &RefinedIdea, stories: &UserStoryList, notes: &[String]) -> PrdDocument {
        let mut requirements: Vec<Requirement> = stories
            .stories
            .iter()
            .enumerate()
            .map(|(i, story)| Requirement {
                id: format!("FR-{}", i + 1),
                title: story.title.clone(),
                description: story.description.clone(),
                story_ids: vec![story.id.clone()],
            })
            .collect();

        let mut out_of_scope: Vec<String> = stories
            .stories
            .iter()
            .filter(|s| s.priority >= DEFERRED_PRIORITY)
            .map(|s| format!("{} (deferred past the first release)", s.title))
            .collect();

        for note in notes {
            let trimmed = note.trim();
            let lowered = trimmed.to_lowercase();
            if ["no ", "without ", "remove ", "drop "]
                .iter()
                .any(|p| lowered.starts_with(p))
            {
                out_of_scope.push(trimmed.to_string());
            } else {
                requirements.push(Requirement {
                    id: format!("FR-{}", requirements.len() + 1),
                    title: "Revision request".to_string(),
                    description: trimmed.to_string(),
                    story_ids: Vec::new(),
                });
            }
        }

        let mut success_metrics: Vec<String> = idea
            .core_features
            .iter()
            .take(3)
            .map(|f| format!("At least 40% of weekly active users use {}", f.to_lowercase()))
            .collect();
        success_metrics.push("Four-week retention above 25%".to_string());

        PrdDocument {
            title: format!("{} PRD", idea.title),
            overview: idea.value_proposition.clone(),
            problem_statement: idea.problem_statement.clone(),
            target_users: idea.target_users.clone(),
            requirements,
            success_metrics,
            out_of_scope,
        }
    }
}

#[async_trait]
impl StageExecutor for PrdAgent {
    fn stage(&self) -> Stage {
        Stage::Prd
    }

    async fn run(&self, inputs: StageInputs) -> Result<StageOutput> {
        let idea = inputs.require_idea()?;
        let stories = inputs.require_stories()?;

        let prd = self.compile(idea, stories, &inputs.notes);
        let ready = prd.is_ready(stories, &inputs.thresholds);

        let request = PublishRequest {
            session_id: inputs.session_id.clone(),
            stage: Stage::Prd,
            title: prd.title.clone(),
            content_type: "text/markdown".to_string(),
            body: prd.to_markdown(),
            payload: serde_json::to_value(&prd)?,
        };
        let report = publish_with_retry(self.publisher.as_ref(), &request, &self.policy).await;

        Ok(StageOutput::new(Artifact::Prd(prd), ready).with_publish(report))
    }
}
