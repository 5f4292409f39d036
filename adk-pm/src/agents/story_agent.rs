//! User story generation.

use super::{StageExecutor, StageInputs, capitalize, requested_addition, words};
use crate::error::Result;
use crate::models::{Artifact, Persona, RefinedIdea, Stage, StageOutput, UserStory, UserStoryList};
use async_trait::async_trait;

/// Features at the head of the idea that go into the MVP.
const MVP_FEATURES: usize = 3;

/// Derives personas and stories from the refined idea.
///
/// Every story carries a persona, acceptance criteria and an estimate. The
/// first features of the idea plus onboarding form the MVP.
#[derive(Debug, Clone, Default)]
pub struct UserStoryAgent;

impl UserStoryAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, idea: &RefinedIdea, notes: &[String]) -> UserStoryList {
        let personas: Vec<Persona> = if idea.target_users.is_empty() {
            vec![Persona::new("User", idea.value_proposition.clone())]
        } else {
            idea.target_users
                .iter()
                .map(|u| Persona::new(capitalize(u), format!("get value from {}", idea.title.to_lowercase())))
                .collect()
        };
        let primary = personas[0].name.clone();

        let mut stories = Vec::new();
        let mut push = |title: String, persona: String, want: String, mvp: bool, priority: u32| {
            let id = UserStory::format_id(stories.len() + 1);
            let mut story = UserStory::new(
                id,
                title.clone(),
                persona.clone(),
                format!("As a {}, I want to {} so that I can {}", persona.to_lowercase(), want, personas_goal(&personas, &persona)),
            );
            story.acceptance_criteria = acceptance_criteria(&title);
            story.story_points = estimate(&title);
            story.mvp = mvp;
            story.priority = priority;
            stories.push(story);
        };

        push(
            "Onboarding".to_string(),
            primary.clone(),
            format!("get started with {} in a few steps", idea.title.to_lowercase()),
            true,
            1,
        );

        for (i, feature) in idea.core_features.iter().enumerate() {
            let persona = personas[i % personas.len()].name.clone();
            let mvp = i < MVP_FEATURES;
            push(
                feature.clone(),
                persona,
                format!("use {}", feature.to_lowercase()),
                mvp,
                if mvp { 1 } else { 2 },
            );
        }

        for note in notes {
            if let Some(addition) = requested_addition(note) {
                push(capitalize(&addition), primary.clone(), addition.to_lowercase(), false, 2);
            }
        }

        push(
            "Account settings".to_string(),
            primary,
            "manage my profile and preferences".to_string(),
            false,
            4,
        );

        let mut list = UserStoryList { personas, stories };
        for note in notes.iter().filter(|n| requested_addition(n).is_none()) {
            if let Some(first) = list.stories.first_mut() {
                first
                    .acceptance_criteria
                    .push(format!("Addresses feedback: {}", note.trim()));
            }
        }
        list
    }
}

fn personas_goal(personas: &[Persona], name: &str) -> String {
    personas
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.goal.clone())
        .unwrap_or_else(|| "reach my goal".to_string())
}

fn acceptance_criteria(title: &str) -> Vec<String> {
    let subject = title.to_lowercase();
    vec![
        format!("WHEN the user opens {} THE system SHALL show the current state", subject),
        format!("WHEN the user completes {} THE system SHALL confirm the change", subject),
        format!("IF {} fails THEN the system SHALL explain what went wrong", subject),
    ]
}

/// Fibonacci estimate from the size of the title.
fn estimate(title: &str) -> u32 {
    match words(title).len() {
        0..=1 => 3,
        2..=3 => 5,
        _ => 8,
    }
}

#[async_trait]
impl StageExecutor for UserStoryAgent {
    fn stage(&self) -> Stage {
        Stage::UserStories
    }

    async fn run(&self, inputs: StageInputs) -> Result<StageOutput> {
        let idea = inputs.require_idea()?;
        let list = self.generate(idea, &inputs.notes);
        let ready = list.is_ready(&inputs.thresholds);
        tracing::debug!(
            stories = list.stories.len(),
            mvp = list.mvp_stories().count(),
            points = list.total_points(),
            "Generated user stories"
        );
        Ok(StageOutput::new(Artifact::UserStories(list), ready))
    }
}
