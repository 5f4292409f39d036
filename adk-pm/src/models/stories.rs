//! User stories and personas.

use super::config::ReadinessThresholds;
use serde::{Deserialize, Serialize};

/// A user persona the stories are written for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona name, e.g. "Busy professional"
    pub name: String,
    /// What the persona wants to achieve
    pub goal: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
        }
    }
}

/// A single user story with EARS-style acceptance criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStory {
    /// Story id (e.g., "US-001")
    pub id: String,
    /// Short title
    pub title: String,
    /// Persona this story serves
    pub persona: String,
    /// "As a ..., I want ..., so that ..."
    pub description: String,
    /// Acceptance criteria
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Priority (1 = highest, 5 = lowest)
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Estimate in story points
    #[serde(default)]
    pub story_points: u32,
    /// Part of the minimum viable product
    #[serde(default)]
    pub mvp: bool,
}

fn default_priority() -> u32 {
    3
}

impl UserStory {
    /// Create a story with default priority and no estimate.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        persona: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            persona: persona.into(),
            description: description.into(),
            acceptance_criteria: Vec::new(),
            priority: default_priority(),
            story_points: 0,
            mvp: false,
        }
    }

    /// Format a story id from a 1-based position.
    pub fn format_id(position: usize) -> String {
        format!("US-{:03}", position)
    }
}

/// The output of user-story generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserStoryList {
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub stories: Vec<UserStory>,
}

impl UserStoryList {
    /// Stories flagged as MVP.
    pub fn mvp_stories(&self) -> impl Iterator<Item = &UserStory> {
        self.stories.iter().filter(|s| s.mvp)
    }

    /// Look up a story by id.
    pub fn get(&self, id: &str) -> Option<&UserStory> {
        self.stories.iter().find(|s| s.id == id)
    }

    /// Total story points across all stories.
    pub fn total_points(&self) -> u32 {
        self.stories.iter().map(|s| s.story_points).sum()
    }

    pub fn is_ready(&self, thresholds: &ReadinessThresholds) -> bool {
        self.stories.len() >= thresholds.min_stories
            && self.mvp_stories().count() >= thresholds.min_mvp_stories
    }
}
