//! Product requirements document.

use super::config::ReadinessThresholds;
use super::stories::UserStoryList;
use serde::{Deserialize, Serialize};

/// One functional requirement section, tracing back to user stories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Requirement id (e.g., "FR-1")
    pub id: String,
    /// Section title
    pub title: String,
    /// Requirement text
    pub description: String,
    /// Ids of the stories this requirement covers
    #[serde(default)]
    pub story_ids: Vec<String>,
}

/// The compiled PRD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrdDocument {
    /// Product title
    pub title: String,
    /// Overview paragraph
    pub overview: String,
    /// Problem statement carried over from the idea
    pub problem_statement: String,
    /// Target users
    #[serde(default)]
    pub target_users: Vec<String>,
    /// Functional requirements
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// How success is measured
    #[serde(default)]
    pub success_metrics: Vec<String>,
    /// Explicitly excluded scope
    #[serde(default)]
    pub out_of_scope: Vec<String>,
}

impl PrdDocument {
    /// Story ids not referenced by any requirement.
    pub fn uncovered_stories(&self, stories: &UserStoryList) -> Vec<String> {
        stories
            .stories
            .iter()
            .filter(|story| {
                !self
                    .requirements
                    .iter()
                    .any(|r| r.story_ids.iter().any(|id| *id == story.id))
            })
            .map(|story| story.id.clone())
            .collect()
    }

    pub fn is_ready(&self, stories: &UserStoryList, thresholds: &ReadinessThresholds) -> bool {
        self.uncovered_stories(stories).is_empty()
            && self.success_metrics.len() >= thresholds.min_success_metrics
    }

    /// Render the document as Markdown for the document store.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("# {}\n\n", self.title));
        md.push_str("## Overview\n\n");
        md.push_str(&self.overview);
        md.push_str("\n\n");

        md.push_str("## Problem Statement\n\n");
        md.push_str(&self.problem_statement);
        md.push_str("\n\n");

        if !self.target_users.is_empty() {
            md.push_str("## Target Users\n\n");
            for user in &self.target_users {
                md.push_str(&format!("- {}\n", user));
            }
            md.push('\n');
        }

        md.push_str("## Functional Requirements\n\n");
        for req in &self.requirements {
            md.push_str(&format!("### {}: {}\n\n", req.id, req.title));
            md.push_str(&req.description);
            md.push_str("\n\n");
            if !req.story_ids.is_empty() {
                md.push_str(&format!("**Stories**: {}\n\n", req.story_ids.join(", ")));
            }
        }

        md.push_str("## Success Metrics\n\n");
        for metric in &self.success_metrics {
            md.push_str(&format!("- {}\n", metric));
        }

        if !self.out_of_scope.is_empty() {
            md.push_str("\n## Out of Scope\n\n");
            for item in &self.out_of_scope {
                md.push_str(&format!("- {}\n", item));
            }
        }

        md
    }
}
