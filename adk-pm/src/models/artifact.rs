//! Typed stage artifacts and their bookkeeping.

use super::Stage;
use super::idea::RefinedIdea;
use super::prd::PrdDocument;
use super::sprint::SprintPlan;
use super::stories::UserStoryList;
use super::visual::VisualDesign;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The payload produced by one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Artifact {
    Idea(RefinedIdea),
    UserStories(UserStoryList),
    Prd(PrdDocument),
    SprintPlan(SprintPlan),
    VisualDesign(VisualDesign),
}

impl Artifact {
    /// Stage that produces this kind of artifact.
    pub fn stage(&self) -> Stage {
        match self {
            Artifact::Idea(_) => Stage::Idea,
            Artifact::UserStories(_) => Stage::UserStories,
            Artifact::Prd(_) => Stage::Prd,
            Artifact::SprintPlan(_) => Stage::SprintPlan,
            Artifact::VisualDesign(_) => Stage::VisualDesign,
        }
    }

    pub fn as_idea(&self) -> Option<&RefinedIdea> {
        match self {
            Artifact::Idea(idea) => Some(idea),
            _ => None,
        }
    }

    pub fn as_stories(&self) -> Option<&UserStoryList> {
        match self {
            Artifact::UserStories(stories) => Some(stories),
            _ => None,
        }
    }

    pub fn as_prd(&self) -> Option<&PrdDocument> {
        match self {
            Artifact::Prd(prd) => Some(prd),
            _ => None,
        }
    }

    pub fn as_sprint_plan(&self) -> Option<&SprintPlan> {
        match self {
            Artifact::SprintPlan(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn as_visual_design(&self) -> Option<&VisualDesign> {
        match self {
            Artifact::VisualDesign(design) => Some(design),
            _ => None,
        }
    }

    /// One-line description for status messages.
    pub fn summary(&self) -> String {
        match self {
            Artifact::Idea(idea) => idea.summary(),
            Artifact::UserStories(list) => format!(
                "{} stories ({} MVP, {} points)",
                list.stories.len(),
                list.mvp_stories().count(),
                list.total_points()
            ),
            Artifact::Prd(prd) => format!(
                "PRD '{}' with {} requirement sections",
                prd.title,
                prd.requirements.len()
            ),
            Artifact::SprintPlan(plan) => format!(
                "{} sprints of {} ({} points committed)",
                plan.sprints.len(),
                plan.sprint_length,
                plan.committed_points()
            ),
            Artifact::VisualDesign(design) => {
                format!("Board '{}' with {} frames", design.board_title, design.frames.len())
            }
        }
    }
}

/// Outcome of pushing an artifact to an external system.
///
/// `artifact_generated` and `published` are independent: a failed publish
/// never un-generates the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    /// Publisher name (e.g., "document_store")
    pub target: String,
    /// Whether the artifact itself was produced
    pub artifact_generated: bool,
    /// Whether the external system accepted it
    pub published: bool,
    /// Attempts made, including the first
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PublishReport {
    /// Report for a stage whose artifact was generated but not published.
    pub fn failed(target: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            artifact_generated: true,
            published: false,
            attempts,
            external_url: None,
            external_id: None,
            error_message: Some(message.into()),
        }
    }
}

/// What a stage executor hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub artifact: Artifact,
    pub ready_for_next_step: bool,
    pub publish: Option<PublishReport>,
}

impl StageOutput {
    pub fn new(artifact: Artifact, ready_for_next_step: bool) -> Self {
        Self {
            artifact,
            ready_for_next_step,
            publish: None,
        }
    }

    /// Attach a publish report.
    pub fn with_publish(mut self, report: PublishReport) -> Self {
        self.publish = Some(report);
        self
    }
}

/// An artifact as stored on the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageArtifact {
    pub artifact: Artifact,
    pub ready_for_next_step: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishReport>,
    pub generated_at: DateTime<Utc>,
    /// Session-wide execution counter at the time this artifact was produced.
    /// A downstream artifact is only valid if its sequence is greater than
    /// every upstream sequence.
    pub sequence: u64,
}

impl StageArtifact {
    pub fn from_output(output: StageOutput, sequence: u64) -> Self {
        Self {
            artifact: output.artifact,
            ready_for_next_step: output.ready_for_next_step,
            publish: output.publish,
            generated_at: Utc::now(),
            sequence,
        }
    }

    /// Whether the artifact reached its external system.
    pub fn is_published(&self) -> bool {
        self.publish.as_ref().is_some_and(|p| p.published)
    }
}

/// A previous artifact kept after its stage re-ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRevision {
    /// The replaced artifact
    pub previous: StageArtifact,
    /// When it was replaced
    pub replaced_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_reports_its_stage() {
        let artifact = Artifact::UserStories(UserStoryList::default());
        assert_eq!(artifact.stage(), Stage::UserStories);
        assert!(artifact.as_stories().is_some());
        assert!(artifact.as_idea().is_none());
    }

    #[test]
    fn test_artifact_tagged_json() {
        let artifact = Artifact::Idea(RefinedIdea::new("Habit tracker", "Habits fade"));
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["stage"], "idea");
        assert_eq!(json["title"], "Habit tracker");
    }

    #[test]
    fn test_failed_publish_keeps_artifact_generated() {
        let report = PublishReport::failed("issue_tracker", 3, "503 Service Unavailable");
        assert!(report.artifact_generated);
        assert!(!report.published);

        let stored = StageArtifact::from_output(
            StageOutput::new(Artifact::UserStories(UserStoryList::default()), true)
                .with_publish(report),
            4,
        );
        assert!(!stored.is_published());
        assert_eq!(stored.sequence, 4);
    }
}
