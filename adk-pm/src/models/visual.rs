//! Visual design board.

use super::stories::UserStoryList;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Journey of a single persona through the product
    UserJourney,
    /// Stories grouped by persona and release
    StoryMap,
    /// Sprints laid out in time
    SprintTimeline,
}

/// A frame on the whiteboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub title: String,
    /// Persona for journey frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    /// Sticky notes, in reading order
    #[serde(default)]
    pub notes: Vec<String>,
}

/// The output of visual design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDesign {
    pub board_title: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

impl VisualDesign {
    /// Personas without a journey frame.
    pub fn missing_journeys(&self, stories: &UserStoryList) -> Vec<String> {
        stories
            .personas
            .iter()
            .filter(|p| {
                !self.frames.iter().any(|f| {
                    f.kind == FrameKind::UserJourney && f.persona.as_deref() == Some(p.name.as_str())
                })
            })
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn is_ready(&self, stories: &UserStoryList) -> bool {
        self.missing_journeys(stories).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stories::Persona;

    #[test]
    fn test_every_persona_needs_a_journey() {
        let stories = UserStoryList {
            personas: vec![Persona::new("Student", "learn"), Persona::new("Coach", "teach")],
            stories: Vec::new(),
        };
        let design = VisualDesign {
            board_title: "Board".to_string(),
            frames: vec![Frame {
                kind: FrameKind::UserJourney,
                title: "Student journey".to_string(),
                persona: Some("Student".to_string()),
                notes: Vec::new(),
            }],
        };
        assert_eq!(design.missing_journeys(&stories), vec!["Coach".to_string()]);
        assert!(!design.is_ready(&stories));
    }
}
