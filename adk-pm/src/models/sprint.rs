//! Sprint plan.

use super::stage::SprintLength;
use super::stories::UserStoryList;
use serde::{Deserialize, Serialize};

/// One planned sprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    /// Sprint number, starting at 1
    pub number: u32,
    /// Sprint goal
    pub goal: String,
    /// Story ids scheduled in this sprint
    #[serde(default)]
    pub story_ids: Vec<String>,
    /// Points committed
    #[serde(default)]
    pub committed_points: u32,
}

/// The output of sprint planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintPlan {
    pub sprint_length: SprintLength,
    pub team_size: u32,
    /// Points the team can take per sprint
    pub velocity_per_sprint: u32,
    #[serde(default)]
    pub sprints: Vec<Sprint>,
    /// Stories that did not fit in the planned sprints
    #[serde(default)]
    pub unscheduled: Vec<String>,
}

impl SprintPlan {
    /// Whether a story is scheduled in any sprint.
    pub fn is_scheduled(&self, story_id: &str) -> bool {
        self.sprints
            .iter()
            .any(|s| s.story_ids.iter().any(|id| id == story_id))
    }

    /// Sprint number a story landed in.
    pub fn sprint_of(&self, story_id: &str) -> Option<u32> {
        self.sprints
            .iter()
            .find(|s| s.story_ids.iter().any(|id| id == story_id))
            .map(|s| s.number)
    }

    /// Ready when every MVP story is scheduled.
    pub fn is_ready(&self, stories: &UserStoryList) -> bool {
        stories.mvp_stories().all(|s| self.is_scheduled(&s.id))
    }

    /// Total committed points.
    pub fn committed_points(&self) -> u32 {
        self.sprints.iter().map(|s| s.committed_points).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stories::UserStory;

    #[test]
    fn test_ready_when_mvp_scheduled() {
        let mut mvp = UserStory::new("US-001", "Check in", "User", "...");
        mvp.mvp = true;
        let later = UserStory::new("US-002", "Export", "User", "...");
        let stories = UserStoryList {
            personas: Vec::new(),
            stories: vec![mvp, later],
        };

        let mut plan = SprintPlan {
            sprint_length: SprintLength::TwoWeeks,
            team_size: 2,
            velocity_per_sprint: 16,
            sprints: vec![Sprint {
                number: 1,
                goal: "Core loop".to_string(),
                story_ids: vec!["US-001".to_string()],
                committed_points: 5,
            }],
            unscheduled: vec!["US-002".to_string()],
        };
        assert!(plan.is_ready(&stories));
        assert_eq!(plan.sprint_of("US-001"), Some(1));
        assert_eq!(plan.sprint_of("US-002"), None);

        plan.sprints[0].story_ids.clear();
        assert!(!plan.is_ready(&stories));
    }
}
