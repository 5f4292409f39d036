//! Pipeline stages and their fixed dependency order.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

static ORDER: [Stage; 5] = Stage::ALL;

/// One step of the product pipeline.
///
/// The variant order is the data-dependency order: a stage consumes the
/// artifacts of every stage declared before it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Idea refinement
    Idea,
    /// User story generation
    UserStories,
    /// PRD compilation
    Prd,
    /// Sprint planning (optional)
    SprintPlan,
    /// Visual design (optional)
    VisualDesign,
}

impl Stage {
    /// All stages in dependency order.
    pub const ALL: [Stage; 5] = [
        Stage::Idea,
        Stage::UserStories,
        Stage::Prd,
        Stage::SprintPlan,
        Stage::VisualDesign,
    ];

    /// Position of this stage in the fixed order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idea => "idea",
            Stage::UserStories => "user_stories",
            Stage::Prd => "prd",
            Stage::SprintPlan => "sprint_plan",
            Stage::VisualDesign => "visual_design",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Idea => "Idea refinement",
            Stage::UserStories => "User stories",
            Stage::Prd => "Product requirements",
            Stage::SprintPlan => "Sprint planning",
            Stage::VisualDesign => "Visual design",
        }
    }

    /// Stages strictly before this one.
    pub fn upstream(self) -> &'static [Stage] {
        &ORDER[..self.index()]
    }

    /// Stages strictly after this one.
    pub fn downstream(self) -> &'static [Stage] {
        &ORDER[self.index() + 1..]
    }

    /// This stage followed by everything downstream of it.
    pub fn with_downstream(self) -> &'static [Stage] {
        &ORDER[self.index()..]
    }

    /// The next stage in the order, if any.
    pub fn next(self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Whether the stage can be switched off by the caller.
    pub fn is_optional(self) -> bool {
        matches!(self, Stage::SprintPlan | Stage::VisualDesign)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = snake_case(s.trim()).replace(['-', ' '], "_");
        match normalized.as_str() {
            "idea" | "idea_refinement" | "idea_generation" => Ok(Stage::Idea),
            "user_stories" | "stories" | "user_story" | "user_story_generator" => {
                Ok(Stage::UserStories)
            }
            "prd" | "prd_agent" | "requirements" => Ok(Stage::Prd),
            "sprint_plan" | "sprints" | "sprint_planning" | "sprint_planner" => {
                Ok(Stage::SprintPlan)
            }
            "visual_design" | "visuals" | "visual" | "design" => Ok(Stage::VisualDesign),
            other => Err(format!("Unknown stage '{}'", other)),
        }
    }
}

/// `userStories` and `UserStories` become `user_stories`; acronyms stay whole.
fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        out.extend(c.to_lowercase());
    }
    out
}

/// Length of one sprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SprintLength {
    /// One week
    OneWeek,
    /// Two weeks
    #[default]
    TwoWeeks,
    /// Three weeks
    ThreeWeeks,
    /// Four weeks
    FourWeeks,
}

impl SprintLength {
    /// Number of working weeks in a sprint.
    pub fn weeks(self) -> u32 {
        match self {
            SprintLength::OneWeek => 1,
            SprintLength::TwoWeeks => 2,
            SprintLength::ThreeWeeks => 3,
            SprintLength::FourWeeks => 4,
        }
    }

    pub fn from_weeks(weeks: u32) -> Option<Self> {
        match weeks {
            1 => Some(SprintLength::OneWeek),
            2 => Some(SprintLength::TwoWeeks),
            3 => Some(SprintLength::ThreeWeeks),
            4 => Some(SprintLength::FourWeeks),
            _ => None,
        }
    }
}

impl std::fmt::Display for SprintLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SprintLength::OneWeek => write!(f, "1 week"),
            other => write!(f, "{} weeks", other.weeks()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Idea < Stage::UserStories);
        assert!(Stage::Prd < Stage::SprintPlan);
        assert_eq!(Stage::Prd.upstream(), &[Stage::Idea, Stage::UserStories]);
        assert_eq!(Stage::SprintPlan.downstream(), &[Stage::VisualDesign]);
        assert!(Stage::VisualDesign.downstream().is_empty());
        assert_eq!(Stage::Idea.with_downstream().len(), 5);
    }

    #[test]
    fn test_stage_parse() {
        assert_eq!("prd".parse::<Stage>().unwrap(), Stage::Prd);
        assert_eq!("sprint-planning".parse::<Stage>().unwrap(), Stage::SprintPlan);
        assert_eq!("User Stories".parse::<Stage>().unwrap(), Stage::UserStories);
        assert!("deployment".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_parse_camel_case() {
        assert_eq!("userStories".parse::<Stage>().unwrap(), Stage::UserStories);
        assert_eq!("sprintPlan".parse::<Stage>().unwrap(), Stage::SprintPlan);
        assert_eq!("visualDesign".parse::<Stage>().unwrap(), Stage::VisualDesign);
        assert_eq!("PRD".parse::<Stage>().unwrap(), Stage::Prd);
    }

    #[test]
    fn test_stage_serde_names() {
        let json = serde_json::to_string(&Stage::SprintPlan).unwrap();
        assert_eq!(json, "\"sprint_plan\"");
        assert_eq!(Stage::VisualDesign.to_string(), "visual_design");
    }

    #[test]
    fn test_sprint_length_weeks() {
        assert_eq!(SprintLength::default().weeks(), 2);
        assert_eq!(SprintLength::OneWeek.to_string(), "1 week");
        assert_eq!(SprintLength::ThreeWeeks.to_string(), "3 weeks");
    }
}
