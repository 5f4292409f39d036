//! Refined product idea.

use super::config::ReadinessThresholds;
use serde::{Deserialize, Serialize};

/// The output of idea refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedIdea {
    /// Short product title
    pub title: String,
    /// The problem the product solves
    pub problem_statement: String,
    /// Who the product is for
    #[serde(default)]
    pub target_users: Vec<String>,
    /// Core features
    #[serde(default)]
    pub core_features: Vec<String>,
    /// One-line value proposition
    #[serde(default)]
    pub value_proposition: String,
    /// Questions the user still has to answer
    #[serde(default)]
    pub clarifying_questions: Vec<String>,
}

impl RefinedIdea {
    /// Create an idea with a title and problem statement.
    pub fn new(title: impl Into<String>, problem_statement: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            problem_statement: problem_statement.into(),
            target_users: Vec::new(),
            core_features: Vec::new(),
            value_proposition: String::new(),
            clarifying_questions: Vec::new(),
        }
    }

    /// Whether the idea carries unanswered questions.
    pub fn has_open_questions(&self) -> bool {
        !self.clarifying_questions.is_empty()
    }

    /// Whether the idea is complete enough to write stories from.
    pub fn is_ready(&self, thresholds: &ReadinessThresholds) -> bool {
        !self.problem_statement.trim().is_empty()
            && self.target_users.len() >= thresholds.min_target_users
            && self.core_features.len() >= thresholds.min_core_features
            && !self.has_open_questions()
    }

    /// Short summary used in status messages.
    pub fn summary(&self) -> String {
        format!(
            "{} ({} features, {} user groups)",
            self.title,
            self.core_features.len(),
            self.target_users.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_idea() -> RefinedIdea {
        let mut idea = RefinedIdea::new("Habit tracker", "People drop new habits after a week");
        idea.target_users = vec!["busy professionals".to_string()];
        idea.core_features = vec![
            "Daily check-ins".to_string(),
            "Streak tracking".to_string(),
            "Reminders".to_string(),
        ];
        idea
    }

    #[test]
    fn test_ready_when_thresholds_met() {
        assert!(complete_idea().is_ready(&ReadinessThresholds::default()));
    }

    #[test]
    fn test_not_ready_with_questions() {
        let mut idea = complete_idea();
        idea.clarifying_questions.push("Who pays?".to_string());
        assert!(!idea.is_ready(&ReadinessThresholds::default()));
    }

    #[test]
    fn test_not_ready_with_too_few_features() {
        let mut idea = complete_idea();
        idea.core_features.truncate(2);
        assert!(!idea.is_ready(&ReadinessThresholds::default()));
    }
}
