//! Sprint planning.

use super::{StageExecutor, StageInputs, cached};
use crate::error::Result;
use crate::models::{Artifact, Sprint, SprintPlan, Stage, StageOutput, UserStory, UserStoryList};
use crate::publish::{PublishRequest, Publisher, publish_with_retry};
use crate::retry::RetryPolicy;
use crate::workflow::WorkflowSettings;
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

/// Story points one person delivers per week.
const POINTS_PER_PERSON_WEEK: u32 = 4;

fn deferral_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)\b(?:defer|postpone|later|drop)\b")
}

fn story_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)\bUS-\d{3}\b")
}

/// Schedules stories into fixed-capacity sprints and pushes the plan to the
/// issue tracker.
pub struct SprintPlannerAgent {
    publisher: Arc<dyn Publisher>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for SprintPlannerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SprintPlannerAgent")
            .field("publisher", &self.publisher.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl SprintPlannerAgent {
    pub fn new(publisher: Arc<dyn Publisher>, policy: RetryPolicy) -> Self {
        Self { publisher, policy }
    }

    /// Points the team can commit to in one sprint.
    pub fn velocity(settings: &WorkflowSettings) -> u32 {
        settings.team_size * POINTS_PER_PERSON_WEEK * settings.sprint_length.weeks()
    }

    /// First-fit by (priority, id). Stories that fit no sprint, or that a
    /// note defers, stay unscheduled.
    pub fn plan(&self, settings: &WorkflowSettings, stories: &UserStoryList, notes: &[String]) -> SprintPlan {
        let velocity = Self::velocity(settings);

        let deferred: BTreeSet<String> = notes
            .iter()
            .filter(|n| deferral_regex().is_some_and(|re| re.is_match(n)))
            .flat_map(|n| {
                story_id_regex()
                    .into_iter()
                    .flat_map(|re| re.find_iter(n))
                    .map(|m| m.as_str().to_uppercase())
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut ordered: Vec<&UserStory> = stories.stories.iter().collect();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        let mut sprints: Vec<Sprint> = (1..=settings.total_sprints)
            .map(|number| Sprint {
                number,
                goal: String::new(),
                story_ids: Vec::new(),
                committed_points: 0,
            })
            .collect();
        let mut unscheduled = Vec::new();

        for story in ordered {
            if deferred.contains(&story.id) {
                unscheduled.push(story.id.clone());
                continue;
            }
            let slot = sprints
                .iter_mut()
                .find(|s| s.committed_points + story.story_points <= velocity);
            match slot {
                Some(sprint) => {
                    sprint.committed_points += story.story_points;
                    sprint.story_ids.push(story.id.clone());
                }
                None => unscheduled.push(story.id.clone()),
            }
        }

        for sprint in &mut sprints {
            let titles: Vec<&str> = sprint
                .story_ids
                .iter()
                .filter_map(|id| stories.get(id))
                .map(|s| s.title.as_str())
                .take(3)
                .collect();
            sprint.goal = if titles.is_empty() {
                "Buffer and hardening".to_string()
            } else {
                format!("Deliver {}", titles.join(", "))
            };
        }

        SprintPlan {
            sprint_length: settings.sprint_length,
            team_size: settings.team_size,
            velocity_per_sprint: velocity,
            sprints,
            unscheduled,
        }
    }
}

#[async_trait]
impl StageExecutor for SprintPlannerAgent {
    fn stage(&self) -> Stage {
        Stage::SprintPlan
    }

    async fn run(&self, inputs: StageInputs) -> Result<StageOutput> {
        let stories = inputs.require_stories()?;
        let prd = inputs.require_prd()?;

        let plan = self.plan(&inputs.settings, stories, &inputs.notes);
        let ready = plan.is_ready(stories);
        if !plan.unscheduled.is_empty() {
            tracing::warn!(
                unscheduled = plan.unscheduled.len(),
                velocity = plan.velocity_per_sprint,
                "Some stories did not fit the sprint plan"
            );
        }

        let request = PublishRequest {
            session_id: inputs.session_id.clone(),
            stage: Stage::SprintPlan,
            title: format!("{} sprint plan", prd.title),
            content_type: "application/json".to_string(),
            body: serde_json::to_string_pretty(&plan)?,
            payload: serde_json::to_value(&plan)?,
        };
        let report = publish_with_retry(self.publisher.as_ref(), &request, &self.policy).await;

        Ok(StageOutput::new(Artifact::SprintPlan(plan), ready).with_publish(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SprintLength;
    use crate::publish::{ISSUE_TRACKER, RecordingPublisher};

    fn stories(points: &[(u32, u32, bool)]) -> UserStoryList {
        UserStoryList {
            personas: Vec::new(),
            stories: points
                .iter()
                .enumerate()
                .map(|(i, (priority, story_points, mvp))| {
                    let mut story =
                        UserStory::new(UserStory::format_id(i + 1), format!("Story {}", i + 1), "User", "");
                    story.priority = *priority;
                    story.story_points = *story_points;
                    story.mvp = *mvp;
                    story
                })
                .collect(),
        }
    }

    fn settings(team: u32, length: SprintLength, total: u32) -> WorkflowSettings {
        let mut settings = WorkflowSettings::new("idea");
        settings.enable_sprint_planning = true;
        settings.team_size = team;
        settings.sprint_length = length;
        settings.total_sprints = total;
        settings
    }

    fn agent() -> SprintPlannerAgent {
        SprintPlannerAgent::new(Arc::new(RecordingPublisher::new(ISSUE_TRACKER)), RetryPolicy::disabled())
    }

    #[test]
    fn test_velocity_scales_with_team_and_length() {
        assert_eq!(SprintPlannerAgent::velocity(&settings(3, SprintLength::TwoWeeks, 3)), 24);
        assert_eq!(SprintPlannerAgent::velocity(&settings(1, SprintLength::OneWeek, 3)), 4);
    }

    #[test]
    fn test_first_fit_by_priority() {
        // velocity 4: one person, one week
        let list = stories(&[(2, 3, false), (1, 3, true), (1, 1, true), (3, 8, false)]);
        let plan = agent().plan(&settings(1, SprintLength::OneWeek, 2), &list, &[]);

        assert_eq!(plan.sprints[0].story_ids, vec!["US-002", "US-003"]);
        assert_eq!(plan.sprints[1].story_ids, vec!["US-001"]);
        assert_eq!(plan.unscheduled, vec!["US-004"]);
        assert!(plan.is_ready(&list));
        assert!(plan.sprints.iter().all(|s| s.committed_points <= 4));
    }

    #[test]
    fn test_deferred_story_stays_unscheduled() {
        let list = stories(&[(1, 3, true), (2, 3, false)]);
        let notes = vec!["Please defer us-002 to a later release".to_string()];
        let plan = agent().plan(&settings(3, SprintLength::TwoWeeks, 1), &list, &notes);
        assert_eq!(plan.unscheduled, vec!["US-002"]);
    }

    #[test]
    fn test_not_ready_when_mvp_does_not_fit() {
        let list = stories(&[(1, 8, true)]);
        let plan = agent().plan(&settings(1, SprintLength::OneWeek, 3), &list, &[]);
        assert!(!plan.is_ready(&list));
    }
}
