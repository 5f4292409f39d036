//! Idea refinement.
//!
//! First stage of the pipeline. Turns the raw idea, any extra context and the
//! feedback applied so far into a [`RefinedIdea`]. Ideas too short to work
//! from come back with clarifying questions and are not ready.

use super::{StageExecutor, StageInputs, cached, capitalize, requested_addition, words};
use crate::error::Result;
use crate::models::{Artifact, RefinedIdea, Stage, StageOutput};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

fn audience_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)\bfor\s+([a-z][a-z\s\-]*?)(?:\s+(?:who|that|to|with|so)\b|[,.;!?]|$)")
}

fn feature_list_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)\b(?:with|including|features?:?)\s+([^.;!?]+)")
}

fn removal_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"(?i)^\s*(?:please\s+)?(?:remove|drop)\s+(.+?)\s*[.!]?\s*$")
}

/// Idea refinement stage.
#[derive(Debug, Clone, Default)]
pub struct IdeaAgent;

impl IdeaAgent {
    pub fn new() -> Self {
        Self
    }

    /// Refine an idea from its inputs.
    pub fn refine(&self, inputs: &StageInputs) -> RefinedIdea {
        let settings = &inputs.settings;
        let mut texts = vec![settings.raw_idea.clone()];
        texts.extend(settings.additional_context.iter().cloned());
        texts.extend(inputs.notes.iter().cloned());
        let corpus = texts.join(". ");

        let title = title_of(&settings.raw_idea);
        let mut idea = RefinedIdea::new(title.clone(), problem_statement(inputs));

        idea.target_users = dedup(
            audience_regex()
                .into_iter()
                .flat_map(|re| re.captures_iter(&corpus))
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().trim().to_lowercase())
                .filter(|u| !u.is_empty()),
        );

        let mut features: Vec<String> = Vec::new();
        for text in &texts {
            for caps in feature_list_regex()
                .into_iter()
                .flat_map(|re| re.captures_iter(text))
            {
                if let Some(list) = caps.get(1) {
                    features.extend(split_list(list.as_str()));
                }
            }
        }
        let mut removed = Vec::new();
        for note in &inputs.notes {
            if let Some(addition) = requested_addition(note) {
                features.extend(split_list(&addition));
            } else if let Some(caps) = removal_regex().and_then(|re| re.captures(note)) {
                if let Some(m) = caps.get(1) {
                    removed.push(m.as_str().trim().to_lowercase());
                }
            }
        }
        features.retain(|f| !removed.iter().any(|r| f.to_lowercase().contains(r.as_str())));

        let subject = title.to_lowercase();
        let fallbacks = [
            format!("Create and manage {}", subject),
            format!("Progress dashboard for {}", subject),
            "Reminders and notifications".to_string(),
        ];
        let mut fallback = fallbacks.into_iter();
        while features.len() < inputs.thresholds.min_core_features {
            match fallback.next() {
                Some(f) => features.push(f),
                None => break,
            }
        }
        idea.core_features = dedup(features.into_iter());

        let word_count = words(&corpus).len();
        if word_count < inputs.thresholds.min_idea_words {
            idea.clarifying_questions = vec![
                format!("Who is the primary user of the {}?", subject),
                "What problem does it solve for them today?".to_string(),
                "Which features matter most for a first release?".to_string(),
            ];
        } else if idea.target_users.len() < inputs.thresholds.min_target_users {
            idea.clarifying_questions =
                vec![format!("Who is the primary user of the {}?", subject)];
        }

        idea.value_proposition = if idea.target_users.is_empty() {
            format!("{} that is simple enough to use every day", title)
        } else {
            format!("{} built for {}", title, idea.target_users.join(" and "))
        };

        idea
    }
}

#[async_trait]
impl StageExecutor for IdeaAgent {
    fn stage(&self) -> Stage {
        Stage::Idea
    }

    async fn run(&self, inputs: StageInputs) -> Result<StageOutput> {
        let idea = self.refine(&inputs);
        let ready = idea.is_ready(&inputs.thresholds);
        tracing::debug!(
            features = idea.core_features.len(),
            users = idea.target_users.len(),
            questions = idea.clarifying_questions.len(),
            "Refined idea"
        );
        Ok(StageOutput::new(Artifact::Idea(idea), ready))
    }
}

fn title_of(raw: &str) -> String {
    let first_clause = raw
        .split(|c: char| matches!(c, '.' | ',' | ';' | '!' | '?'))
        .next()
        .unwrap_or(raw);
    let lowered = first_clause.to_lowercase();
    let core = lowered
        .split(" for ")
        .next()
        .unwrap_or(&lowered)
        .split(" with ")
        .next()
        .unwrap_or(&lowered)
        .split_whitespace()
        .filter(|w| !matches!(*w, "a" | "an" | "the"))
        .take(6)
        .collect::<Vec<_>>()
        .join(" ");
    if core.is_empty() {
        "Untitled product".to_string()
    } else {
        capitalize(&core)
    }
}

fn problem_statement(inputs: &StageInputs) -> String {
    let raw = inputs.settings.raw_idea.trim();
    let mut statement = if raw.ends_with('.') {
        raw.to_string()
    } else {
        format!("{}.", raw)
    };
    if let Some(context) = &inputs.settings.additional_context {
        statement.push(' ');
        statement.push_str(context.trim());
    }
    statement
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .flat_map(|part| part.split(" and "))
        .map(|f| f.trim().trim_start_matches("and ").trim())
        .filter(|f| !f.is_empty())
        .map(capitalize)
        .collect()
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.iter().any(|o| o.eq_ignore_ascii_case(&item)) {
            out.push(item);
        }
    }
    out
}
