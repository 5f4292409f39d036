//! Console output for the `adk-pm` binary.
//!
//! ## Debug Levels
//!
//! - `Minimal`: Only errors and the final status line
//! - `Normal`: Stage progress and the result summary (default)
//! - `Verbose`: Routing decisions and publish reports
//! - `Debug`: Full result dumps

use crate::models::{DebugLevel, RoutingDecision, Stage};
use crate::workflow::{StageResultStatus, WorkflowResult};
use colored::Colorize;

/// Output handler that respects debug levels.
#[derive(Debug, Clone)]
pub struct PmOutput {
    level: DebugLevel,
}

impl Default for PmOutput {
    fn default() -> Self {
        Self::new(DebugLevel::Normal)
    }
}

impl PmOutput {
    pub fn new(level: DebugLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> DebugLevel {
        self.level
    }

    /// Print a stage header (shown at Normal and above).
    pub fn stage_start(&self, stage: Stage) {
        if self.level.is_normal() {
            println!("\n{} {}", "▶".bright_cyan(), stage.label().bright_white().bold());
        }
    }

    /// Print a stage outcome (shown at Normal and above).
    pub fn stage_complete(&self, stage: Stage, ready: bool) {
        if self.level.is_normal() {
            if ready {
                println!("  {} {} ready", "✓".bright_green(), stage.as_str().green());
            } else {
                println!(
                    "  {} {} generated, needs input",
                    "○".bright_yellow(),
                    stage.as_str().yellow()
                );
            }
        }
    }

    /// Print a stage failure (always shown).
    pub fn stage_failed(&self, stage: Stage, error: &str) {
        eprintln!("  {} {} failed: {}", "✗".bright_red(), stage.as_str().red(), error);
    }

    /// Print a routing decision (shown at Verbose and above).
    pub fn routing(&self, decision: &RoutingDecision) {
        if self.level.is_verbose() {
            let marker = if decision.should_suspend_workflow {
                "⏸".bright_yellow()
            } else {
                "→".bright_blue()
            };
            println!(
                "  {} {} {}",
                marker,
                decision.target_agent.as_str().cyan(),
                decision.reasoning.bright_black()
            );
        }
    }

    /// Print a status message (shown at Normal and above).
    pub fn status(&self, message: &str) {
        if self.level.is_normal() {
            println!("  {} {}", "•".bright_black(), message);
        }
    }

    /// Print an error (always shown).
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗ Error:".bright_red().bold(), message);
    }

    /// Print a warning (shown at Normal and above).
    pub fn warn(&self, message: &str) {
        if self.level.is_normal() {
            println!("{} {}", "⚠".bright_yellow(), message.yellow());
        }
    }

    /// Print a workflow result.
    pub fn result(&self, result: &WorkflowResult) {
        if self.level.is_minimal() {
            println!("{} {}: {}", result.session_id, result.status, result.message);
            return;
        }

        println!();
        println!("{}", "─".repeat(50).bright_black());
        println!("{} {}", "Session:".bright_black(), result.session_id);
        println!(
            "{} {} ({})",
            "Status:".bright_black(),
            result.status.to_string().bright_white().bold(),
            result.workflow_mode
        );
        println!("{}", result.message);

        for (stage, stage_result) in &result.stage_results {
            let line = format!("{:<14} {:?}", stage.as_str(), stage_result.status).to_lowercase();
            let line = match stage_result.status {
                StageResultStatus::Completed => line.green(),
                StageResultStatus::Failed => line.red(),
                StageResultStatus::Stale => line.yellow(),
                StageResultStatus::Pending | StageResultStatus::Skipped => line.bright_black(),
            };
            println!("    {} {}", "─".bright_black(), line);

            if self.level.is_verbose() {
                if let Some(report) = &stage_result.publish {
                    let outcome = if report.published { "published" } else { "not published" };
                    println!(
                        "        {} {} after {} attempt(s)",
                        report.target.cyan(),
                        outcome,
                        report.attempts
                    );
                }
            }
        }

        for decision in &result.pending_decisions {
            println!(
                "  {} {} {}",
                "⏸".bright_yellow(),
                decision.target_agent.as_str().cyan(),
                decision.action_required
            );
        }

        for recommendation in &result.recommendations {
            println!("  {} {}", "→".bright_blue(), recommendation);
        }

        println!(
            "{} {}% complete, {} artifact(s), {}ms",
            "Quality:".bright_black(),
            result.quality_metrics.completion_percentage,
            result.quality_metrics.artifacts_generated,
            result.quality_metrics.time_elapsed_ms
        );
        println!("{}", "─".repeat(50).bright_black());

        if self.level.is_debug() {
            if let Ok(pretty) = serde_json::to_string_pretty(result) {
                for line in pretty.lines() {
                    println!("  {}", line.bright_black());
                }
            }
        }
    }
}
