//! adk-pm - Feedback-routed product-management pipeline
//!
//! This is the main entry point for the adk-pm CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Start a session from an idea
//! adk-pm run "A habit tracker app for busy professionals"
//!
//! # Send feedback to an existing session
//! adk-pm feedback <session-id> user_story_modification "Add social sharing"
//!
//! # Answer a suspension
//! adk-pm approve <session-id>
//! ```

use adk_pm::{
    Approval, DebugLevel, Feedback, FeedbackType, FileSessionStore, PmConfig, PmError, PmOutput,
    Priority, Result, SprintLength, Stage, TelemetryConfig, WorkflowInput, WorkflowOrchestrator,
    WorkflowResult,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

/// adk-pm - Turn a product idea into stories, a PRD, sprints and visuals
#[derive(Parser, Debug)]
#[command(name = "adk-pm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output verbosity level
    #[arg(short = 'd', long, value_enum, global = true)]
    debug: Option<CliDebugLevel>,

    /// Session directory (overrides ADK_PM_SESSION_DIR)
    #[arg(short = 's', long, global = true)]
    session_dir: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

/// CLI debug level (maps to DebugLevel)
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDebugLevel {
    /// Only errors and final status
    Minimal,
    /// Human-readable progress (default)
    Normal,
    /// Routing decisions and publish reports
    Verbose,
    /// Full debug output
    Debug,
}

impl From<CliDebugLevel> for DebugLevel {
    fn from(cli: CliDebugLevel) -> Self {
        match cli {
            CliDebugLevel::Minimal => DebugLevel::Minimal,
            CliDebugLevel::Normal => DebugLevel::Normal,
            CliDebugLevel::Verbose => DebugLevel::Verbose,
            CliDebugLevel::Debug => DebugLevel::Debug,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a new session from a product idea
    Run {
        /// Product idea
        #[arg(required = true)]
        idea: Vec<String>,
        /// Extra context for the idea
        #[arg(short, long)]
        context: Option<String>,
        /// Enable sprint planning
        #[arg(long)]
        sprints: bool,
        /// Team size for sprint planning
        #[arg(long, default_value_t = 3)]
        team_size: u32,
        /// Sprint length in weeks (1-4)
        #[arg(long, default_value_t = 2)]
        sprint_weeks: u32,
        /// Number of sprints to plan
        #[arg(long, default_value_t = 3)]
        total_sprints: u32,
        /// Enable visual design
        #[arg(long)]
        visuals: bool,
    },
    /// Send feedback to an existing session
    Feedback {
        /// Session id
        session: String,
        /// Feedback type (idea_refinement, user_story_modification, prd_revision, ...)
        feedback_type: String,
        /// Feedback text
        #[arg(required = true)]
        content: Vec<String>,
        /// low, medium, high or urgent
        #[arg(short, long, default_value = "medium")]
        priority: String,
        /// Stage the feedback is about
        #[arg(short, long)]
        target: Option<String>,
        /// Treat the feedback as a broader iteration cycle
        #[arg(long)]
        iterate: bool,
    },
    /// Approve the pending decisions of a suspended session
    Approve {
        session: String,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Reject the pending decisions of a suspended session
    Reject {
        session: String,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Re-run one stage and everything after it
    Retry {
        session: String,
        /// Stage to re-run (idea, user_stories, prd, sprint_plan, visual_design)
        stage: String,
    },
    /// Show a session, or list all sessions
    Status { session: Option<String> },
    /// Validate configuration
    Config,
}

/// Initialize logging based on configuration and debug level.
fn init_telemetry(config: &TelemetryConfig, debug_level: DebugLevel) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    adk_pm::telemetry::set_otel_enabled(config.enabled && config.enable_metrics);

    let directive = if config.enabled && debug_level.is_debug() {
        format!("adk_pm={}", config.log_level)
    } else {
        debug_level.filter_directive().to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_config(config: &PmConfig, integrations: &[&str]) {
    println!("{}", "Configuration:".yellow().bold());
    println!("  Session Dir:     {}", config.session_dir);
    println!("  Debug Level:     {}", config.debug_level.to_string().cyan());
    println!("  Max Revisions:   {}", config.max_revisions);
    println!(
        "  Publish Retries: {} (backoff {}ms..{}ms, timeout {}ms)",
        config.publish.max_retries,
        config.publish.initial_backoff_ms,
        config.publish.max_backoff_ms,
        config.publish.timeout_ms
    );
    println!(
        "  Readiness:       {} stories, {} MVP, {} core features",
        config.readiness.min_stories,
        config.readiness.min_mvp_stories,
        config.readiness.min_core_features
    );
    let integrations = if integrations.is_empty() {
        "none".normal()
    } else {
        integrations.join(", ").cyan()
    };
    println!("  Integrations:    {}", integrations);
    println!();
}

fn print_result(output: &PmOutput, json: bool, result: &WorkflowResult) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        output.result(result);
    }
    Ok(())
}

fn parse_feedback(
    feedback_type: &str,
    content: &str,
    priority: &str,
    target: Option<String>,
) -> Result<Feedback> {
    let feedback_type: FeedbackType = feedback_type.parse().map_err(PmError::InvalidInput)?;
    let priority: Priority = priority.parse().map_err(PmError::InvalidInput)?;
    let mut feedback = Feedback::new(feedback_type, content).with_priority(priority);
    if let Some(target) = target {
        feedback = feedback.with_target_step(target);
    }
    Ok(feedback)
}

async fn run_command(
    orchestrator: &WorkflowOrchestrator,
    output: &PmOutput,
    json: bool,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Run {
            idea,
            context,
            sprints,
            team_size,
            sprint_weeks,
            total_sprints,
            visuals,
        } => {
            let idea = idea.join(" ");
            let mut input = WorkflowInput::new(idea.clone());
            if let Some(context) = context {
                input = input.with_context(context);
            }
            if sprints {
                let length = SprintLength::from_weeks(sprint_weeks).ok_or_else(|| {
                    PmError::InvalidInput(format!(
                        "sprint length must be 1-4 weeks, got {}",
                        sprint_weeks
                    ))
                })?;
                input = input.with_sprint_planning(team_size, length, total_sprints);
            }
            if visuals {
                input = input.with_visual_design();
            }

            info!(idea = %idea, "Starting new session");
            if !json {
                println!("{} {}", "Idea:".green().bold(), idea);
            }
            let result = orchestrator.run_workflow(input).await?;
            print_result(output, json, &result)
        }

        Commands::Feedback {
            session,
            feedback_type,
            content,
            priority,
            target,
            iterate,
        } => {
            let feedback = parse_feedback(&feedback_type, &content.join(" "), &priority, target)?;
            let mut input = WorkflowInput::for_session(session).with_feedback(feedback);
            if iterate {
                input = input.with_iteration_mode();
            }
            let result = orchestrator.run_workflow(input).await?;
            print_result(output, json, &result)
        }

        Commands::Approve { session, note } => {
            let mut approval = Approval::approve();
            if let Some(note) = note {
                approval = approval.with_note(note);
            }
            let result = orchestrator.resume(&session, approval).await?;
            print_result(output, json, &result)
        }

        Commands::Reject { session, note } => {
            let mut approval = Approval::reject();
            if let Some(note) = note {
                approval = approval.with_note(note);
            }
            let result = orchestrator.resume(&session, approval).await?;
            print_result(output, json, &result)
        }

        Commands::Retry { session, stage } => {
            let stage: Stage = stage.parse().map_err(PmError::InvalidInput)?;
            let result = orchestrator.retry_stage(&session, stage).await?;
            print_result(output, json, &result)
        }

        Commands::Status { session: Some(session) } => {
            let result = orchestrator.status(&session).await?;
            print_result(output, json, &result)
        }

        Commands::Status { session: None } => {
            let sessions = orchestrator.sessions().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("{}", "No sessions found".yellow());
            } else {
                println!("{}", "Sessions:".yellow().bold());
                for id in sessions {
                    println!("  {}", id);
                }
            }
            Ok(())
        }

        Commands::Config => {
            print_config(orchestrator.config(), orchestrator.integrations());
            println!("{}", "Configuration is valid!".green());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded config from: {}", path.display());
    }

    let cli = Cli::parse();

    let mut config = match PmConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Configuration Error".red().bold(), e);
            eprintln!();
            eprintln!("Check the {} variables in your environment or .env file.", "ADK_PM_*".cyan());
            std::process::exit(1);
        }
    };

    if let Some(debug_level) = cli.debug {
        config.debug_level = debug_level.into();
    }
    if let Some(dir) = cli.session_dir {
        config.session_dir = dir;
    }

    init_telemetry(&config.telemetry, config.debug_level);

    let output = PmOutput::new(config.debug_level);
    let store = Arc::new(FileSessionStore::new(&config.session_dir));

    let mut builder = WorkflowOrchestrator::builder()
        .config(config)
        .store(store);
    if !cli.json {
        builder = builder.output(output.clone());
    }

    let orchestrator = match builder.build() {
        Ok(o) => o,
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(&orchestrator, &output, cli.json, cli.command).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}
