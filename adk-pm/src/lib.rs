//! # adk-pm
//!
//! A feedback-routed product-management pipeline. A raw product idea is
//! refined into a chain of artifacts, each produced by its own agent:
//!
//! 1. **Idea Agent** - Refines the idea and asks clarifying questions
//! 2. **User Story Agent** - Derives personas and prioritized user stories
//! 3. **PRD Agent** - Compiles the requirements document
//! 4. **Sprint Planner** - Schedules stories into sprints (optional)
//! 5. **Visual Design Agent** - Journeys, story map and timeline (optional)
//!
//! ## Features
//!
//! - **Feedback Routing**: Each feedback item is classified to the stage it concerns
//! - **Cascading Invalidation**: A changed stage invalidates everything downstream
//! - **Human-in-the-Loop**: Destructive or urgent feedback suspends until approved
//! - **Failure Isolation**: A failing stage never runs its dependents
//! - **Best-Effort Publishing**: Document store, issue tracker and whiteboard pushes retry with backoff
//! - **Telemetry Integration**: Tracing spans plus OpenTelemetry counters
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use adk_pm::{Feedback, FeedbackType, WorkflowInput, WorkflowOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = WorkflowOrchestrator::builder().build()?;
//!
//!     let first = orchestrator
//!         .run_workflow(WorkflowInput::new("A habit tracker app for busy professionals"))
//!         .await?;
//!
//!     let revised = orchestrator
//!         .run_workflow(
//!             WorkflowInput::for_session(&first.session_id)
//!                 .with_feedback(Feedback::new(FeedbackType::UserStoryModification, "Add social sharing")),
//!         )
//!         .await?;
//!     println!("{}: {}", revised.status, revised.message);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! WorkflowInput → classifier → invalidate targets + downstream
//!                     ↓
//!          Idea → User Stories → PRD → [Sprint Plan] → [Visual Design]
//!                     ↓
//!            WorkflowResult (status, stage results, recommendations)
//! ```

pub mod agents;
pub mod classifier;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod publish;
pub mod retry;
pub mod session;
pub mod telemetry;
pub mod workflow;

pub use agents::{
    IdeaAgent, PrdAgent, SprintPlannerAgent, StageExecutor, StageInputs, UserStoryAgent,
    VisualDesignAgent, default_executors, execute_stage, prepare_inputs,
};
pub use classifier::{FeedbackClassifier, RuleBasedClassifier};
pub use error::{PmError, Result};
pub use models::{
    // Config types
    DebugLevel,
    PmConfig,
    PmConfigBuilder,
    PublishConfig,
    ReadinessThresholds,
    TelemetryConfig,
    ValidationError,
    // Feedback types
    Feedback,
    FeedbackType,
    Priority,
    RoutingDecision,
    TargetAgent,
    // Stages and artifacts
    Artifact,
    ArtifactRevision,
    PublishReport,
    SprintLength,
    Stage,
    StageArtifact,
    StageOutput,
    // Artifact payloads
    Frame,
    FrameKind,
    Persona,
    PrdDocument,
    RefinedIdea,
    Requirement,
    Sprint,
    SprintPlan,
    UserStory,
    UserStoryList,
    VisualDesign,
};
pub use orchestrator::{OrchestratorBuilder, WorkflowOrchestrator};
pub use output::PmOutput;
pub use publish::{
    HttpPublisher, PublishRequest, PublishResult, Publisher, Publishers, RecordingPublisher,
    UnconfiguredPublisher,
};
pub use retry::RetryPolicy;
pub use session::{FileSessionStore, InMemorySessionStore, SessionStore};
pub use workflow::{
    Approval, ConversationalContext, QualityMetrics, StageResult, StageResultStatus,
    WorkflowInput, WorkflowMode, WorkflowResult, WorkflowSession, WorkflowSettings,
    WorkflowStatus,
};
