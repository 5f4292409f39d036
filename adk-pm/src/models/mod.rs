//! Data models for the product-management pipeline.
//!
//! This module contains:
//! - Configuration structures
//! - Feedback and routing decisions
//! - Stages and their typed artifacts

pub mod artifact;
pub mod config;
pub mod feedback;
pub mod idea;
pub mod prd;
pub mod sprint;
pub mod stage;
pub mod stories;
pub mod visual;

pub use artifact::{Artifact, ArtifactRevision, PublishReport, StageArtifact, StageOutput};
pub use config::{
    DebugLevel, PmConfig, PmConfigBuilder, PublishConfig, ReadinessThresholds, TelemetryConfig,
    ValidationError,
};
pub use feedback::{Feedback, FeedbackType, Priority, RoutingDecision, TargetAgent};
pub use idea::RefinedIdea;
pub use prd::{PrdDocument, Requirement};
pub use sprint::{Sprint, SprintPlan};
pub use stage::{SprintLength, Stage};
pub use stories::{Persona, UserStory, UserStoryList};
pub use visual::{Frame, FrameKind, VisualDesign};
