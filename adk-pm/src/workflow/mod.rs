//! Workflow state machine types.
//!
//! - `state`: the persisted session and stage bookkeeping
//! - `status`: status derivation
//! - `result`: inputs and results of the orchestrator entry points

pub mod result;
pub mod state;
pub mod status;

pub use result::{
    Approval, CallTrace, ConversationalContext, QualityMetrics, StageResult, StageResultStatus,
    WorkflowInput, WorkflowResult,
};
pub use state::{
    PendingApproval, StageRecord, StageState, WorkflowMode, WorkflowSession, WorkflowSettings,
    WorkflowSnapshot,
};
pub use status::{WorkflowStatus, compute_status};
