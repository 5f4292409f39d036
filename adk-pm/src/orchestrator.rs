//! Workflow orchestrator for the product pipeline.
//!
//! The orchestrator drives one session at a time through the fixed stage
//! order:
//! 1. Idea → User Stories → PRD
//! 2. Sprint Plan and Visual Design when enabled
//!
//! Feedback is classified item by item, the named stages are invalidated with
//! everything downstream of them, and the invalid stages re-run in order. A
//! decision that needs a human holds the whole batch until [`resume`] is
//! called.
//!
//! Stage failures never escape an entry point: they are recorded on the
//! session and reported through [`WorkflowResult::status`]. Only caller
//! errors (unknown session, invalid input) and store I/O are returned as
//! `Err`.
//!
//! [`resume`]: WorkflowOrchestrator::resume

use crate::agents::{StageExecutor, default_executors, execute_stage};
use crate::classifier::{FeedbackClassifier, RuleBasedClassifier};
use crate::error::{PmError, Result};
use crate::models::{Feedback, PmConfig, RoutingDecision, Stage, StageOutput};
use crate::output::PmOutput;
use crate::publish::Publishers;
use crate::retry::RetryPolicy;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::telemetry::{
    TimingGuard, feedback_classification_span, log_error, log_resume, log_routing_decision,
    log_stage_complete, log_stage_failed, log_stage_start, log_suspension, stage_execution_span,
    start_timing, workflow_run_span,
};
use crate::workflow::{
    Approval, CallTrace, PendingApproval, WorkflowInput, WorkflowMode, WorkflowResult,
    WorkflowSession,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, info};

/// Coordinates classifier, stage executors and session store.
///
/// # Example
///
/// ```rust,ignore
/// use adk_pm::{PmConfig, WorkflowInput, WorkflowOrchestrator};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = WorkflowOrchestrator::builder()
///         .config(PmConfig::from_env()?)
///         .build()?;
///
///     let result = orchestrator
///         .run_workflow(WorkflowInput::new("A habit tracker for busy professionals"))
///         .await?;
///     println!("{}: {}", result.status, result.message);
///     Ok(())
/// }
/// ```
pub struct WorkflowOrchestrator {
    config: PmConfig,
    store: Arc<dyn SessionStore>,
    classifier: Arc<dyn FeedbackClassifier>,
    executors: BTreeMap<Stage, Arc<dyn StageExecutor>>,
    integrations: Vec<&'static str>,
    output: Option<PmOutput>,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("config", &self.config)
            .field("classifier", &self.classifier.name())
            .field("executors", &self.executors.keys().collect::<Vec<_>>())
            .field("integrations", &self.integrations)
            .finish()
    }
}

impl WorkflowOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &PmConfig {
        &self.config
    }

    /// Publish targets backed by a configured endpoint.
    pub fn integrations(&self) -> &[&'static str] {
        &self.integrations
    }

    /// Start a session or continue one.
    ///
    /// A new session needs `raw_idea`; its settings are fixed from this
    /// input. On an existing session the input carries feedback, which is
    /// routed before the invalid stages re-run.
    pub async fn run_workflow(&self, input: WorkflowInput) -> Result<WorkflowResult> {
        let timer = start_timing("workflow.run");

        let (session, existing) = match &input.session_id {
            Some(id) => (self.load(id).await?, true),
            None => {
                input.validate_new_session()?;
                (self.store.create(input.settings()).await?, false)
            }
        };

        let span = workflow_run_span(&session.session_id, "run_workflow");
        self.drive_run(session, input, existing, &timer)
            .instrument(span)
            .await
    }

    /// Answer a suspension.
    ///
    /// Approval applies the held decisions and continues; rejection discards
    /// them and nothing re-runs. With nothing pending the current result is
    /// returned unchanged.
    pub async fn resume(&self, session_id: &str, approval: Approval) -> Result<WorkflowResult> {
        let timer = start_timing("workflow.resume");
        let session = self.load(session_id).await?;

        let span = workflow_run_span(session_id, "resume");
        self.drive_resume(session, approval, &timer)
            .instrument(span)
            .await
    }

    /// Re-run one stage and continue downstream.
    ///
    /// When the stage's dependencies are not valid nothing runs and the
    /// result reports the missing stages as `waiting_for_input`.
    pub async fn retry_stage(&self, session_id: &str, stage: Stage) -> Result<WorkflowResult> {
        let timer = start_timing("workflow.retry");
        let session = self.load(session_id).await?;

        if session.pending_approval.is_some() {
            return Err(PmError::InvalidInput(
                "session is suspended for approval; approve or reject it first".to_string(),
            ));
        }
        if !session.settings.is_enabled(stage) {
            return Err(PmError::InvalidInput(format!(
                "stage '{}' is disabled for this session",
                stage
            )));
        }

        let span = workflow_run_span(session_id, "retry_stage");
        self.drive_retry(session, stage, &timer)
            .instrument(span)
            .await
    }

    /// Current result of a session without changing it.
    pub async fn status(&self, session_id: &str) -> Result<WorkflowResult> {
        let timer = start_timing("workflow.status");
        let session = self.load(session_id).await?;
        Ok(self.finish(&session, CallTrace::default(), &timer))
    }

    /// Ids of all stored sessions.
    pub async fn sessions(&self) -> Result<Vec<String>> {
        self.store.list().await
    }

    async fn drive_run(
        &self,
        mut session: WorkflowSession,
        input: WorkflowInput,
        existing: bool,
        timer: &TimingGuard,
    ) -> Result<WorkflowResult> {
        let mut trace = CallTrace::default();

        if !input.user_feedback.is_empty() {
            if existing {
                session.mode = if input.iteration_mode {
                    WorkflowMode::FeedbackIteration
                } else {
                    WorkflowMode::StepRefinement
                };
            }
            self.route_feedback(&mut session, input.user_feedback, &mut trace);
            trace.settle(&session);
        }

        if session.pending_approval.is_none() {
            self.advance(&mut session, &mut trace).await;
        }

        self.store.save(&session).await?;
        Ok(self.finish(&session, trace, timer))
    }

    async fn drive_resume(
        &self,
        mut session: WorkflowSession,
        approval: Approval,
        timer: &TimingGuard,
    ) -> Result<WorkflowResult> {
        let mut trace = CallTrace::default();

        let Some(pending) = session.pending_approval.take() else {
            info!("Nothing pending, resume is a no-op");
            return Ok(self.finish(&session, trace, timer));
        };

        log_resume(&session.session_id, approval.approved);
        if approval.approved {
            for (decision, feedback) in pending.decisions.iter().zip(&pending.feedback) {
                self.apply_decision(&mut session, decision, feedback, &mut trace);
            }
            trace.settle(&session);
            self.advance(&mut session, &mut trace).await;
        } else {
            info!(
                discarded = pending.decisions.len(),
                note = approval.note.as_deref().unwrap_or(""),
                "Pending decisions rejected"
            );
            if let Some(output) = &self.output {
                output.status(&format!("Discarded {} pending decision(s)", pending.decisions.len()));
            }
        }

        self.store.save(&session).await?;
        Ok(self.finish(&session, trace, timer))
    }

    async fn drive_retry(
        &self,
        mut session: WorkflowSession,
        stage: Stage,
        timer: &TimingGuard,
    ) -> Result<WorkflowResult> {
        let mut trace = CallTrace::default();
        let executor = self.executor(stage)?;

        let missing = session.missing_dependencies(executor.requires());
        if !missing.is_empty() {
            let error = PmError::missing_dependency(stage, missing);
            log_error("retry_stage", &error.to_string());
            trace.blocked = Some(error.to_string());
            return Ok(self.finish(&session, trace, timer));
        }

        trace.invalidated_stages = session.invalidate_from(stage);
        self.advance(&mut session, &mut trace).await;

        self.store.save(&session).await?;
        Ok(self.finish(&session, trace, timer))
    }

    async fn load(&self, session_id: &str) -> Result<WorkflowSession> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| PmError::SessionNotFound(session_id.to_string()))
    }

    fn executor(&self, stage: Stage) -> Result<Arc<dyn StageExecutor>> {
        self.executors
            .get(&stage)
            .cloned()
            .ok_or(PmError::ExecutorNotRegistered(stage))
    }

    /// Classify every item against the same snapshot, then apply the batch
    /// or hold it for approval.
    fn route_feedback(&self, session: &mut WorkflowSession, feedback: Vec<Feedback>, trace: &mut CallTrace) {
        let snapshot = session.snapshot();

        let decisions: Vec<RoutingDecision> = feedback
            .iter()
            .map(|item| {
                let span = feedback_classification_span(
                    item.feedback_type.as_str(),
                    &item.priority.to_string(),
                );
                let decision = span.in_scope(|| self.classifier.classify(item, &snapshot));
                log_routing_decision(
                    decision.target_agent.as_str(),
                    decision.should_suspend_workflow,
                    &decision.reasoning,
                );
                if let Some(output) = &self.output {
                    output.routing(&decision);
                }
                decision
            })
            .collect();

        session.feedback_history.extend(feedback.iter().cloned());
        session.routing_history.extend(decisions.iter().cloned());
        session.latest_decisions = decisions.clone();
        trace.routing_decisions.extend(decisions.iter().cloned());

        let suspend =
            session.pending_approval.is_some() || decisions.iter().any(|d| d.should_suspend_workflow);
        if !suspend {
            for (decision, item) in decisions.iter().zip(&feedback) {
                self.apply_decision(session, decision, item, trace);
            }
            return;
        }

        let pending = session.pending_approval.get_or_insert_with(|| PendingApproval {
            decisions: Vec::new(),
            feedback: Vec::new(),
            recommended_actions: Vec::new(),
            affected_stages: Vec::new(),
            requested_at: Utc::now(),
        });
        pending.decisions.extend(decisions);
        pending.feedback.extend(feedback);

        let enabled = session.settings.enabled_stages();
        let mut affected: Vec<Stage> = pending
            .decisions
            .iter()
            .filter_map(|d| d.target_stage())
            .flat_map(|s| s.with_downstream().iter().copied())
            .filter(|s| enabled.contains(s))
            .collect();
        affected.sort();
        affected.dedup();

        pending.recommended_actions = pending
            .decisions
            .iter()
            .map(|d| d.action_required.clone())
            .collect();
        if !affected.is_empty() {
            let names: Vec<&str> = affected.iter().map(|s| s.as_str()).collect();
            pending
                .recommended_actions
                .push(format!("Approving re-runs: {}", names.join(", ")));
        }
        pending.affected_stages = affected;

        let count = pending.decisions.len();
        log_suspension(&session.session_id, count);
        if let Some(output) = &self.output {
            output.warn(&format!("Waiting for approval of {} decision(s)", count));
        }
    }

    /// Invalidate the decision's stage with everything downstream and hand
    /// the feedback to the stage. Orchestrator decisions invalidate nothing.
    fn apply_decision(
        &self,
        session: &mut WorkflowSession,
        decision: &RoutingDecision,
        feedback: &Feedback,
        trace: &mut CallTrace,
    ) {
        let Some(stage) = decision.target_stage() else {
            return;
        };
        session.add_note(stage, feedback.content.trim());
        for touched in session.invalidate_from(stage) {
            if !trace.invalidated_stages.contains(&touched) {
                trace.invalidated_stages.push(touched);
            }
        }
        trace.invalidated_stages.sort();
    }

    /// Run invalid stages in order until one fails, is not ready, or the
    /// pipeline ends.
    async fn advance(&self, session: &mut WorkflowSession, trace: &mut CallTrace) {
        for stage in session.settings.enabled_stages() {
            if session.is_valid(stage) {
                let ready = session.artifact(stage).is_some_and(|a| a.ready_for_next_step);
                if ready {
                    continue;
                }
                break;
            }

            let executor = match self.executor(stage) {
                Ok(executor) => executor,
                Err(e) => {
                    log_error("advance", &e.to_string());
                    session.record_failure(stage, e.to_string());
                    break;
                }
            };

            let run = session.record(stage).run_count + 1;
            trace.executed_stages.push(stage);
            match self.run_stage(session, executor.as_ref(), run).await {
                Ok(output) => {
                    let ready = output.ready_for_next_step;
                    session.record_success(stage, output, self.config.max_revisions);
                    if !ready {
                        break;
                    }
                }
                Err(e) if e.is_missing_dependency() => {
                    trace.executed_stages.pop();
                    trace.blocked = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    session.record_failure(stage, e.to_string());
                    break;
                }
            }
        }
    }

    async fn run_stage(
        &self,
        session: &WorkflowSession,
        executor: &dyn StageExecutor,
        run: u32,
    ) -> Result<StageOutput> {
        let stage = executor.stage();
        let span = stage_execution_span(stage.as_str(), run);

        async {
            log_stage_start(stage.as_str(), run);
            if let Some(output) = &self.output {
                output.stage_start(stage);
            }
            let timer = start_timing(format!("stage.{}", stage));

            let result = execute_stage(session, executor, &self.config.readiness).await;
            match &result {
                Ok(out) => {
                    log_stage_complete(stage.as_str(), out.ready_for_next_step, timer.elapsed_ms());
                    if let Some(output) = &self.output {
                        output.stage_complete(stage, out.ready_for_next_step);
                        if let Some(report) = out.publish.as_ref().filter(|r| !r.published) {
                            output.warn(&format!(
                                "{} not published to {}: {}",
                                stage,
                                report.target,
                                report.error_message.as_deref().unwrap_or("unknown error")
                            ));
                        }
                    }
                }
                Err(e) => {
                    log_stage_failed(stage.as_str(), &e.to_string(), timer.elapsed_ms());
                    if let Some(output) = &self.output {
                        output.stage_failed(stage, &e.to_string());
                    }
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    fn finish(&self, session: &WorkflowSession, trace: CallTrace, timer: &TimingGuard) -> WorkflowResult {
        let result = WorkflowResult::from_session(session, trace, timer.elapsed_ms());
        info!(
            session_id = %result.session_id,
            status = %result.status,
            executed = result.executed_stages.len(),
            "Workflow settled"
        );
        result
    }
}

/// Builder for creating a WorkflowOrchestrator with fluent API.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<PmConfig>,
    store: Option<Arc<dyn SessionStore>>,
    classifier: Option<Arc<dyn FeedbackClassifier>>,
    publishers: Option<Publishers>,
    executors: Vec<Arc<dyn StageExecutor>>,
    output: Option<PmOutput>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PmConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn FeedbackClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Publishers handed to the built-in agents.
    pub fn publishers(mut self, publishers: Publishers) -> Self {
        self.publishers = Some(publishers);
        self
    }

    /// Replace the built-in executor for the executor's stage.
    pub fn executor(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.executors.push(executor);
        self
    }

    /// Print progress to the console.
    pub fn output(mut self, output: PmOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> Result<WorkflowOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let publishers = self
            .publishers
            .unwrap_or_else(|| Publishers::from_config(&config.publish));
        let policy = RetryPolicy::from(&config.publish);

        let mut executors = default_executors(&publishers, &policy);
        for executor in self.executors {
            executors.insert(executor.stage(), executor);
        }

        Ok(WorkflowOrchestrator {
            integrations: Publishers::configured_targets(&config.publish),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new())),
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(RuleBasedClassifier::new())),
            executors,
            output: self.output,
            config,
        })
    }
}
