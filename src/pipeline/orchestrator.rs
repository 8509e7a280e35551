//! Refinement pipeline driver.
//!
//! `Plan → Research → Develop → Write → Assess`, repeated until the
//! convergence criterion holds or the iteration cap is reached. Hallucination
//! issues from each assessment are fed into the next research pass.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::agents::{
    ConfidenceAgent, ConfidenceReport, DeveloperAgent, Plan, PlannerAgent, ResearchAgent,
    StageRole, WriterAgent,
};
use crate::error::StoreError;
use crate::llm::{GenerationOutcome, TextGenerator};
use crate::metrics;
use crate::notify::{format_delivery_body, notification_subject, Notifier};
use crate::storage::{ArtifactKind, SessionId, SessionStore};

use super::config::PipelineConfig;
use super::state::{FinalResult, NotificationRecord, PipelineState, Termination};

/// Writing task used by resume when the stored plan has none.
pub const RESUME_WRITER_TASK: &str = "Draft the final response.";

/// Errors that end a run without a result.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Resume found no stored plan for the session.
    #[error("No plan stored for session '{0}'")]
    PlanNotFound(String),

    /// No backend can serve any request.
    #[error("No generation backend is configured")]
    NoBackendsConfigured,

    /// Session store read failed during resume.
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of the writing stage within one pass.
enum Draft {
    Written(String),
    Interrupted(Termination),
}

/// Drives the refinement loop over a [`TextGenerator`].
pub struct RefinementPipeline {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn SessionStore>,
    notifier: Option<Arc<dyn Notifier>>,
    config: PipelineConfig,
    planner: PlannerAgent,
    researcher: ResearchAgent,
    developer: DeveloperAgent,
    writer: WriterAgent,
    assessor: ConfidenceAgent,
}

impl RefinementPipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn SessionStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            planner: PlannerAgent::new(generator.clone()),
            researcher: ResearchAgent::new(generator.clone()),
            developer: DeveloperAgent::new(generator.clone()),
            writer: WriterAgent::new(generator.clone()),
            assessor: ConfidenceAgent::new(generator.clone()),
            generator,
            store,
            notifier: None,
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline for `goal`.
    ///
    /// `max_iterations` overrides the configured cap for this run only.
    pub async fn run(
        &self,
        goal: &str,
        notify_target: Option<&str>,
        max_iterations: Option<u32>,
    ) -> Result<FinalResult, PipelineError> {
        if !self.generator.has_any_route() {
            return Err(PipelineError::NoBackendsConfigured);
        }
        let max_iterations = max_iterations
            .unwrap_or(self.config.max_iterations)
            .max(1);

        let session_id = self.open_session(goal, notify_target).await;
        tracing::info!(session_id = %session_id, max_iterations, "Starting pipeline run");

        let plan = self.planner.create_plan(goal).await;
        self.persist(&session_id, ArtifactKind::Plan, &plan).await;

        let mut state = PipelineState::new(goal);
        let mut termination = Termination::Exhausted;

        for iteration in 1..=max_iterations {
            state.iteration_count = iteration;

            if let Some(task) = plan.task_for(StageRole::Research) {
                let outcome = self
                    .researcher
                    .research(task, state.feedback_issues())
                    .await;
                self.absorb(&session_id, StageRole::Research, outcome, &mut state.research_output)
                    .await;
            }

            if let Some(task) = plan.task_for(StageRole::Developer) {
                let outcome = self
                    .developer
                    .develop(task, state.research_output.as_deref())
                    .await;
                self.absorb(&session_id, StageRole::Developer, outcome, &mut state.developer_output)
                    .await;
            }

            let document = match self
                .draft(&session_id, &state, plan.writer_task())
                .await
            {
                Draft::Written(document) => document,
                Draft::Interrupted(degraded) => {
                    state.writer_output = None;
                    termination = degraded;
                    break;
                }
            };
            state.writer_output = Some(document.clone());

            let report = self.assess(&session_id, &document).await;
            let converged = self.config.convergence.is_converged(&report);
            tracing::info!(
                session_id = %session_id,
                iteration,
                confidence_score = report.confidence_score,
                hallucination_risk_score = report.hallucination_risk_score,
                issues = report.hallucination_issues.len(),
                converged,
                "Iteration assessed"
            );
            state.confidence = Some(report);

            if converged {
                termination = Termination::Converged;
                break;
            }
        }

        if let Termination::Degraded(kind) = termination {
            let report = ConfidenceReport::interrupted(kind);
            self.persist(&session_id, ArtifactKind::ConfidenceReport, &report)
                .await;
            state.confidence = Some(report);
        }

        let notification = match notify_target {
            Some(target) if !termination.is_degraded() => {
                self.notify(&session_id, goal, target, state.writer_output.as_deref())
                    .await
            }
            _ => None,
        };

        Ok(self.finish(session_id, plan, state, termination, notification))
    }

    /// Runs several goals concurrently. Generation calls still share the
    /// gateway's single admission gate.
    pub async fn run_many(
        &self,
        goals: &[String],
        notify_target: Option<&str>,
        max_iterations: Option<u32>,
    ) -> Vec<Result<FinalResult, PipelineError>> {
        futures::future::join_all(
            goals
                .iter()
                .map(|goal| self.run(goal, notify_target, max_iterations)),
        )
        .await
    }

    /// Re-runs Develop, Write and Assess once for a stored session, reusing
    /// its latest plan and research output.
    pub async fn resume(&self, session_id: &str) -> Result<FinalResult, PipelineError> {
        if !self.generator.has_any_route() {
            return Err(PipelineError::NoBackendsConfigured);
        }

        let plan_value = self
            .store
            .latest_artifact(session_id, ArtifactKind::Plan)
            .await?
            .ok_or_else(|| PipelineError::PlanNotFound(session_id.to_string()))?;
        let plan: Plan = serde_json::from_value(plan_value).map_err(StoreError::from)?;

        let goal = match self.store.session(session_id).await? {
            Some(record) => record.goal,
            None => plan.goal.clone(),
        };
        let research = self
            .store
            .latest_artifact(session_id, ArtifactKind::Research)
            .await?
            .and_then(|value| value.as_str().map(str::to_string));

        tracing::info!(
            session_id = session_id,
            has_research = research.is_some(),
            "Resuming session"
        );

        let session_id: SessionId = session_id.to_string();
        let mut state = PipelineState::new(goal);
        state.research_output = research;
        state.iteration_count = 1;

        if let Some(task) = plan.task_for(StageRole::Developer) {
            let outcome = self
                .developer
                .develop(task, state.research_output.as_deref())
                .await;
            self.absorb(&session_id, StageRole::Developer, outcome, &mut state.developer_output)
                .await;
        }

        let writer_task = plan
            .task_for(StageRole::Writer)
            .unwrap_or(RESUME_WRITER_TASK);
        let termination = match self.draft(&session_id, &state, writer_task).await {
            Draft::Written(document) => {
                let report = self.assess(&session_id, &document).await;
                state.writer_output = Some(document);
                let termination = if self.config.convergence.is_converged(&report) {
                    Termination::Converged
                } else {
                    Termination::Exhausted
                };
                state.confidence = Some(report);
                termination
            }
            Draft::Interrupted(degraded) => {
                if let Termination::Degraded(kind) = degraded {
                    let report = ConfidenceReport::interrupted(kind);
                    self.persist(&session_id, ArtifactKind::ConfidenceReport, &report)
                        .await;
                    state.confidence = Some(report);
                }
                degraded
            }
        };

        Ok(self.finish(session_id, plan, state, termination, None))
    }

    async fn open_session(&self, goal: &str, notify_target: Option<&str>) -> SessionId {
        match self.store.create_session(goal, notify_target).await {
            Ok(id) => id,
            Err(e) => {
                let id = Uuid::new_v4().to_string();
                tracing::warn!(error = %e, session_id = %id, "Session store unavailable, continuing unpersisted");
                id
            }
        }
    }

    /// Appends an artifact, logging and ignoring failures.
    async fn persist<T: Serialize + ?Sized>(&self, session_id: &str, kind: ArtifactKind, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Failed to serialize artifact");
                return;
            }
        };
        if let Err(e) = self.store.save_artifact(session_id, kind, value).await {
            tracing::warn!(session_id = session_id, kind = %kind, error = %e, "Failed to save artifact");
        }
    }

    /// Stores a Research or Developer result. Sentinels keep the previous output.
    async fn absorb(
        &self,
        session_id: &str,
        role: StageRole,
        outcome: GenerationOutcome,
        slot: &mut Option<String>,
    ) {
        match outcome {
            GenerationOutcome::Success { text } => {
                let kind = match role {
                    StageRole::Developer => ArtifactKind::Developer,
                    _ => ArtifactKind::Research,
                };
                self.persist(session_id, kind, &text).await;
                *slot = Some(text);
            }
            other => {
                tracing::warn!(
                    session_id = session_id,
                    role = %role,
                    outcome = other.label(),
                    "Stage produced no content, keeping previous output"
                );
            }
        }
    }

    async fn draft(&self, session_id: &str, state: &PipelineState, task: &str) -> Draft {
        let outcome = self
            .writer
            .write(
                &state.goal,
                task,
                state.research_output.as_deref(),
                state.developer_output.as_deref(),
            )
            .await;

        match outcome {
            GenerationOutcome::Success { text } => {
                self.persist(session_id, ArtifactKind::Document, &text).await;
                Draft::Written(text)
            }
            other => {
                let kind = other
                    .sentinel()
                    .unwrap_or(crate::llm::SentinelKind::Unavailable);
                tracing::warn!(
                    session_id = session_id,
                    sentinel = %kind,
                    "Writing stage interrupted, stopping without assessment"
                );
                Draft::Interrupted(Termination::Degraded(kind))
            }
        }
    }

    async fn assess(&self, session_id: &str, document: &str) -> ConfidenceReport {
        let report = self.assessor.assess(document).await;
        self.persist(session_id, ArtifactKind::ConfidenceReport, &report)
            .await;
        report
    }

    async fn notify(
        &self,
        session_id: &str,
        goal: &str,
        target: &str,
        document: Option<&str>,
    ) -> Option<NotificationRecord> {
        let notifier = self.notifier.as_ref()?;
        let subject = notification_subject(goal);
        let body = format_delivery_body(document.unwrap_or_default());
        let receipt = notifier.deliver(target, &subject, &body).await;

        let action: Value = json!({
            "type": "notification",
            "to": target,
            "subject": subject,
            "result": &receipt,
        });
        self.persist(session_id, ArtifactKind::Action, &action).await;

        if !receipt.ok {
            tracing::warn!(session_id = session_id, detail = %receipt.detail, "Delivery failed");
        }
        Some(NotificationRecord {
            target: target.to_string(),
            subject,
            ok: receipt.ok,
            detail: receipt.detail,
        })
    }

    fn finish(
        &self,
        session_id: SessionId,
        plan: Plan,
        state: PipelineState,
        termination: Termination,
        notification: Option<NotificationRecord>,
    ) -> FinalResult {
        metrics::record_pipeline_run(termination.label(), state.iteration_count);
        let confidence = state.confidence.unwrap_or_else(ConfidenceReport::fallback);
        tracing::info!(
            session_id = %session_id,
            iterations = state.iteration_count,
            termination = %termination,
            confidence_score = confidence.confidence_score,
            "Pipeline finished"
        );
        FinalResult {
            session_id,
            goal: state.goal,
            plan,
            iteration_count: state.iteration_count,
            research_output: state.research_output,
            developer_output: state.developer_output,
            document: state.writer_output,
            confidence,
            termination,
            notification,
        }
    }
}
