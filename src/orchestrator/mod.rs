//! Execution orchestrator
//!
//! Sends the compiled steps of one test to a [`StepApi`], strictly in order,
//! scoped to the checkpoint held by the caller's [`SessionContext`]. Missing
//! project, goal, journey or checkpoint identifiers are created on demand;
//! identifiers already present are never re-created.
//!
//! The step position is read with `peek_position` before a dispatch and
//! only advanced after the platform accepted the step. The first failing
//! step stops the test; later steps are not sent.

pub mod cancel;
pub mod metrics;
pub mod pool;

pub use cancel::CancelToken;
pub use metrics::{PhaseMetrics, StepTiming};

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::{StepApi, StepRequest};
use crate::common::config::ExecutionConfig;
use crate::common::{Error, Result};
use crate::compiler::CompiledTest;
use crate::dialect::ActionKind;
use crate::session::SessionContext;

use metrics::millis;

/// Knobs for a single orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Deadline for each remote call
    pub step_timeout: Duration,
    pub screenshot_on_failure: bool,
    /// Start a platform execution once every step was created
    pub start_execution: bool,
    /// Name for a project created on demand; defaults to the test name
    pub project_name: Option<String>,
    pub checkpoint_title: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            step_timeout: Duration::from_secs(config.step_timeout_secs),
            screenshot_on_failure: config.screenshot_on_failure,
            start_execution: config.start_execution,
            project_name: config.default_project_name.clone(),
            checkpoint_title: config.checkpoint_title.clone(),
        }
    }
}

/// Why a run stopped early
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionFailure {
    /// 0-based index of the failing step; `None` for setup or final execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<ActionKind>,
    pub message: String,
    /// Source line of the failing step, 0 when unknown
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub cancelled: bool,
}

impl ExecutionFailure {
    fn setup(err: &Error) -> Self {
        Self {
            step: None,
            command: None,
            message: err.to_string(),
            line: 0,
            screenshot: None,
            cancelled: err.is_cancellation(),
        }
    }
}

/// Result of running one compiled test
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionOutcome {
    /// Platform ids of the steps created, in order
    pub step_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    pub timings: Vec<StepTiming>,
    pub duration_ms: f64,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Drives one test at a time against a [`StepApi`]
pub struct Orchestrator {
    api: Arc<dyn StepApi>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn StepApi>, options: OrchestratorOptions) -> Self {
        Self { api, options }
    }

    /// Dispatch every step of `test`
    ///
    /// Never returns an error: failures are reported in the outcome so the
    /// caller can keep processing other files.
    #[tracing::instrument(
        skip_all,
        fields(test = %test.name, steps = test.steps.len(), api = self.api.name())
    )]
    pub async fn run(
        &self,
        test: &CompiledTest,
        session: &mut SessionContext,
        cancel: &CancelToken,
    ) -> ExecutionOutcome {
        let start = Instant::now();
        let mut outcome = ExecutionOutcome::default();

        let requests = match self.check_steps(test) {
            Ok(requests) => requests,
            Err(failure) => {
                outcome.failure = Some(failure);
                outcome.duration_ms = millis(start.elapsed());
                return outcome;
            }
        };

        let checkpoint_id = match self.ensure_checkpoint(test, session, cancel).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Could not prepare session context");
                outcome.failure = Some(ExecutionFailure::setup(&e));
                outcome.duration_ms = millis(start.elapsed());
                return outcome;
            }
        };

        for (index, (step, request)) in test.steps.iter().zip(&requests).enumerate() {
            let position = session.peek_position();
            let started = Instant::now();
            let result = self
                .guarded(cancel, self.api.create_step(checkpoint_id, request, position))
                .await;
            outcome.timings.push(StepTiming {
                index,
                command: step.command,
                position,
                duration_ms: millis(started.elapsed()),
                success: result.is_ok(),
            });

            match result {
                Ok(step_id) => {
                    session.get_next_position();
                    tracing::debug!(index, step_id, position, command = %step.command, "Step created");
                    outcome.step_ids.push(step_id);
                }
                Err(e) => {
                    tracing::warn!(index, command = %step.command, error = %e, "Step failed");
                    let screenshot = if self.options.screenshot_on_failure && !e.is_cancellation() {
                        self.screenshot(checkpoint_id, index, cancel).await
                    } else {
                        None
                    };
                    outcome.failure = Some(ExecutionFailure {
                        step: Some(index),
                        command: Some(step.command),
                        message: Error::step_failed(index, step.command.as_str(), &e.to_string())
                            .to_string(),
                        line: step.line,
                        screenshot,
                        cancelled: e.is_cancellation(),
                    });
                    break;
                }
            }
        }

        if outcome.success() && self.options.start_execution {
            match self.start_execution(session, cancel).await {
                Ok(id) => {
                    tracing::info!(execution_id = %id, "Execution started");
                    outcome.execution_id = Some(id);
                }
                Err(e) => outcome.failure = Some(ExecutionFailure::setup(&e)),
            }
        }

        outcome.duration_ms = millis(start.elapsed());
        tracing::info!(
            created = outcome.step_ids.len(),
            success = outcome.success(),
            duration_ms = outcome.duration_ms,
            "Test dispatched"
        );
        outcome
    }

    /// Turn every step into a request before anything is sent
    fn check_steps(&self, test: &CompiledTest) -> std::result::Result<Vec<StepRequest>, ExecutionFailure> {
        test.steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                StepRequest::from_compiled(step).map_err(|e| ExecutionFailure {
                    step: Some(index),
                    command: Some(step.command),
                    message: e.to_string(),
                    line: step.line,
                    screenshot: None,
                    cancelled: false,
                })
            })
            .collect()
    }

    /// Resolve the checkpoint, creating whatever is missing above it
    async fn ensure_checkpoint(
        &self,
        test: &CompiledTest,
        session: &mut SessionContext,
        cancel: &CancelToken,
    ) -> Result<u64> {
        if let Some(id) = session.checkpoint_id() {
            return Ok(id);
        }

        let goal_id = match session.goal_id() {
            Some(id) => id,
            None => {
                // Nothing is created for a test that cannot get a goal
                let url = test
                    .navigation_target
                    .as_deref()
                    .ok_or(Error::MissingContext("goal"))?;
                let project_id = match session.project_id() {
                    Some(id) => id,
                    None => {
                        let name = self.options.project_name.as_deref().unwrap_or(&test.name);
                        let id = self.guarded(cancel, self.api.create_project(name)).await?;
                        tracing::info!(project_id = id, name, "Created project");
                        session.set_project(id);
                        id
                    }
                };
                let goal = self
                    .guarded(cancel, self.api.create_goal(project_id, &test.name, url))
                    .await?;
                tracing::info!(goal_id = goal.goal_id, url, "Created goal");
                session.set_goal(goal.goal_id, goal.snapshot_id);
                goal.goal_id
            }
        };

        let snapshot_id = match session.snapshot_id() {
            Some(id) => id,
            None => self.guarded(cancel, self.api.goal_snapshot(goal_id)).await?,
        };

        let journey_id = match session.journey_id() {
            Some(id) => id,
            None => {
                if session.snapshot_id().is_none() {
                    session.set_goal(goal_id, Some(snapshot_id));
                }
                let id = self
                    .guarded(cancel, self.api.create_journey(goal_id, snapshot_id, &test.name))
                    .await?;
                tracing::info!(journey_id = id, "Created journey");
                session.set_journey(id);
                id
            }
        };

        let checkpoint_id = self
            .guarded(
                cancel,
                self.api.create_checkpoint(
                    journey_id,
                    goal_id,
                    snapshot_id,
                    &self.options.checkpoint_title,
                    1,
                ),
            )
            .await?;
        tracing::info!(checkpoint_id, journey_id, "Created checkpoint");
        session.set_checkpoint(checkpoint_id);
        Ok(checkpoint_id)
    }

    async fn start_execution(&self, session: &SessionContext, cancel: &CancelToken) -> Result<String> {
        let goal_id = session.goal_id().ok_or(Error::MissingContext("goal"))?;
        let snapshot_id = match session.snapshot_id() {
            Some(id) => id,
            None => self.guarded(cancel, self.api.goal_snapshot(goal_id)).await?,
        };
        self.guarded(cancel, self.api.execute_goal(goal_id, snapshot_id))
            .await
    }

    async fn screenshot(&self, checkpoint_id: u64, index: usize, cancel: &CancelToken) -> Option<String> {
        match self
            .guarded(cancel, self.api.capture_screenshot(checkpoint_id, index))
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(index, error = %e, "Screenshot capture failed");
                None
            }
        }
    }

    /// Race a remote call against cancellation and the per-call deadline
    ///
    /// The losing future is dropped, which aborts any request in flight.
    async fn guarded<T>(
        &self,
        cancel: &CancelToken,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(self.options.step_timeout, call) => {
                result.map_err(|_| Error::Timeout(self.options.step_timeout.as_secs()))?
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiCall, DryRunApi};
    use crate::compiler::compile;
    use crate::dialect::{Dialect, Document};

    fn login_test() -> CompiledTest {
        let doc = Document::parse(
            "test: Login\nnav: https://example.com\ndo:\n  - c: \"button.start\"\n  - ch: \"Success\"",
        )
        .unwrap();
        compile(&doc, Dialect::Compact).unwrap()
    }

    #[tokio::test]
    async fn test_lazily_creates_context_and_advances_position() {
        let api = Arc::new(DryRunApi::new());
        let orchestrator = Orchestrator::new(api.clone(), OrchestratorOptions::default());
        let mut session = SessionContext::default();

        let outcome = orchestrator
            .run(&login_test(), &mut session, &CancelToken::new())
            .await;

        assert!(outcome.success());
        assert_eq!(outcome.step_ids.len(), 2);
        assert_eq!(session.peek_position(), 3);
        assert!(session.checkpoint_id().is_some());

        let positions: Vec<u32> = api
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::CreateStep { position, .. } => Some(position),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_existing_checkpoint_is_reused() {
        let api = Arc::new(DryRunApi::new());
        let orchestrator = Orchestrator::new(api.clone(), OrchestratorOptions::default());
        let mut session = SessionContext::default();
        session.set_checkpoint(42);

        let outcome = orchestrator
            .run(&login_test(), &mut session, &CancelToken::new())
            .await;

        assert!(outcome.success());
        assert!(api
            .calls()
            .iter()
            .all(|call| matches!(call, ApiCall::CreateStep { checkpoint_id: 42, .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_sends_nothing() {
        let api = Arc::new(DryRunApi::new());
        let orchestrator = Orchestrator::new(api.clone(), OrchestratorOptions::default());
        let mut session = SessionContext::default();
        session.set_checkpoint(1);
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = orchestrator.run(&login_test(), &mut session, &cancel).await;

        let failure = outcome.failure.unwrap();
        assert!(failure.cancelled);
        assert_eq!(failure.step, Some(0));
        assert!(api.calls().is_empty());
        assert_eq!(session.peek_position(), 1);
    }

    #[tokio::test]
    async fn test_missing_navigation_target_fails_setup() {
        let doc = Document::parse("name: No URL\nsteps:\n  - click: Go").unwrap();
        let test = compile(&doc, Dialect::Simplified).unwrap();
        let api = Arc::new(DryRunApi::new());
        let orchestrator = Orchestrator::new(api.clone(), OrchestratorOptions::default());
        let mut session = SessionContext::default();

        let outcome = orchestrator.run(&test, &mut session, &CancelToken::new()).await;

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.step, None);
        assert!(failure.message.contains("goal"));
        // No orphan project is left behind
        assert!(session.project_id().is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_execution_records_id() {
        let options = OrchestratorOptions {
            start_execution: true,
            ..OrchestratorOptions::default()
        };
        let orchestrator = Orchestrator::new(Arc::new(DryRunApi::new()), options);
        let mut session = SessionContext::default();

        let outcome = orchestrator
            .run(&login_test(), &mut session, &CancelToken::new())
            .await;

        assert!(outcome.execution_id.unwrap().starts_with("dry-run-"));
    }
}
