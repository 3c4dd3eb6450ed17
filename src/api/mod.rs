//! Step Execution API
//!
//! The orchestrator talks to the remote platform only through [`StepApi`].
//! [`HttpStepApi`] is the real REST client; [`DryRunApi`] records calls in
//! memory for `run --dry-run` and for tests.

mod dry_run;
mod http;
mod request;

pub use dry_run::{ApiCall, DryRunApi};
pub use http::HttpStepApi;
pub use request::StepRequest;

use async_trait::async_trait;

use crate::common::Result;

/// Goal created on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedGoal {
    pub goal_id: u64,
    /// Present when the platform returned it with the goal
    pub snapshot_id: Option<u64>,
}

/// Remote operations the orchestrator depends on
///
/// Implementations own transport concerns, including any retries; an error
/// returned from here is final for the call that produced it.
#[async_trait]
pub trait StepApi: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn create_project(&self, name: &str) -> Result<u64>;

    async fn create_goal(&self, project_id: u64, name: &str, url: &str) -> Result<CreatedGoal>;

    /// Latest snapshot of a goal
    async fn goal_snapshot(&self, goal_id: u64) -> Result<u64>;

    async fn create_journey(&self, goal_id: u64, snapshot_id: u64, name: &str) -> Result<u64>;

    /// Create a checkpoint and attach it to `journey_id` at `position`
    async fn create_checkpoint(
        &self,
        journey_id: u64,
        goal_id: u64,
        snapshot_id: u64,
        title: &str,
        position: u32,
    ) -> Result<u64>;

    /// Insert one step into a checkpoint; returns the new step id
    async fn create_step(
        &self,
        checkpoint_id: u64,
        request: &StepRequest,
        position: u32,
    ) -> Result<u64>;

    /// Start a platform execution of the goal; returns the execution id
    async fn execute_goal(&self, goal_id: u64, snapshot_id: u64) -> Result<String>;

    /// Diagnostic artifact for a failed step, if the platform offers one
    async fn capture_screenshot(
        &self,
        _checkpoint_id: u64,
        _step_index: usize,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}
