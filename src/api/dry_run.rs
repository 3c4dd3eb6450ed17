//! In-memory [`StepApi`] that allocates ids and records calls

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{CreatedGoal, StepApi, StepRequest};
use crate::common::Result;

/// A call received by [`DryRunApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateProject { name: String },
    CreateGoal { project_id: u64, name: String, url: String },
    CreateJourney { goal_id: u64, snapshot_id: u64, name: String },
    CreateCheckpoint { journey_id: u64, title: String, position: u32 },
    CreateStep { checkpoint_id: u64, request: StepRequest, position: u32 },
    ExecuteGoal { goal_id: u64, snapshot_id: u64 },
}

/// Nothing leaves the process; every id is drawn from one counter
#[derive(Debug, Default)]
pub struct DryRunApi {
    next_id: AtomicU64,
    calls: Mutex<Vec<ApiCall>>,
}

impl DryRunApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the calls made so far
    pub fn calls(&self) -> Vec<ApiCall> {
        self.recorded().clone()
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn recorded(&self) -> MutexGuard<'_, Vec<ApiCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: ApiCall) {
        self.recorded().push(call);
    }
}

#[async_trait]
impl StepApi for DryRunApi {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn create_project(&self, name: &str) -> Result<u64> {
        self.record(ApiCall::CreateProject {
            name: name.to_string(),
        });
        Ok(self.allocate())
    }

    async fn create_goal(&self, project_id: u64, name: &str, url: &str) -> Result<CreatedGoal> {
        self.record(ApiCall::CreateGoal {
            project_id,
            name: name.to_string(),
            url: url.to_string(),
        });
        Ok(CreatedGoal {
            goal_id: self.allocate(),
            snapshot_id: Some(self.allocate()),
        })
    }

    async fn goal_snapshot(&self, _goal_id: u64) -> Result<u64> {
        Ok(self.allocate())
    }

    async fn create_journey(&self, goal_id: u64, snapshot_id: u64, name: &str) -> Result<u64> {
        self.record(ApiCall::CreateJourney {
            goal_id,
            snapshot_id,
            name: name.to_string(),
        });
        Ok(self.allocate())
    }

    async fn create_checkpoint(
        &self,
        journey_id: u64,
        _goal_id: u64,
        _snapshot_id: u64,
        title: &str,
        position: u32,
    ) -> Result<u64> {
        self.record(ApiCall::CreateCheckpoint {
            journey_id,
            title: title.to_string(),
            position,
        });
        Ok(self.allocate())
    }

    async fn create_step(
        &self,
        checkpoint_id: u64,
        request: &StepRequest,
        position: u32,
    ) -> Result<u64> {
        tracing::debug!(checkpoint_id, position, kind = %request.kind(), "Dry-run step");
        self.record(ApiCall::CreateStep {
            checkpoint_id,
            request: request.clone(),
            position,
        });
        Ok(self.allocate())
    }

    async fn execute_goal(&self, goal_id: u64, snapshot_id: u64) -> Result<String> {
        self.record(ApiCall::ExecuteGoal {
            goal_id,
            snapshot_id,
        });
        Ok(format!("dry-run-{}", self.allocate()))
    }
}
