//! Session context
//!
//! Tracks which project, goal, journey and checkpoint API calls are scoped
//! to, and the position the next step is inserted at. Setting a coarser
//! identifier always clears every finer one and resets the position to 1.
//! The context is an explicit value: each run owns one and nothing reads it
//! through global state. Persistence happens only through [`SessionContext::save`]
//! and [`SessionContext::load`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::paths::ensure_parent;
use crate::common::{Error, Result};

/// Current location inside the platform hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    project_id: Option<u64>,
    #[serde(default)]
    goal_id: Option<u64>,
    #[serde(default)]
    snapshot_id: Option<u64>,
    #[serde(default)]
    journey_id: Option<u64>,
    #[serde(default)]
    checkpoint_id: Option<u64>,
    #[serde(default = "first_position")]
    next_position: u32,
    #[serde(default = "default_auto_increment")]
    auto_increment: bool,
}

fn first_position() -> u32 {
    1
}

fn default_auto_increment() -> bool {
    true
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SessionContext {
    pub fn new(auto_increment: bool) -> Self {
        Self {
            project_id: None,
            goal_id: None,
            snapshot_id: None,
            journey_id: None,
            checkpoint_id: None,
            next_position: first_position(),
            auto_increment,
        }
    }

    pub fn project_id(&self) -> Option<u64> {
        self.project_id
    }

    pub fn goal_id(&self) -> Option<u64> {
        self.goal_id
    }

    pub fn snapshot_id(&self) -> Option<u64> {
        self.snapshot_id
    }

    pub fn journey_id(&self) -> Option<u64> {
        self.journey_id
    }

    pub fn checkpoint_id(&self) -> Option<u64> {
        self.checkpoint_id
    }

    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn set_auto_increment(&mut self, enabled: bool) {
        self.auto_increment = enabled;
    }

    /// Select a project; clears goal, snapshot, journey and checkpoint
    pub fn set_project(&mut self, id: u64) {
        self.project_id = Some(id);
        self.goal_id = None;
        self.snapshot_id = None;
        self.journey_id = None;
        self.checkpoint_id = None;
        self.next_position = first_position();
    }

    /// Select a goal and its snapshot; clears journey and checkpoint
    pub fn set_goal(&mut self, id: u64, snapshot_id: Option<u64>) {
        self.goal_id = Some(id);
        self.snapshot_id = snapshot_id;
        self.journey_id = None;
        self.checkpoint_id = None;
        self.next_position = first_position();
    }

    /// Select a journey; clears checkpoint
    pub fn set_journey(&mut self, id: u64) {
        self.journey_id = Some(id);
        self.checkpoint_id = None;
        self.next_position = first_position();
    }

    /// Select a checkpoint; steps are inserted from position 1
    pub fn set_checkpoint(&mut self, id: u64) {
        self.checkpoint_id = Some(id);
        self.next_position = first_position();
    }

    /// Position the next step would use, without advancing
    pub fn peek_position(&self) -> u32 {
        self.next_position
    }

    /// Return the current position and, with auto-increment on, advance it
    ///
    /// This is the only place the position moves forward on its own.
    pub fn get_next_position(&mut self) -> u32 {
        let position = self.next_position;
        if self.auto_increment {
            self.next_position += 1;
        }
        position
    }

    /// Explicitly override the next position
    pub fn set_next_position(&mut self, position: u32) -> Result<()> {
        if position == 0 {
            return Err(Error::Config(
                "step positions start at 1".to_string(),
            ));
        }
        self.next_position = position;
        Ok(())
    }

    /// Reset every identifier and the position; auto-increment is kept
    pub fn clear(&mut self) {
        *self = Self::new(self.auto_increment);
    }

    /// Context for a parallel worker
    ///
    /// Project, goal and snapshot are shared; journey and checkpoint are
    /// not, so each worker creates its own and starts at position 1.
    pub fn fork_for_worker(&self) -> Self {
        Self {
            project_id: self.project_id,
            goal_id: self.goal_id,
            snapshot_id: self.snapshot_id,
            journey_id: None,
            checkpoint_id: None,
            next_position: first_position(),
            auto_increment: self.auto_increment,
        }
    }

    /// Checkpoint all step calls are scoped to
    pub fn require_checkpoint(&self) -> Result<u64> {
        self.checkpoint_id.ok_or(Error::MissingContext("checkpoint"))
    }

    /// Write the context as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "Saved session");
        Ok(())
    }

    /// Read a context saved with [`SessionContext::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let mut session: Self = serde_json::from_str(&content)?;
        session.next_position = session.next_position.max(first_position());
        Ok(session)
    }

    /// Load a saved context, or start fresh when none exists
    pub fn load_or_default(path: &Path, auto_increment: bool) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(auto_increment))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> SessionContext {
        let mut session = SessionContext::default();
        session.set_project(1);
        session.set_goal(2, Some(3));
        session.set_journey(4);
        session.set_checkpoint(5);
        session
    }

    #[test]
    fn test_set_goal_after_checkpoint_clears_and_resets() {
        let mut session = populated();
        session.get_next_position();
        session.get_next_position();
        assert_eq!(session.peek_position(), 3);

        session.set_goal(9, None);
        assert_eq!(session.checkpoint_id(), None);
        assert_eq!(session.journey_id(), None);
        assert_eq!(session.project_id(), Some(1));
        assert_eq!(session.peek_position(), 1);
    }

    #[test]
    fn test_set_project_clears_everything_below() {
        let mut session = populated();
        session.set_project(7);
        assert_eq!(session.goal_id(), None);
        assert_eq!(session.snapshot_id(), None);
        assert_eq!(session.journey_id(), None);
        assert_eq!(session.checkpoint_id(), None);
    }

    #[test]
    fn test_set_journey_clears_checkpoint_only() {
        let mut session = populated();
        session.set_journey(8);
        assert_eq!(session.goal_id(), Some(2));
        assert_eq!(session.snapshot_id(), Some(3));
        assert_eq!(session.checkpoint_id(), None);
    }

    #[test]
    fn test_get_next_position_increments() {
        let mut session = SessionContext::default();
        let first = session.get_next_position();
        let second = session.get_next_position();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_no_increment_when_disabled() {
        let mut session = SessionContext::new(false);
        assert_eq!(session.get_next_position(), 1);
        assert_eq!(session.get_next_position(), 1);
    }

    #[test]
    fn test_set_next_position_rejects_zero() {
        let mut session = SessionContext::default();
        assert!(session.set_next_position(0).is_err());
        session.set_next_position(5).unwrap();
        assert_eq!(session.peek_position(), 5);
    }

    #[test]
    fn test_clear_keeps_auto_increment() {
        let mut session = populated();
        session.set_auto_increment(false);
        session.clear();
        assert_eq!(session, SessionContext::new(false));
    }

    #[test]
    fn test_fork_for_worker() {
        let mut session = populated();
        session.get_next_position();
        let fork = session.fork_for_worker();
        assert_eq!(fork.goal_id(), Some(2));
        assert_eq!(fork.snapshot_id(), Some(3));
        assert_eq!(fork.journey_id(), None);
        assert_eq!(fork.checkpoint_id(), None);
        assert_eq!(fork.peek_position(), 1);
    }

    #[test]
    fn test_require_checkpoint() {
        let session = SessionContext::default();
        assert!(matches!(
            session.require_checkpoint(),
            Err(Error::MissingContext("checkpoint"))
        ));
        assert_eq!(populated().require_checkpoint().unwrap(), 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let mut session = populated();
        session.get_next_position();
        session.save(&path).unwrap();

        let loaded = SessionContext::load(&path).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionContext::load_or_default(&dir.path().join("missing.json"), true).unwrap();
        assert_eq!(session, SessionContext::default());
    }
}
