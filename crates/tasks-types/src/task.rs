//! Task types

use serde::{Deserialize, Serialize};

/// A task as it is persisted and returned to callers.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub created_at_ms: i64,
    pub ends_at_ms: i64,
    pub completed: bool,
}

impl Task {
    /// Builds a task that has not been completed yet
    pub fn new(id: i64, description: impl Into<String>, created_at_ms: i64, ends_at_ms: i64) -> Self {
        Self {
            id,
            description: description.into(),
            created_at_ms,
            ends_at_ms,
            completed: false,
        }
    }
}

/// Request body used to create or replace a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaskRequest {
    pub description: String,
    pub ends_at_ms: i64,
    /// Ignored on create
    #[serde(default)]
    pub completed: bool,
}

impl NewTaskRequest {
    pub fn new(description: impl Into<String>, ends_at_ms: i64) -> Self {
        Self {
            description: description.into(),
            ends_at_ms,
            completed: false,
        }
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }
}
