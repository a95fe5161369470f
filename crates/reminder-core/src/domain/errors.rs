//! Errors - コンポーネントごとのエラー型
//!
//! 各コンポーネントは狭いエラー enum を持ち、`ReminderError` がそれらを
//! まとめます（service, CLI 向け）。
//!
//! 配送失敗はここに含めません。dispatcher の外には出ず、
//! `DispatchResult` として報告されます。

use std::path::PathBuf;

use thiserror::Error;

use super::ids::TaskId;
use crate::config::ConfigError;

/// Validation failure for a task submitted to the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid deadline {input:?}: expected YYYY-MM-DD")]
    InvalidDeadline { input: String },
}

/// Task store failure. Any error means the operation was not applied.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Durable read or write failed (I/O, permissions, malformed file).
    #[error("persistence failure at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("position {position} is out of range (len {len})")]
    OutOfRange { position: usize, len: usize },

    #[error("task not found: {0}")]
    NotFound(TaskId),
}

impl StoreError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Scheduler failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("scheduler is shut down")]
    ShutDown,
}

/// Umbrella error for the reminder flow.
#[derive(Debug, Error)]
pub enum ReminderError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ReminderError>;
