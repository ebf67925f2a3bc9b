//! Completion polling for Compute Engine tasks.
//!
//! The outer loop here budgets how long the pipeline waits for a
//! server-side task to reach a terminal state. Each individual status
//! fetch already carries the inner transport retry inside
//! [`crate::client::ServerClient`], so a single 5xx never consumes one of
//! the "is the job done yet" attempts; only a blip that turned persistent
//! surfaces here, as [`PollError::Fetch`].

use crate::client::{ServerClient, ServerError};
use crate::models::{CeTask, TaskStatus};
use async_trait::async_trait;
use gatewatch_core::GatewatchError;
use std::time::Duration;
use thiserror::Error;

/// Outer completion-poll policy: attempt budget and fixed cadence.
///
/// There is no cancellation signal; callers size
/// `max_attempts x delay` to their acceptable wall-clock bound and treat
/// the timeout as reportable, not fatal.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Completion polls before giving up
    pub max_attempts: u32,
    /// Fixed delay between polls (no exponential growth)
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            delay: Duration::from_millis(5000),
        }
    }
}

/// Poll outcomes that are not a successful task.
#[derive(Debug, Error)]
pub enum PollError {
    /// Budget exhausted while the task stayed non-terminal. Soft outcome:
    /// report it, omit the section, do not fail the build.
    #[error("task {task_id} still not complete after {attempts} status polls")]
    Timeout {
        /// Polled task id
        task_id: String,
        /// Polls spent
        attempts: u32,
    },

    /// The server reported the task failed or canceled; raised on the
    /// first such status without consuming further attempts.
    #[error("task {task_id} finished as {status}: {message}")]
    TaskFailed {
        /// Polled task id
        task_id: String,
        /// Terminal status (`FAILED` or `CANCELED`)
        status: TaskStatus,
        /// Server error message, or a placeholder
        message: String,
    },

    /// Could not fetch the task status even after the inner transport
    /// retries. Distinct from [`PollError::Timeout`].
    #[error("could not fetch task status: {0}")]
    Fetch(#[from] ServerError),
}

impl From<PollError> for GatewatchError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Timeout { task_id, attempts } => {
                GatewatchError::Timeout { task_id, attempts }
            }
            PollError::TaskFailed {
                task_id,
                status,
                message,
            } => GatewatchError::TaskFailed {
                task_id,
                status: status.to_string(),
                message,
            },
            PollError::Fetch(inner) => GatewatchError::Transport(inner.to_string()),
        }
    }
}

/// Source of task status snapshots. Implemented by [`ServerClient`];
/// tests script it with canned sequences.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Fetch the current snapshot of a task.
    async fn fetch_task(&self, task_id: &str) -> Result<CeTask, ServerError>;
}

#[async_trait]
impl TaskSource for ServerClient {
    async fn fetch_task(&self, task_id: &str) -> Result<CeTask, ServerError> {
        ServerClient::fetch_task(self, task_id).await
    }
}

/// Poll a task until it reaches a terminal state or the budget runs out.
///
/// Returns the task on `SUCCESS`. Fails with [`PollError::TaskFailed`]
/// immediately on `FAILED`/`CANCELED` and with [`PollError::Timeout`]
/// once `max_attempts` non-terminal snapshots have been observed.
pub async fn wait_for_completion(
    source: &dyn TaskSource,
    task_id: &str,
    policy: &PollPolicy,
) -> Result<CeTask, PollError> {
    for attempt in 1..=policy.max_attempts {
        let task = source.fetch_task(task_id).await?;

        match task.status {
            TaskStatus::Success => {
                tracing::info!(task_id, attempt, "task completed");
                return Ok(task);
            }
            TaskStatus::Failed | TaskStatus::Canceled => {
                return Err(PollError::TaskFailed {
                    task_id: task_id.to_string(),
                    status: task.status,
                    message: task
                        .error_message
                        .unwrap_or_else(|| "no error message provided".to_string()),
                });
            }
            TaskStatus::Pending | TaskStatus::InProgress => {
                tracing::debug!(
                    task_id,
                    attempt,
                    max_attempts = policy.max_attempts,
                    status = %task.status,
                    "task not finished yet"
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(PollError::Timeout {
        task_id: task_id.to_string(),
        attempts: policy.max_attempts,
    })
}
