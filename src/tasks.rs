//! Background task declarations tied to ledger writes.
//!
//! Queue transport is external: anything implementing [`TaskDistributor`]
//! can carry the tasks. [`VerifyEmailHook`] plugs the verification-email
//! task into user creation, so a user exists only if its task was accepted.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::AfterCreateHook;
use crate::domain::User;
use crate::storage::UnitOfWork;

pub const TASK_VERIFY_EMAIL: &str = "task:verify_email";

pub const QUEUE_CRITICAL: &str = "critical";
pub const QUEUE_DEFAULT: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadVerifyEmail {
    pub username: String,
}

/// Delivery options handed to the queue with each task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOptions {
    pub queue: String,
    pub max_retry: u32,
    /// Delay before a worker may pick the task up. Workers look the user up,
    /// so this should exceed the time the creating transaction takes to commit.
    pub process_in: Duration,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            queue: QUEUE_CRITICAL.to_string(),
            max_retry: 10,
            process_in: Duration::from_secs(10),
        }
    }
}

/// Submits tasks to a background queue.
#[async_trait]
pub trait TaskDistributor: Send + Sync {
    async fn enqueue(
        &self,
        task_type: &str,
        payload: Vec<u8>,
        options: &TaskOptions,
    ) -> anyhow::Result<()>;
}

/// Distributor for setups without a queue: logs each task and drops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDistributor;

#[async_trait]
impl TaskDistributor for LoggingDistributor {
    async fn enqueue(
        &self,
        task_type: &str,
        payload: Vec<u8>,
        options: &TaskOptions,
    ) -> anyhow::Result<()> {
        info!(
            task_type,
            queue = %options.queue,
            payload = %String::from_utf8_lossy(&payload),
            "task not delivered: no queue configured"
        );
        Ok(())
    }
}

/// After-create hook that enqueues a verification email for the new user.
pub struct VerifyEmailHook<D> {
    distributor: D,
    options: TaskOptions,
}

impl<D: TaskDistributor> VerifyEmailHook<D> {
    pub fn new(distributor: D) -> Self {
        Self {
            distributor,
            options: TaskOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl<D: TaskDistributor> AfterCreateHook for VerifyEmailHook<D> {
    async fn after_create(&self, _uow: &mut UnitOfWork, user: &User) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&PayloadVerifyEmail {
            username: user.username.clone(),
        })
        .context("failed to encode verify-email payload")?;

        self.distributor
            .enqueue(TASK_VERIFY_EMAIL, payload, &self.options)
            .await
            .context("failed to enqueue verify-email task")?;

        info!(
            username = %user.username,
            queue = %self.options.queue,
            max_retry = self.options.max_retry,
            "enqueued verify-email task"
        );
        Ok(())
    }
}
