//! Unit-of-work executor: runs one operation inside one database transaction.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::storage::{Store, UnitOfWork};

use super::LedgerError;

/// A piece of business logic that must run atomically.
///
/// The executor injects a transaction-scoped [`UnitOfWork`]; everything the
/// operation writes through it is committed together or not at all.
/// Operations are consumed by the run, so each value executes at most once.
#[async_trait]
pub trait Operation: Send {
    type Output: Send;

    /// Short name used in log records.
    fn name(&self) -> &'static str;

    async fn run(self, uow: &mut UnitOfWork) -> Result<Self::Output, LedgerError>;
}

/// Opens a transaction per operation and commits or rolls it back.
///
/// Never retries: a failed operation is reported to the caller as-is.
#[derive(Clone)]
pub struct UnitOfWorkExecutor {
    store: Store,
    timeout: Option<Duration>,
}

impl UnitOfWorkExecutor {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Abort and roll back any operation still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run `op` in a fresh transaction.
    ///
    /// On success the transaction is committed and the operation's output
    /// returned. On failure (including timeout) it is rolled back; if the
    /// rollback fails too, the returned [`LedgerError::Rollback`] carries both
    /// errors.
    pub async fn execute<O: Operation>(&self, op: O) -> Result<O::Output, LedgerError> {
        let name = op.name();
        let mut uow = self.store.begin().await.map_err(LedgerError::Begin)?;
        debug!(operation = name, "transaction started");

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, op.run(&mut uow))
                .await
                .unwrap_or(Err(LedgerError::TimedOut(limit))),
            None => op.run(&mut uow).await,
        };

        match outcome {
            Ok(output) => {
                uow.commit().await.map_err(LedgerError::Commit)?;
                debug!(operation = name, "transaction committed");
                Ok(output)
            }
            Err(err) => {
                warn!(operation = name, error = %err, "operation failed, rolling back");
                if let Err(rollback) = uow.rollback().await {
                    error!(
                        operation = name,
                        error = %err,
                        rollback_error = %rollback,
                        "rollback failed"
                    );
                    return Err(LedgerError::Rollback {
                        source: Box::new(err),
                        rollback,
                    });
                }
                Err(err)
            }
        }
    }
}
