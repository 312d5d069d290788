use std::time::Duration;

use thiserror::Error;

use crate::domain::{AccountId, Cents};
use crate::storage::{ConstraintKind, StoreError};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// The operation failed and so did the rollback. Both causes are kept.
    #[error("{source}; rollback also failed: {rollback}")]
    Rollback {
        source: Box<LedgerError>,
        rollback: sqlx::Error,
    },

    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("After-create hook failed: {0}")]
    Hook(#[source] anyhow::Error),

    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(Cents),

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(AccountId),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Account {account_id} holds {actual}, expected {expected}")]
    CurrencyMismatch {
        account_id: AccountId,
        expected: String,
        actual: String,
    },
}

impl LedgerError {
    /// The error that caused a failed rollback, or `self`.
    pub fn root(&self) -> &LedgerError {
        match self {
            LedgerError::Rollback { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for duplicate username/email and other unique-key collisions.
    pub fn is_unique_violation(&self) -> bool {
        self.constraint_kind() == Some(ConstraintKind::Unique)
    }

    /// True when a row references a missing user or account.
    pub fn is_foreign_key_violation(&self) -> bool {
        self.constraint_kind() == Some(ConstraintKind::ForeignKey)
    }

    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self.root() {
            LedgerError::Store(err) => err.constraint_kind(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            LedgerError::Store(StoreError::NotFound { .. })
                | LedgerError::AccountNotFound(_)
                | LedgerError::UserNotFound(_)
        )
    }

    pub fn is_hook_failure(&self) -> bool {
        matches!(self.root(), LedgerError::Hook(_))
    }
}
