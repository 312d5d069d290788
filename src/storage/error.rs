use std::fmt;

use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLite primary result code for constraint failures. Extended codes carry
/// it in their low byte.
const SQLITE_CONSTRAINT: i32 = 19;

/// Which kind of integrity constraint the store rejected a write with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
    /// Any other constraint failure, e.g. a trigger aborting the statement
    Other,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
            ConstraintKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{kind} constraint violation: {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },

    #[error("Invalid stored value: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            StoreError::Constraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match err {
            sqlx::Error::Database(db_err) => db_err,
            other => return StoreError::Database(other),
        };

        let kind = match db_err.kind() {
            ErrorKind::UniqueViolation => ConstraintKind::Unique,
            ErrorKind::ForeignKeyViolation => ConstraintKind::ForeignKey,
            ErrorKind::NotNullViolation => ConstraintKind::NotNull,
            ErrorKind::CheckViolation => ConstraintKind::Check,
            _ => {
                let is_constraint = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .is_some_and(|code| code & 0xff == SQLITE_CONSTRAINT);
                if !is_constraint {
                    return StoreError::Database(sqlx::Error::Database(db_err));
                }
                ConstraintKind::Other
            }
        };

        StoreError::Constraint {
            kind,
            message: db_err.message().to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
