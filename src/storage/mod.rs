mod error;
mod queries;
mod repository;
mod unit_of_work;

pub use error::*;
pub use repository::*;
pub use unit_of_work::*;

/// SQL migration for the initial schema: users, accounts, entries, transfers
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
