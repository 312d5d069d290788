use std::collections::HashMap;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::debug;

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, Cents, Entry, EntryId, NewAccount, NewUser, Transfer, TransferId, User,
    UserUpdate,
};

use super::queries::{self, Table};
use super::{MIGRATION_001_INITIAL, StoreResult, UnitOfWork};

/// Row counts and per-account entry totals used by the integrity check.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub entry_count: i64,
    pub entry_totals: HashMap<AccountId, Cents>,
    pub transfers: Vec<Transfer>,
}

/// The ledger store: a SQLite connection pool plus single-row access to
/// users, accounts, entries and transfers.
///
/// Methods on `Store` run in autocommit mode. Multi-row atomic work goes
/// through a [`UnitOfWork`] opened by the unit-of-work executor.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a connection pool for the configured database.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(config: &LedgerConfig) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        debug!(
            database_url = %config.database_url,
            max_connections = config.max_connections,
            "connected to ledger store"
        );
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(config: &LedgerConfig) -> StoreResult<Self> {
        let store = Self::connect(config).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// The underlying pool, for maintenance statements outside the ledger API.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<UnitOfWork, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(UnitOfWork::new(tx))
    }

    // ========================
    // User operations
    // ========================

    pub async fn create_user(&self, params: &NewUser) -> StoreResult<User> {
        queries::insert_user(&self.pool, params).await
    }

    pub async fn get_user(&self, username: &str) -> StoreResult<Option<User>> {
        queries::fetch_user(&self.pool, username).await
    }

    pub async fn update_user(
        &self,
        username: &str,
        update: &UserUpdate,
    ) -> StoreResult<Option<User>> {
        queries::update_user(&self.pool, username, update).await
    }

    // ========================
    // Account operations
    // ========================

    pub async fn create_account(&self, params: &NewAccount) -> StoreResult<Account> {
        queries::insert_account(&self.pool, params).await
    }

    pub async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        queries::fetch_account(&self.pool, id).await
    }

    /// List accounts owned by `owner`, ordered by id.
    pub async fn list_accounts(
        &self,
        owner: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Account>> {
        queries::list_accounts(&self.pool, owner, limit, offset).await
    }

    pub async fn set_account_balance(&self, id: AccountId, balance: Cents) -> StoreResult<Account> {
        queries::set_account_balance(&self.pool, id, balance).await
    }

    pub async fn add_account_balance(&self, id: AccountId, delta: Cents) -> StoreResult<Account> {
        queries::add_account_balance(&self.pool, id, delta).await
    }

    pub async fn delete_account(&self, id: AccountId) -> StoreResult<()> {
        queries::delete_account(&self.pool, id).await
    }

    // ========================
    // Entry and transfer operations
    // ========================

    pub async fn get_entry(&self, id: EntryId) -> StoreResult<Option<Entry>> {
        queries::fetch_entry(&self.pool, id).await
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Entry>> {
        queries::list_entries(&self.pool, account_id, limit, offset).await
    }

    pub async fn get_transfer(&self, id: TransferId) -> StoreResult<Option<Transfer>> {
        queries::fetch_transfer(&self.pool, id).await
    }

    /// List transfers sent or received by an account, ordered by id.
    pub async fn list_transfers(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Transfer>> {
        queries::list_transfers(&self.pool, account_id, limit, offset).await
    }

    // ========================
    // Integrity
    // ========================

    pub async fn integrity_stats(&self) -> StoreResult<IntegrityStats> {
        Ok(IntegrityStats {
            account_count: queries::count_rows(&self.pool, Table::Accounts).await?,
            entry_count: queries::count_rows(&self.pool, Table::Entries).await?,
            entry_totals: queries::entry_totals(&self.pool).await?,
            transfers: queries::all_transfers(&self.pool).await?,
        })
    }

    pub async fn count_transfers(&self) -> StoreResult<i64> {
        queries::count_rows(&self.pool, Table::Transfers).await
    }
}
