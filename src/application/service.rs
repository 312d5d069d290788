use tracing::info;

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, Cents, Entry, IntegrityReport, NewAccount, NewUser, Transfer,
    TransferParams, TransferResult, User, UserUpdate, build_integrity_report,
};
use crate::storage::Store;

use super::{
    AfterCreateHook, CreateUserOperation, LedgerError, TransferOperation, UnitOfWorkExecutor,
    no_hook,
};

/// Application service providing the ledger's entry points.
/// This is the primary interface for any client (CLI, API, workers).
#[derive(Clone)]
pub struct LedgerService {
    store: Store,
    executor: UnitOfWorkExecutor,
}

impl LedgerService {
    /// Create a ledger service over an existing store.
    pub fn new(store: Store, config: &LedgerConfig) -> Self {
        let executor = UnitOfWorkExecutor::new(store.clone()).with_timeout(config.operation_timeout);
        Self { store, executor }
    }

    /// Connect and run migrations.
    pub async fn init(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let store = Store::init(config).await?;
        Ok(Self::new(store, config))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let store = Store::connect(config).await?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn executor(&self) -> &UnitOfWorkExecutor {
        &self.executor
    }

    // ========================
    // Transfer operations
    // ========================

    /// Move `amount` from one account to another atomically.
    ///
    /// Inputs are not validated: the caller guarantees both accounts exist,
    /// share a currency and that `amount` is positive. Balances may go
    /// negative. See [`validated_transfer`](Self::validated_transfer) for
    /// the checked variant.
    pub async fn transfer_funds(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
    ) -> Result<TransferResult, LedgerError> {
        let params = TransferParams::new(from_account_id, to_account_id, amount);
        let result = self.executor.execute(TransferOperation::new(params)).await?;

        info!(
            transfer_id = result.transfer.id,
            from_account = from_account_id,
            to_account = to_account_id,
            amount,
            "transfer committed"
        );
        Ok(result)
    }

    /// Check the caller-side preconditions, then transfer.
    ///
    /// When `currency` is given, both accounts must hold it; otherwise they
    /// must hold the same one. There is no overdraft check.
    pub async fn validated_transfer(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
        currency: Option<&str>,
    ) -> Result<TransferResult, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if from_account_id == to_account_id {
            return Err(LedgerError::SameAccount(from_account_id));
        }

        let from_account = self.get_account(from_account_id).await?;
        let to_account = self.get_account(to_account_id).await?;

        let expected = currency.unwrap_or(&from_account.currency);
        for account in [&from_account, &to_account] {
            if account.currency != expected {
                return Err(LedgerError::CurrencyMismatch {
                    account_id: account.id,
                    expected: expected.to_string(),
                    actual: account.currency.clone(),
                });
            }
        }

        self.transfer_funds(from_account_id, to_account_id, amount)
            .await
    }

    /// List transfers sent or received by an account.
    pub async fn list_transfers(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>, LedgerError> {
        Ok(self.store.list_transfers(account_id, limit, offset).await?)
    }

    // ========================
    // User operations
    // ========================

    /// Create a user and run `hook` in the same unit of work.
    ///
    /// If the hook fails the user row is rolled back. A duplicate username
    /// or email fails with a unique violation
    /// ([`LedgerError::is_unique_violation`]).
    pub async fn create_user_with_hook<H: AfterCreateHook>(
        &self,
        params: NewUser,
        hook: H,
    ) -> Result<User, LedgerError> {
        let user = self
            .executor
            .execute(CreateUserOperation::new(params, hook))
            .await?;

        info!(username = %user.username, "user created");
        Ok(user)
    }

    /// Create a user with no after-create side effect.
    pub async fn create_user(&self, params: NewUser) -> Result<User, LedgerError> {
        self.create_user_with_hook(params, no_hook).await
    }

    pub async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        self.store
            .get_user(username)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
    }

    pub async fn update_user(
        &self,
        username: &str,
        update: UserUpdate,
    ) -> Result<User, LedgerError> {
        if update.is_empty() {
            return self.get_user(username).await;
        }
        self.store
            .update_user(username, &update)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
    }

    // ========================
    // Account operations
    // ========================

    /// Open an account. The owner must exist, and owns at most one account
    /// per currency.
    pub async fn create_account(&self, params: NewAccount) -> Result<Account, LedgerError> {
        let account = self.store.create_account(&params).await?;
        info!(
            account_id = account.id,
            owner = %account.owner,
            currency = %account.currency,
            "account created"
        );
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .get_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    pub async fn list_accounts(
        &self,
        owner: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts(owner, limit, offset).await?)
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, LedgerError> {
        Ok(self.store.list_entries(account_id, limit, offset).await?)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check that entries balance to zero and agree with the transfers table.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let stats = self.store.integrity_stats().await?;
        Ok(build_integrity_report(
            stats.account_count,
            &stats.transfers,
            stats.entry_count,
            &stats.entry_totals,
        ))
    }
}
