use sqlx::{Sqlite, Transaction};

use crate::domain::{
    Account, AccountId, Cents, Entry, EntryId, NewAccount, NewUser, Transfer, TransferId, User,
    UserUpdate,
};

use super::{StoreResult, queries};

/// Transaction-scoped view of the ledger store.
///
/// Exposes the same row operations as [`Store`](super::Store), but every
/// statement runs inside one open database transaction. Only the unit-of-work
/// executor can open, commit or roll back a `UnitOfWork`; operations borrow it
/// mutably for the duration of their run and cannot keep it.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub(crate) async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    pub(crate) async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }

    // ========================
    // Users
    // ========================

    pub async fn create_user(&mut self, params: &NewUser) -> StoreResult<User> {
        queries::insert_user(&mut *self.tx, params).await
    }

    pub async fn get_user(&mut self, username: &str) -> StoreResult<Option<User>> {
        queries::fetch_user(&mut *self.tx, username).await
    }

    pub async fn update_user(
        &mut self,
        username: &str,
        update: &UserUpdate,
    ) -> StoreResult<Option<User>> {
        queries::update_user(&mut *self.tx, username, update).await
    }

    // ========================
    // Accounts
    // ========================

    pub async fn create_account(&mut self, params: &NewAccount) -> StoreResult<Account> {
        queries::insert_account(&mut *self.tx, params).await
    }

    pub async fn get_account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        queries::fetch_account(&mut *self.tx, id).await
    }

    pub async fn set_account_balance(
        &mut self,
        id: AccountId,
        balance: Cents,
    ) -> StoreResult<Account> {
        queries::set_account_balance(&mut *self.tx, id, balance).await
    }

    /// Add `delta` to the balance and return the updated account.
    /// Fails with `NotFound` if the account does not exist.
    pub async fn add_account_balance(&mut self, id: AccountId, delta: Cents) -> StoreResult<Account> {
        queries::add_account_balance(&mut *self.tx, id, delta).await
    }

    pub async fn delete_account(&mut self, id: AccountId) -> StoreResult<()> {
        queries::delete_account(&mut *self.tx, id).await
    }

    // ========================
    // Entries and transfers
    // ========================

    pub async fn create_entry(&mut self, account_id: AccountId, amount: Cents) -> StoreResult<Entry> {
        queries::insert_entry(&mut *self.tx, account_id, amount).await
    }

    pub async fn get_entry(&mut self, id: EntryId) -> StoreResult<Option<Entry>> {
        queries::fetch_entry(&mut *self.tx, id).await
    }

    pub async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
    ) -> StoreResult<Transfer> {
        queries::insert_transfer(&mut *self.tx, from_account_id, to_account_id, amount).await
    }

    pub async fn get_transfer(&mut self, id: TransferId) -> StoreResult<Option<Transfer>> {
        queries::fetch_transfer(&mut *self.tx, id).await
    }
}
