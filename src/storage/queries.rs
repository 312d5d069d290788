//! Single-row statements shared by the pool-level [`Store`](super::Store) and
//! the transaction-scoped [`UnitOfWork`](super::UnitOfWork).
//!
//! Every function takes any sqlx executor, so the same SQL runs in
//! autocommit mode against the pool or inside an open transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Executor, Row, Sqlite, Type};

use crate::domain::{
    Account, AccountId, Cents, Entry, EntryId, NewAccount, NewUser, Transfer, TransferId, User,
    UserUpdate,
};

use super::{StoreError, StoreResult};

// ========================
// Users
// ========================

pub(super) async fn insert_user<'e, E>(db: E, params: &NewUser) -> StoreResult<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO users (username, hashed_password, full_name, email, password_changed_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING username, hashed_password, full_name, email, password_changed_at, created_at
        "#,
    )
    .bind(&params.username)
    .bind(&params.hashed_password)
    .bind(&params.full_name)
    .bind(&params.email)
    .bind(DateTime::<Utc>::UNIX_EPOCH.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .fetch_one(db)
    .await?;

    row_to_user(&row)
}

pub(super) async fn fetch_user<'e, E>(db: E, username: &str) -> StoreResult<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT username, hashed_password, full_name, email, password_changed_at, created_at
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(db)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}

/// Apply the non-empty fields of `update`. Changing the password also stamps
/// `password_changed_at`.
pub(super) async fn update_user<'e, E>(
    db: E,
    username: &str,
    update: &UserUpdate,
) -> StoreResult<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let password_changed_at = update
        .hashed_password
        .as_ref()
        .map(|_| Utc::now().to_rfc3339());

    let row = sqlx::query(
        r#"
        UPDATE users
        SET full_name = COALESCE(?, full_name),
            email = COALESCE(?, email),
            hashed_password = COALESCE(?, hashed_password),
            password_changed_at = COALESCE(?, password_changed_at)
        WHERE username = ?
        RETURNING username, hashed_password, full_name, email, password_changed_at, created_at
        "#,
    )
    .bind(&update.full_name)
    .bind(&update.email)
    .bind(&update.hashed_password)
    .bind(password_changed_at)
    .bind(username)
    .fetch_optional(db)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}

// ========================
// Accounts
// ========================

pub(super) async fn insert_account<'e, E>(db: E, params: &NewAccount) -> StoreResult<Account>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO accounts (owner, balance, currency, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, owner, balance, currency, created_at
        "#,
    )
    .bind(&params.owner)
    .bind(params.balance)
    .bind(&params.currency)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(db)
    .await?;

    row_to_account(&row)
}

pub(super) async fn fetch_account<'e, E>(db: E, id: AccountId) -> StoreResult<Option<Account>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, owner, balance, currency, created_at
        FROM accounts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.as_ref().map(row_to_account).transpose()
}

pub(super) async fn list_accounts<'e, E>(
    db: E,
    owner: &str,
    limit: i64,
    offset: i64,
) -> StoreResult<Vec<Account>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, owner, balance, currency, created_at
        FROM accounts
        WHERE owner = ?
        ORDER BY id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(owner)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_account).collect()
}

/// Overwrite an account balance.
pub(super) async fn set_account_balance<'e, E>(
    db: E,
    id: AccountId,
    balance: Cents,
) -> StoreResult<Account>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        UPDATE accounts
        SET balance = ?
        WHERE id = ?
        RETURNING id, owner, balance, currency, created_at
        "#,
    )
    .bind(balance)
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| StoreError::not_found("account", id))?;

    row_to_account(&row)
}

/// Add a signed delta to an account balance in a single statement, so the
/// read-modify-write happens under the row's write lock.
pub(super) async fn add_account_balance<'e, E>(
    db: E,
    id: AccountId,
    delta: Cents,
) -> StoreResult<Account>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        UPDATE accounts
        SET balance = balance + ?
        WHERE id = ?
        RETURNING id, owner, balance, currency, created_at
        "#,
    )
    .bind(delta)
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| StoreError::not_found("account", id))?;

    row_to_account(&row)
}

pub(super) async fn delete_account<'e, E>(db: E, id: AccountId) -> StoreResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("account", id));
    }
    Ok(())
}

// ========================
// Entries
// ========================

pub(super) async fn insert_entry<'e, E>(
    db: E,
    account_id: AccountId,
    amount: Cents,
) -> StoreResult<Entry>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO entries (account_id, amount, created_at)
        VALUES (?, ?, ?)
        RETURNING id, account_id, amount, created_at
        "#,
    )
    .bind(account_id)
    .bind(amount)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(db)
    .await?;

    row_to_entry(&row)
}

pub(super) async fn fetch_entry<'e, E>(db: E, id: EntryId) -> StoreResult<Option<Entry>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, account_id, amount, created_at
        FROM entries
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.as_ref().map(row_to_entry).transpose()
}

pub(super) async fn list_entries<'e, E>(
    db: E,
    account_id: AccountId,
    limit: i64,
    offset: i64,
) -> StoreResult<Vec<Entry>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, account_id, amount, created_at
        FROM entries
        WHERE account_id = ?
        ORDER BY id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(account_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_entry).collect()
}

// ========================
// Transfers
// ========================

pub(super) async fn insert_transfer<'e, E>(
    db: E,
    from_account_id: AccountId,
    to_account_id: AccountId,
    amount: Cents,
) -> StoreResult<Transfer>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, from_account_id, to_account_id, amount, created_at
        "#,
    )
    .bind(from_account_id)
    .bind(to_account_id)
    .bind(amount)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(db)
    .await?;

    row_to_transfer(&row)
}

pub(super) async fn fetch_transfer<'e, E>(db: E, id: TransferId) -> StoreResult<Option<Transfer>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, from_account_id, to_account_id, amount, created_at
        FROM transfers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.as_ref().map(row_to_transfer).transpose()
}

/// Transfers where the account is the sender or the receiver.
pub(super) async fn list_transfers<'e, E>(
    db: E,
    account_id: AccountId,
    limit: i64,
    offset: i64,
) -> StoreResult<Vec<Transfer>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, from_account_id, to_account_id, amount, created_at
        FROM transfers
        WHERE from_account_id = ? OR to_account_id = ?
        ORDER BY id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(account_id)
    .bind(account_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_transfer).collect()
}

pub(super) async fn all_transfers<'e, E>(db: E) -> StoreResult<Vec<Transfer>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, from_account_id, to_account_id, amount, created_at
        FROM transfers
        ORDER BY id
        "#,
    )
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_transfer).collect()
}

// ========================
// Aggregates
// ========================

pub(super) async fn count_rows<'e, E>(db: E, table: Table) -> StoreResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count = sqlx::query_scalar::<_, i64>(table.count_sql())
        .fetch_one(db)
        .await?;
    Ok(count)
}

pub(super) async fn entry_totals<'e, E>(db: E) -> StoreResult<HashMap<AccountId, Cents>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT account_id, SUM(amount) AS total
        FROM entries
        GROUP BY account_id
        "#,
    )
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| -> StoreResult<(AccountId, Cents)> {
            Ok((column(row, "account_id")?, column(row, "total")?))
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Table {
    Accounts,
    Entries,
    Transfers,
}

impl Table {
    fn count_sql(self) -> &'static str {
        match self {
            Table::Accounts => "SELECT COUNT(*) FROM accounts",
            Table::Entries => "SELECT COUNT(*) FROM entries",
            Table::Transfers => "SELECT COUNT(*) FROM transfers",
        }
    }
}

// ========================
// Row mapping
// ========================

fn parse_timestamp(value: &str, field: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("invalid {field} timestamp '{value}': {e}")))
}

/// Read a column, reporting type mismatches as decode errors.
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> StoreResult<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Decode(format!("column {name}: {e}")))
}

fn row_to_user(row: &SqliteRow) -> StoreResult<User> {
    let password_changed_at: String = column(row, "password_changed_at")?;
    let created_at: String = column(row, "created_at")?;

    Ok(User {
        username: column(row, "username")?,
        hashed_password: column(row, "hashed_password")?,
        full_name: column(row, "full_name")?,
        email: column(row, "email")?,
        password_changed_at: parse_timestamp(&password_changed_at, "password_changed_at")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

fn row_to_account(row: &SqliteRow) -> StoreResult<Account> {
    let created_at: String = column(row, "created_at")?;

    Ok(Account {
        id: column(row, "id")?,
        owner: column(row, "owner")?,
        balance: column(row, "balance")?,
        currency: column(row, "currency")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

fn row_to_entry(row: &SqliteRow) -> StoreResult<Entry> {
    let created_at: String = column(row, "created_at")?;

    Ok(Entry {
        id: column(row, "id")?,
        account_id: column(row, "account_id")?,
        amount: column(row, "amount")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

fn row_to_transfer(row: &SqliteRow) -> StoreResult<Transfer> {
    let created_at: String = column(row, "created_at")?;

    Ok(Transfer {
        id: column(row, "id")?,
        from_account_id: column(row, "from_account_id")?,
        to_account_id: column(row, "to_account_id")?,
        amount: column(row, "amount")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_roundtrips_rfc3339() {
        let now = Utc::now();
        let parsed = parse_timestamp(&now.to_rfc3339(), "created_at").unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday", "created_at").unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn test_epoch_matches_column_default() {
        assert_eq!(
            DateTime::<Utc>::UNIX_EPOCH.to_rfc3339(),
            "1970-01-01T00:00:00+00:00"
        );
    }
}
