use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

/// Account identifiers are assigned by the store and totally ordered.
/// Lock-acquisition order during transfers is ascending by this value.
pub type AccountId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Username of the owning user
    pub owner: String,
    /// Current balance in minor units. May be negative: the engine does not
    /// guard against overdraft.
    pub balance: Cents,
    /// ISO 4217 currency code
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a new account row.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner: String,
    pub balance: Cents,
    pub currency: String,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            balance: 0,
            currency: currency.into(),
        }
    }

    pub fn with_balance(mut self, balance: Cents) -> Self {
        self.balance = balance;
        self
    }
}

/// Order two account ids for lock acquisition: lower id first.
pub fn lock_order(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a < b { (a, b) } else { (b, a) }
}
