use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Account, AccountId, Cents, Entry};

pub type TransferId = i64;

/// The logical record of moving funds from one account to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    /// Source account (balance decreases)
    pub from_account_id: AccountId,
    /// Destination account (balance increases)
    pub to_account_id: AccountId,
    /// Amount in minor units (always positive)
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

/// Input of a funds transfer. Validity (positive amount, distinct existing
/// accounts, matching currencies) is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Cents,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Cents) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Signed entry amounts for the (from, to) legs.
    pub fn legs(&self) -> (Cents, Cents) {
        (-self.amount, self.amount)
    }
}

/// Everything a committed transfer produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    /// Source account after the debit
    pub from_account: Account,
    /// Destination account after the credit
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl TransferResult {
    /// Sum of both entry amounts. Zero for every well-formed transfer.
    pub fn entry_sum(&self) -> Cents {
        self.from_entry.amount + self.to_entry.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legs_conserve_money() {
        let params = TransferParams::new(1, 2, 250);
        let (debit, credit) = params.legs();
        assert_eq!(debit, -250);
        assert_eq!(credit, 250);
        assert_eq!(debit + credit, 0);
    }
}
