use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Account, AccountId, Cents, TransferParams, TransferResult, lock_order};
use crate::storage::UnitOfWork;

use super::{LedgerError, Operation};

/// Moves `amount` from one account to another in a single unit of work:
/// one transfer row, two entries, two balance updates.
///
/// Balance updates always touch the lower account id first. Two concurrent
/// transfers over the same pair of accounts, in either direction, therefore
/// take the account row locks in the same order and cannot deadlock.
#[derive(Debug, Clone, Copy)]
pub struct TransferOperation {
    params: TransferParams,
}

impl TransferOperation {
    pub fn new(params: TransferParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl Operation for TransferOperation {
    type Output = TransferResult;

    fn name(&self) -> &'static str {
        "transfer"
    }

    async fn run(self, uow: &mut UnitOfWork) -> Result<TransferResult, LedgerError> {
        let TransferParams {
            from_account_id,
            to_account_id,
            amount,
        } = self.params;
        let (debit, credit) = self.params.legs();

        let transfer = uow
            .create_transfer(from_account_id, to_account_id, amount)
            .await?;

        let from_entry = uow.create_entry(from_account_id, debit).await?;
        let to_entry = uow.create_entry(to_account_id, credit).await?;

        let (first_id, _) = lock_order(from_account_id, to_account_id);
        let (from_account, to_account) = if first_id == from_account_id {
            move_money(uow, (from_account_id, debit), (to_account_id, credit)).await?
        } else {
            let (to_account, from_account) =
                move_money(uow, (to_account_id, credit), (from_account_id, debit)).await?;
            (from_account, to_account)
        };

        debug!(
            transfer_id = transfer.id,
            from_balance = from_account.balance,
            to_balance = to_account.balance,
            "transfer rows written"
        );

        Ok(TransferResult {
            transfer,
            from_account,
            to_account,
            from_entry,
            to_entry,
        })
    }
}

/// Apply two balance deltas strictly in the order given.
async fn move_money(
    uow: &mut UnitOfWork,
    (first_id, first_delta): (AccountId, Cents),
    (second_id, second_delta): (AccountId, Cents),
) -> Result<(Account, Account), LedgerError> {
    let first = uow.add_account_balance(first_id, first_delta).await?;
    let second = uow.add_account_balance(second_id, second_delta).await?;
    Ok((first, second))
}
