mod common;

use anyhow::Result;
use arca::application::LedgerError;
use arca::domain::NewAccount;
use arca::storage::ConstraintKind;
use common::*;

#[tokio::test]
async fn test_transfer_moves_money_and_writes_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;

    let result = service.transfer_funds(a.id, b.id, 100).await?;

    assert_eq!(result.transfer.from_account_id, a.id);
    assert_eq!(result.transfer.to_account_id, b.id);
    assert_eq!(result.transfer.amount, 100);

    assert_eq!(result.from_entry.account_id, a.id);
    assert_eq!(result.from_entry.amount, -100);
    assert_eq!(result.to_entry.account_id, b.id);
    assert_eq!(result.to_entry.amount, 100);
    assert_eq!(result.entry_sum(), 0);

    assert_eq!(result.from_account.id, a.id);
    assert_eq!(result.from_account.balance, 900);
    assert_eq!(result.to_account.id, b.id);
    assert_eq!(result.to_account.balance, 600);

    // Persisted state matches what the operation returned
    assert_eq!(service.get_account(a.id).await?.balance, 900);
    assert_eq!(service.get_account(b.id).await?.balance, 600);

    let transfer = service.store().get_transfer(result.transfer.id).await?;
    assert_eq!(transfer, Some(result.transfer.clone()));

    let entries = service.list_entries(a.id, 10, 0).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0], result.from_entry);

    Ok(())
}

#[tokio::test]
async fn test_transfer_toward_lower_id_returns_accounts_in_request_order() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;
    assert!(a.id < b.id);

    let result = service.transfer_funds(b.id, a.id, 200).await?;

    assert_eq!(result.from_account.id, b.id);
    assert_eq!(result.from_account.balance, 300);
    assert_eq!(result.to_account.id, a.id);
    assert_eq!(result.to_account.balance, 1200);
    assert_eq!(result.from_entry.amount, -200);
    assert_eq!(result.to_entry.amount, 200);

    Ok(())
}

#[tokio::test]
async fn test_transfer_may_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 100).await?;
    let b = create_funded_account(&service, 0).await?;

    let result = service.transfer_funds(a.id, b.id, 250).await?;
    assert_eq!(result.from_account.balance, -150);
    assert_eq!(result.to_account.balance, 250);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_same_direction() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;

    let n = 5;
    let amount = 100;

    let mut handles = Vec::new();
    for _ in 0..n {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.transfer_funds(a.id, b.id, amount).await
        }));
    }

    for handle in handles {
        let result = handle.await??;
        assert_eq!(result.transfer.amount, amount);
        assert_eq!(result.entry_sum(), 0);
    }

    assert_eq!(service.get_account(a.id).await?.balance, 1000 - n * amount);
    assert_eq!(service.get_account(b.id).await?.balance, 500 + n * amount);

    assert_eq!(service.list_entries(a.id, 100, 0).await?.len(), n as usize);
    assert_eq!(service.list_entries(b.id, 100, 0).await?.len(), n as usize);
    assert_eq!(service.list_transfers(a.id, 100, 0).await?.len(), n as usize);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "{report:?}");
    assert_eq!(report.transfer_count, n);
    assert_eq!(report.entry_count, 2 * n);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opposing_transfers_do_not_deadlock() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;

    let n = 10;
    let amount = 10;

    let mut handles = Vec::new();
    for i in 0..n {
        let service = service.clone();
        let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
        handles.push(tokio::spawn(async move {
            service.transfer_funds(from, to, amount).await
        }));
    }

    for handle in handles {
        handle.await??;
    }

    // Equal numbers in each direction cancel out
    assert_eq!(service.get_account(a.id).await?.balance, 1000);
    assert_eq!(service.get_account(b.id).await?.balance, 500);
    assert_eq!(service.list_transfers(a.id, 100, 0).await?.len(), n);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "{report:?}");
    assert_eq!(report.transfer_count, n as i64);
    assert_eq!(report.entry_count, 2 * n as i64);

    Ok(())
}

#[tokio::test]
async fn test_balance_updates_touch_lower_id_first() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;
    assert!(a.id < b.id);

    sqlx::query(
        "CREATE TABLE balance_log (id INTEGER PRIMARY KEY AUTOINCREMENT, account_id INTEGER NOT NULL)",
    )
    .execute(service.store().pool())
    .await?;
    sqlx::query(
        "CREATE TRIGGER log_balance_update AFTER UPDATE OF balance ON accounts
         BEGIN
             INSERT INTO balance_log (account_id) VALUES (NEW.id);
         END",
    )
    .execute(service.store().pool())
    .await?;

    service.transfer_funds(a.id, b.id, 10).await?;
    service.transfer_funds(b.id, a.id, 10).await?;

    let order: Vec<i64> = sqlx::query_scalar("SELECT account_id FROM balance_log ORDER BY id")
        .fetch_all(service.store().pool())
        .await?;
    assert_eq!(order, vec![a.id, b.id, a.id, b.id]);

    Ok(())
}

#[tokio::test]
async fn test_failed_balance_update_rolls_back_everything() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;

    // Reject any balance change on b, the last statement of the transfer
    sqlx::query(&format!(
        "CREATE TRIGGER freeze_account BEFORE UPDATE OF balance ON accounts
         WHEN NEW.id = {}
         BEGIN
             SELECT RAISE(ABORT, 'account frozen');
         END",
        b.id
    ))
    .execute(service.store().pool())
    .await?;

    let err = service
        .transfer_funds(a.id, b.id, 10)
        .await
        .expect_err("transfer into a frozen account must fail");
    assert!(err.to_string().contains("account frozen"), "{err}");

    assert_eq!(service.get_account(a.id).await?.balance, 1000);
    assert_eq!(service.get_account(b.id).await?.balance, 500);
    assert!(service.list_entries(a.id, 10, 0).await?.is_empty());
    assert!(service.list_entries(b.id, 10, 0).await?.is_empty());
    assert_eq!(service.store().count_transfers().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_transfer_to_missing_account_is_foreign_key_violation() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;

    let err = service
        .transfer_funds(a.id, 999_999, 10)
        .await
        .expect_err("unknown destination must fail");
    assert!(err.is_foreign_key_violation(), "{err}");

    assert_eq!(service.get_account(a.id).await?.balance, 1000);
    assert!(service.list_entries(a.id, 10, 0).await?.is_empty());
    assert_eq!(service.store().count_transfers().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected_by_the_store() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;

    let err = service
        .transfer_funds(a.id, b.id, 0)
        .await
        .expect_err("zero amount violates the transfers check constraint");
    assert!(err.constraint_kind().is_some(), "{err}");
    assert_eq!(service.store().count_transfers().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_balance_overflow_is_rejected_and_rolled_back() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, i64::MAX - 5).await?;

    let err = service
        .transfer_funds(a.id, b.id, 10)
        .await
        .expect_err("credit past i64::MAX must fail");
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Check), "{err}");

    assert_eq!(service.get_account(a.id).await?.balance, 1000);
    assert_eq!(service.get_account(b.id).await?.balance, i64::MAX - 5);
    assert!(service.list_entries(a.id, 10, 0).await?.is_empty());
    assert_eq!(service.store().count_transfers().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_validated_transfer_checks_inputs() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;

    let owner = create_random_user(&service).await?;
    let usd = service
        .create_account(NewAccount::new(owner.username, "USD").with_balance(100))
        .await?;

    assert!(matches!(
        service.validated_transfer(a.id, b.id, 0, None).await,
        Err(LedgerError::InvalidAmount(0))
    ));
    assert!(matches!(
        service.validated_transfer(a.id, a.id, 10, None).await,
        Err(LedgerError::SameAccount(id)) if id == a.id
    ));
    assert!(matches!(
        service.validated_transfer(a.id, 999_999, 10, None).await,
        Err(LedgerError::AccountNotFound(999_999))
    ));
    assert!(matches!(
        service.validated_transfer(a.id, usd.id, 10, None).await,
        Err(LedgerError::CurrencyMismatch { account_id, .. }) if account_id == usd.id
    ));
    assert!(matches!(
        service.validated_transfer(a.id, b.id, 10, Some("USD")).await,
        Err(LedgerError::CurrencyMismatch { account_id, .. }) if account_id == a.id
    ));
    assert_eq!(service.store().count_transfers().await?, 0);

    let result = service.validated_transfer(a.id, b.id, 10, Some("EUR")).await?;
    assert_eq!(result.from_account.balance, 990);
    assert_eq!(result.to_account.balance, 510);

    Ok(())
}

#[tokio::test]
async fn test_integrity_report_after_transfers() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = create_funded_account(&service, 1000).await?;
    let b = create_funded_account(&service, 500).await?;
    let c = create_funded_account(&service, 0).await?;

    service.transfer_funds(a.id, b.id, 100).await?;
    service.transfer_funds(b.id, c.id, 50).await?;
    service.transfer_funds(c.id, a.id, 25).await?;

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "{report:?}");
    assert_eq!(report.account_count, 3);
    assert_eq!(report.transfer_count, 3);
    assert_eq!(report.entry_count, 6);
    assert_eq!(report.entry_sum, 0);
    assert!(report.mismatches.is_empty());

    // A stray entry with no transfer behind it breaks the ledger
    sqlx::query("INSERT INTO entries (account_id, amount, created_at) VALUES (?, ?, ?)")
        .bind(a.id)
        .bind(5_i64)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(service.store().pool())
        .await?;

    let report = service.check_integrity().await?;
    assert!(!report.is_healthy());
    assert_eq!(report.entry_sum, 5);
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].account_id, a.id);

    Ok(())
}
