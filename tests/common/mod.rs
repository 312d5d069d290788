// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use arca::application::LedgerService;
use arca::config::LedgerConfig;
use arca::domain::{Account, Cents, NewAccount, NewUser, User};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with(|config| config).await
}

/// Like [`test_service`], with a chance to adjust the configuration first
pub async fn test_service_with(
    adjust: impl FnOnce(LedgerConfig) -> LedgerConfig,
) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = adjust(LedgerConfig::sqlite_file(temp_dir.path().join("test.db")));
    let service = LedgerService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Username that will not collide with other rows in the same database
pub fn random_username() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("user_{}", &id[..12])
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        hashed_password: "$2a$10$notarealhashnotarealhashnotarealhashnotreal".to_string(),
        full_name: format!("{username} Test"),
        email: format!("{username}@example.com"),
    }
}

pub async fn create_random_user(service: &LedgerService) -> Result<User> {
    let user = service.create_user(new_user(&random_username())).await?;
    Ok(user)
}

/// Create a fresh user owning one EUR account with the given balance
pub async fn create_funded_account(service: &LedgerService, balance: Cents) -> Result<Account> {
    let owner = create_random_user(service).await?;
    let account = service
        .create_account(NewAccount::new(owner.username, "EUR").with_balance(balance))
        .await?;
    Ok(account)
}
