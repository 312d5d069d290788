use async_trait::async_trait;
use tracing::debug;

use crate::domain::{NewUser, User};
use crate::storage::UnitOfWork;

use super::{LedgerError, Operation};

/// Side effect that must accompany a new user row.
///
/// Runs inside the same transaction as the insert, after it. Returning an
/// error rolls the user row back, so the user exists if and only if the hook
/// succeeded. A caller that retries a failed creation runs the hook again,
/// so hooks must tolerate repeated invocation.
#[async_trait]
pub trait AfterCreateHook: Send + Sync {
    async fn after_create(&self, uow: &mut UnitOfWork, user: &User) -> anyhow::Result<()>;
}

/// Plain closures work as hooks when they only need the created user.
#[async_trait]
impl<F> AfterCreateHook for F
where
    F: Fn(&User) -> anyhow::Result<()> + Send + Sync,
{
    async fn after_create(&self, _uow: &mut UnitOfWork, user: &User) -> anyhow::Result<()> {
        (self)(user)
    }
}

/// Hook for callers with no side effect to attach.
pub fn no_hook(_user: &User) -> anyhow::Result<()> {
    Ok(())
}

/// Inserts a user, then runs the caller's hook in the same unit of work.
pub struct CreateUserOperation<H> {
    params: NewUser,
    hook: H,
}

impl<H: AfterCreateHook> CreateUserOperation<H> {
    pub fn new(params: NewUser, hook: H) -> Self {
        Self { params, hook }
    }
}

#[async_trait]
impl<H: AfterCreateHook> Operation for CreateUserOperation<H> {
    type Output = User;

    fn name(&self) -> &'static str {
        "create_user"
    }

    async fn run(self, uow: &mut UnitOfWork) -> Result<User, LedgerError> {
        let user = uow.create_user(&self.params).await?;
        debug!(username = %user.username, "user row written, running after-create hook");

        self.hook
            .after_create(uow, &user)
            .await
            .map_err(LedgerError::Hook)?;

        Ok(user)
    }
}
