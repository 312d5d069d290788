use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crate::application::LedgerService;
use crate::config::LedgerConfig;
use crate::domain::{NewAccount, NewUser, format_cents, parse_cents};
use crate::tasks::{LoggingDistributor, VerifyEmailHook};

/// Arca - transactional ledger
#[derive(Parser)]
#[command(name = "arca")]
#[command(about = "Atomic account transfers and user records over SQLite")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides ARCA_DATABASE_URL)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money between two accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: i64,

        /// Destination account ID
        #[arg(long)]
        to: i64,

        /// Currency both accounts must hold
        #[arg(short, long)]
        currency: Option<String>,
    },

    /// List ledger entries for an account
    Entries {
        /// Account ID
        account: i64,

        #[arg(short, long, default_value = "20")]
        limit: i64,

        #[arg(short, long, default_value = "0")]
        offset: i64,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user and enqueue its verification email
    Create {
        username: String,

        #[arg(long)]
        full_name: String,

        #[arg(long)]
        email: String,

        /// Password hash, produced by the caller's hashing scheme
        #[arg(long)]
        password_hash: String,
    },

    /// Show a user
    Show { username: String },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open an account for an existing user
    Create {
        /// Owner username
        #[arg(long)]
        owner: String,

        /// Currency code (e.g., EUR, USD)
        #[arg(short, long, default_value = "EUR")]
        currency: String,

        /// Opening balance (e.g., "100.00")
        #[arg(short, long, default_value = "0")]
        balance: String,
    },

    /// Show an account
    Show { id: i64 },

    /// List accounts of a user
    List {
        /// Owner username
        owner: String,

        #[arg(short, long, default_value = "20")]
        limit: i64,

        #[arg(short, long, default_value = "0")]
        offset: i64,
    },
}

impl Cli {
    fn config(&self) -> Result<LedgerConfig> {
        let config = LedgerConfig::from_env().context("Invalid environment configuration")?;
        Ok(match &self.database {
            Some(path) => config.with_database_url(LedgerConfig::sqlite_file(path).database_url),
            None => config,
        })
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config()?;

        match self.command {
            Commands::Init => {
                LedgerService::init(&config).await?;
                println!("Database initialized: {}", config.database_url);
            }

            Commands::User(cmd) => {
                let service = LedgerService::connect(&config).await?;
                run_user_command(&service, cmd).await?;
            }

            Commands::Account(cmd) => {
                let service = LedgerService::connect(&config).await?;
                run_account_command(&service, cmd).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                currency,
            } => {
                let service = LedgerService::connect(&config).await?;
                let amount =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let result = service
                    .validated_transfer(from, to, amount, currency.as_deref())
                    .await?;

                println!(
                    "Transfer {}: {} from #{} to #{}",
                    result.transfer.id,
                    format_cents(result.transfer.amount),
                    from,
                    to
                );
                println!(
                    "  #{} balance: {}",
                    result.from_account.id,
                    format_cents(result.from_account.balance)
                );
                println!(
                    "  #{} balance: {}",
                    result.to_account.id,
                    format_cents(result.to_account.balance)
                );
            }

            Commands::Entries {
                account,
                limit,
                offset,
            } => {
                let service = LedgerService::connect(&config).await?;
                let entries = service.list_entries(account, limit, offset).await?;
                if entries.is_empty() {
                    println!("No entries found.");
                } else {
                    println!("{:<8} {:<20} {:>12}", "ID", "DATE", "AMOUNT");
                    println!("{}", "-".repeat(42));
                    for entry in entries {
                        println!(
                            "{:<8} {:<20} {:>12}",
                            entry.id,
                            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                            format_cents(entry.amount)
                        );
                    }
                }
            }

            Commands::Check => {
                let service = LedgerService::connect(&config).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &LedgerService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Create {
            username,
            full_name,
            email,
            password_hash,
        } => {
            let params = NewUser {
                username,
                hashed_password: password_hash,
                full_name,
                email,
            };
            let hook = VerifyEmailHook::new(LoggingDistributor);

            match service.create_user_with_hook(params, hook).await {
                Ok(user) => println!("Created user: {} <{}>", user.username, user.email),
                Err(err) if err.is_unique_violation() => {
                    bail!("Username or email already exists")
                }
                Err(err) => return Err(err.into()),
            }
        }

        UserCommands::Show { username } => {
            let user = service.get_user(&username).await?;
            println!("User: {}", user.username);
            println!("  Full name:  {}", user.full_name);
            println!("  Email:      {}", user.email);
            println!(
                "  Created:    {}",
                user.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if user.has_changed_password() {
                println!(
                    "  Password changed: {}",
                    user.password_changed_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            owner,
            currency,
            balance,
        } => {
            let balance = parse_cents(&balance).context("Invalid opening balance")?;
            let params = NewAccount::new(owner, currency).with_balance(balance);

            match service.create_account(params).await {
                Ok(account) => println!(
                    "Created account #{} for {} ({} {})",
                    account.id,
                    account.owner,
                    format_cents(account.balance),
                    account.currency
                ),
                Err(err) if err.is_foreign_key_violation() => bail!("Owner does not exist"),
                Err(err) if err.is_unique_violation() => {
                    bail!("Owner already has an account in this currency")
                }
                Err(err) => return Err(err.into()),
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(id).await?;
            println!("Account #{}", account.id);
            println!("  Owner:    {}", account.owner);
            println!(
                "  Balance:  {} {}",
                format_cents(account.balance),
                account.currency
            );
            println!(
                "  Created:  {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        AccountCommands::List {
            owner,
            limit,
            offset,
        } => {
            let accounts = service.list_accounts(&owner, limit, offset).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<8} {:>14} {:<8}", "ID", "BALANCE", "CURRENCY");
                println!("{}", "-".repeat(32));
                for account in accounts {
                    println!(
                        "{:<8} {:>14} {:<8}",
                        account.id,
                        format_cents(account.balance),
                        account.currency
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:  {}", report.account_count);
    println!("Transfers: {}", report.transfer_count);
    println!("Entries:   {}", report.entry_count);
    println!();

    if report.entry_sum != 0 {
        println!("✗ Entries sum to {} (expected 0)", format_cents(report.entry_sum));
    }
    if report.entry_count != 2 * report.transfer_count {
        println!(
            "✗ {} entries for {} transfers (expected two per transfer)",
            report.entry_count, report.transfer_count
        );
    }
    if report.non_positive_transfers > 0 {
        println!(
            "✗ {} transfers with non-positive amounts",
            report.non_positive_transfers
        );
    }
    for mismatch in &report.mismatches {
        println!(
            "✗ Account #{}: entries total {}, transfers imply {}",
            mismatch.account_id,
            format_cents(mismatch.entry_total),
            format_cents(mismatch.transfer_total)
        );
    }

    if report.is_healthy() {
        println!("✓ Ledger is consistent");
        Ok(())
    } else {
        bail!("Ledger integrity check failed")
    }
}
