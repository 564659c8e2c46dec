//! Account command handlers.

use crate::args::AccountAddArgs;
use crate::commands::Out;
use crate::model::{Account, Amount};
use crate::{Config, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Creates an account for the configured user.
pub async fn account_add(
    config: Config,
    args: AccountAddArgs,
    now: NaiveDateTime,
) -> Result<Out<Account>> {
    let balance = match args.balance.as_deref() {
        Some(s) => Amount::from_str(s)?.value(),
        None => Decimal::ZERO,
    };
    let account = Account::new(config.user_id(), args.name, args.account_type, now)
        .with_balance(balance);
    let account = config.ledger().create_account(account).await?;
    Ok(Out::new(
        format!(
            "Created {} account '{}' with id {}",
            account.account_type, account.name, account.id
        ),
        account,
    ))
}

/// Lists the configured user's accounts with their stored balances.
pub async fn account_list(config: Config) -> Result<Out<Vec<Account>>> {
    let ledger = config.ledger();
    let accounts = ledger.accounts(config.user_id()).await?;
    let total = ledger.total_balance(config.user_id()).await?;
    Ok(Out::new(
        format!(
            "{} account(s), total balance {}",
            accounts.len(),
            Amount::new(total)
        ),
        accounts,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use crate::model::AccountType;
    use crate::test::{at, TestEnv};

    fn add_args(name: &str, balance: Option<&str>) -> AccountAddArgs {
        AccountAddArgs {
            name: name.to_string(),
            account_type: AccountType::Savings,
            balance: balance.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let env = TestEnv::new().await;
        account_add(env.config(), add_args("Reserve", Some("$1,500.25")), at(2025, 1, 1))
            .await
            .unwrap();
        account_add(env.config(), add_args("Card", Some("-200")), at(2025, 1, 2))
            .await
            .unwrap();

        let out = account_list(env.config()).await.unwrap();
        let accounts = out.structure().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "Reserve");
        assert_eq!(accounts[0].account_type, AccountType::Savings);
        assert_eq!(out.message(), "2 account(s), total balance $1,300.25");
    }

    #[tokio::test]
    async fn test_bad_balance() {
        let env = TestEnv::new().await;
        let err = account_add(env.config(), add_args("X", Some("lots")), at(2025, 1, 1))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);
    }
}
