use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The name of the account seeded for a user who has none.
pub const DEFAULT_ACCOUNT_NAME: &str = "Conta Principal";

/// The kind of an account.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Checking,
    Savings,
    Credit,
    Investment,
}

serde_plain::derive_display_from_serialize!(AccountType);
serde_plain::derive_fromstr_from_deserialize!(AccountType);

/// An account owned by a user.
///
/// `balance` is a denormalized cache. It is written by posting and reversal operations but is
/// never read back by month-scoped views, which always recompute from transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub balance: Decimal,
    /// Incremented on every balance write.
    pub version: i64,
    pub created_at: NaiveDateTime,
}

impl Account {
    /// A new account with a zero balance.
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        account_type: AccountType,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            account_type,
            balance: Decimal::ZERO,
            version: 0,
            created_at,
        }
    }

    /// Sets an opening balance.
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_account_type_strings() {
        assert_eq!(AccountType::Investment.to_string(), "investment");
        assert_eq!(
            AccountType::from_str("savings").unwrap(),
            AccountType::Savings
        );
        assert!(AccountType::from_str("brokerage").is_err());
    }

    #[test]
    fn test_account_serializes_type_field() {
        let account = Account::new(
            Uuid::new_v4(),
            "Wallet",
            AccountType::Credit,
            NaiveDateTime::default(),
        );
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["type"], "credit");
        assert_eq!(json["balance"], "0");
    }
}
