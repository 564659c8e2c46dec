use crate::model::Month;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The direction of a transaction. The stored amount is always a positive magnitude and the
/// direction comes from here.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    #[default]
    Expense,
    Transfer,
    CreditExpense,
}

serde_plain::derive_display_from_serialize!(TransactionType);
serde_plain::derive_fromstr_from_deserialize!(TransactionType);

impl TransactionType {
    /// Applies the sign rule: income is `+amount`, expense and credit expense are `-amount`, and
    /// transfers contribute nothing.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense | TransactionType::CreditExpense => -amount,
            TransactionType::Transfer => Decimal::ZERO,
        }
    }

    /// Expense and credit expense both count as spending.
    pub fn is_spending(&self) -> bool {
        matches!(
            self,
            TransactionType::Expense | TransactionType::CreditExpense
        )
    }
}

/// A single ledger row.
///
/// Field names are the persisted contract. `created_at` decides which month a transaction
/// belongs to and `original_transaction_id` is the lineage pointer to the row it was derived
/// from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub created_at: NaiveDateTime,
    pub description: String,
    pub is_paid: bool,
    pub is_fixed: bool,
    pub is_installment: bool,
    pub installment_count: i32,
    pub ignore_expense: bool,
    pub is_repeat: bool,
    pub repeat_interval: Option<i32>,
    pub original_transaction_id: Option<Uuid>,
    pub repeat_number: Option<i32>,
    pub total_repeats: Option<i32>,
    /// Set on successors synthesized by rollover.
    pub carried_over: bool,
    /// Whether `amount` has been applied to the account's stored balance.
    pub posted: bool,
}

impl Transaction {
    /// A plain, unpaid, unposted transaction dated `date` (created at midnight of that day).
    pub fn new(
        user_id: Uuid,
        account_id: Uuid,
        transaction_type: TransactionType,
        amount: Decimal,
        category: impl Into<String>,
        description: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_id,
            amount,
            transaction_type,
            category: category.into(),
            date,
            due_date: date,
            created_at: date.and_time(chrono::NaiveTime::MIN),
            description: description.into(),
            is_paid: false,
            is_fixed: false,
            is_installment: false,
            installment_count: 1,
            ignore_expense: false,
            is_repeat: false,
            repeat_interval: None,
            original_transaction_id: None,
            repeat_number: None,
            total_repeats: None,
            carried_over: false,
            posted: false,
        }
    }

    /// The signed contribution of this transaction to its account.
    pub fn signed_amount(&self) -> Decimal {
        self.transaction_type.signed(self.amount)
    }

    /// The month this transaction is bucketed into.
    pub fn month(&self) -> Month {
        Month::of(self.created_at.date())
    }

    /// Derived rows (installment shares after the first, rollover successors) point at their
    /// origin.
    pub fn is_derived(&self) -> bool {
        self.original_transaction_id.is_some()
    }
}
