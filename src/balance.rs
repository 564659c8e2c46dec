//! Month-scoped balances.
//!
//! Everything here is a pure function of the snapshot it is given. Stored account balances are
//! never consulted: an account with no transactions in the month reports zero.

use crate::error::Error;
use crate::model::{Account, Month, Transaction, TransactionType};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyBalances {
    pub month: Month,
    /// Signed sum per supplied account. Every supplied account has an entry.
    pub per_account: BTreeMap<Uuid, Decimal>,
    pub total_income: Decimal,
    /// Expense plus credit expense.
    pub total_expenses: Decimal,
    /// `total_income - total_expenses`.
    pub net_balance: Decimal,
    /// Spending grouped by category name.
    pub category_breakdown: BTreeMap<String, Decimal>,
    /// Sum of amounts still unpaid, regardless of type.
    pub unpaid_total: Decimal,
    pub transaction_count: usize,
    pub paid_count: usize,
    pub unpaid_count: usize,
}

impl MonthlyBalances {
    /// Buckets `transactions` by `created_at` into `year`/`month` and aggregates them.
    ///
    /// Fails with `InvalidArgument` when the month is not `1..=12`, the year is out of range, or
    /// a total does not fit in a `Decimal`.
    pub fn compute(
        accounts: &[Account],
        transactions: &[Transaction],
        year: i32,
        month: u32,
    ) -> crate::Result<Self> {
        let month = Month::new(year, month)?;
        Self::for_month(accounts, transactions, month)
    }

    /// Like [`MonthlyBalances::compute`] for an already validated month.
    pub fn for_month(
        accounts: &[Account],
        transactions: &[Transaction],
        month: Month,
    ) -> crate::Result<Self> {
        let mut per_account: BTreeMap<Uuid, Decimal> =
            accounts.iter().map(|a| (a.id, Decimal::ZERO)).collect();
        let mut total_income = Decimal::ZERO;
        let mut total_expenses = Decimal::ZERO;
        let mut category_breakdown: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut unpaid_total = Decimal::ZERO;
        let mut transaction_count = 0;
        let mut paid_count = 0;

        for t in transactions.iter().filter(|t| month.contains(t.created_at)) {
            transaction_count += 1;
            if t.is_paid {
                paid_count += 1;
            } else {
                accumulate(&mut unpaid_total, t.amount, "unpaid total")?;
            }

            if let Some(balance) = per_account.get_mut(&t.account_id) {
                accumulate(balance, t.signed_amount(), "account total")?;
            }

            match t.transaction_type {
                TransactionType::Income => accumulate(&mut total_income, t.amount, "income")?,
                TransactionType::Expense | TransactionType::CreditExpense => {
                    accumulate(&mut total_expenses, t.amount, "expenses")?;
                    let category = category_breakdown.entry(t.category.clone()).or_default();
                    accumulate(category, t.amount, "category total")?;
                }
                TransactionType::Transfer => {}
            }
        }

        let net_balance = total_income
            .checked_sub(total_expenses)
            .ok_or_else(|| Error::invalid("The net balance is too large to represent"))?;
        Ok(Self {
            month,
            per_account,
            total_income,
            total_expenses,
            net_balance,
            category_breakdown,
            unpaid_total,
            transaction_count,
            paid_count,
            unpaid_count: transaction_count - paid_count,
        })
    }
}

fn accumulate(sum: &mut Decimal, value: Decimal, what: &str) -> crate::Result<()> {
    *sum = sum
        .checked_add(value)
        .ok_or_else(|| Error::invalid(format!("The {what} is too large to represent")))?;
    Ok(())
}

/// The dashboard total: the sum of the cached balances of `accounts`.
///
/// Fails with `InvalidArgument` when the sum does not fit in a `Decimal`.
pub fn total_stored_balance(accounts: &[Account]) -> crate::Result<Decimal> {
    let mut total = Decimal::ZERO;
    for account in accounts {
        accumulate(&mut total, account.balance, "total balance")?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use crate::model::AccountType;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn account(name: &str) -> Account {
        Account::new(
            Uuid::nil(),
            name,
            AccountType::Checking,
            NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    fn tx(
        account: &Account,
        transaction_type: TransactionType,
        amount: &str,
        category: &str,
        on: (i32, u32, u32),
    ) -> Transaction {
        Transaction::new(
            account.user_id,
            account.id,
            transaction_type,
            dec(amount),
            category,
            "",
            NaiveDate::from_ymd_opt(on.0, on.1, on.2).unwrap(),
        )
    }

    #[test]
    fn test_march_scenario() {
        let main = account("Main");
        let transactions = vec![
            tx(&main, TransactionType::Income, "1000", "Salary", (2025, 3, 1)),
            tx(&main, TransactionType::Expense, "300", "Food", (2025, 3, 5)),
            tx(&main, TransactionType::Expense, "200", "Transport", (2025, 3, 20)),
        ];
        let balances =
            MonthlyBalances::compute(std::slice::from_ref(&main), &transactions, 2025, 3).unwrap();

        assert_eq!(balances.total_income, dec("1000"));
        assert_eq!(balances.total_expenses, dec("500"));
        assert_eq!(balances.net_balance, dec("500"));
        assert_eq!(balances.per_account[&main.id], dec("500"));
        assert_eq!(
            balances.category_breakdown,
            BTreeMap::from([
                ("Food".to_string(), dec("300")),
                ("Transport".to_string(), dec("200")),
            ])
        );
    }

    #[test]
    fn test_buckets_by_created_at_only() {
        let main = account("Main");
        let mut late = tx(&main, TransactionType::Expense, "80", "Food", (2025, 3, 31));
        // Dated and due in April but created in March.
        late.date = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        late.due_date = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        let april = tx(&main, TransactionType::Expense, "5", "Food", (2025, 4, 1));

        let march = MonthlyBalances::compute(&[main.clone()], &[late.clone(), april.clone()], 2025, 3)
            .unwrap();
        assert_eq!(march.total_expenses, dec("80"));
        let april_view =
            MonthlyBalances::compute(&[main], &[late, april], 2025, 4).unwrap();
        assert_eq!(april_view.total_expenses, dec("5"));
    }

    #[test]
    fn test_stored_balance_is_ignored() {
        let idle = account("Idle").with_balance(dec("999.99"));
        let balances = MonthlyBalances::compute(&[idle.clone()], &[], 2025, 3).unwrap();
        assert_eq!(balances.per_account[&idle.id], Decimal::ZERO);
        assert_eq!(balances.net_balance, Decimal::ZERO);
        assert_eq!(balances.total_income, Decimal::ZERO);
        assert!(balances.category_breakdown.is_empty());
        assert_eq!(total_stored_balance(&[idle]).unwrap(), dec("999.99"));
    }

    #[test]
    fn test_transfers_and_credit_expenses() {
        let main = account("Main");
        let card = account("Card");
        let transactions = vec![
            tx(&main, TransactionType::Transfer, "250", "Saque", (2025, 6, 2)),
            tx(&card, TransactionType::CreditExpense, "40.50", "Cartão", (2025, 6, 3)),
            tx(&main, TransactionType::Expense, "9.50", "Cartão", (2025, 6, 4)),
        ];
        let balances =
            MonthlyBalances::compute(&[main.clone(), card.clone()], &transactions, 2025, 6)
                .unwrap();
        assert_eq!(balances.per_account[&main.id], dec("-9.50"));
        assert_eq!(balances.per_account[&card.id], dec("-40.50"));
        assert_eq!(balances.total_expenses, dec("50.00"));
        assert_eq!(balances.category_breakdown["Cartão"], dec("50.00"));
        assert!(!balances.category_breakdown.contains_key("Saque"));
    }

    #[test]
    fn test_net_balance_matches_sign_rule_for_mixed_ledgers() {
        let main = account("Main");
        let types = [
            TransactionType::Income,
            TransactionType::Expense,
            TransactionType::Transfer,
            TransactionType::CreditExpense,
        ];
        let transactions: Vec<Transaction> = (1..=28)
            .map(|d| {
                let t = types[d as usize % types.len()];
                tx(&main, t, &format!("{d}.{:02}", d * 3), "Misc", (2024, 2, d))
            })
            .collect();
        let balances = MonthlyBalances::compute(&[main.clone()], &transactions, 2024, 2).unwrap();
        let income: Decimal = transactions
            .iter()
            .filter(|t| t.transaction_type == TransactionType::Income)
            .map(|t| t.amount)
            .sum();
        let spending: Decimal = transactions
            .iter()
            .filter(|t| t.transaction_type.is_spending())
            .map(|t| t.amount)
            .sum();
        assert_eq!(balances.net_balance, income - spending);
        assert_eq!(balances.per_account[&main.id], income - spending);
    }

    #[test]
    fn test_unpaid_stats() {
        let main = account("Main");
        let mut paid = tx(&main, TransactionType::Expense, "10", "Food", (2025, 3, 1));
        paid.is_paid = true;
        let unpaid = tx(&main, TransactionType::Expense, "15", "Food", (2025, 3, 2));
        let balances = MonthlyBalances::compute(&[main], &[paid, unpaid], 2025, 3).unwrap();
        assert_eq!(balances.transaction_count, 2);
        assert_eq!(balances.paid_count, 1);
        assert_eq!(balances.unpaid_count, 1);
        assert_eq!(balances.unpaid_total, dec("15"));
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        let err = MonthlyBalances::compute(&[], &[], 2025, 13).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);
        assert!(MonthlyBalances::compute(&[], &[], 2025, 0).is_err());
    }

    #[test]
    fn test_is_deterministic() {
        let main = account("Main");
        let transactions = vec![
            tx(&main, TransactionType::Expense, "1", "B", (2025, 3, 1)),
            tx(&main, TransactionType::Expense, "2", "A", (2025, 3, 1)),
        ];
        let a = MonthlyBalances::compute(&[main.clone()], &transactions, 2025, 3).unwrap();
        let b = MonthlyBalances::compute(&[main], &transactions, 2025, 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.category_breakdown.keys().collect::<Vec<_>>(),
            vec!["A", "B"]
        );
    }

    #[test]
    fn test_totals_too_large_are_an_error() {
        let main = account("Main");
        let transactions = vec![
            tx(&main, TransactionType::Income, "50000000000000000000000000000", "Salary", (2025, 3, 1)),
            tx(&main, TransactionType::Income, "50000000000000000000000000000", "Salary", (2025, 3, 2)),
        ];
        let err = MonthlyBalances::compute(&[main.clone()], &transactions, 2025, 3).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);

        // The same rows a month later are simply outside the bucket.
        let april = MonthlyBalances::compute(&[main], &transactions, 2025, 4).unwrap();
        assert_eq!(april.total_income, Decimal::ZERO);

        let rich = account("Rich").with_balance(Decimal::MAX);
        let err = total_stored_balance(&[rich.clone(), rich]).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);
    }

    #[test]
    fn test_ignore_expense_is_still_counted() {
        let main = account("Main");
        let mut flagged = tx(&main, TransactionType::Expense, "12", "Food", (2025, 3, 4));
        flagged.ignore_expense = true;
        let balances = MonthlyBalances::compute(&[main], &[flagged], 2025, 3).unwrap();
        assert_eq!(balances.total_expenses, dec("12"));
        assert_eq!(balances.category_breakdown["Food"], dec("12"));
    }
}
