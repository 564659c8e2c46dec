//! Expansion of an installment purchase into one ledger row per month.

use crate::error::Error;
use crate::model::{check_magnitude, Month, Transaction, TransactionType, MAX_YEAR};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The default label used in installment descriptions, e.g. `Sofa (Parcela 2/10)`.
pub const DEFAULT_INSTALLMENT_LABEL: &str = "Parcela";

/// The most installments one purchase may be split into: thirty years of monthly payments.
pub const MAX_INSTALLMENTS: u32 = 360;

/// A purchase to be spread over `count` months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentRequest {
    pub user_id: Uuid,
    pub account_id: Uuid,
    /// The total when splitting, or the per-installment value in fixed mode.
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub start_date: NaiveDate,
    pub count: u32,
    /// When true, every installment carries `amount` and the total liability is
    /// `amount * count`.
    pub fixed_per_installment: bool,
    pub description: String,
    /// Whether the first installment is already paid.
    pub is_paid: bool,
    pub is_fixed: bool,
    pub ignore_expense: bool,
}

/// The rows to insert for an installment purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentPlan {
    pub transactions: Vec<Transaction>,
    /// The signed amount to apply to the account at creation: the first installment's effect when
    /// the request is paid, otherwise zero.
    pub balance_delta: Decimal,
}

impl InstallmentPlan {
    /// The first installment. Later installments point at it through `original_transaction_id`.
    pub fn root(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    pub fn total(&self) -> Decimal {
        self.transactions.iter().map(|t| t.amount).sum()
    }
}

/// Splits `request` into `count` rows.
///
/// Installment `i` (zero based) is dated `i` calendar months after the start date, clamped to
/// the end of shorter months. In split mode each share is the total divided by `count`, rounded
/// to cents, and the last share absorbs the rounding remainder so the shares sum to the total
/// exactly.
pub fn expand_installments(
    request: &InstallmentRequest,
    label: &str,
) -> crate::Result<InstallmentPlan> {
    if !(2..=MAX_INSTALLMENTS).contains(&request.count) {
        return Err(Error::invalid(format!(
            "An installment purchase needs between 2 and {MAX_INSTALLMENTS} installments, got {}",
            request.count
        )));
    }
    check_magnitude(request.amount)?;
    Month::containing(request.start_date)?;
    let count = request.count as i32;

    let shares = split(request.amount, count, request.fixed_per_installment);
    let root_id = Uuid::new_v4();
    let mut transactions = Vec::with_capacity(shares.len());

    for (i, amount) in (0..count).zip(shares) {
        let date = Month::add_months(request.start_date, i).ok_or_else(|| {
            Error::invalid(format!(
                "Installment {} of {count} would fall after year {MAX_YEAR}",
                i + 1
            ))
        })?;
        let first = i == 0;
        transactions.push(Transaction {
            id: if first { root_id } else { Uuid::new_v4() },
            user_id: request.user_id,
            account_id: request.account_id,
            amount,
            transaction_type: request.transaction_type,
            category: request.category.clone(),
            date,
            due_date: date,
            created_at: date.and_time(NaiveTime::MIN),
            description: format!("{} ({label} {}/{count})", request.description, i + 1),
            is_paid: first && request.is_paid,
            is_fixed: request.is_fixed,
            is_installment: true,
            installment_count: count,
            ignore_expense: request.ignore_expense,
            is_repeat: false,
            repeat_interval: None,
            original_transaction_id: if first { None } else { Some(root_id) },
            repeat_number: Some(i + 1),
            total_repeats: Some(count),
            carried_over: false,
            posted: first && request.is_paid,
        });
    }

    let balance_delta = transactions
        .first()
        .filter(|t| t.posted)
        .map(Transaction::signed_amount)
        .unwrap_or_default();

    Ok(InstallmentPlan {
        transactions,
        balance_delta,
    })
}

fn split(amount: Decimal, count: i32, fixed: bool) -> Vec<Decimal> {
    if fixed {
        return vec![amount; count as usize];
    }
    let per = (amount / Decimal::from(count))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let remainder = amount - per * Decimal::from(count);
    let mut shares = vec![per; count as usize];
    if let Some(last) = shares.last_mut() {
        *last += remainder;
    }
    shares
}
