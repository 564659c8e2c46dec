//! Transaction command handlers.

use crate::args::{TxAddArgs, TxIdArgs};
use crate::commands::Out;
use crate::db::Db;
use crate::deletion::DeletionReport;
use crate::error::Error;
use crate::installments::InstallmentRequest;
use crate::ledger::{Ledger, PaidReport};
use crate::model::{Amount, Month, Transaction};
use crate::{Config, Result};
use chrono::NaiveDate;
use uuid::Uuid;

/// Records a transaction, or expands an installment purchase when `--installments` is given.
///
/// The transaction is recorded against `--account`, or the user's first account when none is
/// given. Single transactions are applied to the account balance immediately. An installment
/// purchase applies only its first installment, and only when `--paid` is set.
///
/// # Errors
///
/// - `InvalidArgument` if the amount is not positive or fewer than two installments are asked for.
/// - `NotFound` if the account does not exist or the user has no accounts.
pub async fn tx_add(
    config: Config,
    args: TxAddArgs,
    today: NaiveDate,
) -> Result<Out<Vec<Transaction>>> {
    let ledger = config.ledger();
    let account_id = resolve_account(&ledger, config.user_id(), args.account).await?;
    let date = args.date.unwrap_or(today);

    if let Some(count) = args.installments {
        let request = InstallmentRequest {
            user_id: config.user_id(),
            account_id,
            amount: args.amount.value(),
            transaction_type: args.transaction_type,
            category: args.category,
            start_date: date,
            count,
            fixed_per_installment: args.per_installment,
            description: args.description,
            is_paid: args.paid,
            is_fixed: args.fixed,
            ignore_expense: args.ignore_expense,
        };
        let plan = ledger.record_installments(&request).await?;
        return Ok(Out::new(
            format!(
                "Recorded {} installments totaling {}",
                plan.transactions.len(),
                Amount::new(plan.total())
            ),
            plan.transactions,
        ));
    }

    let mut transaction = Transaction::new(
        config.user_id(),
        account_id,
        args.transaction_type,
        args.amount.value(),
        args.category,
        args.description,
        date,
    );
    transaction.is_paid = args.paid;
    transaction.is_fixed = args.fixed;
    transaction.ignore_expense = args.ignore_expense;
    let transaction = ledger.record_transaction(transaction).await?;
    Ok(Out::new(
        format!(
            "Recorded {} of {} with id {}",
            transaction.transaction_type,
            Amount::new(transaction.amount),
            transaction.id
        ),
        vec![transaction],
    ))
}

/// Marks a transaction paid. Paying a transaction carried over from an earlier month settles the
/// transaction it was carried from.
pub async fn tx_pay(config: Config, args: TxIdArgs) -> Result<Out<PaidReport>> {
    let report = config.ledger().mark_paid(args.id).await?;
    let message = if report.already_paid {
        format!("Transaction {} was already paid", report.paid)
    } else {
        format!(
            "Marked {} paid and removed {} carried copies",
            report.paid,
            report.deleted.len()
        )
    };
    Ok(Out::new(message, report))
}

/// Deletes a transaction and everything derived from it, restoring account balances.
pub async fn tx_delete(config: Config, args: TxIdArgs) -> Result<Out<DeletionReport>> {
    let report = config.ledger().delete_transaction(args.id).await?;
    Ok(Out::new(
        format!("Deleted {} transaction(s)", report.deleted.len()),
        report,
    ))
}

/// Lists the transactions that belong to `month`.
pub async fn tx_list(config: Config, month: Month) -> Result<Out<Vec<Transaction>>> {
    let transactions: Vec<Transaction> = config
        .ledger()
        .transactions(config.user_id())
        .await?
        .into_iter()
        .filter(|t| month.contains(t.created_at))
        .collect();
    Ok(Out::new(
        format!("{} transaction(s) in {month}", transactions.len()),
        transactions,
    ))
}

async fn resolve_account(ledger: &Ledger<Db>, user_id: Uuid, id: Option<Uuid>) -> Result<Uuid> {
    if let Some(id) = id {
        return Ok(id);
    }
    ledger
        .accounts(user_id)
        .await?
        .first()
        .map(|a| a.id)
        .ok_or_else(|| Error::not_found("There are no accounts, run `pocket init` first"))
}
