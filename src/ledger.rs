//! The `Ledger` service: the entry points a caller uses for each user action.
//!
//! Each operation reads a snapshot from the store, lets one of the engines plan the change and
//! writes the result back. No operation reads the wall clock; dates are always passed in.

use crate::balance::{total_stored_balance, MonthlyBalances};
use crate::deletion::{plan_deletion, DeletionReport};
use crate::error::{Error, ErrorType};
use crate::installments::{
    expand_installments, InstallmentPlan, InstallmentRequest, DEFAULT_INSTALLMENT_LABEL,
};
use crate::model::{
    check_magnitude, default_categories, Account, AccountType, Category, Month, Transaction,
    DEFAULT_ACCOUNT_NAME,
};
use crate::rollover::{plan_rollover, RolloverFailure, RolloverReport, DEFAULT_ROLLOVER_MARKER};
use crate::store::{Changeset, LedgerStore, PaidUpdate, StoreConflict};
use crate::Result;
use chrono::{NaiveDate, NaiveDateTime, SubsecRound};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Wording used when generating descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSettings {
    pub installment_label: String,
    pub rollover_marker: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            installment_label: DEFAULT_INSTALLMENT_LABEL.to_string(),
            rollover_marker: DEFAULT_ROLLOVER_MARKER.to_string(),
        }
    }
}

/// The outcome of [`Ledger::mark_paid`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaidReport {
    /// The transaction the caller asked to pay.
    pub requested: Uuid,
    /// The real ledger record that is now paid. For a carried row this is the origin of its
    /// rollover chain.
    pub paid: Uuid,
    /// Synthetic rollover successors removed because the item is settled.
    pub deleted: Vec<Uuid>,
    /// The amount newly applied to the account balance.
    pub balance_delta: Decimal,
    /// True when nothing had to change.
    pub already_paid: bool,
}

/// What [`Ledger::seed_defaults`] created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub account: Option<Account>,
    pub categories: usize,
}

/// Classifies a store failure for the caller.
fn store_error(e: impl Into<anyhow::Error>) -> Error {
    let e = e.into();
    let error_type = match e.downcast_ref::<StoreConflict>() {
        Some(StoreConflict::MissingAccount(_)) => ErrorType::NotFound,
        Some(StoreConflict::BalanceOverflow(_)) => ErrorType::InvalidArgument,
        Some(StoreConflict::VersionMismatch { .. }) => ErrorType::InconsistentState,
        None => ErrorType::StoreFailure,
    };
    Error::new(error_type, e)
}

/// The ledger operations, generic over where the data lives.
#[derive(Debug, Clone)]
pub struct Ledger<S> {
    store: S,
    settings: LedgerSettings,
}

impl<S> Ledger<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self::with_settings(store, LedgerSettings::default())
    }

    pub fn with_settings(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub async fn accounts(&self, user_id: Uuid) -> Result<Vec<Account>> {
        self.store.get_accounts(user_id).await.map_err(store_error)
    }

    pub async fn account(&self, id: Uuid) -> Result<Account> {
        self.store
            .get_account(id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| Error::not_found(format!("Account {id} does not exist")))
    }

    pub async fn categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
        self.store.get_categories(user_id).await.map_err(store_error)
    }

    pub async fn transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        self.store.get_transactions(user_id).await.map_err(store_error)
    }

    pub async fn transaction(&self, id: Uuid) -> Result<Transaction> {
        self.store
            .get_transaction(id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| Error::not_found(format!("Transaction {id} does not exist")))
    }

    /// Persists a new account. `created_at` is stored to the second.
    pub async fn create_account(&self, mut account: Account) -> Result<Account> {
        if account.name.trim().is_empty() {
            return Err(Error::invalid("An account needs a name"));
        }
        Month::containing(account.created_at.date())?;
        account.created_at = account.created_at.trunc_subsecs(0);
        let account = self
            .store
            .create_account(&account)
            .await
            .map_err(store_error)?;
        debug!("Created account '{}' ({})", account.name, account.id);
        Ok(account)
    }

    pub async fn create_category(&self, category: Category) -> Result<Category> {
        if category.name.trim().is_empty() {
            return Err(Error::invalid("A category needs a name"));
        }
        self.store
            .create_category(&category)
            .await
            .map_err(store_error)
    }

    /// Gives a user with no accounts the default account, and a user with no categories the
    /// default category set.
    pub async fn seed_defaults(&self, user_id: Uuid, now: NaiveDateTime) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        if self.accounts(user_id).await?.is_empty() {
            let account = Account::new(user_id, DEFAULT_ACCOUNT_NAME, AccountType::Checking, now);
            report.account = Some(self.create_account(account).await?);
        }
        if self.categories(user_id).await?.is_empty() {
            for category in default_categories(user_id) {
                self.create_category(category).await?;
                report.categories += 1;
            }
        }
        info!(
            "Seeded {} account(s) and {} categories",
            usize::from(report.account.is_some()),
            report.categories
        );
        Ok(report)
    }

    /// Overwrites an account's stored balance, optionally guarded by the version last read.
    pub async fn set_account_balance(
        &self,
        id: Uuid,
        new_balance: Decimal,
        expected_version: Option<i64>,
    ) -> Result<Account> {
        self.store
            .update_account_balance(id, new_balance, expected_version)
            .await
            .map_err(store_error)
    }

    /// Records a single transaction and applies its signed amount to the account in the same
    /// write.
    ///
    /// Installment purchases go through [`Ledger::record_installments`] instead.
    pub async fn record_transaction(&self, mut transaction: Transaction) -> Result<Transaction> {
        check_magnitude(transaction.amount)?;
        for day in [
            transaction.date,
            transaction.due_date,
            transaction.created_at.date(),
        ] {
            Month::containing(day)?;
        }
        if transaction.installment_count < 1 {
            return Err(Error::invalid("installment_count must be at least 1"));
        }
        if transaction.is_installment
            && transaction.installment_count > 1
            && !transaction.is_derived()
        {
            return Err(Error::invalid(
                "An installment purchase must be expanded into its installments",
            ));
        }
        let account = self.account(transaction.account_id).await?;
        if account.user_id != transaction.user_id {
            return Err(Error::invalid(format!(
                "Account {} does not belong to this user",
                account.id
            )));
        }

        transaction.posted = true;
        transaction.created_at = transaction.created_at.trunc_subsecs(0);
        let mut changes = Changeset::default();
        changes
            .add_delta(transaction.account_id, transaction.signed_amount())
            .map_err(store_error)?;
        changes.inserts.push(transaction.clone());
        self.store.apply(&changes).await.map_err(store_error)?;
        debug!(
            "Recorded {} of {} on account {}",
            transaction.transaction_type, transaction.amount, transaction.account_id
        );
        Ok(transaction)
    }

    /// Expands an installment purchase and writes every installment at once. Only the first
    /// installment touches the balance, and only when the request is paid.
    pub async fn record_installments(&self, request: &InstallmentRequest) -> Result<InstallmentPlan> {
        let plan = expand_installments(request, &self.settings.installment_label)?;
        let account = self.account(request.account_id).await?;
        if account.user_id != request.user_id {
            return Err(Error::invalid(format!(
                "Account {} does not belong to this user",
                account.id
            )));
        }

        let mut changes = Changeset::default();
        if !plan.balance_delta.is_zero() {
            changes
                .add_delta(request.account_id, plan.balance_delta)
                .map_err(store_error)?;
        }
        changes.inserts = plan.transactions.clone();
        self.store.apply(&changes).await.map_err(store_error)?;
        info!(
            "Recorded {} installments for '{}'",
            plan.transactions.len(),
            request.description
        );
        Ok(plan)
    }

    /// Recomputes balances for one month from the ledger.
    pub async fn monthly_balances(
        &self,
        user_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<MonthlyBalances> {
        let accounts = self.accounts(user_id).await?;
        let transactions = self.transactions(user_id).await?;
        MonthlyBalances::compute(&accounts, &transactions, year, month)
    }

    /// The sum of the stored account balances.
    pub async fn total_balance(&self, user_id: Uuid) -> Result<Decimal> {
        total_stored_balance(&self.accounts(user_id).await?)
    }

    /// Carries the previous month's unpaid transactions into `as_of`'s month.
    ///
    /// Each successor is written on its own. A failed write is recorded in the report and the
    /// remaining successors are still attempted. Running this twice for the same month creates
    /// nothing the second time.
    pub async fn rollover_unpaid(&self, user_id: Uuid, as_of: NaiveDate) -> Result<RolloverReport> {
        Month::containing(as_of)?;
        let ledger = self.transactions(user_id).await?;
        let plan = plan_rollover(&ledger, as_of, &self.settings.rollover_marker);
        let mut report = RolloverReport::new(&plan);

        for successor in plan.successors {
            let source_id = successor.original_transaction_id.unwrap_or_default();
            match self.store.insert_successor(&successor).await {
                Ok(true) => report.created.push(successor),
                Ok(false) => report.skipped.push(source_id),
                Err(e) => {
                    warn!("Unable to carry transaction {source_id} forward: {e:#}");
                    report.failures.push(RolloverFailure {
                        source_id,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        info!(
            "Rollover {} -> {}: {} created, {} skipped, {} failed",
            report.source_month,
            report.target_month,
            report.created.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Runs once when a session starts. Rollover problems are logged and the session goes on;
    /// the next session start tries again.
    pub async fn start_session(&self, user_id: Uuid, as_of: NaiveDate) -> Option<RolloverReport> {
        match self.rollover_unpaid(user_id, as_of).await {
            Ok(report) => {
                if !report.is_complete() {
                    warn!(
                        "{} transaction(s) could not be carried forward",
                        report.failures.len()
                    );
                }
                Some(report)
            }
            Err(e) => {
                error!("Rollover failed at session start: {e}");
                None
            }
        }
    }

    /// Deletes a transaction and its dependents, reversing whatever they had posted to account
    /// balances. The reversal and the deletes are written together.
    pub async fn delete_transaction(&self, id: Uuid) -> Result<DeletionReport> {
        let target = self.transaction(id).await?;
        let ledger = self.transactions(target.user_id).await?;
        let plan = plan_deletion(&target, &ledger)?;

        let applied = self
            .store
            .apply(&plan.changeset())
            .await
            .map_err(store_error)?;
        if applied.deleted != plan.ids.len() {
            warn!(
                "Planned to delete {} transaction(s) but {} were removed",
                plan.ids.len(),
                applied.deleted
            );
        }
        info!(
            "Deleted transaction {id} and {} dependent(s)",
            plan.ids.len() - 1
        );
        Ok(DeletionReport {
            target: plan.target,
            deleted: plan.ids,
            reversals: plan.reversals,
        })
    }

    /// Marks a transaction paid.
    ///
    /// Rollover successors are synthetic, so paying one settles the origin of its chain instead:
    /// the origin is flipped to paid and every carried copy of it is removed. Paying a row that
    /// never touched the balance posts it.
    pub async fn mark_paid(&self, id: Uuid) -> Result<PaidReport> {
        let requested = self.transaction(id).await?;
        let ledger = self.transactions(requested.user_id).await?;
        let by_id: HashMap<Uuid, &Transaction> = ledger.iter().map(|t| (t.id, t)).collect();

        let origin = origin_of(&requested, &by_id)?;
        let deleted = carried_copies(origin, &ledger)?;

        let mut changes = Changeset::default();
        let mut balance_delta = Decimal::ZERO;
        if !origin.is_paid || !origin.posted {
            if !origin.posted {
                balance_delta = origin.signed_amount();
                changes
                    .add_delta(origin.account_id, balance_delta)
                    .map_err(store_error)?;
            }
            changes.paid.push(PaidUpdate {
                id: origin.id,
                posted: true,
            });
        }
        changes.deletes = deleted.clone();

        let already_paid = changes.is_empty();
        if !already_paid {
            self.store.apply(&changes).await.map_err(store_error)?;
        }
        info!(
            "Marked {} paid, removed {} carried copies",
            origin.id,
            deleted.len()
        );
        Ok(PaidReport {
            requested: id,
            paid: origin.id,
            deleted,
            balance_delta,
            already_paid,
        })
    }
}

/// Follows carried rows back to the row they were copied from.
fn origin_of<'a>(
    start: &'a Transaction,
    by_id: &HashMap<Uuid, &'a Transaction>,
) -> Result<&'a Transaction> {
    let mut current = start;
    let mut steps = 0;
    while current.carried_over {
        let parent_id = current.original_transaction_id.ok_or_else(|| {
            Error::inconsistent(format!(
                "Carried transaction {} has no origin",
                current.id
            ))
        })?;
        current = by_id.get(&parent_id).copied().ok_or_else(|| {
            Error::inconsistent(format!(
                "Transaction {} was carried from {parent_id}, which no longer exists",
                current.id
            ))
        })?;
        steps += 1;
        if steps > by_id.len() {
            return Err(Error::inconsistent(format!(
                "The rollover chain of {} loops",
                start.id
            )));
        }
    }
    Ok(current)
}

/// Every carried successor descending from `origin` through carried links.
fn carried_copies(origin: &Transaction, ledger: &[Transaction]) -> Result<Vec<Uuid>> {
    let mut found = Vec::new();
    let mut seen = HashSet::from([origin.id]);
    let mut frontier = vec![origin.id];
    while let Some(parent) = frontier.pop() {
        for child in ledger
            .iter()
            .filter(|t| t.carried_over && t.original_transaction_id == Some(parent))
        {
            if !seen.insert(child.id) {
                return Err(Error::inconsistent(format!(
                    "The rollover chain of {} loops",
                    origin.id
                )));
            }
            found.push(child.id);
            frontier.push(child.id);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionType;
    use crate::store::{Applied, MemoryStore};
    use async_trait::async_trait;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        ledger: Ledger<MemoryStore>,
        user: Uuid,
        account: Account,
    }

    async fn fixture() -> Fixture {
        let ledger = Ledger::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let account = ledger
            .create_account(
                Account::new(
                    user,
                    "Main",
                    AccountType::Checking,
                    date(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap(),
                )
                .with_balance(dec("1000")),
            )
            .await
            .unwrap();
        Fixture {
            ledger,
            user,
            account,
        }
    }

    impl Fixture {
        fn tx(&self, t: TransactionType, amount: &str, on: NaiveDate) -> Transaction {
            Transaction::new(
                self.user,
                self.account.id,
                t,
                dec(amount),
                "Outros",
                "Item",
                on,
            )
        }

        async fn balance(&self) -> Decimal {
            self.ledger.account(self.account.id).await.unwrap().balance
        }

        fn request(&self, amount: &str, count: u32, paid: bool) -> InstallmentRequest {
            InstallmentRequest {
                user_id: self.user,
                account_id: self.account.id,
                amount: dec(amount),
                transaction_type: TransactionType::CreditExpense,
                category: "Parcelamento".to_string(),
                start_date: date(2025, 1, 15),
                count,
                fixed_per_installment: false,
                description: "Fridge".to_string(),
                is_paid: paid,
                is_fixed: false,
                ignore_expense: false,
            }
        }
    }

    #[tokio::test]
    async fn test_create_then_delete_restores_balances_for_every_type() {
        let f = fixture().await;
        for t in [
            TransactionType::Income,
            TransactionType::Expense,
            TransactionType::Transfer,
            TransactionType::CreditExpense,
        ] {
            let before_stored = f.balance().await;
            let before_month = f.ledger.monthly_balances(f.user, 2025, 3).await.unwrap();

            let row = f
                .ledger
                .record_transaction(f.tx(t, "42.10", date(2025, 3, 3)))
                .await
                .unwrap();
            assert_eq!(f.balance().await, before_stored + row.signed_amount());

            f.ledger.delete_transaction(row.id).await.unwrap();
            assert_eq!(f.balance().await, before_stored, "{t}");
            let after_month = f.ledger.monthly_balances(f.user, 2025, 3).await.unwrap();
            assert_eq!(after_month, before_month, "{t}");
        }
    }

    #[tokio::test]
    async fn test_record_rejects_bad_input() {
        let f = fixture().await;
        let zero = f.ledger.record_transaction(f.tx(TransactionType::Expense, "0", date(2025, 1, 1)));
        assert_eq!(zero.await.unwrap_err().error_type(), ErrorType::InvalidArgument);

        let mut unexpanded = f.tx(TransactionType::Expense, "10", date(2025, 1, 1));
        unexpanded.is_installment = true;
        unexpanded.installment_count = 3;
        let err = f.ledger.record_transaction(unexpanded).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);

        let mut nowhere = f.tx(TransactionType::Expense, "10", date(2025, 1, 1));
        nowhere.account_id = Uuid::new_v4();
        let err = f.ledger.record_transaction(nowhere).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_record_rejects_amounts_and_dates_out_of_range() {
        let f = fixture().await;
        let huge = f.tx(TransactionType::Expense, "50000000000000000000000000000", date(2025, 1, 1));
        let err = f.ledger.record_transaction(huge).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);

        let far = f.tx(TransactionType::Expense, "10", date(10000, 1, 1));
        let err = f.ledger.record_transaction(far).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);

        assert!(f.ledger.transactions(f.user).await.unwrap().is_empty());
        assert_eq!(f.balance().await, dec("1000"));
    }

    #[tokio::test]
    async fn test_record_refuses_to_overflow_the_stored_balance() {
        let f = fixture().await;
        f.ledger
            .set_account_balance(f.account.id, Decimal::MAX, None)
            .await
            .unwrap();
        let income = f.tx(TransactionType::Income, "1000000000000", date(2025, 1, 1));
        let err = f.ledger.record_transaction(income).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);

        assert_eq!(f.balance().await, Decimal::MAX);
        assert!(f.ledger.transactions(f.user).await.unwrap().is_empty());
        let total = f.ledger.total_balance(f.user).await.unwrap();
        assert_eq!(total, Decimal::MAX);
    }

    #[tokio::test]
    async fn test_timestamps_are_stored_to_the_second() {
        let f = fixture().await;
        let precise = date(2025, 3, 3).and_hms_nano_opt(10, 15, 30, 123_456_789).unwrap();
        let account = f
            .ledger
            .create_account(Account::new(f.user, "Savings", AccountType::Savings, precise))
            .await
            .unwrap();
        assert_eq!(account.created_at, date(2025, 3, 3).and_hms_opt(10, 15, 30).unwrap());
        assert_eq!(f.ledger.account(account.id).await.unwrap(), account);

        let mut row = f.tx(TransactionType::Expense, "5", date(2025, 3, 3));
        row.created_at = precise;
        let row = f.ledger.record_transaction(row).await.unwrap();
        assert_eq!(row.created_at, account.created_at);
        assert_eq!(f.ledger.transaction(row.id).await.unwrap(), row);
    }

    #[tokio::test]
    async fn test_installments_post_first_share_only_when_paid() {
        let f = fixture().await;
        let plan = f
            .ledger
            .record_installments(&f.request("100", 3, true))
            .await
            .unwrap();
        assert_eq!(plan.transactions.len(), 3);
        assert_eq!(f.balance().await, dec("966.67"));
        assert_eq!(f.ledger.transactions(f.user).await.unwrap().len(), 3);

        let unpaid = fixture().await;
        unpaid
            .ledger
            .record_installments(&unpaid.request("100", 3, false))
            .await
            .unwrap();
        assert_eq!(unpaid.balance().await, dec("1000"));
    }

    #[tokio::test]
    async fn test_deleting_root_installment_removes_all_and_reverses_first_share() {
        let f = fixture().await;
        let keep = f
            .ledger
            .record_transaction(f.tx(TransactionType::Expense, "5", date(2025, 1, 2)))
            .await
            .unwrap();
        let plan = f
            .ledger
            .record_installments(&f.request("100", 3, true))
            .await
            .unwrap();
        let root = plan.root().unwrap().id;

        let report = f.ledger.delete_transaction(root).await.unwrap();
        assert_eq!(report.deleted.len(), 3);
        assert_eq!(f.balance().await, dec("995"));
        let remaining = f.ledger.transactions(f.user).await.unwrap();
        assert_eq!(remaining, vec![keep]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let f = fixture().await;
        let err = f.ledger.delete_transaction(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_failed_reversal_deletes_nothing() {
        let f = fixture().await;
        let row = f
            .ledger
            .record_transaction(f.tx(TransactionType::Expense, "10", date(2025, 1, 2)))
            .await
            .unwrap();
        f.ledger.store().forget_account(f.account.id).await;

        let err = f.ledger.delete_transaction(row.id).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
        assert!(f.ledger.store().get_transaction(row.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollover_then_pay_in_february() {
        let f = fixture().await;
        let mut jan = f.tx(TransactionType::Expense, "150", date(2025, 1, 20));
        jan.description = "Internet".to_string();
        let jan = f.ledger.record_transaction(jan).await.unwrap();
        assert_eq!(f.balance().await, dec("850"));

        let report = f
            .ledger
            .start_session(f.user, date(2025, 2, 1))
            .await
            .unwrap();
        assert_eq!(report.created.len(), 1);
        let feb = report.created[0].clone();
        assert_eq!(feb.original_transaction_id, Some(jan.id));
        assert_eq!(feb.month(), Month::new(2025, 2).unwrap());
        assert!(!feb.is_paid);

        let february = f.ledger.monthly_balances(f.user, 2025, 2).await.unwrap();
        assert_eq!(february.total_expenses, dec("150"));

        let paid = f.ledger.mark_paid(feb.id).await.unwrap();
        assert_eq!(paid.paid, jan.id);
        assert_eq!(paid.deleted, vec![feb.id]);
        assert_eq!(paid.balance_delta, Decimal::ZERO);
        assert!(f.ledger.store().get_transaction(feb.id).await.unwrap().is_none());
        assert!(f.ledger.transaction(jan.id).await.unwrap().is_paid);
        assert_eq!(f.balance().await, dec("850"));

        // Nothing left to carry into March.
        let march = f.ledger.rollover_unpaid(f.user, date(2025, 3, 1)).await.unwrap();
        assert!(march.created.is_empty());
    }

    #[tokio::test]
    async fn test_rollover_is_idempotent() {
        let f = fixture().await;
        f.ledger
            .record_transaction(f.tx(TransactionType::Expense, "150", date(2025, 1, 20)))
            .await
            .unwrap();
        let first = f.ledger.rollover_unpaid(f.user, date(2025, 2, 1)).await.unwrap();
        let second = f.ledger.rollover_unpaid(f.user, date(2025, 2, 9)).await.unwrap();
        assert_eq!(first.created.len(), 1);
        assert!(second.created.is_empty());
        assert_eq!(second.skipped.len(), 1);
        assert_eq!(f.ledger.transactions(f.user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rollover_failures_are_independent() {
        let f = fixture().await;
        let other = f
            .ledger
            .create_account(Account::new(
                f.user,
                "Card",
                AccountType::Credit,
                date(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap(),
            ))
            .await
            .unwrap();
        f.ledger
            .record_transaction(f.tx(TransactionType::Expense, "10", date(2025, 1, 3)))
            .await
            .unwrap();
        let mut doomed = f.tx(TransactionType::Expense, "20", date(2025, 1, 4));
        doomed.account_id = other.id;
        let doomed = f.ledger.record_transaction(doomed).await.unwrap();
        f.ledger.store().forget_account(other.id).await;

        let report = f.ledger.start_session(f.user, date(2025, 2, 1)).await.unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source_id, doomed.id);
    }

    #[tokio::test]
    async fn test_paying_a_chain_collapses_it() {
        let f = fixture().await;
        let mut request = f.request("90", 3, false);
        request.start_date = date(2025, 1, 10);
        let plan = f.ledger.record_installments(&request).await.unwrap();
        let first = plan.root().unwrap().clone();

        f.ledger.rollover_unpaid(f.user, date(2025, 2, 1)).await.unwrap();
        let march = f.ledger.rollover_unpaid(f.user, date(2025, 3, 1)).await.unwrap();
        // The February copy of the first share and the second share both roll into March.
        assert_eq!(march.created.len(), 2);
        let march_copy = march
            .created
            .iter()
            .find(|t| t.description.starts_with("Fridge (Parcela 1/3)"))
            .unwrap()
            .clone();

        let paid = f.ledger.mark_paid(march_copy.id).await.unwrap();
        assert_eq!(paid.paid, first.id);
        assert_eq!(paid.deleted.len(), 2);
        assert_eq!(paid.balance_delta, dec("-30"));
        assert_eq!(f.balance().await, dec("970"));
        let settled = f.ledger.transaction(first.id).await.unwrap();
        assert!(settled.is_paid && settled.posted);

        let again = f.ledger.mark_paid(first.id).await.unwrap();
        assert!(again.already_paid);
        assert_eq!(f.balance().await, dec("970"));
    }

    #[tokio::test]
    async fn test_paying_a_plain_unposted_row_posts_it() {
        let f = fixture().await;
        let plan = f
            .ledger
            .record_installments(&f.request("100", 2, false))
            .await
            .unwrap();
        let second = plan.transactions[1].clone();
        let report = f.ledger.mark_paid(second.id).await.unwrap();
        assert_eq!(report.paid, second.id);
        assert!(report.deleted.is_empty());
        assert_eq!(f.balance().await, dec("950"));
    }

    #[tokio::test]
    async fn test_seed_defaults_once() {
        let ledger = Ledger::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let now = date(2025, 1, 1).and_hms_opt(9, 0, 0).unwrap();
        let report = ledger.seed_defaults(user, now).await.unwrap();
        assert_eq!(
            report.account.as_ref().map(|a| a.name.as_str()),
            Some(DEFAULT_ACCOUNT_NAME)
        );
        assert_eq!(report.categories, 20);

        let again = ledger.seed_defaults(user, now).await.unwrap();
        assert_eq!(again, SeedReport::default());
        assert_eq!(ledger.accounts(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_account_balance_version_conflict() {
        let f = fixture().await;
        f.ledger
            .set_account_balance(f.account.id, dec("10"), Some(0))
            .await
            .unwrap();
        let err = f
            .ledger
            .set_account_balance(f.account.id, dec("11"), Some(0))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InconsistentState);
        assert_eq!(f.ledger.total_balance(f.user).await.unwrap(), dec("10"));
    }

    /// Delegates to a [`MemoryStore`] but cannot read transactions.
    struct UnreadableLedger(MemoryStore);

    #[async_trait]
    impl LedgerStore for UnreadableLedger {
        async fn get_accounts(&self, user_id: Uuid) -> anyhow::Result<Vec<Account>> {
            self.0.get_accounts(user_id).await
        }

        async fn get_account(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
            self.0.get_account(id).await
        }

        async fn create_account(&self, account: &Account) -> anyhow::Result<Account> {
            self.0.create_account(account).await
        }

        async fn update_account_balance(
            &self,
            id: Uuid,
            new_balance: Decimal,
            expected_version: Option<i64>,
        ) -> anyhow::Result<Account> {
            self.0
                .update_account_balance(id, new_balance, expected_version)
                .await
        }

        async fn get_categories(&self, user_id: Uuid) -> anyhow::Result<Vec<Category>> {
            self.0.get_categories(user_id).await
        }

        async fn create_category(&self, category: &Category) -> anyhow::Result<Category> {
            self.0.create_category(category).await
        }

        async fn get_transactions(&self, _user_id: Uuid) -> anyhow::Result<Vec<Transaction>> {
            anyhow::bail!("connection reset")
        }

        async fn get_transaction(&self, id: Uuid) -> anyhow::Result<Option<Transaction>> {
            self.0.get_transaction(id).await
        }

        async fn create_transaction(
            &self,
            transaction: &Transaction,
        ) -> anyhow::Result<Transaction> {
            self.0.create_transaction(transaction).await
        }

        async fn create_transactions(
            &self,
            transactions: &[Transaction],
        ) -> anyhow::Result<Vec<Transaction>> {
            self.0.create_transactions(transactions).await
        }

        async fn insert_successor(&self, successor: &Transaction) -> anyhow::Result<bool> {
            self.0.insert_successor(successor).await
        }

        async fn delete_transaction(&self, id: Uuid) -> anyhow::Result<bool> {
            self.0.delete_transaction(id).await
        }

        async fn apply(&self, changes: &Changeset) -> anyhow::Result<Applied> {
            self.0.apply(changes).await
        }
    }

    #[tokio::test]
    async fn test_session_survives_an_unreadable_ledger() {
        let ledger = Ledger::new(UnreadableLedger(MemoryStore::new()));
        let user = Uuid::new_v4();

        let err = ledger
            .rollover_unpaid(user, date(2025, 2, 3))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::StoreFailure);
        assert!(ledger.start_session(user, date(2025, 2, 3)).await.is_none());

        // The rest of the ledger stays usable.
        let report = ledger
            .seed_defaults(user, date(2025, 2, 3).and_hms_opt(8, 0, 0).unwrap())
            .await
            .unwrap();
        assert!(report.account.is_some());
    }
}
