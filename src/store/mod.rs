//! The persistence seam.
//!
//! The engines never talk to a database directly. They read snapshots through [`LedgerStore`]
//! and hand back a [`Changeset`] that the store applies in one step. Two implementations ship
//! with the crate: [`MemoryStore`] and the SQLite-backed [`crate::db::Db`].

mod memory;

pub use memory::MemoryStore;

use crate::model::{Account, Category, Transaction};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Durable keyed storage of accounts, categories and transactions.
///
/// Reads are full scans per user; all month filtering happens in the engines.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All accounts owned by `user_id`, ordered by creation.
    async fn get_accounts(&self, user_id: Uuid) -> Result<Vec<Account>>;

    /// A single account, if it exists.
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>>;

    /// Persists a new account.
    async fn create_account(&self, account: &Account) -> Result<Account>;

    /// Overwrites the stored balance. When `expected_version` is given and does not match the
    /// stored version, fails with [`StoreConflict::VersionMismatch`] and writes nothing.
    async fn update_account_balance(
        &self,
        id: Uuid,
        new_balance: Decimal,
        expected_version: Option<i64>,
    ) -> Result<Account>;

    /// All categories owned by `user_id`.
    async fn get_categories(&self, user_id: Uuid) -> Result<Vec<Category>>;

    /// Persists a new category.
    async fn create_category(&self, category: &Category) -> Result<Category>;

    /// The whole ledger of `user_id`, ordered by `created_at`.
    async fn get_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>>;

    /// A single transaction, if it exists.
    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>>;

    /// Inserts one transaction without touching any balance.
    async fn create_transaction(&self, transaction: &Transaction) -> Result<Transaction>;

    /// Inserts a batch of transactions, all or none, without touching any balance.
    async fn create_transactions(&self, transactions: &[Transaction]) -> Result<Vec<Transaction>>;

    /// Inserts a rollover successor unless one already exists for the same origin in the same
    /// `created_at` month. Returns `false` when the insert was skipped.
    async fn insert_successor(&self, successor: &Transaction) -> Result<bool>;

    /// Deletes one row. Returns `false` if it did not exist.
    async fn delete_transaction(&self, id: Uuid) -> Result<bool>;

    /// Applies a changeset atomically: either every part of it lands or none does.
    async fn apply(&self, changes: &Changeset) -> Result<Applied>;
}

/// A group of writes that must land together.
///
/// Parts are applied in field order. Balance deltas go first, so a failure to reverse or post a
/// balance prevents every row change that depends on it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Changeset {
    /// Added to each account's stored balance (`balance = balance + delta`).
    pub balance_deltas: BTreeMap<Uuid, Decimal>,
    /// New rows.
    pub inserts: Vec<Transaction>,
    /// Rows to flip to paid.
    pub paid: Vec<PaidUpdate>,
    /// Rows to remove. Ids that are already gone are skipped.
    pub deletes: Vec<Uuid>,
}

impl Changeset {
    /// Accumulates `delta` onto the pending delta for `account_id`.
    pub fn add_delta(
        &mut self,
        account_id: Uuid,
        delta: Decimal,
    ) -> std::result::Result<(), StoreConflict> {
        let pending = self.balance_deltas.entry(account_id).or_default();
        *pending = pending
            .checked_add(delta)
            .ok_or(StoreConflict::BalanceOverflow(account_id))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.balance_deltas.is_empty()
            && self.inserts.is_empty()
            && self.paid.is_empty()
            && self.deletes.is_empty()
    }
}

/// Marks a row paid, and optionally posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaidUpdate {
    pub id: Uuid,
    pub posted: bool,
}

/// What a changeset did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Applied {
    pub deleted: usize,
}

/// Store-level refusals that callers may want to tell apart from infrastructure failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConflict {
    /// A balance write referenced an account that does not exist.
    MissingAccount(Uuid),
    /// Applying a delta would take the balance outside the representable range.
    BalanceOverflow(Uuid),
    /// A guarded balance write found a different version than expected.
    VersionMismatch {
        account_id: Uuid,
        expected: i64,
        actual: i64,
    },
}

impl Display for StoreConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConflict::MissingAccount(id) => write!(f, "Account {id} does not exist"),
            StoreConflict::BalanceOverflow(id) => {
                write!(f, "The balance of account {id} would overflow")
            }
            StoreConflict::VersionMismatch {
                account_id,
                expected,
                actual,
            } => write!(
                f,
                "Account {account_id} is at version {actual} but version {expected} was expected"
            ),
        }
    }
}

impl std::error::Error for StoreConflict {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_delta_accumulates() {
        let account = Uuid::new_v4();
        let mut changes = Changeset::default();
        assert!(changes.is_empty());
        changes.add_delta(account, Decimal::from(10)).unwrap();
        changes.add_delta(account, Decimal::from(-4)).unwrap();
        assert_eq!(changes.balance_deltas[&account], Decimal::from(6));
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_add_delta_refuses_overflow() {
        let account = Uuid::new_v4();
        let mut changes = Changeset::default();
        changes.add_delta(account, Decimal::MAX).unwrap();
        assert_eq!(
            changes.add_delta(account, Decimal::ONE),
            Err(StoreConflict::BalanceOverflow(account))
        );
        assert_eq!(changes.balance_deltas[&account], Decimal::MAX);
    }
}
