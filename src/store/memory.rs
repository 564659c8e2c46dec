//! An in-process [`LedgerStore`].

use crate::model::{Account, Category, Transaction};
use crate::store::{Applied, Changeset, LedgerStore, StoreConflict};
use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;
use uuid::Uuid;

/// Keeps everything in memory behind a single lock. Cloning shares the same underlying data.
///
/// Account references are enforced the way the SQLite schema enforces them: a transaction can
/// only be inserted against an existing account.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Debug, Default, Clone)]
struct State {
    accounts: Vec<Account>,
    categories: Vec<Category>,
    transactions: Vec<Transaction>,
}

impl State {
    fn account_mut(&mut self, id: Uuid) -> Result<&mut Account> {
        match self.accounts.iter_mut().find(|a| a.id == id) {
            Some(account) => Ok(account),
            None => Err(StoreConflict::MissingAccount(id).into()),
        }
    }

    fn insert(&mut self, transaction: &Transaction) -> Result<()> {
        if !self.accounts.iter().any(|a| a.id == transaction.account_id) {
            return Err(StoreConflict::MissingAccount(transaction.account_id).into());
        }
        if self.transactions.iter().any(|t| t.id == transaction.id) {
            bail!("Transaction {} already exists", transaction.id);
        }
        self.transactions.push(transaction.clone());
        Ok(())
    }

    fn apply(&mut self, changes: &Changeset) -> Result<Applied> {
        for (account_id, delta) in &changes.balance_deltas {
            let account = self.account_mut(*account_id)?;
            account.balance = account
                .balance
                .checked_add(*delta)
                .ok_or(StoreConflict::BalanceOverflow(*account_id))?;
            account.version += 1;
        }
        for transaction in &changes.inserts {
            self.insert(transaction)?;
        }
        for update in &changes.paid {
            let Some(row) = self.transactions.iter_mut().find(|t| t.id == update.id) else {
                bail!("Transaction {} does not exist", update.id);
            };
            row.is_paid = true;
            row.posted = row.posted || update.posted;
        }
        let before = self.transactions.len();
        self.transactions
            .retain(|t| !changes.deletes.contains(&t.id));
        Ok(Applied {
            deleted: before - self.transactions.len(),
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes an account record without touching its transactions.
    #[cfg(test)]
    pub(crate) async fn forget_account(&self, id: Uuid) {
        self.inner.lock().await.accounts.retain(|a| a.id != id);
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_accounts(&self, user_id: Uuid) -> Result<Vec<Account>> {
        let state = self.inner.lock().await;
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        let state = self.inner.lock().await;
        Ok(state.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn create_account(&self, account: &Account) -> Result<Account> {
        let mut state = self.inner.lock().await;
        if state.accounts.iter().any(|a| a.id == account.id) {
            bail!("Account {} already exists", account.id);
        }
        state.accounts.push(account.clone());
        Ok(account.clone())
    }

    async fn update_account_balance(
        &self,
        id: Uuid,
        new_balance: Decimal,
        expected_version: Option<i64>,
    ) -> Result<Account> {
        let mut state = self.inner.lock().await;
        let account = state.account_mut(id)?;
        if let Some(expected) = expected_version {
            if account.version != expected {
                return Err(StoreConflict::VersionMismatch {
                    account_id: id,
                    expected,
                    actual: account.version,
                }
                .into());
            }
        }
        account.balance = new_balance;
        account.version += 1;
        Ok(account.clone())
    }

    async fn get_categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let state = self.inner.lock().await;
        Ok(state
            .categories
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_category(&self, category: &Category) -> Result<Category> {
        let mut state = self.inner.lock().await;
        state.categories.push(category.clone());
        Ok(category.clone())
    }

    async fn get_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        let state = self.inner.lock().await;
        let mut transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        transactions.sort_by_key(|t| t.created_at);
        Ok(transactions)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let state = self.inner.lock().await;
        Ok(state.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn create_transaction(&self, transaction: &Transaction) -> Result<Transaction> {
        let mut state = self.inner.lock().await;
        state.insert(transaction)?;
        Ok(transaction.clone())
    }

    async fn create_transactions(&self, transactions: &[Transaction]) -> Result<Vec<Transaction>> {
        let mut state = self.inner.lock().await;
        let mut staged = state.clone();
        for transaction in transactions {
            staged.insert(transaction)?;
        }
        *state = staged;
        Ok(transactions.to_vec())
    }

    async fn insert_successor(&self, successor: &Transaction) -> Result<bool> {
        let mut state = self.inner.lock().await;
        let month = successor.month();
        let exists = state.transactions.iter().any(|t| {
            t.carried_over
                && t.original_transaction_id == successor.original_transaction_id
                && t.month() == month
        });
        if exists {
            trace!(
                "Successor of {:?} already exists in {month}",
                successor.original_transaction_id
            );
            return Ok(false);
        }
        state.insert(successor)?;
        Ok(true)
    }

    async fn delete_transaction(&self, id: Uuid) -> Result<bool> {
        let mut state = self.inner.lock().await;
        let before = state.transactions.len();
        state.transactions.retain(|t| t.id != id);
        Ok(state.transactions.len() < before)
    }

    async fn apply(&self, changes: &Changeset) -> Result<Applied> {
        let mut state = self.inner.lock().await;
        let mut staged = state.clone();
        let applied = staged.apply(changes)?;
        *state = staged;
        Ok(applied)
    }
}
