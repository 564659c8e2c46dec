//! This module is responsible for reading, writing and managing the SQLite database.

mod migrations;

use crate::error::Res;
use crate::model::{Account, Category, Transaction};
use crate::store::{Applied, Changeset, LedgerStore, StoreConflict};
use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Fractional seconds are written only when present and are optional when parsing.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const TRANSACTION_COLUMNS: &str = "id, user_id, account_id, amount, type, category, date, \
    due_date, created_at, description, is_paid, is_fixed, is_installment, installment_count, \
    ignore_expense, is_repeat, repeat_interval, original_transaction_id, repeat_number, \
    total_repeats, carried_over, posted";

/// The SQLite-backed [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
    path: PathBuf,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at '{}'", path.display());
        }
        let pool = connect(path, true).await?;
        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .context("Failed to create schema_version table")?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .context("Failed to insert initial schema version")?;
        migrations::run(&pool, 0, migrations::CURRENT_VERSION).await?;
        debug!("Created database at {}", path.display());
        Ok(Self {
            pool,
            path: path.to_owned(),
        })
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Brings the schema up to date if it is behind
    pub(crate) async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        let pool = connect(path, false).await?;
        let (version,): (i32,) = sqlx::query_as("SELECT version FROM schema_version")
            .fetch_one(&pool)
            .await
            .context("Unable to read the schema version")?;
        if version > migrations::CURRENT_VERSION {
            bail!(
                "The database schema is at version {version}, which is newer than this program \
                supports ({})",
                migrations::CURRENT_VERSION
            );
        }
        migrations::run(&pool, version, migrations::CURRENT_VERSION).await?;
        Ok(Self {
            pool,
            path: path.to_owned(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn connect(path: &Path, create: bool) -> Res<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .context("Failed to parse SQLite connection string")?
        .create_if_missing(create)
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .with_context(|| format!("Unable to open SQLite database at '{}'", path.display()))
}

fn parse_uuid(s: &str) -> Res<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("Invalid id '{s}' in database"))
}

fn parse_decimal(s: &str) -> Res<Decimal> {
    Decimal::from_str(s).with_context(|| format!("Invalid decimal '{s}' in database"))
}

fn parse_date(s: &str) -> Res<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("Invalid date '{s}'"))
}

fn parse_timestamp(s: &str) -> Res<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid timestamp '{s}'"))
}

fn account_from_row(row: &SqliteRow) -> Res<Account> {
    Ok(Account {
        id: parse_uuid(row.try_get("id")?)?,
        user_id: parse_uuid(row.try_get("user_id")?)?,
        name: row.try_get("name")?,
        account_type: row.try_get::<&str, _>("type")?.parse()?,
        balance: parse_decimal(row.try_get("balance")?)?,
        version: row.try_get("version")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}

fn category_from_row(row: &SqliteRow) -> Res<Category> {
    Ok(Category {
        id: parse_uuid(row.try_get("id")?)?,
        user_id: parse_uuid(row.try_get("user_id")?)?,
        name: row.try_get("name")?,
        category_type: row.try_get::<&str, _>("type")?.parse()?,
        color: row.try_get("color")?,
        icon: row.try_get("icon")?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Res<Transaction> {
    let original: Option<&str> = row.try_get("original_transaction_id")?;
    Ok(Transaction {
        id: parse_uuid(row.try_get("id")?)?,
        user_id: parse_uuid(row.try_get("user_id")?)?,
        account_id: parse_uuid(row.try_get("account_id")?)?,
        amount: parse_decimal(row.try_get("amount")?)?,
        transaction_type: row.try_get::<&str, _>("type")?.parse()?,
        category: row.try_get("category")?,
        date: parse_date(row.try_get("date")?)?,
        due_date: parse_date(row.try_get("due_date")?)?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        description: row.try_get("description")?,
        is_paid: row.try_get("is_paid")?,
        is_fixed: row.try_get("is_fixed")?,
        is_installment: row.try_get("is_installment")?,
        installment_count: row.try_get("installment_count")?,
        ignore_expense: row.try_get("ignore_expense")?,
        is_repeat: row.try_get("is_repeat")?,
        repeat_interval: row.try_get("repeat_interval")?,
        original_transaction_id: original.map(parse_uuid).transpose()?,
        repeat_number: row.try_get("repeat_number")?,
        total_repeats: row.try_get("total_repeats")?,
        carried_over: row.try_get("carried_over")?,
        posted: row.try_get("posted")?,
    })
}

/// Inserts one transaction row. With `or_ignore`, a row that violates a uniqueness constraint is
/// skipped and `0` is returned.
async fn insert_transaction(
    conn: &mut SqliteConnection,
    t: &Transaction,
    or_ignore: bool,
) -> Res<u64> {
    let verb = if or_ignore {
        "INSERT OR IGNORE"
    } else {
        "INSERT"
    };
    let sql = format!(
        "{verb} INTO transactions ({TRANSACTION_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    let result = sqlx::query(&sql)
        .bind(t.id.to_string())
        .bind(t.user_id.to_string())
        .bind(t.account_id.to_string())
        .bind(t.amount.to_string())
        .bind(t.transaction_type.to_string())
        .bind(&t.category)
        .bind(t.date.format(DATE_FORMAT).to_string())
        .bind(t.due_date.format(DATE_FORMAT).to_string())
        .bind(t.created_at.format(TIMESTAMP_FORMAT).to_string())
        .bind(&t.description)
        .bind(t.is_paid)
        .bind(t.is_fixed)
        .bind(t.is_installment)
        .bind(t.installment_count)
        .bind(t.ignore_expense)
        .bind(t.is_repeat)
        .bind(t.repeat_interval)
        .bind(t.original_transaction_id.map(|id| id.to_string()))
        .bind(t.repeat_number)
        .bind(t.total_repeats)
        .bind(t.carried_over)
        .bind(t.posted)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Unable to insert transaction {}", t.id))?;
    Ok(result.rows_affected())
}

async fn fetch_account(conn: &mut SqliteConnection, id: Uuid) -> Res<Option<Account>> {
    let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("Unable to read account {id}"))?;
    row.as_ref().map(account_from_row).transpose()
}

/// Writes a new balance, guarded by the version that was read. Decimal balances are stored as
/// text, so the arithmetic happens here and the version check stands in for an in-SQL increment.
async fn write_balance(
    conn: &mut SqliteConnection,
    account: &Account,
    new_balance: Decimal,
) -> Res<()> {
    let result =
        sqlx::query("UPDATE accounts SET balance = ?, version = version + 1 WHERE id = ? AND version = ?")
            .bind(new_balance.to_string())
            .bind(account.id.to_string())
            .bind(account.version)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Unable to update balance of account {}", account.id))?;
    if result.rows_affected() == 0 {
        let actual = fetch_account(conn, account.id)
            .await?
            .map(|a| a.version)
            .unwrap_or_default();
        return Err(StoreConflict::VersionMismatch {
            account_id: account.id,
            expected: account.version,
            actual,
        }
        .into());
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for Db {
    async fn get_accounts(&self, user_id: Uuid) -> Res<Vec<Account>> {
        let rows = sqlx::query("SELECT * FROM accounts WHERE user_id = ? ORDER BY created_at, id")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Unable to query accounts")?;
        rows.iter().map(account_from_row).collect()
    }

    async fn get_account(&self, id: Uuid) -> Res<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        fetch_account(&mut conn, id).await
    }

    async fn create_account(&self, account: &Account) -> Res<Account> {
        sqlx::query(
            "INSERT INTO accounts (id, user_id, name, type, balance, version, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(account.id.to_string())
        .bind(account.user_id.to_string())
        .bind(&account.name)
        .bind(account.account_type.to_string())
        .bind(account.balance.to_string())
        .bind(account.version)
        .bind(account.created_at.format(TIMESTAMP_FORMAT).to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Unable to insert account '{}'", account.name))?;
        Ok(account.clone())
    }

    async fn update_account_balance(
        &self,
        id: Uuid,
        new_balance: Decimal,
        expected_version: Option<i64>,
    ) -> Res<Account> {
        let mut tx = self.pool.begin().await?;
        let account = fetch_account(&mut tx, id)
            .await?
            .ok_or(StoreConflict::MissingAccount(id))?;
        if let Some(expected) = expected_version {
            if expected != account.version {
                return Err(StoreConflict::VersionMismatch {
                    account_id: id,
                    expected,
                    actual: account.version,
                }
                .into());
            }
        }
        write_balance(&mut tx, &account, new_balance).await?;
        tx.commit().await.context("Unable to commit balance update")?;
        Ok(Account {
            balance: new_balance,
            version: account.version + 1,
            ..account
        })
    }

    async fn get_categories(&self, user_id: Uuid) -> Res<Vec<Category>> {
        let rows = sqlx::query("SELECT * FROM categories WHERE user_id = ? ORDER BY rowid")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Unable to query categories")?;
        rows.iter().map(category_from_row).collect()
    }

    async fn create_category(&self, category: &Category) -> Res<Category> {
        sqlx::query(
            "INSERT INTO categories (id, user_id, name, type, color, icon) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(category.id.to_string())
        .bind(category.user_id.to_string())
        .bind(&category.name)
        .bind(category.category_type.to_string())
        .bind(&category.color)
        .bind(&category.icon)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Unable to insert category '{}'", category.name))?;
        Ok(category.clone())
    }

    async fn get_transactions(&self, user_id: Uuid) -> Res<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = ? \
             ORDER BY created_at, rowid"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Unable to query transactions")?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn get_transaction(&self, id: Uuid) -> Res<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Unable to read transaction {id}"))?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn create_transaction(&self, transaction: &Transaction) -> Res<Transaction> {
        let mut conn = self.pool.acquire().await?;
        insert_transaction(&mut conn, transaction, false).await?;
        Ok(transaction.clone())
    }

    async fn create_transactions(&self, transactions: &[Transaction]) -> Res<Vec<Transaction>> {
        let mut tx = self.pool.begin().await?;
        for transaction in transactions {
            insert_transaction(&mut tx, transaction, false).await?;
        }
        tx.commit()
            .await
            .context("Unable to commit transaction batch")?;
        Ok(transactions.to_vec())
    }

    async fn insert_successor(&self, successor: &Transaction) -> Res<bool> {
        let mut conn = self.pool.acquire().await?;
        let inserted = insert_transaction(&mut conn, successor, true).await? > 0;
        if !inserted {
            trace!(
                "Successor of {:?} already exists in {}",
                successor.original_transaction_id,
                successor.month()
            );
        }
        Ok(inserted)
    }

    async fn delete_transaction(&self, id: Uuid) -> Res<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Unable to delete transaction {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply(&self, changes: &Changeset) -> Res<Applied> {
        let mut tx = self.pool.begin().await?;

        for (account_id, delta) in &changes.balance_deltas {
            let account = fetch_account(&mut tx, *account_id)
                .await?
                .ok_or(StoreConflict::MissingAccount(*account_id))?;
            let balance = account
                .balance
                .checked_add(*delta)
                .ok_or(StoreConflict::BalanceOverflow(*account_id))?;
            write_balance(&mut tx, &account, balance).await?;
        }

        for transaction in &changes.inserts {
            insert_transaction(&mut tx, transaction, false).await?;
        }

        for update in &changes.paid {
            let result = sqlx::query(
                "UPDATE transactions SET is_paid = 1, posted = (posted OR ?) WHERE id = ?",
            )
            .bind(update.posted)
            .bind(update.id.to_string())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to mark transaction {} paid", update.id))?;
            if result.rows_affected() == 0 {
                bail!("Transaction {} does not exist", update.id);
            }
        }

        let mut deleted = 0;
        for id in &changes.deletes {
            let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Unable to delete transaction {id}"))?;
            deleted += result.rows_affected() as usize;
        }

        tx.commit().await.context("Unable to commit changes")?;
        Ok(Applied { deleted })
    }
}
