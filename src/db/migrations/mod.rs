//! Database schema migrations.
//!
//! Each schema version has a pair of SQL files in this directory:
//! - `migration_NN_up.sql` moves the schema from version `NN-1` to `NN`
//! - `migration_NN_down.sql` moves it back from `NN` to `NN-1`

use crate::error::Res;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

struct Migration {
    version: i32,
    up_sql: &'static str,
    down_sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up_sql: include_str!("migration_01_up.sql"),
    down_sql: include_str!("migration_01_down.sql"),
}];

/// The schema version this build of the crate expects.
pub(crate) const CURRENT_VERSION: i32 = 1;

/// Moves the schema from `from` to `to`, one version at a time.
///
/// Every step runs in its own transaction together with the `schema_version` update, so an
/// interrupted migration leaves the database at the last completed version. All steps are checked
/// for existence before the first one runs.
pub(crate) async fn run(pool: &SqlitePool, from: i32, to: i32) -> Res<()> {
    if from == to {
        debug!("Schema already at version {to}");
        return Ok(());
    }
    validate_migrations(from, to)?;

    if from < to {
        for version in (from + 1)..=to {
            debug!("Migrating schema up to {version:02}");
            step(pool, migration(version)?.up_sql, version).await?;
        }
    } else {
        for version in ((to + 1)..=from).rev() {
            debug!("Migrating schema down from {version:02}");
            step(pool, migration(version)?.down_sql, version - 1).await?;
        }
    }

    debug!("Schema now at version {to}");
    Ok(())
}

fn migration(version: i32) -> Res<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Migration {version} not found"))
}

async fn step(pool: &SqlitePool, sql: &str, new_version: i32) -> Res<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin migration transaction")?;

    tx.execute(sql)
        .await
        .context("Failed to execute migration SQL")?;

    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(new_version)
        .execute(&mut *tx)
        .await
        .context("Failed to update schema_version")?;

    tx.commit()
        .await
        .context("Failed to commit migration transaction")
}

fn validate_migrations(from: i32, to: i32) -> Res<()> {
    let (low, high) = if from < to {
        (from + 1, to)
    } else {
        (to + 1, from)
    };
    if let Some(missing) = (low..=high).find(|v| !MIGRATIONS.iter().any(|m| m.version == *v)) {
        bail!("Migration {missing} is required to go from version {from} to {to} but is missing");
    }
    Ok(())
}
