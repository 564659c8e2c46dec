use crate::commands::Out;
use crate::ledger::SeedReport;
use crate::{Config, Result};
use chrono::NaiveDateTime;
use std::path::Path;

/// Creates the data directory with an initial `config.json` for a new user and the SQLite
/// database, then seeds the default account and categories.
///
/// # Arguments
/// - `pocket_home` - The directory that will be the root of data directory, e.g. `$HOME/pocket`
/// - `now` - The creation time recorded on the default account.
///
/// # Errors
/// - Returns an error if the directory is already initialized or any file operations fail.
pub async fn init(pocket_home: &Path, now: NaiveDateTime) -> Result<Out<SeedReport>> {
    let config = Config::create(pocket_home).await?;
    let report = config.ledger().seed_defaults(config.user_id(), now).await?;
    Ok(Out::new(
        format!(
            "Successfully created the pocket directory at {}",
            config.root().display()
        ),
        report,
    ))
}
