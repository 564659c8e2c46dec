//! Configuration file handling for pocket.
//!
//! The configuration file is stored at `$POCKET_HOME/config.json`. It names the user whose ledger
//! lives in `$POCKET_HOME/pocket.sqlite` and the wording used for generated descriptions.

use crate::db::Db;
use crate::error::{ErrorType, IntoResult, Res};
use crate::installments::DEFAULT_INSTALLMENT_LABEL;
use crate::ledger::{Ledger, LedgerSettings};
use crate::rollover::DEFAULT_ROLLOVER_MARKER;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const APP_NAME: &str = "pocket";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const POCKET_SQLITE: &str = "pocket.sqlite";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$POCKET_HOME` and from there it loads `$POCKET_HOME/config.json` and opens the
/// database.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the data directory, writes an initial `config.json` for a new user and creates the
    /// SQLite database.
    ///
    /// # Errors
    /// - Returns an error if the directory already holds a config file or a database.
    /// - Returns an error if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::create_inner(dir.into())
            .await
            .pub_result(ErrorType::Config)
    }

    /// This will
    /// - validate that `pocket_home` exists and that the config file exists
    /// - load the config file
    /// - open the database, migrating it if it is behind
    pub async fn load(pocket_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(pocket_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(maybe_relative: PathBuf) -> Res<Self> {
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the pocket home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!("A config file already exists at '{}'", config_path.display());
        }
        let config_file = ConfigFile::new(Uuid::new_v4());
        config_file.save(&config_path).await?;

        let db_path = root.join(POCKET_SQLITE);
        let db = Db::init(&db_path)
            .await
            .context("Unable to create SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path: db_path,
        })
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Pocket home is missing")?;
        let _ = utils::read_dir(&root)
            .await
            .context("Pocket home is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let db_path = root.join(POCKET_SQLITE);
        let db = Db::load(&db_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path: db_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    /// The user that owns every record in this home directory.
    pub fn user_id(&self) -> Uuid {
        self.config_file.user_id
    }

    pub fn settings(&self) -> LedgerSettings {
        LedgerSettings {
            installment_label: self.config_file.installment_label.clone(),
            rollover_marker: self.config_file.rollover_marker.clone(),
        }
    }

    /// A ledger over this home's database.
    pub fn ledger(&self) -> Ledger<Db> {
        Ledger::with_settings(self.db.clone(), self.settings())
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "pocket",
///   "config_version": 1,
///   "user_id": "0b6f1d3e-5c41-4d0a-9a53-2e4f3c1d7e88",
///   "installment_label": "Parcela",
///   "rollover_marker": "(Transferida do mês anterior)"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "pocket"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    user_id: Uuid,

    /// Label used in installment descriptions, e.g. `Sofa (Parcela 2/10)`
    #[serde(default = "default_installment_label")]
    installment_label: String,

    /// Appended to the description of a transaction carried into a new month
    #[serde(default = "default_rollover_marker")]
    rollover_marker: String,
}

fn default_installment_label() -> String {
    DEFAULT_INSTALLMENT_LABEL.to_string()
}

fn default_rollover_marker() -> String {
    DEFAULT_ROLLOVER_MARKER.to_string()
}

impl ConfigFile {
    fn new(user_id: Uuid) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            user_id,
            installment_label: default_installment_label(),
            rollover_marker: default_rollover_marker(),
        }
    }

    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names another application.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let config: ConfigFile = utils::deserialize(path.as_ref()).await?;
        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config version {} is newer than this program supports ({})",
            config.config_version,
            CONFIG_VERSION
        );
        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path.as_ref(), data)
            .await
            .context("Unable to write config file")
    }
}
