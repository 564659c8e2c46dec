//! These structs provide the CLI interface for the pocket CLI.

use crate::model::{AccountType, Amount, Month, TransactionType};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;
use uuid::Uuid;

/// pocket: A personal finance ledger on the command line.
///
/// Records income, expenses and credit card purchases against your accounts, splits purchases
/// into monthly installments, carries unpaid bills into the next month and shows what each month
/// looks like.
///
/// Start with `pocket init`, which creates the data directory with a default account and a set of
/// categories.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, the configuration file and the database.
    ///
    /// The data directory defaults to $HOME/pocket; pass --pocket-home or set POCKET_HOME to put
    /// it somewhere else. A default account and the default categories are created.
    Init,
    /// Add or list accounts.
    Account(AccountArgs),
    /// List categories.
    Category(CategoryArgs),
    /// Add, pay, delete or list transactions.
    Tx(TxArgs),
    /// Show the totals for a month.
    Summary(SummaryArgs),
    /// Start a session: carries last month's unpaid transactions into the current month.
    Session(SessionArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where pocket data and configuration is held. Defaults to ~/pocket
    #[arg(long, env = "POCKET_HOME", default_value_t = default_pocket_home())]
    pocket_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, pocket_home: PathBuf) -> Self {
        Self {
            log_level,
            pocket_home: pocket_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn pocket_home(&self) -> &DisplayPath {
        &self.pocket_home
    }
}

/// (Not shown): Args for the `pocket account` command.
#[derive(Debug, Parser, Clone)]
pub struct AccountArgs {
    #[command(subcommand)]
    command: AccountSubcommand,
}

impl AccountArgs {
    pub fn new(command: AccountSubcommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &AccountSubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum AccountSubcommand {
    /// Create an account.
    Add(AccountAddArgs),
    /// List accounts with their stored balances.
    List,
}

/// (Not shown): Args for the `pocket account add` command.
#[derive(Debug, Parser, Clone)]
pub struct AccountAddArgs {
    /// The name of the account.
    pub name: String,

    /// One of checking, savings, credit or investment.
    #[arg(long = "type", default_value_t = AccountType::Checking)]
    pub account_type: AccountType,

    /// The opening balance. May be negative, e.g. --balance=-250.
    #[arg(long, allow_hyphen_values = true)]
    pub balance: Option<String>,
}

/// (Not shown): Args for the `pocket category` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    command: CategorySubcommand,
}

impl CategoryArgs {
    pub fn new(command: CategorySubcommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &CategorySubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategorySubcommand {
    /// List categories.
    List,
}

/// (Not shown): Args for the `pocket tx` command.
#[derive(Debug, Parser, Clone)]
pub struct TxArgs {
    #[command(subcommand)]
    command: TxSubcommand,
}

impl TxArgs {
    pub fn new(command: TxSubcommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &TxSubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TxSubcommand {
    /// Record a transaction, or an installment purchase with --installments.
    Add(Box<TxAddArgs>),
    /// Mark a transaction paid.
    Pay(TxIdArgs),
    /// Delete a transaction together with the transactions derived from it.
    Delete(TxIdArgs),
    /// List the transactions created in a month.
    List(TxListArgs),
}

/// (Not shown): Args for the `pocket tx add` command.
#[derive(Debug, Parser, Clone)]
pub struct TxAddArgs {
    /// The amount as a positive number, e.g. 49.90 or $1,200.00. The direction comes from --type.
    #[arg(value_parser = Amount::parse_magnitude)]
    pub amount: Amount,

    /// One of income, expense, transfer or credit_expense.
    #[arg(long = "type", default_value_t = TransactionType::Expense)]
    pub transaction_type: TransactionType,

    /// The category name.
    #[arg(long, default_value = "Outros")]
    pub category: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// The date of the transaction, YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// The account to record against. Defaults to the first account.
    #[arg(long)]
    pub account: Option<Uuid>,

    /// Whether the transaction is already paid.
    #[arg(long)]
    pub paid: bool,

    /// Marks the transaction as a fixed monthly cost.
    #[arg(long)]
    pub fixed: bool,

    /// Flag the transaction as not counting toward expenses. The flag is stored with the
    /// transaction; the monthly summary does not read it.
    #[arg(long)]
    pub ignore_expense: bool,

    /// Split the purchase into this many monthly installments.
    #[arg(long)]
    pub installments: Option<u32>,

    /// With --installments, treat the amount as the value of each installment instead of the
    /// total.
    #[arg(long, requires = "installments")]
    pub per_installment: bool,
}

/// (Not shown): Args for commands that take a transaction id.
#[derive(Debug, Parser, Clone)]
pub struct TxIdArgs {
    pub id: Uuid,
}

/// (Not shown): Args for the `pocket tx list` command.
#[derive(Debug, Parser, Clone)]
pub struct TxListArgs {
    /// The month to list, YYYY-MM. Defaults to the current month.
    #[arg(long)]
    pub month: Option<Month>,
}

/// (Not shown): Args for the `pocket summary` command.
#[derive(Debug, Parser, Clone)]
pub struct SummaryArgs {
    /// The month to summarize, YYYY-MM. Defaults to the current month.
    #[arg(long)]
    pub month: Option<Month>,
}

/// (Not shown): Args for the `pocket session` command.
#[derive(Debug, Parser, Clone)]
pub struct SessionArgs {
    /// The session date, YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
}

fn default_pocket_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("pocket"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --pocket-home or POCKET_HOME instead of relying on the default \
                pocket home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("pocket")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
