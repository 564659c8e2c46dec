use chrono::{Local, SubsecRound};
use clap::Parser;
use pocket_ledger::args::{AccountSubcommand, Args, CategorySubcommand, Command, TxSubcommand};
use pocket_ledger::model::Month;
use pocket_ledger::{commands, Config, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().pocket_home().path();

    // The only place the wall clock is read. Everything below takes dates as arguments.
    let now = Local::now().naive_local().trunc_subsecs(0);
    let today = now.date();

    let _: () = match args.command() {
        Command::Init => commands::init(home, now).await?.print(),

        Command::Account(account_args) => {
            let config = Config::load(home).await?;
            match account_args.command() {
                AccountSubcommand::Add(args) => commands::account_add(config, args.clone(), now)
                    .await?
                    .print(),
                AccountSubcommand::List => commands::account_list(config).await?.print_data(),
            }
        }

        Command::Category(category_args) => {
            let config = Config::load(home).await?;
            match category_args.command() {
                CategorySubcommand::List => commands::category_list(config).await?.print_data(),
            }
        }

        Command::Tx(tx_args) => {
            let config = Config::load(home).await?;
            match tx_args.command() {
                TxSubcommand::Add(args) => commands::tx_add(config, *args.clone(), today)
                    .await?
                    .print(),
                TxSubcommand::Pay(args) => commands::tx_pay(config, args.clone()).await?.print(),
                TxSubcommand::Delete(args) => {
                    commands::tx_delete(config, args.clone()).await?.print()
                }
                TxSubcommand::List(args) => {
                    let month = args.month.unwrap_or_else(|| Month::of(today));
                    commands::tx_list(config, month).await?.print_data()
                }
            }
        }

        Command::Summary(summary_args) => {
            let config = Config::load(home).await?;
            let month = summary_args.month.unwrap_or_else(|| Month::of(today));
            commands::summary(config, month).await?.print_data()
        }

        Command::Session(session_args) => {
            let config = Config::load(home).await?;
            let as_of = session_args.as_of.unwrap_or(today);
            commands::session(config, as_of).await?.print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                "pocket_ledger",
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
