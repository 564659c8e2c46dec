//! pocket-ledger: the core of a personal finance ledger.
//!
//! Accounts, categories and transactions are kept in a [`store::LedgerStore`]. On top of it sit
//! four engines: month-scoped balances ([`balance`]), installment expansion ([`installments`]),
//! carrying unpaid transactions into the next month ([`rollover`]) and cascading deletion with
//! balance reversal ([`deletion`]). [`Ledger`] ties them together for each user action.

pub mod args;
pub mod balance;
pub mod commands;
mod config;
mod db;
pub mod deletion;
mod error;
pub mod installments;
mod ledger;
pub mod model;
pub mod rollover;
pub mod store;
mod utils;


pub use config::Config;
pub use db::Db;
pub use error::{Error, ErrorType, Result};
pub use ledger::{Ledger, LedgerSettings, PaidReport, SeedReport};
