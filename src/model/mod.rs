//! Types that represent the core data model, such as `Transaction` and `Account`.
mod account;
mod amount;
mod category;
mod month;
mod transaction;

pub use account::{Account, AccountType, DEFAULT_ACCOUNT_NAME};
pub(crate) use amount::check_magnitude;
pub use amount::{Amount, MAX_AMOUNT};
pub use category::{default_categories, Category};
pub use month::{Month, MAX_YEAR, MIN_YEAR};
pub use transaction::{Transaction, TransactionType};
