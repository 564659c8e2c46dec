use crate::balance::MonthlyBalances;
use crate::commands::Out;
use crate::model::{Amount, Month};
use crate::{Config, Result};

/// Computes the balances of `month` from the ledger.
///
/// The per-account figures are the month's activity, not the stored account balances; use
/// `pocket account list` for those.
pub async fn summary(config: Config, month: Month) -> Result<Out<MonthlyBalances>> {
    let balances = config
        .ledger()
        .monthly_balances(config.user_id(), month.year(), month.month())
        .await?;
    Ok(Out::new(
        format!(
            "{month}: income {}, expenses {}, net {}, unpaid {} ({} of {} transactions)",
            Amount::new(balances.total_income),
            Amount::new(balances.total_expenses),
            Amount::new(balances.net_balance),
            Amount::new(balances.unpaid_total),
            balances.unpaid_count,
            balances.transaction_count,
        ),
        balances,
    ))
}
