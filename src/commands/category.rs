use crate::commands::Out;
use crate::model::Category;
use crate::{Config, Result};

/// Lists the configured user's categories.
pub async fn category_list(config: Config) -> Result<Out<Vec<Category>>> {
    let categories = config.ledger().categories(config.user_id()).await?;
    Ok(Out::new(
        format!("{} categories", categories.len()),
        categories,
    ))
}
