use crate::model::TransactionType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A descriptive label. Transactions refer to categories by `name`, not by id, so renaming a
/// category orphans the label on historical transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: TransactionType,
    pub color: String,
    pub icon: String,
}

impl Category {
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        category_type: TransactionType,
        color: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            category_type,
            color: color.into(),
            icon: icon.into(),
        }
    }
}

/// (name, color, icon) for each seeded category, grouped by type.
const DEFAULTS: &[(TransactionType, &[(&str, &str, &str)])] = &[
    (
        TransactionType::Expense,
        &[
            ("Alimentação", "#FF6B6B", "restaurant"),
            ("Transporte", "#4ECDC4", "car"),
            ("Saúde", "#45B7D1", "medical"),
            ("Educação", "#96CEB4", "school"),
            ("Lazer", "#FFEAA7", "game-controller"),
            ("Vestuário", "#DDA0DD", "shirt"),
            ("Moradia", "#98D8C8", "home"),
            ("Serviços", "#F7DC6F", "construct"),
            ("Outros", "#BB8FCE", "ellipsis-horizontal"),
        ],
    ),
    (
        TransactionType::Income,
        &[
            ("Salário", "#4CAF50", "trending-up"),
            ("Freelance", "#4CAF50", "trending-up"),
            ("Investimentos", "#4CAF50", "trending-up"),
            ("Presentes", "#E91E63", "gift"),
            ("Reembolso", "#9C27B0", "card"),
        ],
    ),
    (
        TransactionType::Transfer,
        &[
            ("Transferência entre contas", "#2196F3", "swap-horizontal"),
            ("Depósito", "#00BCD4", "arrow-down"),
            ("Saque", "#FF5722", "arrow-up"),
        ],
    ),
    (
        TransactionType::CreditExpense,
        &[
            ("Cartão de Crédito", "#FF9800", "card"),
            ("Parcelamento", "#FF5722", "list"),
            ("Taxa de Juros", "#E91E63", "trending-up"),
        ],
    ),
];

/// The categories seeded for a user who has none.
pub fn default_categories(user_id: Uuid) -> Vec<Category> {
    DEFAULTS
        .iter()
        .flat_map(|(category_type, entries)| {
            entries
                .iter()
                .map(move |(name, color, icon)| {
                    Category::new(user_id, *name, *category_type, *color, *icon)
                })
        })
        .collect()
}
