//! Cascading deletion with balance reversal.

use crate::error::Error;
use crate::model::Transaction;
use crate::store::Changeset;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Everything that goes when a transaction is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionPlan {
    pub target: Uuid,
    /// The target followed by its transitive dependents, parents before children.
    pub ids: Vec<Uuid>,
    /// Per account, the amount to add back to the stored balance.
    pub reversals: BTreeMap<Uuid, Decimal>,
}

impl DeletionPlan {
    /// The reversal and the deletes as one changeset. Reversals are applied before any row is
    /// removed.
    pub fn changeset(&self) -> Changeset {
        Changeset {
            balance_deltas: self.reversals.clone(),
            deletes: self.ids.clone(),
            ..Changeset::default()
        }
    }
}

/// The outcome of a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub target: Uuid,
    pub deleted: Vec<Uuid>,
    pub reversals: BTreeMap<Uuid, Decimal>,
}

/// Plans the deletion of `target` from `ledger`.
///
/// The family is the target plus every row whose `original_transaction_id` leads back to it:
/// the later shares of a first installment, the children of a repeat root and rollover
/// successors. A derived row takes only its own successors with it.
///
/// Only rows whose amount was posted are reversed. For an installment purchase that is the first
/// share when it was paid; later shares never touched the balance.
///
/// Fails with `InconsistentState` when the lineage loops back on itself or a dependent belongs to
/// another user, and with `InvalidArgument` when a reversal does not fit in a `Decimal`.
pub fn plan_deletion(target: &Transaction, ledger: &[Transaction]) -> crate::Result<DeletionPlan> {
    let mut children: HashMap<Uuid, Vec<&Transaction>> = HashMap::new();
    for t in ledger {
        if let Some(parent) = t.original_transaction_id {
            children.entry(parent).or_default().push(t);
        }
    }

    let mut family: Vec<&Transaction> = vec![target];
    let mut seen: HashSet<Uuid> = HashSet::from([target.id]);
    let mut cursor = 0;
    while cursor < family.len() {
        let parent = family[cursor].id;
        cursor += 1;
        for child in children.get(&parent).into_iter().flatten() {
            if !seen.insert(child.id) {
                return Err(Error::inconsistent(format!(
                    "Transaction {} appears twice in the lineage of {}; the chain loops",
                    child.id, target.id
                )));
            }
            if child.user_id != target.user_id {
                return Err(Error::inconsistent(format!(
                    "Transaction {} depends on {} but belongs to another user",
                    child.id, parent
                )));
            }
            family.push(child);
        }
    }

    let mut reversals: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for t in family.iter().filter(|t| t.posted) {
        let reversal = reversals.entry(t.account_id).or_default();
        *reversal = reversal.checked_sub(t.signed_amount()).ok_or_else(|| {
            Error::invalid(format!(
                "The reversal for account {} is too large to represent",
                t.account_id
            ))
        })?;
    }
    reversals.retain(|_, delta| !delta.is_zero());

    Ok(DeletionPlan {
        target: target.id,
        ids: family.iter().map(|t| t.id).collect(),
        reversals,
    })
}
