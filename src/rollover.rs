//! Carrying unpaid transactions into the next month.
//!
//! At the start of a session, every transaction still unpaid from the month before `as_of` gets
//! a successor dated `as_of`. The successor links back to its source through
//! `original_transaction_id`, so an item left unpaid for several months forms a chain with one
//! link per month.

use crate::model::{Month, Transaction};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// The default suffix appended to the description of a carried transaction.
pub const DEFAULT_ROLLOVER_MARKER: &str = "(Transferida do mês anterior)";

/// The successors to create for one month transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverPlan {
    /// The month the unpaid sources come from.
    pub source_month: Month,
    /// The month the successors land in.
    pub target_month: Month,
    pub successors: Vec<Transaction>,
    /// Sources that already have a successor in the target month.
    pub already_carried: Vec<Uuid>,
}

/// What happened when a plan was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverReport {
    pub source_month: Month,
    pub target_month: Month,
    pub created: Vec<Transaction>,
    /// Sources skipped because they were already carried, either at planning time or by the
    /// store's conditional insert.
    pub skipped: Vec<Uuid>,
    pub failures: Vec<RolloverFailure>,
}

impl RolloverReport {
    pub(crate) fn new(plan: &RolloverPlan) -> Self {
        Self {
            source_month: plan.source_month,
            target_month: plan.target_month,
            created: Vec::new(),
            skipped: plan.already_carried.clone(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A successor that could not be written. The others are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverFailure {
    pub source_id: Uuid,
    pub error: String,
}

/// Plans the successors for the transition into `as_of`'s month.
///
/// `ledger` is the user's whole ledger. Sources are the rows with `is_paid == false` whose
/// `created_at` falls in the month before `as_of`. A source that already has a carried successor
/// in `as_of`'s month is listed in `already_carried` instead of being planned again.
pub fn plan_rollover(ledger: &[Transaction], as_of: NaiveDate, marker: &str) -> RolloverPlan {
    let target_month = Month::of(as_of);
    let source_month = target_month.prev();

    let carried: HashSet<Uuid> = ledger
        .iter()
        .filter(|t| t.carried_over && target_month.contains(t.created_at))
        .filter_map(|t| t.original_transaction_id)
        .collect();

    let mut successors = Vec::new();
    let mut already_carried = Vec::new();
    for source in ledger
        .iter()
        .filter(|t| !t.is_paid && source_month.contains(t.created_at))
    {
        if carried.contains(&source.id) {
            already_carried.push(source.id);
        } else {
            successors.push(successor(source, as_of, marker));
        }
    }

    RolloverPlan {
        source_month,
        target_month,
        successors,
        already_carried,
    }
}

/// A one-shot copy of `source` dated `as_of`. Recurrence is switched off and nothing is posted;
/// the balance effect, if any, stays with the source.
fn successor(source: &Transaction, as_of: NaiveDate, marker: &str) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        date: as_of,
        due_date: as_of,
        created_at: as_of.and_time(NaiveTime::MIN),
        description: format!("{} {marker}", source.description),
        is_paid: false,
        is_repeat: false,
        repeat_interval: None,
        original_transaction_id: Some(source.id),
        carried_over: true,
        posted: false,
        ..source.clone()
    }
}
