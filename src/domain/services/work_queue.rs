//! Work Queue Service
//!
//! Models the store's sync flag as a queue of work items. The flag a
//! store persists is only a projection of an item's state: the obligation
//! is outstanding while the item is `Pending` or `InFlight`, and fulfilled
//! once it is `Done`. An interrupted run therefore leaves items `Pending`.

use crate::domain::entities::StoreRecord;

/// Lifecycle of one flagged record within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    Pending,
    InFlight,
    Done,
}

impl WorkState {
    /// Value of the store's sync flag for a record in this state.
    pub fn persisted_flag(&self) -> bool {
        !matches!(self, WorkState::Done)
    }
}

/// Why an item was returned to `Pending` without being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingKey,
    MissingRequestDate,
    NoCounterpart,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingKey => "business key is empty",
            SkipReason::MissingRequestDate => "request date is empty",
            SkipReason::NoCounterpart => "no counterpart record",
        }
    }
}

/// Why an attempted item was returned to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    LookupFailed,
    CounterpartWriteFailed,
    FlagResetFailed,
}

/// Final disposition of an item within the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Committed,
    Skipped(SkipReason),
    Failed(FailureReason),
}

#[derive(Debug, Clone)]
struct WorkItem {
    record: StoreRecord,
    state: WorkState,
    disposition: Option<Disposition>,
}

/// Claim on an `InFlight` item; must be committed or released.
#[derive(Debug)]
pub struct WorkTicket {
    index: usize,
    pub record: StoreRecord,
}

/// Items of one pass, each attempted at most once, in store order.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Vec<WorkItem>,
    cursor: usize,
}

impl WorkQueue {
    /// Enqueue records returned by a `sync_flag = true` query.
    pub fn from_flagged(records: Vec<StoreRecord>) -> Self {
        let items = records
            .into_iter()
            .map(|record| WorkItem {
                record,
                state: WorkState::Pending,
                disposition: None,
            })
            .collect();
        Self { items, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move the next unattempted item to `InFlight`.
    pub fn claim_next(&mut self) -> Option<WorkTicket> {
        while self.cursor < self.items.len() {
            let index = self.cursor;
            self.cursor += 1;
            let item = &mut self.items[index];
            if item.state == WorkState::Pending && item.disposition.is_none() {
                item.state = WorkState::InFlight;
                return Some(WorkTicket {
                    index,
                    record: item.record.clone(),
                });
            }
        }
        None
    }

    /// The obligation was fulfilled and the flag reset acknowledged.
    pub fn commit(&mut self, ticket: WorkTicket) {
        let item = &mut self.items[ticket.index];
        item.state = WorkState::Done;
        item.disposition = Some(Disposition::Committed);
    }

    /// Return the item to `Pending`; it stays eligible for the next pass.
    pub fn release(&mut self, ticket: WorkTicket, disposition: Disposition) {
        let item = &mut self.items[ticket.index];
        item.state = WorkState::Pending;
        item.disposition = Some(disposition);
    }

    /// Count dispositions as `(committed, failed, skipped)`.
    pub fn tally(&self) -> (usize, usize, usize) {
        self.items
            .iter()
            .fold((0, 0, 0), |(ok, failed, skipped), item| {
                match item.disposition {
                    Some(Disposition::Committed) => (ok + 1, failed, skipped),
                    Some(Disposition::Failed(_)) => (ok, failed + 1, skipped),
                    Some(Disposition::Skipped(_)) => (ok, failed, skipped + 1),
                    None => (ok, failed, skipped),
                }
            })
    }

    /// Number of items whose obligation is still outstanding.
    pub fn outstanding(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.state.persisted_flag())
            .count()
    }
}
