//! Cascade driver.
//!
//! A bounded work-list that re-derives approvals, change requests and
//! governed objects until nothing changes. Every step re-reads what it
//! needs from the store and persists its own transition before any
//! follow-up runs, so an interrupted cascade is resumed simply by running
//! it again from the reported entity.

use crate::context::GovernanceContext;
use crate::error::{GovernanceError, GovernanceResult};
use crate::{approval, change_request, object};
use registrar_types::{ApprovalId, ChangeRequestId, EntityRef, ObjectRef};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, error};
use uuid::Uuid;

/// An entity the cascade can re-evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkItem {
    Approval(ApprovalId),
    ChangeRequest(ChangeRequestId),
    Object(ObjectRef),
}

impl From<WorkItem> for EntityRef {
    fn from(item: WorkItem) -> Self {
        match item {
            WorkItem::Approval(id) => EntityRef::Approval(id),
            WorkItem::ChangeRequest(id) => EntityRef::ChangeRequest(id),
            WorkItem::Object(object) => EntityRef::Object(object),
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Default)]
pub(crate) struct Step {
    pub changed: bool,
    pub errors: Vec<GovernanceError>,
    pub follow_ups: Vec<WorkItem>,
}

impl Step {
    pub fn then(follow_ups: impl IntoIterator<Item = WorkItem>) -> Self {
        Self {
            follow_ups: follow_ups.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// Result of re-deriving state.
#[derive(Debug, Default)]
pub struct StateUpdate {
    /// Whether any entity was persisted with a new state.
    pub changed: bool,
    /// Non-fatal problems found along the way, such as rejected signatures.
    pub errors: Vec<GovernanceError>,
    /// Evaluations performed.
    pub steps: usize,
}

impl StateUpdate {
    pub fn merge(&mut self, other: StateUpdate) {
        self.changed |= other.changed;
        self.errors.extend(other.errors);
        self.steps += other.steps;
    }
}

/// Run the cascade from `seeds` to a fixed point.
pub fn run(
    ctx: &GovernanceContext<'_>,
    seeds: impl IntoIterator<Item = WorkItem>,
) -> GovernanceResult<StateUpdate> {
    let run_id = Uuid::new_v4();
    let span = tracing::debug_span!("cascade", run_id = %run_id);
    let _entered = span.enter();

    let limit = ctx.config.cascade.max_iterations;
    let mut queue: VecDeque<WorkItem> = VecDeque::new();
    for seed in seeds {
        enqueue(&mut queue, seed);
    }
    // Items evaluated without change since the last mutation anywhere.
    let mut settled: HashSet<WorkItem> = HashSet::new();
    let mut seen_errors: HashSet<String> = HashSet::new();
    let mut update = StateUpdate::default();

    while let Some(item) = queue.pop_front() {
        if settled.contains(&item) {
            continue;
        }
        if update.steps >= limit {
            error!(limit, last = %EntityRef::from(item), "cascade did not settle");
            return Err(GovernanceError::CascadeLimit {
                limit,
                last: item.into(),
            });
        }
        update.steps += 1;

        let step = evaluate(ctx, item).map_err(|e| e.at(item.into()))?;
        for err in step.errors {
            if seen_errors.insert(err.to_string()) {
                update.errors.push(err);
            }
        }

        if step.changed {
            update.changed = true;
            settled.clear();
            enqueue(&mut queue, item);
        } else {
            settled.insert(item);
        }
        for follow_up in step.follow_ups {
            if !settled.contains(&follow_up) {
                enqueue(&mut queue, follow_up);
            }
        }
    }

    debug!(
        steps = update.steps,
        changed = update.changed,
        errors = update.errors.len(),
        "cascade settled"
    );
    Ok(update)
}

fn enqueue(queue: &mut VecDeque<WorkItem>, item: WorkItem) {
    if !queue.contains(&item) {
        queue.push_back(item);
    }
}

fn evaluate(ctx: &GovernanceContext<'_>, item: WorkItem) -> GovernanceResult<Step> {
    match item {
        WorkItem::Approval(id) => approval::evaluate(ctx, id),
        WorkItem::ChangeRequest(id) => change_request::evaluate(ctx, id),
        WorkItem::Object(object) => object::evaluate(ctx, object),
    }
}
