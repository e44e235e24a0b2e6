#![forbid(unsafe_code)]

use crate::{Lifecycle, LifecycleError, TimelineStore};
use st_core::ids::ProjectId;
use st_core::{TimelineRecord, merge_tickets, observe};
use st_storage::StoreError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// No record existed; a default one was persisted.
    pub created: bool,
    /// Ticket-driven fields changed and were written back.
    pub drifted: bool,
}

impl ReconcileOutcome {
    pub fn wrote(self) -> bool {
        self.created || self.drifted
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciled {
    pub record: TimelineRecord,
    pub outcome: ReconcileOutcome,
}

/// Reads per reconciliation; another writer committing between read and write costs one re-read.
const RECONCILE_ATTEMPTS: usize = 3;

impl<S: TimelineStore> Lifecycle<S> {
    /// Recomputes the ticket-driven fields of the project's record and persists them when
    /// they drifted. Idempotent: a second call without ticket changes writes nothing.
    pub fn reconcile(
        &mut self,
        project_id: &ProjectId,
        now_ms: i64,
    ) -> Result<Reconciled, LifecycleError> {
        self.reconcile_inner(project_id, now_ms, true)?
            .ok_or_else(|| LifecycleError::RecordNotFound {
                project_id: project_id.clone(),
            })
    }

    /// Like [`Lifecycle::reconcile`], but never creates a record.
    pub fn reconcile_existing(
        &mut self,
        project_id: &ProjectId,
        now_ms: i64,
    ) -> Result<Option<Reconciled>, LifecycleError> {
        self.reconcile_inner(project_id, now_ms, false)
    }

    fn reconcile_inner(
        &mut self,
        project_id: &ProjectId,
        now_ms: i64,
        create: bool,
    ) -> Result<Option<Reconciled>, LifecycleError> {
        let mut attempt = 1;
        loop {
            let current = self.store.get_timeline(project_id)?;
            if current.is_none() && !create {
                tracing::debug!(project_id = project_id.as_str(), "no timeline; skipping reconcile");
                return Ok(None);
            }
            match self.reconcile_from(project_id, current, now_ms) {
                Err(LifecycleError::StoreUnavailable(StoreError::Conflict { .. }))
                    if attempt < RECONCILE_ATTEMPTS =>
                {
                    tracing::debug!(
                        project_id = project_id.as_str(),
                        attempt,
                        "timeline changed during reconcile; re-reading"
                    );
                    attempt += 1;
                }
                other => return other.map(Some),
            }
        }
    }

    fn reconcile_from(
        &mut self,
        project_id: &ProjectId,
        current: Option<TimelineRecord>,
        now_ms: i64,
    ) -> Result<Reconciled, LifecycleError> {
        let tickets = self.store.tickets_for_project(project_id)?;
        let created = current.is_none();
        let current = current.unwrap_or_else(|| TimelineRecord::new(project_id.clone(), now_ms));

        let merge = merge_tickets(&current, &observe(project_id, &tickets));
        let outcome = ReconcileOutcome {
            created,
            drifted: merge.drifted,
        };
        if !outcome.wrote() {
            tracing::debug!(
                project_id = project_id.as_str(),
                tickets = tickets.len(),
                "timeline up to date"
            );
            return Ok(Reconciled {
                record: current,
                outcome,
            });
        }

        let mut next = merge.record;
        next.updated_at_ms = now_ms;
        let expected = (!created).then_some(&current);
        let record = self
            .store
            .upsert_ticket_fields(&next, &merge.changed, expected)?;
        tracing::info!(
            project_id = project_id.as_str(),
            created,
            changed = ?merge.changed,
            tickets = tickets.len(),
            "reconciled timeline"
        );
        Ok(Reconciled { record, outcome })
    }

    /// Reconciles an existing record right before a manual change, so gates never look at
    /// stale ticket-driven fields.
    pub(crate) fn fresh_record(
        &mut self,
        project_id: &ProjectId,
        now_ms: i64,
    ) -> Result<TimelineRecord, LifecycleError> {
        self.reconcile_existing(project_id, now_ms)?
            .map(|reconciled| reconciled.record)
            .ok_or_else(|| LifecycleError::RecordNotFound {
                project_id: project_id.clone(),
            })
    }
}
