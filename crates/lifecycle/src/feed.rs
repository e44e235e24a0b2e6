#![forbid(unsafe_code)]

use crate::{Lifecycle, LifecycleError, Reconciled, TimelineStore};
use st_core::Ticket;
use st_core::ids::ProjectId;
use st_storage::{ChangeKind, ChangeRow, ChangeTable};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Resume point for the next call.
    pub cursor: i64,
    /// Notifications consumed in this batch.
    pub changes: usize,
    /// Projects reconciled, each once.
    pub reconciled: Vec<ProjectId>,
    /// Projects whose record was written back.
    pub written: Vec<ProjectId>,
}

impl<S: TimelineStore> Lifecycle<S> {
    /// Reacts to one row-level change notification.
    ///
    /// Only existing records are refreshed: a notification never recreates a deleted project,
    /// and records are created on first access through [`Lifecycle::get_status`].
    pub fn on_change(
        &mut self,
        change: &ChangeRow,
        now_ms: i64,
    ) -> Result<Option<Reconciled>, LifecycleError> {
        if is_timeline_delete(change) {
            tracing::debug!(project_id = change.project_id.as_str(), "ignoring timeline delete");
            return Ok(None);
        }
        self.reconcile_existing(&change.project_id, now_ms)
    }

    /// Drains up to `limit` notifications after `cursor` and reconciles every affected project
    /// once. Because reconciliation only writes on drift, repeated syncs converge.
    pub fn sync_changes(
        &mut self,
        cursor: i64,
        limit: usize,
        now_ms: i64,
    ) -> Result<SyncReport, LifecycleError> {
        let changes = self.store.changes_since(cursor, limit)?;
        let mut report = SyncReport {
            cursor: changes.last().map_or(cursor, |change| change.seq),
            changes: changes.len(),
            ..SyncReport::default()
        };

        let affected = changes
            .iter()
            .filter(|change| !is_timeline_delete(change))
            .map(|change| change.project_id.clone())
            .collect::<BTreeSet<_>>();
        for project_id in affected {
            let Some(reconciled) = self.reconcile_existing(&project_id, now_ms)? else {
                continue;
            };
            if reconciled.outcome.wrote() {
                report.written.push(project_id.clone());
            }
            report.reconciled.push(project_id);
        }

        tracing::debug!(
            cursor = report.cursor,
            changes = report.changes,
            reconciled = report.reconciled.len(),
            written = report.written.len(),
            "synced change feed"
        );
        Ok(report)
    }

    /// Drops notifications up to `through_seq`, typically a [`SyncReport::cursor`] every
    /// consumer has reached.
    pub fn prune_changes(&mut self, through_seq: i64) -> Result<usize, LifecycleError> {
        let removed = self.store.prune_changes(through_seq)?;
        tracing::info!(through_seq, removed, "change feed pruned");
        Ok(removed)
    }

    /// Stores a ticket snapshot and refreshes the owning project's record if it has one.
    pub fn record_ticket(
        &mut self,
        ticket: &Ticket,
        now_ms: i64,
    ) -> Result<Option<Reconciled>, LifecycleError> {
        self.store.put_ticket(ticket, now_ms)?;
        self.reconcile_existing(&ticket.project_id, now_ms)
    }

    /// Deletes a ticket. Returns `None` when the ticket was unknown.
    pub fn remove_ticket(
        &mut self,
        ticket_id: &str,
        now_ms: i64,
    ) -> Result<Option<ProjectId>, LifecycleError> {
        let Some(project_id) = self.store.remove_ticket(ticket_id, now_ms)? else {
            return Ok(None);
        };
        self.reconcile_existing(&project_id, now_ms)?;
        Ok(Some(project_id))
    }
}

fn is_timeline_delete(change: &ChangeRow) -> bool {
    change.table == ChangeTable::Timelines && change.kind == ChangeKind::Delete
}
