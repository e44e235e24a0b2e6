#![forbid(unsafe_code)]

use st_core::ids::ProjectId;
use st_core::{Phase, Ticket, TimelineRecord};
use st_storage::{ChangeRow, FieldSet, SqliteStore, StoreError};

/// Read-only view of the ticketing system.
pub trait TicketFeed {
    /// Every ticket of the project, in a stable order.
    fn tickets_for_project(&self, project_id: &ProjectId) -> Result<Vec<Ticket>, StoreError>;
}

/// Persistence the lifecycle needs. Every write must be atomic per call.
pub trait TimelineStore: TicketFeed {
    fn get_timeline(&self, project_id: &ProjectId) -> Result<Option<TimelineRecord>, StoreError>;

    /// Inserts the whole record when absent, otherwise overwrites only `fields`.
    fn upsert_fields(
        &mut self,
        record: &TimelineRecord,
        fields: FieldSet,
    ) -> Result<TimelineRecord, StoreError>;

    /// Reconciliation write: overwrites only the ticket-driven columns of `phases`, and only
    /// while the row still matches `expected` (`None`: the row must not exist yet). Otherwise
    /// fails with [`StoreError::Conflict`] and writes nothing.
    fn upsert_ticket_fields(
        &mut self,
        record: &TimelineRecord,
        phases: &[Phase],
        expected: Option<&TimelineRecord>,
    ) -> Result<TimelineRecord, StoreError>;

    fn upsert_phase_fields(
        &mut self,
        record: &TimelineRecord,
        phase: Phase,
    ) -> Result<TimelineRecord, StoreError> {
        self.upsert_fields(record, FieldSet::Phase(phase))
    }

    fn delete_project(&mut self, project_id: &ProjectId, now_ms: i64) -> Result<bool, StoreError>;

    fn put_ticket(&mut self, ticket: &Ticket, now_ms: i64) -> Result<(), StoreError>;

    /// Returns the owning project when the ticket existed.
    fn remove_ticket(&mut self, id: &str, now_ms: i64) -> Result<Option<ProjectId>, StoreError>;

    fn changes_since(&self, since_seq: i64, limit: usize) -> Result<Vec<ChangeRow>, StoreError>;

    /// Drops consumed notifications up to and including `through_seq`.
    fn prune_changes(&mut self, through_seq: i64) -> Result<usize, StoreError>;
}

impl TicketFeed for SqliteStore {
    fn tickets_for_project(&self, project_id: &ProjectId) -> Result<Vec<Ticket>, StoreError> {
        self.list_tickets(project_id)
    }
}

impl TimelineStore for SqliteStore {
    fn get_timeline(&self, project_id: &ProjectId) -> Result<Option<TimelineRecord>, StoreError> {
        SqliteStore::get_timeline(self, project_id)
    }

    fn upsert_fields(
        &mut self,
        record: &TimelineRecord,
        fields: FieldSet,
    ) -> Result<TimelineRecord, StoreError> {
        SqliteStore::upsert_fields(self, record, fields)
    }

    fn upsert_ticket_fields(
        &mut self,
        record: &TimelineRecord,
        phases: &[Phase],
        expected: Option<&TimelineRecord>,
    ) -> Result<TimelineRecord, StoreError> {
        SqliteStore::upsert_ticket_fields(self, record, phases, expected)
    }

    fn delete_project(&mut self, project_id: &ProjectId, now_ms: i64) -> Result<bool, StoreError> {
        SqliteStore::delete_project(self, project_id, now_ms)
    }

    fn put_ticket(&mut self, ticket: &Ticket, now_ms: i64) -> Result<(), StoreError> {
        self.upsert_ticket(ticket, now_ms)
    }

    fn remove_ticket(&mut self, id: &str, now_ms: i64) -> Result<Option<ProjectId>, StoreError> {
        self.delete_ticket(id, now_ms)
    }

    fn changes_since(&self, since_seq: i64, limit: usize) -> Result<Vec<ChangeRow>, StoreError> {
        SqliteStore::changes_since(self, since_seq, limit)
    }

    fn prune_changes(&mut self, through_seq: i64) -> Result<usize, StoreError> {
        SqliteStore::prune_changes(self, through_seq)
    }
}
