#![forbid(unsafe_code)]

use st_core::ids::ProjectId;
use st_core::{
    InspectionStatus, InstallationStatus, Phase, SiteSurveyStatus, Ticket, TicketKind,
    TicketStatus, TimelineRecord,
};
use st_lifecycle::{Lifecycle, TicketFeed, TimelineStore};
use st_storage::{ChangeRow, FieldSet, SqliteStore, StoreError};
use std::cell::{Cell, RefCell};

const NOW: i64 = 1_700_000_000_000;

fn project(id: &str) -> ProjectId {
    ProjectId::try_new(id).expect("project id")
}

fn ticket(id: &str, kind: TicketKind, status: TicketStatus) -> Ticket {
    Ticket {
        id: id.to_string(),
        project_id: project("p1"),
        appointment_type: Some(kind),
        ticket_type: None,
        status: Some(status),
        scheduled_date: Some(NOW + 1_000),
        closed_at: None,
        problem_code: None,
        assigned_technicians: Vec::new(),
    }
}

/// Write another handle commits right after the next timeline read.
struct PendingWrite {
    other: SqliteStore,
    record: TimelineRecord,
    fields: FieldSet,
}

/// Store that lets a second handle slip a manual write between a read and the write that
/// follows it.
struct InterleavedStore {
    inner: SqliteStore,
    pending: RefCell<Option<PendingWrite>>,
    reads: Cell<usize>,
}

impl InterleavedStore {
    fn new(inner: SqliteStore, pending: PendingWrite) -> Self {
        Self {
            inner,
            pending: RefCell::new(Some(pending)),
            reads: Cell::new(0),
        }
    }
}

impl TicketFeed for InterleavedStore {
    fn tickets_for_project(&self, project_id: &ProjectId) -> Result<Vec<Ticket>, StoreError> {
        self.inner.list_tickets(project_id)
    }
}

impl TimelineStore for InterleavedStore {
    fn get_timeline(&self, project_id: &ProjectId) -> Result<Option<TimelineRecord>, StoreError> {
        self.reads.set(self.reads.get() + 1);
        let read = self.inner.get_timeline(project_id)?;
        if let Some(mut pending) = self.pending.borrow_mut().take() {
            pending
                .other
                .upsert_fields(&pending.record, pending.fields)
                .expect("interleaved manual write");
        }
        Ok(read)
    }

    fn upsert_fields(
        &mut self,
        record: &TimelineRecord,
        fields: FieldSet,
    ) -> Result<TimelineRecord, StoreError> {
        self.inner.upsert_fields(record, fields)
    }

    fn upsert_ticket_fields(
        &mut self,
        record: &TimelineRecord,
        phases: &[Phase],
        expected: Option<&TimelineRecord>,
    ) -> Result<TimelineRecord, StoreError> {
        self.inner.upsert_ticket_fields(record, phases, expected)
    }

    fn delete_project(&mut self, project_id: &ProjectId, now_ms: i64) -> Result<bool, StoreError> {
        self.inner.delete_project(project_id, now_ms)
    }

    fn put_ticket(&mut self, ticket: &Ticket, now_ms: i64) -> Result<(), StoreError> {
        self.inner.upsert_ticket(ticket, now_ms)
    }

    fn remove_ticket(&mut self, id: &str, now_ms: i64) -> Result<Option<ProjectId>, StoreError> {
        self.inner.delete_ticket(id, now_ms)
    }

    fn changes_since(&self, since_seq: i64, limit: usize) -> Result<Vec<ChangeRow>, StoreError> {
        self.inner.changes_since(since_seq, limit)
    }

    fn prune_changes(&mut self, through_seq: i64) -> Result<usize, StoreError> {
        self.inner.prune_changes(through_seq)
    }
}

/// Creates the p1 record, then stores `tickets` without reconciling them.
fn seeded(dir: &tempfile::TempDir, tickets: &[Ticket]) -> (SqliteStore, TimelineRecord) {
    let mut lifecycle = Lifecycle::new(SqliteStore::open(dir.path()).expect("open store"));
    let record = lifecycle.get_status(&project("p1"), NOW).expect("create").record;
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    for ticket in tickets {
        store.upsert_ticket(ticket, NOW).expect("ticket");
    }
    (store, record)
}

#[test]
fn manual_installation_status_survives_a_concurrent_survey_reconcile() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (store, record) = seeded(
        &dir,
        &[ticket("t1", TicketKind::SiteSurvey, TicketStatus::Scheduled)],
    );

    let mut manual = record.clone();
    manual.installation_status = Some(InstallationStatus::PendingCustomer);
    manual.installation_notes = Some("called homeowner".to_string());
    manual.updated_at_ms = NOW + 1;
    let pending = PendingWrite {
        other: SqliteStore::open(dir.path()).expect("open other"),
        record: manual,
        fields: FieldSet::Phase(Phase::InstallationCoordination),
    };
    let mut lifecycle = Lifecycle::new(InterleavedStore::new(store, pending));

    let reconciled = lifecycle.reconcile(&project("p1"), NOW + 2).expect("reconcile");
    assert!(reconciled.outcome.drifted);
    assert_eq!(lifecycle.store().reads.get(), 1);

    let stored = lifecycle
        .store()
        .get_timeline(&project("p1"))
        .expect("get")
        .expect("record");
    assert_eq!(stored.site_survey_status, SiteSurveyStatus::Scheduled);
    assert_eq!(
        stored.installation_status,
        Some(InstallationStatus::PendingCustomer)
    );
    assert_eq!(stored.installation_notes.as_deref(), Some("called homeowner"));
    assert_eq!(stored, reconciled.record);
}

#[test]
fn concurrent_inspection_failure_is_not_replaced_by_ready() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (store, record) = seeded(
        &dir,
        &[ticket("t1", TicketKind::Installation, TicketStatus::Completed)],
    );

    let mut manual = record.clone();
    manual.inspection_status = InspectionStatus::Failed;
    manual.inspection_failed_date = Some(NOW + 1);
    manual.inspection_notes = Some("conduit not strapped".to_string());
    manual.updated_at_ms = NOW + 1;
    let pending = PendingWrite {
        other: SqliteStore::open(dir.path()).expect("open other"),
        record: manual,
        fields: FieldSet::Phase(Phase::CityInspection),
    };
    let mut lifecycle = Lifecycle::new(InterleavedStore::new(store, pending));

    // The first merge derives `ready` from the stale read; its write must lose and the
    // second pass must keep the manual failure.
    let reconciled = lifecycle.reconcile(&project("p1"), NOW + 2).expect("reconcile");
    assert_eq!(lifecycle.store().reads.get(), 2);
    assert_eq!(
        reconciled.record.installation_status,
        Some(InstallationStatus::Completed)
    );
    assert_eq!(reconciled.record.inspection_status, InspectionStatus::Failed);
    assert_eq!(reconciled.record.inspection_failed_date, Some(NOW + 1));

    let again = lifecycle.reconcile(&project("p1"), NOW + 3).expect("reconcile again");
    assert!(!again.outcome.wrote());
    assert_eq!(again.record.inspection_status, InspectionStatus::Failed);
}
