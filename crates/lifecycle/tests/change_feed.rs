#![forbid(unsafe_code)]

use st_core::ids::ProjectId;
use st_core::{
    InstallationStatus, Phase, SiteSurveyStatus, Ticket, TicketKind, TicketStatus, TimelineRecord,
};
use st_lifecycle::{Lifecycle, LifecycleError, TicketFeed, TimelineStore};
use st_storage::{ChangeRow, FieldSet, SqliteStore, StoreError};
use std::collections::BTreeMap;

const NOW: i64 = 1_700_000_000_000;

fn project(id: &str) -> ProjectId {
    ProjectId::try_new(id).expect("project id")
}

fn ticket(id: &str, project_id: &str, kind: TicketKind, status: TicketStatus) -> Ticket {
    Ticket {
        id: id.to_string(),
        project_id: project(project_id),
        appointment_type: Some(kind),
        ticket_type: None,
        status: Some(status),
        scheduled_date: Some(NOW + 1_000),
        closed_at: None,
        problem_code: None,
        assigned_technicians: Vec::new(),
    }
}

#[test]
fn sync_reconciles_existing_projects_once_and_converges() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut lifecycle = Lifecycle::new(SqliteStore::open(dir.path()).expect("open store"));
    lifecycle.get_status(&project("p1"), NOW).expect("create p1");
    let cursor = lifecycle.store().latest_change_seq().expect("seq");

    // Another writer records tickets directly, bypassing the lifecycle.
    let mut writer = SqliteStore::open(dir.path()).expect("open writer");
    writer
        .upsert_ticket(
            &ticket("t1", "p1", TicketKind::SiteSurvey, TicketStatus::Scheduled),
            NOW + 1,
        )
        .expect("t1");
    writer
        .upsert_ticket(
            &ticket("t2", "p1", TicketKind::Installation, TicketStatus::Scheduled),
            NOW + 2,
        )
        .expect("t2");
    writer
        .upsert_ticket(
            &ticket("t3", "p2", TicketKind::SiteSurvey, TicketStatus::Scheduled),
            NOW + 3,
        )
        .expect("t3");

    let report = lifecycle.sync_changes(cursor, 100, NOW + 10).expect("sync");
    assert_eq!(report.changes, 3);
    assert_eq!(report.reconciled, vec![project("p1")]);
    assert_eq!(report.written, vec![project("p1")]);

    let record = lifecycle
        .store()
        .get_timeline(&project("p1"))
        .expect("get")
        .expect("record");
    assert_eq!(record.site_survey_status, SiteSurveyStatus::Scheduled);
    assert_eq!(record.installation_status, Some(InstallationStatus::Scheduled));
    assert!(lifecycle.store().get_timeline(&project("p2")).expect("get").is_none());

    // The write-back itself shows up in the feed, but reconciles to no drift.
    let again = lifecycle
        .sync_changes(report.cursor, 100, NOW + 20)
        .expect("sync again");
    assert_eq!(again.changes, 1);
    assert!(again.written.is_empty());
    let idle = lifecycle
        .sync_changes(again.cursor, 100, NOW + 30)
        .expect("idle");
    assert_eq!(idle.changes, 0);
    assert_eq!(idle.cursor, again.cursor);
}

#[test]
fn pruned_feed_resumes_from_the_saved_cursor() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut lifecycle = Lifecycle::new(SqliteStore::open(dir.path()).expect("open store"));
    lifecycle.get_status(&project("p1"), NOW).expect("create p1");
    let report = lifecycle.sync_changes(0, 100, NOW + 1).expect("sync");
    assert_eq!(lifecycle.prune_changes(report.cursor).expect("prune"), report.changes);
    assert!(lifecycle.store().changes_since(0, 100).expect("changes").is_empty());

    lifecycle
        .record_ticket(
            &ticket("t1", "p1", TicketKind::SiteSurvey, TicketStatus::Scheduled),
            NOW + 2,
        )
        .expect("ticket");
    let next = lifecycle
        .sync_changes(report.cursor, 100, NOW + 3)
        .expect("sync after prune");
    assert!(next.cursor > report.cursor);
    assert_eq!(next.reconciled, vec![project("p1")]);
}

#[test]
fn deleted_project_is_not_recreated_by_its_notifications() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut lifecycle = Lifecycle::new(SqliteStore::open(dir.path()).expect("open store"));
    lifecycle
        .record_ticket(
            &ticket("t1", "p1", TicketKind::SiteSurvey, TicketStatus::Completed),
            NOW,
        )
        .expect("ticket");
    lifecycle.get_status(&project("p1"), NOW).expect("create");
    let cursor = lifecycle.store().latest_change_seq().expect("seq");

    assert!(lifecycle.delete_project(&project("p1"), NOW + 1).expect("delete"));
    let changes = lifecycle.store().changes_since(cursor, 10).expect("changes");
    for change in &changes {
        assert!(lifecycle.on_change(change, NOW + 2).expect("on_change").is_none());
    }
    let report = lifecycle.sync_changes(cursor, 10, NOW + 3).expect("sync");
    assert_eq!(report.changes, changes.len());
    assert!(report.reconciled.is_empty());
    assert!(lifecycle.store().get_timeline(&project("p1")).expect("get").is_none());
}

#[test]
fn ticket_changes_refresh_the_owning_record() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut lifecycle = Lifecycle::new(SqliteStore::open(dir.path()).expect("open store"));
    lifecycle.get_status(&project("p1"), NOW).expect("create");

    let refreshed = lifecycle
        .record_ticket(
            &ticket("t1", "p1", TicketKind::Installation, TicketStatus::Scheduled),
            NOW + 1,
        )
        .expect("record")
        .expect("record exists");
    assert!(refreshed.outcome.drifted);
    assert_eq!(
        refreshed.record.installation_status,
        Some(InstallationStatus::Scheduled)
    );

    assert_eq!(
        lifecycle.remove_ticket("t1", NOW + 2).expect("remove"),
        Some(project("p1"))
    );
    assert_eq!(lifecycle.remove_ticket("t1", NOW + 3).expect("remove"), None);
    // No matching ticket leaves the last derived value in place.
    let status = lifecycle.get_status(&project("p1"), NOW + 4).expect("status");
    assert_eq!(status.record.installation_status, Some(InstallationStatus::Scheduled));
}

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    timelines: BTreeMap<ProjectId, TimelineRecord>,
    tickets: Vec<Ticket>,
    fail_writes: bool,
}

impl FlakyStore {
    fn unavailable() -> StoreError {
        StoreError::Io(std::io::Error::other("disk unavailable"))
    }
}

impl TicketFeed for FlakyStore {
    fn tickets_for_project(&self, project_id: &ProjectId) -> Result<Vec<Ticket>, StoreError> {
        Ok(self
            .tickets
            .iter()
            .filter(|ticket| &ticket.project_id == project_id)
            .cloned()
            .collect())
    }
}

impl TimelineStore for FlakyStore {
    fn get_timeline(&self, project_id: &ProjectId) -> Result<Option<TimelineRecord>, StoreError> {
        Ok(self.timelines.get(project_id).cloned())
    }

    fn upsert_fields(
        &mut self,
        record: &TimelineRecord,
        _fields: FieldSet,
    ) -> Result<TimelineRecord, StoreError> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        self.timelines
            .insert(record.project_id.clone(), record.clone());
        Ok(record.clone())
    }

    fn upsert_ticket_fields(
        &mut self,
        record: &TimelineRecord,
        _phases: &[Phase],
        expected: Option<&TimelineRecord>,
    ) -> Result<TimelineRecord, StoreError> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        if self.timelines.get(&record.project_id) != expected {
            return Err(StoreError::Conflict {
                project_id: record.project_id.to_string(),
            });
        }
        self.timelines
            .insert(record.project_id.clone(), record.clone());
        Ok(record.clone())
    }

    fn delete_project(&mut self, project_id: &ProjectId, _now_ms: i64) -> Result<bool, StoreError> {
        Ok(self.timelines.remove(project_id).is_some())
    }

    fn put_ticket(&mut self, ticket: &Ticket, _now_ms: i64) -> Result<(), StoreError> {
        self.tickets.retain(|existing| existing.id != ticket.id);
        self.tickets.push(ticket.clone());
        Ok(())
    }

    fn remove_ticket(&mut self, id: &str, _now_ms: i64) -> Result<Option<ProjectId>, StoreError> {
        let owner = self
            .tickets
            .iter()
            .find(|ticket| ticket.id == id)
            .map(|ticket| ticket.project_id.clone());
        self.tickets.retain(|ticket| ticket.id != id);
        Ok(owner)
    }

    fn changes_since(&self, _since_seq: i64, _limit: usize) -> Result<Vec<ChangeRow>, StoreError> {
        Ok(Vec::new())
    }

    fn prune_changes(&mut self, _through_seq: i64) -> Result<usize, StoreError> {
        Ok(0)
    }
}

#[test]
fn store_failure_surfaces_and_leaves_the_record_untouched() {
    let before = TimelineRecord::new(project("p1"), NOW);
    let mut store = FlakyStore {
        fail_writes: true,
        ..FlakyStore::default()
    };
    store.timelines.insert(project("p1"), before.clone());
    store.tickets.push(ticket(
        "t1",
        "p1",
        TicketKind::SiteSurvey,
        TicketStatus::Completed,
    ));
    let mut lifecycle = Lifecycle::new(store);

    let err = lifecycle
        .get_status(&project("p1"), NOW + 1)
        .expect_err("write fails");
    assert!(matches!(err, LifecycleError::StoreUnavailable(StoreError::Io(_))));
    assert!(err.is_retryable());
    assert_eq!(
        lifecycle.store().get_timeline(&project("p1")).expect("get"),
        Some(before)
    );
}

#[test]
fn failed_create_persists_nothing() {
    let store = FlakyStore {
        fail_writes: true,
        ..FlakyStore::default()
    };
    let mut lifecycle = Lifecycle::new(store);
    assert!(lifecycle.reconcile(&project("p1"), NOW).is_err());
    assert!(lifecycle.store().timelines.is_empty());
}
