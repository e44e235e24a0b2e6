#![forbid(unsafe_code)]

use crate::changes::{ChangeKind, ChangeTable, record_change_tx};
use crate::{SqliteStore, StoreError};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, Transaction, TransactionBehavior, params, params_from_iter};
use st_core::ids::ProjectId;
use st_core::{
    ApprovalStatus, DateField, DropShipLocation, EngineeringStatus, InspectionStatus,
    InstallationStatus, MaterialOrderStatus, Phase, SiteSurveyStatus, TimelineRecord,
};

/// Every persisted column of `timelines`, in select / insert order.
const COLUMNS: &[&str] = &[
    "project_id",
    "approved_for_site_survey",
    "site_survey_status",
    "site_survey_scheduled_date",
    "site_survey_completed_date",
    "engineering_status",
    "engineering_completed_date",
    "utility_status",
    "utility_application_submitted_date",
    "utility_revision_required_date",
    "utility_revision_submitted_date",
    "utility_application_approved_date",
    "utility_notes",
    "permit_status",
    "permit_submitted_date",
    "permit_revision_required_date",
    "permit_revision_submitted_date",
    "permit_approved_date",
    "permit_notes",
    "installation_status",
    "installation_scheduled_date",
    "installation_completed_date",
    "installation_notes",
    "material_order_status",
    "material_ordered_date",
    "material_delivered_date",
    "material_drop_ship_location",
    "homeowner_contacted_for_delivery",
    "inspection_status",
    "inspection_scheduled_date",
    "inspection_passed_date",
    "inspection_failed_date",
    "inspection_service_completed_date",
    "inspection_notes",
    "pto_submitted_date",
    "pto_approved_date",
    "system_activated_date",
    "created_at_ms",
    "updated_at_ms",
];

/// Column group an upsert is allowed to overwrite on an existing row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSet {
    /// Manual status, stamps and notes of one phase.
    Phase(Phase),
    /// The site-survey approval flag.
    Intake,
    /// A single date stamp (explicit correction).
    Date(DateField),
}

impl FieldSet {
    fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Intake => &["approved_for_site_survey"],
            Self::Date(field) => date_column(field),
            Self::Phase(phase) => match phase {
                Phase::SiteSurvey => &[
                    "site_survey_status",
                    "site_survey_scheduled_date",
                    "site_survey_completed_date",
                ],
                Phase::Engineering => &["engineering_status", "engineering_completed_date"],
                Phase::UtilityApplication => &[
                    "utility_status",
                    "utility_application_submitted_date",
                    "utility_revision_required_date",
                    "utility_revision_submitted_date",
                    "utility_application_approved_date",
                    "utility_notes",
                ],
                Phase::CityPermits => &[
                    "permit_status",
                    "permit_submitted_date",
                    "permit_revision_required_date",
                    "permit_revision_submitted_date",
                    "permit_approved_date",
                    "permit_notes",
                ],
                Phase::InstallationCoordination => &[
                    "installation_status",
                    "installation_scheduled_date",
                    "installation_completed_date",
                    "installation_notes",
                ],
                Phase::MaterialOrdering => &[
                    "material_order_status",
                    "material_ordered_date",
                    "material_delivered_date",
                    "material_drop_ship_location",
                    "homeowner_contacted_for_delivery",
                ],
                Phase::CityInspection => &[
                    "inspection_status",
                    "inspection_scheduled_date",
                    "inspection_passed_date",
                    "inspection_failed_date",
                    "inspection_service_completed_date",
                    "inspection_notes",
                ],
                Phase::Pto => &["pto_submitted_date", "pto_approved_date"],
                Phase::SystemActivation => &["system_activated_date"],
            },
        }
    }
}

/// Columns reconciliation derives from tickets for `phase`; empty for manual-only phases.
fn ticket_columns(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::SiteSurvey => &[
            "site_survey_status",
            "site_survey_scheduled_date",
            "site_survey_completed_date",
        ],
        Phase::InstallationCoordination => &[
            "installation_status",
            "installation_scheduled_date",
            "installation_completed_date",
        ],
        Phase::CityInspection => &[
            "inspection_status",
            "inspection_scheduled_date",
            "inspection_passed_date",
        ],
        _ => &[],
    }
}

/// What an upsert expects to find in the row before it writes.
#[derive(Clone, Copy, Debug)]
enum Expected<'a> {
    /// Last writer wins on the owned columns.
    Any,
    /// The row must not exist yet.
    Absent,
    /// The owned columns must still hold these values.
    Unchanged(&'a TimelineRecord),
}

fn column_index(column: &str) -> Result<usize, StoreError> {
    COLUMNS
        .iter()
        .position(|known| *known == column)
        .ok_or(StoreError::InvalidInput("unknown timeline column"))
}

fn date_column(field: DateField) -> &'static [&'static str] {
    let name = field.as_str();
    // DateField names are the column names; resolve to the static slice entry.
    COLUMNS
        .iter()
        .position(|column| *column == name)
        .map(|index| &COLUMNS[index..=index])
        .unwrap_or(&[])
}

impl SqliteStore {
    pub fn get_timeline(&self, project_id: &ProjectId) -> Result<Option<TimelineRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM timelines WHERE project_id = ?1",
            COLUMNS.join(", ")
        );
        let raw = self
            .conn
            .query_row(&sql, params![project_id.as_str()], RawTimeline::from_row)
            .optional()?;
        raw.map(RawTimeline::into_record).transpose()
    }

    /// Inserts the record when absent, otherwise overwrites only the columns of `fields`.
    ///
    /// Runs as one immediate transaction, so concurrent writers to the same project serialize
    /// and never observe a half-applied row. Returns the row as persisted.
    pub fn upsert_fields(
        &mut self,
        record: &TimelineRecord,
        fields: FieldSet,
    ) -> Result<TimelineRecord, StoreError> {
        let owned = fields.columns();
        if owned.is_empty() {
            return Err(StoreError::InvalidInput("field set has no columns"));
        }
        self.upsert_columns(record, owned, Expected::Any, &fields)
    }

    /// Reconciliation write path: a compare-and-set over the ticket-driven columns of
    /// `phases`.
    ///
    /// `expected` is the row the merge started from, `None` when no record existed. Fails with
    /// [`StoreError::Conflict`] and writes nothing when the row no longer matches it, so a
    /// manual change committed after the read is never reverted.
    pub fn upsert_ticket_fields(
        &mut self,
        record: &TimelineRecord,
        phases: &[Phase],
        expected: Option<&TimelineRecord>,
    ) -> Result<TimelineRecord, StoreError> {
        let owned = phases
            .iter()
            .flat_map(|phase| ticket_columns(*phase).iter().copied())
            .collect::<Vec<_>>();
        let expected = match expected {
            None => Expected::Absent,
            Some(_) if owned.is_empty() => {
                return Err(StoreError::InvalidInput("no ticket-driven phase to write"));
            }
            Some(row) => Expected::Unchanged(row),
        };
        self.upsert_columns(record, &owned, expected, &phases)
    }

    fn upsert_columns(
        &mut self,
        record: &TimelineRecord,
        owned: &[&str],
        expected: Expected<'_>,
        label: &dyn std::fmt::Debug,
    ) -> Result<TimelineRecord, StoreError> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existed = timeline_exists_tx(&tx, record.project_id.as_str())?;

        let mut values = record_values(record);
        let placeholders = (1..=COLUMNS.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let on_conflict = match expected {
            Expected::Absent => "DO NOTHING".to_string(),
            Expected::Any | Expected::Unchanged(_) => {
                let assignments = owned
                    .iter()
                    .chain(std::iter::once(&"updated_at_ms"))
                    .map(|column| format!("{column} = excluded.{column}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut clause = format!("DO UPDATE SET {assignments}");
                if let Expected::Unchanged(row) = expected {
                    let before = record_values(row);
                    let mut guards = Vec::with_capacity(owned.len());
                    for column in owned {
                        let index = column_index(column)?;
                        values.push(before[index].clone());
                        guards.push(format!("timelines.{column} IS ?{}", values.len()));
                    }
                    clause.push_str(" WHERE ");
                    clause.push_str(&guards.join(" AND "));
                }
                clause
            }
        };
        let sql = format!(
            "INSERT INTO timelines ({}) VALUES ({placeholders}) \
             ON CONFLICT(project_id) {on_conflict}",
            COLUMNS.join(", ")
        );
        let written = tx.execute(&sql, params_from_iter(values))?;
        let project_id = record.project_id.as_str();
        if written == 0 {
            tracing::debug!(project_id, fields = ?label, "timeline changed concurrently; not written");
            return Err(StoreError::Conflict {
                project_id: project_id.to_string(),
            });
        }

        let kind = if existed {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        record_change_tx(
            &tx,
            record.updated_at_ms,
            ChangeTable::Timelines,
            kind,
            project_id,
            project_id,
        )?;

        let sql = format!(
            "SELECT {} FROM timelines WHERE project_id = ?1",
            COLUMNS.join(", ")
        );
        let stored = tx
            .query_row(&sql, params![project_id], RawTimeline::from_row)?
            .into_record()?;
        tx.commit()?;

        tracing::debug!(project_id, fields = ?label, kind = kind.as_str(), "upserted timeline");
        Ok(stored)
    }

    /// Manual transition write path.
    pub fn upsert_phase_fields(
        &mut self,
        record: &TimelineRecord,
        phase: Phase,
    ) -> Result<TimelineRecord, StoreError> {
        self.upsert_fields(record, FieldSet::Phase(phase))
    }

    pub fn list_timelines(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TimelineRecord>, StoreError> {
        let limit = i64::try_from(limit).map_err(|_| StoreError::InvalidInput("limit too large"))?;
        let offset =
            i64::try_from(offset).map_err(|_| StoreError::InvalidInput("offset too large"))?;
        let sql = format!(
            "SELECT {} FROM timelines ORDER BY project_id ASC LIMIT ?1 OFFSET ?2",
            COLUMNS.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit, offset], RawTimeline::from_row)?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.into_record()?);
        }
        Ok(out)
    }

    /// Removes the project's timeline and tickets. Returns whether anything was deleted.
    pub fn delete_project(&mut self, project_id: &ProjectId, now_ms: i64) -> Result<bool, StoreError> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let ticket_ids = {
            let mut stmt = tx.prepare("SELECT id FROM tickets WHERE project_id = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map(params![project_id.as_str()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        tx.execute(
            "DELETE FROM tickets WHERE project_id = ?1",
            params![project_id.as_str()],
        )?;
        for ticket_id in &ticket_ids {
            record_change_tx(
                &tx,
                now_ms,
                ChangeTable::Tickets,
                ChangeKind::Delete,
                project_id.as_str(),
                ticket_id,
            )?;
        }

        let deleted = tx.execute(
            "DELETE FROM timelines WHERE project_id = ?1",
            params![project_id.as_str()],
        )?;
        if deleted > 0 {
            record_change_tx(
                &tx,
                now_ms,
                ChangeTable::Timelines,
                ChangeKind::Delete,
                project_id.as_str(),
                project_id.as_str(),
            )?;
        }
        tx.commit()?;

        tracing::debug!(
            project_id = project_id.as_str(),
            tickets = ticket_ids.len(),
            timeline = deleted > 0,
            "deleted project"
        );
        Ok(deleted > 0 || !ticket_ids.is_empty())
    }
}

fn timeline_exists_tx(tx: &Transaction<'_>, project_id: &str) -> Result<bool, StoreError> {
    Ok(tx
        .query_row(
            "SELECT 1 FROM timelines WHERE project_id = ?1",
            params![project_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn record_values(record: &TimelineRecord) -> Vec<Value> {
    vec![
        Value::from(record.project_id.as_str().to_string()),
        Value::from(record.approved_for_site_survey),
        text(record.site_survey_status.as_str()),
        Value::from(record.site_survey_scheduled_date),
        Value::from(record.site_survey_completed_date),
        opt_text(record.engineering_status.map(EngineeringStatus::as_str)),
        Value::from(record.engineering_completed_date),
        text(record.utility_status.as_str()),
        Value::from(record.utility_application_submitted_date),
        Value::from(record.utility_revision_required_date),
        Value::from(record.utility_revision_submitted_date),
        Value::from(record.utility_application_approved_date),
        Value::from(record.utility_notes.clone()),
        text(record.permit_status.as_str()),
        Value::from(record.permit_submitted_date),
        Value::from(record.permit_revision_required_date),
        Value::from(record.permit_revision_submitted_date),
        Value::from(record.permit_approved_date),
        Value::from(record.permit_notes.clone()),
        opt_text(record.installation_status.map(InstallationStatus::as_str)),
        Value::from(record.installation_scheduled_date),
        Value::from(record.installation_completed_date),
        Value::from(record.installation_notes.clone()),
        text(record.material_order_status.as_str()),
        Value::from(record.material_ordered_date),
        Value::from(record.material_delivered_date),
        opt_text(record.material_drop_ship_location.map(DropShipLocation::as_str)),
        Value::from(record.homeowner_contacted_for_delivery),
        text(record.inspection_status.as_str()),
        Value::from(record.inspection_scheduled_date),
        Value::from(record.inspection_passed_date),
        Value::from(record.inspection_failed_date),
        Value::from(record.inspection_service_completed_date),
        Value::from(record.inspection_notes.clone()),
        Value::from(record.pto_submitted_date),
        Value::from(record.pto_approved_date),
        Value::from(record.system_activated_date),
        Value::from(record.created_at_ms),
        Value::from(record.updated_at_ms),
    ]
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: Option<&str>) -> Value {
    value.map(text).unwrap_or(Value::Null)
}

/// Row as stored; enum columns are still text.
struct RawTimeline {
    project_id: String,
    approved_for_site_survey: bool,
    site_survey_status: String,
    engineering_status: Option<String>,
    utility_status: String,
    permit_status: String,
    installation_status: Option<String>,
    material_order_status: String,
    material_drop_ship_location: Option<String>,
    homeowner_contacted_for_delivery: bool,
    inspection_status: String,
    dates: Vec<(DateField, Option<i64>)>,
    utility_notes: Option<String>,
    permit_notes: Option<String>,
    installation_notes: Option<String>,
    inspection_notes: Option<String>,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl RawTimeline {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let mut dates = Vec::with_capacity(DateField::ALL.len());
        for field in DateField::ALL {
            dates.push((*field, row.get::<_, Option<i64>>(field.as_str())?));
        }
        Ok(Self {
            project_id: row.get("project_id")?,
            approved_for_site_survey: row.get("approved_for_site_survey")?,
            site_survey_status: row.get("site_survey_status")?,
            engineering_status: row.get("engineering_status")?,
            utility_status: row.get("utility_status")?,
            permit_status: row.get("permit_status")?,
            installation_status: row.get("installation_status")?,
            material_order_status: row.get("material_order_status")?,
            material_drop_ship_location: row.get("material_drop_ship_location")?,
            homeowner_contacted_for_delivery: row.get("homeowner_contacted_for_delivery")?,
            inspection_status: row.get("inspection_status")?,
            dates,
            utility_notes: row.get("utility_notes")?,
            permit_notes: row.get("permit_notes")?,
            installation_notes: row.get("installation_notes")?,
            inspection_notes: row.get("inspection_notes")?,
            created_at_ms: row.get("created_at_ms")?,
            updated_at_ms: row.get("updated_at_ms")?,
        })
    }

    fn into_record(self) -> Result<TimelineRecord, StoreError> {
        let project_id =
            ProjectId::try_new(self.project_id.as_str()).map_err(|_| StoreError::InvalidRow {
                column: "project_id",
                value: self.project_id.clone(),
            })?;
        let mut record = TimelineRecord::new(project_id, self.created_at_ms);
        record.updated_at_ms = self.updated_at_ms;
        record.approved_for_site_survey = self.approved_for_site_survey;
        record.site_survey_status =
            parse_column("site_survey_status", &self.site_survey_status, SiteSurveyStatus::parse)?;
        record.engineering_status = self
            .engineering_status
            .as_deref()
            .map(|value| parse_column("engineering_status", value, EngineeringStatus::parse))
            .transpose()?;
        record.utility_status =
            parse_column("utility_status", &self.utility_status, ApprovalStatus::parse)?;
        record.permit_status =
            parse_column("permit_status", &self.permit_status, ApprovalStatus::parse)?;
        record.installation_status = self
            .installation_status
            .as_deref()
            .map(|value| parse_column("installation_status", value, InstallationStatus::parse))
            .transpose()?;
        record.material_order_status = parse_column(
            "material_order_status",
            &self.material_order_status,
            MaterialOrderStatus::parse,
        )?;
        record.material_drop_ship_location = self
            .material_drop_ship_location
            .as_deref()
            .map(|value| {
                parse_column("material_drop_ship_location", value, DropShipLocation::parse)
            })
            .transpose()?;
        record.homeowner_contacted_for_delivery = self.homeowner_contacted_for_delivery;
        record.inspection_status =
            parse_column("inspection_status", &self.inspection_status, InspectionStatus::parse)?;
        for (field, value) in self.dates {
            *record.date_mut(field) = value;
        }
        record.utility_notes = self.utility_notes;
        record.permit_notes = self.permit_notes;
        record.installation_notes = self.installation_notes;
        record.inspection_notes = self.inspection_notes;
        Ok(record)
    }
}

fn parse_column<T>(
    column: &'static str,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, StoreError> {
    parse(value).ok_or_else(|| StoreError::InvalidRow {
        column,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_date_field_is_a_column() {
        for field in DateField::ALL {
            assert_eq!(date_column(*field), &[field.as_str()], "{field}");
        }
    }

    #[test]
    fn phase_columns_are_known_and_ticket_columns_are_disjoint_from_manual_phases() {
        for phase in Phase::ALL {
            for column in FieldSet::Phase(*phase).columns() {
                assert!(COLUMNS.contains(column), "{column}");
            }
            for column in ticket_columns(*phase) {
                assert!(FieldSet::Phase(*phase).columns().contains(column), "{column}");
            }
        }
        for phase in [
            Phase::Engineering,
            Phase::UtilityApplication,
            Phase::CityPermits,
            Phase::MaterialOrdering,
            Phase::Pto,
            Phase::SystemActivation,
        ] {
            assert!(ticket_columns(phase).is_empty(), "{phase}");
        }
    }

    #[test]
    fn record_values_line_up_with_columns() {
        let record = TimelineRecord::new(ProjectId::try_new("p1").expect("project id"), 0);
        assert_eq!(record_values(&record).len(), COLUMNS.len());
    }
}
