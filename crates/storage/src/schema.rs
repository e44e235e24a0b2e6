#![forbid(unsafe_code)]

use crate::StoreError;
use rusqlite::{Connection, params};

const SCHEMA_VERSION: &str = "v1";

pub(crate) fn install(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS timelines (
          project_id TEXT PRIMARY KEY,
          approved_for_site_survey INTEGER NOT NULL DEFAULT 0,

          site_survey_status TEXT NOT NULL,
          site_survey_scheduled_date INTEGER,
          site_survey_completed_date INTEGER,

          engineering_status TEXT,
          engineering_completed_date INTEGER,

          utility_status TEXT NOT NULL,
          utility_application_submitted_date INTEGER,
          utility_revision_required_date INTEGER,
          utility_revision_submitted_date INTEGER,
          utility_application_approved_date INTEGER,
          utility_notes TEXT,

          permit_status TEXT NOT NULL,
          permit_submitted_date INTEGER,
          permit_revision_required_date INTEGER,
          permit_revision_submitted_date INTEGER,
          permit_approved_date INTEGER,
          permit_notes TEXT,

          installation_status TEXT,
          installation_scheduled_date INTEGER,
          installation_completed_date INTEGER,
          installation_notes TEXT,

          material_order_status TEXT NOT NULL,
          material_ordered_date INTEGER,
          material_delivered_date INTEGER,
          material_drop_ship_location TEXT,
          homeowner_contacted_for_delivery INTEGER NOT NULL DEFAULT 0,

          inspection_status TEXT NOT NULL,
          inspection_scheduled_date INTEGER,
          inspection_passed_date INTEGER,
          inspection_failed_date INTEGER,
          inspection_service_completed_date INTEGER,
          inspection_notes TEXT,

          pto_submitted_date INTEGER,
          pto_approved_date INTEGER,
          system_activated_date INTEGER,

          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tickets (
          id TEXT PRIMARY KEY,
          project_id TEXT NOT NULL,
          appointment_type TEXT,
          ticket_type TEXT,
          status TEXT,
          scheduled_date INTEGER,
          closed_at INTEGER,
          problem_code TEXT,
          assigned_technicians_json TEXT NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS change_log (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          ts_ms INTEGER NOT NULL,
          table_name TEXT NOT NULL,
          kind TEXT NOT NULL,
          project_id TEXT NOT NULL,
          row_id TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tickets_project ON tickets(project_id, id);
        CREATE INDEX IF NOT EXISTS idx_change_log_project ON change_log(project_id, seq);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}
