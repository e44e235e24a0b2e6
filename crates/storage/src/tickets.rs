#![forbid(unsafe_code)]

use crate::changes::{ChangeKind, ChangeTable, record_change_tx};
use crate::{SqliteStore, StoreError};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use st_core::ids::ProjectId;
use st_core::{Ticket, TicketKind, TicketStatus};

const MAX_TICKET_ID_LEN: usize = 128;

impl SqliteStore {
    /// Inserts or replaces a ticket snapshot as delivered by the ticketing system.
    pub fn upsert_ticket(&mut self, ticket: &Ticket, now_ms: i64) -> Result<(), StoreError> {
        let id = ticket.id.trim();
        if id.is_empty() {
            return Err(StoreError::InvalidInput("ticket id must not be empty"));
        }
        if id.len() > MAX_TICKET_ID_LEN {
            return Err(StoreError::InvalidInput("ticket id is too long"));
        }
        let technicians_json = serde_json::to_string(&ticket.assigned_technicians)?;

        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let previous_project = tx
            .query_row(
                "SELECT project_id FROM tickets WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        tx.execute(
            r#"
            INSERT INTO tickets(
              id, project_id, appointment_type, ticket_type, status,
              scheduled_date, closed_at, problem_code, assigned_technicians_json, updated_at_ms
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
              project_id = excluded.project_id,
              appointment_type = excluded.appointment_type,
              ticket_type = excluded.ticket_type,
              status = excluded.status,
              scheduled_date = excluded.scheduled_date,
              closed_at = excluded.closed_at,
              problem_code = excluded.problem_code,
              assigned_technicians_json = excluded.assigned_technicians_json,
              updated_at_ms = excluded.updated_at_ms
            "#,
            params![
                id,
                ticket.project_id.as_str(),
                ticket.appointment_type.as_ref().map(TicketKind::as_str),
                ticket.ticket_type.as_ref().map(TicketKind::as_str),
                ticket.status.as_ref().map(TicketStatus::as_str),
                ticket.scheduled_date,
                ticket.closed_at,
                ticket.problem_code.as_deref(),
                technicians_json,
                now_ms,
            ],
        )?;

        let project_id = ticket.project_id.as_str();
        match previous_project.as_deref() {
            None => record_change_tx(
                &tx,
                now_ms,
                ChangeTable::Tickets,
                ChangeKind::Insert,
                project_id,
                id,
            )?,
            Some(previous) if previous == project_id => record_change_tx(
                &tx,
                now_ms,
                ChangeTable::Tickets,
                ChangeKind::Update,
                project_id,
                id,
            )?,
            Some(previous) => {
                // Moved between projects: both sides have to re-reconcile.
                record_change_tx(
                    &tx,
                    now_ms,
                    ChangeTable::Tickets,
                    ChangeKind::Delete,
                    previous,
                    id,
                )?;
                record_change_tx(
                    &tx,
                    now_ms,
                    ChangeTable::Tickets,
                    ChangeKind::Insert,
                    project_id,
                    id,
                )?;
            }
        }
        tx.commit()?;

        tracing::debug!(ticket_id = id, project_id, "upserted ticket");
        Ok(())
    }

    /// Removes a ticket. Returns the project it belonged to, if it existed.
    pub fn delete_ticket(&mut self, id: &str, now_ms: i64) -> Result<Option<ProjectId>, StoreError> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let project = tx
            .query_row(
                "SELECT project_id FROM tickets WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(project) = project else {
            return Ok(None);
        };

        tx.execute("DELETE FROM tickets WHERE id = ?1", params![id])?;
        record_change_tx(
            &tx,
            now_ms,
            ChangeTable::Tickets,
            ChangeKind::Delete,
            &project,
            id,
        )?;
        tx.commit()?;

        tracing::debug!(ticket_id = id, project_id = project.as_str(), "deleted ticket");
        parse_project_id(project).map(Some)
    }

    /// Tickets of one project, ordered by id.
    pub fn list_tickets(&self, project_id: &ProjectId) -> Result<Vec<Ticket>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, appointment_type, ticket_type, status, scheduled_date, closed_at,
                   problem_code, assigned_technicians_json
            FROM tickets
            WHERE project_id = ?1
            ORDER BY id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![project_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<i64>>(4)?,
                row.get::<_, Option<i64>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (
                id,
                appointment_type,
                ticket_type,
                status,
                scheduled_date,
                closed_at,
                problem_code,
                technicians_json,
            ) = row?;
            out.push(Ticket {
                id,
                project_id: project_id.clone(),
                appointment_type: appointment_type.as_deref().map(TicketKind::parse),
                ticket_type: ticket_type.as_deref().map(TicketKind::parse),
                status: status.as_deref().map(TicketStatus::parse),
                scheduled_date,
                closed_at,
                problem_code,
                assigned_technicians: serde_json::from_str(&technicians_json)?,
            });
        }
        Ok(out)
    }
}

fn parse_project_id(value: String) -> Result<ProjectId, StoreError> {
    ProjectId::try_new(value.as_str()).map_err(|_| StoreError::InvalidRow {
        column: "project_id",
        value,
    })
}
