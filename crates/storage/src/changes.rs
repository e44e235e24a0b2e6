#![forbid(unsafe_code)]

use crate::{SqliteStore, StoreError};
use rusqlite::{Transaction, params};
use st_core::ids::ProjectId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeTable {
    Tickets,
    Timelines,
}

impl ChangeTable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tickets => "tickets",
            Self::Timelines => "timelines",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "tickets" => Some(Self::Tickets),
            "timelines" => Some(Self::Timelines),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Row-level change notification, filtered by project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRow {
    pub seq: i64,
    pub ts_ms: i64,
    pub table: ChangeTable,
    pub kind: ChangeKind,
    pub project_id: ProjectId,
    pub row_id: String,
}

impl SqliteStore {
    /// Changes with `seq > since_seq`, oldest first.
    pub fn changes_since(&self, since_seq: i64, limit: usize) -> Result<Vec<ChangeRow>, StoreError> {
        let limit = i64::try_from(limit).map_err(|_| StoreError::InvalidInput("limit too large"))?;
        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, ts_ms, table_name, kind, project_id, row_id
            FROM change_log
            WHERE seq > ?1
            ORDER BY seq ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![since_seq, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (seq, ts_ms, table, kind, project_id, row_id) = row?;
            out.push(ChangeRow {
                seq,
                ts_ms,
                table: ChangeTable::parse(&table).ok_or_else(|| StoreError::InvalidRow {
                    column: "table_name",
                    value: table.clone(),
                })?,
                kind: ChangeKind::parse(&kind).ok_or_else(|| StoreError::InvalidRow {
                    column: "kind",
                    value: kind.clone(),
                })?,
                project_id: ProjectId::try_new(project_id.as_str()).map_err(|_| {
                    StoreError::InvalidRow {
                        column: "project_id",
                        value: project_id.clone(),
                    }
                })?,
                row_id,
            });
        }
        Ok(out)
    }

    /// Sequence number of the newest change ever logged, or 0 before the first one. Pruning
    /// does not lower it.
    pub fn latest_change_seq(&self) -> Result<i64, StoreError> {
        Ok(self.conn.query_row(
            "SELECT COALESCE((SELECT seq FROM sqlite_sequence WHERE name = 'change_log'), 0)",
            [],
            |row| row.get(0),
        )?)
    }

    /// Drops changes with `seq <= through_seq`. Call with a cursor every consumer has passed;
    /// sequence numbers are never reused. Returns the number of rows removed.
    pub fn prune_changes(&mut self, through_seq: i64) -> Result<usize, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM change_log WHERE seq <= ?1", params![through_seq])?;
        tracing::debug!(through_seq, removed, "pruned change log");
        Ok(removed)
    }
}

pub(crate) fn record_change_tx(
    tx: &Transaction<'_>,
    ts_ms: i64,
    table: ChangeTable,
    kind: ChangeKind,
    project_id: &str,
    row_id: &str,
) -> Result<(), StoreError> {
    tx.execute(
        r#"
        INSERT INTO change_log(ts_ms, table_name, kind, project_id, row_id)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![ts_ms, table.as_str(), kind.as_str(), project_id, row_id],
    )?;
    Ok(())
}
