#![forbid(unsafe_code)]

use crate::Command;
use crate::config::CliConfig;
use crate::render;
use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use st_core::ids::ProjectId;
use st_core::{MaterialDeliveryUpdate, Phase, PhaseStatus, Ticket, TransitionRequest};
use st_lifecycle::{Lifecycle, LifecycleConfig};
use st_storage::{SqliteStore, StoreOptions};
use std::io::BufRead;

const QUEUE_PAGE: usize = 500;

pub(crate) fn run(config: &CliConfig, command: Command, now_ms: i64) -> Result<Value> {
    let store = SqliteStore::open_with(
        &config.storage_dir,
        &StoreOptions {
            busy_timeout: config.busy_timeout,
        },
    )
    .with_context(|| format!("open store at {}", config.storage_dir.display()))?;
    let mut lifecycle = Lifecycle::with_config(
        store,
        LifecycleConfig {
            material_lead_time: config.material_lead_time,
        },
    );

    match command {
        Command::Status { projects } => {
            let mut out = Vec::with_capacity(projects.len());
            for project in &projects {
                let status = lifecycle
                    .get_status(project, now_ms)
                    .with_context(|| format!("status of {project}"))?;
                out.push(render::status_json(&status)?);
            }
            Ok(match <[Value; 1]>::try_from(out) {
                Ok([single]) => single,
                Err(many) => Value::Array(many),
            })
        }
        Command::Transition {
            project,
            phase,
            status,
            date,
            notes,
        } => {
            let target = parse_target(phase, &status)?;
            let request = TransitionRequest {
                project_id: project,
                phase,
                target,
                date_ms: date,
                notes,
            };
            let record = lifecycle
                .transition(&request, now_ms)
                .with_context(|| format!("{phase} -> {status} for {}", request.project_id))?;
            render::written_json(&record)
        }
        Command::OrderMaterial { project } => {
            let record = lifecycle
                .order_material(&project, now_ms)
                .with_context(|| format!("order material for {project}"))?;
            render::written_json(&record)
        }
        Command::Approve { project, revoke } => {
            let record = lifecycle
                .approve_for_site_survey(&project, !revoke, now_ms)
                .with_context(|| format!("approve {project}"))?;
            render::written_json(&record)
        }
        Command::Delivery {
            project,
            location,
            contacted,
        } => {
            let update = MaterialDeliveryUpdate {
                drop_ship_location: location,
                homeowner_contacted: contacted,
            };
            let record = lifecycle
                .set_material_delivery(&project, &update, now_ms)
                .with_context(|| format!("delivery update for {project}"))?;
            render::written_json(&record)
        }
        Command::CorrectDate {
            project,
            field,
            value,
            clear: _,
        } => {
            let record = lifecycle
                .correct_date(&project, field, value, now_ms)
                .with_context(|| format!("correct {field} for {project}"))?;
            render::written_json(&record)
        }
        Command::TicketImport { file } => {
            let reader: Box<dyn BufRead> = match &file {
                Some(path) => Box::new(std::io::BufReader::new(
                    std::fs::File::open(path)
                        .with_context(|| format!("open {}", path.display()))?,
                )),
                None => Box::new(std::io::stdin().lock()),
            };
            import_tickets(&mut lifecycle, reader, now_ms)
        }
        Command::TicketRemove { ticket_id } => {
            let project = lifecycle
                .remove_ticket(&ticket_id, now_ms)
                .with_context(|| format!("remove ticket {ticket_id}"))?;
            Ok(json!({
                "ticket_id": ticket_id,
                "removed": project.is_some(),
                "project_id": project,
            }))
        }
        Command::Queues { projects } => {
            let projects = if projects.is_empty() {
                stored_projects(lifecycle.store())?
            } else {
                projects
            };
            let buckets = lifecycle
                .classify_all(&projects, now_ms)
                .context("classify projects")?;
            Ok(render::queues_json(&buckets))
        }
        Command::Sync {
            cursor,
            limit,
            prune,
        } => {
            let report = lifecycle
                .sync_changes(cursor, limit, now_ms)
                .context("sync change feed")?;
            let pruned = if prune {
                lifecycle
                    .prune_changes(report.cursor)
                    .context("prune change feed")?
            } else {
                0
            };
            Ok(render::sync_json(&report, pruned))
        }
        Command::Delete { project } => {
            let deleted = lifecycle
                .delete_project(&project, now_ms)
                .with_context(|| format!("delete {project}"))?;
            Ok(json!({ "project_id": project, "deleted": deleted }))
        }
    }
}

fn parse_target(phase: Phase, status: &str) -> Result<PhaseStatus> {
    PhaseStatus::parse(phase, status)
        .ok_or_else(|| anyhow!("{status:?} is not a status of phase {phase}"))
}

fn stored_projects(store: &SqliteStore) -> Result<Vec<ProjectId>> {
    let mut out = Vec::new();
    loop {
        let page = store
            .list_timelines(QUEUE_PAGE, out.len())
            .context("list timelines")?;
        let done = page.len() < QUEUE_PAGE;
        out.extend(page.into_iter().map(|record| record.project_id));
        if done {
            return Ok(out);
        }
    }
}

fn import_tickets(
    lifecycle: &mut Lifecycle<SqliteStore>,
    reader: impl BufRead,
    now_ms: i64,
) -> Result<Value> {
    let mut imported = 0usize;
    let mut results = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("read ticket input")?;
        if line.trim().is_empty() {
            continue;
        }
        let ticket: Ticket = serde_json::from_str(&line)
            .with_context(|| format!("line {}: invalid ticket", index + 1))?;
        let reconciled = lifecycle
            .record_ticket(&ticket, now_ms)
            .with_context(|| format!("line {}: store ticket {}", index + 1, ticket.id))?;
        imported += 1;
        let mut entry = render::reconciled_json(reconciled.as_ref());
        if let Value::Object(map) = &mut entry {
            map.insert("ticket_id".to_string(), json!(ticket.id));
            map.insert("project_id".to_string(), json!(ticket.project_id));
        }
        results.push(entry);
    }
    tracing::info!(imported, "tickets imported");
    Ok(json!({ "imported": imported, "tickets": results }))
}
