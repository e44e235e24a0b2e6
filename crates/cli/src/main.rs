#![forbid(unsafe_code)]

//! solar-timeline: command-line front end for the project lifecycle store.
//!
//! Every command prints JSON on stdout; logs go to stderr.

mod clock;
mod commands;
mod config;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{CliConfig, ConfigLayer};
use st_core::ids::ProjectId;
use st_core::{DateField, DropShipLocation, Phase};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Solar project lifecycle: phase status, gates, ticket reconciliation and work queues.
#[derive(Parser, Debug)]
#[command(name = "solar-timeline", version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "SOLAR_TIMELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the timeline database
    #[arg(long, global = true, env = "SOLAR_TIMELINE_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// How long a write waits on a locked database
    #[arg(long, global = true, env = "SOLAR_TIMELINE_BUSY_TIMEOUT_MS")]
    busy_timeout_ms: Option<u64>,

    /// Minimum hours between a material order and the scheduled installation
    #[arg(long, global = true, env = "SOLAR_TIMELINE_MATERIAL_LEAD_TIME_HOURS")]
    material_lead_time_hours: Option<i64>,

    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[arg(long, global = true, env = "SOLAR_TIMELINE_LOG")]
    log: Option<String>,

    /// Evaluate as of this instant (RFC 3339 or epoch ms) instead of the wall clock
    #[arg(long, global = true, value_parser = parse_instant)]
    now: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile projects and print their record and status label
    Status {
        #[arg(required = true, value_parser = parse_project_id)]
        projects: Vec<ProjectId>,
    },

    /// Apply a gated manual status change
    Transition {
        #[arg(value_parser = parse_project_id)]
        project: ProjectId,
        #[arg(value_parser = parse_phase)]
        phase: Phase,
        /// Target status within the phase (e.g. `submitted`, `revision_required`)
        status: String,
        /// Date stamp for the reached status (defaults to now). For a scheduled installation
        /// this is the appointment, recorded only when given
        #[arg(long, value_parser = parse_instant)]
        date: Option<i64>,
        /// Replaces the phase notes (utility, permits, installation, inspection)
        #[arg(long)]
        notes: Option<String>,
    },

    /// Order material, enforcing the installation lead time
    OrderMaterial {
        #[arg(value_parser = parse_project_id)]
        project: ProjectId,
    },

    /// Approve a project for site survey
    Approve {
        #[arg(value_parser = parse_project_id)]
        project: ProjectId,
        /// Withdraw the approval instead
        #[arg(long)]
        revoke: bool,
    },

    /// Update material delivery details
    Delivery {
        #[arg(value_parser = parse_project_id)]
        project: ProjectId,
        #[arg(long, value_parser = parse_location)]
        location: Option<DropShipLocation>,
        /// Whether the homeowner was contacted about the delivery
        #[arg(long)]
        contacted: Option<bool>,
    },

    /// Rewrite or clear a date stamp
    CorrectDate {
        #[arg(value_parser = parse_project_id)]
        project: ProjectId,
        #[arg(value_parser = parse_date_field)]
        field: DateField,
        /// New value; omit together with --clear to remove the stamp
        #[arg(value_parser = parse_instant, required_unless_present = "clear")]
        value: Option<i64>,
        #[arg(long, conflicts_with = "value")]
        clear: bool,
    },

    /// Import ticket snapshots as JSON lines (one ticket per line)
    TicketImport {
        /// Read from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Delete a ticket
    TicketRemove { ticket_id: String },

    /// Group projects by work queue (all stored projects when none are given)
    Queues {
        #[arg(value_parser = parse_project_id)]
        projects: Vec<ProjectId>,
    },

    /// Drain the change feed and reconcile affected projects
    Sync {
        /// Resume after this change sequence number
        #[arg(long, default_value_t = 0)]
        cursor: i64,
        #[arg(long, default_value_t = 500)]
        limit: usize,
        /// Drop the consumed notifications from the feed afterwards
        #[arg(long)]
        prune: bool,
    },

    /// Delete a project's record and tickets
    Delete {
        #[arg(value_parser = parse_project_id)]
        project: ProjectId,
    },
}

fn parse_project_id(raw: &str) -> Result<ProjectId, String> {
    ProjectId::try_new(raw.trim()).map_err(|err| err.to_string())
}

fn parse_phase(raw: &str) -> Result<Phase, String> {
    Phase::parse(raw).ok_or_else(|| {
        let known = Phase::ALL.iter().map(|phase| phase.as_str()).collect::<Vec<_>>();
        format!("unknown phase {raw:?} (expected one of: {})", known.join(", "))
    })
}

fn parse_date_field(raw: &str) -> Result<DateField, String> {
    DateField::parse(raw).ok_or_else(|| format!("unknown date field {raw:?}"))
}

fn parse_location(raw: &str) -> Result<DropShipLocation, String> {
    DropShipLocation::parse(raw)
        .ok_or_else(|| format!("unknown location {raw:?} (expected customer_home or warehouse)"))
}

fn parse_instant(raw: &str) -> Result<i64, String> {
    clock::parse_timestamp(raw).map_err(|err| format!("{err:#}"))
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigLayer {
        storage_dir: cli.storage_dir.clone(),
        busy_timeout_ms: cli.busy_timeout_ms,
        material_lead_time_hours: cli.material_lead_time_hours,
        log: cli.log.clone(),
    };
    let config = CliConfig::resolve(cli.config.as_deref(), &overrides)
        .context("resolve configuration")?;
    init_logging(&config.log);
    tracing::debug!(storage_dir = %config.storage_dir.display(), "configuration resolved");

    let now_ms = cli.now.unwrap_or_else(clock::now_ms);
    let output = commands::run(&config, cli.command, now_ms)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
