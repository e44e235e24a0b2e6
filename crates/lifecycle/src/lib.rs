#![forbid(unsafe_code)]

//! Project lifecycle service: reconciles timelines with tickets, applies gated manual
//! transitions and derives the status label / queue bucket of each project.
//!
//! Every operation takes `now_ms` explicitly; nothing here reads the clock.

mod error;
mod feed;
mod manual;
mod reconcile;
mod store;

pub use error::LifecycleError;
pub use feed::SyncReport;
pub use reconcile::{ReconcileOutcome, Reconciled};
pub use store::{TicketFeed, TimelineStore};

use st_core::ids::ProjectId;
use st_core::{
    MATERIAL_LEAD_TIME, QueueBucket, StatusLabel, TimelineRecord, derive_bucket, derive_label,
};
use std::collections::BTreeMap;
use time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Minimum gap between a material order and the scheduled installation.
    pub material_lead_time: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            material_lead_time: MATERIAL_LEAD_TIME,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectStatus {
    pub record: TimelineRecord,
    pub label: StatusLabel,
}

#[derive(Debug)]
pub struct Lifecycle<S> {
    store: S,
    config: LifecycleConfig,
}

impl<S: TimelineStore> Lifecycle<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, LifecycleConfig::default())
    }

    pub fn with_config(store: S, config: LifecycleConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconciles the project (creating its record on first access) and derives its label.
    pub fn get_status(
        &mut self,
        project_id: &ProjectId,
        now_ms: i64,
    ) -> Result<ProjectStatus, LifecycleError> {
        let record = self.reconcile(project_id, now_ms)?.record;
        let label = derive_label(&record);
        Ok(ProjectStatus { record, label })
    }

    /// Groups projects by queue bucket. Each project is reconciled first; a store failure
    /// aborts the whole listing.
    pub fn classify_all(
        &mut self,
        project_ids: &[ProjectId],
        now_ms: i64,
    ) -> Result<BTreeMap<QueueBucket, Vec<ProjectId>>, LifecycleError> {
        let mut buckets: BTreeMap<QueueBucket, Vec<ProjectId>> = BTreeMap::new();
        for project_id in project_ids {
            let record = self.reconcile(project_id, now_ms)?.record;
            buckets
                .entry(derive_bucket(&record))
                .or_default()
                .push(project_id.clone());
        }
        Ok(buckets)
    }
}
