#![forbid(unsafe_code)]

use crate::{Lifecycle, LifecycleError, TimelineStore};
use st_core::ids::ProjectId;
use st_core::{
    DateField, MaterialDeliveryUpdate, MaterialOrderStatus, Phase, PhaseStatus, TimelineRecord,
    TransitionError, TransitionRequest, apply_delivery_update, apply_transition,
    check_material_order, correct_date,
};
use st_storage::FieldSet;

impl<S: TimelineStore> Lifecycle<S> {
    /// Applies a gated manual status change. Ticket-driven fields are refreshed first.
    pub fn transition(
        &mut self,
        request: &TransitionRequest,
        now_ms: i64,
    ) -> Result<TimelineRecord, LifecycleError> {
        let record = self.fresh_record(&request.project_id, now_ms)?;
        self.commit_transition(&record, request, now_ms)
    }

    /// Marks material as ordered once installation is scheduled far enough ahead.
    pub fn order_material(
        &mut self,
        project_id: &ProjectId,
        now_ms: i64,
    ) -> Result<TimelineRecord, LifecycleError> {
        let record = self.fresh_record(project_id, now_ms)?;
        if record.material_order_status == MaterialOrderStatus::NotOrdered {
            check_material_order(&record, now_ms, self.config.material_lead_time)
                .map_err(|err| rejected(project_id, Phase::MaterialOrdering, err))?;
        }
        let request = TransitionRequest {
            project_id: project_id.clone(),
            phase: Phase::MaterialOrdering,
            target: PhaseStatus::MaterialOrdering(MaterialOrderStatus::Ordered),
            date_ms: None,
            notes: None,
        };
        self.commit_transition(&record, &request, now_ms)
    }

    /// Sets the intake flag, creating the record on first access.
    pub fn approve_for_site_survey(
        &mut self,
        project_id: &ProjectId,
        approved: bool,
        now_ms: i64,
    ) -> Result<TimelineRecord, LifecycleError> {
        let record = self.reconcile(project_id, now_ms)?.record;
        if record.approved_for_site_survey == approved {
            return Ok(record);
        }
        let mut next = record;
        next.approved_for_site_survey = approved;
        next.updated_at_ms = now_ms;
        let stored = self.store.upsert_fields(&next, FieldSet::Intake)?;
        tracing::info!(project_id = project_id.as_str(), approved, "site survey approval updated");
        Ok(stored)
    }

    pub fn set_material_delivery(
        &mut self,
        project_id: &ProjectId,
        update: &MaterialDeliveryUpdate,
        now_ms: i64,
    ) -> Result<TimelineRecord, LifecycleError> {
        let record = self.fresh_record(project_id, now_ms)?;
        let next = apply_delivery_update(&record, update, now_ms)
            .map_err(|err| rejected(project_id, Phase::MaterialOrdering, err))?;
        let stored = self
            .store
            .upsert_phase_fields(&next, Phase::MaterialOrdering)?;
        tracing::info!(
            project_id = project_id.as_str(),
            location = ?stored.material_drop_ship_location,
            contacted = stored.homeowner_contacted_for_delivery,
            "material delivery updated"
        );
        Ok(stored)
    }

    /// Rewrites or clears one date stamp. Ungated: corrections fix data entry mistakes.
    pub fn correct_date(
        &mut self,
        project_id: &ProjectId,
        field: DateField,
        value: Option<i64>,
        now_ms: i64,
    ) -> Result<TimelineRecord, LifecycleError> {
        let record = self.fresh_record(project_id, now_ms)?;
        let next = correct_date(&record, field, value, now_ms);
        let stored = self.store.upsert_fields(&next, FieldSet::Date(field))?;
        tracing::info!(
            project_id = project_id.as_str(),
            field = field.as_str(),
            value,
            "date corrected"
        );
        Ok(stored)
    }

    /// Removes the record and the project's tickets. Returns whether anything existed.
    pub fn delete_project(
        &mut self,
        project_id: &ProjectId,
        now_ms: i64,
    ) -> Result<bool, LifecycleError> {
        let deleted = self.store.delete_project(project_id, now_ms)?;
        tracing::info!(project_id = project_id.as_str(), deleted, "project deleted");
        Ok(deleted)
    }

    fn commit_transition(
        &mut self,
        record: &TimelineRecord,
        request: &TransitionRequest,
        now_ms: i64,
    ) -> Result<TimelineRecord, LifecycleError> {
        let next = apply_transition(record, request, now_ms, self.config.material_lead_time)
            .map_err(|err| rejected(&request.project_id, request.phase, err))?;
        let stored = self.store.upsert_phase_fields(&next, request.phase)?;
        tracing::info!(
            project_id = request.project_id.as_str(),
            phase = request.phase.as_str(),
            target = request.target.as_str(),
            "transition applied"
        );
        Ok(stored)
    }
}

fn rejected(project_id: &ProjectId, phase: Phase, err: TransitionError) -> LifecycleError {
    tracing::warn!(
        project_id = project_id.as_str(),
        phase = phase.as_str(),
        error = %err,
        "transition rejected"
    );
    LifecycleError::Transition(err)
}
