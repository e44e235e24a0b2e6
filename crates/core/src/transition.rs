#![forbid(unsafe_code)]

use crate::TransitionError;
use crate::gate::check_phase;
use crate::ids::ProjectId;
use crate::material::check_material_order;
use crate::model::{
    ActivationStatus, ApprovalStatus, DateField, EngineeringStatus, InspectionStatus,
    InstallationStatus, MaterialOrderStatus, Phase, PtoStatus, SiteSurveyStatus, TimelineRecord,
};
use time::Duration;

/// Target value of a manual transition, tagged by the phase it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseStatus {
    SiteSurvey(SiteSurveyStatus),
    Engineering(EngineeringStatus),
    UtilityApplication(ApprovalStatus),
    CityPermits(ApprovalStatus),
    InstallationCoordination(InstallationStatus),
    MaterialOrdering(MaterialOrderStatus),
    CityInspection(InspectionStatus),
    Pto(PtoStatus),
    SystemActivation(ActivationStatus),
}

impl PhaseStatus {
    pub fn phase(self) -> Phase {
        match self {
            Self::SiteSurvey(_) => Phase::SiteSurvey,
            Self::Engineering(_) => Phase::Engineering,
            Self::UtilityApplication(_) => Phase::UtilityApplication,
            Self::CityPermits(_) => Phase::CityPermits,
            Self::InstallationCoordination(_) => Phase::InstallationCoordination,
            Self::MaterialOrdering(_) => Phase::MaterialOrdering,
            Self::CityInspection(_) => Phase::CityInspection,
            Self::Pto(_) => Phase::Pto,
            Self::SystemActivation(_) => Phase::SystemActivation,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SiteSurvey(status) => status.as_str(),
            Self::Engineering(status) => status.as_str(),
            Self::UtilityApplication(status) | Self::CityPermits(status) => status.as_str(),
            Self::InstallationCoordination(status) => status.as_str(),
            Self::MaterialOrdering(status) => status.as_str(),
            Self::CityInspection(status) => status.as_str(),
            Self::Pto(status) => status.as_str(),
            Self::SystemActivation(status) => status.as_str(),
        }
    }

    pub fn parse(phase: Phase, value: &str) -> Option<Self> {
        Some(match phase {
            Phase::SiteSurvey => Self::SiteSurvey(SiteSurveyStatus::parse(value)?),
            Phase::Engineering => Self::Engineering(EngineeringStatus::parse(value)?),
            Phase::UtilityApplication => Self::UtilityApplication(ApprovalStatus::parse(value)?),
            Phase::CityPermits => Self::CityPermits(ApprovalStatus::parse(value)?),
            Phase::InstallationCoordination => {
                Self::InstallationCoordination(InstallationStatus::parse(value)?)
            }
            Phase::MaterialOrdering => Self::MaterialOrdering(MaterialOrderStatus::parse(value)?),
            Phase::CityInspection => Self::CityInspection(InspectionStatus::parse(value)?),
            Phase::Pto => Self::Pto(PtoStatus::parse(value)?),
            Phase::SystemActivation => Self::SystemActivation(ActivationStatus::parse(value)?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionRequest {
    pub project_id: ProjectId,
    pub phase: Phase,
    pub target: PhaseStatus,
    /// Stamp for the reached status; defaults to `now`.
    pub date_ms: Option<i64>,
    pub notes: Option<String>,
}

/// Applies a gated manual status change and returns the updated record.
///
/// Only the transitioning phase's columns change. Date stamps already present are kept.
pub fn apply_transition(
    record: &TimelineRecord,
    request: &TransitionRequest,
    now_ms: i64,
    lead_time: Duration,
) -> Result<TimelineRecord, TransitionError> {
    let phase = request.phase;
    if request.target.phase() != phase {
        return Err(TransitionError::InvalidTransition {
            phase,
            from: phase.as_str(),
            to: request.target.as_str(),
        });
    }
    if request.project_id != record.project_id {
        return Err(TransitionError::InvalidInput("project id does not match record"));
    }
    if request.notes.is_some() && !phase.has_notes() {
        return Err(TransitionError::InvalidInput("phase does not carry notes"));
    }
    check_phase(record, phase)?;

    let at = request.date_ms.unwrap_or(now_ms);
    let mut next = record.clone();

    match request.target {
        PhaseStatus::SiteSurvey(to) => {
            let from = record.site_survey_status;
            ensure(phase, from.as_str(), to.as_str(), to >= from)?;
            next.site_survey_status = to;
            match to {
                SiteSurveyStatus::PendingSchedule => {}
                SiteSurveyStatus::Scheduled => {
                    stamp(&mut next, DateField::SiteSurveyScheduled, at);
                }
                SiteSurveyStatus::Completed => {
                    stamp(&mut next, DateField::SiteSurveyCompleted, at);
                }
            }
        }
        PhaseStatus::Engineering(to) => {
            let from = record.engineering_status;
            ensure(
                phase,
                unset_or(from.map(EngineeringStatus::as_str)),
                to.as_str(),
                from.is_none_or(|from| to >= from),
            )?;
            next.engineering_status = Some(to);
            if to == EngineeringStatus::Completed {
                stamp(&mut next, DateField::EngineeringCompleted, at);
            }
        }
        PhaseStatus::UtilityApplication(to) => {
            let from = record.utility_status;
            ensure(phase, from.as_str(), to.as_str(), from.can_move_to(to))?;
            next.utility_status = to;
            if let Some(field) = utility_date(to) {
                stamp(&mut next, field, at);
            }
        }
        PhaseStatus::CityPermits(to) => {
            let from = record.permit_status;
            ensure(phase, from.as_str(), to.as_str(), from.can_move_to(to))?;
            next.permit_status = to;
            if let Some(field) = permit_date(to) {
                stamp(&mut next, field, at);
            }
        }
        PhaseStatus::InstallationCoordination(to) => {
            let from = record.installation_status;
            ensure(
                phase,
                unset_or(from.map(InstallationStatus::as_str)),
                to.as_str(),
                from.is_none_or(|from| to >= from),
            )?;
            next.installation_status = Some(to);
            match to {
                // The stamp is the appointment the material lead time is measured against;
                // without a supplied date it stays unknown.
                InstallationStatus::Scheduled => {
                    if let Some(appointment) = request.date_ms {
                        stamp(&mut next, DateField::InstallationScheduled, appointment);
                    }
                }
                InstallationStatus::Completed => {
                    stamp(&mut next, DateField::InstallationCompleted, at);
                }
                InstallationStatus::PendingCustomer | InstallationStatus::PendingMaterial => {}
            }
        }
        PhaseStatus::MaterialOrdering(to) => {
            let from = record.material_order_status;
            ensure(phase, from.as_str(), to.as_str(), to >= from)?;
            match to {
                MaterialOrderStatus::NotOrdered => {}
                MaterialOrderStatus::Ordered => {
                    if from == MaterialOrderStatus::NotOrdered {
                        check_material_order(record, now_ms, lead_time)?;
                    }
                    stamp(&mut next, DateField::MaterialOrdered, at);
                }
                MaterialOrderStatus::Delivered => {
                    let ordered = from != MaterialOrderStatus::NotOrdered;
                    ensure(phase, from.as_str(), to.as_str(), ordered)?;
                    stamp(&mut next, DateField::MaterialDelivered, at);
                }
            }
            next.material_order_status = to;
        }
        PhaseStatus::CityInspection(to) => {
            let from = record.inspection_status;
            ensure(phase, from.as_str(), to.as_str(), from.can_move_to(to))?;
            next.inspection_status = to;
            if let Some(field) = inspection_date(to) {
                stamp(&mut next, field, at);
            }
        }
        PhaseStatus::Pto(to) => match to {
            PtoStatus::Submitted => stamp(&mut next, DateField::PtoSubmitted, at),
            PtoStatus::Approved => {
                let from = record.pto_status().map(PtoStatus::as_str);
                let submitted = record.pto_submitted_date.is_some();
                ensure(phase, unset_or(from), to.as_str(), submitted)?;
                stamp(&mut next, DateField::PtoApproved, at);
            }
        },
        PhaseStatus::SystemActivation(ActivationStatus::Active) => {
            stamp(&mut next, DateField::SystemActivated, at);
        }
    }

    if let Some(notes) = &request.notes
        && let Some(slot) = next.notes_mut(phase)
    {
        let trimmed = notes.trim();
        *slot = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    next.updated_at_ms = now_ms;
    Ok(next)
}

/// Explicit correction of a date stamp; the only path that may rewrite or clear one.
pub fn correct_date(
    record: &TimelineRecord,
    field: DateField,
    value: Option<i64>,
    now_ms: i64,
) -> TimelineRecord {
    let mut next = record.clone();
    *next.date_mut(field) = value;
    next.updated_at_ms = now_ms;
    next
}

fn ensure(
    phase: Phase,
    from: &'static str,
    to: &'static str,
    allowed: bool,
) -> Result<(), TransitionError> {
    if allowed {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition { phase, from, to })
    }
}

fn unset_or(value: Option<&'static str>) -> &'static str {
    value.unwrap_or("unset")
}

fn stamp(record: &mut TimelineRecord, field: DateField, at: i64) {
    let slot = record.date_mut(field);
    if slot.is_none() {
        *slot = Some(at);
    }
}

fn utility_date(status: ApprovalStatus) -> Option<DateField> {
    match status {
        ApprovalStatus::NotStarted => None,
        ApprovalStatus::Submitted => Some(DateField::UtilitySubmitted),
        ApprovalStatus::RevisionRequired => Some(DateField::UtilityRevisionRequired),
        ApprovalStatus::RevisionSubmitted => Some(DateField::UtilityRevisionSubmitted),
        ApprovalStatus::Approved => Some(DateField::UtilityApproved),
    }
}

fn permit_date(status: ApprovalStatus) -> Option<DateField> {
    match status {
        ApprovalStatus::NotStarted => None,
        ApprovalStatus::Submitted => Some(DateField::PermitSubmitted),
        ApprovalStatus::RevisionRequired => Some(DateField::PermitRevisionRequired),
        ApprovalStatus::RevisionSubmitted => Some(DateField::PermitRevisionSubmitted),
        ApprovalStatus::Approved => Some(DateField::PermitApproved),
    }
}

fn inspection_date(status: InspectionStatus) -> Option<DateField> {
    match status {
        InspectionStatus::Scheduled => Some(DateField::InspectionScheduled),
        InspectionStatus::Passed => Some(DateField::InspectionPassed),
        InspectionStatus::Failed => Some(DateField::InspectionFailed),
        InspectionStatus::ServiceCompleted => Some(DateField::InspectionServiceCompleted),
        InspectionStatus::NotReady | InspectionStatus::Ready | InspectionStatus::ServiceRequired => {
            None
        }
    }
}
