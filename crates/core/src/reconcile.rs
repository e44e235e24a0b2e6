#![forbid(unsafe_code)]

use crate::model::{InspectionStatus, InstallationStatus, Phase, SiteSurveyStatus, TimelineRecord};
use crate::tickets::{PhaseTickets, TicketClassification};

/// The columns reconciliation owns. Everything else on a record is manual.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketDrivenFields {
    pub site_survey_status: SiteSurveyStatus,
    pub site_survey_scheduled_date: Option<i64>,
    pub site_survey_completed_date: Option<i64>,
    pub installation_status: Option<InstallationStatus>,
    pub installation_scheduled_date: Option<i64>,
    pub installation_completed_date: Option<i64>,
    pub inspection_status: InspectionStatus,
    pub inspection_scheduled_date: Option<i64>,
    pub inspection_passed_date: Option<i64>,
}

impl TicketDrivenFields {
    pub fn of(record: &TimelineRecord) -> Self {
        Self {
            site_survey_status: record.site_survey_status,
            site_survey_scheduled_date: record.site_survey_scheduled_date,
            site_survey_completed_date: record.site_survey_completed_date,
            installation_status: record.installation_status,
            installation_scheduled_date: record.installation_scheduled_date,
            installation_completed_date: record.installation_completed_date,
            inspection_status: record.inspection_status,
            inspection_scheduled_date: record.inspection_scheduled_date,
            inspection_passed_date: record.inspection_passed_date,
        }
    }

    pub fn apply_to(&self, record: &mut TimelineRecord) {
        record.site_survey_status = self.site_survey_status;
        record.site_survey_scheduled_date = self.site_survey_scheduled_date;
        record.site_survey_completed_date = self.site_survey_completed_date;
        record.installation_status = self.installation_status;
        record.installation_scheduled_date = self.installation_scheduled_date;
        record.installation_completed_date = self.installation_completed_date;
        record.inspection_status = self.inspection_status;
        record.inspection_scheduled_date = self.inspection_scheduled_date;
        record.inspection_passed_date = self.inspection_passed_date;
    }

    /// Phases whose ticket-driven columns differ between `self` and `other`, in phase order.
    pub fn changed_phases(&self, other: &Self) -> Vec<Phase> {
        let mut out = Vec::new();
        if (
            self.site_survey_status,
            self.site_survey_scheduled_date,
            self.site_survey_completed_date,
        ) != (
            other.site_survey_status,
            other.site_survey_scheduled_date,
            other.site_survey_completed_date,
        ) {
            out.push(Phase::SiteSurvey);
        }
        if (
            self.installation_status,
            self.installation_scheduled_date,
            self.installation_completed_date,
        ) != (
            other.installation_status,
            other.installation_scheduled_date,
            other.installation_completed_date,
        ) {
            out.push(Phase::InstallationCoordination);
        }
        if (
            self.inspection_status,
            self.inspection_scheduled_date,
            self.inspection_passed_date,
        ) != (
            other.inspection_status,
            other.inspection_scheduled_date,
            other.inspection_passed_date,
        ) {
            out.push(Phase::CityInspection);
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Merge {
    pub record: TimelineRecord,
    /// Ticket-driven fields differ from the input record.
    pub drifted: bool,
    /// Phases whose ticket-driven columns changed. Only these may be written back.
    pub changed: Vec<Phase>,
}

/// Recomputes ticket-driven fields. A phase without a matching ticket keeps its current value.
pub fn merge_tickets(current: &TimelineRecord, tickets: &TicketClassification<'_>) -> Merge {
    let before = TicketDrivenFields::of(current);
    let mut fields = before.clone();

    merge_site_survey(&mut fields, tickets.site_survey);
    // Survey completion does not touch engineering; it stays at its initial value
    // until someone picks the design up.
    merge_installation(&mut fields, tickets.installation);
    merge_inspection(&mut fields, tickets.city_inspection);

    let changed = before.changed_phases(&fields);
    let mut record = current.clone();
    fields.apply_to(&mut record);
    Merge {
        record,
        drifted: !changed.is_empty(),
        changed,
    }
}

fn merge_site_survey(fields: &mut TicketDrivenFields, tickets: PhaseTickets<'_>) {
    if let Some(ticket) = tickets.completed {
        fields.site_survey_status = SiteSurveyStatus::Completed;
        fields.site_survey_completed_date = ticket.effective_date();
        fields.site_survey_scheduled_date =
            ticket.scheduled_date.or(fields.site_survey_scheduled_date);
    } else if let Some(ticket) = tickets.scheduled {
        fields.site_survey_status = SiteSurveyStatus::Scheduled;
        fields.site_survey_scheduled_date = ticket.effective_date();
    }
}

fn merge_installation(fields: &mut TicketDrivenFields, tickets: PhaseTickets<'_>) {
    if let Some(ticket) = tickets.completed {
        fields.installation_status = Some(InstallationStatus::Completed);
        fields.installation_completed_date = ticket.effective_date();
        fields.installation_scheduled_date =
            ticket.scheduled_date.or(fields.installation_scheduled_date);
    } else if let Some(ticket) = tickets.scheduled {
        fields.installation_status = Some(InstallationStatus::Scheduled);
        fields.installation_scheduled_date = ticket.effective_date();
    }
}

fn merge_inspection(fields: &mut TicketDrivenFields, tickets: PhaseTickets<'_>) {
    if let Some(ticket) = tickets.completed {
        fields.inspection_status = InspectionStatus::Passed;
        fields.inspection_passed_date = ticket.effective_date();
        fields.inspection_scheduled_date =
            ticket.scheduled_date.or(fields.inspection_scheduled_date);
    } else if let Some(ticket) = tickets.scheduled {
        fields.inspection_status = InspectionStatus::Scheduled;
        fields.inspection_scheduled_date = ticket.effective_date();
    } else if fields.installation_status == Some(InstallationStatus::Completed)
        && fields.inspection_status == InspectionStatus::NotReady
    {
        fields.inspection_status = InspectionStatus::Ready;
    }
}
