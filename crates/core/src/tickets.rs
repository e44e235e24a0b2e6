#![forbid(unsafe_code)]

use crate::ids::ProjectId;
use serde::{Deserialize, Serialize};

pub const SITE_SURVEY_PROBLEM_CODE: &str = "site_survey";
pub const CITY_INSPECTION_PROBLEM_CODE: &str = "city_inspection";

/// Appointment or ticket type. Unknown values are preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketKind {
    SiteSurvey,
    Installation,
    Inspection,
    Service,
    Other(String),
}

impl TicketKind {
    pub fn parse(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "site_survey" => Self::SiteSurvey,
            "installation" | "install" => Self::Installation,
            "inspection" => Self::Inspection,
            "service" => Self::Service,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SiteSurvey => "site_survey",
            Self::Installation => "installation",
            Self::Inspection => "inspection",
            Self::Service => "service",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for TicketKind {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<TicketKind> for String {
    fn from(value: TicketKind) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketStatus {
    /// `confirmed` and `scheduled` both land here.
    Scheduled,
    Completed,
    Other(String),
}

impl TicketStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirmed" | "scheduled" => Self::Scheduled,
            "completed" => Self::Completed,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for TicketStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<TicketStatus> for String {
    fn from(value: TicketStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Scheduling / field-service record owned by the ticketing system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub project_id: ProjectId,
    #[serde(default)]
    pub appointment_type: Option<TicketKind>,
    #[serde(default)]
    pub ticket_type: Option<TicketKind>,
    #[serde(default, alias = "ticket_status")]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub scheduled_date: Option<i64>,
    #[serde(default)]
    pub closed_at: Option<i64>,
    #[serde(default)]
    pub problem_code: Option<String>,
    #[serde(default)]
    pub assigned_technicians: Vec<String>,
}

impl Ticket {
    /// Either historical type column may carry the kind.
    pub fn is_kind(&self, kind: &TicketKind) -> bool {
        self.appointment_type.as_ref() == Some(kind) || self.ticket_type.as_ref() == Some(kind)
    }

    pub fn has_problem_code(&self, code: &str) -> bool {
        self.problem_code
            .as_deref()
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(code))
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(TicketStatus::Completed) || self.closed_at.is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == Some(TicketStatus::Scheduled)
    }

    /// `closed_at` wins over `scheduled_date`.
    pub fn effective_date(&self) -> Option<i64> {
        self.closed_at.or(self.scheduled_date)
    }
}

/// Phases whose status is derived from tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackedPhase {
    SiteSurvey,
    Installation,
    CityInspection,
}

impl TrackedPhase {
    pub fn matches(self, ticket: &Ticket) -> bool {
        match self {
            Self::SiteSurvey => {
                ticket.is_kind(&TicketKind::SiteSurvey)
                    || ticket.is_kind(&TicketKind::Service)
                    || (ticket.is_kind(&TicketKind::Inspection)
                        && ticket.has_problem_code(SITE_SURVEY_PROBLEM_CODE))
            }
            Self::Installation => ticket.is_kind(&TicketKind::Installation),
            Self::CityInspection => {
                ticket.is_kind(&TicketKind::Inspection)
                    && ticket.has_problem_code(CITY_INSPECTION_PROBLEM_CODE)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseTickets<'a> {
    pub scheduled: Option<&'a Ticket>,
    pub completed: Option<&'a Ticket>,
}

impl PhaseTickets<'_> {
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_none() && self.completed.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TicketClassification<'a> {
    pub site_survey: PhaseTickets<'a>,
    pub installation: PhaseTickets<'a>,
    pub city_inspection: PhaseTickets<'a>,
}

impl<'a> TicketClassification<'a> {
    pub fn phase(&self, phase: TrackedPhase) -> PhaseTickets<'a> {
        match phase {
            TrackedPhase::SiteSurvey => self.site_survey,
            TrackedPhase::Installation => self.installation,
            TrackedPhase::CityInspection => self.city_inspection,
        }
    }
}

/// Classifies the project's tickets per tracked phase. Tickets of other projects are ignored;
/// the first matching ticket in input order wins.
pub fn observe<'a>(project_id: &ProjectId, tickets: &'a [Ticket]) -> TicketClassification<'a> {
    TicketClassification {
        site_survey: classify(project_id, tickets, TrackedPhase::SiteSurvey),
        installation: classify(project_id, tickets, TrackedPhase::Installation),
        city_inspection: classify(project_id, tickets, TrackedPhase::CityInspection),
    }
}

fn classify<'a>(project_id: &ProjectId, tickets: &'a [Ticket], phase: TrackedPhase) -> PhaseTickets<'a> {
    let mut matching = tickets
        .iter()
        .filter(|ticket| &ticket.project_id == project_id && phase.matches(ticket));
    let completed = matching.clone().find(|ticket| ticket.is_completed());
    let scheduled = match completed {
        Some(_) => None,
        None => matching.find(|ticket| ticket.is_scheduled()),
    };
    PhaseTickets {
        scheduled,
        completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectId {
        ProjectId::try_new("p1").expect("project id")
    }

    fn ticket(id: &str, kind: &str, status: &str) -> Ticket {
        Ticket {
            id: id.to_string(),
            project_id: project(),
            appointment_type: Some(TicketKind::parse(kind)),
            ticket_type: None,
            status: Some(TicketStatus::parse(status)),
            scheduled_date: Some(1_000),
            closed_at: None,
            problem_code: None,
            assigned_technicians: Vec::new(),
        }
    }

    #[test]
    fn completed_ticket_suppresses_scheduled() {
        let tickets = vec![
            ticket("t1", "installation", "confirmed"),
            ticket("t2", "installation", "completed"),
        ];
        let observed = observe(&project(), &tickets);
        assert_eq!(observed.installation.completed.map(|t| t.id.as_str()), Some("t2"));
        assert!(observed.installation.scheduled.is_none());
        assert!(observed.site_survey.is_empty());
    }

    #[test]
    fn closed_at_counts_as_completed() {
        let mut closed = ticket("t1", "site_survey", "confirmed");
        closed.closed_at = Some(2_000);
        let tickets = vec![closed];
        let observed = observe(&project(), &tickets);
        assert!(observed.site_survey.completed.is_some());
        assert_eq!(observed.site_survey.completed.and_then(Ticket::effective_date), Some(2_000));
    }

    #[test]
    fn site_survey_covers_all_historical_variants() {
        let mut inspection_survey = ticket("t3", "inspection", "scheduled");
        inspection_survey.problem_code = Some("site_survey".to_string());
        let mut legacy_column = ticket("t4", "other", "scheduled");
        legacy_column.appointment_type = None;
        legacy_column.ticket_type = Some(TicketKind::SiteSurvey);

        for candidate in [
            ticket("t1", "site_survey", "scheduled"),
            ticket("t2", "service", "scheduled"),
            inspection_survey,
            legacy_column,
        ] {
            assert!(TrackedPhase::SiteSurvey.matches(&candidate), "{}", candidate.id);
            assert!(!TrackedPhase::CityInspection.matches(&candidate), "{}", candidate.id);
        }
    }

    #[test]
    fn city_inspection_requires_its_problem_code() {
        let bare = ticket("t1", "inspection", "scheduled");
        let mut city = ticket("t2", "inspection", "scheduled");
        city.problem_code = Some("CITY_INSPECTION".to_string());
        assert!(!TrackedPhase::CityInspection.matches(&bare));
        assert!(!TrackedPhase::SiteSurvey.matches(&bare));
        assert!(TrackedPhase::CityInspection.matches(&city));
    }

    #[test]
    fn first_match_wins_and_other_projects_are_ignored() {
        let mut foreign = ticket("t0", "installation", "completed");
        foreign.project_id = ProjectId::try_new("p2").expect("project id");
        let tickets = vec![
            foreign,
            ticket("t1", "installation", "scheduled"),
            ticket("t2", "installation", "scheduled"),
        ];
        let observed = observe(&project(), &tickets);
        assert!(observed.installation.completed.is_none());
        assert_eq!(observed.installation.scheduled.map(|t| t.id.as_str()), Some("t1"));
    }

    #[test]
    fn unknown_status_is_neither_scheduled_nor_completed() {
        let tickets = vec![ticket("t1", "installation", "cancelled")];
        let observed = observe(&project(), &tickets);
        assert!(observed.installation.is_empty());
        assert_eq!(tickets[0].status, Some(TicketStatus::Other("cancelled".to_string())));
    }

    #[test]
    fn deserializes_legacy_field_names() {
        let ticket: Ticket = serde_json::from_str(
            r#"{"id":"t9","project_id":"p1","ticket_type":"Install","ticket_status":"confirmed","assigned_technicians":["ana"]}"#,
        )
        .expect("ticket json");
        assert_eq!(ticket.ticket_type, Some(TicketKind::Installation));
        assert_eq!(ticket.status, Some(TicketStatus::Scheduled));
        assert_eq!(ticket.assigned_technicians, vec!["ana".to_string()]);
    }
}
