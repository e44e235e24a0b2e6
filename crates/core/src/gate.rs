#![forbid(unsafe_code)]

use crate::TransitionError;
use crate::model::{
    ApprovalStatus, EngineeringStatus, InspectionStatus, InstallationStatus, Phase,
    SiteSurveyStatus, TimelineRecord,
};
use serde::{Deserialize, Serialize};

/// Condition a predecessor phase must satisfy before its successor may be entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    SiteSurveyCompleted,
    EngineeringCompleted,
    PermitApproved,
    InstallationScheduled,
    InstallationCompleted,
    InspectionPassed,
    PtoApproved,
}

impl Requirement {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SiteSurveyCompleted => "site_survey_status == completed",
            Self::EngineeringCompleted => "engineering_status == completed",
            Self::PermitApproved => "permit_status == approved",
            Self::InstallationScheduled => "installation_status == scheduled",
            Self::InstallationCompleted => "installation_status == completed",
            Self::InspectionPassed => "inspection_status == passed",
            Self::PtoApproved => "pto_approved_date set",
        }
    }

    /// The phase whose state this requirement inspects.
    pub fn predecessor(self) -> Phase {
        match self {
            Self::SiteSurveyCompleted => Phase::SiteSurvey,
            Self::EngineeringCompleted => Phase::Engineering,
            Self::PermitApproved => Phase::CityPermits,
            Self::InstallationScheduled | Self::InstallationCompleted => {
                Phase::InstallationCoordination
            }
            Self::InspectionPassed => Phase::CityInspection,
            Self::PtoApproved => Phase::Pto,
        }
    }

    pub fn is_met(self, record: &TimelineRecord) -> bool {
        match self {
            Self::SiteSurveyCompleted => record.site_survey_status == SiteSurveyStatus::Completed,
            Self::EngineeringCompleted => {
                record.engineering_status == Some(EngineeringStatus::Completed)
            }
            Self::PermitApproved => record.permit_status == ApprovalStatus::Approved,
            Self::InstallationScheduled => {
                record.installation_status == Some(InstallationStatus::Scheduled)
            }
            Self::InstallationCompleted => {
                record.installation_status == Some(InstallationStatus::Completed)
            }
            Self::InspectionPassed => record.inspection_status == InspectionStatus::Passed,
            Self::PtoApproved => record.pto_approved_date.is_some(),
        }
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Phase {
    /// Gate guarding entry into this phase; `None` for the first phase.
    pub fn requirement(self) -> Option<Requirement> {
        match self {
            Self::SiteSurvey => None,
            Self::Engineering => Some(Requirement::SiteSurveyCompleted),
            Self::UtilityApplication | Self::CityPermits => Some(Requirement::EngineeringCompleted),
            Self::InstallationCoordination => Some(Requirement::PermitApproved),
            Self::MaterialOrdering => Some(Requirement::InstallationScheduled),
            Self::CityInspection => Some(Requirement::InstallationCompleted),
            Self::Pto => Some(Requirement::InspectionPassed),
            Self::SystemActivation => Some(Requirement::PtoApproved),
        }
    }

    pub fn predecessor(self) -> Option<Phase> {
        self.requirement().map(Requirement::predecessor)
    }
}

pub fn can_enter_phase(record: &TimelineRecord, phase: Phase) -> bool {
    check_phase(record, phase).is_ok()
}

pub fn check_phase(record: &TimelineRecord, phase: Phase) -> Result<(), TransitionError> {
    match phase.requirement() {
        Some(missing) if !missing.is_met(record) => {
            Err(TransitionError::PreconditionNotMet { phase, missing })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ProjectId;

    fn record() -> TimelineRecord {
        TimelineRecord::new(ProjectId::try_new("p1").expect("project id"), 0)
    }

    #[test]
    fn fresh_record_only_allows_site_survey() {
        let record = record();
        let open = Phase::ALL
            .iter()
            .copied()
            .filter(|phase| can_enter_phase(&record, *phase))
            .collect::<Vec<_>>();
        assert_eq!(open, vec![Phase::SiteSurvey]);
    }

    #[test]
    fn utility_and_permits_share_the_engineering_gate() {
        let mut record = record();
        record.engineering_status = Some(EngineeringStatus::Pending);
        for phase in [Phase::UtilityApplication, Phase::CityPermits] {
            assert_eq!(
                check_phase(&record, phase),
                Err(TransitionError::PreconditionNotMet {
                    phase,
                    missing: Requirement::EngineeringCompleted,
                })
            );
        }
        record.engineering_status = Some(EngineeringStatus::Completed);
        assert!(can_enter_phase(&record, Phase::UtilityApplication));
        assert!(can_enter_phase(&record, Phase::CityPermits));
    }

    #[test]
    fn installation_coordination_needs_permit_approval_not_utility() {
        let mut record = record();
        record.utility_status = ApprovalStatus::Approved;
        assert!(!can_enter_phase(&record, Phase::InstallationCoordination));
        record.permit_status = ApprovalStatus::Approved;
        assert!(can_enter_phase(&record, Phase::InstallationCoordination));
    }

    #[test]
    fn downstream_gates_follow_the_table() {
        let mut record = record();
        record.installation_status = Some(InstallationStatus::Scheduled);
        assert!(can_enter_phase(&record, Phase::MaterialOrdering));
        assert!(!can_enter_phase(&record, Phase::CityInspection));

        record.installation_status = Some(InstallationStatus::Completed);
        assert!(can_enter_phase(&record, Phase::CityInspection));
        assert!(!can_enter_phase(&record, Phase::Pto));

        record.inspection_status = InspectionStatus::Passed;
        assert!(can_enter_phase(&record, Phase::Pto));
        assert!(!can_enter_phase(&record, Phase::SystemActivation));

        record.pto_approved_date = Some(1);
        assert!(can_enter_phase(&record, Phase::SystemActivation));
    }

    #[test]
    fn predecessor_names_the_gating_phase() {
        assert_eq!(Phase::SiteSurvey.predecessor(), None);
        assert_eq!(Phase::CityPermits.predecessor(), Some(Phase::Engineering));
        assert_eq!(
            Phase::MaterialOrdering.predecessor(),
            Some(Phase::InstallationCoordination)
        );
    }
}
