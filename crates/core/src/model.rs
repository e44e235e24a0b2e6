#![forbid(unsafe_code)]

use crate::ids::ProjectId;
use serde::{Deserialize, Serialize};

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every value, in workflow order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value.trim() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Ordered workflow phases of a project.
    Phase {
        SiteSurvey => "site_survey",
        Engineering => "engineering",
        UtilityApplication => "utility_application",
        CityPermits => "city_permits",
        InstallationCoordination => "installation_coordination",
        MaterialOrdering => "material_ordering",
        CityInspection => "city_inspection",
        Pto => "pto",
        SystemActivation => "system_activation",
    }
}

impl Phase {
    pub fn has_notes(self) -> bool {
        matches!(
            self,
            Self::UtilityApplication
                | Self::CityPermits
                | Self::InstallationCoordination
                | Self::CityInspection
        )
    }
}

string_enum! {
    SiteSurveyStatus {
        PendingSchedule => "pending_schedule",
        Scheduled => "scheduled",
        Completed => "completed",
    }
}

string_enum! {
    EngineeringStatus {
        Pending => "pending",
        Completed => "completed",
    }
}

string_enum! {
    /// Shared by the utility application and the city permit phases.
    ApprovalStatus {
        NotStarted => "not_started",
        Submitted => "submitted",
        RevisionRequired => "revision_required",
        RevisionSubmitted => "revision_submitted",
        Approved => "approved",
    }
}

impl ApprovalStatus {
    /// Forward moves plus the revision loop (a resubmission can be bounced again).
    pub fn can_move_to(self, to: Self) -> bool {
        to >= self || (self == Self::RevisionSubmitted && to == Self::RevisionRequired)
    }
}

string_enum! {
    InstallationStatus {
        PendingCustomer => "pending_customer",
        PendingMaterial => "pending_material",
        Scheduled => "scheduled",
        Completed => "completed",
    }
}

string_enum! {
    MaterialOrderStatus {
        NotOrdered => "not_ordered",
        Ordered => "ordered",
        Delivered => "delivered",
    }
}

string_enum! {
    InspectionStatus {
        NotReady => "not_ready",
        Ready => "ready",
        Scheduled => "scheduled",
        Passed => "passed",
        Failed => "failed",
        ServiceRequired => "service_required",
        ServiceCompleted => "service_completed",
    }
}

impl InspectionStatus {
    pub fn can_move_to(self, to: Self) -> bool {
        use InspectionStatus::*;
        match (self, to) {
            (Passed, Passed) => true,
            (Passed, _) => false,
            (
                Failed | ServiceRequired | ServiceCompleted,
                Scheduled | Passed | Failed | ServiceRequired | ServiceCompleted,
            ) => true,
            _ => to >= self,
        }
    }
}

string_enum! {
    DropShipLocation {
        CustomerHome => "customer_home",
        Warehouse => "warehouse",
    }
}

string_enum! {
    PtoStatus {
        Submitted => "submitted",
        Approved => "approved",
    }
}

string_enum! {
    ActivationStatus {
        Active => "active",
    }
}

string_enum! {
    /// Every date stamp on a [`TimelineRecord`]; the text is the storage column name.
    DateField {
        SiteSurveyScheduled => "site_survey_scheduled_date",
        SiteSurveyCompleted => "site_survey_completed_date",
        EngineeringCompleted => "engineering_completed_date",
        UtilitySubmitted => "utility_application_submitted_date",
        UtilityRevisionRequired => "utility_revision_required_date",
        UtilityRevisionSubmitted => "utility_revision_submitted_date",
        UtilityApproved => "utility_application_approved_date",
        PermitSubmitted => "permit_submitted_date",
        PermitRevisionRequired => "permit_revision_required_date",
        PermitRevisionSubmitted => "permit_revision_submitted_date",
        PermitApproved => "permit_approved_date",
        InstallationScheduled => "installation_scheduled_date",
        InstallationCompleted => "installation_completed_date",
        MaterialOrdered => "material_ordered_date",
        MaterialDelivered => "material_delivered_date",
        InspectionScheduled => "inspection_scheduled_date",
        InspectionPassed => "inspection_passed_date",
        InspectionFailed => "inspection_failed_date",
        InspectionServiceCompleted => "inspection_service_completed_date",
        PtoSubmitted => "pto_submitted_date",
        PtoApproved => "pto_approved_date",
        SystemActivated => "system_activated_date",
    }
}

/// Persisted per-project state of every phase. Dates are unix epoch milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineRecord {
    pub project_id: ProjectId,
    pub approved_for_site_survey: bool,

    pub site_survey_status: SiteSurveyStatus,
    pub site_survey_scheduled_date: Option<i64>,
    pub site_survey_completed_date: Option<i64>,

    /// Unset until engineering is picked up.
    pub engineering_status: Option<EngineeringStatus>,
    pub engineering_completed_date: Option<i64>,

    pub utility_status: ApprovalStatus,
    pub utility_application_submitted_date: Option<i64>,
    pub utility_revision_required_date: Option<i64>,
    pub utility_revision_submitted_date: Option<i64>,
    pub utility_application_approved_date: Option<i64>,
    pub utility_notes: Option<String>,

    pub permit_status: ApprovalStatus,
    pub permit_submitted_date: Option<i64>,
    pub permit_revision_required_date: Option<i64>,
    pub permit_revision_submitted_date: Option<i64>,
    pub permit_approved_date: Option<i64>,
    pub permit_notes: Option<String>,

    /// Unset until installation coordination starts.
    pub installation_status: Option<InstallationStatus>,
    pub installation_scheduled_date: Option<i64>,
    pub installation_completed_date: Option<i64>,
    pub installation_notes: Option<String>,

    pub material_order_status: MaterialOrderStatus,
    pub material_ordered_date: Option<i64>,
    pub material_delivered_date: Option<i64>,
    pub material_drop_ship_location: Option<DropShipLocation>,
    pub homeowner_contacted_for_delivery: bool,

    pub inspection_status: InspectionStatus,
    pub inspection_scheduled_date: Option<i64>,
    pub inspection_passed_date: Option<i64>,
    pub inspection_failed_date: Option<i64>,
    pub inspection_service_completed_date: Option<i64>,
    pub inspection_notes: Option<String>,

    pub pto_submitted_date: Option<i64>,
    pub pto_approved_date: Option<i64>,

    pub system_activated_date: Option<i64>,

    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl TimelineRecord {
    /// A record with every phase at its initial value.
    pub fn new(project_id: ProjectId, now_ms: i64) -> Self {
        Self {
            project_id,
            approved_for_site_survey: false,
            site_survey_status: SiteSurveyStatus::PendingSchedule,
            site_survey_scheduled_date: None,
            site_survey_completed_date: None,
            engineering_status: None,
            engineering_completed_date: None,
            utility_status: ApprovalStatus::NotStarted,
            utility_application_submitted_date: None,
            utility_revision_required_date: None,
            utility_revision_submitted_date: None,
            utility_application_approved_date: None,
            utility_notes: None,
            permit_status: ApprovalStatus::NotStarted,
            permit_submitted_date: None,
            permit_revision_required_date: None,
            permit_revision_submitted_date: None,
            permit_approved_date: None,
            permit_notes: None,
            installation_status: None,
            installation_scheduled_date: None,
            installation_completed_date: None,
            installation_notes: None,
            material_order_status: MaterialOrderStatus::NotOrdered,
            material_ordered_date: None,
            material_delivered_date: None,
            material_drop_ship_location: None,
            homeowner_contacted_for_delivery: false,
            inspection_status: InspectionStatus::NotReady,
            inspection_scheduled_date: None,
            inspection_passed_date: None,
            inspection_failed_date: None,
            inspection_service_completed_date: None,
            inspection_notes: None,
            pto_submitted_date: None,
            pto_approved_date: None,
            system_activated_date: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn date(&self, field: DateField) -> Option<i64> {
        match field {
            DateField::SiteSurveyScheduled => self.site_survey_scheduled_date,
            DateField::SiteSurveyCompleted => self.site_survey_completed_date,
            DateField::EngineeringCompleted => self.engineering_completed_date,
            DateField::UtilitySubmitted => self.utility_application_submitted_date,
            DateField::UtilityRevisionRequired => self.utility_revision_required_date,
            DateField::UtilityRevisionSubmitted => self.utility_revision_submitted_date,
            DateField::UtilityApproved => self.utility_application_approved_date,
            DateField::PermitSubmitted => self.permit_submitted_date,
            DateField::PermitRevisionRequired => self.permit_revision_required_date,
            DateField::PermitRevisionSubmitted => self.permit_revision_submitted_date,
            DateField::PermitApproved => self.permit_approved_date,
            DateField::InstallationScheduled => self.installation_scheduled_date,
            DateField::InstallationCompleted => self.installation_completed_date,
            DateField::MaterialOrdered => self.material_ordered_date,
            DateField::MaterialDelivered => self.material_delivered_date,
            DateField::InspectionScheduled => self.inspection_scheduled_date,
            DateField::InspectionPassed => self.inspection_passed_date,
            DateField::InspectionFailed => self.inspection_failed_date,
            DateField::InspectionServiceCompleted => self.inspection_service_completed_date,
            DateField::PtoSubmitted => self.pto_submitted_date,
            DateField::PtoApproved => self.pto_approved_date,
            DateField::SystemActivated => self.system_activated_date,
        }
    }

    pub fn date_mut(&mut self, field: DateField) -> &mut Option<i64> {
        match field {
            DateField::SiteSurveyScheduled => &mut self.site_survey_scheduled_date,
            DateField::SiteSurveyCompleted => &mut self.site_survey_completed_date,
            DateField::EngineeringCompleted => &mut self.engineering_completed_date,
            DateField::UtilitySubmitted => &mut self.utility_application_submitted_date,
            DateField::UtilityRevisionRequired => &mut self.utility_revision_required_date,
            DateField::UtilityRevisionSubmitted => &mut self.utility_revision_submitted_date,
            DateField::UtilityApproved => &mut self.utility_application_approved_date,
            DateField::PermitSubmitted => &mut self.permit_submitted_date,
            DateField::PermitRevisionRequired => &mut self.permit_revision_required_date,
            DateField::PermitRevisionSubmitted => &mut self.permit_revision_submitted_date,
            DateField::PermitApproved => &mut self.permit_approved_date,
            DateField::InstallationScheduled => &mut self.installation_scheduled_date,
            DateField::InstallationCompleted => &mut self.installation_completed_date,
            DateField::MaterialOrdered => &mut self.material_ordered_date,
            DateField::MaterialDelivered => &mut self.material_delivered_date,
            DateField::InspectionScheduled => &mut self.inspection_scheduled_date,
            DateField::InspectionPassed => &mut self.inspection_passed_date,
            DateField::InspectionFailed => &mut self.inspection_failed_date,
            DateField::InspectionServiceCompleted => &mut self.inspection_service_completed_date,
            DateField::PtoSubmitted => &mut self.pto_submitted_date,
            DateField::PtoApproved => &mut self.pto_approved_date,
            DateField::SystemActivated => &mut self.system_activated_date,
        }
    }

    /// Phase that owns a date stamp.
    pub fn date_phase(field: DateField) -> Phase {
        match field {
            DateField::SiteSurveyScheduled | DateField::SiteSurveyCompleted => Phase::SiteSurvey,
            DateField::EngineeringCompleted => Phase::Engineering,
            DateField::UtilitySubmitted
            | DateField::UtilityRevisionRequired
            | DateField::UtilityRevisionSubmitted
            | DateField::UtilityApproved => Phase::UtilityApplication,
            DateField::PermitSubmitted
            | DateField::PermitRevisionRequired
            | DateField::PermitRevisionSubmitted
            | DateField::PermitApproved => Phase::CityPermits,
            DateField::InstallationScheduled | DateField::InstallationCompleted => {
                Phase::InstallationCoordination
            }
            DateField::MaterialOrdered | DateField::MaterialDelivered => Phase::MaterialOrdering,
            DateField::InspectionScheduled
            | DateField::InspectionPassed
            | DateField::InspectionFailed
            | DateField::InspectionServiceCompleted => Phase::CityInspection,
            DateField::PtoSubmitted | DateField::PtoApproved => Phase::Pto,
            DateField::SystemActivated => Phase::SystemActivation,
        }
    }

    pub fn notes(&self, phase: Phase) -> Option<&str> {
        match phase {
            Phase::UtilityApplication => self.utility_notes.as_deref(),
            Phase::CityPermits => self.permit_notes.as_deref(),
            Phase::InstallationCoordination => self.installation_notes.as_deref(),
            Phase::CityInspection => self.inspection_notes.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn notes_mut(&mut self, phase: Phase) -> Option<&mut Option<String>> {
        match phase {
            Phase::UtilityApplication => Some(&mut self.utility_notes),
            Phase::CityPermits => Some(&mut self.permit_notes),
            Phase::InstallationCoordination => Some(&mut self.installation_notes),
            Phase::CityInspection => Some(&mut self.inspection_notes),
            _ => None,
        }
    }

    pub fn pto_status(&self) -> Option<PtoStatus> {
        if self.pto_approved_date.is_some() {
            Some(PtoStatus::Approved)
        } else if self.pto_submitted_date.is_some() {
            Some(PtoStatus::Submitted)
        } else {
            None
        }
    }
}
