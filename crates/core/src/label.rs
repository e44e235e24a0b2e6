#![forbid(unsafe_code)]

//! Canonical "current phase" label for dashboards and work queues.
//!
//! Predicates run from most to least advanced and the first match wins, so the order of
//! [`derive_label`] is significant.

use crate::model::{
    ApprovalStatus, EngineeringStatus, InspectionStatus, InstallationStatus,
    MaterialOrderStatus, SiteSurveyStatus, TimelineRecord,
};
use serde::{Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusLabel {
    SystemActive,
    SystemActivation,
    AwaitingPto,
    InspectionPassed,
    ReadyForReinspection,
    ServiceRequired,
    InspectionScheduled,
    ReadyForInspection,
    InstallationScheduled,
    MaterialOrdered,
    PendingMaterial,
    PermitsApproved,
    PermitRevisionSubmitted,
    PermitRevisionRequired,
    PermitReview,
    UtilityApproved,
    UtilityRevisionSubmitted,
    UtilityRevisionRequired,
    UtilityReview,
    EngineeringComplete,
    PendingEngineering,
    CoordinatingInstallation,
    SurveyComplete,
    SurveyScheduled,
    NewLead,
}

impl StatusLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemActive => "System Active",
            Self::SystemActivation => "System Activation",
            Self::AwaitingPto => "Awaiting PTO",
            Self::InspectionPassed => "Inspection Passed - Pending PTO",
            Self::ReadyForReinspection => "Ready for Re-Inspection",
            Self::ServiceRequired => "Service Required",
            Self::InspectionScheduled => "Inspection Scheduled",
            Self::ReadyForInspection => "Installation Completed - Ready for Inspection",
            Self::InstallationScheduled => "Installation Scheduled",
            Self::MaterialOrdered => "Material Ordered",
            Self::PendingMaterial => "Pending Material",
            Self::PermitsApproved => "Permits Approved",
            Self::PermitRevisionSubmitted => "Permit Revision Submitted",
            Self::PermitRevisionRequired => "Permit Revision Required",
            Self::PermitReview => "Permit Review",
            Self::UtilityApproved => "Utility Approved",
            Self::UtilityRevisionSubmitted => "Utility Revision Submitted",
            Self::UtilityRevisionRequired => "Utility Revision Required",
            Self::UtilityReview => "Utility Review",
            Self::EngineeringComplete => "Engineering Complete",
            Self::PendingEngineering => "Pending Engineering",
            Self::CoordinatingInstallation => "Coordinating Installation",
            Self::SurveyComplete => "Survey Complete",
            Self::SurveyScheduled => "Survey Scheduled",
            Self::NewLead => "New Lead",
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StatusLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn derive_label(record: &TimelineRecord) -> StatusLabel {
    use StatusLabel as L;

    if record.system_activated_date.is_some() {
        return L::SystemActive;
    }
    if record.pto_approved_date.is_some() {
        return L::SystemActivation;
    }
    if record.pto_submitted_date.is_some() {
        return L::AwaitingPto;
    }

    match record.inspection_status {
        InspectionStatus::Passed => return L::InspectionPassed,
        InspectionStatus::ServiceCompleted => return L::ReadyForReinspection,
        InspectionStatus::ServiceRequired | InspectionStatus::Failed => return L::ServiceRequired,
        InspectionStatus::Scheduled => return L::InspectionScheduled,
        InspectionStatus::Ready => return L::ReadyForInspection,
        InspectionStatus::NotReady => {}
    }
    match record.installation_status {
        Some(InstallationStatus::Completed) => return L::ReadyForInspection,
        Some(InstallationStatus::Scheduled) => return L::InstallationScheduled,
        _ => {}
    }
    if record.material_order_status == MaterialOrderStatus::Ordered {
        return L::MaterialOrdered;
    }
    if record.installation_status == Some(InstallationStatus::PendingMaterial) {
        return L::PendingMaterial;
    }

    match record.permit_status {
        ApprovalStatus::Approved => return L::PermitsApproved,
        ApprovalStatus::RevisionSubmitted => return L::PermitRevisionSubmitted,
        ApprovalStatus::RevisionRequired => return L::PermitRevisionRequired,
        ApprovalStatus::Submitted => return L::PermitReview,
        ApprovalStatus::NotStarted => {}
    }
    match record.utility_status {
        ApprovalStatus::Approved => return L::UtilityApproved,
        ApprovalStatus::RevisionSubmitted => return L::UtilityRevisionSubmitted,
        ApprovalStatus::RevisionRequired => return L::UtilityRevisionRequired,
        ApprovalStatus::Submitted => return L::UtilityReview,
        ApprovalStatus::NotStarted => {}
    }

    match record.engineering_status {
        Some(EngineeringStatus::Completed) => return L::EngineeringComplete,
        Some(EngineeringStatus::Pending) => return L::PendingEngineering,
        None => {}
    }
    if record.installation_status == Some(InstallationStatus::PendingCustomer) {
        return L::CoordinatingInstallation;
    }

    match record.site_survey_status {
        SiteSurveyStatus::Completed => L::SurveyComplete,
        SiteSurveyStatus::Scheduled => L::SurveyScheduled,
        SiteSurveyStatus::PendingSchedule => L::NewLead,
    }
}

/// Work queue a project is listed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueueBucket {
    /// Not yet approved for a site survey, whatever else is recorded.
    NewProjectVerification,
    Status(StatusLabel),
}

impl QueueBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewProjectVerification => "New Project Verification",
            Self::Status(label) => label.as_str(),
        }
    }
}

impl std::fmt::Display for QueueBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for QueueBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn derive_bucket(record: &TimelineRecord) -> QueueBucket {
    if !record.approved_for_site_survey {
        return QueueBucket::NewProjectVerification;
    }
    QueueBucket::Status(derive_label(record))
}
