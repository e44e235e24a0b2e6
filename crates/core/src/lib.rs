#![forbid(unsafe_code)]

mod error;
pub mod gate;
pub mod label;
pub mod material;
pub mod model;
pub mod reconcile;
pub mod tickets;
pub mod transition;

pub use error::TransitionError;
pub use gate::{Requirement, can_enter_phase, check_phase};
pub use label::{QueueBucket, StatusLabel, derive_bucket, derive_label};
pub use material::{
    MATERIAL_LEAD_TIME, MaterialDeliveryUpdate, apply_delivery_update, can_order_material,
    check_material_order,
};
pub use model::*;
pub use reconcile::{Merge, TicketDrivenFields, merge_tickets};
pub use tickets::{
    PhaseTickets, Ticket, TicketClassification, TicketKind, TicketStatus, TrackedPhase, observe,
};
pub use transition::{PhaseStatus, TransitionRequest, apply_transition, correct_date};

pub mod ids {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub struct ProjectId(String);

    impl ProjectId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, ProjectIdError> {
            let value = value.into();
            validate_project_id(&value)?;
            Ok(Self(value))
        }
    }

    impl std::fmt::Display for ProjectId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl TryFrom<String> for ProjectId {
        type Error = ProjectIdError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            Self::try_new(value)
        }
    }

    impl From<ProjectId> for String {
        fn from(value: ProjectId) -> Self {
            value.0
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ProjectIdError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl std::fmt::Display for ProjectIdError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Empty => write!(f, "project id must not be empty"),
                Self::TooLong => write!(f, "project id is too long"),
                Self::InvalidFirstChar => {
                    write!(f, "project id must start with an ascii letter or digit")
                }
                Self::InvalidChar { ch, index } => {
                    write!(f, "project id has invalid char {ch:?} at {index}")
                }
            }
        }
    }

    impl std::error::Error for ProjectIdError {}

    fn validate_project_id(value: &str) -> Result<(), ProjectIdError> {
        if value.is_empty() {
            return Err(ProjectIdError::Empty);
        }
        if value.len() > 128 {
            return Err(ProjectIdError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(ProjectIdError::Empty);
        };
        if !first.is_ascii_alphanumeric() {
            return Err(ProjectIdError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(ProjectIdError::InvalidChar { ch, index });
        }
        Ok(())
    }

}
