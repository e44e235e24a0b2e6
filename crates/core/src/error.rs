#![forbid(unsafe_code)]

use crate::gate::Requirement;
use crate::model::Phase;
use time::Duration;

/// Rejections raised by gated status changes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("precondition not met: {phase} requires {missing}")]
    PreconditionNotMet { phase: Phase, missing: Requirement },

    #[error("material lead time too short (actual={actual}, required={required})")]
    LeadTimeTooShort { actual: Duration, required: Duration },

    #[error("phase not reached: {phase} requires {required}")]
    PhaseNotReached { phase: Phase, required: Requirement },

    #[error("invalid {phase} transition: {from} -> {to}")]
    InvalidTransition {
        phase: Phase,
        from: &'static str,
        to: &'static str,
    },

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}
