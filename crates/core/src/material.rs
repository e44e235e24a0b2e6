#![forbid(unsafe_code)]

use crate::TransitionError;
use crate::gate::Requirement;
use crate::model::{DropShipLocation, Phase, TimelineRecord};
use time::Duration;

/// Minimum gap between ordering material and the scheduled installation.
pub const MATERIAL_LEAD_TIME: Duration = Duration::hours(48);

pub fn can_order_material(record: &TimelineRecord, now_ms: i64) -> bool {
    check_material_order(record, now_ms, MATERIAL_LEAD_TIME).is_ok()
}

/// Installation must be scheduled; an unset installation date skips the lead-time check.
pub fn check_material_order(
    record: &TimelineRecord,
    now_ms: i64,
    lead_time: Duration,
) -> Result<(), TransitionError> {
    let required = Requirement::InstallationScheduled;
    if !required.is_met(record) {
        return Err(TransitionError::PhaseNotReached {
            phase: Phase::MaterialOrdering,
            required,
        });
    }
    let Some(scheduled_ms) = record.installation_scheduled_date else {
        return Ok(());
    };
    let actual = Duration::milliseconds(scheduled_ms.saturating_sub(now_ms));
    if actual < lead_time {
        return Err(TransitionError::LeadTimeTooShort {
            actual,
            required: lead_time,
        });
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterialDeliveryUpdate {
    pub drop_ship_location: Option<DropShipLocation>,
    pub homeowner_contacted: Option<bool>,
}

pub fn apply_delivery_update(
    record: &TimelineRecord,
    update: &MaterialDeliveryUpdate,
    now_ms: i64,
) -> Result<TimelineRecord, TransitionError> {
    if update.drop_ship_location.is_none() && update.homeowner_contacted.is_none() {
        return Err(TransitionError::InvalidInput("no delivery fields to update"));
    }
    let mut next = record.clone();
    if let Some(location) = update.drop_ship_location {
        next.material_drop_ship_location = Some(location);
    }
    if let Some(contacted) = update.homeowner_contacted {
        next.homeowner_contacted_for_delivery = contacted;
    }
    next.updated_at_ms = now_ms;
    Ok(next)
}
