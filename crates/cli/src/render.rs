#![forbid(unsafe_code)]

use crate::clock::format_ms;
use anyhow::Result;
use serde_json::{Map, Value, json};
use st_core::ids::ProjectId;
use st_core::{DateField, QueueBucket, TimelineRecord, derive_label};
use st_lifecycle::{ProjectStatus, Reconciled, SyncReport};
use std::collections::BTreeMap;

/// Record as JSON with every date stamp rendered as RFC 3339.
pub(crate) fn record_json(record: &TimelineRecord) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        for field in DateField::ALL {
            if let Some(ms) = record.date(*field) {
                map.insert(field.as_str().to_string(), Value::String(format_ms(ms)));
            }
        }
        map.insert(
            "created_at".to_string(),
            Value::String(format_ms(record.created_at_ms)),
        );
        map.insert(
            "updated_at".to_string(),
            Value::String(format_ms(record.updated_at_ms)),
        );
        map.remove("created_at_ms");
        map.remove("updated_at_ms");
    }
    Ok(value)
}

pub(crate) fn status_json(status: &ProjectStatus) -> Result<Value> {
    Ok(json!({
        "project_id": status.record.project_id,
        "label": status.label,
        "record": record_json(&status.record)?,
    }))
}

/// Transition / write result: the stored record plus the label it now derives.
pub(crate) fn written_json(record: &TimelineRecord) -> Result<Value> {
    Ok(json!({
        "project_id": record.project_id,
        "label": derive_label(record),
        "record": record_json(record)?,
    }))
}

pub(crate) fn reconciled_json(reconciled: Option<&Reconciled>) -> Value {
    match reconciled {
        None => json!({ "reconciled": false }),
        Some(reconciled) => json!({
            "reconciled": true,
            "created": reconciled.outcome.created,
            "drifted": reconciled.outcome.drifted,
            "label": derive_label(&reconciled.record),
        }),
    }
}

pub(crate) fn queues_json(buckets: &BTreeMap<QueueBucket, Vec<ProjectId>>) -> Value {
    let mut map = Map::new();
    for (bucket, projects) in buckets {
        map.insert(bucket.as_str().to_string(), json!(projects));
    }
    Value::Object(map)
}

pub(crate) fn sync_json(report: &SyncReport, pruned: usize) -> Value {
    json!({
        "cursor": report.cursor,
        "changes": report.changes,
        "reconciled": report.reconciled,
        "written": report.written,
        "pruned": pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_render_as_rfc3339_and_unset_dates_stay_null() {
        let mut record =
            TimelineRecord::new(ProjectId::try_new("p1").expect("project id"), 1_714_554_000_000);
        record.permit_submitted_date = Some(1_714_554_000_000);

        let value = record_json(&record).expect("json");
        assert_eq!(value["permit_submitted_date"], "2024-05-01T09:00:00Z");
        assert_eq!(value["permit_approved_date"], Value::Null);
        assert_eq!(value["created_at"], "2024-05-01T09:00:00Z");
        assert!(value.get("created_at_ms").is_none());
        assert_eq!(value["utility_status"], "not_started");
    }

    #[test]
    fn queues_are_keyed_by_bucket_wording() {
        let mut buckets = BTreeMap::new();
        buckets.insert(
            QueueBucket::NewProjectVerification,
            vec![ProjectId::try_new("p1").expect("project id")],
        );
        let value = queues_json(&buckets);
        assert_eq!(value["New Project Verification"], json!(["p1"]));
    }
}
