//! Field-level diffing and summary generation for the audit trail.
//!
//! [`Database::append_history`](crate::db::Database::append_history) feeds
//! entity snapshots through [`diff_snapshots`] and labels the result with
//! [`summarize`]. The diff is deliberately shallow: nested objects compare as
//! whole values.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{EntityRef, FieldChange, HistoryAction};

/// Shallow field-by-field comparison of two entity snapshots.
///
/// Only keys present in both objects are compared, and only keys whose values
/// differ appear in the result. Non-object snapshots produce an empty diff.
pub fn diff_snapshots(before: &Value, after: &Value) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return changes;
    };

    for (key, old) in before {
        if let Some(new) = after.get(key) {
            if old != new {
                changes.insert(
                    key.clone(),
                    FieldChange {
                        from: old.clone(),
                        to: new.clone(),
                    },
                );
            }
        }
    }

    changes
}

/// One-line human-readable description of a history entry, keyed by action.
pub fn summarize(
    action: HistoryAction,
    entity: &EntityRef,
    actor: &str,
    changes: &BTreeMap<String, FieldChange>,
) -> String {
    match action {
        HistoryAction::Created => format!("{actor} created {entity}"),
        HistoryAction::Updated => {
            if changes.is_empty() {
                format!("{actor} updated {entity}")
            } else {
                let fields: Vec<&str> = changes.keys().map(String::as_str).collect();
                format!("{actor} updated {entity} ({})", fields.join(", "))
            }
        }
        HistoryAction::Deleted => format!("{actor} deleted {entity}"),
        HistoryAction::StatusChanged => match changes.get("status") {
            Some(change) => format!(
                "{actor} changed status of {entity} from {} to {}",
                render(&change.from),
                render(&change.to)
            ),
            None => format!("{actor} changed status of {entity}"),
        },
        HistoryAction::Verified => format!("{actor} verified {entity}"),
        HistoryAction::Assigned => format!("{actor} assigned {entity}"),
        HistoryAction::Commented => format!("{actor} commented on {entity}"),
    }
}

/// JSON strings render bare, everything else as compact JSON.
fn render(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}
