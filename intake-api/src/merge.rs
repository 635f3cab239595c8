//! Detail reconciliation.
//!
//! Every field update is merged against the previously stored value so that
//! each logical entry keeps its identity across writes:
//!
//! - `id` is assigned once and never changes for the same entry.
//! - `created_date` is set at first persistence and never overwritten.
//! - `updated_date` is refreshed on every write, even when the value is
//!   unchanged.
//!
//! For list fields the merge is full-replacement: the output list is exactly
//! the mapped incoming list, in the caller's order. Stored entries omitted
//! from the submission are dropped. An incoming entry that declares an `id`
//! absent from the stored list is rejected outright rather than treated as
//! new; silently regenerating its identity would mask a client bug and
//! orphan anything referencing the old id.

use chrono::{DateTime, Utc};
use record_store::{Detail, DetailId, DetailKind, Value, ValueError, new_detail_id};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MergeError {
    #[error("incoming entry must be a JSON object")]
    ExpectedObject,

    #[error("incoming entry is missing the required 'value' key")]
    MissingValue,

    #[error("incoming entry 'id' must be a string")]
    InvalidId,

    #[error("expected a list of entries for this field")]
    ExpectedList,

    #[error("declared id {0} does not match any stored entry")]
    IdentityMismatch(DetailId),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// One caller-submitted entry: a `value` payload plus an optional declared
/// identity. Any other keys are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingDetail {
    pub id: Option<DetailId>,
    pub value: Value,
}

impl IncomingDetail {
    pub fn from_json(raw: &JsonValue) -> Result<Self, MergeError> {
        let object = raw.as_object().ok_or(MergeError::ExpectedObject)?;

        let id = match object.get("id") {
            None => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(_) => return Err(MergeError::InvalidId),
        };

        let value = object.get("value").ok_or(MergeError::MissingValue)?;
        Ok(IncomingDetail {
            id,
            value: Value::try_from(value.clone())?,
        })
    }
}

/// Parses the submission for a list-typed field.
pub fn parse_incoming_list(raw: &JsonValue) -> Result<Vec<IncomingDetail>, MergeError> {
    raw.as_array()
        .ok_or(MergeError::ExpectedList)?
        .iter()
        .map(IncomingDetail::from_json)
        .collect()
}

/// Decides the identity for one entry.
///
/// A stored match keeps its `id` and `created_date` unchanged. With no
/// stored match, an entry declaring no id gets a fresh identity; an entry
/// declaring an unmatched id is an identity-mismatch fault.
fn assign_identity(
    declared: Option<&str>,
    stored: Option<&Detail>,
    now: DateTime<Utc>,
) -> Result<(DetailId, DateTime<Utc>), MergeError> {
    match (stored, declared) {
        (Some(stored), _) => Ok((stored.id.clone(), stored.created_date)),
        (None, None) => Ok((new_detail_id(), now)),
        (None, Some(id)) => Err(MergeError::IdentityMismatch(id.to_string())),
    }
}

/// Merges one incoming value against the stored detail for a scalar field.
pub fn merge_scalar(
    current: Option<&Detail>,
    incoming: &IncomingDetail,
    now: DateTime<Utc>,
) -> Result<Detail, MergeError> {
    let (id, created_date) = assign_identity(incoming.id.as_deref(), current, now)?;

    Ok(Detail {
        id,
        created_date,
        updated_date: now,
        value: incoming.value.clone(),
        kind: current.map(|d| d.kind).unwrap_or(DetailKind::Plain),
    })
}

/// Reconciles an incoming ordered list against the stored list.
///
/// Matching is by declared id against the stored ids. Output order equals
/// input order; stored entries with no corresponding incoming entry are
/// dropped. All-or-nothing: the first fault aborts the whole merge.
pub fn merge_list(
    current: &[Detail],
    incoming: &[IncomingDetail],
    now: DateTime<Utc>,
) -> Result<Vec<Detail>, MergeError> {
    let by_id: HashMap<&str, &Detail> = current.iter().map(|d| (d.id.as_str(), d)).collect();

    incoming
        .iter()
        .map(|entry| {
            let stored = entry.id.as_deref().and_then(|id| by_id.get(id).copied());
            merge_scalar(stored, entry, now)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    fn at(offset_secs: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z").unwrap().to_utc()
            + TimeDelta::seconds(offset_secs)
    }

    fn incoming(value: JsonValue) -> IncomingDetail {
        IncomingDetail::from_json(&json!({ "value": value })).unwrap()
    }

    fn incoming_with_id(id: &str, value: JsonValue) -> IncomingDetail {
        IncomingDetail::from_json(&json!({ "id": id, "value": value })).unwrap()
    }

    #[test]
    fn test_fresh_scalar_gets_new_identity() {
        let t0 = at(0);
        let detail = merge_scalar(None, &incoming(json!("Shprintzah")), t0).unwrap();

        assert_eq!(detail.value, Value::from("Shprintzah"));
        assert_eq!(detail.id.len(), 32);
        assert_eq!(detail.created_date, t0);
        assert_eq!(detail.updated_date, t0);
    }

    #[test]
    fn test_scalar_update_preserves_identity() {
        let t0 = at(0);
        let t1 = at(60);

        let first = merge_scalar(None, &incoming(json!("Shprintzah")), t0).unwrap();
        let second = merge_scalar(Some(&first), &incoming(json!("Yentah")), t1).unwrap();

        assert_eq!(second.value, Value::from("Yentah"));
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_date, first.created_date);
        assert!(second.updated_date > first.updated_date);
    }

    #[test]
    fn test_scalar_touch_refreshes_updated_date() {
        // Same value resubmitted still moves updated_date
        let first = merge_scalar(None, &incoming(json!("same")), at(0)).unwrap();
        let second = merge_scalar(Some(&first), &incoming(json!("same")), at(5)).unwrap();

        assert_eq!(second.value, first.value);
        assert_eq!(second.id, first.id);
        assert_eq!(second.updated_date, at(5));
    }

    #[test]
    fn test_scalar_preserves_kind() {
        let mut first = merge_scalar(None, &incoming(json!("x")), at(0)).unwrap();
        first.kind = DetailKind::UserInfo;

        let second = merge_scalar(Some(&first), &incoming(json!("y")), at(1)).unwrap();
        assert_eq!(second.kind, DetailKind::UserInfo);
    }

    #[test]
    fn test_scalar_declared_id_without_stored_match_faults() {
        let err = merge_scalar(None, &incoming_with_id("feedbeef", json!("v")), at(0)).unwrap_err();
        assert_eq!(err, MergeError::IdentityMismatch("feedbeef".to_string()));
    }

    #[test]
    fn test_missing_value_key() {
        let err = IncomingDetail::from_json(&json!({ "id": "abc" })).unwrap_err();
        assert_eq!(err, MergeError::MissingValue);
    }

    #[test]
    fn test_non_object_entry() {
        let err = IncomingDetail::from_json(&json!("bare string")).unwrap_err();
        assert_eq!(err, MergeError::ExpectedObject);
    }

    #[test]
    fn test_null_value_rejected() {
        let err = IncomingDetail::from_json(&json!({ "value": null })).unwrap_err();
        assert_eq!(err, MergeError::Value(ValueError::Null));
    }

    #[test]
    fn test_non_string_id_rejected() {
        let err = IncomingDetail::from_json(&json!({ "id": 7, "value": "x" })).unwrap_err();
        assert_eq!(err, MergeError::InvalidId);
    }

    #[test]
    fn test_list_initial_submission() {
        let entries = vec![
            incoming(json!({ "name": "Albert Einstein", "moustache_length": "normal" })),
            incoming(json!({ "name": "Yosemite Sam", "moustache_length": "very long" })),
            incoming(json!({ "name": "Mark Twain", "moustache_length": "long" })),
        ];

        let merged = merge_list(&[], &entries, at(0)).unwrap();

        assert_eq!(merged.len(), 3);
        for detail in &merged {
            assert_eq!(detail.id.len(), 32);
            assert_eq!(detail.created_date, at(0));
        }
        // All three got distinct identities
        assert_ne!(merged[0].id, merged[1].id);
        assert_ne!(merged[1].id, merged[2].id);
    }

    #[test]
    fn test_list_resubmission_preserves_known_identities() {
        let first = merge_list(
            &[],
            &[
                incoming(json!({ "name": "Albert Einstein" })),
                incoming(json!({ "name": "Yosemite Sam" })),
                incoming(json!({ "name": "Mark Twain" })),
            ],
            at(0),
        )
        .unwrap();

        // Resubmit all three with their ids, plus a brand new fourth entry
        let resubmission: Vec<IncomingDetail> = first
            .iter()
            .map(|d| IncomingDetail {
                id: Some(d.id.clone()),
                value: d.value.clone(),
            })
            .chain([incoming(json!({ "name": "Yehuda Herzig" }))])
            .collect();

        let second = merge_list(&first, &resubmission, at(60)).unwrap();

        assert_eq!(second.len(), 4);
        for (before, after) in first.iter().zip(&second) {
            assert_eq!(after.id, before.id);
            assert_eq!(after.created_date, before.created_date);
            assert_eq!(after.updated_date, at(60));
        }
        assert_ne!(second[3].id, second[0].id);
        assert_eq!(second[3].created_date, at(60));
    }

    #[test]
    fn test_list_full_replacement_drops_omitted_entries() {
        let stored = merge_list(
            &[],
            &[
                incoming(json!("A")),
                incoming(json!("B")),
                incoming(json!("C")),
            ],
            at(0),
        )
        .unwrap();

        // Resubmit only A and C
        let partial = vec![
            IncomingDetail {
                id: Some(stored[0].id.clone()),
                value: stored[0].value.clone(),
            },
            IncomingDetail {
                id: Some(stored[2].id.clone()),
                value: stored[2].value.clone(),
            },
        ];

        let merged = merge_list(&stored, &partial, at(10)).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, stored[0].id);
        assert_eq!(merged[1].id, stored[2].id);
    }

    #[test]
    fn test_list_output_order_follows_input_order() {
        let stored = merge_list(&[], &[incoming(json!("A")), incoming(json!("B"))], at(0)).unwrap();

        // Submit in reverse order
        let reversed = vec![
            IncomingDetail {
                id: Some(stored[1].id.clone()),
                value: stored[1].value.clone(),
            },
            IncomingDetail {
                id: Some(stored[0].id.clone()),
                value: stored[0].value.clone(),
            },
        ];

        let merged = merge_list(&stored, &reversed, at(1)).unwrap();
        assert_eq!(merged[0].id, stored[1].id);
        assert_eq!(merged[1].id, stored[0].id);
    }

    #[test]
    fn test_list_unknown_declared_id_faults_whole_merge() {
        let stored = merge_list(&[], &[incoming(json!("A"))], at(0)).unwrap();

        let entries = vec![
            IncomingDetail {
                id: Some(stored[0].id.clone()),
                value: stored[0].value.clone(),
            },
            incoming_with_id("0000feed0000", json!("B")),
        ];

        let err = merge_list(&stored, &entries, at(1)).unwrap_err();
        assert_eq!(err, MergeError::IdentityMismatch("0000feed0000".to_string()));
    }

    #[test]
    fn test_parse_incoming_list_requires_array() {
        let err = parse_incoming_list(&json!({ "value": "x" })).unwrap_err();
        assert_eq!(err, MergeError::ExpectedList);
    }
}
