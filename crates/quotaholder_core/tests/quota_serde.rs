use quotaholder_core::{Quota, QuotaValue};
use serde_json::json;
use std::collections::BTreeMap;

#[test]
fn unknown_quota_serializes_to_flags_only() {
    let value = serde_json::to_value(Quota::unknown()).unwrap();
    assert_eq!(value, json!({ "flags": 0 }));
}

#[test]
fn partial_quota_keeps_only_reported_fields() {
    let quota = Quota {
        entity: Some("system/groups/g1".to_string()),
        resource: Some("g_operational_cpu".to_string()),
        capacity: Some(8),
        ..Quota::default()
    };
    let value = serde_json::to_value(&quota).unwrap();
    assert_eq!(
        value,
        json!({
            "entity": "system/groups/g1",
            "resource": "g_operational_cpu",
            "capacity": 8,
            "flags": 0,
        })
    );

    let back: Quota = serde_json::from_value(value).unwrap();
    assert_eq!(back, quota);
}

#[test]
fn sparse_map_from_json_rejects_wrong_kinds() {
    let map: BTreeMap<String, QuotaValue> =
        serde_json::from_value(json!({ "entity": "system/users/alice", "quantity": 3 })).unwrap();
    let quota = Quota::from_map(&map).unwrap();
    assert_eq!(quota.quantity, Some(3));
    assert_eq!(quota.capacity, None);
    assert!(!quota.is_unknown());

    let bad: BTreeMap<String, QuotaValue> =
        serde_json::from_value(json!({ "quantity": "three" })).unwrap();
    let err = Quota::from_map(&bad).unwrap_err();
    assert_eq!(err.field, "quantity");
}
