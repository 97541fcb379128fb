use record_explorer::data::flattener::{all_field_paths, Flattener, ERROR_MARKER, TRUNCATED_MARKER};
use record_explorer::data::json_codec::from_json;
use record_explorer::data::path::resolve;
use record_explorer::data::record_set::RecordSet;
use record_explorer::data::value::Value;
use serde_json::json;

fn activity_record() -> Value {
    from_json(&json!({
        "id": "evt-1",
        "user": {"name": "Jo", "email": "jo@example.com"},
        "geolocation": {
            "nearby": [
                {"name": "Cafe"},
                {"name": "Library"},
                {"name": "Station"}
            ]
        },
        "preferences": {"$map": [["theme", "dark"], [2, {"level": "high"}]]},
        "skills": {"$set": ["rust", "sql"]},
        "createdAt": {"$date": "2024-03-01T10:00:00Z"},
        "tags": []
    }))
}

#[test]
fn test_resolve_nested_paths() {
    let record = activity_record();

    assert_eq!(
        resolve(&record, "geolocation.nearby[2].name"),
        Some(&Value::from("Station"))
    );
    assert_eq!(resolve(&record, "user.email"), Some(&Value::from("jo@example.com")));
    assert_eq!(resolve(&record, "preferences[theme]"), Some(&Value::from("dark")));
    assert_eq!(resolve(&record, "preferences[2].level"), Some(&Value::from("high")));
    assert_eq!(resolve(&record, "skills[1]"), Some(&Value::from("sql")));
}

#[test]
fn test_resolve_missing_segments_is_undefined() {
    let record = activity_record();

    assert!(resolve(&record, "user.address.city").is_none());
    assert!(resolve(&record, "geolocation.nearby[9].name").is_none());
    assert!(resolve(&record, "preferences[missing]").is_none());
    assert!(resolve(&record, "id.length").is_none());
    assert!(resolve(&record, "").is_none());
}

#[test]
fn test_flatten_user_scenario() {
    let record = from_json(&json!({"user": {"name": "Jo"}}));
    let flat = Flattener::default().flatten(&record);

    let paths: Vec<&str> = flat.paths().collect();
    assert_eq!(paths, vec!["user", "user.name"]);
    assert_eq!(flat.get("user"), resolve(&record, "user"));
    assert_eq!(flat.get("user.name"), Some(&Value::from("Jo")));
}

#[test]
fn test_flatten_containers_and_members() {
    let record = activity_record();
    let flat = Flattener::default().flatten(&record);

    for path in [
        "geolocation",
        "geolocation.nearby",
        "geolocation.nearby[0]",
        "geolocation.nearby[0].name",
        "preferences",
        "preferences[theme]",
        "preferences[2]",
        "preferences[2].level",
        "skills",
        "skills[0]",
        "createdAt",
        "tags",
    ] {
        assert!(flat.contains_path(path), "missing {}", path);
    }

    // Empty container: own entry, no children
    assert!(!flat.paths().any(|p| p.starts_with("tags[")));
    assert!(!flat.is_degraded());
}

#[test]
fn test_every_flattened_path_resolves_back() {
    let record = activity_record();
    let flat = Flattener::default().flatten(&record);

    for (path, value) in flat.iter() {
        assert_eq!(resolve(&record, path), Some(value), "path {}", path);
    }
}

#[test]
fn test_primitive_flattens_under_field_name() {
    let flattener = Flattener::default();

    let value = Value::from(42);
    let flat = flattener.flatten(&value);
    assert_eq!(flat.len(), 1);
    assert_eq!(flat.get("value"), Some(&Value::from(42)));

    let flat = flattener.flatten_named(&value, "score");
    assert_eq!(flat.get("score"), Some(&Value::from(42)));
}

#[test]
fn test_depth_limit_leaves_marker() {
    let record = from_json(&json!({"a": {"b": {"c": {"d": 1}}}}));
    let flat = Flattener::new(1).flatten(&record);

    assert!(flat.contains_path("a.b"));
    assert!(flat.contains_path(&format!("a.b.{}", TRUNCATED_MARKER)));
    assert!(!flat.contains_path("a.b.c"));
}

#[test]
fn test_duplicate_keys_degrade_to_error_marker() {
    let record = Value::Record(vec![
        ("id".to_string(), Value::from("x")),
        ("id".to_string(), Value::from("y")),
    ]);
    let flat = Flattener::default().flatten(&record);

    assert!(flat.is_degraded());
    assert_eq!(flat.len(), 1);
    assert!(flat.contains_path(ERROR_MARKER));
}

#[test]
fn test_field_discovery_across_records() {
    let records = RecordSet::from_json(&json!([
        {"id": "1", "status": "active"},
        {"id": "2", "metadata": {"source": "api"}}
    ]));

    let paths = all_field_paths(records.records(), &Flattener::default());
    assert_eq!(paths, vec!["id", "metadata", "metadata.source", "status"]);
}

#[test]
fn test_non_array_source_is_no_data() {
    assert!(RecordSet::from_json(&json!(null)).is_empty());
    assert!(RecordSet::from_json(&json!({"id": "1"})).is_empty());

    let records = RecordSet::from_json(&json!([{"id": "1"}, {"id": ""}, {"name": "x"}]));
    assert_eq!(records.len(), 3);
    assert_eq!(records.invalid_count(), 2);
}
