use record_explorer::config::Config;
use record_explorer::data::record_set::RecordSet;
use record_explorer::data::record_sort::SortSpec;
use record_explorer::data::value::Value;
use record_explorer::search::Filter;
use record_explorer::views::{FileStore, MemoryStore, ViewStore, DEFAULT_VIEWS_SLOT};
use record_explorer::{ExplorerSession, SessionOptions};
use serde_json::json;
use std::sync::Arc;

fn records() -> Arc<RecordSet> {
    Arc::new(RecordSet::from_json(&json!([
        {"id": "r1", "status": "active", "priority": "high", "score": 720,
         "user": {"name": "Jo", "email": "jo@example.com"}, "tags": ["vip"]},
        {"id": "r2", "status": "inactive", "priority": "low", "score": 80,
         "user": {"name": "Max", "email": "max@example.com"}, "tags": []},
        {"id": "r3", "status": "active", "priority": "medium", "score": 310,
         "user": {"name": "Ana", "email": "ana@example.org"}, "tags": ["beta", "vip"],
         "metadata": {"source": "import"}},
        {"id": "", "status": "active"}
    ])))
}

fn session() -> ExplorerSession<MemoryStore> {
    ExplorerSession::new(
        records(),
        ViewStore::open(MemoryStore::new(), DEFAULT_VIEWS_SLOT),
        SessionOptions::default(),
    )
}

fn visible_ids<S: record_explorer::views::KeyValueStore>(session: &mut ExplorerSession<S>) -> Vec<String> {
    session
        .visible_records()
        .iter()
        .filter_map(|r| r.record_id().map(str::to_string))
        .collect()
}

#[test]
fn test_status_summary_counts_filters() {
    let mut session = session();
    assert_eq!(session.status_summary(), "Showing 3 of 4 records, 1 invalid");

    session.add_filter(Filter::equals("status", "active")).unwrap();
    session.add_filter(Filter::contains("tags", "vip")).unwrap();
    assert_eq!(
        session.status_summary(),
        "Showing 2 of 4 records (2 filters applied), 1 invalid"
    );
}

#[test]
fn test_duplicate_filter_leaves_state_unchanged() {
    let mut session = session();
    session.add_filter(Filter::equals("priority", "high")).unwrap();
    assert!(session.add_filter(Filter::equals("priority", "high")).is_err());
    assert_eq!(session.filters().len(), 1);
    assert_eq!(visible_ids(&mut session), vec!["r1"]);
}

#[test]
fn test_remove_and_clear_filters() {
    let mut session = session();
    session.add_filter(Filter::equals("status", "active")).unwrap();
    session.add_filter(Filter::equals("priority", "medium")).unwrap();
    let id = session.filters()[0].id.clone();

    let removed = session.remove_filter(&id).unwrap();
    assert_eq!(removed.field, "status");
    assert_eq!(visible_ids(&mut session), vec!["r3"]);

    assert!(session.remove_filter_at(5).is_err());
    assert_eq!(session.clear_filters(), 1);
    assert_eq!(visible_ids(&mut session).len(), 3);
}

#[test]
fn test_quick_filter_from_selected_record() {
    let mut session = session();
    session.select("r3").unwrap();

    let tags = session.selected_record().and_then(|r| r.field("tags")).cloned().unwrap();
    let label = session.add_filter_for_value("tags", &tags).unwrap();
    assert_eq!(label, "tags contains \"beta\"");
    assert_eq!(visible_ids(&mut session), vec!["r3"]);

    let empty = Value::Seq(Vec::new());
    assert!(session.add_filter_for_value("tags", &empty).is_err());
}

#[test]
fn test_results_are_memoized_until_inputs_change() {
    let mut session = session();
    session.set_search_query("vip");
    let first = session.visible_rows();
    let second = session.visible_rows();
    assert!(Arc::ptr_eq(&first, &second));

    session.set_search_query("example.org");
    let third = session.visible_rows();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.as_slice(), &[2]);

    session.set_records(records());
    let fourth = session.visible_rows();
    assert!(!Arc::ptr_eq(&third, &fourth));
}

#[test]
fn test_selection_survives_only_within_results() {
    let mut session = session();
    session.select("r2").unwrap();
    assert_eq!(session.selected_position(), Some(1));

    session.set_search_query("status:active");
    assert_eq!(session.selected_position(), None);
    assert!(session.select_next());
    assert_eq!(session.selected_id(), Some("r1"));
}

#[test]
fn test_field_paths_include_nested_and_optional_fields() {
    let session = session();
    let paths = session.field_paths();
    assert!(paths.contains(&"user.email".to_string()));
    assert!(paths.contains(&"metadata.source".to_string()));
    assert!(paths.contains(&"tags[1]".to_string()));
}

#[test]
fn test_inspect_search_and_sections() {
    let mut session = session();
    session.select("r1").unwrap();
    let flat = session.inspect_selected().unwrap();

    let hits: Vec<&str> = flat.search("EXAMPLE").into_iter().map(|(p, _)| p).collect();
    assert_eq!(hits, vec!["user.email"]);

    let sections: Vec<String> = flat.group_by_section().into_iter().map(|(s, _)| s).collect();
    assert!(sections.contains(&"user".to_string()));
    assert!(sections.contains(&"tags".to_string()));
}

#[test]
fn test_views_saved_to_disk_restore_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.behavior.storage_dir = Some(dir.path().to_path_buf());

    let view_id = {
        let store = ViewStore::open(FileStore::new(dir.path()), config.behavior.views_slot.clone());
        let mut session = ExplorerSession::new(records(), store, SessionOptions::from(&config));
        session.set_search_query("vip");
        session.add_column("metadata.source").unwrap();
        session.reorder_columns(&["metadata.source".to_string()]);
        let id = session.save_view("VIPs", Some("tagged vip")).unwrap();
        session.set_default_view(&id).unwrap();
        id
    };

    let store = ViewStore::open(FileStore::new(dir.path()), config.behavior.views_slot.clone());
    let mut session = ExplorerSession::new(records(), store, SessionOptions::from(&config));

    assert_eq!(session.active_view().map(|v| v.id.as_str()), Some(view_id.as_str()));
    assert_eq!(session.search_query(), "vip");
    assert_eq!(
        session.columns().visible_order().first().map(String::as_str),
        Some("metadata.source")
    );
    assert_eq!(visible_ids(&mut session), vec!["r1", "r3"]);
}

#[test]
fn test_update_and_delete_view() {
    let mut session = session();
    let id = session.save_view("Draft", None).unwrap();

    session.set_search_query("beta");
    session.update_view(&id, "Beta users", None).unwrap();
    let view = session.views().get(&id).unwrap();
    assert_eq!(view.name, "Beta users");
    assert_eq!(view.search_query, "beta");

    assert!(session.toggle_favorite_view(&id).unwrap());
    session.delete_view(&id).unwrap();
    assert!(session.active_view().is_none());
    assert!(session.delete_view(&id).is_err());
}

#[test]
fn test_sorting_dynamic_column_with_mixed_kinds() {
    let rows: Vec<serde_json::Value> = (0..60)
        .map(|i| {
            if i % 3 == 0 {
                json!({"id": format!("r{}", i), "code": format!("{}", i % 11)})
            } else {
                json!({"id": format!("r{}", i), "code": i % 17})
            }
        })
        .collect();
    let records = Arc::new(RecordSet::from_json(&serde_json::Value::Array(rows)));
    let mut session = ExplorerSession::new(
        records,
        ViewStore::open(MemoryStore::new(), DEFAULT_VIEWS_SLOT),
        SessionOptions::default(),
    );
    session.add_column("code").unwrap();
    session.set_sort(Some(SortSpec::descending("code")));

    let visible = session.visible_records();
    assert_eq!(visible.len(), 60);
    assert!(matches!(visible[0].field("code"), Some(Value::String(_))));
    assert!(matches!(visible[59].field("code"), Some(Value::Number(_))));
}
