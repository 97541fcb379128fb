use crate::column_manager::{Column, ColumnStateManager, ViewApplyPolicy};
use crate::config::Config;
use crate::data::flattener::{all_field_paths, FlatRecord, Flattener, DEFAULT_MAX_DEPTH};
use crate::data::path::resolve;
use crate::data::record_set::RecordSet;
use crate::data::record_sort::{sort_indices, SortSpec};
use crate::data::value::Value;
use crate::search::filter::{Filter, FilterList};
use crate::search::filter_engine::FilterCache;
use crate::search::query_parser::{QueryParser, SearchTerm};
use crate::views::storage::KeyValueStore;
use crate::views::view_store::{SavedView, ViewDraft, ViewStore};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Knobs a session takes from the configuration
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub flatten_max_depth: usize,
    pub view_apply_policy: ViewApplyPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            flatten_max_depth: DEFAULT_MAX_DEPTH,
            view_apply_policy: ViewApplyPolicy::Union,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            flatten_max_depth: config.behavior.flatten_max_depth,
            view_apply_policy: config.behavior.view_apply_policy,
        }
    }
}

#[derive(Debug, Clone)]
struct SortedRows {
    sort: SortSpec,
    source: Arc<Vec<usize>>,
    rows: Arc<Vec<usize>>,
}

/// Single owner of the explorer state: records, filters, search query,
/// columns, saved views and the selected record. Every mutation the
/// presentation layer can make goes through here.
pub struct ExplorerSession<S: KeyValueStore> {
    records: Arc<RecordSet>,
    filters: FilterList,
    search_query: String,
    columns: ColumnStateManager,
    views: ViewStore<S>,
    cache: FilterCache,
    sorted: Option<SortedRows>,
    flattener: Flattener,
    selected_id: Option<String>,
    sort: Option<SortSpec>,
    active_view: Option<String>,
}

impl<S: KeyValueStore> ExplorerSession<S> {
    /// Start a session; the default saved view, if any, is applied
    pub fn new(records: Arc<RecordSet>, views: ViewStore<S>, options: SessionOptions) -> Self {
        let mut session = Self {
            records,
            filters: FilterList::new(),
            search_query: String::new(),
            columns: ColumnStateManager::new(options.view_apply_policy),
            views,
            cache: FilterCache::new(),
            sorted: None,
            flattener: Flattener::new(options.flatten_max_depth),
            selected_id: None,
            sort: None,
            active_view: None,
        };

        if let Some(default_id) = session.views.default_view().map(|v| v.id.clone()) {
            if let Err(e) = session.apply_view(&default_id) {
                debug!(target: "session", "Default view not applied: {}", e);
            }
        }

        session
    }

    // Records

    pub fn records(&self) -> &Arc<RecordSet> {
        &self.records
    }

    /// Swap in a new record set from the data source
    pub fn set_records(&mut self, records: Arc<RecordSet>) {
        info!(target: "session", "Record set replaced ({} records)", records.len());
        self.records = records;
        if let Some(id) = &self.selected_id {
            if self.records.position_of(id).is_none() {
                self.selected_id = None;
            }
        }
    }

    /// Sorted union of every flattened path in the record set
    pub fn field_paths(&self) -> Vec<String> {
        all_field_paths(self.records.records(), &self.flattener)
    }

    // Filters and search

    pub fn filters(&self) -> &[Filter] {
        self.filters.as_slice()
    }

    pub fn add_filter(&mut self, filter: Filter) -> Result<()> {
        self.filters.add(filter).map(|_| ())
    }

    /// Filter on a value picked in the inspector
    pub fn add_filter_for_value(&mut self, field: &str, value: &Value) -> Result<String> {
        let filter = Filter::from_picked_value(field, value)?;
        let label = filter.label();
        self.add_filter(filter)?;
        Ok(label)
    }

    pub fn remove_filter(&mut self, id: &str) -> Result<Filter> {
        self.filters.remove(id)
    }

    pub fn remove_filter_at(&mut self, index: usize) -> Result<Filter> {
        self.filters.remove_at(index)
    }

    pub fn clear_filters(&mut self) -> usize {
        self.filters.clear()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        debug!(target: "session", "Search query set to '{}'", self.search_query);
    }

    pub fn search_terms(&self) -> Vec<SearchTerm> {
        QueryParser::parse(&self.search_query)
    }

    // Sorting

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
    }

    // Visible rows

    /// Positions (into the record set) of the rows to show, filtered and
    /// sorted. Recomputed only when an input changed.
    pub fn visible_rows(&mut self) -> Arc<Vec<usize>> {
        let filtered = self.cache.get_or_compute(
            &self.records,
            self.filters.as_slice(),
            &self.search_query,
        );

        let Some(sort) = &self.sort else {
            return filtered;
        };

        if let Some(sorted) = &self.sorted {
            if &sorted.sort == sort && Arc::ptr_eq(&sorted.source, &filtered) {
                return Arc::clone(&sorted.rows);
            }
        }

        let mut rows = filtered.as_ref().clone();
        sort_indices(self.records.records(), &mut rows, sort);
        let rows = Arc::new(rows);
        self.sorted = Some(SortedRows {
            sort: sort.clone(),
            source: filtered,
            rows: Arc::clone(&rows),
        });
        rows
    }

    pub fn visible_records(&mut self) -> Vec<&Value> {
        let rows = self.visible_rows();
        rows.iter()
            .filter_map(|&idx| self.records.get(idx))
            .collect()
    }

    pub fn visible_count(&mut self) -> usize {
        self.visible_rows().len()
    }

    /// e.g. "Showing 12 of 500 records (2 filters applied)"
    pub fn status_summary(&mut self) -> String {
        let shown = self.visible_count();
        let total = self.records.len();
        let mut summary = format!("Showing {} of {} records", shown, total);

        let filters = self.filters.len();
        if filters > 0 {
            summary.push_str(&format!(
                " ({} filter{} applied)",
                filters,
                if filters == 1 { "" } else { "s" }
            ));
        }
        if self.records.invalid_count() > 0 {
            summary.push_str(&format!(", {} invalid", self.records.invalid_count()));
        }
        summary
    }

    // Columns

    pub fn columns(&self) -> &ColumnStateManager {
        &self.columns
    }

    pub fn visible_columns(&self) -> Vec<Column> {
        self.columns.columns_for_display()
    }

    pub fn toggle_column(&mut self, path: &str, visible: bool) -> Result<bool> {
        self.columns.toggle(path, visible)
    }

    pub fn add_column(&mut self, path: &str) -> Result<()> {
        self.columns.add_column(path)
    }

    pub fn remove_column(&mut self, path: &str) -> Result<()> {
        self.columns.remove_column(path)
    }

    pub fn reorder_columns(&mut self, order: &[String]) -> bool {
        self.columns.reorder(order)
    }

    pub fn move_column_left(&mut self, key: &str) -> bool {
        self.columns.move_column_left(key)
    }

    pub fn move_column_right(&mut self, key: &str) -> bool {
        self.columns.move_column_right(key)
    }

    pub fn reset_columns(&mut self) {
        self.columns.reset();
    }

    // Selection and inspection

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    /// Select a record that is currently visible
    pub fn select(&mut self, id: &str) -> Result<()> {
        let rows = self.visible_rows();
        let visible = rows
            .iter()
            .any(|&idx| self.records.get(idx).and_then(Value::record_id) == Some(id));
        if !visible {
            bail!("Record '{}' is not in the current results", id);
        }
        self.selected_id = Some(id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected_id = None;
    }

    /// Position of the selection within the visible rows
    pub fn selected_position(&mut self) -> Option<usize> {
        let id = self.selected_id.clone()?;
        let rows = self.visible_rows();
        rows.iter()
            .position(|&idx| self.records.get(idx).and_then(Value::record_id) == Some(id.as_str()))
    }

    fn select_position(&mut self, position: usize) -> bool {
        let rows = self.visible_rows();
        let id = rows
            .get(position)
            .and_then(|&idx| self.records.get(idx))
            .and_then(Value::record_id)
            .map(str::to_string);
        match id {
            Some(id) => {
                self.selected_id = Some(id);
                true
            }
            None => false,
        }
    }

    /// Move to the next visible record; starts at the first when nothing
    /// is selected
    pub fn select_next(&mut self) -> bool {
        match self.selected_position() {
            Some(pos) => self.select_position(pos + 1),
            None => self.select_position(0),
        }
    }

    pub fn select_previous(&mut self) -> bool {
        match self.selected_position() {
            Some(0) => false,
            Some(pos) => self.select_position(pos - 1),
            None => self.select_position(0),
        }
    }

    pub fn selected_record(&self) -> Option<&Value> {
        self.selected_id
            .as_deref()
            .and_then(|id| self.records.find_by_id(id))
    }

    /// Flattened view of the selected record
    pub fn inspect_selected(&self) -> Option<FlatRecord<'_>> {
        self.selected_record().map(|r| self.flattener.flatten(r))
    }

    /// Flattened view of one field of the selected record
    pub fn inspect_value(&self, field: &str) -> Option<FlatRecord<'_>> {
        let record = self.selected_record()?;
        let value = resolve(record, field)?;
        Some(self.flattener.flatten_named(value, field))
    }

    // Views

    pub fn views(&self) -> &ViewStore<S> {
        &self.views
    }

    pub fn active_view(&self) -> Option<&SavedView> {
        self.active_view.as_deref().and_then(|id| self.views.get(id))
    }

    fn current_draft(&self, name: &str, description: Option<&str>) -> ViewDraft {
        ViewDraft {
            name: name.to_string(),
            description: description.map(str::to_string),
            filters: self.filters.as_slice().to_vec(),
            columns: self.columns.visible_order().to_vec(),
            search_query: self.search_query.clone(),
        }
    }

    /// Save the current filters, columns and query as a new view
    pub fn save_view(&mut self, name: &str, description: Option<&str>) -> Result<String> {
        let draft = self.current_draft(name, description);
        let id = self.views.save_draft(draft, None)?.id.clone();
        self.active_view = Some(id.clone());
        Ok(id)
    }

    /// Overwrite an existing view with the current state
    pub fn update_view(&mut self, id: &str, name: &str, description: Option<&str>) -> Result<()> {
        let draft = self.current_draft(name, description);
        self.views.save_draft(draft, Some(id))?;
        Ok(())
    }

    /// Adopt a saved view's filters, search query and columns
    pub fn apply_view(&mut self, id: &str) -> Result<()> {
        let Some(view) = self.views.get(id).cloned() else {
            bail!("No saved view with id '{}'", id);
        };

        self.filters.replace_all(view.filters);
        self.search_query = view.search_query;
        self.columns.apply_columns(&view.columns);
        self.active_view = Some(view.id);
        info!(target: "session", "Applied view '{}'", view.name);
        Ok(())
    }

    pub fn delete_view(&mut self, id: &str) -> Result<()> {
        self.views.delete(id)?;
        if self.active_view.as_deref() == Some(id) {
            self.active_view = None;
        }
        Ok(())
    }

    pub fn set_default_view(&mut self, id: &str) -> Result<()> {
        self.views.set_default(id)
    }

    pub fn toggle_favorite_view(&mut self, id: &str) -> Result<bool> {
        self.views.toggle_favorite(id)
    }

    /// Drop every filter, the search query and any column customisation
    pub fn clear_all(&mut self) {
        self.filters.clear();
        self.search_query.clear();
        self.columns.reset();
        self.active_view = None;
        info!(target: "session", "All filters and columns cleared");
    }

    /// True when filters, a query or column changes are in effect
    pub fn has_active_state(&self) -> bool {
        !self.filters.is_empty()
            || !self.search_query.trim().is_empty()
            || self
                .columns
                .visible_order()
                .iter()
                .map(String::as_str)
                .ne(self.columns.base_columns().iter().map(|c| c.key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::storage::MemoryStore;
    use crate::views::view_store::DEFAULT_VIEWS_SLOT;
    use serde_json::json;

    fn session() -> ExplorerSession<MemoryStore> {
        let records = RecordSet::from_json(&json!([
            {"id": "a", "status": "active", "score": 600, "priority": "low"},
            {"id": "b", "status": "active", "score": 100, "priority": "critical"},
            {"id": "c", "status": "pending", "score": 300, "priority": "high"},
            {"status": "active"}
        ]));
        let views = ViewStore::open(MemoryStore::new(), DEFAULT_VIEWS_SLOT);
        ExplorerSession::new(Arc::new(records), views, SessionOptions::default())
    }

    fn visible_ids(session: &mut ExplorerSession<MemoryStore>) -> Vec<String> {
        session
            .visible_records()
            .iter()
            .filter_map(|r| r.record_id().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_query_and_filters_compose() {
        let mut session = session();
        session.set_search_query("status:active score>500");
        assert_eq!(visible_ids(&mut session), vec!["a"]);

        session.set_search_query("");
        session.add_filter(Filter::equals("status", "active")).unwrap();
        assert_eq!(visible_ids(&mut session), vec!["a", "b"]);
        assert_eq!(
            session.status_summary(),
            "Showing 2 of 4 records (1 filter applied), 1 invalid"
        );
    }

    #[test]
    fn test_sorting_is_memoized_per_spec() {
        let mut session = session();
        session.set_sort(Some(SortSpec::descending("priority")));
        assert_eq!(visible_ids(&mut session), vec!["b", "c", "a"]);

        let first = session.visible_rows();
        let second = session.visible_rows();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_navigation_stays_in_results() {
        let mut session = session();
        assert!(session.select_next());
        assert_eq!(session.selected_id(), Some("a"));
        assert!(!session.select_previous());
        assert!(session.select_next());
        assert!(session.select_next());
        assert!(!session.select_next());
        assert_eq!(session.selected_id(), Some("c"));

        session.set_search_query("pending");
        assert!(session.select("a").is_err());
        assert_eq!(session.selected_position(), Some(0));
    }

    #[test]
    fn test_inspect_selected_record() {
        let mut session = session();
        session.select("b").unwrap();
        let flat = session.inspect_selected().unwrap();
        assert_eq!(flat.get("priority"), Some(&Value::from("critical")));

        let single = session.inspect_value("score").unwrap();
        assert_eq!(single.get("score"), Some(&Value::from(100)));
        assert!(session.inspect_value("missing").is_none());
    }

    #[test]
    fn test_views_round_trip_through_session() {
        let mut session = session();
        session.add_filter(Filter::equals("priority", "high")).unwrap();
        session.add_column("metadata.source").unwrap();
        session.set_search_query("pending");
        let id = session.save_view("High priority", None).unwrap();
        assert!(session.has_active_state());

        session.clear_all();
        assert!(!session.has_active_state());

        session.apply_view(&id).unwrap();
        assert_eq!(session.filters().len(), 1);
        assert_eq!(session.search_query(), "pending");
        assert!(session.columns().is_visible("metadata.source"));
        assert_eq!(session.active_view().map(|v| v.name.as_str()), Some("High priority"));

        assert!(session.apply_view("missing").is_err());
    }

    #[test]
    fn test_default_view_applied_on_start() {
        let mut views = ViewStore::open(MemoryStore::new(), DEFAULT_VIEWS_SLOT);
        let mut view = SavedView::new("Pending only");
        view.search_query = "status:pending".to_string();
        view.is_default = true;
        views.save(view).unwrap();

        let records = RecordSet::from_json(&json!([
            {"id": "a", "status": "active"},
            {"id": "c", "status": "pending"}
        ]));
        let mut session =
            ExplorerSession::new(Arc::new(records), views, SessionOptions::default());
        assert_eq!(session.search_query(), "status:pending");
        assert_eq!(visible_ids(&mut session), vec!["c"]);
    }
}
