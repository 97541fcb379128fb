use crate::search::filter::Filter;
use crate::utils::id_gen::next_id;
use crate::views::storage::KeyValueStore;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Slot name used when the configuration does not override it
pub const DEFAULT_VIEWS_SLOT: &str = "record-explorer-views";

/// A named bundle of filters, columns and search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub search_query: String,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_favorite: bool,
}

impl SavedView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: next_id("view"),
            name: name.into(),
            description: None,
            filters: Vec::new(),
            columns: Vec::new(),
            search_query: String::new(),
            created_at: Utc::now(),
            is_default: false,
            is_favorite: false,
        }
    }
}

/// The editable part of a view, captured from the current session state
#[derive(Debug, Clone, Default)]
pub struct ViewDraft {
    pub name: String,
    pub description: Option<String>,
    pub filters: Vec<Filter>,
    pub columns: Vec<String>,
    pub search_query: String,
}

#[derive(Debug, Clone)]
pub struct ViewMatch {
    pub view: SavedView,
    pub score: i64,
    pub indices: Vec<usize>,
}

/// Dates are stored as ISO-8601 with millisecond precision
mod iso_millis {
    use crate::data::value::format_date;
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_date(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| de::Error::custom(format!("invalid date '{}': {}", raw, e)))
    }
}

/// Saved views persisted as one JSON array in a named storage slot.
///
/// The full list is written back after every mutation. Storage failures
/// are logged and never surface to the caller; unreadable data loads as an
/// empty list.
pub struct ViewStore<S: KeyValueStore> {
    storage: S,
    slot: String,
    views: Vec<SavedView>,
    matcher: SkimMatcherV2,
}

impl<S: KeyValueStore> ViewStore<S> {
    pub fn open(storage: S, slot: impl Into<String>) -> Self {
        let slot = slot.into();
        let views = load_views(&storage, &slot);
        info!(target: "views", "Loaded {} saved views from '{}'", views.len(), slot);
        Self {
            storage,
            slot,
            views,
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn list(&self) -> &[SavedView] {
        &self.views
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SavedView> {
        self.views.iter().find(|v| v.id == id)
    }

    pub fn find<P>(&self, predicate: P) -> Option<&SavedView>
    where
        P: Fn(&SavedView) -> bool,
    {
        self.views.iter().find(|v| predicate(*v))
    }

    /// Insert a new view, or update the view with the same id in place
    /// keeping its creation time. Saving a default view clears the flag on
    /// every other view.
    pub fn save(&mut self, mut view: SavedView) -> Result<&SavedView> {
        view.name = view.name.trim().to_string();
        if view.name.is_empty() {
            bail!("Please enter a view name");
        }

        let index = match self.views.iter().position(|v| v.id == view.id) {
            Some(index) => {
                view.created_at = self.views[index].created_at;
                debug!(target: "views", "Updating view '{}' ({})", view.name, view.id);
                self.views[index] = view;
                index
            }
            None => {
                debug!(target: "views", "Inserting view '{}' ({})", view.name, view.id);
                self.views.push(view);
                self.views.len() - 1
            }
        };

        if self.views[index].is_default {
            let keep = self.views[index].id.clone();
            for other in self.views.iter_mut().filter(|v| v.id != keep) {
                other.is_default = false;
            }
        }

        self.persist();
        Ok(&self.views[index])
    }

    /// Save the current session state as a new view, or over the view
    /// `editing` keeping its identity and flags
    pub fn save_draft(&mut self, draft: ViewDraft, editing: Option<&str>) -> Result<&SavedView> {
        let mut view = match editing {
            Some(id) => match self.get(id) {
                Some(existing) => existing.clone(),
                None => bail!("No saved view with id '{}'", id),
            },
            None => SavedView::new(draft.name.clone()),
        };

        view.name = draft.name;
        view.description = draft
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        view.filters = draft.filters;
        view.columns = draft.columns;
        view.search_query = draft.search_query;

        let updated = editing.is_some();
        let saved = self.save(view)?;
        info!(
            target: "views",
            "{} view '{}'",
            if updated { "Updated" } else { "Saved" },
            saved.name
        );
        Ok(saved)
    }

    pub fn delete(&mut self, id: &str) -> Result<SavedView> {
        let Some(index) = self.views.iter().position(|v| v.id == id) else {
            bail!("No saved view with id '{}'", id);
        };
        let removed = self.views.remove(index);
        info!(target: "views", "Deleted view '{}'", removed.name);
        self.persist();
        Ok(removed)
    }

    pub fn set_favorite(&mut self, id: &str, favorite: bool) -> Result<()> {
        let Some(view) = self.views.iter_mut().find(|v| v.id == id) else {
            bail!("No saved view with id '{}'", id);
        };
        if view.is_favorite != favorite {
            view.is_favorite = favorite;
            self.persist();
        }
        Ok(())
    }

    /// Flip the favorite flag, returning the new state
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        let current = match self.get(id) {
            Some(view) => view.is_favorite,
            None => bail!("No saved view with id '{}'", id),
        };
        self.set_favorite(id, !current)?;
        Ok(!current)
    }

    /// Make `id` the only default view
    pub fn set_default(&mut self, id: &str) -> Result<()> {
        if self.get(id).is_none() {
            bail!("No saved view with id '{}'", id);
        }
        for view in &mut self.views {
            view.is_default = view.id == id;
        }
        info!(target: "views", "Default view is now {}", id);
        self.persist();
        Ok(())
    }

    pub fn clear_default(&mut self) {
        if self.views.iter().any(|v| v.is_default) {
            for view in &mut self.views {
                view.is_default = false;
            }
            self.persist();
        }
    }

    pub fn default_view(&self) -> Option<&SavedView> {
        self.views.iter().find(|v| v.is_default)
    }

    pub fn favorites(&self) -> Vec<&SavedView> {
        self.views.iter().filter(|v| v.is_favorite).collect()
    }

    /// Views whose name or description contains `query`, case-insensitively
    pub fn search(&self, query: &str) -> Vec<&SavedView> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.views.iter().collect();
        }
        self.views
            .iter()
            .filter(|v| {
                v.name.to_lowercase().contains(&needle)
                    || v
                        .description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Fuzzy-ranked views, best match first
    pub fn fuzzy_search(&self, query: &str) -> Vec<ViewMatch> {
        let mut matches: Vec<ViewMatch> = self
            .views
            .iter()
            .filter_map(|view| {
                let haystack = match &view.description {
                    Some(desc) => format!("{} {}", view.name, desc),
                    None => view.name.clone(),
                };
                self.matcher
                    .fuzzy_indices(&haystack, query)
                    .map(|(score, indices)| ViewMatch {
                        view: view.clone(),
                        score,
                        indices,
                    })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.view.is_favorite.cmp(&a.view.is_favorite))
                .then_with(|| a.view.name.cmp(&b.view.name))
        });
        matches
    }

    fn persist(&mut self) {
        let content = match serde_json::to_string_pretty(&self.views) {
            Ok(content) => content,
            Err(e) => {
                error!(target: "views", "Error serializing saved views: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.set(&self.slot, &content) {
            error!(target: "views", "Error saving views to '{}': {:#}", self.slot, e);
        }
    }
}

fn load_views<S: KeyValueStore>(storage: &S, slot: &str) -> Vec<SavedView> {
    let content = match storage.get(slot) {
        Ok(Some(content)) => content,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(target: "views", "Error loading saved views: {:#}", e);
            return Vec::new();
        }
    };

    if content.trim().is_empty() {
        return Vec::new();
    }

    let entries = match serde_json::from_str::<JsonValue>(&content) {
        Ok(JsonValue::Array(entries)) => entries,
        Ok(_) => {
            warn!(target: "views", "Saved views in '{}' are not a list, ignoring them", slot);
            return Vec::new();
        }
        Err(e) => {
            warn!(target: "views", "Saved views in '{}' are corrupt: {}", slot, e);
            return Vec::new();
        }
    };

    let mut views: Vec<SavedView> = Vec::with_capacity(entries.len());
    let mut ids = HashSet::new();
    let mut seen_default = false;

    for (position, entry) in entries.into_iter().enumerate() {
        let mut view: SavedView = match serde_json::from_value(entry) {
            Ok(view) => view,
            Err(e) => {
                warn!(target: "views", "Skipping saved view #{}: {}", position, e);
                continue;
            }
        };

        if !ids.insert(view.id.clone()) {
            warn!(target: "views", "Skipping duplicate saved view id '{}'", view.id);
            continue;
        }
        if view.is_default {
            if seen_default {
                warn!(target: "views", "Clearing extra default flag on '{}'", view.name);
                view.is_default = false;
            }
            seen_default = true;
        }
        views.push(view);
    }

    views
}
