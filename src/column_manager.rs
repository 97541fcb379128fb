use crate::data::path::title_for;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Width given to user-added columns
pub const DYNAMIC_COLUMN_WIDTH: u16 = 200;

/// The ten well-known columns: (key, title, width)
const BASE_COLUMNS: [(&str, &str, u16); 10] = [
    ("id", "ID", 120),
    ("timestamp", "Timestamp", 180),
    ("user", "User", 250),
    ("user.email", "Email", 200),
    ("status", "Status", 100),
    ("priority", "Priority", 100),
    ("score", "Score", 100),
    ("revenue", "Revenue", 120),
    ("activity.type", "Activity", 100),
    ("tags", "Tags", 200),
];

/// Keys of the base columns, in their default order
pub fn base_column_keys() -> Vec<String> {
    BASE_COLUMNS.iter().map(|(key, _, _)| key.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub key: String,
    pub title: String,
    pub data_index: String,
    pub width: u16,
    /// Pinned to the left edge
    pub fixed: bool,
}

impl Column {
    /// Column for an arbitrary path, titled by its last segment
    pub fn dynamic(path: &str) -> Self {
        Self {
            key: path.to_string(),
            title: title_for(path),
            data_index: path.to_string(),
            width: DYNAMIC_COLUMN_WIDTH,
            fixed: false,
        }
    }

    fn base(key: &str, title: &str, width: u16) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            data_index: key.to_string(),
            width,
            fixed: key == "id",
        }
    }
}

/// How a saved view's column list combines with the current columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewApplyPolicy {
    /// View columns first, then the columns currently shown that the view
    /// does not mention
    #[default]
    Union,
    /// Exactly the view's columns
    Replace,
}

/// Owns the base column catalogue, user-added columns and the visible
/// order. `visible` never holds duplicates and only holds registered keys.
#[derive(Debug, Clone)]
pub struct ColumnStateManager {
    base: Vec<Column>,
    dynamic: Vec<Column>,
    visible: Vec<String>,
    policy: ViewApplyPolicy,
}

impl Default for ColumnStateManager {
    fn default() -> Self {
        Self::new(ViewApplyPolicy::default())
    }
}

impl ColumnStateManager {
    pub fn new(policy: ViewApplyPolicy) -> Self {
        let base: Vec<Column> = BASE_COLUMNS
            .iter()
            .map(|(key, title, width)| Column::base(key, title, *width))
            .collect();
        let visible = base.iter().map(|c| c.key.clone()).collect();
        Self {
            base,
            dynamic: Vec::new(),
            visible,
            policy,
        }
    }

    pub fn policy(&self) -> ViewApplyPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ViewApplyPolicy) {
        self.policy = policy;
    }

    pub fn visible_order(&self) -> &[String] {
        &self.visible
    }

    pub fn dynamic_columns(&self) -> &[Column] {
        &self.dynamic
    }

    pub fn base_columns(&self) -> &[Column] {
        &self.base
    }

    pub fn is_base(&self, key: &str) -> bool {
        self.base.iter().any(|c| c.key == key)
    }

    pub fn is_dynamic(&self, key: &str) -> bool {
        self.dynamic.iter().any(|c| c.key == key)
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.visible.iter().any(|k| k == key)
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.base
            .iter()
            .chain(self.dynamic.iter())
            .find(|c| c.key == key)
    }

    /// Show or hide `path`. Returns `Ok(false)` when the column already has
    /// the requested visibility. Hiding a user-added column deregisters it.
    pub fn toggle(&mut self, path: &str, visible: bool) -> Result<bool> {
        let path = path.trim();
        if path.is_empty() {
            bail!("Column path must not be empty");
        }

        if visible {
            if !self.is_base(path) && !self.is_dynamic(path) {
                self.dynamic.push(Column::dynamic(path));
                debug!(target: "columns", "Registered dynamic column '{}'", path);
            }
            if self.is_visible(path) {
                return Ok(false);
            }
            self.visible.push(path.to_string());
            info!(target: "columns", "Showing column '{}'", path);
            return Ok(true);
        }

        let was_visible = self.is_visible(path);
        if was_visible && self.visible.len() == 1 {
            bail!("Cannot hide '{}', at least one column must stay visible", path);
        }

        self.visible.retain(|k| k != path);
        let was_dynamic = self.is_dynamic(path);
        if was_dynamic {
            self.dynamic.retain(|c| c.key != path);
            debug!(target: "columns", "Removed dynamic column '{}'", path);
        }

        if was_visible {
            info!(target: "columns", "Hiding column '{}'", path);
        }
        Ok(was_visible || was_dynamic)
    }

    /// Show a column, rejecting one that is already shown
    pub fn add_column(&mut self, path: &str) -> Result<()> {
        if self.is_visible(path.trim()) {
            bail!("Column '{}' is already shown", path.trim());
        }
        self.toggle(path, true).map(|_| ())
    }

    /// Hide a column, rejecting one that is not shown
    pub fn remove_column(&mut self, path: &str) -> Result<()> {
        if !self.is_visible(path.trim()) {
            bail!("Column '{}' is not shown", path.trim());
        }
        self.toggle(path, false).map(|_| ())
    }

    /// Permute the visible columns. Keys that are not visible are ignored
    /// and visible keys missing from `new_order` keep their relative order
    /// at the end. An order naming no visible column is ignored.
    pub fn reorder(&mut self, new_order: &[String]) -> bool {
        let mut seen = HashSet::new();
        let mut ordered: Vec<String> = new_order
            .iter()
            .filter(|k| self.is_visible(k) && seen.insert(k.as_str()))
            .cloned()
            .collect();

        if ordered.is_empty() {
            debug!(target: "columns", "Ignoring reorder with no visible columns");
            return false;
        }

        for key in &self.visible {
            if !seen.contains(key.as_str()) {
                ordered.push(key.clone());
            }
        }

        if ordered == self.visible {
            return false;
        }
        self.visible = ordered;
        info!(target: "columns", "Reordered columns: {}", self.visible.join(", "));
        true
    }

    /// Back to the base columns in their default order
    pub fn reset(&mut self) {
        self.visible = self.base.iter().map(|c| c.key.clone()).collect();
        self.dynamic.clear();
        info!(target: "columns", "Columns reset to defaults");
    }

    /// Adopt a saved column list according to the configured policy
    pub fn apply_columns(&mut self, columns: &[String]) {
        let mut seen = HashSet::new();
        let requested: Vec<String> = columns
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty() && seen.insert(k.to_string()))
            .map(str::to_string)
            .collect();

        let mut visible = requested.clone();
        if self.policy == ViewApplyPolicy::Union {
            for key in &self.visible {
                if !seen.contains(key) {
                    visible.push(key.clone());
                }
            }
        }
        if visible.is_empty() {
            visible = self.base.iter().map(|c| c.key.clone()).collect();
        }

        // Keep existing dynamic definitions so their widths survive
        let previous = std::mem::take(&mut self.dynamic);
        for key in &visible {
            if self.is_base(key) || self.is_dynamic(key) {
                continue;
            }
            let column = previous
                .iter()
                .find(|c| &c.key == key)
                .cloned()
                .unwrap_or_else(|| Column::dynamic(key));
            self.dynamic.push(column);
        }

        self.visible = visible;
        info!(
            target: "columns",
            "Applied {} view columns ({:?}), {} visible",
            requested.len(),
            self.policy,
            self.visible.len()
        );
    }

    /// Move a visible column one place left, wrapping to the end
    pub fn move_column_left(&mut self, key: &str) -> bool {
        let Some(idx) = self.visible.iter().position(|k| k == key) else {
            return false;
        };

        if idx == 0 {
            let col = self.visible.remove(0);
            self.visible.push(col);
        } else {
            self.visible.swap(idx - 1, idx);
        }
        true
    }

    /// Move a visible column one place right, wrapping to the start
    pub fn move_column_right(&mut self, key: &str) -> bool {
        let Some(idx) = self.visible.iter().position(|k| k == key) else {
            return false;
        };

        if idx == self.visible.len() - 1 {
            let col = self.visible.remove(idx);
            self.visible.insert(0, col);
        } else {
            self.visible.swap(idx, idx + 1);
        }
        true
    }

    /// Visible columns, left to right
    pub fn columns_for_display(&self) -> Vec<Column> {
        self.visible
            .iter()
            .filter_map(|key| self.column(key).cloned())
            .collect()
    }

    /// Every known column with its visibility: visible ones in display
    /// order, then the hidden ones
    pub fn all_columns(&self) -> Vec<(Column, bool)> {
        let mut all: Vec<(Column, bool)> = self
            .columns_for_display()
            .into_iter()
            .map(|c| (c, true))
            .collect();

        for column in self.base.iter().chain(self.dynamic.iter()) {
            if !self.is_visible(&column.key) {
                all.push((column.clone(), false));
            }
        }
        all
    }

    /// `visible` has no duplicates and only registered keys
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        self.visible
            .iter()
            .all(|k| seen.insert(k.as_str()) && (self.is_base(k) || self.is_dynamic(k)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(manager: &ColumnStateManager) -> Vec<&str> {
        manager.visible_order().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_hiding_base_column_survives_reset() {
        let mut manager = ColumnStateManager::default();
        assert!(manager.toggle("tags", false).unwrap());
        assert!(!manager.is_visible("tags"));
        assert!(manager.is_base("tags"));

        manager.reset();
        assert!(manager.is_visible("tags"));
        assert_eq!(manager.visible_order().len(), 10);
    }

    #[test]
    fn test_dynamic_column_lifecycle() {
        let mut manager = ColumnStateManager::default();
        assert!(manager.toggle("geolocation.timezone.name", true).unwrap());
        let column = manager.column("geolocation.timezone.name").unwrap();
        assert_eq!(column.title, "name");
        assert_eq!(column.width, DYNAMIC_COLUMN_WIDTH);

        // Already visible is a no-op
        assert!(!manager.toggle("geolocation.timezone.name", true).unwrap());

        assert!(manager.toggle("geolocation.timezone.name", false).unwrap());
        assert!(manager.column("geolocation.timezone.name").is_none());
        assert!(!manager.toggle("geolocation.timezone.name", false).unwrap());
    }

    #[test]
    fn test_add_and_remove_advisories() {
        let mut manager = ColumnStateManager::default();
        assert!(manager.add_column("status").is_err());
        assert!(manager.remove_column("missing").is_err());
        assert!(manager.toggle("  ", true).is_err());
    }

    #[test]
    fn test_last_column_cannot_be_hidden() {
        let mut manager = ColumnStateManager::default();
        for key in base_column_keys().iter().skip(1) {
            manager.toggle(key, false).unwrap();
        }
        assert_eq!(keys(&manager), vec!["id"]);
        assert!(manager.toggle("id", false).is_err());
        assert_eq!(keys(&manager), vec!["id"]);
    }

    #[test]
    fn test_reorder_only_permutes() {
        let mut manager = ColumnStateManager::default();
        manager.toggle("user", false).unwrap();

        let order = vec![
            "status".to_string(),
            "user".to_string(),
            "bogus".to_string(),
            "id".to_string(),
            "status".to_string(),
        ];
        assert!(manager.reorder(&order));
        assert_eq!(&keys(&manager)[..3], &["status", "id", "timestamp"]);
        assert!(!manager.is_visible("user"));
        assert_eq!(manager.visible_order().len(), 9);

        assert!(!manager.reorder(&["bogus".to_string()]));
        assert!(!manager.reorder(&[]));
        assert!(manager.is_consistent());
    }

    #[test]
    fn test_move_with_wraparound() {
        let mut manager = ColumnStateManager::default();
        assert!(manager.move_column_left("id"));
        assert_eq!(manager.visible_order().last().map(String::as_str), Some("id"));
        assert!(manager.move_column_right("id"));
        assert_eq!(manager.visible_order()[0], "id");
        assert!(!manager.move_column_left("nope"));
    }

    #[test]
    fn test_apply_columns_union_and_replace() {
        let mut manager = ColumnStateManager::default();
        manager.toggle("metadata.source", true).unwrap();

        manager.apply_columns(&["status".to_string(), "categories.primary".to_string()]);
        let visible = keys(&manager);
        assert_eq!(&visible[..2], &["status", "categories.primary"]);
        assert!(visible.contains(&"metadata.source"));
        assert!(manager.is_dynamic("categories.primary"));
        assert!(manager.is_consistent());

        manager.set_policy(ViewApplyPolicy::Replace);
        manager.apply_columns(&["id".to_string(), "categories.primary".to_string()]);
        assert_eq!(keys(&manager), vec!["id", "categories.primary"]);
        assert!(!manager.is_dynamic("metadata.source"));

        manager.apply_columns(&[]);
        assert_eq!(manager.visible_order().to_vec(), base_column_keys());
        assert!(manager.dynamic_columns().is_empty());
    }

    #[test]
    fn test_all_columns_lists_hidden_base() {
        let mut manager = ColumnStateManager::default();
        manager.toggle("revenue", false).unwrap();
        let all = manager.all_columns();
        assert_eq!(all.len(), 10);
        assert_eq!(all.last().map(|(c, v)| (c.key.as_str(), *v)), Some(("revenue", false)));
    }
}
