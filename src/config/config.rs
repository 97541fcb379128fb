use crate::column_manager::ViewApplyPolicy;
use crate::data::flattener::DEFAULT_MAX_DEPTH;
use crate::views::view_store::DEFAULT_VIEWS_SLOT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub behavior: BehaviorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Cell text longer than this is cut with `...`
    pub cell_truncate_length: usize,

    /// Rows shown per table page in the shell
    pub page_size: usize,

    /// Show row numbers by default in results view
    pub show_row_numbers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Container nesting the inspector expands before truncating
    pub flatten_max_depth: usize,

    /// How applying a saved view treats columns the view does not list
    pub view_apply_policy: ViewApplyPolicy,

    /// Storage slot holding the saved views
    pub views_slot: String,

    /// Directory for saved views (leave unset for the default data dir)
    pub storage_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set
    pub level: String,

    /// Also write logs to a file in the data directory
    pub log_to_file: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            cell_truncate_length: 30,
            page_size: 25,
            show_row_numbers: false,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            flatten_max_depth: DEFAULT_MAX_DEPTH,
            view_apply_policy: ViewApplyPolicy::Union,
            views_slot: DEFAULT_VIEWS_SLOT.to_string(),
            storage_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
        }
    }
}

impl Config {
    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            // Create default config if it doesn't exist
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("record-explorer").join("config.toml"))
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# Record Explorer Configuration File
# Location: ~/.config/record-explorer/config.toml (Linux)
#           %APPDATA%\record-explorer\config.toml (Windows)

[display]
# Cell text longer than this is cut with "..."
cell_truncate_length = 30

# Rows shown per page in the table view
page_size = 25

# Show row numbers by default in results view
show_row_numbers = false

[behavior]
# Nesting depth the record inspector expands before truncating
flatten_max_depth = 10

# Applying a saved view: "union" keeps the columns you added that the view
# does not list, "replace" shows exactly the view's columns
view_apply_policy = "union"

# Storage slot that holds saved views
views_slot = "record-explorer-views"

# Directory for saved views (leave commented to use the default data dir)
# storage_dir = "/path/to/views"

[logging]
# Level used when RUST_LOG is not set: "error", "warn", "info", "debug", "trace"
level = "info"

# Also write logs to record-explorer.log in the data directory
log_to_file = false
"#
        .to_string()
    }

    /// Initialize config with a setup wizard
    pub fn init_wizard() -> Result<Self> {
        println!("Record Explorer Configuration Setup");
        println!("===================================");

        let mut config = Config::default();

        print!("Keep columns you added when applying a saved view? (y/n) [y]: ");
        std::io::Write::flush(&mut std::io::stdout())?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if input.trim().eq_ignore_ascii_case("n") {
            config.behavior.view_apply_policy = ViewApplyPolicy::Replace;
        }

        print!("Show row numbers? (y/n) [n]: ");
        std::io::Write::flush(&mut std::io::stdout())?;
        input.clear();
        std::io::stdin().read_line(&mut input)?;
        config.display.show_row_numbers = input.trim().eq_ignore_ascii_case("y");

        config.save()?;

        println!("\nConfiguration saved to: {:?}", Config::get_config_path()?);
        println!("You can edit this file directly to customize further.");

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.cell_truncate_length, 30);
        assert_eq!(config.behavior.flatten_max_depth, 10);
        assert_eq!(config.behavior.view_apply_policy, ViewApplyPolicy::Union);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_commented_template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::create_default_with_comments()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.display.page_size, defaults.display.page_size);
        assert_eq!(parsed.behavior.views_slot, defaults.behavior.views_slot);
        assert!(parsed.behavior.storage_dir.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[behavior]
view_apply_policy = "replace"
"#,
        )
        .unwrap();
        assert_eq!(parsed.behavior.view_apply_policy, ViewApplyPolicy::Replace);
        assert_eq!(parsed.display.page_size, 25);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.display.show_row_numbers = true;
        config.behavior.storage_dir = Some(dir.path().join("views"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.display.show_row_numbers);
        assert_eq!(loaded.behavior.storage_dir, config.behavior.storage_dir);
    }
}
