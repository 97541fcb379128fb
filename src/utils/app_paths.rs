use anyhow::{anyhow, Result};
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "record-explorer";

pub struct AppPaths;

impl AppPaths {
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Cannot determine data directory"))?
            .join(APP_DIR);

        fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    /// Directory holding the saved-view slots
    pub fn views_dir() -> Result<PathBuf> {
        let dir = Self::data_dir()?.join("views");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn log_file() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("record-explorer.log"))
    }

    /// Line-editor history of the interactive shell
    pub fn shell_history_file() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("shell_history.txt"))
    }
}
