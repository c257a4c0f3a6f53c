use serde::{Deserialize, Serialize};

/// Configuration from notebook.toml (all sections optional)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Extension of day files, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Whether a refresh removes notes marked deleted (otherwise they wait
    /// for an explicit purge)
    #[serde(default = "default_true")]
    pub purge_on_refresh: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            extension: default_extension(),
            purge_on_refresh: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Width in terminal cells of the one-line previews printed by `list`
    #[serde(default = "default_preview_width")]
    pub preview_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            preview_width: default_preview_width(),
        }
    }
}

fn default_extension() -> String {
    "md".to_string()
}

fn default_true() -> bool {
    true
}

fn default_preview_width() -> usize {
    60
}
