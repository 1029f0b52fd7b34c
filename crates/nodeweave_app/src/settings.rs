// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tool settings stored as RON.
//!
//! Settings include:
//! - Schema files loaded when none are given on the command line
//! - Document type resolution (suffixes, alias table)
//! - Import and export defaults (layout, auto-arrange grid)

use nodeweave_graph::{ExportOptions, ImportOptions, RegistryOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name looked up in the working directory
pub const SETTINGS_FILE_NAME: &str = "nodeweave.ron";

/// A schema file with the name it is registered under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    /// Registry name; the file stem when unset
    #[serde(default)]
    pub name: Option<String>,
    /// Path to the schema source
    pub path: PathBuf,
}

impl SchemaEntry {
    /// The name the schema is registered under
    pub fn registry_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| schema_name(&self.path))
    }
}

/// Registry name for a schema file: its stem
pub fn schema_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("schema")
        .to_string()
}

/// Complete tool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Settings format version
    pub version: u32,
    /// Schemas loaded by default
    #[serde(default)]
    pub schemas: Vec<SchemaEntry>,
    /// Document type resolution
    #[serde(default)]
    pub registry: RegistryOptions,
    /// Import defaults
    #[serde(default)]
    pub import: ImportOptions,
    /// Export defaults
    #[serde(default)]
    pub export: ExportOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            schemas: Vec::new(),
            registry: RegistryOptions::default(),
            import: ImportOptions::default(),
            export: ExportOptions::default(),
        }
    }
}

impl Settings {
    /// Load settings from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = ron::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Settings version {} is newer than supported version {}",
                    settings.version, SETTINGS_FORMAT_VERSION
                ),
            ));
        }

        Ok(settings)
    }

    /// Load from `path`, or from the settings file in the working directory
    /// when it exists, or fall back to defaults
    pub fn discover(path: Option<&Path>) -> std::io::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(SETTINGS_FILE_NAME);
                if local.exists() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);

        let content = ron::ser::to_string_pretty(self, config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(path, content)
    }
}
