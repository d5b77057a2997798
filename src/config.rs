//! Settings file.
//!
//! An optional JSON file with run-wide defaults:
//!
//! ```json
//! {"export_dir": "data/exports", "default_formats": ["json", "csv"], "hl": "en-US", "timeframe": "today 12-m"}
//! ```
//!
//! Any option key accepted in a batch file can appear at the top level.

use crate::errors::Result;
use crate::export::{self, DEFAULT_FORMATS, Format};
use crate::options::{OptionSet, OptionsPatch};
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS: &str = "config/settings.json";
pub const DEFAULT_EXPORT_DIR: &str = "data/exports";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default)]
    pub default_formats: Vec<String>,
    #[serde(flatten)]
    pub options: OptionsPatch,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(DEFAULT_EXPORT_DIR)
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            export_dir: default_export_dir(),
            default_formats: vec![],
            options: OptionsPatch::default(),
        }
    }
}

impl Settings {
    /// Read a settings file; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("no settings file at {}", path.display());
            return Ok(Settings::default());
        }
        info!("read: {}", path.display());
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Built-in defaults with this file's options applied.
    pub fn base_options(&self) -> OptionSet {
        self.options.apply(&OptionSet::default())
    }

    /// Formats to write when none are given on the command line.
    pub fn formats(&self) -> Result<Vec<Format>> {
        if self.default_formats.is_empty() {
            return Ok(DEFAULT_FORMATS.to_vec());
        }
        export::parse_formats(&self.default_formats.join(","))
    }
}
