//! Configuration loading and management.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use li_core::PatternConfig;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing the log files to merge.
    pub logs_dir: PathBuf,

    /// Compute whole-hour offsets for files without a manual offset.
    pub auto_align: bool,

    /// Tag preferred as the alignment reference.
    pub reference_tag: String,

    /// Year assumed for timestamps that omit it. Defaults to the current year.
    pub reference_year: Option<i32>,

    /// Only read files with this extension. Empty reads every file.
    pub extension: String,

    /// Also recognize JSON `"timestamp"` fields.
    pub json_timestamps: bool,

    /// Lines an anchor searches for an uptime to pair with.
    pub anchor_window: usize,

    /// Lines within which a forward/backward anchor is preferred.
    pub preference_window: usize,

    /// Manual offsets in hours, by tag.
    pub offsets: BTreeMap<String, f64>,

    /// Labels written into metric exports.
    pub export: ExportConfig,

    /// Metric extraction patterns.
    pub patterns: Vec<PatternConfig>,
}

/// Labels carried into exported metric files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub title: String,
    pub xaxis_label: String,
    pub yaxis_label: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: "PTP Log Analysis".to_string(),
            xaxis_label: "Time".to_string(),
            yaxis_label: "Value".to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("logs_dir", &self.logs_dir)
            .field("auto_align", &self.auto_align)
            .field("reference_tag", &self.reference_tag)
            .field("reference_year", &self.reference_year)
            .field("extension", &self.extension)
            .field("offsets", &self.offsets)
            .field("patterns", &self.patterns.len())
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            auto_align: true,
            reference_tag: li_core::align::DEFAULT_REFERENCE_TAG.to_string(),
            reference_year: None,
            extension: li_core::interleaver::DEFAULT_EXTENSION.to_string(),
            json_timestamps: false,
            anchor_window: 5,
            preference_window: 10,
            offsets: BTreeMap::new(),
            export: ExportConfig::default(),
            patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (LI_*)
        figment = figment.merge(Env::prefixed("LI_"));

        figment.extract()
    }

    /// The extension filter, `None` meaning every file.
    pub fn extension_filter(&self) -> Option<String> {
        Some(self.extension.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(str::to_string)
    }
}

/// Returns the platform-specific config directory for li.
///
/// On Linux: `~/.config/li`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("li"))
}
