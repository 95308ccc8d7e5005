use serde::Deserialize;
use std::path::PathBuf;

use crate::osm::tags::TagSpec;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_USER_AGENT: &str = "osm-features/0.1.0";

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_nominatim_url() -> String {
    DEFAULT_NOMINATIM_URL.to_string()
}

fn default_overpass_url() -> String {
    DEFAULT_OVERPASS_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Settings of the OSM feature provider. Given to a `Fetcher` when it is constructed.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Reuse and store raw API responses in `cache_dir`.
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Log provider diagnostics at info level. When off they are only logged at debug level.
    #[serde(default = "default_true")]
    pub log_console: bool,
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,
    #[serde(default = "default_overpass_url")]
    pub overpass_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_dir: default_cache_dir(),
            log_console: true,
            nominatim_url: default_nominatim_url(),
            overpass_url: default_overpass_url(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PlotConfig {
    /// Image file the map is rendered to.
    pub output: PathBuf,
    /// Color features by an attribute and draw a legend.
    #[serde(default)]
    pub by_attribute: bool,
    #[serde(default)]
    pub title: Option<String>,
}

/// Config file of the command line tool, in YAML.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub place: String,
    pub tags: TagSpec,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub plot: Option<PlotConfig>,
    #[serde(default)]
    pub save: Option<PathBuf>,
    #[serde(default)]
    pub provider: ProviderConfig,
}
