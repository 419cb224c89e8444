//! Configuration loading and data folder resolution
//!
//! One TOML file configures the whole system: data folder, database file,
//! fetch politeness, fuzzy-match thresholds, lexicon extensions, and the
//! station table (grammar descriptor, field map, authority rank per
//! station). Services receive the typed [`AircheckConfig`] and never re-read
//! the file.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file path
pub const CONFIG_ENV_VAR: &str = "AIRCHECK_CONFIG";

/// Environment variable overriding the data folder
pub const DATA_ENV_VAR: &str = "AIRCHECK_DATA";

/// Top-level configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AircheckConfig {
    /// Data folder holding the database and fetched playlist files;
    /// `None` falls back to the platform default
    pub data_folder: Option<PathBuf>,
    /// Database filename within the data folder
    pub database_file: Option<String>,
    pub fetch: FetchConfig,
    pub matcher: MatcherConfig,
    pub lexicon: LexiconConfig,
    #[serde(rename = "station")]
    pub stations: Vec<StationConfig>,
}

/// Playlist fetch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Minimum spacing between outbound requests, in seconds
    pub interval_secs: u64,
    /// Per-request timeout, in seconds
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            timeout_secs: 30,
        }
    }
}

/// Fuzzy-match bands and score weights
///
/// Scores at or above `high` merge the surface form into the matched
/// identity; scores between `floor` and `high` record the match flagged for
/// review; scores below `floor` create a new identity. A score landing
/// exactly on a boundary takes the lower band.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub floor: f64,
    pub high: f64,
    pub token_weight: f64,
    pub edit_weight: f64,
    pub wildcard_weight: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            floor: 0.60,
            high: 0.90,
            token_weight: 0.5,
            edit_weight: 0.4,
            wildcard_weight: 0.1,
        }
    }
}

/// Site-local additions to the built-in classification lexicons
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub extra_roles: Vec<String>,
    pub extra_ensemble_keywords: Vec<String>,
}

/// One station's registry entry
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    /// Unique station name (natural key in the store)
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Playlist document URL with strftime-style date tokens
    /// (`%Y`, `%m`, `%d`), e.g. `https://example.org/playlists/%Y-%m-%d.json`
    #[serde(default)]
    pub url_template: Option<String>,
    /// Station-local offset from UTC, in minutes (negative west of UTC)
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Authority rank 0-100; higher means closer to the original broadcast
    /// source (100 designates a syndication origin)
    #[serde(default = "default_authority")]
    pub authority: i64,
    #[serde(default)]
    pub grammar: GrammarConfig,
    #[serde(default)]
    pub field_map: FieldMapConfig,
}

fn default_true() -> bool {
    true
}

fn default_authority() -> i64 {
    10
}

/// Per-station grammar descriptor for the entity-string parser, as written
/// in the config file (separator strings and opening-bracket characters)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub major_separator: String,
    pub minor_separator: Option<String>,
    /// Opening characters of recognized enclosing delimiters
    pub brackets: Vec<char>,
    pub max_depth: u32,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            major_separator: ";".to_string(),
            minor_separator: None,
            brackets: vec!['"', '\'', '(', '['],
            max_depth: 2,
        }
    }
}

/// JSON pointers locating semantic fields inside a station's playlist
/// document. An empty pointer means the field is not present in that
/// station's format. `programs` and `plays` locate arrays; the remaining
/// pointers are evaluated relative to one program/play object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldMapConfig {
    pub programs: String,
    pub program_name: String,
    pub program_host: String,
    pub program_start: String,
    pub program_end: String,
    pub plays: String,
    pub play_start: String,
    pub play_end: String,
    pub composer: String,
    pub work: String,
    pub conductor: String,
    pub ensembles: String,
    pub performers: String,
    pub recording: String,
    pub label: String,
    pub catalog_no: String,
}

impl AircheckConfig {
    /// Look up a station entry by name
    pub fn station(&self, name: &str) -> Option<&StationConfig> {
        self.stations.iter().find(|s| s.name == name)
    }

    /// Database filename within the data folder
    pub fn database_file(&self) -> &str {
        self.database_file.as_deref().unwrap_or("aircheck.db")
    }
}

/// Load configuration following the priority order:
/// 1. Explicit path (command-line argument, highest priority)
/// 2. `AIRCHECK_CONFIG` environment variable
/// 3. Platform config directory (then `/etc/aircheck/` on Linux)
/// 4. Built-in defaults (empty station table)
///
/// An explicitly named file that does not exist is an error; a missing
/// implicit file is not.
pub fn load_config(cli_arg: Option<&Path>) -> Result<AircheckConfig> {
    if let Some(path) = cli_arg {
        return read_config_file(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return read_config_file(Path::new(&path));
    }

    if let Some(path) = find_default_config_file() {
        return read_config_file(&path);
    }

    Ok(AircheckConfig::default())
}

/// Parse one TOML config file
pub fn read_config_file(path: &Path) -> Result<AircheckConfig> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    let contents = std::fs::read_to_string(path)?;
    let config: AircheckConfig = toml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AircheckConfig) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for station in &config.stations {
        if station.name.trim().is_empty() {
            return Err(Error::Config("Station with empty name".to_string()));
        }
        if !seen.insert(station.name.as_str()) {
            return Err(Error::Config(format!(
                "Duplicate station name: {}",
                station.name
            )));
        }
        if !(0..=100).contains(&station.authority) {
            return Err(Error::Config(format!(
                "Station {}: authority {} outside 0-100",
                station.name, station.authority
            )));
        }
    }
    let m = &config.matcher;
    if !(0.0..=1.0).contains(&m.floor) || !(0.0..=1.0).contains(&m.high) || m.floor > m.high {
        return Err(Error::Config(format!(
            "Matcher thresholds out of order: floor {} high {}",
            m.floor, m.high
        )));
    }
    Ok(())
}

/// Search the platform config locations for an `aircheck.toml`
fn find_default_config_file() -> Option<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        let path = dir.join("aircheck").join("aircheck.toml");
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(target_os = "linux") {
        let path = PathBuf::from("/etc/aircheck/aircheck.toml");
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Resolve the data folder following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. `AIRCHECK_DATA` environment variable
/// 3. `data_folder` in the config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&Path>, config: &AircheckConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_ENV_VAR) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("aircheck"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/aircheck"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("aircheck"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/aircheck"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("aircheck"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\aircheck"))
    } else {
        PathBuf::from("./aircheck_data")
    }
}
