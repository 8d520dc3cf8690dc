use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::store::ConnectionSpec;

pub const DEFAULT_DATABASE: &str = ".reclink/links.sqlite";
pub const PROJECT_CONFIG_FILE: &str = ".reclink.project.yml";
const MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub database: String,
    pub pragmas: BTreeMap<String, String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        let mut pragmas = BTreeMap::new();
        pragmas.insert("journal_mode".to_string(), "WAL".to_string());
        pragmas.insert("synchronous".to_string(), "FULL".to_string());
        Self {
            database: DEFAULT_DATABASE.to_string(),
            pragmas,
        }
    }
}

impl EffectiveConfig {
    /// Resolves `database` against `cwd` (after `~` expansion) and carries
    /// the pragmas over as connection properties.
    pub fn connection_spec(&self, cwd: &Path, home: &Path) -> ConnectionSpec {
        let mut spec = if self.database == MEMORY_DATABASE {
            ConnectionSpec::memory()
        } else {
            let path = expand_tilde(&self.database, home);
            if path.is_absolute() {
                ConnectionSpec::file(path)
            } else {
                ConnectionSpec::file(cwd.join(path))
            }
        };
        spec.properties = self.pragmas.clone();
        spec
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    pragmas: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("pragma `{0}` must be a string, number or boolean")]
    InvalidPragma(String),
}

#[derive(Debug, Default)]
struct ConfigLayer {
    database: Option<String>,
    pragmas: BTreeMap<String, String>,
}

/// Merges user, nearest project and repo configuration, in that order, over
/// the defaults. Later layers win key by key.
pub fn load_effective_config(
    cwd: &Path,
    repo_config: Option<&Path>,
    user_config: Option<&Path>,
) -> Result<EffectiveConfig, ConfigError> {
    let mut merged = EffectiveConfig::default();

    if let Some(path) = user_config.filter(|path| path.exists()) {
        merge_layer(&mut merged, load_config_layer(path)?);
    }

    if let Some(path) = find_nearest_project_config(cwd) {
        merge_layer(&mut merged, load_config_layer(&path)?);
    }

    if let Some(path) = repo_config.filter(|path| path.exists()) {
        merge_layer(&mut merged, load_config_layer(path)?);
    }

    Ok(merged)
}

pub fn find_nearest_project_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(PROJECT_CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn merge_layer(merged: &mut EffectiveConfig, layer: ConfigLayer) {
    if let Some(database) = layer.database {
        merged.database = database;
    }
    merged.pragmas.extend(layer.pragmas);
}

fn load_config_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_layer(&content)
}

fn parse_config_layer(content: &str) -> Result<ConfigLayer, ConfigError> {
    if content.trim().is_empty() {
        return Ok(ConfigLayer::default());
    }
    let raw: RawConfig = serde_yaml::from_str(content)?;

    let mut pragmas = BTreeMap::new();
    for (name, value) in raw.pragmas.unwrap_or_default() {
        let rendered = match value {
            serde_yaml::Value::String(text) => text,
            serde_yaml::Value::Number(number) => number.to_string(),
            serde_yaml::Value::Bool(flag) => (if flag { "ON" } else { "OFF" }).to_string(),
            _ => return Err(ConfigError::InvalidPragma(name)),
        };
        pragmas.insert(name, rendered);
    }

    Ok(ConfigLayer {
        database: raw.database,
        pragmas,
    })
}

pub fn load_config_file(path: &Path) -> Result<EffectiveConfig, ConfigError> {
    let mut merged = EffectiveConfig::default();
    merge_layer(&mut merged, load_config_layer(path)?);
    Ok(merged)
}

pub fn default_repo_config_yaml() -> String {
    format!(
        r#"database: {DEFAULT_DATABASE}
pragmas:
  journal_mode: WAL
  synchronous: FULL
"#
    )
}

pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}
