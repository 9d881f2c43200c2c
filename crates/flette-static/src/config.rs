//! Site configuration (fletteconf.yaml).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// File looked up when the config path is a directory.
pub const CONFIG_FILE_NAME: &str = "fletteconf.yaml";

/// Errors that can occur when reading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: expected a mapping of keys to values")]
    NotMapping,
}

/// Sidebar title setting: `true` takes the first page's title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SidebarTitle {
    Flag(bool),
    Text(String),
}

impl SidebarTitle {
    /// Replace `true` with the given title. Other values are kept.
    pub fn resolve(&self, first_title: Option<&str>) -> SidebarTitle {
        match (self, first_title) {
            (SidebarTitle::Flag(true), Some(title)) => SidebarTitle::Text(title.to_string()),
            _ => self.clone(),
        }
    }
}

/// Site configuration. Keys missing from the user file keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteConfig {
    /// Bundled theme name or theme directory
    pub theme: String,

    /// Notebook directory
    pub source: String,

    /// Output directory
    pub target: String,

    /// Ordering CSV, empty to order by file name
    pub metadata: String,

    pub title_sidebar: SidebarTitle,

    /// syntect theme for highlight.css, empty to skip it
    pub highlight_theme: String,

    /// Any other keys, passed through to templates
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_theme() -> String {
    "default".to_string()
}
fn default_source() -> String {
    "notebooks".to_string()
}
fn default_target() -> String {
    "www".to_string()
}
fn default_title_sidebar() -> SidebarTitle {
    SidebarTitle::Flag(true)
}
fn default_highlight_theme() -> String {
    "InspiredGitHub".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            source: default_source(),
            target: default_target(),
            metadata: String::new(),
            title_sidebar: default_title_sidebar(),
            highlight_theme: default_highlight_theme(),
            extra: BTreeMap::new(),
        }
    }
}

/// Replace `slot` with `value`, or keep it when `value` has the wrong type.
fn overlay<T: DeserializeOwned>(slot: &mut T, key: &str, value: Value) {
    match serde_yaml::from_value(value) {
        Ok(value) => *slot = value,
        Err(e) => tracing::warn!("Ignoring config key {}: {}", key, e),
    }
}

impl SiteConfig {
    /// Parse a YAML document on top of the defaults, key by key.
    ///
    /// A key with a value of the wrong type is skipped with a warning and
    /// keeps its default; the other keys still apply.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mapping = match serde_yaml::from_str::<Value>(content)? {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            _ => return Err(ConfigError::NotMapping),
        };

        let mut config = Self::default();
        for (key, value) in mapping {
            let Some(key) = key.as_str() else {
                tracing::warn!("Ignoring non-string config key {:?}", key);
                continue;
            };

            match key {
                "theme" => overlay(&mut config.theme, key, value),
                "source" => overlay(&mut config.source, key, value),
                "target" => overlay(&mut config.target, key, value),
                "metadata" => overlay(&mut config.metadata, key, value),
                "title_sidebar" => overlay(&mut config.title_sidebar, key, value),
                "highlight_theme" => overlay(&mut config.highlight_theme, key, value),
                _ => {
                    config.extra.insert(key.to_string(), value);
                }
            }
        }

        Ok(config)
    }

    /// Read a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }
}

/// A configuration together with the directory its paths are relative to.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SiteConfig,

    /// Config file location (it may not exist)
    pub file: PathBuf,

    /// Directory relative paths are resolved against
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    /// Locate and load the config.
    ///
    /// `path` may name a file or a directory holding `fletteconf.yaml`, and
    /// defaults to the current directory. A missing or unreadable file leaves
    /// the defaults in place.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.unwrap_or_else(|| Path::new("."));
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        let file = if path.is_dir() {
            path.join(CONFIG_FILE_NAME)
        } else {
            path
        };

        let config = if file.is_file() {
            match SiteConfig::from_file(&file) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", file.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Ignoring {}: {}", file.display(), e);
                    SiteConfig::default()
                }
            }
        } else {
            tracing::debug!("No config at {}, using defaults", file.display());
            SiteConfig::default()
        };

        Self::with_config(config, file)
    }

    /// Wrap an already built config located at `file`.
    pub fn with_config(config: SiteConfig, file: PathBuf) -> Self {
        let base_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            config,
            file,
            base_dir,
        }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.source)
    }

    pub fn target_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.target)
    }

    /// Ordering metadata path, if ordering by metadata is enabled.
    pub fn metadata_path(&self) -> Option<PathBuf> {
        if self.config.metadata.is_empty() {
            None
        } else {
            Some(self.base_dir.join(&self.config.metadata))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn user_keys_override_defaults() {
        let config = SiteConfig::from_yaml("theme: dark\ntarget: public\n").unwrap();

        assert_eq!(config.theme, "dark");
        assert_eq!(config.target, "public");
        assert_eq!(config.source, "notebooks");
        assert_eq!(config.metadata, "");
        assert_eq!(config.title_sidebar, SidebarTitle::Flag(true));
    }

    #[test]
    fn empty_document_is_defaults() {
        assert_eq!(SiteConfig::from_yaml("").unwrap(), SiteConfig::default());
        assert_eq!(
            SiteConfig::from_yaml("# nothing here\n").unwrap(),
            SiteConfig::default()
        );
    }

    #[test]
    fn keeps_unknown_keys() {
        let config = SiteConfig::from_yaml("site_name: Lab notes\n").unwrap();

        assert_eq!(
            config.extra.get("site_name"),
            Some(&Value::String("Lab notes".to_string()))
        );
    }

    #[test]
    fn mistyped_key_keeps_only_its_default() {
        let config =
            SiteConfig::from_yaml("source: nbs\ntarget: public\ntitle_sidebar: 2024\n").unwrap();

        assert_eq!(config.source, "nbs");
        assert_eq!(config.target, "public");
        assert_eq!(config.title_sidebar, SidebarTitle::Flag(true));
    }

    #[test]
    fn rejects_non_mapping_document() {
        assert!(matches!(
            SiteConfig::from_yaml("- theme\n- dark\n"),
            Err(ConfigError::NotMapping)
        ));
    }

    #[test]
    fn mistyped_key_in_file_keeps_other_keys() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "source: nbs\ntheme: [a, b]\n",
        )
        .unwrap();

        let loaded = LoadedConfig::load(Some(temp.path()));

        assert_eq!(loaded.config.source, "nbs");
        assert_eq!(loaded.config.theme, "default");
    }

    #[test]
    fn sidebar_title_accepts_text() {
        let config = SiteConfig::from_yaml("title_sidebar: My Book\n").unwrap();
        assert_eq!(config.title_sidebar, SidebarTitle::Text("My Book".to_string()));

        let config = SiteConfig::from_yaml("title_sidebar: false\n").unwrap();
        assert_eq!(config.title_sidebar, SidebarTitle::Flag(false));
    }

    #[test]
    fn resolves_sidebar_title() {
        let flag = SidebarTitle::Flag(true);
        assert_eq!(
            flag.resolve(Some("Intro")),
            SidebarTitle::Text("Intro".to_string())
        );
        assert_eq!(flag.resolve(None), SidebarTitle::Flag(true));

        let off = SidebarTitle::Flag(false);
        assert_eq!(off.resolve(Some("Intro")), SidebarTitle::Flag(false));

        let text = SidebarTitle::Text("Book".to_string());
        assert_eq!(text.resolve(Some("Intro")), text);
    }

    #[test]
    fn loads_from_directory() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "source: nbs\nmetadata: order.csv\n",
        )
        .unwrap();

        let loaded = LoadedConfig::load(Some(temp.path()));

        assert_eq!(loaded.config.source, "nbs");
        assert_eq!(loaded.source_dir(), temp.path().join("nbs"));
        assert_eq!(loaded.target_dir(), temp.path().join("www"));
        assert_eq!(loaded.metadata_path(), Some(temp.path().join("order.csv")));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("site.yaml");
        fs::write(&file, "theme: [unclosed\n").unwrap();

        let loaded = LoadedConfig::load(Some(&file));

        assert_eq!(loaded.config, SiteConfig::default());
        assert_eq!(loaded.base_dir, temp.path());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let temp = tempdir().unwrap();

        let loaded = LoadedConfig::load(Some(temp.path()));

        assert_eq!(loaded.config, SiteConfig::default());
        assert_eq!(loaded.file, temp.path().join(CONFIG_FILE_NAME));
        assert_eq!(loaded.metadata_path(), None);
    }
}
