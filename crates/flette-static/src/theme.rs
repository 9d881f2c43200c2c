//! Themes: a page template plus a manifest of static assets.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use indicatif::ProgressBar;
use serde::Deserialize;
use walkdir::WalkDir;

/// Template file inside a theme directory.
pub const TEMPLATE_FILE: &str = "template.html.j2";

/// Asset manifest inside a theme directory.
pub const MANIFEST_FILE: &str = "flette-theme.yaml";

/// Errors that can occur when loading or installing a theme.
#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("Theme not found: {0}")]
    NotFound(String),

    #[error("Failed to read theme file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid theme manifest: {0}")]
    Manifest(#[from] serde_yaml::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// One manifest line: `- file` or `- source: destination`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Path(String),
    Mapping(BTreeMap<String, String>),
}

impl ManifestEntry {
    /// Source and destination, or `None` for a mapping without exactly one key.
    pub fn paths(&self) -> Option<(&str, &str)> {
        match self {
            ManifestEntry::Path(path) => Some((path, path)),
            ManifestEntry::Mapping(map) if map.len() == 1 => {
                map.iter().next().map(|(s, d)| (s.as_str(), d.as_str()))
            }
            ManifestEntry::Mapping(_) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            ManifestEntry::Path(path) => path.clone(),
            ManifestEntry::Mapping(map) => format!("{:?}", map),
        }
    }
}

/// Static assets a theme ships.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ThemeManifest {
    pub entries: Vec<ManifestEntry>,
}

impl ThemeManifest {
    pub fn from_yaml(source: &str) -> Result<Self, ThemeError> {
        let value: serde_yaml::Value = serde_yaml::from_str(source)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }
}

/// A theme compiled into the binary.
#[derive(Debug)]
pub struct BundledTheme {
    pub name: &'static str,
    pub template: &'static str,
    pub manifest: &'static str,
    /// Files by theme-relative path
    pub files: &'static [(&'static str, &'static [u8])],
}

/// Themes available by name.
pub static BUNDLED_THEMES: &[BundledTheme] = &[BundledTheme {
    name: "default",
    template: include_str!("../themes/default/template.html.j2"),
    manifest: include_str!("../themes/default/flette-theme.yaml"),
    files: &[
        (
            "static/flette.css",
            include_bytes!("../themes/default/static/flette.css"),
        ),
        (
            "static/flette.js",
            include_bytes!("../themes/default/static/flette.js"),
        ),
    ],
}];

/// Outcome of copying theme assets.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CopyReport {
    /// Files written
    pub copied: usize,
    /// Manifest sources that could not be copied
    pub failed: Vec<String>,
}

enum AssetSource<'a> {
    File(PathBuf),
    Embedded(&'a [u8]),
}

/// A resolved theme.
#[derive(Debug, Clone)]
pub enum Theme {
    Bundled(&'static BundledTheme),
    Directory(PathBuf),
}

impl Theme {
    /// Resolve a theme by bundled name, or as a directory (relative paths are
    /// taken from `base_dir`).
    pub fn resolve(theme: &str, base_dir: &Path) -> Result<Self, ThemeError> {
        if let Some(bundled) = BUNDLED_THEMES.iter().find(|t| t.name == theme) {
            return Ok(Theme::Bundled(bundled));
        }

        let dir = base_dir.join(theme);
        if dir.is_dir() {
            Ok(Theme::Directory(dir))
        } else {
            Err(ThemeError::NotFound(theme.to_string()))
        }
    }

    pub fn name(&self) -> String {
        match self {
            Theme::Bundled(theme) => theme.name.to_string(),
            Theme::Directory(dir) => dir.display().to_string(),
        }
    }

    fn read_text(dir: &Path, file: &str) -> Result<String, ThemeError> {
        let path = dir.join(file);
        fs::read_to_string(&path).map_err(|source| ThemeError::Read {
            path: path.display().to_string(),
            source,
        })
    }

    /// Page template source.
    pub fn template(&self) -> Result<String, ThemeError> {
        match self {
            Theme::Bundled(theme) => Ok(theme.template.to_string()),
            Theme::Directory(dir) => Self::read_text(dir, TEMPLATE_FILE),
        }
    }

    pub fn manifest(&self) -> Result<ThemeManifest, ThemeError> {
        match self {
            Theme::Bundled(theme) => ThemeManifest::from_yaml(theme.manifest),
            Theme::Directory(dir) => {
                ThemeManifest::from_yaml(&Self::read_text(dir, MANIFEST_FILE)?)
            }
        }
    }

    /// Files making up a manifest source: the file itself, or every file
    /// below it when it names a directory. Paired with their path relative
    /// to the source.
    fn lookup(&self, source: &str) -> Vec<(PathBuf, AssetSource<'static>)> {
        match self {
            Theme::Bundled(theme) => {
                let prefix = format!("{}/", source.trim_end_matches('/'));
                theme
                    .files
                    .iter()
                    .filter_map(|(path, bytes)| {
                        if *path == source {
                            Some((PathBuf::new(), AssetSource::Embedded(*bytes)))
                        } else {
                            path.strip_prefix(prefix.as_str())
                                .map(|rest| (PathBuf::from(rest), AssetSource::Embedded(*bytes)))
                        }
                    })
                    .collect()
            }
            Theme::Directory(dir) => {
                let path = dir.join(source);
                if path.is_file() {
                    vec![(PathBuf::new(), AssetSource::File(path))]
                } else if path.is_dir() {
                    WalkDir::new(&path)
                        .into_iter()
                        .filter_map(|e| e.ok())
                        .filter(|e| e.file_type().is_file())
                        .map(|e| {
                            let rest = e.path().strip_prefix(&path).unwrap_or(e.path());
                            (rest.to_path_buf(), AssetSource::File(e.path().to_path_buf()))
                        })
                        .collect()
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Copy the manifest's assets into `target`.
    ///
    /// A source that does not exist is reported and skipped; the remaining
    /// entries are still copied.
    pub fn copy_assets(
        &self,
        target: &Path,
        progress: &ProgressBar,
    ) -> Result<CopyReport, ThemeError> {
        let manifest = self.manifest()?;
        let mut report = CopyReport::default();

        progress.set_length(manifest.entries.len() as u64);

        for entry in &manifest.entries {
            progress.inc(1);

            let Some((source, destination)) = entry.paths() else {
                let described = entry.describe();
                report_failure(
                    progress,
                    &format!("{} is not a valid manifest entry", described),
                );
                report.failed.push(described);
                continue;
            };

            let files = self.lookup(source);
            if files.is_empty() {
                report_failure(progress, &format!("{source} is not a file"));
                report.failed.push(source.to_string());
                continue;
            }

            for (rest, asset) in files {
                let dest = if rest.as_os_str().is_empty() {
                    target.join(destination)
                } else {
                    target.join(destination).join(rest)
                };
                write_asset(&dest, asset)?;
                tracing::debug!("Copied {} to {}", source, dest.display());
                report.copied += 1;
            }
        }

        Ok(report)
    }
}

fn report_failure(progress: &ProgressBar, message: &str) {
    progress.suspend(|| eprintln!("{} {}", style("error").red(), message));
}

fn write_asset(dest: &Path, asset: AssetSource) -> Result<(), ThemeError> {
    let wrap = |source| ThemeError::Write {
        path: dest.display().to_string(),
        source,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    match asset {
        AssetSource::File(path) => fs::copy(path, dest).map(|_| ()).map_err(wrap),
        AssetSource::Embedded(bytes) => fs::write(dest, bytes).map_err(wrap),
    }
}
