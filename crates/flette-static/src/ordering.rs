//! Notebook discovery and page ordering.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::{DirEntry, WalkDir};

/// Extension of notebook files.
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Errors that stop the run before any page is written.
#[derive(Debug, thiserror::Error)]
pub enum OrderingError {
    #[error("no notebooks found in {}", .0.display())]
    NoNotebooks(PathBuf),

    #[error("failed to load metadata file {}: {source}", .path.display())]
    MetadataLoad { path: PathBuf, source: csv::Error },

    #[error(
        "notebooks do not match metafile ({found} notebooks, {listed} metadata rows){}",
        mismatch_details(.missing, .unknown)
    )]
    MetadataMismatch {
        found: usize,
        listed: usize,
        /// Notebooks that have no metadata row
        missing: Vec<String>,
        /// Metadata rows with no notebook, or repeated rows
        unknown: Vec<String>,
    },
}

fn mismatch_details(missing: &[String], unknown: &[String]) -> String {
    let mut details = String::new();
    if !missing.is_empty() {
        details.push_str(&format!("; not in metadata: {}", missing.join(", ")));
    }
    if !unknown.is_empty() {
        details.push_str(&format!("; no such notebook: {}", unknown.join(", ")));
    }
    details
}

/// A discovered notebook file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookSource {
    /// Path of the `.ipynb` file
    pub path: PathBuf,

    /// Path relative to the source directory, `/`-separated, without extension
    pub name: String,
}

impl NotebookSource {
    /// Describe `path`, which must live under `root`.
    pub fn new(root: &Path, path: &Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Self {
            path: path.to_path_buf(),
            name,
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Find every notebook under `dir`, sorted by relative name.
///
/// Hidden directories such as `.ipynb_checkpoints` are skipped.
pub fn discover_notebooks(dir: &Path) -> Result<Vec<NotebookSource>, OrderingError> {
    if !dir.is_dir() {
        return Err(OrderingError::NoNotebooks(dir.to_path_buf()));
    }

    let mut notebooks: Vec<NotebookSource> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path().extension().and_then(|ext| ext.to_str()) == Some(NOTEBOOK_EXTENSION)
        })
        .map(|e| NotebookSource::new(dir, e.path()))
        .collect();

    if notebooks.is_empty() {
        return Err(OrderingError::NoNotebooks(dir.to_path_buf()));
    }

    notebooks.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!("Discovered {} notebooks in {}", notebooks.len(), dir.display());

    Ok(notebooks)
}

/// One row of the ordering table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderEntry {
    /// Notebook name, relative to the source directory, without extension
    pub notebook: String,

    /// Position of the page; lower comes first
    pub index: i64,
}

/// Explicit page order read from a CSV file with `notebook` and `index` columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderingMetadata {
    entries: Vec<OrderEntry>,
}

impl OrderingMetadata {
    /// Load the table at `path`.
    pub fn load(path: &Path) -> Result<Self, OrderingError> {
        let wrap = |source| OrderingError::MetadataLoad {
            path: path.to_path_buf(),
            source,
        };

        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(wrap)?;

        Self::from_csv(reader).map_err(wrap)
    }

    /// Read the table from CSV text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        let mut entries = reader
            .deserialize()
            .collect::<Result<Vec<OrderEntry>, csv::Error>>()?;

        entries.sort_by_key(|e| e.index);
        Ok(Self { entries })
    }

    /// Rows sorted by index.
    pub fn entries(&self) -> &[OrderEntry] {
        &self.entries
    }

    /// Put `discovered` in metadata order.
    ///
    /// Fails unless every notebook has exactly one row and every row names a
    /// notebook.
    pub fn apply(
        &self,
        discovered: Vec<NotebookSource>,
    ) -> Result<Vec<NotebookSource>, OrderingError> {
        let found = discovered.len();
        let mut by_name: BTreeMap<String, NotebookSource> = discovered
            .into_iter()
            .map(|nb| (nb.name.clone(), nb))
            .collect();

        let mut ordered = Vec::with_capacity(found);
        let mut unknown = Vec::new();

        for entry in &self.entries {
            match by_name.remove(&entry.notebook) {
                Some(nb) => ordered.push(nb),
                None => unknown.push(entry.notebook.clone()),
            }
        }

        let missing: Vec<String> = by_name.into_keys().collect();

        if !missing.is_empty() || !unknown.is_empty() {
            return Err(OrderingError::MetadataMismatch {
                found,
                listed: self.entries.len(),
                missing,
                unknown,
            });
        }

        Ok(ordered)
    }
}

/// Notebooks in final page order.
#[derive(Debug, Clone)]
pub struct Ordered {
    pub notebooks: Vec<NotebookSource>,

    /// Present when the order came from a metadata file
    pub metadata: Option<OrderingMetadata>,
}

/// Discover the notebooks under `source_dir` and order them, using the
/// metadata table at `metadata_path` when one is configured.
pub fn order_notebooks(
    source_dir: &Path,
    metadata_path: Option<&Path>,
) -> Result<Ordered, OrderingError> {
    let discovered = discover_notebooks(source_dir)?;

    let Some(path) = metadata_path else {
        return Ok(Ordered {
            notebooks: discovered,
            metadata: None,
        });
    };

    let metadata = OrderingMetadata::load(path)?;
    let notebooks = metadata.apply(discovered)?;
    tracing::info!("Ordered {} notebooks from {}", notebooks.len(), path.display());

    Ok(Ordered {
        notebooks,
        metadata: Some(metadata),
    })
}
