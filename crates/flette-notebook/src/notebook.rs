//! nbformat v4 document model.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

/// Lowest nbformat major version this crate understands.
pub const MIN_NBFORMAT: u32 = 4;

/// Errors that can occur when loading a notebook.
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("Failed to read notebook: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported nbformat version {0} (need {min} or newer)", min = MIN_NBFORMAT)]
    UnsupportedFormat(u32),

    #[error("Unknown highlight theme: {0}")]
    UnknownTheme(String),

    #[error("Highlighting failed: {0}")]
    Highlight(String),

    #[error("Failed to process rendered HTML: {0}")]
    Rewrite(String),
}

/// Text stored either as a single string or as a list of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultilineText(pub String);

impl MultilineText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for MultilineText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Lines(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(s) => MultilineText(s),
            Repr::Lines(lines) => MultilineText(lines.concat()),
        })
    }
}

/// A parsed notebook.
#[derive(Debug, Clone, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub metadata: NotebookMetadata,

    pub nbformat: u32,

    #[serde(default)]
    pub nbformat_minor: u32,

    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// Notebook-level metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default)]
    pub language_info: Option<LanguageInfo>,

    #[serde(default)]
    pub kernelspec: Option<KernelSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguageInfo {
    #[serde(default)]
    pub name: Option<String>,

    /// Lexer hint used to highlight code cells
    #[serde(default)]
    pub pygments_lexer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KernelSpec {
    #[serde(default)]
    pub language: Option<String>,
}

/// Per-cell metadata. Only the fields the renderer looks at are typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CellMetadata {
    /// Target format of a raw cell, e.g. `text/html`
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub raw_mimetype: Option<String>,
}

/// A notebook cell.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Markdown {
        source: MultilineText,
        #[serde(default)]
        metadata: CellMetadata,
    },
    Code {
        source: MultilineText,
        #[serde(default)]
        metadata: CellMetadata,
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        outputs: Vec<Output>,
    },
    Raw {
        source: MultilineText,
        #[serde(default)]
        metadata: CellMetadata,
    },
}

/// Mime type to payload. Text payloads may be split into lines.
pub type MimeBundle = BTreeMap<String, Value>;

/// A code cell output.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        #[serde(default = "default_stream")]
        name: String,
        text: MultilineText,
    },
    DisplayData {
        #[serde(default)]
        data: MimeBundle,
    },
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        data: MimeBundle,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

fn default_stream() -> String {
    "stdout".to_string()
}

/// Read the text payload stored under `mime`, joining line lists.
pub fn bundle_text(bundle: &MimeBundle, mime: &str) -> Option<String> {
    match bundle.get(mime)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .concat(),
        ),
        _ => None,
    }
}

impl Notebook {
    /// Parse a notebook from a JSON string.
    pub fn parse(source: &str) -> Result<Self, NotebookError> {
        let notebook: Notebook = serde_json::from_str(source)?;
        notebook.check_version()
    }

    /// Parse a notebook from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, NotebookError> {
        let notebook: Notebook = serde_json::from_reader(reader)?;
        notebook.check_version()
    }

    /// Read and parse the notebook at `path`.
    pub fn from_path(path: &Path) -> Result<Self, NotebookError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    fn check_version(self) -> Result<Self, NotebookError> {
        if self.nbformat < MIN_NBFORMAT {
            return Err(NotebookError::UnsupportedFormat(self.nbformat));
        }
        Ok(self)
    }

    /// Override the lexer hint used for code cells.
    pub fn force_lexer(&mut self, lexer: &str) {
        self.metadata
            .language_info
            .get_or_insert_with(LanguageInfo::default)
            .pygments_lexer = Some(lexer.to_string());
    }

    /// Lexer used for code cells: the explicit hint, then the language name.
    pub fn lexer(&self) -> &str {
        let info = self.metadata.language_info.as_ref();
        info.and_then(|i| i.pygments_lexer.as_deref())
            .or_else(|| info.and_then(|i| i.name.as_deref()))
            .or_else(|| {
                self.metadata
                    .kernelspec
                    .as_ref()
                    .and_then(|k| k.language.as_deref())
            })
            .unwrap_or("python")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
      "metadata": {
        "kernelspec": {"name": "python3", "display_name": "Python 3", "language": "python"},
        "language_info": {"name": "python", "pygments_lexer": "ipython3"}
      },
      "nbformat": 4,
      "nbformat_minor": 5,
      "cells": [
        {"cell_type": "markdown", "metadata": {}, "source": ["# Intro\n", "Some text"]},
        {"cell_type": "code", "metadata": {}, "execution_count": 1,
         "source": "print('hi')",
         "outputs": [{"output_type": "stream", "name": "stdout", "text": ["hi\n"]}]},
        {"cell_type": "raw", "metadata": {"format": "text/html"}, "source": "<b>raw</b>"}
      ]
    }"##;

    #[test]
    fn parses_cells() {
        let nb = Notebook::parse(SAMPLE).unwrap();

        assert_eq!(nb.cells.len(), 3);
        assert!(matches!(
            &nb.cells[0],
            Cell::Markdown { source, .. } if source.as_str() == "# Intro\nSome text"
        ));
        assert!(matches!(
            &nb.cells[1],
            Cell::Code { execution_count: Some(1), outputs, .. } if outputs.len() == 1
        ));
        assert!(matches!(
            &nb.cells[2],
            Cell::Raw { metadata, .. } if metadata.format.as_deref() == Some("text/html")
        ));
    }

    #[test]
    fn joins_line_lists() {
        let nb = Notebook::parse(SAMPLE).unwrap();

        let Cell::Code { outputs, .. } = &nb.cells[1] else {
            panic!("expected code cell");
        };
        match &outputs[0] {
            Output::Stream { name, text } => {
                assert_eq!(name, "stdout");
                assert_eq!(text.as_str(), "hi\n");
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn rejects_old_format() {
        let result = Notebook::parse(r#"{"nbformat": 3, "cells": []}"#);

        assert!(matches!(result, Err(NotebookError::UnsupportedFormat(3))));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Unsupported nbformat version 3 (need 4 or newer)"
        );
    }

    #[test]
    fn forced_lexer_wins() {
        let mut nb = Notebook::parse(SAMPLE).unwrap();
        assert_eq!(nb.lexer(), "ipython3");

        nb.force_lexer("ipython");
        assert_eq!(nb.lexer(), "ipython");
    }

    #[test]
    fn lexer_defaults_to_python() {
        let nb = Notebook::parse(r#"{"nbformat": 4, "cells": []}"#).unwrap();

        assert_eq!(nb.lexer(), "python");
    }

    #[test]
    fn reads_bundle_text() {
        let mut bundle = MimeBundle::new();
        bundle.insert(
            "text/plain".to_string(),
            serde_json::json!(["a\n", "b"]),
        );

        assert_eq!(bundle_text(&bundle, "text/plain").as_deref(), Some("a\nb"));
        assert_eq!(bundle_text(&bundle, "text/html"), None);
    }
}
