//! Pages: rendered notebooks plus their navigation entries.

use std::collections::BTreeMap;

use serde::Serialize;

use flette_notebook::{
    escape_html, render_notebook, Heading, Notebook, NotebookError, RenderedNotebook,
};

use crate::ordering::{NotebookSource, OrderingMetadata};

/// Lexer hint forced onto every notebook's code cells.
pub const CODE_CELL_LEXER: &str = "ipython";

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocEntry {
    /// Heading inner HTML
    pub title: String,
    /// In-page anchor, `#id`
    pub href: String,
    /// Heading level (1-6)
    pub level: u8,
    /// Nesting class, `indent-<level>`
    pub class: &'static str,
    /// Ready-made `<li>` for the entry
    pub html: String,
}

/// CSS class for a heading level.
pub fn depth_class(level: u8) -> &'static str {
    match level {
        0 | 1 => "indent-1",
        2 => "indent-2",
        3 => "indent-3",
        4 => "indent-4",
        5 => "indent-5",
        _ => "indent-6",
    }
}

impl TocEntry {
    pub fn from_heading(heading: &Heading) -> Self {
        let class = depth_class(heading.level);
        let href = format!("#{}", heading.id);
        let html = format!(
            "<li class=\"nav-item {}\"><a href=\"{}\">{}</a></li>",
            class,
            escape_html(&href),
            heading.html
        );

        Self {
            title: heading.html.clone(),
            href,
            level: heading.level,
            class,
            html,
        }
    }
}

/// A page of the site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Output path relative to the target directory
    pub htmlfile: String,

    /// Rendered notebook HTML
    pub body: String,

    /// First heading's inner HTML
    pub title: String,

    /// Table of contents as `<li>` fragments
    pub toc: Vec<String>,

    /// Structured table of contents
    pub headings: Vec<TocEntry>,
}

/// Drop a numeric leading segment from a file name: `00.index` -> `index`.
fn strip_numeric_prefix(file_name: &str) -> &str {
    match file_name.split_once('.') {
        Some((prefix, rest))
            if !prefix.is_empty()
                && !rest.is_empty()
                && prefix.chars().all(|c| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => file_name,
    }
}

/// Output name for a notebook, without extension.
///
/// With ordering metadata the relative name is kept as is; otherwise the
/// numeric prefix that sets the file order is removed from the file name.
pub fn output_name(name: &str, has_metadata: bool) -> String {
    if has_metadata {
        return name.to_string();
    }

    match name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/{}", dir, strip_numeric_prefix(file)),
        None => strip_numeric_prefix(name).to_string(),
    }
}

impl Page {
    /// Build a page from a rendered notebook.
    ///
    /// A notebook without headings takes its (escaped) name as title.
    pub fn from_rendered(
        name: &str,
        rendered: RenderedNotebook,
        metadata: Option<&OrderingMetadata>,
    ) -> Self {
        let headings: Vec<TocEntry> = rendered
            .headings
            .iter()
            .map(TocEntry::from_heading)
            .collect();

        let title = match rendered.first_heading() {
            Some(heading) => heading.html.clone(),
            None => {
                tracing::warn!("{} has no headings, using its name as title", name);
                escape_html(name)
            }
        };

        Self {
            htmlfile: format!("{}.html", output_name(name, metadata.is_some())),
            body: rendered.body,
            title,
            toc: headings.iter().map(|e| e.html.clone()).collect(),
            headings,
        }
    }

    /// Read, render and describe one notebook.
    pub fn render(
        source: &NotebookSource,
        metadata: Option<&OrderingMetadata>,
    ) -> Result<Self, NotebookError> {
        let mut notebook = Notebook::from_path(&source.path)?;
        notebook.force_lexer(CODE_CELL_LEXER);

        let rendered = render_notebook(&notebook)?;
        Ok(Self::from_rendered(&source.name, rendered, metadata))
    }

    /// Relative prefix from this page back to the site root.
    pub fn root(&self) -> String {
        "../".repeat(self.htmlfile.matches('/').count())
    }
}

/// Output files claimed by more than one page, with the pages' titles.
pub fn duplicate_outputs(pages: &[Page]) -> BTreeMap<&str, Vec<&str>> {
    let mut by_file: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for page in pages {
        by_file
            .entry(page.htmlfile.as_str())
            .or_default()
            .push(page.title.as_str());
    }
    by_file.retain(|_, titles| titles.len() > 1);
    by_file
}
