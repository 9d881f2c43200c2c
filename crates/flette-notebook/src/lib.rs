//! Jupyter notebook model and HTML rendering.
//!
//! This crate deserializes nbformat v4 documents, renders their cells to an HTML
//! fragment with syntax-highlighted code, and collects the headings of that
//! fragment so callers can build a table of contents.

pub mod headings;
pub mod highlight;
pub mod markdown;
pub mod notebook;
pub mod output;
pub mod render;

pub use highlight::{escape_html, stylesheet};
pub use notebook::{Cell, MultilineText, Notebook, NotebookError, Output};
pub use headings::Heading;
pub use render::{render_notebook, RenderedNotebook};
