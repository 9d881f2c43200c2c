//! Static site builder for flette.
//!
//! Turns a directory of Jupyter notebooks into a themed static website: every
//! notebook becomes one page, pages share a navigation built from their
//! headings, and the theme's assets are copied next to them.

pub mod builder;
pub mod config;
pub mod ordering;
pub mod page;
pub mod templates;
pub mod theme;

pub use builder::{BuildError, BuildResult, SiteBuilder};
pub use config::{LoadedConfig, SidebarTitle, SiteConfig, CONFIG_FILE_NAME};
pub use ordering::{NotebookSource, OrderingError, OrderingMetadata};
pub use page::{Page, TocEntry};
pub use theme::{Theme, ThemeError, ThemeManifest};
