//! Static site builder.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use flette_notebook::NotebookError;

use crate::config::LoadedConfig;
use crate::ordering::{order_notebooks, OrderingError, Ordered};
use crate::page::{duplicate_outputs, Page};
use crate::templates::{PageContext, TemplateEngine};
use crate::theme::{Theme, ThemeError};

/// Stylesheet written for the highlighted code.
pub const HIGHLIGHT_CSS: &str = "highlight.css";

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages generated
    pub pages: usize,

    /// Number of theme files copied
    pub assets: usize,

    /// Theme manifest entries that could not be copied
    pub failed_assets: Vec<String>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error("Failed to render notebook {path}: {source}")]
    Notebook { path: String, source: NotebookError },

    #[error("Invalid theme template: {0}")]
    TemplateSyntax(minijinja::Error),

    #[error("Failed to render template for {page}: {source}")]
    Template {
        page: String,
        source: minijinja::Error,
    },

    #[error("Failed to build highlight stylesheet: {0}")]
    Highlight(NotebookError),

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

/// Static site builder.
pub struct SiteBuilder {
    config: LoadedConfig,
    progress: bool,
}

impl SiteBuilder {
    /// Create a new site builder.
    pub fn new(config: LoadedConfig) -> Self {
        Self {
            config,
            progress: false,
        }
    }

    /// Show progress bars while building.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn progress_bar(&self, len: usize, label: &'static str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }

        let style = ProgressStyle::with_template("{msg} [{bar:36}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let pb = ProgressBar::new(len as u64);
        pb.set_style(style);
        pb.set_message(label);
        pb
    }

    /// Build the site.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let site = &self.config.config;

        let theme = Theme::resolve(&site.theme, &self.config.base_dir)?;
        let templates =
            TemplateEngine::from_source(theme.template()?).map_err(BuildError::TemplateSyntax)?;
        tracing::debug!("Using theme {}", theme.name());

        let source_dir = self.config.source_dir();
        let ordered = order_notebooks(&source_dir, self.config.metadata_path().as_deref())?;

        let pages = self.render_pages(&ordered)?;
        let highlight_css = self.highlight_css()?;

        let output_dir = self.config.target_dir();
        self.write_pages(&pages, &templates)?;
        if let Some(css) = highlight_css {
            self.write_highlight_css(&css)?;
        }

        let pb = self.progress_bar(0, "copy theme files ");
        let report = theme.copy_assets(&output_dir, &pb)?;
        pb.finish();

        Ok(BuildResult {
            pages: pages.len(),
            assets: report.copied,
            failed_assets: report.failed,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir,
        })
    }

    /// Render every notebook, in order.
    fn render_pages(&self, ordered: &Ordered) -> Result<Vec<Page>, BuildError> {
        let pb = self.progress_bar(ordered.notebooks.len(), "process notebooks");
        let mut pages = Vec::with_capacity(ordered.notebooks.len());

        for source in &ordered.notebooks {
            let page = Page::render(source, ordered.metadata.as_ref()).map_err(|source_err| {
                BuildError::Notebook {
                    path: source.path.display().to_string(),
                    source: source_err,
                }
            })?;
            tracing::debug!("Rendered {} -> {}", source.name, page.htmlfile);

            pages.push(page);
            pb.inc(1);
        }

        pb.finish();

        for (htmlfile, titles) in duplicate_outputs(&pages) {
            tracing::warn!(
                "{} pages write to {} ({}), only the last one is kept",
                titles.len(),
                htmlfile,
                titles.join(", ")
            );
        }

        Ok(pages)
    }

    /// Render the theme template for each page and write it out.
    fn write_pages(&self, pages: &[Page], templates: &TemplateEngine) -> Result<(), BuildError> {
        let site = &self.config.config;
        let output_dir = self.config.target_dir();
        let title_sidebar = site
            .title_sidebar
            .resolve(pages.first().map(|p| p.title.as_str()));

        for index in 0..pages.len() {
            let Some(context) = PageContext::at(pages, index, site, &title_sidebar) else {
                continue;
            };
            let page = context.page;

            let html = templates
                .render_page(&context)
                .map_err(|source| BuildError::Template {
                    page: page.htmlfile.clone(),
                    source,
                })?;

            let output_path = output_dir.join(&page.htmlfile);

            // Ensure output directory exists
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
            }

            fs::write(&output_path, html).map_err(|e| BuildError::WriteError(e.to_string()))?;
            tracing::info!("{}", page.htmlfile);
        }

        Ok(())
    }

    /// Stylesheet for the configured highlight theme, `None` when disabled.
    fn highlight_css(&self) -> Result<Option<String>, BuildError> {
        let theme = &self.config.config.highlight_theme;
        if theme.is_empty() {
            return Ok(None);
        }

        flette_notebook::stylesheet(theme)
            .map(Some)
            .map_err(BuildError::Highlight)
    }

    fn write_highlight_css(&self, css: &str) -> Result<(), BuildError> {
        let output_dir = self.config.target_dir();
        fs::create_dir_all(&output_dir).map_err(|e| BuildError::WriteError(e.to_string()))?;
        fs::write(output_dir.join(HIGHLIGHT_CSS), css)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SiteConfig, CONFIG_FILE_NAME};
    use crate::theme::{MANIFEST_FILE, TEMPLATE_FILE};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::tempdir;

    fn notebook(headings: &[&str]) -> String {
        let cells: Vec<String> = headings
            .iter()
            .map(|h| format!(r#"{{"cell_type": "markdown", "metadata": {{}}, "source": "{}"}}"#, h))
            .collect();
        format!(
            r#"{{"nbformat": 4, "nbformat_minor": 5, "metadata": {{}}, "cells": [{}]}}"#,
            cells.join(",")
        )
    }

    fn site(root: &Path, config: &str) -> LoadedConfig {
        let file = root.join(CONFIG_FILE_NAME);
        fs::write(&file, config).unwrap();
        LoadedConfig::load(Some(&file))
    }

    fn write_theme(root: &Path) {
        let theme = root.join("theme");
        fs::create_dir_all(&theme).unwrap();
        fs::write(
            theme.join(TEMPLATE_FILE),
            "{{ title }}|{% for p in toc_pre %}{{ p.title }},{% endfor %}|\
             {% for p in toc_post %}{{ p.title }},{% endfor %}|{{ title_sidebar }}",
        )
        .unwrap();
        fs::write(theme.join("a.js"), "let a = 1;").unwrap();
        fs::write(theme.join(MANIFEST_FILE), "- a.js: static/a.js\n- gone.css\n").unwrap();
    }

    #[test]
    fn builds_ordered_site() {
        let temp = tempdir().unwrap();
        let nbs = temp.path().join("notebooks");
        fs::create_dir_all(&nbs).unwrap();
        fs::write(nbs.join("00.index.ipynb"), notebook(&["# Home"])).unwrap();
        fs::write(nbs.join("01.setup.ipynb"), notebook(&["# Setup", "## Install"])).unwrap();
        fs::write(nbs.join("02.usage.ipynb"), notebook(&["# Usage"])).unwrap();
        write_theme(temp.path());

        let config = site(temp.path(), "theme: theme\nhighlight_theme: ''\n");
        let result = SiteBuilder::new(config).build().unwrap();

        assert_eq!(result.pages, 3);
        assert_eq!(result.assets, 1);
        assert_eq!(result.failed_assets, vec!["gone.css".to_string()]);

        let www = temp.path().join("www");
        assert_eq!(
            fs::read_to_string(www.join("setup.html")).unwrap(),
            "Setup|Home,|Usage,|Home"
        );
        assert_eq!(
            fs::read_to_string(www.join("index.html")).unwrap(),
            "Home||Setup,Usage,|Home"
        );
        assert_eq!(fs::read_to_string(www.join("static/a.js")).unwrap(), "let a = 1;");
        assert!(!www.join(HIGHLIGHT_CSS).exists());
    }

    #[test]
    fn metadata_sets_order_and_keeps_names() {
        let temp = tempdir().unwrap();
        let nbs = temp.path().join("notebooks");
        fs::create_dir_all(&nbs).unwrap();
        fs::write(nbs.join("00.a.ipynb"), notebook(&["# A"])).unwrap();
        fs::write(nbs.join("01.b.ipynb"), notebook(&["# B"])).unwrap();
        fs::write(temp.path().join("order.csv"), "notebook,index\n01.b,0\n00.a,1\n").unwrap();
        write_theme(temp.path());

        let config = site(
            temp.path(),
            "theme: theme\nmetadata: order.csv\ntitle_sidebar: Guide\n",
        );
        SiteBuilder::new(config).build().unwrap();

        let www = temp.path().join("www");
        assert_eq!(fs::read_to_string(www.join("01.b.html")).unwrap(), "B||A,|Guide");
        assert_eq!(fs::read_to_string(www.join("00.a.html")).unwrap(), "A|B,||Guide");
        assert!(www.join(HIGHLIGHT_CSS).is_file());
    }

    #[test]
    fn no_notebooks_writes_nothing() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("notebooks")).unwrap();

        let config = site(temp.path(), "target: out\n");
        let result = SiteBuilder::new(config).build();

        assert!(matches!(
            result,
            Err(BuildError::Ordering(OrderingError::NoNotebooks(_)))
        ));
        assert!(!temp.path().join("out").exists());
    }

    #[test]
    fn metadata_mismatch_aborts() {
        let temp = tempdir().unwrap();
        let nbs = temp.path().join("notebooks");
        fs::create_dir_all(&nbs).unwrap();
        fs::write(nbs.join("a.ipynb"), notebook(&["# A"])).unwrap();
        fs::write(nbs.join("b.ipynb"), notebook(&["# B"])).unwrap();
        fs::write(temp.path().join("order.csv"), "notebook,index\na,0\n").unwrap();

        let config = site(temp.path(), "metadata: order.csv\n");
        let result = SiteBuilder::new(config).build();

        assert!(matches!(
            result,
            Err(BuildError::Ordering(OrderingError::MetadataMismatch { .. }))
        ));
    }

    #[test]
    fn bundled_theme_renders_navigation() {
        let temp = tempdir().unwrap();
        let nbs = temp.path().join("notebooks");
        fs::create_dir_all(nbs.join("part")).unwrap();
        fs::write(nbs.join("00.index.ipynb"), notebook(&["# Intro", "## Background"])).unwrap();
        fs::write(nbs.join("part/01.next.ipynb"), notebook(&["# Next"])).unwrap();

        let config =
            LoadedConfig::with_config(SiteConfig::default(), temp.path().join(CONFIG_FILE_NAME));
        SiteBuilder::new(config).build().unwrap();

        let www = temp.path().join("www");
        let index = fs::read_to_string(www.join("index.html")).unwrap();
        assert!(index.contains("<a href=\"#Background\">Background</a>"));
        assert!(index.contains("href=\"part/next.html\""));

        let next = fs::read_to_string(www.join("part/next.html")).unwrap();
        assert!(next.contains("href=\"../static/flette.css\""));
        assert!(next.contains("href=\"../index.html\""));
        assert!(www.join("static/flette.js").is_file());
        assert!(www.join(HIGHLIGHT_CSS).is_file());
    }

    #[test]
    fn unknown_highlight_theme_writes_nothing() {
        let temp = tempdir().unwrap();
        let nbs = temp.path().join("notebooks");
        fs::create_dir_all(&nbs).unwrap();
        fs::write(nbs.join("a.ipynb"), notebook(&["# A"])).unwrap();

        let config = site(temp.path(), "highlight_theme: NoSuchTheme\n");
        let result = SiteBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::Highlight(_))));
        assert!(!temp.path().join("www").exists());
    }

    #[test]
    fn colliding_outputs_keep_last_page() {
        let temp = tempdir().unwrap();
        let nbs = temp.path().join("notebooks");
        fs::create_dir_all(&nbs).unwrap();
        fs::write(nbs.join("00.index.ipynb"), notebook(&["# First"])).unwrap();
        fs::write(nbs.join("01.index.ipynb"), notebook(&["# Second"])).unwrap();
        write_theme(temp.path());

        let config = site(temp.path(), "theme: theme\nhighlight_theme: ''\n");
        let result = SiteBuilder::new(config).build().unwrap();

        assert_eq!(result.pages, 2);
        let index = fs::read_to_string(temp.path().join("www/index.html")).unwrap();
        assert!(index.starts_with("Second|First,|"));
    }

    #[test]
    fn broken_notebook_is_fatal() {
        let temp = tempdir().unwrap();
        let nbs = temp.path().join("notebooks");
        fs::create_dir_all(&nbs).unwrap();
        fs::write(nbs.join("bad.ipynb"), "not json").unwrap();

        let config =
            LoadedConfig::with_config(SiteConfig::default(), temp.path().join(CONFIG_FILE_NAME));
        let result = SiteBuilder::new(config).build();

        assert!(matches!(result, Err(BuildError::Notebook { .. })));
    }
}
