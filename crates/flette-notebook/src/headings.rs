//! Heading extraction from rendered notebook HTML.
//!
//! Headings are read back from the finished HTML fragment, so headings written
//! as inline HTML, in raw cells or in rich outputs count the same as markdown
//! ones.

use std::collections::HashMap;
use std::sync::LazyLock;

use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use regex::Regex;

use crate::notebook::NotebookError;

/// A heading found in a rendered notebook.
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    /// Heading level (1-6)
    pub level: u8,
    /// Anchor ID
    pub id: String,
    /// Inner HTML, without the anchor link
    pub html: String,
    /// Plain text content
    pub text: String,
}

/// Anchor ids handed out within one notebook.
#[derive(Debug, Default)]
pub struct AnchorIds {
    used: HashMap<String, usize>,
}

impl AnchorIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an anchor id, suffixing `-1`, `-2`, ... on collisions.
    pub fn claim(&mut self, base: String) -> String {
        let mut candidate = base.clone();
        while let Some(count) = self.used.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{}-{}", base, count);
        }
        self.used.insert(candidate.clone(), 0);
        candidate
    }
}

/// Build an anchor id from heading text: whitespace becomes `-`, and only
/// characters that are safe in a fragment are kept.
pub fn anchor_id(text: &str) -> String {
    let id = text
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if id.is_empty() {
        "section".to_string()
    } else {
        id
    }
}

fn heading_level(tag: &str) -> Option<u8> {
    tag.strip_prefix('h')
        .and_then(|digit| digit.parse::<u8>().ok())
        .filter(|level| (1..=6).contains(level))
}

fn start_marker(n: usize) -> String {
    format!("<!--flette-heading:{}-->", n)
}

fn end_marker(n: usize) -> String {
    format!("<!--/flette-heading:{}-->", n)
}

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--/?flette-heading:\d+-->").expect("Invalid marker regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

/// Plain text of an HTML fragment.
pub fn html_text(html: &str) -> String {
    let text = TAG.replace_all(html, "");
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#182;", "")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

fn rewrite_error(e: lol_html::errors::RewritingError) -> NotebookError {
    NotebookError::Rewrite(e.to_string())
}

/// Collect every `h1`-`h6` element of `body`, in document order.
///
/// Headings without an `id` get one derived from their text, claimed from
/// `ids`. Returns the body with those ids set, and the headings.
pub fn extract_headings(
    body: &str,
    ids: &mut AnchorIds,
) -> Result<(String, Vec<Heading>), NotebookError> {
    // Level and existing id of each heading, in document order
    let mut found: Vec<(u8, Option<String>)> = Vec::new();

    let marked = rewrite_str(
        body,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", |el| {
                    if let Some(level) = heading_level(&el.tag_name()) {
                        let n = found.len();
                        found.push((level, el.get_attribute("id")));
                        el.prepend(&start_marker(n), ContentType::Html);
                        el.append(&end_marker(n), ContentType::Html);
                    }
                    Ok(())
                }),
                element!("a.anchor-link", |el| {
                    el.remove();
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(rewrite_error)?;

    let mut headings = Vec::with_capacity(found.len());
    let mut assigned: Vec<Option<String>> = Vec::with_capacity(found.len());

    for (n, (level, id)) in found.into_iter().enumerate() {
        let inner =
            slice_between(&marked, &start_marker(n), &end_marker(n)).unwrap_or_default();
        let html = MARKER.replace_all(inner, "").trim().to_string();
        let text = html_text(&html);

        let id = match id {
            Some(id) => {
                assigned.push(None);
                id
            }
            None => {
                let id = ids.claim(anchor_id(&text));
                assigned.push(Some(id.clone()));
                id
            }
        };

        headings.push(Heading {
            level,
            id,
            html,
            text,
        });
    }

    if assigned.iter().all(Option::is_none) {
        return Ok((body.to_string(), headings));
    }

    let mut n = 0;
    let body = rewrite_str(
        body,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                if heading_level(&el.tag_name()).is_some() {
                    if let Some(Some(id)) = assigned.get(n) {
                        el.set_attribute("id", id)?;
                    }
                    n += 1;
                }
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(rewrite_error)?;

    Ok((body, headings))
}

fn slice_between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let to = from + haystack[from..].find(end)?;
    Some(&haystack[from..to])
}
