//! Markdown cell rendering.
//!
//! Markdown is rendered with pulldown-cmark. Headings are given stable anchor ids
//! and an anchor link, and fenced code is passed through the highlighter.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::headings::{anchor_id, AnchorIds};
use crate::highlight::{code_block, escape_html};

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_MATH
        | Options::ENABLE_HEADING_ATTRIBUTES
}

struct PendingHeading<'a> {
    level: u8,
    explicit_id: Option<String>,
    inner: Vec<Event<'a>>,
    text: String,
}

struct PendingCode {
    lang: Option<String>,
    text: String,
}

/// Render a markdown cell to HTML, claiming heading ids from `ids`.
pub fn render_markdown(source: &str, ids: &mut AnchorIds) -> String {
    let parser = Parser::new_ext(source, options());

    let mut events: Vec<Event> = Vec::new();
    let mut heading: Option<PendingHeading> = None;
    let mut code: Option<PendingCode> = None;

    for event in parser {
        if code.is_some() {
            match event {
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(block) = code.take() {
                        let html = code_block(&block.text, block.lang.as_deref());
                        events.push(Event::Html(CowStr::from(html)));
                    }
                }
                Event::Text(text) => {
                    if let Some(block) = code.as_mut() {
                        block.text.push_str(&text);
                    }
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(|lang| lang.to_string()),
                    CodeBlockKind::Indented => None,
                };
                code = Some(PendingCode {
                    lang,
                    text: String::new(),
                });
            }

            Event::Start(Tag::Heading { level, id, .. }) => {
                heading = Some(PendingHeading {
                    level: level as u8,
                    explicit_id: id.map(|id| id.to_string()),
                    inner: Vec::new(),
                    text: String::new(),
                });
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some(pending) = heading.take() {
                    let html = finish_heading(pending, ids);
                    events.push(Event::Html(CowStr::from(html)));
                }
            }

            other => match heading.as_mut() {
                Some(pending) => {
                    match &other {
                        Event::Text(text) | Event::Code(text) => pending.text.push_str(text),
                        Event::InlineMath(text) => pending.text.push_str(text),
                        _ => {}
                    }
                    pending.inner.push(other);
                }
                None => events.push(other),
            },
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out
}

fn finish_heading(pending: PendingHeading, ids: &mut AnchorIds) -> String {
    let mut inner = String::new();
    html::push_html(&mut inner, pending.inner.into_iter());

    let base = pending
        .explicit_id
        .unwrap_or_else(|| anchor_id(&pending.text));
    let id = escape_html(&ids.claim(base));

    format!(
        "<h{level} id=\"{id}\">{inner}\
         <a class=\"anchor-link\" href=\"#{id}\">&#182;</a></h{level}>\n",
        level = pending.level,
        id = id,
        inner = inner,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(source: &str) -> String {
        render_markdown(source, &mut AnchorIds::new())
    }

    #[test]
    fn emits_anchor_links() {
        assert_eq!(
            render("## Getting started"),
            "<h2 id=\"Getting-started\">Getting started\
             <a class=\"anchor-link\" href=\"#Getting-started\">&#182;</a></h2>\n"
        );
    }

    #[test]
    fn keeps_inline_markup_in_heading() {
        let html = render("# Using `map` *well*");

        assert!(html.starts_with(
            "<h1 id=\"Using-map-well\">Using <code>map</code> <em>well</em><a"
        ));
    }

    #[test]
    fn deduplicates_ids_across_cells() {
        let mut ids = AnchorIds::new();
        let first = render_markdown("# Notes\n\n# Notes\n", &mut ids);
        let second = render_markdown("# Notes", &mut ids);

        assert!(first.contains("id=\"Notes\""));
        assert!(first.contains("id=\"Notes-1\""));
        assert!(second.contains("id=\"Notes-2\""));
    }

    #[test]
    fn honours_explicit_ids() {
        assert!(render("# Setup {#install}").starts_with("<h1 id=\"install\">Setup<a"));
    }

    #[test]
    fn highlights_fenced_code() {
        let html = render("```python\nx = 1\n```\n");

        assert!(html.contains("data-lang=\"python\""));
        assert!(!html.contains("<h"));
    }

    #[test]
    fn passes_inline_html_through() {
        let html = render("<h1 id=\"intro\">Intro</h1>\n\ntext");

        assert!(html.contains("<h1 id=\"intro\">Intro</h1>"));
    }
}
