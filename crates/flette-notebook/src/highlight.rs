//! Syntax highlighting for code cells and fenced code blocks.

use std::sync::OnceLock;

use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::notebook::NotebookError;

/// Class style shared by the generated markup and the generated stylesheet.
pub const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

/// Map lexer names that have no syntax of their own onto one that does.
fn lexer_token(lang: &str) -> &str {
    match lang {
        "ipython" | "ipython2" | "ipython3" | "python3" | "py3" => "py",
        "text" | "plaintext" | "none" => "txt",
        "shell" | "console" => "sh",
        other => other,
    }
}

/// Look up the syntax for a lexer name or file extension.
pub fn find_syntax(lang: &str) -> Option<&'static SyntaxReference> {
    let ss = syntax_set();
    let lang = lang.trim();
    if lang.is_empty() {
        return None;
    }
    let lower = lang.to_lowercase();

    ss.find_syntax_by_token(lexer_token(&lower))
        .or_else(|| ss.find_syntax_by_name(lang))
        .or_else(|| ss.find_syntax_by_extension(&lower))
}

/// Label shown on a highlighted block for a fence language.
fn pretty_lang(lang: &str) -> &str {
    match lang {
        "idl" => "IDL",
        "text" => "",
        other => other,
    }
}

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Highlight `code` with `syntax`, returning the classed spans.
fn classed_html(code: &str, syntax: &SyntaxReference) -> Result<String, NotebookError> {
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set(), CLASS_STYLE);

    for line in LinesWithEndings::from(code) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|e| NotebookError::Highlight(e.to_string()))?;
    }

    Ok(generator.finalize())
}

fn with_trailing_newline(code: &str) -> String {
    let mut code = code.to_string();
    if !code.ends_with('\n') {
        code.push('\n');
    }
    code
}

fn plain_block(code: &str) -> String {
    format!("\n<pre><code>{}</code></pre>\n", escape_html(code))
}

/// Render a fenced code block from a markdown cell.
///
/// Unknown languages fall back to a plain block with the language name kept
/// as the first line of the code.
pub fn code_block(code: &str, lang: Option<&str>) -> String {
    let code = code.trim();
    let lang = lang.map(str::trim).filter(|l| !l.is_empty());

    let Some(lang) = lang else {
        return plain_block(code);
    };

    let Some(syntax) = find_syntax(lang) else {
        return plain_block(&format!("{}\n{}", lang, code));
    };

    match classed_html(&with_trailing_newline(code), syntax) {
        Ok(spans) => format!(
            "<div class=\"highlight highlight-with-lang\" data-lang=\"{}\"><pre>{}</pre></div>\n",
            escape_html(pretty_lang(lang)),
            spans
        ),
        Err(e) => {
            tracing::warn!("Failed to highlight {} block: {}", lang, e);
            plain_block(code)
        }
    }
}

/// Render the source of a code cell using the notebook's lexer.
pub fn code_cell(code: &str, lexer: &str) -> String {
    let code = code.trim_end();

    let highlighted = find_syntax(lexer).and_then(|syntax| {
        classed_html(&with_trailing_newline(code), syntax)
            .map_err(|e| tracing::warn!("Failed to highlight code cell: {}", e))
            .ok()
    });

    match highlighted {
        Some(spans) => format!(
            "<div class=\"highlight hl-{}\"><pre>{}</pre></div>",
            escape_html(lexer),
            spans
        ),
        None => format!(
            "<div class=\"highlight\"><pre>{}</pre></div>",
            escape_html(code)
        ),
    }
}

/// Stylesheet for the classes emitted by this module, in the given theme.
pub fn stylesheet(theme: &str) -> Result<String, NotebookError> {
    let theme = theme_set()
        .themes
        .get(theme)
        .ok_or_else(|| NotebookError::UnknownTheme(theme.to_string()))?;

    css_for_theme_with_class_style(theme, CLASS_STYLE)
        .map_err(|e| NotebookError::Highlight(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_ipython_to_python() {
        let syntax = find_syntax("ipython").unwrap();
        assert_eq!(syntax.name, "Python");

        let syntax = find_syntax("ipython3").unwrap();
        assert_eq!(syntax.name, "Python");
    }

    #[test]
    fn highlights_known_language() {
        let html = code_block("fn main() {}", Some("rust"));

        assert!(html.starts_with(
            "<div class=\"highlight highlight-with-lang\" data-lang=\"rust\">"
        ));
        assert!(html.contains("hl-"));
        assert!(html.contains("main"));
    }

    #[test]
    fn unknown_language_keeps_name_in_code() {
        let html = code_block("x <- 1", Some("no-such-lang"));

        assert_eq!(html, "\n<pre><code>no-such-lang\nx &lt;- 1</code></pre>\n");
    }

    #[test]
    fn no_language_renders_plain() {
        let html = code_block("  a & b  ", None);

        assert_eq!(html, "\n<pre><code>a &amp; b</code></pre>\n");
    }

    #[test]
    fn text_blocks_get_empty_label() {
        let html = code_block("plain words", Some("text"));

        assert!(html.contains("data-lang=\"\""));
    }

    #[test]
    fn code_cell_escapes_when_unknown() {
        let html = code_cell("if a < b:", "unknown-lexer");

        assert_eq!(html, "<div class=\"highlight\"><pre>if a &lt; b:</pre></div>");
    }

    #[test]
    fn builds_stylesheet() {
        let css = stylesheet("InspiredGitHub").unwrap();
        assert!(css.contains(".hl-"));

        assert!(matches!(
            stylesheet("missing"),
            Err(NotebookError::UnknownTheme(_))
        ));
    }

    #[test]
    fn escapes_html() {
        assert_eq!(
            escape_html("<a href=\"x\">&</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }
}
