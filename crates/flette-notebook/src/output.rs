//! Code cell output rendering.

use std::sync::LazyLock;

use regex::Regex;

use crate::highlight::escape_html;
use crate::headings::AnchorIds;
use crate::markdown::render_markdown;
use crate::notebook::{bundle_text, MimeBundle, Output};

/// Mime types in order of preference for rich outputs.
const MIME_ORDER: &[&str] = &[
    "text/html",
    "image/svg+xml",
    "image/png",
    "image/jpeg",
    "text/markdown",
    "text/latex",
    "text/plain",
];

/// Remove terminal color sequences from text.
pub fn strip_ansi(text: &str) -> String {
    static ANSI: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("Invalid ANSI regex"));

    ANSI.replace_all(text, "").into_owned()
}

/// Render one output of a code cell. Markdown outputs claim heading ids from `ids`.
pub fn render_output(output: &Output, ids: &mut AnchorIds) -> String {
    match output {
        Output::Stream { name, text } => format!(
            "<div class=\"output_area output_stream output_{}\"><pre>{}</pre></div>\n",
            escape_html(name),
            escape_html(&strip_ansi(text.as_str()))
        ),
        Output::DisplayData { data } => render_bundle(data, None, ids),
        Output::ExecuteResult {
            execution_count,
            data,
        } => render_bundle(data, Some(*execution_count), ids),
        Output::Error {
            ename,
            evalue,
            traceback,
        } => {
            let text = if traceback.is_empty() {
                format!("{}: {}", ename, evalue)
            } else {
                traceback.join("\n")
            };
            format!(
                "<div class=\"output_area output_error\"><pre>{}</pre></div>\n",
                escape_html(&strip_ansi(&text))
            )
        }
    }
}

fn output_prompt(execution_count: Option<Option<u32>>) -> String {
    match execution_count {
        Some(Some(n)) => format!("<div class=\"prompt output_prompt\">Out[{}]:</div>", n),
        Some(None) => "<div class=\"prompt output_prompt\">Out[&nbsp;]:</div>".to_string(),
        None => String::new(),
    }
}

/// Render the preferred representation in a mime bundle.
fn render_bundle(
    data: &MimeBundle,
    execution_count: Option<Option<u32>>,
    ids: &mut AnchorIds,
) -> String {
    let Some(mime) = MIME_ORDER.iter().find(|m| data.contains_key(**m)) else {
        tracing::debug!("No renderable mime type in output: {:?}", data.keys());
        return String::new();
    };
    let text = bundle_text(data, mime).unwrap_or_default();

    let body = match *mime {
        "text/html" | "image/svg+xml" => text,
        "image/png" | "image/jpeg" => {
            let payload: String = text.split_whitespace().collect();
            format!("<img src=\"data:{};base64,{}\">", mime, payload)
        }
        "text/markdown" => render_markdown(&text, ids),
        "text/latex" => format!("<div class=\"output_latex\">{}</div>", escape_html(&text)),
        _ => format!("<pre>{}</pre>", escape_html(&strip_ansi(&text))),
    };

    let class = mime.replace(['/', '+'], "_");
    format!(
        "<div class=\"output_area\">{}<div class=\"output_subarea output_{}\">{}</div></div>\n",
        output_prompt(execution_count),
        class,
        body
    )
}
