//! Notebook to HTML rendering.

use crate::headings::{extract_headings, AnchorIds, Heading};
use crate::highlight::code_cell;
use crate::markdown::render_markdown;
use crate::notebook::{Cell, CellMetadata, Notebook, NotebookError};
use crate::output::render_output;

/// A notebook rendered to an HTML fragment.
#[derive(Debug, Clone)]
pub struct RenderedNotebook {
    /// HTML fragment for the page body
    pub body: String,

    /// Headings in document order
    pub headings: Vec<Heading>,
}

impl RenderedNotebook {
    /// The first heading, if any.
    pub fn first_heading(&self) -> Option<&Heading> {
        self.headings.first()
    }
}

/// Render every cell of a notebook and collect the headings of the result.
pub fn render_notebook(notebook: &Notebook) -> Result<RenderedNotebook, NotebookError> {
    let lexer = notebook.lexer();
    let mut ids = AnchorIds::new();
    let mut body = String::new();

    for cell in &notebook.cells {
        match cell {
            Cell::Markdown { source, .. } => {
                body.push_str("<div class=\"cell text_cell\">\n");
                body.push_str("<div class=\"text_cell_render rendered_html\">\n");
                body.push_str(&render_markdown(source.as_str(), &mut ids));
                body.push_str("</div>\n</div>\n");
            }

            Cell::Code {
                source,
                execution_count,
                outputs,
                ..
            } => {
                let prompt = match execution_count {
                    Some(n) => format!("In&nbsp;[{}]:", n),
                    None => "In&nbsp;[&nbsp;]:".to_string(),
                };

                body.push_str("<div class=\"cell code_cell\">\n<div class=\"input\">\n");
                body.push_str(&format!(
                    "<div class=\"prompt input_prompt\">{}</div>\n",
                    prompt
                ));
                body.push_str("<div class=\"inner_cell\"><div class=\"input_area\">\n");
                body.push_str(&code_cell(source.as_str(), lexer));
                body.push_str("\n</div></div>\n</div>\n");

                if !outputs.is_empty() {
                    body.push_str("<div class=\"output_wrapper\"><div class=\"output\">\n");
                    for output in outputs {
                        body.push_str(&render_output(output, &mut ids));
                    }
                    body.push_str("</div></div>\n");
                }

                body.push_str("</div>\n");
            }

            Cell::Raw { source, metadata } => {
                if is_html_raw(metadata) {
                    body.push_str("<div class=\"cell raw_cell\">\n");
                    body.push_str(source.as_str());
                    body.push_str("\n</div>\n");
                }
            }
        }
    }

    let (body, headings) = extract_headings(&body, &mut ids)?;

    Ok(RenderedNotebook { body, headings })
}

fn is_html_raw(metadata: &CellMetadata) -> bool {
    let format = metadata
        .format
        .as_deref()
        .or(metadata.raw_mimetype.as_deref());
    matches!(format, Some("text/html") | Some("html"))
}
