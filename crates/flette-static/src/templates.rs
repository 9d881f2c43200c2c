//! Theme template rendering.

use std::collections::BTreeMap;

use minijinja::{AutoEscape, Environment, Value};

use crate::config::{SidebarTitle, SiteConfig};
use crate::page::Page;

/// Name the theme template is registered under.
pub const PAGE_TEMPLATE: &str = "template.html.j2";

/// Everything a page template sees.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub page: &'a Page,
    /// Pages before this one, in order
    pub before: &'a [Page],
    /// Pages after this one, in order
    pub after: &'a [Page],
    pub config: &'a SiteConfig,
    /// Sidebar title after resolving `true`
    pub title_sidebar: &'a SidebarTitle,
}

impl<'a> PageContext<'a> {
    /// Context for the page at `index` in `pages`.
    pub fn at(
        pages: &'a [Page],
        index: usize,
        config: &'a SiteConfig,
        title_sidebar: &'a SidebarTitle,
    ) -> Option<Self> {
        let page = pages.get(index)?;
        let (before, rest) = pages.split_at(index);

        Some(Self {
            page,
            before,
            after: &rest[1..],
            config,
            title_sidebar,
        })
    }

    /// Template variables: config keys first, then page fields, then navigation.
    fn to_value(self) -> Value {
        let mut vars: BTreeMap<String, Value> = BTreeMap::new();

        if let Ok(serde_json::Value::Object(config)) = serde_json::to_value(self.config) {
            for (key, value) in config {
                vars.insert(key, Value::from_serialize(&value));
            }
        }
        vars.insert(
            "title_sidebar".to_string(),
            Value::from_serialize(self.title_sidebar),
        );

        let page = self.page;
        vars.insert("htmlfile".to_string(), Value::from(page.htmlfile.as_str()));
        vars.insert("body".to_string(), Value::from(page.body.as_str()));
        vars.insert("title".to_string(), Value::from(page.title.as_str()));
        vars.insert("toc".to_string(), Value::from_serialize(&page.toc));
        vars.insert("headings".to_string(), Value::from_serialize(&page.headings));
        vars.insert("root".to_string(), Value::from(page.root()));

        vars.insert("toc_pre".to_string(), Value::from_serialize(self.before));
        vars.insert("toc_post".to_string(), Value::from_serialize(self.after));

        Value::from_serialize(&vars)
    }
}

/// Template engine holding one theme's page template.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Compile a page template.
    ///
    /// Output is not auto-escaped: page bodies and TOC entries are HTML.
    pub fn from_source(source: String) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_template_owned(PAGE_TEMPLATE.to_string(), source)?;

        Ok(Self { env })
    }

    /// Render the page template.
    pub fn render_page(&self, context: &PageContext) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(PAGE_TEMPLATE)?;
        tmpl.render(context.to_value())
    }
}
