use std::path::Path;

use anyhow::Context as _;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};

use crate::assemble::BookMeta;
use crate::config::{FontSettings, PageSettings};

pub const DEFAULT_TEMPLATE: &str = include_str!("templates/book.html");

pub fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Convert one source file to an HTML fragment.
///
/// Footnote labels are prefixed with `footnote_scope` so fragments from
/// different files can share a page without their ids colliding.
pub fn markdown_to_html(md: &str, footnote_scope: &str) -> String {
    let scoped = |name: CowStr<'_>| -> CowStr<'static> { format!("{footnote_scope}{name}").into() };
    let parser = Parser::new_ext(md, markdown_options()).map(|event| match event {
        Event::FootnoteReference(name) => Event::FootnoteReference(scoped(name)),
        Event::Start(Tag::FootnoteDefinition(name)) => {
            Event::Start(Tag::FootnoteDefinition(scoped(name)))
        }
        other => other,
    });
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}

/// A configured template must exist; without one the built-in template is used.
pub fn load_template(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read template: {}", path.display())),
        None => Ok(DEFAULT_TEMPLATE.to_owned()),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StyleOptions<'a> {
    pub page: &'a PageSettings,
    pub fonts: Option<&'a FontSettings>,
    pub number_sections: bool,
    pub title_page: bool,
}

/// CSS generated from the export config, injected into whichever template is used.
pub fn generated_css(options: &StyleOptions<'_>) -> String {
    let page = options.page;
    let mut css = String::new();

    css.push_str("@page {\n");
    css.push_str(&format!("  size: {};\n", page.size));
    css.push_str(&format!("  margin: {};\n", page.margin.to_css()));
    if page.numbers {
        css.push_str("  @bottom-center { content: counter(page); }\n");
    }
    css.push_str("}\n");
    if page.numbers && options.title_page {
        css.push_str("@page :first { @bottom-center { content: none; } }\n");
    }
    css.push_str(".page-break { page-break-after: always; break-after: page; }\n");

    if let Some(fonts) = options.fonts {
        css.push_str(&format!(
            "body {{ font-size: {} !important; line-height: {} !important; }}\n",
            fonts.base_font_size, fonts.line_height
        ));
        css.push_str(&format!("h1 {{ font-size: {} !important; }}\n", fonts.h1_size));
        css.push_str(&format!("h2 {{ font-size: {} !important; }}\n", fonts.h2_size));
        css.push_str(&format!(
            "h3, h4, h5, h6 {{ font-size: {} !important; }}\n",
            fonts.h3_size
        ));
        css.push_str(&format!(
            "code, pre, pre code {{ font-size: {} !important; }}\n",
            fonts.code_size
        ));
    }

    if options.number_sections {
        css.push_str(concat!(
            "body { counter-reset: chapter; }\n",
            "h1:not(.book-title):not(.part-title) { counter-increment: chapter; counter-reset: section; }\n",
            "h1:not(.book-title):not(.part-title)::before { content: counter(chapter) \". \"; }\n",
            "h2 { counter-increment: section; counter-reset: subsection; }\n",
            "h2::before { content: counter(chapter) \".\" counter(section) \" \"; }\n",
            "h3 { counter-increment: subsection; }\n",
            "h3::before { content: counter(chapter) \".\" counter(section) \".\" counter(subsection) \" \"; }\n",
        ));
    }

    css
}

/// Merge the converted body into the template.
///
/// Metadata placeholders are filled first so that `{{ … }}` text inside the
/// book content is never substituted.
pub fn compose_html(template: &str, meta: &BookMeta, content_html: &str, css: &str) -> String {
    let html = fill(template, "title", &html_escape::encode_quoted_attribute(&meta.title));
    let html = fill(&html, "author", &html_escape::encode_quoted_attribute(&meta.author));
    let html = fill(&html, "date", &html_escape::encode_quoted_attribute(&meta.date));
    let html = inject_style(&html, css);
    fill(&html, "content", content_html)
}

fn fill(template: &str, key: &str, value: &str) -> String {
    template
        .replace(&format!("{{{{ {key} }}}}"), value)
        .replace(&format!("{{{{{key}}}}}"), value)
}

fn inject_style(html: &str, css: &str) -> String {
    let style = format!("<style>\n{css}</style>\n");
    match html.find("</head>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + style.len());
            out.push_str(&html[..idx]);
            out.push_str(&style);
            out.push_str(&html[idx..]);
            out
        }
        None => {
            tracing::warn!("template has no </head>; prepending generated styles");
            format!("{style}{html}")
        }
    }
}
