use std::path::{Path, PathBuf};

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};

use crate::gather::Part;
use crate::render::markdown_options;

/// Forces the following block onto a new page.
pub const PAGE_BREAK: &str = "<div class=\"page-break\" style=\"page-break-after: always;\"></div>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMeta {
    pub title: String,
    pub author: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Generated markup: the title page or a part heading.
    Html(String),
    /// One source file, converted on its own so its Markdown cannot leak into the next.
    Markdown { path: PathBuf, text: String },
}

/// The whole book as an ordered list of page-separated blocks.
#[derive(Debug, Clone)]
pub struct Document {
    pub meta: BookMeta,
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn sources(&self) -> Vec<&Path> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Markdown { path, .. } => Some(path.as_path()),
                Block::Html(_) => None,
            })
            .collect()
    }

    /// Convert every block to HTML and join them with page breaks.
    pub fn to_html<F>(&self, mut convert: F) -> anyhow::Result<String>
    where
        F: FnMut(usize, &Path, &str) -> anyhow::Result<String>,
    {
        let mut fragments = Vec::with_capacity(self.blocks.len());
        for (idx, block) in self.blocks.iter().enumerate() {
            match block {
                Block::Html(html) => fragments.push(format!("{html}\n")),
                Block::Markdown { path, text } => fragments.push(convert(idx, path, text)?),
            }
        }
        let separator = format!("{PAGE_BREAK}\n");
        Ok(fragments.join(separator.as_str()))
    }
}

pub fn assemble(parts: &[Part], meta: BookMeta, title_page: bool) -> Document {
    let mut blocks = Vec::new();

    if title_page {
        blocks.push(Block::Html(render_title_block(&meta)));
    }

    for part in parts {
        if let Some(title) = part.title.as_deref() {
            blocks.push(Block::Html(format!(
                "<h1 class=\"part-title\">{}</h1>",
                html_escape::encode_text(title)
            )));
        }
        for doc in &part.documents {
            let text = match doc.title.as_deref() {
                Some(title) => retitle(&doc.body, title),
                None => trim_blank_lines(&doc.body).to_owned(),
            };
            blocks.push(Block::Markdown {
                path: doc.path.clone(),
                text,
            });
        }
    }

    Document { meta, blocks }
}

fn render_title_block(meta: &BookMeta) -> String {
    let mut html = String::from("<div class=\"title-page\">\n");
    html.push_str(&format!(
        "<h1 class=\"book-title\">{}</h1>\n",
        html_escape::encode_text(&meta.title)
    ));
    if !meta.author.trim().is_empty() {
        html.push_str(&format!(
            "<div class=\"author\">by {}</div>\n",
            html_escape::encode_text(&meta.author)
        ));
    }
    if !meta.date.trim().is_empty() {
        html.push_str(&format!(
            "<div class=\"date\">{}</div>\n",
            html_escape::encode_text(&meta.date)
        ));
    }
    html.push_str("</div>");
    html
}

/// Replace the body's leading level-one heading with `title`, or prepend one.
fn retitle(body: &str, title: &str) -> String {
    let stripped = strip_leading_h1(body);
    let rest = trim_blank_lines(&stripped);
    if rest.is_empty() {
        format!("# {title}")
    } else {
        format!("# {title}\n\n{rest}")
    }
}

/// Drop whole blank lines at the start, keeping first-line indentation.
fn trim_blank_lines(body: &str) -> &str {
    let mut start = 0;
    for line in body.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    body[start..].trim_end()
}

/// Handles ATX (`# Title`, up to three spaces of indent) and setext headings.
fn strip_leading_h1(body: &str) -> String {
    let mut events = Parser::new_ext(body, markdown_options()).into_offset_iter();
    match events.next() {
        Some((
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }),
            range,
        )) => {
            let before = &body[..range.start];
            let after = &body[range.end..];
            if before.trim().is_empty() {
                after.to_owned()
            } else {
                format!("{before}{after}")
            }
        }
        _ => body.to_owned(),
    }
}
