//! Fenced diagram blocks rendered to inline images ahead of HTML conversion.
//!
//! Only the byte ranges of matching fenced code blocks are rewritten; the rest
//! of the Markdown passes through untouched.

use std::ops::Range;
use std::path::Path;
use std::process::Command;

use anyhow::Context as _;
use base64::Engine as _;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

use crate::config::{DiagramFormat, DiagramSettings};
use crate::render::markdown_options;

pub const MMDC_ENV: &str = "MDBINDER_MMDC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

pub trait DiagramRenderer {
    fn render(&self, source: &str) -> anyhow::Result<RenderedDiagram>;
}

/// Mermaid through the `mmdc` CLI (headless Chromium under the hood).
#[derive(Debug, Clone)]
pub struct MermaidCli {
    pub bin: String,
    pub format: DiagramFormat,
    pub theme: String,
    pub background: String,
}

impl MermaidCli {
    /// `MDBINDER_MMDC` overrides the configured binary.
    pub fn from_settings(settings: &DiagramSettings) -> Self {
        let bin = std::env::var(MMDC_ENV).unwrap_or_else(|_| settings.command.clone());
        Self {
            bin,
            format: settings.format,
            theme: settings.theme.clone(),
            background: settings.background.clone(),
        }
    }

    fn mermaid_config(&self) -> serde_json::Value {
        let mut config = serde_json::json!({
            "theme": self.theme,
            "htmlLabels": false,
            "flowchart": { "htmlLabels": false },
            "class": { "htmlLabels": false },
        });
        if self.theme == "base" {
            config["themeVariables"] = serde_json::json!({
                "primaryColor": "#dbeafe",
                "primaryTextColor": "#1f2937",
                "primaryBorderColor": "#374151",
                "lineColor": "#374151",
                "secondaryColor": "#f3f4f6",
                "tertiaryColor": "#f9fafb",
                "background": "#ffffff",
                "mainBkg": "#f9fafb",
                "edgeLabelBackground": "#ffffff",
                "clusterBkg": "#f9fafb",
                "clusterBorder": "#d1d5db",
                "titleColor": "#111827",
                "textColor": "#111827",
                "noteTextColor": "#111827",
            });
        }
        config
    }
}

impl DiagramRenderer for MermaidCli {
    fn render(&self, source: &str) -> anyhow::Result<RenderedDiagram> {
        let work_dir = tempfile::TempDir::new().context("create diagram temp dir")?;
        let input = work_dir.path().join("diagram.mmd");
        let output = work_dir
            .path()
            .join(format!("diagram.{}", self.format.extension()));
        let config = work_dir.path().join("mermaid.json");
        let puppeteer = work_dir.path().join("puppeteer.json");

        std::fs::write(&input, source).context("write diagram source")?;
        write_json(&config, &self.mermaid_config())?;
        write_json(
            &puppeteer,
            &serde_json::json!({
                "args": ["--no-sandbox", "--disable-setuid-sandbox", "--disable-dev-shm-usage"],
            }),
        )?;

        tracing::debug!(bin = %self.bin, format = self.format.extension(), "mmdc");

        let result = Command::new(&self.bin)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .arg("-c")
            .arg(&config)
            .arg("-p")
            .arg(&puppeteer)
            .arg("-b")
            .arg(&self.background)
            .output();
        let out = match result {
            Ok(out) => out,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                anyhow::bail!(
                    "diagram renderer `{}` not found; install @mermaid-js/mermaid-cli, set {MMDC_ENV}, or set `diagrams.enabled: false`",
                    self.bin
                );
            }
            Err(err) => return Err(err).with_context(|| format!("run {}", self.bin)),
        };
        if !out.status.success() {
            anyhow::bail!(
                "{} failed ({}): {}",
                self.bin,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }

        let bytes = std::fs::read(&output)
            .with_context(|| format!("read rendered diagram: {}", output.display()))?;
        Ok(RenderedDiagram {
            mime: self.format.mime(),
            bytes,
        })
    }
}

fn write_json(path: &Path, value: &serde_json::Value) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(value).context("serialize json")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))
}

struct DiagramBlock {
    range: Range<usize>,
    source: String,
}

fn find_blocks(markdown: &str, languages: &[String]) -> Vec<DiagramBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<DiagramBlock> = None;

    for (event, range) in Parser::new_ext(markdown, markdown_options()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let lang = info.split_whitespace().next().unwrap_or("");
                if languages.iter().any(|l| l.eq_ignore_ascii_case(lang)) {
                    current = Some(DiagramBlock {
                        range,
                        source: String::new(),
                    });
                }
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.source.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Replace every diagram block whose fence language is in `languages` with an
/// inline `<figure>` holding the rendered image as a data URI.
pub fn preprocess(
    markdown: &str,
    languages: &[String],
    renderer: &dyn DiagramRenderer,
) -> anyhow::Result<String> {
    let blocks = find_blocks(markdown, languages);
    if blocks.is_empty() {
        return Ok(markdown.to_owned());
    }
    tracing::info!(count = blocks.len(), "rendering diagrams");

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for (idx, block) in blocks.iter().enumerate() {
        let number = idx + 1;
        let rendered = renderer
            .render(&block.source)
            .with_context(|| format!("render diagram {number}"))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&rendered.bytes);

        out.push_str(&markdown[cursor..block.range.start]);
        out.push_str(&format!(
            "<figure class=\"diagram\"><img alt=\"Diagram {number}\" src=\"data:{};base64,{encoded}\"></figure>\n\n",
            rendered.mime
        ));
        cursor = block.range.end;
        tracing::debug!(diagram = number, bytes = rendered.bytes.len(), "diagram rendered");
    }
    out.push_str(&markdown[cursor..]);

    Ok(out)
}
