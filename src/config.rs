use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::formats::BookStructure;

pub const CONFIG_DIR: &str = "config";
pub const EXPORT_CONFIG_FILE: &str = "export_config.yaml";
pub const BOOK_STRUCTURE_FILE: &str = "book_structure.yaml";

pub const DEFAULT_TITLE: &str = "Title of the Book";
pub const DEFAULT_AUTHOR: &str = "Author Name";
pub const DEFAULT_OUTPUT_FILE: &str = "output/book.pdf";

/// Contents of `export_config.yaml`. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_markdown_files: Vec<String>,
    pub title_page: bool,
    pub number_sections: bool,
    pub keep_html: bool,
    pub page: PageSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_settings: Option<FontSettings>,
    pub diagrams: DiagramSettings,
    pub renderer: RendererSettings,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: None,
            author: None,
            date: None,
            source_root: None,
            output_file: None,
            template: None,
            css: None,
            include_markdown_files: Vec::new(),
            title_page: true,
            number_sections: true,
            keep_html: false,
            page: PageSettings::default(),
            font_settings: None,
            diagrams: DiagramSettings::default(),
            renderer: RendererSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSettings {
    pub size: String,
    pub margin: Margins,
    pub numbers: bool,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            size: "A4".to_owned(),
            margin: Margins::Uniform("20mm".to_owned()),
            numbers: true,
        }
    }
}

/// `margin: 20mm` or `margin: { top: 25mm, bottom: 20mm }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Margins {
    Uniform(#[serde(deserialize_with = "css_value")] String),
    Sides {
        #[serde(default = "default_margin", deserialize_with = "css_value")]
        top: String,
        #[serde(default = "default_margin", deserialize_with = "css_value")]
        right: String,
        #[serde(default = "default_margin", deserialize_with = "css_value")]
        bottom: String,
        #[serde(default = "default_margin", deserialize_with = "css_value")]
        left: String,
    },
}

fn default_margin() -> String {
    "20mm".to_owned()
}

// YAML users write `line_height: 1.6` or `margin: 0`; CSS only needs the text.
fn css_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

impl Margins {
    /// Value for the CSS `margin` shorthand.
    pub fn to_css(&self) -> String {
        match self {
            Margins::Uniform(all) => all.clone(),
            Margins::Sides {
                top,
                right,
                bottom,
                left,
            } => format!("{top} {right} {bottom} {left}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    #[serde(deserialize_with = "css_value")]
    pub base_font_size: String,
    #[serde(deserialize_with = "css_value")]
    pub line_height: String,
    #[serde(deserialize_with = "css_value")]
    pub h1_size: String,
    #[serde(deserialize_with = "css_value")]
    pub h2_size: String,
    #[serde(deserialize_with = "css_value")]
    pub h3_size: String,
    #[serde(deserialize_with = "css_value")]
    pub code_size: String,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            base_font_size: "12pt".to_owned(),
            line_height: "1.6".to_owned(),
            h1_size: "24pt".to_owned(),
            h2_size: "20pt".to_owned(),
            h3_size: "16pt".to_owned(),
            code_size: "10pt".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    Svg,
    Png,
}

impl DiagramFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DiagramFormat::Svg => "svg",
            DiagramFormat::Png => "png",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            DiagramFormat::Svg => "image/svg+xml",
            DiagramFormat::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramSettings {
    pub enabled: bool,
    pub command: String,
    pub format: DiagramFormat,
    pub theme: String,
    pub background: String,
    pub languages: Vec<String>,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "mmdc".to_owned(),
            format: DiagramFormat::Svg,
            theme: "base".to_owned(),
            background: "white".to_owned(),
            languages: vec!["mermaid".to_owned()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            command: "weasyprint".to_owned(),
            args: Vec::new(),
        }
    }
}

pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    // An empty document is null in YAML; treat it as an empty mapping.
    let contents = if contents.trim().is_empty() {
        "{}"
    } else {
        contents.as_str()
    };
    serde_yaml::from_str(contents).with_context(|| format!("parse config: {}", path.display()))
}

/// Both config files loaded, with every relative path resolved.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub export: ExportConfig,
    pub structure: BookStructure,
}

impl Project {
    /// The export config may be absent (defaults apply); the book structure may not.
    pub fn load(root: &Path, config_dir: &Path) -> anyhow::Result<Self> {
        let export = load_export_config(config_dir)?;

        let structure_path = config_dir.join(BOOK_STRUCTURE_FILE);
        if !structure_path.exists() {
            anyhow::bail!(
                "book structure not found: {} (run with --build to generate one)",
                structure_path.display()
            );
        }
        let structure: BookStructure = load_yaml(&structure_path)?;

        Ok(Self {
            root: root.to_path_buf(),
            config_dir: config_dir.to_path_buf(),
            export,
            structure,
        })
    }

    pub fn source_root(&self) -> PathBuf {
        source_root(&self.root, &self.export)
    }

    pub fn output_path(&self) -> PathBuf {
        resolve_against(
            &self.root,
            self.export
                .output_file
                .as_deref()
                .unwrap_or(DEFAULT_OUTPUT_FILE),
        )
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.export
            .template
            .as_deref()
            .map(|template| resolve_against(&self.root, template))
    }

    pub fn css_path(&self) -> Option<PathBuf> {
        self.export
            .css
            .as_deref()
            .map(|css| resolve_against(&self.root, css))
    }
}

/// `Ok(default)` when the file does not exist; parse errors still fail.
pub fn load_export_config(config_dir: &Path) -> anyhow::Result<ExportConfig> {
    let path = config_dir.join(EXPORT_CONFIG_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "export config not found; using defaults");
        return Ok(ExportConfig::default());
    }
    load_yaml(&path)
}

pub fn source_root(root: &Path, export: &ExportConfig) -> PathBuf {
    match export.source_root.as_deref() {
        Some(source_root) => resolve_against(root, source_root),
        None => root.to_path_buf(),
    }
}

pub fn resolve_against(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
